//! Causal miner: heuristic edges pruned by relative causal strength, with
//! split and join semantics on branching activities.

use super::heuristic::{self, DependencyMatrix, HeuristicParams, KeptEdge};
use super::node;
use crate::config::Algorithm;
use crate::graph::{Annotation, ProcessGraph};
use crate::succession::Succession;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CausalParams {
  pub heuristic: HeuristicParams,
  pub causality_threshold: f64,
  pub and_threshold: f64,
}

impl Default for CausalParams {
  fn default() -> Self {
    Self {
      heuristic: HeuristicParams::default(),
      causality_threshold: 0.5,
      and_threshold: 0.1,
    }
  }
}

/// `dep(a, b) * |a>b| / max_x |a>x|`, clamped to [0, 1].
pub fn causality(matrix: &DependencyMatrix, a: usize, b: usize) -> f64 {
  let s = matrix.succession();
  let max = s.max_outgoing(a);
  if max == 0 {
    return 0.0;
  }
  (matrix.dependency_at(a, b) * s.count(a, b) as f64 / max as f64).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
  Split,
  Join,
}

/// Classify the branches of `a` as AND/XOR/OR from pairwise AND measures.
fn branch_kind(
  s: &Succession,
  a: usize,
  others: &[usize],
  branch: Branch,
  and_threshold: f64,
) -> Option<Annotation> {
  if others.len() < 2 {
    return None;
  }
  let (mut parallel, mut pairs) = (0usize, 0usize);
  for (i, &b) in others.iter().enumerate() {
    for &c in &others[i + 1..] {
      let between = (s.count(b, c) + s.count(c, b)) as f64;
      let towards = match branch {
        Branch::Split => s.count(a, b) + s.count(a, c),
        Branch::Join => s.count(b, a) + s.count(c, a),
      } as f64;
      if between / (towards + 1.0) >= and_threshold {
        parallel += 1;
      }
      pairs += 1;
    }
  }
  Some(match (branch, parallel) {
    (Branch::Split, p) if p == pairs => Annotation::AndSplit,
    (Branch::Split, 0) => Annotation::XorSplit,
    (Branch::Split, _) => Annotation::OrSplit,
    (Branch::Join, p) if p == pairs => Annotation::AndJoin,
    (Branch::Join, 0) => Annotation::XorJoin,
    (Branch::Join, _) => Annotation::OrJoin,
  })
}

pub(crate) fn mine(succession: &Succession, params: &CausalParams) -> ProcessGraph {
  let matrix = DependencyMatrix::new(succession.clone());
  let candidates = heuristic::kept_edges(&matrix, &params.heuristic);
  let mut kept: Vec<(KeptEdge, f64)> = Vec::with_capacity(candidates.len());
  for edge in candidates {
    let strength = causality(&matrix, edge.source, edge.target);
    if strength >= params.causality_threshold {
      kept.push((edge, strength));
    }
  }

  let edges: Vec<KeptEdge> = kept.iter().map(|(e, _)| *e).collect();
  let mut graph = heuristic::build(Algorithm::Causal, succession, &edges);
  let concurrent = heuristic::mark_concurrency(&mut graph, &matrix, &params.heuristic);
  for (e, strength) in &kept {
    graph.add_edge(node(e.source), node(e.target), e.frequency).causality = Some(*strength);
  }

  let mut branching = 0usize;
  for a in 0..succession.activities().len() {
    let successors: Vec<usize> = edges
      .iter()
      .filter(|e| e.source == a && e.target != a)
      .map(|e| e.target)
      .collect();
    let predecessors: Vec<usize> = edges
      .iter()
      .filter(|e| e.target == a && e.source != a)
      .map(|e| e.source)
      .collect();
    for (others, branch) in [(successors, Branch::Split), (predecessors, Branch::Join)] {
      if let Some(kind) = branch_kind(succession, a, &others, branch, params.and_threshold) {
        graph.annotate_node(node(a), kind);
        branching += 1;
      }
    }
  }

  tracing::debug!(
    candidates = matrix.succession().pairs().count(),
    kept = kept.len(),
    branching,
    concurrent,
    "causal pruning applied"
  );
  graph
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::miners::fixtures;

  fn graph(log: &crate::log::EventLog, params: &CausalParams) -> ProcessGraph {
    mine(&Succession::from_log(log), params)
  }

  #[test]
  fn prunes_relatively_weak_successors() {
    let g = graph(&fixtures::abc(), &CausalParams::default());
    let ab = g.edge("A", "B").unwrap();
    assert!((ab.causality.unwrap() - 5.0 / 6.0).abs() < 1e-9);
    // dep(A,C) = 2/3 but A->C is 2/5 of A's strongest successor.
    assert!(!g.has_edge("A", "C"));
    assert!(g.is_concurrent("B", "C"));
  }

  #[test]
  fn causality_is_a_unit_score() {
    let log = fixtures::log(&[(&["A", "B", "C", "D"], 4), (&["A", "C", "B", "D"], 3)]);
    let m = DependencyMatrix::from_log(&log);
    let s = m.succession();
    for ((a, b), _) in s.pairs() {
      let c = causality(&m, a, b);
      assert!((0.0..=1.0).contains(&c));
    }
  }

  #[test]
  fn exclusive_choice_is_xor() {
    let log = fixtures::log(&[(&["A", "B", "D"], 5), (&["A", "C", "D"], 5)]);
    let params = CausalParams {
      causality_threshold: 0.3,
      ..CausalParams::default()
    };
    let g = graph(&log, &params);
    assert!(g.has_edge("A", "B") && g.has_edge("A", "C"));
    let a = g.node_id("A").unwrap();
    let d = g.node_id("D").unwrap();
    assert!(g.node(a).annotations.contains(&Annotation::XorSplit));
    assert!(g.node(d).annotations.contains(&Annotation::XorJoin));
  }

  #[test]
  fn interleaved_branches_are_and() {
    let log = fixtures::log(&[
      (&["A", "B", "C", "D"], 5),
      (&["A", "C", "B", "D"], 5),
      (&["A", "B", "D"], 1),
      (&["A", "C", "D"], 1),
    ]);
    let params = CausalParams {
      heuristic: HeuristicParams {
        min_frequency: 1,
        dependency_threshold: 0.5,
      },
      causality_threshold: 0.5,
      and_threshold: 0.1,
    };
    let g = graph(&log, &params);
    assert!(g.has_edge("A", "B") && g.has_edge("A", "C"));
    let a = g.node_id("A").unwrap();
    assert!(g.node(a).annotations.contains(&Annotation::AndSplit));
  }
}
