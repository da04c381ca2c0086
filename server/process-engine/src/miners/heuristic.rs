//! Heuristic miner: keep successions whose dependency score clears a threshold.
//!
//! `dep(a, b) = (|a>b| - |b>a|) / (|a>b| + |b>a| + 1)` and for self-loops
//! `dep(a, a) = |a>a| / (|a>a| + 1)`. An observed succession that fails the
//! dependency test survives when the pair forms a length-two loop
//! (`l2(a, b) = (|a>>b| + |b>>a|) / (|a>>b| + |b>>a| + 1)` clears the same
//! threshold). Pairs seen in both orders with neither dominating are recorded
//! on the graph as concurrent instead of becoming edges.

use serde::Serialize;

use super::{base_graph, node};
use crate::config::Algorithm;
use crate::graph::{Annotation, ProcessGraph};
use crate::log::EventLog;
use crate::succession::Succession;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicParams {
  pub min_frequency: u64,
  pub dependency_threshold: f64,
}

impl Default for HeuristicParams {
  fn default() -> Self {
    Self {
      min_frequency: 1,
      dependency_threshold: 0.5,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRelation {
  /// One direction dominates.
  Sequence,
  /// Both orders occur and neither dominates.
  Concurrent,
  /// Neither direction was observed.
  Independent,
}

/// Dependency and two-loop scores over a log's succession counts.
#[derive(Debug, Clone)]
pub struct DependencyMatrix {
  succession: Succession,
}

impl DependencyMatrix {
  pub fn new(succession: Succession) -> Self {
    Self { succession }
  }

  pub fn from_log(log: &EventLog) -> Self {
    Self::new(Succession::from_log(log))
  }

  pub fn succession(&self) -> &Succession {
    &self.succession
  }

  /// Score in [-1, 1) by activity index.
  pub fn dependency_at(&self, a: usize, b: usize) -> f64 {
    let ab = self.succession.count(a, b) as f64;
    if a == b {
      return ab / (ab + 1.0);
    }
    let ba = self.succession.count(b, a) as f64;
    (ab - ba) / (ab + ba + 1.0)
  }

  pub fn two_loop_at(&self, a: usize, b: usize) -> f64 {
    if a == b {
      return 0.0;
    }
    let n = (self.succession.two_loop_count(a, b) + self.succession.two_loop_count(b, a)) as f64;
    n / (n + 1.0)
  }

  /// `None` when either activity is unknown.
  pub fn dependency(&self, a: &str, b: &str) -> Option<f64> {
    let (a, b) = self.indices(a, b)?;
    Some(self.dependency_at(a, b))
  }

  pub fn two_loop(&self, a: &str, b: &str) -> Option<f64> {
    let (a, b) = self.indices(a, b)?;
    Some(self.two_loop_at(a, b))
  }

  pub fn relation(&self, a: &str, b: &str, threshold: f64) -> Option<DependencyRelation> {
    let (a, b) = self.indices(a, b)?;
    Some(self.relation_at(a, b, threshold))
  }

  /// Concurrent only when both orders occur and neither clears `threshold`;
  /// a pair seen in one order only is a sequence however rare.
  pub fn relation_at(&self, a: usize, b: usize, threshold: f64) -> DependencyRelation {
    match (self.succession.follows(a, b), self.succession.follows(b, a)) {
      (false, false) => DependencyRelation::Independent,
      (true, true) if a != b && self.dependency_at(a, b).abs() < threshold => {
        DependencyRelation::Concurrent
      }
      _ => DependencyRelation::Sequence,
    }
  }

  fn indices(&self, a: &str, b: &str) -> Option<(usize, usize)> {
    Some((self.succession.index_of(a)?, self.succession.index_of(b)?))
  }
}

/// An observed succession that passed the heuristic filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct KeptEdge {
  pub source: usize,
  pub target: usize,
  pub frequency: u64,
  pub dependency: f64,
  pub two_loop: bool,
}

pub(crate) fn kept_edges(matrix: &DependencyMatrix, params: &HeuristicParams) -> Vec<KeptEdge> {
  let threshold = params.dependency_threshold;
  matrix
    .succession()
    .pairs()
    .filter(|&(_, n)| n >= params.min_frequency)
    .filter_map(|((a, b), n)| {
      let dependency = matrix.dependency_at(a, b);
      let two_loop = dependency < threshold && a != b && matrix.two_loop_at(a, b) >= threshold;
      (dependency >= threshold || two_loop).then_some(KeptEdge {
        source: a,
        target: b,
        frequency: n,
        dependency,
        two_loop,
      })
    })
    .collect()
}

pub(crate) fn build(
  algorithm: Algorithm,
  succession: &Succession,
  edges: &[KeptEdge],
) -> ProcessGraph {
  let mut graph = base_graph(algorithm, succession);
  for e in edges {
    graph.add_edge(node(e.source), node(e.target), e.frequency).dependency = Some(e.dependency);
    if e.source == e.target {
      graph.annotate_edge(node(e.source), node(e.target), Annotation::SelfLoop);
    }
    if e.two_loop {
      graph.annotate_edge(node(e.source), node(e.target), Annotation::TwoLoop);
    }
  }
  graph
}

/// Record concurrent pairs on the graph. Pairs kept as length-two loops are
/// loops, not concurrency. Returns the number of pairs marked.
pub(crate) fn mark_concurrency(
  graph: &mut ProcessGraph,
  matrix: &DependencyMatrix,
  params: &HeuristicParams,
) -> usize {
  let threshold = params.dependency_threshold;
  let n = matrix.succession().activities().len();
  let mut marked = 0;
  for a in 0..n {
    for b in a + 1..n {
      if matrix.relation_at(a, b, threshold) == DependencyRelation::Concurrent
        && matrix.two_loop_at(a, b) < threshold
      {
        graph.mark_concurrent(node(a), node(b));
        marked += 1;
      }
    }
  }
  marked
}

pub(crate) fn mine(succession: &Succession, params: &HeuristicParams) -> ProcessGraph {
  let matrix = DependencyMatrix::new(succession.clone());
  let edges = kept_edges(&matrix, params);
  let mut graph = build(Algorithm::Heuristic, succession, &edges);
  let concurrent = mark_concurrency(&mut graph, &matrix, params);
  tracing::debug!(
    observed = succession.pairs().count(),
    kept = edges.len(),
    two_loops = edges.iter().filter(|e| e.two_loop).count(),
    concurrent,
    "heuristic filter applied"
  );
  graph
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::miners::fixtures;

  fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
  }

  #[test]
  fn dependency_scores() {
    let m = DependencyMatrix::from_log(&fixtures::abc());
    assert!(close(m.dependency("A", "B").unwrap(), 5.0 / 6.0));
    assert!(close(m.dependency("B", "C").unwrap(), 0.375));
    assert!(close(m.dependency("C", "B").unwrap(), -0.375));
    assert!(close(m.dependency("B", "A").unwrap(), -5.0 / 6.0));
    assert_eq!(m.dependency("A", "Z"), None);
  }

  #[test]
  fn relations() {
    let m = DependencyMatrix::from_log(&fixtures::abc());
    assert_eq!(m.relation("A", "B", 0.5), Some(DependencyRelation::Sequence));
    assert_eq!(m.relation("B", "C", 0.5), Some(DependencyRelation::Concurrent));
    assert_eq!(m.relation("B", "A", 0.5), Some(DependencyRelation::Sequence));
    let single = DependencyMatrix::from_log(&fixtures::log(&[(&["A", "B"], 1), (&["C"], 1)]));
    assert_eq!(single.relation("A", "C", 0.5), Some(DependencyRelation::Independent));
    // Seen once in one order only: weak, but never concurrent.
    assert_eq!(single.relation("A", "B", 0.9), Some(DependencyRelation::Sequence));
  }

  #[test]
  fn interleaved_pairs_are_marked_concurrent() {
    let g = mine(&Succession::from_log(&fixtures::abc()), &HeuristicParams::default());
    assert_eq!(g.concurrent_pairs(), vec![("B", "C")]);
    assert!(g.is_concurrent("C", "B"));
    assert!(!g.is_concurrent("A", "B"));
  }

  #[test]
  fn two_loops_are_not_concurrency() {
    let g = mine(
      &Succession::from_log(&fixtures::log(&[(&["A", "B", "A", "C"], 3)])),
      &HeuristicParams::default(),
    );
    assert!(g.concurrent_pairs().is_empty());
  }

  #[test]
  fn threshold_filters_weak_edges() {
    let g = mine(&Succession::from_log(&fixtures::abc()), &HeuristicParams::default());
    assert!(g.has_edge("A", "B"));
    assert!(g.has_edge("A", "C"));
    assert!(!g.has_edge("B", "C"));
    assert!(!g.has_edge("C", "B"));
    assert!(close(g.edge("A", "B").unwrap().dependency.unwrap(), 5.0 / 6.0));
  }

  #[test]
  fn min_frequency_drops_rare_edges() {
    let params = HeuristicParams {
      min_frequency: 3,
      dependency_threshold: 0.5,
    };
    let g = mine(&Succession::from_log(&fixtures::abc()), &params);
    assert!(g.has_edge("A", "B"));
    assert!(!g.has_edge("A", "C"));
  }

  #[test]
  fn self_loop_score_and_annotation() {
    let g = mine(
      &Succession::from_log(&fixtures::log(&[(&["A", "A", "B"], 3)])),
      &HeuristicParams::default(),
    );
    let aa = g.edge("A", "A").unwrap();
    assert!(close(aa.dependency.unwrap(), 0.75));
    assert!(aa.annotations.contains(&Annotation::SelfLoop));
  }

  #[test]
  fn two_loops_survive_the_dependency_test() {
    let log = fixtures::log(&[(&["A", "B", "A", "C"], 3)]);
    let m = DependencyMatrix::from_log(&log);
    // |A>B| = |B>A| = 3, so the dependency is zero, but the window A B A repeats.
    assert!(close(m.dependency("A", "B").unwrap(), 0.0));
    assert!(close(m.two_loop("A", "B").unwrap(), 0.75));
    let g = mine(m.succession(), &HeuristicParams::default());
    assert!(g.edge("A", "B").unwrap().annotations.contains(&Annotation::TwoLoop));
    assert!(g.edge("B", "A").unwrap().annotations.contains(&Annotation::TwoLoop));
  }
}
