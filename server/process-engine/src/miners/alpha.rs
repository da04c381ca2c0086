//! Alpha and Alpha+ miners.
//!
//! The footprint classifies every ordered pair of activities from direct
//! succession. Places are maximal pairs of activity sets `(A, B)` where every
//! `a` causally precedes every `b` and each side is internally unrelated.
//! Alpha+ first removes length-one loops from the traces so they do not hide
//! causal structure, treats length-two loops as causal in both directions,
//! and reinserts the one-loop activities afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use super::{base_graph, node};
use crate::config::Algorithm;
use crate::graph::{Annotation, Place, ProcessGraph};
use crate::log::EventLog;
use crate::succession::Succession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
  /// a → b
  Follows,
  /// a ← b
  Precedes,
  /// a ‖ b
  Parallel,
  /// a # b
  Unrelated,
}

impl Relation {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Follows => "→",
      Self::Precedes => "←",
      Self::Parallel => "‖",
      Self::Unrelated => "#",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
  LengthOne,
  LengthTwo,
}

/// Footprint matrix over the log's activities.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
  activities: Vec<String>,
  index: HashMap<String, usize>,
  matrix: Vec<Relation>,
  loops: BTreeMap<(usize, usize), LoopKind>,
}

impl Footprint {
  /// Plain Alpha footprint.
  pub fn from_log(log: &EventLog) -> Self {
    Self::from_succession(&Succession::from_log(log))
  }

  /// Alpha+ footprint: one-loops reported as `→` on the diagonal, two-loop
  /// pairs as `→` both ways.
  pub fn from_log_plus(log: &EventLog) -> Self {
    PlusModel::new(log, &Succession::from_log(log)).full
  }

  pub(crate) fn from_succession(s: &Succession) -> Self {
    let n = s.activities().len();
    let mut fp = Self {
      activities: s.activities().to_vec(),
      index: s
        .activities()
        .iter()
        .enumerate()
        .map(|(i, a)| (a.clone(), i))
        .collect(),
      matrix: vec![Relation::Unrelated; n * n],
      loops: BTreeMap::new(),
    };
    for a in 0..n {
      for b in 0..n {
        fp.set(a, b, classify(s, a, b));
      }
    }
    fp
  }

  pub fn activities(&self) -> &[String] {
    &self.activities
  }

  pub fn relation(&self, a: &str, b: &str) -> Option<Relation> {
    Some(self.get(*self.index.get(a)?, *self.index.get(b)?))
  }

  pub fn loop_kind(&self, a: &str, b: &str) -> Option<LoopKind> {
    let key = (*self.index.get(a)?, *self.index.get(b)?);
    self.loops.get(&key).copied()
  }

  /// Rows of relation symbols, in activity order.
  pub fn symbols(&self) -> Vec<Vec<&'static str>> {
    let n = self.activities.len();
    (0..n)
      .map(|a| (0..n).map(|b| self.get(a, b).symbol()).collect())
      .collect()
  }

  fn get(&self, a: usize, b: usize) -> Relation {
    self.matrix[a * self.activities.len() + b]
  }

  fn set(&mut self, a: usize, b: usize, relation: Relation) {
    let n = self.activities.len();
    self.matrix[a * n + b] = relation;
  }

  fn causal(&self, a: usize, b: usize) -> bool {
    self.get(a, b) == Relation::Follows
  }

  fn unrelated(&self, a: usize, b: usize) -> bool {
    self.get(a, b) == Relation::Unrelated
  }
}

fn classify(s: &Succession, a: usize, b: usize) -> Relation {
  match (s.follows(a, b), s.follows(b, a)) {
    (true, true) => Relation::Parallel,
    (true, false) => Relation::Follows,
    (false, true) => Relation::Precedes,
    (false, false) => Relation::Unrelated,
  }
}

type Candidate = (BTreeSet<usize>, BTreeSet<usize>);

/// Compatibility graph for place search. Vertex `2a` is activity `a` as a
/// place input, `2a + 1` the same activity as an output. Inputs pair up when
/// unrelated, outputs likewise, and an input meets an output when it causally
/// precedes it. Only activities unrelated to themselves take part.
struct PlaceGraph {
  adjacent: Vec<Vec<bool>>,
  vertices: Vec<usize>,
}

impl PlaceGraph {
  fn new(fp: &Footprint) -> Self {
    let n = fp.activities.len();
    let vertices: Vec<usize> = (0..n)
      .filter(|&a| fp.unrelated(a, a))
      .flat_map(|a| [2 * a, 2 * a + 1])
      .collect();
    let mut adjacent = vec![vec![false; 2 * n]; 2 * n];
    for &u in &vertices {
      for &v in &vertices {
        let (a, b) = (u / 2, v / 2);
        adjacent[u][v] = match (u % 2, v % 2) {
          _ if u == v => false,
          (0, 0) | (1, 1) => fp.unrelated(a, b),
          (0, 1) => fp.causal(a, b),
          _ => fp.causal(b, a),
        };
      }
    }
    Self { adjacent, vertices }
  }

  fn neighbours<'a>(&'a self, v: usize, of: &'a [usize]) -> impl Iterator<Item = usize> + 'a {
    of.iter().copied().filter(move |&u| self.adjacent[v][u])
  }

  /// Bron–Kerbosch with pivoting; pushes every maximal clique extending `clique`.
  fn expand(
    &self,
    clique: &mut Vec<usize>,
    mut p: Vec<usize>,
    mut x: Vec<usize>,
    out: &mut Vec<Vec<usize>>,
  ) {
    let Some(pivot) = p
      .iter()
      .chain(&x)
      .copied()
      .max_by_key(|&u| self.neighbours(u, &p).count())
    else {
      out.push(clique.clone());
      return;
    };
    let branches: Vec<usize> = p.iter().copied().filter(|&v| !self.adjacent[pivot][v]).collect();
    for v in branches {
      clique.push(v);
      let np = self.neighbours(v, &p).collect();
      let nx = self.neighbours(v, &x).collect();
      self.expand(clique, np, nx, out);
      clique.pop();
      p.retain(|&u| u != v);
      x.push(v);
    }
  }
}

/// Maximal places: maximal cliques of the compatibility graph holding at least
/// one input and one output. Each vertex roots its own search over later
/// neighbours, so the roots run independently in parallel.
fn places(fp: &Footprint) -> Vec<Candidate> {
  let graph = PlaceGraph::new(fp);
  let order = &graph.vertices;
  let found: BTreeSet<Candidate> = (0..order.len())
    .into_par_iter()
    .flat_map_iter(|i| {
      let v = order[i];
      let p = graph.neighbours(v, &order[i + 1..]).collect();
      let x = graph.neighbours(v, &order[..i]).collect();
      let mut cliques = Vec::new();
      graph.expand(&mut vec![v], p, x, &mut cliques);
      cliques
    })
    .collect::<Vec<_>>()
    .into_iter()
    .filter_map(|clique| {
      let inputs: BTreeSet<usize> = clique.iter().filter(|&&v| v % 2 == 0).map(|&v| v / 2).collect();
      let outputs: BTreeSet<usize> = clique.iter().filter(|&&v| v % 2 == 1).map(|&v| v / 2).collect();
      (!inputs.is_empty() && !outputs.is_empty()).then_some((inputs, outputs))
    })
    .collect();
  found.into_iter().collect()
}

/// Add every place and the observed successions it implies.
fn connect(graph: &mut ProcessGraph, fp: &Footprint, observed: &Succession) -> usize {
  let found = places(fp);
  for (inputs, outputs) in &found {
    for &a in inputs {
      for &b in outputs {
        let n = observed.count(a, b);
        if n > 0 {
          graph.add_edge(node(a), node(b), n);
        }
      }
    }
    graph.add_place(Place {
      inputs: inputs.iter().map(|&i| fp.activities[i].clone()).collect(),
      outputs: outputs.iter().map(|&i| fp.activities[i].clone()).collect(),
    });
  }
  found.len()
}

pub(crate) fn mine(succession: &Succession) -> ProcessGraph {
  let fp = Footprint::from_succession(succession);
  let mut graph = base_graph(Algorithm::Alpha, succession);
  let places = connect(&mut graph, &fp, succession);
  tracing::debug!(places, edges = graph.edges().len(), "alpha places built");
  graph
}

/// Alpha+ preprocessing over one log.
struct PlusModel {
  /// Footprint of the log with one-loop activities removed, two-loops marked causal.
  reduced: Footprint,
  reduced_succession: Succession,
  /// Footprint reported to callers.
  full: Footprint,
  one_loops: Vec<usize>,
  two_loops: Vec<(usize, usize)>,
}

impl PlusModel {
  fn new(log: &EventLog, succession: &Succession) -> Self {
    let n = succession.activities().len();
    let one_loops: Vec<usize> = (0..n).filter(|&a| succession.follows(a, a)).collect();
    let dropped: BTreeSet<usize> = one_loops.iter().copied().collect();

    let sequences: Vec<Vec<usize>> = log
      .par_traces()
      .map(|t| {
        t.activities()
          .filter_map(|a| succession.index_of(a))
          .filter(|i| !dropped.contains(i))
          .collect()
      })
      .collect();
    let reduced_succession = Succession::from_sequences(succession.activities().to_vec(), &sequences);
    let mut reduced = Footprint::from_succession(&reduced_succession);

    let mut two_loops = Vec::new();
    for a in 0..n {
      for b in a + 1..n {
        if reduced_succession.two_loop_count(a, b) > 0 || reduced_succession.two_loop_count(b, a) > 0 {
          two_loops.push((a, b));
          reduced.set(a, b, Relation::Follows);
          reduced.set(b, a, Relation::Follows);
          reduced.loops.insert((a, b), LoopKind::LengthTwo);
          reduced.loops.insert((b, a), LoopKind::LengthTwo);
        }
      }
    }

    let mut full = reduced.clone();
    for &x in &one_loops {
      for y in 0..n {
        full.set(x, y, classify(succession, x, y));
        full.set(y, x, classify(succession, y, x));
      }
      full.set(x, x, Relation::Follows);
      full.loops.insert((x, x), LoopKind::LengthOne);
    }

    Self {
      reduced,
      reduced_succession,
      full,
      one_loops,
      two_loops,
    }
  }
}

pub(crate) fn mine_plus(log: &EventLog, succession: &Succession) -> ProcessGraph {
  let model = PlusModel::new(log, succession);
  let mut graph = base_graph(Algorithm::AlphaPlus, succession);
  let places = connect(&mut graph, &model.reduced, succession);

  for &(a, b) in &model.two_loops {
    for (s, t) in [(a, b), (b, a)] {
      graph.annotate_edge(node(s), node(t), Annotation::TwoLoop);
    }
  }

  for &x in &model.one_loops {
    for y in 0..succession.activities().len() {
      let into = succession.count(y, x);
      if into > 0 {
        graph.add_edge(node(y), node(x), into);
      }
      let out = succession.count(x, y);
      if out > 0 {
        graph.add_edge(node(x), node(y), out);
      }
    }
    graph.annotate_edge(node(x), node(x), Annotation::SelfLoop);
  }

  tracing::debug!(
    places,
    one_loops = model.one_loops.len(),
    two_loops = model.two_loops.len(),
    reduced_pairs = model.reduced_succession.pairs().count(),
    "alpha+ places built"
  );
  graph
}
