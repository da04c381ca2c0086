//! Process graph: an arena of nodes addressed by integer id and a flat edge list.
//!
//! Nodes never point at each other; adjacency is answered from the edge list
//! and the `(source, target)` index, which keeps the graph trivially `Clone`
//! and `Send`.

use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::Serialize;

use crate::config::Algorithm;
use crate::insights::{Deviation, InsightMetric};
use crate::types::{END, START};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  Start,
  End,
  Activity,
}

/// Structural or analytical marks on nodes and edges. Never new node types.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
  AndSplit,
  XorSplit,
  OrSplit,
  AndJoin,
  XorJoin,
  OrJoin,
  SelfLoop,
  TwoLoop,
  Outlier {
    metric: InsightMetric,
    deviation: Deviation,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
  pub id: NodeId,
  pub name: String,
  pub kind: NodeKind,
  pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
  pub source: NodeId,
  pub target: NodeId,
  /// Direct-succession count (or case count for START/END edges).
  pub frequency: u64,
  /// Heuristic dependency in [-1, 1].
  pub dependency: Option<f64>,
  /// Causal strength in [0, 1].
  pub causality: Option<f64>,
  pub annotations: Vec<Annotation>,
}

/// An Alpha place: every input activity is causally followed by every output activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Place {
  pub inputs: Vec<String>,
  pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessGraph {
  algorithm: Algorithm,
  nodes: Vec<Node>,
  node_index: HashMap<String, NodeId>,
  edges: Vec<Edge>,
  edge_index: HashMap<(NodeId, NodeId), usize>,
  places: Vec<Place>,
  /// Unordered activity pairs observed in both orders without either dominating.
  concurrent: BTreeSet<(NodeId, NodeId)>,
}

impl ProcessGraph {
  pub const START_ID: NodeId = 0;
  pub const END_ID: NodeId = 1;
  /// Activity `i` of the slice passed to `new` has id `FIRST_ACTIVITY_ID + i`.
  pub const FIRST_ACTIVITY_ID: NodeId = 2;

  /// Graph with START, END and one node per activity (ids follow the slice order).
  pub fn new(algorithm: Algorithm, activities: &[String]) -> Self {
    let mut graph = Self {
      algorithm,
      nodes: Vec::with_capacity(activities.len() + 2),
      node_index: HashMap::with_capacity(activities.len() + 2),
      edges: Vec::new(),
      edge_index: HashMap::new(),
      places: Vec::new(),
      concurrent: BTreeSet::new(),
    };
    graph.push_node(START, NodeKind::Start);
    graph.push_node(END, NodeKind::End);
    for activity in activities {
      graph.push_node(activity, NodeKind::Activity);
    }
    graph
  }

  fn push_node(&mut self, name: &str, kind: NodeKind) -> NodeId {
    let id = self.nodes.len();
    self.nodes.push(Node {
      id,
      name: name.to_string(),
      kind,
      annotations: Vec::new(),
    });
    self.node_index.insert(name.to_string(), id);
    id
  }

  pub fn algorithm(&self) -> Algorithm {
    self.algorithm
  }

  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  pub fn places(&self) -> &[Place] {
    &self.places
  }

  pub fn node(&self, id: NodeId) -> &Node {
    &self.nodes[id]
  }

  pub fn node_id(&self, name: &str) -> Option<NodeId> {
    self.node_index.get(name).copied()
  }

  pub fn name(&self, id: NodeId) -> &str {
    &self.nodes[id].name
  }

  /// Activity nodes only (no START/END).
  pub fn activity_nodes(&self) -> impl Iterator<Item = &Node> {
    self.nodes.iter().filter(|n| n.kind == NodeKind::Activity)
  }

  /// Edges whose both ends are activities.
  pub fn activity_edges(&self) -> impl Iterator<Item = &Edge> {
    self
      .edges
      .iter()
      .filter(move |e| self.is_activity(e.source) && self.is_activity(e.target))
  }

  fn is_activity(&self, id: NodeId) -> bool {
    self.nodes[id].kind == NodeKind::Activity
  }

  /// Insert an edge, or return the existing one for the same pair.
  pub fn add_edge(&mut self, source: NodeId, target: NodeId, frequency: u64) -> &mut Edge {
    let idx = match self.edge_index.get(&(source, target)) {
      Some(&idx) => idx,
      None => {
        self.edges.push(Edge {
          source,
          target,
          frequency,
          dependency: None,
          causality: None,
          annotations: Vec::new(),
        });
        let idx = self.edges.len() - 1;
        self.edge_index.insert((source, target), idx);
        idx
      }
    };
    &mut self.edges[idx]
  }

  pub fn add_place(&mut self, place: Place) {
    self.places.push(place);
  }

  pub fn mark_concurrent(&mut self, a: NodeId, b: NodeId) {
    self.concurrent.insert((a.min(b), a.max(b)));
  }

  /// Concurrent activity pairs by name, each pair once.
  pub fn concurrent_pairs(&self) -> Vec<(&str, &str)> {
    self
      .concurrent
      .iter()
      .map(|&(a, b)| (self.name(a), self.name(b)))
      .collect()
  }

  pub fn is_concurrent(&self, a: &str, b: &str) -> bool {
    match (self.node_id(a), self.node_id(b)) {
      (Some(a), Some(b)) => self.concurrent.contains(&(a.min(b), a.max(b))),
      _ => false,
    }
  }

  pub fn annotate_node(&mut self, id: NodeId, annotation: Annotation) {
    let node = &mut self.nodes[id];
    if !node.annotations.contains(&annotation) {
      node.annotations.push(annotation);
    }
  }

  pub fn annotate_edge(&mut self, source: NodeId, target: NodeId, annotation: Annotation) {
    if let Some(&idx) = self.edge_index.get(&(source, target)) {
      let edge = &mut self.edges[idx];
      if !edge.annotations.contains(&annotation) {
        edge.annotations.push(annotation);
      }
    }
  }

  pub fn edge(&self, source: &str, target: &str) -> Option<&Edge> {
    let s = self.node_id(source)?;
    let t = self.node_id(target)?;
    self.edge_index.get(&(s, t)).map(|&i| &self.edges[i])
  }

  pub fn has_edge(&self, source: &str, target: &str) -> bool {
    self.edge(source, target).is_some()
  }

  pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
    self.edges.iter().filter(move |e| e.source == id)
  }

  pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
    self.edges.iter().filter(move |e| e.target == id)
  }

  /// Every edge as a (source, target) name pair.
  pub fn edge_set(&self) -> BTreeSet<(String, String)> {
    self
      .edges
      .iter()
      .map(|e| (self.name(e.source).to_string(), self.name(e.target).to_string()))
      .collect()
  }

  /// Names of all nodes reachable from START (START included).
  pub fn reachable_from_start(&self) -> BTreeSet<String> {
    let mut seen = vec![false; self.nodes.len()];
    let mut queue = VecDeque::from([Self::START_ID]);
    seen[Self::START_ID] = true;
    while let Some(id) = queue.pop_front() {
      for edge in self.outgoing(id) {
        if !seen[edge.target] {
          seen[edge.target] = true;
          queue.push_back(edge.target);
        }
      }
    }
    self
      .nodes
      .iter()
      .filter(|n| seen[n.id])
      .map(|n| n.name.clone())
      .collect()
  }

  /// Order edges by (source id, target id) so output never depends on insertion order.
  pub fn finish(mut self) -> Self {
    self.edges.sort_by_key(|e| (e.source, e.target));
    self.edge_index = self
      .edges
      .iter()
      .enumerate()
      .map(|(i, e)| ((e.source, e.target), i))
      .collect();
    let reachable = self.reachable_from_start();
    for node in self.activity_nodes() {
      if !reachable.contains(&node.name) {
        tracing::warn!(
          algorithm = %self.algorithm,
          activity = %node.name,
          "activity not reachable from START after filtering"
        );
      }
    }
    self
  }

  /// Rendering-neutral node/edge lists keyed by name.
  pub fn export(&self) -> GraphExport {
    GraphExport {
      algorithm: self.algorithm,
      nodes: self
        .nodes
        .iter()
        .map(|n| NodeExport {
          name: n.name.clone(),
          kind: n.kind,
          annotations: n.annotations.clone(),
        })
        .collect(),
      edges: self
        .edges
        .iter()
        .map(|e| EdgeExport {
          source: self.name(e.source).to_string(),
          target: self.name(e.target).to_string(),
          frequency: e.frequency,
          dependency_score: e.dependency,
          causality_score: e.causality,
          annotations: e.annotations.clone(),
        })
        .collect(),
      places: self.places.clone(),
      concurrent: self
        .concurrent_pairs()
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect(),
    }
  }
}

// ---------------------------------------------------------------------------
// Output types (JSON contract for renderers)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GraphExport {
  pub algorithm: Algorithm,
  pub nodes: Vec<NodeExport>,
  pub edges: Vec<EdgeExport>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub places: Vec<Place>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub concurrent: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeExport {
  pub name: String,
  pub kind: NodeKind,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeExport {
  pub source: String,
  pub target: String,
  pub frequency: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub dependency_score: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub causality_score: Option<f64>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub annotations: Vec<Annotation>,
}
