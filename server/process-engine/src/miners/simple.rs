//! Directly-follows graph: every observed succession, weighted by frequency.

use super::{base_graph, node};
use crate::config::Algorithm;
use crate::graph::{Annotation, ProcessGraph};
use crate::succession::Succession;

pub(crate) fn mine(succession: &Succession) -> ProcessGraph {
  let mut graph = base_graph(Algorithm::Simple, succession);
  for ((a, b), n) in succession.pairs() {
    graph.add_edge(node(a), node(b), n);
    if a == b {
      graph.annotate_edge(node(a), node(b), Annotation::SelfLoop);
    }
  }
  tracing::debug!(edges = graph.edges().len(), "simple graph built");
  graph
}
