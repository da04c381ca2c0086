//! Process discovery: turn an event log into a `ProcessGraph`.
//!
//! Every miner shares two phases: direct-succession counting over the log and
//! the START/END edges derived from trace boundaries. They differ only in
//! which observed activity-to-activity successions they keep, so an edge is
//! never present unless the log shows it.

pub mod alpha;
pub mod causal;
pub mod heuristic;
pub mod simple;

use crate::config::{Algorithm, Config};
use crate::error::EngineError;
use crate::graph::{NodeId, ProcessGraph};
use crate::log::EventLog;
use crate::succession::Succession;

pub use alpha::{Footprint, LoopKind, Relation};
pub use causal::CausalParams;
pub use heuristic::{DependencyMatrix, DependencyRelation, HeuristicParams};

/// A configured discovery algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Miner {
  Simple,
  Heuristic(HeuristicParams),
  Causal(CausalParams),
  Alpha,
  AlphaPlus,
}

impl Default for Miner {
  fn default() -> Self {
    Self::Heuristic(HeuristicParams::default())
  }
}

impl Miner {
  /// Validate `config` and pick the algorithm it names.
  pub fn from_config(config: &Config) -> Result<Self, EngineError> {
    config.validate()?;
    let heuristic = HeuristicParams {
      min_frequency: config.min_frequency,
      dependency_threshold: config.dependency_threshold,
    };
    Ok(match config.algorithm {
      Algorithm::Simple => Self::Simple,
      Algorithm::Heuristic => Self::Heuristic(heuristic),
      Algorithm::Causal => Self::Causal(CausalParams {
        heuristic,
        causality_threshold: config.causality_threshold,
        and_threshold: config.and_threshold,
      }),
      Algorithm::Alpha => Self::Alpha,
      Algorithm::AlphaPlus => Self::AlphaPlus,
    })
  }

  pub fn algorithm(&self) -> Algorithm {
    match self {
      Self::Simple => Algorithm::Simple,
      Self::Heuristic(_) => Algorithm::Heuristic,
      Self::Causal(_) => Algorithm::Causal,
      Self::Alpha => Algorithm::Alpha,
      Self::AlphaPlus => Algorithm::AlphaPlus,
    }
  }

  pub fn discover(&self, log: &EventLog) -> Result<ProcessGraph, EngineError> {
    log.require_traces(&format!("{} discovery", self.algorithm()))?;
    let succession = Succession::from_log(log);

    let graph = match self {
      Self::Simple => simple::mine(&succession),
      Self::Heuristic(params) => heuristic::mine(&succession, params),
      Self::Causal(params) => causal::mine(&succession, params),
      Self::Alpha => alpha::mine(&succession),
      Self::AlphaPlus => alpha::mine_plus(log, &succession),
    }
    .finish();

    tracing::info!(
      algorithm = %self.algorithm(),
      cases = log.case_count(),
      activities = succession.activities().len(),
      edges = graph.edges().len(),
      places = graph.places().len(),
      "process graph discovered"
    );
    Ok(graph)
  }
}

/// Discover a graph with the algorithm and thresholds named by `config`.
pub fn discover(log: &EventLog, config: &Config) -> Result<ProcessGraph, EngineError> {
  Miner::from_config(config)?.discover(log)
}

/// Graph node of succession activity `idx`.
pub(crate) fn node(idx: usize) -> NodeId {
  ProcessGraph::FIRST_ACTIVITY_ID + idx
}

/// Empty graph over the log's activities with START/END edges weighted by case counts.
pub(crate) fn base_graph(algorithm: Algorithm, succession: &Succession) -> ProcessGraph {
  let mut graph = ProcessGraph::new(algorithm, succession.activities());
  for (a, n) in succession.starts() {
    graph.add_edge(ProcessGraph::START_ID, node(a), n);
  }
  for (a, n) in succession.ends() {
    graph.add_edge(node(a), ProcessGraph::END_ID, n);
  }
  graph
}

#[cfg(test)]
pub(crate) mod fixtures {
  use chrono::{TimeZone, Utc};

  use crate::log::EventLog;
  use crate::types::Event;

  /// One case per entry, repeated `n` times; events one minute apart.
  pub fn log(traces: &[(&[&str], usize)]) -> EventLog {
    let mut events = Vec::new();
    let mut case = 0;
    for (acts, n) in traces {
      for _ in 0..*n {
        case += 1;
        for (i, a) in acts.iter().enumerate() {
          events.push(Event::new(
            &format!("case-{case}"),
            a,
            Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
          ));
        }
      }
    }
    EventLog::from_events(events).unwrap()
  }

  pub fn abc() -> EventLog {
    log(&[(&["A", "B", "C"], 5), (&["A", "C", "B"], 2)])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{Event, END, START};

  #[test]
  fn empty_log_fails_for_every_algorithm() {
    let log = EventLog::from_events(Vec::<Event>::new()).unwrap();
    for algorithm in Algorithm::ALL {
      let config = Config {
        algorithm,
        ..Config::default()
      };
      let err = discover(&log, &config).unwrap_err();
      assert!(matches!(err, EngineError::EmptyLog { .. }), "{algorithm}");
    }
  }

  #[test]
  fn invalid_config_wins_over_empty_log() {
    let log = EventLog::from_events(Vec::<Event>::new()).unwrap();
    let config = Config {
      dependency_threshold: 1.5,
      ..Config::default()
    };
    let err = discover(&log, &config).unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig { .. }));
  }

  #[test]
  fn start_and_end_edges_carry_case_counts() {
    let log = fixtures::abc();
    for algorithm in Algorithm::ALL {
      let config = Config {
        algorithm,
        ..Config::default()
      };
      let g = discover(&log, &config).unwrap();
      assert_eq!(g.algorithm(), algorithm);
      assert_eq!(g.edge(START, "A").unwrap().frequency, 7);
      assert_eq!(g.edge("C", END).unwrap().frequency, 5);
      assert_eq!(g.edge("B", END).unwrap().frequency, 2);
    }
  }

  #[test]
  fn every_miner_is_a_subset_of_simple() {
    let log = fixtures::log(&[
      (&["A", "B", "C", "D"], 4),
      (&["A", "C", "B", "D"], 3),
      (&["A", "B", "B", "D"], 1),
      (&["A", "E", "A", "E", "D"], 2),
    ]);
    let simple = discover(
      &log,
      &Config {
        algorithm: Algorithm::Simple,
        ..Config::default()
      },
    )
    .unwrap()
    .edge_set();
    for algorithm in Algorithm::ALL {
      let config = Config {
        algorithm,
        ..Config::default()
      };
      let edges = discover(&log, &config).unwrap().edge_set();
      assert!(edges.is_subset(&simple), "{algorithm}");
    }
  }
}
