//! Engine facade: one validated config driving metrics, discovery and insights.

use serde::Serialize;

use crate::config::Config;
use crate::error::EngineError;
use crate::graph::{GraphExport, ProcessGraph};
use crate::insights::{self, ElementSummary, Insight, InsightDetector};
use crate::log::EventLog;
use crate::metrics::{Metrics, MetricsEngine};
use crate::miners::Miner;
use crate::types::{ColumnRoles, Table};
use crate::vectorizer::{CountMatrix, CountVectorizer};

/// Holds no state between calls; every method is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct Engine {
  config: Config,
  miner: Miner,
  detector: InsightDetector,
}

/// Full pass over one log.
#[derive(Debug, Clone)]
pub struct Analysis {
  pub metrics: Metrics,
  pub graph: ProcessGraph,
  pub insights: Vec<Insight>,
  /// `graph` with outlier annotations.
  pub annotated: ProcessGraph,
  pub summary: Vec<ElementSummary>,
}

/// JSON shape of an `Analysis`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport<'a> {
  pub metrics: &'a Metrics,
  pub graph: GraphExport,
  pub insights: &'a [Insight],
  pub summary: &'a [ElementSummary],
}

impl Analysis {
  pub fn report(&self) -> AnalysisReport<'_> {
    AnalysisReport {
      metrics: &self.metrics,
      graph: self.annotated.export(),
      insights: &self.insights,
      summary: &self.summary,
    }
  }

  pub fn to_json(&self) -> Result<String, EngineError> {
    Ok(serde_json::to_string(&self.report())?)
  }
}

impl Engine {
  pub fn new(config: Config) -> Result<Self, EngineError> {
    let miner = Miner::from_config(&config)?;
    let detector = InsightDetector::new(config.outlier_rule, config.insight_metrics.clone())?;
    Ok(Self {
      config,
      miner,
      detector,
    })
  }

  pub fn with_defaults() -> Self {
    Self {
      config: Config::default(),
      miner: Miner::default(),
      detector: InsightDetector::default(),
    }
  }

  pub fn from_json(json: &str) -> Result<Self, EngineError> {
    Self::new(Config::from_json(json)?)
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn load(&self, table: &Table, roles: &ColumnRoles) -> Result<EventLog, EngineError> {
    EventLog::from_table(table, roles)
  }

  pub fn metrics(&self, log: &EventLog) -> Result<Metrics, EngineError> {
    MetricsEngine::from_config(&self.config).compute(log)
  }

  pub fn discover(&self, log: &EventLog) -> Result<ProcessGraph, EngineError> {
    self.miner.discover(log)
  }

  pub fn insights(&self, graph: &ProcessGraph, metrics: &Metrics) -> Vec<Insight> {
    self.detector.detect(graph, metrics)
  }

  pub fn vectorize(&self, log: &EventLog, binary: bool) -> Result<CountMatrix, EngineError> {
    CountVectorizer::new(binary).transform(log)
  }

  /// Metrics and discovery run side by side, then insights over both.
  pub fn analyze(&self, log: &EventLog) -> Result<Analysis, EngineError> {
    let (metrics, graph) = rayon::join(|| self.metrics(log), || self.discover(log));
    let (metrics, graph) = (metrics?, graph?);
    let insights = self.insights(&graph, &metrics);
    let annotated = insights::annotate(&graph, &insights);
    let summary = insights::summarize(&insights);
    tracing::info!(
      algorithm = %self.miner.algorithm(),
      cases = log.case_count(),
      insights = insights.len(),
      "analysis complete"
    );
    Ok(Analysis {
      metrics,
      graph,
      insights,
      annotated,
      summary,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Algorithm;
  use crate::types::Event;

  fn table() -> Table {
    let mut t = Table::new(["case", "activity", "ts", "user"]);
    for (case, act, ts, user) in [
      ("1", "Register", "2025-01-15T10:00:00Z", "ann"),
      ("1", "Approve", "2025-01-15T11:00:00Z", "bob"),
      ("1", "Pay", "2025-01-15T12:30:00Z", "ann"),
      ("2", "Register", "2025-01-16T09:00:00Z", "ann"),
      ("2", "Reject", "2025-01-16T09:20:00Z", "bob"),
    ] {
      t.push_row([case, act, ts, user]);
    }
    t
  }

  fn roles() -> ColumnRoles {
    ColumnRoles::new("case", "activity", "ts").with_user("user")
  }

  #[test]
  fn analyze_end_to_end() {
    let engine = Engine::with_defaults();
    let log = engine.load(&table(), &roles()).unwrap();
    let analysis = engine.analyze(&log).unwrap();
    assert_eq!(analysis.metrics.ids.len(), 2);
    assert!(analysis.graph.has_edge("Register", "Approve"));
    assert_eq!(analysis.graph.algorithm(), Algorithm::Heuristic);
    let json = analysis.to_json().unwrap();
    assert!(json.contains("\"algorithm\":\"heuristic\""));
  }

  #[test]
  fn analyze_reports_empty_log() {
    let engine = Engine::with_defaults();
    let log = EventLog::from_events(Vec::<Event>::new()).unwrap();
    assert!(matches!(
      engine.analyze(&log).unwrap_err(),
      EngineError::EmptyLog { .. }
    ));
  }

  #[test]
  fn invalid_config_is_rejected_up_front() {
    let err = Engine::from_json(r#"{"dependency_threshold": 1.5}"#).unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig { .. }));
  }

  #[test]
  fn json_config_selects_algorithm() {
    let engine = Engine::from_json(r#"{"algorithm": "alpha"}"#).unwrap();
    let log = engine.load(&table(), &roles()).unwrap();
    assert_eq!(engine.discover(&log).unwrap().algorithm(), Algorithm::Alpha);
  }
}
