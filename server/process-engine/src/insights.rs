//! Insight detection: flag graph elements whose metric values stand out from
//! their peers.
//!
//! Populations are the graph's activity nodes (activity metrics) or its
//! activity-to-activity edges (transition metrics). Elements missing from the
//! metrics tables count as zero. The detector never mutates its inputs;
//! `annotate` hands back a marked copy of the graph.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::OutlierRule;
use crate::error::EngineError;
use crate::graph::{Annotation, ProcessGraph};
use crate::metrics::Metrics;
use crate::stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightMetric {
  ActivityFrequency,
  ActivityMeanDuration,
  ActivityCycles,
  ActivityUsers,
  TransitionFrequency,
  TransitionMeanDuration,
  TransitionCycles,
}

impl InsightMetric {
  pub const ALL: [InsightMetric; 7] = [
    Self::ActivityFrequency,
    Self::ActivityMeanDuration,
    Self::ActivityCycles,
    Self::ActivityUsers,
    Self::TransitionFrequency,
    Self::TransitionMeanDuration,
    Self::TransitionCycles,
  ];

  pub const DEFAULTS: [InsightMetric; 4] = [
    Self::ActivityFrequency,
    Self::ActivityMeanDuration,
    Self::TransitionFrequency,
    Self::TransitionMeanDuration,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::ActivityFrequency => "activity_frequency",
      Self::ActivityMeanDuration => "activity_mean_duration",
      Self::ActivityCycles => "activity_cycles",
      Self::ActivityUsers => "activity_users",
      Self::TransitionFrequency => "transition_frequency",
      Self::TransitionMeanDuration => "transition_mean_duration",
      Self::TransitionCycles => "transition_cycles",
    }
  }

  pub fn is_transition(self) -> bool {
    matches!(
      self,
      Self::TransitionFrequency | Self::TransitionMeanDuration | Self::TransitionCycles
    )
  }

  fn activity_value(self, metrics: &Metrics, activity: &str) -> f64 {
    let Some(row) = metrics.activities.get(activity) else {
      return 0.0;
    };
    match self {
      Self::ActivityFrequency => row.count as f64,
      Self::ActivityMeanDuration => row.duration.mean,
      Self::ActivityCycles => row.cycle_count as f64,
      Self::ActivityUsers => row.unique_users as f64,
      _ => 0.0,
    }
  }

  fn transition_value(self, metrics: &Metrics, source: &str, target: &str) -> f64 {
    let Some(row) = metrics.transitions.between(source, target) else {
      return 0.0;
    };
    match self {
      Self::TransitionFrequency => row.count as f64,
      Self::TransitionMeanDuration => row.duration.mean,
      Self::TransitionCycles => row.cycle_count as f64,
      _ => 0.0,
    }
  }
}

impl fmt::Display for InsightMetric {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for InsightMetric {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let key = s.trim().to_ascii_lowercase();
    Self::ALL
      .into_iter()
      .find(|m| m.as_str() == key)
      .ok_or_else(|| EngineError::invalid("insight_metrics", format!("unknown metric '{}'", s)))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Deviation {
  High,
  Low,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphElement {
  Node { name: String },
  Edge { source: String, target: String },
}

impl fmt::Display for GraphElement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Node { name } => f.write_str(name),
      Self::Edge { source, target } => write!(f, "{} -> {}", source, target),
    }
  }
}

/// One evaluated (metric, element) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
  pub element: GraphElement,
  pub metric: InsightMetric,
  pub value: f64,
  pub outlier: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub deviation: Option<Deviation>,
  /// Standard score of `value` within its population (0 when there is no spread).
  pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  /// Flagged mostly low.
  Good,
  Neutral,
  /// Flagged mostly high.
  Bad,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSummary {
  pub element: GraphElement,
  pub high: usize,
  pub low: usize,
  pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsightDetector {
  rule: OutlierRule,
  metrics: Vec<InsightMetric>,
}

impl Default for InsightDetector {
  fn default() -> Self {
    Self {
      rule: OutlierRule::default(),
      metrics: InsightMetric::DEFAULTS.to_vec(),
    }
  }
}

impl InsightDetector {
  pub fn new(rule: OutlierRule, metrics: Vec<InsightMetric>) -> Result<Self, EngineError> {
    rule.validate()?;
    if metrics.is_empty() {
      return Err(EngineError::invalid(
        "insight_metrics",
        "at least one metric is required",
      ));
    }
    Ok(Self { rule, metrics })
  }

  pub fn rule(&self) -> &OutlierRule {
    &self.rule
  }

  /// Evaluate every configured metric over its population, in metric then element order.
  pub fn detect(&self, graph: &ProcessGraph, metrics: &Metrics) -> Vec<Insight> {
    let nodes: Vec<GraphElement> = graph
      .activity_nodes()
      .map(|n| GraphElement::Node {
        name: n.name.clone(),
      })
      .collect();
    let edges: Vec<GraphElement> = graph
      .activity_edges()
      .map(|e| GraphElement::Edge {
        source: graph.name(e.source).to_string(),
        target: graph.name(e.target).to_string(),
      })
      .collect();

    let mut out = Vec::new();
    for &metric in &self.metrics {
      let population = if metric.is_transition() { &edges } else { &nodes };
      let values: Vec<f64> = population
        .iter()
        .map(|el| match el {
          GraphElement::Node { name } => metric.activity_value(metrics, name),
          GraphElement::Edge { source, target } => metric.transition_value(metrics, source, target),
        })
        .collect();
      let scores = stats::z_scores(&values);
      let flags = self.flag(&values, &scores);
      for (((element, value), score), deviation) in
        population.iter().zip(values).zip(scores).zip(flags)
      {
        out.push(Insight {
          element: element.clone(),
          metric,
          value,
          outlier: deviation.is_some(),
          deviation,
          score,
        });
      }
    }

    tracing::info!(
      rule = ?self.rule,
      evaluated = out.len(),
      flagged = out.iter().filter(|i| i.outlier).count(),
      "insights detected"
    );
    out
  }

  fn flag(&self, values: &[f64], scores: &[f64]) -> Vec<Option<Deviation>> {
    let mut flags = vec![None; values.len()];
    if values.is_empty() {
      return flags;
    }
    match self.rule {
      OutlierRule::ZScore { threshold } => {
        for (flag, &z) in flags.iter_mut().zip(scores) {
          if z.abs() > threshold {
            *flag = Some(if z > 0.0 { Deviation::High } else { Deviation::Low });
          }
        }
      }
      OutlierRule::TopK { k } => {
        for i in ranked(values, true).into_iter().take(k) {
          flags[i] = Some(Deviation::High);
        }
      }
      OutlierRule::BottomK { k } => {
        for i in ranked(values, false).into_iter().take(k) {
          flags[i] = Some(Deviation::Low);
        }
      }
      OutlierRule::Quantile { low, high } => {
        let lo = stats::quantile(values, low);
        let hi = stats::quantile(values, high);
        for (flag, &v) in flags.iter_mut().zip(values) {
          if v < lo {
            *flag = Some(Deviation::Low);
          } else if v > hi {
            *flag = Some(Deviation::High);
          }
        }
      }
    }
    flags
  }
}

/// Indices ordered by value; ties keep element order.
fn ranked(values: &[f64], descending: bool) -> Vec<usize> {
  let mut idx: Vec<usize> = (0..values.len()).collect();
  idx.sort_by(|&a, &b| {
    let ord = values[a].total_cmp(&values[b]);
    if descending {
      ord.reverse()
    } else {
      ord
    }
  });
  idx
}

/// Fold the flags of each element into a verdict: more high flags than low is bad.
pub fn summarize(insights: &[Insight]) -> Vec<ElementSummary> {
  let mut tally: BTreeMap<&GraphElement, (usize, usize)> = BTreeMap::new();
  for insight in insights {
    let entry = tally.entry(&insight.element).or_insert((0, 0));
    match insight.deviation {
      Some(Deviation::High) => entry.0 += 1,
      Some(Deviation::Low) => entry.1 += 1,
      None => {}
    }
  }
  tally
    .into_iter()
    .map(|(element, (high, low))| ElementSummary {
      element: element.clone(),
      high,
      low,
      verdict: match high.cmp(&low) {
        std::cmp::Ordering::Greater => Verdict::Bad,
        std::cmp::Ordering::Less => Verdict::Good,
        std::cmp::Ordering::Equal => Verdict::Neutral,
      },
    })
    .collect()
}

/// Copy of `graph` with an `outlier` annotation on every flagged element.
pub fn annotate(graph: &ProcessGraph, insights: &[Insight]) -> ProcessGraph {
  let mut marked = graph.clone();
  for insight in insights.iter().filter(|i| i.outlier) {
    let Some(deviation) = insight.deviation else {
      continue;
    };
    let annotation = Annotation::Outlier {
      metric: insight.metric,
      deviation,
    };
    match &insight.element {
      GraphElement::Node { name } => {
        if let Some(id) = marked.node_id(name) {
          marked.annotate_node(id, annotation);
        }
      }
      GraphElement::Edge { source, target } => {
        if let (Some(s), Some(t)) = (marked.node_id(source), marked.node_id(target)) {
          marked.annotate_edge(s, t, annotation);
        }
      }
    }
  }
  marked
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{Algorithm, Config, TimeUnit};
  use crate::log::EventLog;
  use crate::metrics::MetricsEngine;
  use crate::miners;
  use crate::types::Event;
  use chrono::{TimeZone, Utc};

  /// A hub activity that every case visits many times, plus rarely used ones.
  fn setup() -> (ProcessGraph, Metrics) {
    let mut events = Vec::new();
    let traces: &[&[&str]] = &[
      &["A", "H", "B", "H", "C", "H", "D"],
      &["A", "H", "E", "H", "D"],
      &["A", "H", "F", "H", "D"],
      &["A", "H", "G", "H", "D"],
    ];
    for (c, acts) in traces.iter().enumerate() {
      for (i, a) in acts.iter().enumerate() {
        events.push(Event::new(
          &format!("c{c}"),
          a,
          Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
        ));
      }
    }
    let log = EventLog::from_events(events).unwrap();
    let config = Config {
      algorithm: Algorithm::Simple,
      ..Config::default()
    };
    let graph = miners::discover(&log, &config).unwrap();
    let metrics = MetricsEngine::new(TimeUnit::Minute, None).compute(&log).unwrap();
    (graph, metrics)
  }

  fn flagged(insights: &[Insight]) -> Vec<String> {
    insights
      .iter()
      .filter(|i| i.outlier)
      .map(|i| i.element.to_string())
      .collect()
  }

  #[test]
  fn zscore_flags_the_hub() {
    let (graph, metrics) = setup();
    let detector = InsightDetector::new(
      OutlierRule::ZScore { threshold: 2.0 },
      vec![InsightMetric::ActivityFrequency],
    )
    .unwrap();
    let insights = detector.detect(&graph, &metrics);
    assert_eq!(insights.len(), 8);
    assert_eq!(flagged(&insights), vec!["H"]);
    let hub = insights.iter().find(|i| i.outlier).unwrap();
    assert_eq!(hub.deviation, Some(Deviation::High));
    assert_eq!(hub.value, 9.0);
  }

  #[test]
  fn zero_spread_flags_nothing() {
    let (graph, metrics) = setup();
    let detector = InsightDetector::new(
      OutlierRule::ZScore { threshold: 0.5 },
      vec![InsightMetric::ActivityUsers],
    )
    .unwrap();
    assert!(flagged(&detector.detect(&graph, &metrics)).is_empty());
  }

  #[test]
  fn equal_fractional_gaps_are_not_outliers() {
    let steps = ["A", "B", "C", "D", "E", "F", "G", "Z"];
    let events = steps
      .iter()
      .enumerate()
      .map(|(i, a)| Event::new("c", a, Utc.timestamp_opt(1_700_000_000 + i as i64 * 6, 0).unwrap()))
      .collect::<Vec<_>>();
    let log = EventLog::from_events(events).unwrap();
    let config = Config {
      algorithm: Algorithm::Simple,
      ..Config::default()
    };
    let graph = miners::discover(&log, &config).unwrap();
    let metrics = MetricsEngine::new(TimeUnit::Minute, None).compute(&log).unwrap();
    let insights = InsightDetector::new(
      OutlierRule::ZScore { threshold: 0.5 },
      vec![InsightMetric::TransitionMeanDuration],
    )
    .unwrap()
    .detect(&graph, &metrics);
    assert_eq!(insights.len(), 7);
    assert!((insights[0].value - 0.1).abs() < 1e-12);
    assert!(flagged(&insights).is_empty());
    assert!(insights.iter().all(|i| i.score == 0.0));
  }

  #[test]
  fn top_and_bottom_k() {
    let (graph, metrics) = setup();
    let top = InsightDetector::new(OutlierRule::TopK { k: 2 }, vec![InsightMetric::ActivityFrequency])
      .unwrap()
      .detect(&graph, &metrics);
    // H (9), then A and D tie at 4; A wins on element order.
    assert_eq!(flagged(&top), vec!["A", "H"]);

    let bottom =
      InsightDetector::new(OutlierRule::BottomK { k: 1 }, vec![InsightMetric::ActivityFrequency])
        .unwrap()
        .detect(&graph, &metrics);
    assert_eq!(flagged(&bottom), vec!["B"]);
    assert!(bottom.iter().filter(|i| i.outlier).all(|i| i.deviation == Some(Deviation::Low)));
  }

  #[test]
  fn quantile_rule_flags_both_tails() {
    let (graph, metrics) = setup();
    let insights = InsightDetector::new(
      OutlierRule::Quantile {
        low: 0.1,
        high: 0.85,
      },
      vec![InsightMetric::TransitionFrequency],
    )
    .unwrap()
    .detect(&graph, &metrics);
    let high: Vec<String> = insights
      .iter()
      .filter(|i| i.deviation == Some(Deviation::High))
      .map(|i| i.element.to_string())
      .collect();
    assert!(high.contains(&"A -> H".to_string()));
    assert!(high.contains(&"H -> D".to_string()));
  }

  #[test]
  fn detection_is_stable() {
    let (graph, metrics) = setup();
    let detector = InsightDetector::new(OutlierRule::default(), InsightMetric::DEFAULTS.to_vec()).unwrap();
    assert_eq!(detector.detect(&graph, &metrics), detector.detect(&graph, &metrics));
  }

  #[test]
  fn summary_verdicts() {
    let node = |n: &str| GraphElement::Node { name: n.into() };
    let insight = |el: GraphElement, d: Option<Deviation>| Insight {
      element: el,
      metric: InsightMetric::ActivityFrequency,
      value: 0.0,
      outlier: d.is_some(),
      deviation: d,
      score: 0.0,
    };
    let summary = summarize(&[
      insight(node("A"), Some(Deviation::High)),
      insight(node("A"), Some(Deviation::High)),
      insight(node("B"), Some(Deviation::Low)),
      insight(node("C"), Some(Deviation::High)),
      insight(node("C"), Some(Deviation::Low)),
      insight(node("D"), None),
    ]);
    let verdicts: Vec<Verdict> = summary.iter().map(|s| s.verdict).collect();
    assert_eq!(
      verdicts,
      vec![Verdict::Bad, Verdict::Good, Verdict::Neutral, Verdict::Neutral]
    );
  }

  #[test]
  fn annotate_marks_a_copy() {
    let (graph, metrics) = setup();
    let detector = InsightDetector::new(
      OutlierRule::ZScore { threshold: 2.0 },
      vec![InsightMetric::ActivityFrequency],
    )
    .unwrap();
    let insights = detector.detect(&graph, &metrics);
    let marked = annotate(&graph, &insights);
    let h = marked.node_id("H").unwrap();
    assert!(marked.node(h).annotations.contains(&Annotation::Outlier {
      metric: InsightMetric::ActivityFrequency,
      deviation: Deviation::High,
    }));
    assert!(graph.node(h).annotations.is_empty());
  }

  #[test]
  fn metric_names_parse() {
    assert_eq!(
      "Transition_Frequency".parse::<InsightMetric>().unwrap(),
      InsightMetric::TransitionFrequency
    );
    assert!(matches!(
      "latency".parse::<InsightMetric>(),
      Err(EngineError::InvalidConfig { .. })
    ));
  }

  #[test]
  fn empty_metric_list_is_rejected() {
    assert!(InsightDetector::new(OutlierRule::default(), Vec::new()).is_err());
  }
}
