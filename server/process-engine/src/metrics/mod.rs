//! Metrics engine: pure aggregation over an event log into five keyed tables.
//!
//! - ID: one row per case.
//! - Trace: one row per unique activity sequence.
//! - Activity, Transition, User: one row per entity.
//!
//! Durations are reported in the engine's `TimeUnit`. An activity occurrence
//! lasts until the next event of its case; the final event of a case has no
//! measurable duration.

pub mod activity;
pub mod cycle;
pub mod id;
pub mod trace;
pub mod transition;
pub mod user;

use std::borrow::Borrow;
use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::config::{Config, TimeUnit};
use crate::error::EngineError;
use crate::log::{seconds_between, EventLog, Trace};
use crate::types::{Event, TraceSignature};

pub use activity::{ActivityMetrics, PositionStats};
pub use cycle::CycleCounts;
pub use id::IdMetrics;
pub use trace::TraceMetrics;
pub use transition::TransitionMetrics;
pub use user::UserMetrics;

// ---------------------------------------------------------------------------
// Keyed table
// ---------------------------------------------------------------------------

/// Ordered mapping from entity key to its metric row. Serializes as a list of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricTable<K: Ord, R> {
  rows: BTreeMap<K, R>,
}

impl<K: Ord, R> MetricTable<K, R> {
  pub fn get<Q>(&self, key: &Q) -> Option<&R>
  where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
  {
    self.rows.get(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&K, &R)> {
    self.rows.iter()
  }

  pub fn keys(&self) -> impl Iterator<Item = &K> {
    self.rows.keys()
  }

  pub fn values(&self) -> impl Iterator<Item = &R> {
    self.rows.values()
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }
}

impl<K: Ord, R> Default for MetricTable<K, R> {
  fn default() -> Self {
    Self {
      rows: BTreeMap::new(),
    }
  }
}

impl<K: Ord, R> FromIterator<(K, R)> for MetricTable<K, R> {
  fn from_iter<I: IntoIterator<Item = (K, R)>>(iter: I) -> Self {
    Self {
      rows: iter.into_iter().collect(),
    }
  }
}

impl<K: Ord, R: Serialize> Serialize for MetricTable<K, R> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(self.rows.values())
  }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// All five tables computed over one log snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
  pub time_unit: TimeUnit,
  pub ids: MetricTable<String, IdMetrics>,
  pub traces: MetricTable<TraceSignature, TraceMetrics>,
  pub activities: MetricTable<String, ActivityMetrics>,
  pub transitions: MetricTable<(String, String), TransitionMetrics>,
  /// Empty when the log carries no user column.
  pub users: MetricTable<String, UserMetrics>,
}

/// Stateless aggregator; safe to share across threads and call repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsEngine {
  time_unit: TimeUnit,
  cycle_length: Option<usize>,
}

impl Default for MetricsEngine {
  fn default() -> Self {
    Self::new(TimeUnit::Second, None)
  }
}

impl MetricsEngine {
  pub fn new(time_unit: TimeUnit, cycle_length: Option<usize>) -> Self {
    Self {
      time_unit,
      cycle_length,
    }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.time_unit, config.cycle_length)
  }

  pub fn time_unit(&self) -> TimeUnit {
    self.time_unit
  }

  pub fn compute(&self, log: &EventLog) -> Result<Metrics, EngineError> {
    log.require_traces("metrics")?;
    let cycles = cycle::find(log, self.cycle_length);

    let metrics = Metrics {
      time_unit: self.time_unit,
      ids: id::compute(log, self.time_unit),
      traces: trace::compute(log, self.time_unit),
      activities: activity::compute(log, self.time_unit, &cycles),
      transitions: transition::compute(log, self.time_unit, &cycles),
      users: user::compute(log, self.time_unit),
    };

    tracing::info!(
      cases = metrics.ids.len(),
      unique_traces = metrics.traces.len(),
      activities = metrics.activities.len(),
      transitions = metrics.transitions.len(),
      users = metrics.users.len(),
      "metrics computed"
    );
    Ok(metrics)
  }

  pub fn ids(&self, log: &EventLog) -> Result<MetricTable<String, IdMetrics>, EngineError> {
    log.require_traces("id metrics")?;
    Ok(id::compute(log, self.time_unit))
  }

  pub fn traces(
    &self,
    log: &EventLog,
  ) -> Result<MetricTable<TraceSignature, TraceMetrics>, EngineError> {
    log.require_traces("trace metrics")?;
    Ok(trace::compute(log, self.time_unit))
  }

  pub fn activities(
    &self,
    log: &EventLog,
  ) -> Result<MetricTable<String, ActivityMetrics>, EngineError> {
    log.require_traces("activity metrics")?;
    let cycles = cycle::find(log, self.cycle_length);
    Ok(activity::compute(log, self.time_unit, &cycles))
  }

  pub fn transitions(
    &self,
    log: &EventLog,
  ) -> Result<MetricTable<(String, String), TransitionMetrics>, EngineError> {
    log.require_traces("transition metrics")?;
    let cycles = cycle::find(log, self.cycle_length);
    Ok(transition::compute(log, self.time_unit, &cycles))
  }

  pub fn users(&self, log: &EventLog) -> Result<MetricTable<String, UserMetrics>, EngineError> {
    log.require_traces("user metrics")?;
    Ok(user::compute(log, self.time_unit))
  }

  pub fn cycles(&self, log: &EventLog) -> Result<CycleCounts, EngineError> {
    log.require_traces("cycle metrics")?;
    Ok(cycle::find(log, self.cycle_length))
  }
}

/// Duration of each event in a trace, in `unit`.
///
/// An explicit duration wins, then end minus start; otherwise the event lasts
/// until the next event of its case, and the final event has none.
pub(crate) fn step_durations(trace: &Trace<'_>, unit: TimeUnit) -> Vec<Option<f64>> {
  let events = trace.events();
  events
    .iter()
    .enumerate()
    .map(|(i, event)| {
      event
        .own_seconds()
        .or_else(|| {
          events
            .get(i + 1)
            .map(|next| seconds_between(event.timestamp, next.timestamp))
        })
        .map(|secs| unit.from_seconds(secs))
    })
    .collect()
}

/// Wait between two consecutive events, in `unit`: from the moment `from`
/// finishes to the start of `to`. Overlapping events report 0.
pub(crate) fn transition_gap(from: &Event, to: &Event, unit: TimeUnit) -> f64 {
  let gap = seconds_between(from.timestamp, to.timestamp) - from.own_seconds().unwrap_or(0.0);
  unit.from_seconds(gap.max(0.0))
}

/// Percent of repeated activity occurrences: (1 - unique / length) * 100.
pub(crate) fn cycle_percent(unique: usize, length: usize) -> f64 {
  if length == 0 {
    return 0.0;
  }
  (1.0 - unique as f64 / length as f64) * 100.0
}
