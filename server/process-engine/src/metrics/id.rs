//! ID table: one row per case.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use super::{cycle_percent, MetricTable};
use crate::config::TimeUnit;
use crate::log::{EventLog, Trace};

/// One row per case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdMetrics {
  pub case_id: String,
  pub trace_id: String,
  pub activities: Vec<String>,
  pub length: usize,
  pub unique_activities: usize,
  pub cycle_percent: f64,
  pub unique_users: usize,
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
  pub duration: f64,
}

impl IdMetrics {
  fn from_trace(trace: Trace<'_>, unit: TimeUnit) -> Option<Self> {
    let start = trace.start()?;
    let end = trace.end()?;
    let signature = trace.signature();
    let unique_activities = trace.activities().collect::<BTreeSet<_>>().len();
    let unique_users = trace
      .events()
      .iter()
      .filter_map(|e| e.user.as_deref())
      .collect::<BTreeSet<_>>()
      .len();
    Some(Self {
      case_id: trace.case_id().to_string(),
      trace_id: signature.id(),
      length: trace.len(),
      unique_activities,
      cycle_percent: cycle_percent(unique_activities, trace.len()),
      unique_users,
      start,
      end,
      duration: unit.from_seconds(trace.duration_seconds()),
      activities: signature.0,
    })
  }
}

pub(crate) fn compute(log: &EventLog, unit: TimeUnit) -> MetricTable<String, IdMetrics> {
  let rows: Vec<IdMetrics> = log
    .par_traces()
    .filter_map(|t| IdMetrics::from_trace(t, unit))
    .collect();
  rows.into_iter().map(|r| (r.case_id.clone(), r)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::metrics::fixtures::{at, sample};

  #[test]
  fn case_row() {
    let ids = compute(&sample(), TimeUnit::Minute);
    let c2 = ids.get("c2").unwrap();
    assert_eq!(c2.activities, vec!["A", "C", "B"]);
    assert_eq!(c2.length, 3);
    assert_eq!(c2.unique_users, 2);
    assert_eq!(c2.start, at(0));
    assert_eq!(c2.end, at(65));
    assert_eq!(c2.duration, 65.0);
    assert_eq!(c2.cycle_percent, 0.0);
  }

  #[test]
  fn repeated_activity_raises_cycle_percent() {
    let ids = compute(&sample(), TimeUnit::Minute);
    let c3 = ids.get("c3").unwrap();
    assert_eq!(c3.unique_activities, 2);
    assert!((c3.cycle_percent - 100.0 / 3.0).abs() < 1e-9);
  }

  #[test]
  fn end_timestamps_extend_the_case() {
    use crate::types::Event;
    let log = EventLog::from_events(vec![
      Event::new("1", "A", at(0)),
      Event::new("1", "B", at(10)).with_end(at(25)),
    ])
    .unwrap();
    let ids = compute(&log, TimeUnit::Minute);
    let row = ids.get("1").unwrap();
    assert_eq!(row.end, at(25));
    assert_eq!(row.duration, 25.0);
  }

  #[test]
  fn rows_are_keyed_by_case_id() {
    let ids = compute(&sample(), TimeUnit::Second);
    let keys: Vec<&String> = ids.keys().collect();
    assert_eq!(keys, vec!["c1", "c2", "c3"]);
  }
}
