//! Trace table: cases grouped by their activity sequence.

use std::collections::BTreeSet;

use serde::Serialize;

use super::{cycle_percent, MetricTable};
use crate::config::TimeUnit;
use crate::log::EventLog;
use crate::stats::DurationStats;
use crate::types::TraceSignature;

/// One row per distinct activity sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceMetrics {
  pub signature: TraceSignature,
  pub id: String,
  pub case_ids: Vec<String>,
  pub count: usize,
  pub length: usize,
  pub unique_activities: usize,
  pub cycle_percent: f64,
  /// Distinct users over every case sharing the sequence.
  pub unique_users: usize,
  /// Statistics of the case durations.
  pub duration: DurationStats,
}

pub(crate) fn compute(log: &EventLog, unit: TimeUnit) -> MetricTable<TraceSignature, TraceMetrics> {
  log
    .unique_traces()
    .into_iter()
    .map(|(signature, unique)| {
      let mut users = BTreeSet::new();
      let mut durations = Vec::with_capacity(unique.case_ids.len());
      for case_id in &unique.case_ids {
        if let Some(trace) = log.case(case_id) {
          durations.push(unit.from_seconds(trace.duration_seconds()));
          users.extend(trace.events().iter().filter_map(|e| e.user.as_deref()));
        }
      }
      let unique_activities = signature.activities().iter().collect::<BTreeSet<_>>().len();
      let row = TraceMetrics {
        id: unique.id,
        count: unique.count,
        length: signature.len(),
        unique_activities,
        cycle_percent: cycle_percent(unique_activities, signature.len()),
        unique_users: users.len(),
        duration: DurationStats::from_values(&durations),
        case_ids: unique.case_ids,
        signature: signature.clone(),
      };
      (signature, row)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::metrics::fixtures::log;

  #[test]
  fn groups_cases_by_sequence() {
    let log = log(&[
      ("1", &[("A", 0, "u"), ("B", 10, "u")]),
      ("2", &[("A", 0, "v"), ("B", 30, "u")]),
      ("3", &[("A", 0, "u"), ("C", 5, "u")]),
    ]);
    let traces = compute(&log, TimeUnit::Minute);
    assert_eq!(traces.len(), 2);

    let ab = traces
      .get(&TraceSignature(vec!["A".into(), "B".into()]))
      .unwrap();
    assert_eq!(ab.count, 2);
    assert_eq!(ab.case_ids, vec!["1", "2"]);
    assert_eq!(ab.unique_users, 2);
    assert_eq!(ab.duration.mean, 20.0);
    assert_eq!(ab.duration.min, 10.0);
    assert_eq!(ab.duration.max, 30.0);
    assert!(ab.id.starts_with("trace-"));
  }
}
