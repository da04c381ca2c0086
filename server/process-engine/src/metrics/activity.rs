//! Activity table: frequency, cycles, durations and positions per activity.

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use super::cycle::CycleCounts;
use super::{step_durations, MetricTable};
use crate::config::TimeUnit;
use crate::log::{EventLog, Trace};
use crate::stats::{self, DurationStats};

/// Where an activity tends to sit inside its traces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PositionStats {
  /// Zero-based index.
  pub mean: f64,
  pub min: usize,
  pub max: usize,
  /// 0 = first event, 1 = last event.
  pub mean_relative: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityMetrics {
  pub activity: String,
  pub count: u64,
  pub unique_cases: usize,
  pub cycle_count: u64,
  /// Share of occurrences that happened inside a cycle.
  pub cycle_percent: f64,
  pub unique_users: usize,
  pub duration: DurationStats,
  pub position: PositionStats,
}

#[derive(Debug, Default)]
struct Acc {
  count: u64,
  cases: BTreeSet<String>,
  users: BTreeSet<String>,
  durations: Vec<f64>,
  positions: Vec<usize>,
  relative: Vec<f64>,
}

impl Acc {
  fn merge(&mut self, other: Acc) {
    self.count += other.count;
    self.cases.extend(other.cases);
    self.users.extend(other.users);
    self.durations.extend(other.durations);
    self.positions.extend(other.positions);
    self.relative.extend(other.relative);
  }
}

fn add_trace(
  mut acc: HashMap<String, Acc>,
  trace: Trace<'_>,
  unit: TimeUnit,
) -> HashMap<String, Acc> {
  let durations = step_durations(&trace, unit);
  let last = trace.len().saturating_sub(1);
  for (i, (event, duration)) in trace.events().iter().zip(durations).enumerate() {
    let a = acc.entry(event.activity.clone()).or_default();
    a.count += 1;
    if !a.cases.contains(trace.case_id()) {
      a.cases.insert(trace.case_id().to_string());
    }
    if let Some(user) = &event.user {
      a.users.insert(user.clone());
    }
    if let Some(d) = duration {
      a.durations.push(d);
    }
    a.positions.push(i);
    a.relative.push(if last == 0 { 0.0 } else { i as f64 / last as f64 });
  }
  acc
}

fn merge(mut left: HashMap<String, Acc>, right: HashMap<String, Acc>) -> HashMap<String, Acc> {
  for (k, v) in right {
    left.entry(k).or_default().merge(v);
  }
  left
}

pub(crate) fn compute(
  log: &EventLog,
  unit: TimeUnit,
  cycles: &CycleCounts,
) -> MetricTable<String, ActivityMetrics> {
  let acc = log
    .par_traces()
    .fold(HashMap::new, |acc, t| add_trace(acc, t, unit))
    .reduce(HashMap::new, merge);

  acc
    .into_iter()
    .map(|(activity, mut a)| {
      a.relative.sort_by(f64::total_cmp);
      let position = PositionStats {
        mean: a.positions.iter().sum::<usize>() as f64 / a.positions.len().max(1) as f64,
        min: a.positions.iter().copied().min().unwrap_or(0),
        max: a.positions.iter().copied().max().unwrap_or(0),
        mean_relative: stats::mean(&a.relative),
      };
      let cycle_count = cycles.activity(&activity);
      let row = ActivityMetrics {
        activity: activity.clone(),
        count: a.count,
        unique_cases: a.cases.len(),
        cycle_count,
        cycle_percent: stats::ratio(cycle_count as f64, a.count as f64) * 100.0,
        unique_users: a.users.len(),
        duration: DurationStats::from_values(&a.durations),
        position,
      };
      (activity, row)
    })
    .collect()
}
