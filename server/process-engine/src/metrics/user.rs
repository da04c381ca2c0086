//! User table: workload and throughput per user.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use super::{step_durations, MetricTable};
use crate::config::TimeUnit;
use crate::log::{seconds_between, EventLog, Trace};
use crate::stats::{self, DurationStats};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMetrics {
  pub user: String,
  pub activity_count: u64,
  pub unique_activities: usize,
  pub case_count: usize,
  /// Share of all user-attributed events, in percent.
  pub workload_percent: f64,
  /// Time between the user's first and last event.
  pub active_span: f64,
  /// Activities per time unit over the active span (floored to one unit).
  pub throughput: f64,
  pub duration: DurationStats,
}

#[derive(Debug, Default)]
struct Acc {
  count: u64,
  activities: BTreeSet<String>,
  cases: BTreeSet<String>,
  durations: Vec<f64>,
  first: Option<DateTime<Utc>>,
  last: Option<DateTime<Utc>>,
}

impl Acc {
  fn see(&mut self, at: DateTime<Utc>) {
    self.first = Some(self.first.map_or(at, |f| f.min(at)));
    self.last = Some(self.last.map_or(at, |l| l.max(at)));
  }
}

fn add_trace(
  mut acc: HashMap<String, Acc>,
  trace: Trace<'_>,
  unit: TimeUnit,
) -> HashMap<String, Acc> {
  let durations = step_durations(&trace, unit);
  for (event, duration) in trace.events().iter().zip(durations) {
    let Some(user) = &event.user else { continue };
    let a = acc.entry(user.clone()).or_default();
    a.count += 1;
    a.activities.insert(event.activity.clone());
    a.cases.insert(trace.case_id().to_string());
    a.see(event.timestamp);
    if let Some(d) = duration {
      a.durations.push(d);
    }
  }
  acc
}

fn merge(mut left: HashMap<String, Acc>, right: HashMap<String, Acc>) -> HashMap<String, Acc> {
  for (k, v) in right {
    let a = left.entry(k).or_default();
    a.count += v.count;
    a.activities.extend(v.activities);
    a.cases.extend(v.cases);
    a.durations.extend(v.durations);
    if let Some(f) = v.first {
      a.see(f);
    }
    if let Some(l) = v.last {
      a.see(l);
    }
  }
  left
}

/// Empty when no event carries a user.
pub(crate) fn compute(log: &EventLog, unit: TimeUnit) -> MetricTable<String, UserMetrics> {
  if !log.has_users() {
    return MetricTable::default();
  }
  let acc = log
    .par_traces()
    .fold(HashMap::new, |acc, t| add_trace(acc, t, unit))
    .reduce(HashMap::new, merge);
  let attributed: u64 = acc.values().map(|a| a.count).sum();

  acc
    .into_iter()
    .map(|(user, a)| {
      let active_span = match (a.first, a.last) {
        (Some(f), Some(l)) => unit.from_seconds(seconds_between(f, l)),
        _ => 0.0,
      };
      let row = UserMetrics {
        user: user.clone(),
        activity_count: a.count,
        unique_activities: a.activities.len(),
        case_count: a.cases.len(),
        workload_percent: stats::ratio(a.count as f64, attributed as f64) * 100.0,
        active_span,
        throughput: a.count as f64 / active_span.max(1.0),
        duration: DurationStats::from_values(&a.durations),
      };
      (user, row)
    })
    .collect()
}
