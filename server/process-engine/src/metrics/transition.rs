//! Transition table: one row per observed direct succession.

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use super::cycle::CycleCounts;
use super::{transition_gap, MetricTable};
use crate::config::TimeUnit;
use crate::log::{EventLog, Trace};
use crate::stats::DurationStats;

/// One row per observed direct succession.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionMetrics {
  pub source: String,
  pub target: String,
  pub count: u64,
  /// Users of the target event.
  pub unique_users: usize,
  pub cycle_count: u64,
  /// Wait from the end of the source event to the start of the target.
  pub duration: DurationStats,
}

#[derive(Debug, Default)]
struct Acc {
  count: u64,
  users: BTreeSet<String>,
  gaps: Vec<f64>,
}

type Key = (String, String);

fn add_trace(mut acc: HashMap<Key, Acc>, trace: Trace<'_>, unit: TimeUnit) -> HashMap<Key, Acc> {
  for pair in trace.events().windows(2) {
    let (from, to) = (&pair[0], &pair[1]);
    let a = acc
      .entry((from.activity.clone(), to.activity.clone()))
      .or_default();
    a.count += 1;
    if let Some(user) = &to.user {
      a.users.insert(user.clone());
    }
    a.gaps.push(transition_gap(from, to, unit));
  }
  acc
}

fn merge(mut left: HashMap<Key, Acc>, right: HashMap<Key, Acc>) -> HashMap<Key, Acc> {
  for (k, v) in right {
    let a = left.entry(k).or_default();
    a.count += v.count;
    a.users.extend(v.users);
    a.gaps.extend(v.gaps);
  }
  left
}

pub(crate) fn compute(
  log: &EventLog,
  unit: TimeUnit,
  cycles: &CycleCounts,
) -> MetricTable<Key, TransitionMetrics> {
  log
    .par_traces()
    .fold(HashMap::new, |acc, t| add_trace(acc, t, unit))
    .reduce(HashMap::new, merge)
    .into_iter()
    .map(|((source, target), a)| {
      let row = TransitionMetrics {
        cycle_count: cycles.transition(&source, &target),
        count: a.count,
        unique_users: a.users.len(),
        duration: DurationStats::from_values(&a.gaps),
        source: source.clone(),
        target: target.clone(),
      };
      ((source, target), row)
    })
    .collect()
}

impl MetricTable<Key, TransitionMetrics> {
  /// Row for `source -> target`, if that succession was observed.
  pub fn between(&self, source: &str, target: &str) -> Option<&TransitionMetrics> {
    self.get(&(source.to_string(), target.to_string()))
  }

  /// Rows leaving `source`.
  pub fn from_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a TransitionMetrics> {
    self.values().filter(move |t| t.source == source)
  }
}
