//! Direct-succession statistics: the shared first phase of every miner.
//!
//! Counts are gathered per trace in parallel and merged by summation, so the
//! result does not depend on how rayon partitions the cases.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;

use crate::log::EventLog;

/// Per-partition accumulator. `merge` is associative and commutative.
#[derive(Debug, Default)]
struct Partial {
  direct: HashMap<(usize, usize), u64>,
  two_loop: HashMap<(usize, usize), u64>,
  starts: HashMap<usize, u64>,
  ends: HashMap<usize, u64>,
  occurrences: HashMap<usize, u64>,
  traces: usize,
}

impl Partial {
  fn add_sequence(mut self, seq: &[usize]) -> Self {
    if let (Some(&first), Some(&last)) = (seq.first(), seq.last()) {
      *self.starts.entry(first).or_insert(0) += 1;
      *self.ends.entry(last).or_insert(0) += 1;
      self.traces += 1;
    }
    for &a in seq {
      *self.occurrences.entry(a).or_insert(0) += 1;
    }
    for w in seq.windows(2) {
      *self.direct.entry((w[0], w[1])).or_insert(0) += 1;
    }
    for w in seq.windows(3) {
      if w[0] == w[2] && w[0] != w[1] {
        *self.two_loop.entry((w[0], w[1])).or_insert(0) += 1;
      }
    }
    self
  }

  fn merge(mut self, other: Partial) -> Self {
    fn sum_into<K: std::hash::Hash + Eq>(into: &mut HashMap<K, u64>, from: HashMap<K, u64>) {
      for (k, v) in from {
        *into.entry(k).or_insert(0) += v;
      }
    }
    sum_into(&mut self.direct, other.direct);
    sum_into(&mut self.two_loop, other.two_loop);
    sum_into(&mut self.starts, other.starts);
    sum_into(&mut self.ends, other.ends);
    sum_into(&mut self.occurrences, other.occurrences);
    self.traces += other.traces;
    self
  }
}

/// How often each activity is immediately followed by each other activity.
#[derive(Debug, Clone, Default)]
pub struct Succession {
  activities: Vec<String>,
  index: HashMap<String, usize>,
  direct: BTreeMap<(usize, usize), u64>,
  two_loop: BTreeMap<(usize, usize), u64>,
  starts: BTreeMap<usize, u64>,
  ends: BTreeMap<usize, u64>,
  occurrences: Vec<u64>,
  traces: usize,
}

impl Succession {
  pub fn from_log(log: &EventLog) -> Self {
    let activities = log.activities().to_vec();
    let index: HashMap<&str, usize> = activities
      .iter()
      .enumerate()
      .map(|(i, a)| (a.as_str(), i))
      .collect();
    let sequences: Vec<Vec<usize>> = log
      .par_traces()
      .map(|t| t.activities().map(|a| index[a]).collect())
      .collect();
    Self::from_sequences(activities, &sequences)
  }

  /// Build from sequences of indices into `activities` (sorted, distinct).
  pub fn from_sequences(activities: Vec<String>, sequences: &[Vec<usize>]) -> Self {
    let partial = sequences
      .par_iter()
      .fold(Partial::default, |acc, seq| acc.add_sequence(seq))
      .reduce(Partial::default, Partial::merge);

    let mut occurrences = vec![0; activities.len()];
    for (a, n) in partial.occurrences {
      occurrences[a] = n;
    }
    let index = activities
      .iter()
      .enumerate()
      .map(|(i, a)| (a.clone(), i))
      .collect();

    tracing::debug!(
      activities = activities.len(),
      pairs = partial.direct.len(),
      traces = partial.traces,
      "direct succession counted"
    );

    Self {
      activities,
      index,
      direct: partial.direct.into_iter().collect(),
      two_loop: partial.two_loop.into_iter().collect(),
      starts: partial.starts.into_iter().collect(),
      ends: partial.ends.into_iter().collect(),
      occurrences,
      traces: partial.traces,
    }
  }

  pub fn activities(&self) -> &[String] {
    &self.activities
  }

  pub fn name(&self, idx: usize) -> &str {
    &self.activities[idx]
  }

  pub fn index_of(&self, activity: &str) -> Option<usize> {
    self.index.get(activity).copied()
  }

  pub fn trace_count(&self) -> usize {
    self.traces
  }

  /// |a > b|: times `a` is immediately followed by `b`.
  pub fn count(&self, a: usize, b: usize) -> u64 {
    self.direct.get(&(a, b)).copied().unwrap_or(0)
  }

  pub fn count_named(&self, a: &str, b: &str) -> u64 {
    match (self.index_of(a), self.index_of(b)) {
      (Some(a), Some(b)) => self.count(a, b),
      _ => 0,
    }
  }

  /// |a >> b|: occurrences of the window `a b a` (a != b).
  pub fn two_loop_count(&self, a: usize, b: usize) -> u64 {
    self.two_loop.get(&(a, b)).copied().unwrap_or(0)
  }

  pub fn follows(&self, a: usize, b: usize) -> bool {
    self.count(a, b) > 0
  }

  /// Observed pairs with their counts, ordered by (source, target) index.
  pub fn pairs(&self) -> impl Iterator<Item = ((usize, usize), u64)> + '_ {
    self.direct.iter().map(|(&k, &v)| (k, v))
  }

  /// Activities that open a trace, with their trace counts.
  pub fn starts(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
    self.starts.iter().map(|(&k, &v)| (k, v))
  }

  /// Activities that close a trace, with their trace counts.
  pub fn ends(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
    self.ends.iter().map(|(&k, &v)| (k, v))
  }

  pub fn occurrences(&self, a: usize) -> u64 {
    self.occurrences.get(a).copied().unwrap_or(0)
  }

  /// Times `a` is followed by any activity.
  pub fn outgoing_total(&self, a: usize) -> u64 {
    self
      .direct
      .range((a, 0)..=(a, usize::MAX))
      .map(|(_, &v)| v)
      .sum()
  }

  /// Largest |a > x| over all x.
  pub fn max_outgoing(&self, a: usize) -> u64 {
    self
      .direct
      .range((a, 0)..=(a, usize::MAX))
      .map(|(_, &v)| v)
      .max()
      .unwrap_or(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Event;
  use chrono::{TimeZone, Utc};

  fn log(traces: &[(&str, &[&str])]) -> EventLog {
    let mut events = Vec::new();
    for (case, acts) in traces {
      for (i, a) in acts.iter().enumerate() {
        events.push(Event::new(
          case,
          a,
          Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
        ));
      }
    }
    EventLog::from_events(events).unwrap()
  }

  #[test]
  fn counts_direct_pairs() {
    let s = Succession::from_sequences(
      vec!["A".into(), "B".into(), "C".into()],
      &[vec![0, 1, 2], vec![0, 2, 1], vec![0, 1, 2]],
    );
    assert_eq!(s.count(0, 1), 2);
    assert_eq!(s.count(1, 2), 2);
    assert_eq!(s.count(2, 1), 1);
    assert_eq!(s.count(1, 0), 0);
    assert_eq!(s.outgoing_total(0), 3);
    assert_eq!(s.max_outgoing(0), 2);
    assert_eq!(s.trace_count(), 3);
  }

  #[test]
  fn start_end_and_occurrences() {
    let s = Succession::from_log(&log(&[("1", &["A", "B"]), ("2", &["A", "C", "B"])]));
    let a = s.index_of("A").unwrap();
    let b = s.index_of("B").unwrap();
    assert_eq!(s.starts().collect::<Vec<_>>(), vec![(a, 2)]);
    assert_eq!(s.ends().collect::<Vec<_>>(), vec![(b, 2)]);
    assert_eq!(s.occurrences(b), 2);
  }

  #[test]
  fn detects_two_loops() {
    let s = Succession::from_log(&log(&[("1", &["A", "B", "A", "B", "C"])]));
    let a = s.index_of("A").unwrap();
    let b = s.index_of("B").unwrap();
    assert_eq!(s.two_loop_count(a, b), 1);
    assert_eq!(s.two_loop_count(b, a), 1);
  }

  #[test]
  fn self_succession_is_not_a_two_loop() {
    let s = Succession::from_log(&log(&[("1", &["A", "A", "A"])]));
    let a = s.index_of("A").unwrap();
    assert_eq!(s.count(a, a), 2);
    assert_eq!(s.two_loop_count(a, a), 0);
  }

  #[test]
  fn named_lookup_of_unknown_activity_is_zero() {
    let s = Succession::from_log(&log(&[("1", &["A", "B"])]));
    assert_eq!(s.count_named("A", "B"), 1);
    assert_eq!(s.count_named("A", "Z"), 0);
  }
}
