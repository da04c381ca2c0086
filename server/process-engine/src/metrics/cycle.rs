//! Repeated activities within a case.
//!
//! An activity that occurs more than once in a case is cyclic there: all of
//! its occurrences count towards its cycle total, and every repeated
//! occurrence at position `i` adds one to the transition `(trace[i-1], trace[i])`
//! that re-entered it.

use std::collections::{BTreeMap, HashMap, HashSet};

use rayon::prelude::*;

use crate::log::{EventLog, Trace};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleCounts {
  /// Occurrences of each activity inside cases where it repeats.
  pub activities: BTreeMap<String, u64>,
  /// Times each transition re-entered an already visited activity.
  pub transitions: BTreeMap<(String, String), u64>,
}

impl CycleCounts {
  pub fn activity(&self, activity: &str) -> u64 {
    self.activities.get(activity).copied().unwrap_or(0)
  }

  pub fn transition(&self, source: &str, target: &str) -> u64 {
    self
      .transitions
      .get(&(source.to_string(), target.to_string()))
      .copied()
      .unwrap_or(0)
  }

  fn add_trace(mut self, trace: Trace<'_>, cycle_length: Option<usize>) -> Self {
    let acts: Vec<&str> = trace.activities().collect();
    let mut spans: HashMap<&str, (usize, usize, u64)> = HashMap::new();
    for (i, &a) in acts.iter().enumerate() {
      spans
        .entry(a)
        .and_modify(|(_, last, n)| {
          *last = i;
          *n += 1;
        })
        .or_insert((i, i, 1));
    }

    let cyclic = |a: &str| -> bool {
      match spans.get(a) {
        Some(&(first, last, n)) if n > 1 => match cycle_length {
          Some(len) => last - first == len,
          None => true,
        },
        _ => false,
      }
    };

    for (a, &(_, _, n)) in &spans {
      if cyclic(*a) {
        *self.activities.entry(a.to_string()).or_insert(0) += n;
      }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (i, &a) in acts.iter().enumerate() {
      if !seen.insert(a) && i > 0 && cyclic(a) {
        let key = (acts[i - 1].to_string(), a.to_string());
        *self.transitions.entry(key).or_insert(0) += 1;
      }
    }
    self
  }

  fn merge(mut self, other: CycleCounts) -> Self {
    for (k, v) in other.activities {
      *self.activities.entry(k).or_insert(0) += v;
    }
    for (k, v) in other.transitions {
      *self.transitions.entry(k).or_insert(0) += v;
    }
    self
  }
}

/// Count cycles over every case. `cycle_length` keeps only activities whose
/// first and last occurrence in a case are exactly that many steps apart.
pub fn find(log: &EventLog, cycle_length: Option<usize>) -> CycleCounts {
  let counts = log
    .par_traces()
    .fold(CycleCounts::default, |acc, t| acc.add_trace(t, cycle_length))
    .reduce(CycleCounts::default, CycleCounts::merge);
  tracing::debug!(
    cyclic_activities = counts.activities.len(),
    cyclic_transitions = counts.transitions.len(),
    "cycles counted"
  );
  counts
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::metrics::fixtures::log;

  #[test]
  fn repeated_activity_counts_all_occurrences() {
    let log = log(&[
      ("1", &[("A", 0, ""), ("B", 1, ""), ("A", 2, ""), ("C", 3, "")]),
      ("2", &[("A", 0, ""), ("C", 1, "")]),
    ]);
    let c = find(&log, None);
    assert_eq!(c.activity("A"), 2);
    assert_eq!(c.activity("B"), 0);
    assert_eq!(c.transition("B", "A"), 1);
    assert_eq!(c.transition("A", "B"), 0);
  }

  #[test]
  fn self_loop_reentry() {
    let log = log(&[("1", &[("A", 0, ""), ("A", 1, ""), ("A", 2, "")])]);
    let c = find(&log, None);
    assert_eq!(c.activity("A"), 3);
    assert_eq!(c.transition("A", "A"), 2);
  }

  #[test]
  fn cycle_length_filters_by_span() {
    let log = log(&[(
      "1",
      &[("A", 0, ""), ("B", 1, ""), ("A", 2, ""), ("C", 3, ""), ("D", 4, ""), ("C", 5, "")],
    )]);
    let two = find(&log, Some(2));
    assert_eq!(two.activity("A"), 2);
    assert_eq!(two.activity("C"), 2);
    let three = find(&log, Some(3));
    assert!(three.activities.is_empty());
    assert!(three.transitions.is_empty());
  }
}
