//! Read-only event log: cases grouped, ordered and ready for repeated passes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::EngineError;
use crate::normalize;
use crate::types::{ColumnRoles, Event, Table, TraceSignature};

/// All events of one case, sorted by timestamp (stable on ties).
#[derive(Debug, Clone)]
pub struct Case {
  id: String,
  events: Vec<Event>,
}

impl Case {
  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn events(&self) -> &[Event] {
    &self.events
  }

  pub fn trace(&self) -> Trace<'_> {
    Trace {
      case_id: &self.id,
      events: &self.events,
    }
  }
}

/// Borrowed view of one case's ordered events.
#[derive(Debug, Clone, Copy)]
pub struct Trace<'a> {
  case_id: &'a str,
  events: &'a [Event],
}

impl<'a> Trace<'a> {
  pub fn case_id(&self) -> &'a str {
    self.case_id
  }

  pub fn events(&self) -> &'a [Event] {
    self.events
  }

  pub fn len(&self) -> usize {
    self.events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }

  pub fn activities(&self) -> impl Iterator<Item = &'a str> + 'a {
    self.events.iter().map(|e| e.activity.as_str())
  }

  pub fn signature(&self) -> TraceSignature {
    TraceSignature(self.activities().map(str::to_string).collect())
  }

  pub fn start(&self) -> Option<DateTime<Utc>> {
    self.events.first().map(|e| e.timestamp)
  }

  /// Latest recorded time: the last start or any later end timestamp.
  pub fn end(&self) -> Option<DateTime<Utc>> {
    let last = self.events.last()?.timestamp;
    Some(
      self
        .events
        .iter()
        .filter_map(|e| e.end_timestamp)
        .fold(last, |a, b| a.max(b)),
    )
  }

  /// From the first start to the moment the last event finishes, in seconds.
  ///
  /// Without end timestamps or explicit durations this is last minus first
  /// timestamp (0 for a single event).
  pub fn duration_seconds(&self) -> f64 {
    let Some(start) = self.start() else {
      return 0.0;
    };
    self
      .events
      .iter()
      .map(|e| seconds_between(start, e.timestamp) + e.own_seconds().unwrap_or(0.0))
      .fold(0.0, f64::max)
  }
}

/// Restartable iterator over the traces of a log, in first-occurrence order.
#[derive(Debug, Clone)]
pub struct Traces<'a> {
  inner: std::slice::Iter<'a, Case>,
}

impl<'a> Iterator for Traces<'a> {
  type Item = Trace<'a>;

  fn next(&mut self) -> Option<Self::Item> {
    self.inner.next().map(Case::trace)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    self.inner.size_hint()
  }
}

impl ExactSizeIterator for Traces<'_> {}

/// A distinct activity sequence and the cases that share it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueTrace {
  pub signature: TraceSignature,
  pub id: String,
  /// Case ids in log order.
  pub case_ids: Vec<String>,
  pub count: usize,
}

/// Normalized in-memory event log. Immutable after construction.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
  cases: Vec<Case>,
  case_index: HashMap<String, usize>,
  activities: Vec<String>,
  users: Vec<String>,
}

impl EventLog {
  /// Build from a raw table with explicit column roles.
  pub fn from_table(table: &Table, roles: &ColumnRoles) -> Result<Self, EngineError> {
    let events = normalize::normalize(table, roles)?;
    Self::from_events(events)
  }

  /// Build from already-typed events. Record order is the tie-break for equal timestamps.
  pub fn from_events<I>(events: I) -> Result<Self, EngineError>
  where
    I: IntoIterator<Item = Event>,
  {
    let mut cases: Vec<Case> = Vec::new();
    let mut case_index: HashMap<String, usize> = HashMap::new();
    let mut activities = BTreeSet::new();
    let mut users = BTreeSet::new();

    for event in events {
      normalize::validate_event(&event)?;
      activities.insert(event.activity.clone());
      if let Some(user) = &event.user {
        users.insert(user.clone());
      }
      let idx = *case_index.entry(event.case_id.clone()).or_insert_with(|| {
        cases.push(Case {
          id: event.case_id.clone(),
          events: Vec::new(),
        });
        cases.len() - 1
      });
      cases[idx].events.push(event);
    }

    for case in &mut cases {
      // sort_by_key is stable: equal timestamps keep record order.
      case.events.sort_by_key(|e| e.timestamp);
    }

    tracing::debug!(
      cases = cases.len(),
      activities = activities.len(),
      users = users.len(),
      "event log built"
    );

    Ok(Self {
      cases,
      case_index,
      activities: activities.into_iter().collect(),
      users: users.into_iter().collect(),
    })
  }

  /// Fresh pass over every trace. May be called any number of times.
  pub fn traces(&self) -> Traces<'_> {
    Traces {
      inner: self.cases.iter(),
    }
  }

  /// Parallel pass over every trace.
  pub fn par_traces(&self) -> impl IndexedParallelIterator<Item = Trace<'_>> + '_ {
    self.cases.par_iter().map(Case::trace)
  }

  pub fn case(&self, case_id: &str) -> Option<Trace<'_>> {
    self.case_index.get(case_id).map(|&i| self.cases[i].trace())
  }

  /// Deduplicated activity sequences with their cases.
  pub fn unique_traces(&self) -> BTreeMap<TraceSignature, UniqueTrace> {
    let mut out: BTreeMap<TraceSignature, UniqueTrace> = BTreeMap::new();
    for trace in self.traces() {
      let signature = trace.signature();
      let entry = out.entry(signature.clone()).or_insert_with(|| UniqueTrace {
        id: signature.id(),
        signature,
        case_ids: Vec::new(),
        count: 0,
      });
      entry.case_ids.push(trace.case_id().to_string());
      entry.count += 1;
    }
    out
  }

  /// Sorted distinct activity names.
  pub fn activities(&self) -> &[String] {
    &self.activities
  }

  /// Sorted distinct user ids.
  pub fn users(&self) -> &[String] {
    &self.users
  }

  pub fn has_users(&self) -> bool {
    !self.users.is_empty()
  }

  pub fn case_count(&self) -> usize {
    self.cases.len()
  }

  pub fn event_count(&self) -> usize {
    self.cases.iter().map(|c| c.events.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.cases.is_empty()
  }

  /// Fail with `EmptyLog` on behalf of `operation` when there is nothing to process.
  pub fn require_traces(&self, operation: &str) -> Result<(), EngineError> {
    if self.is_empty() {
      return Err(EngineError::empty(operation));
    }
    Ok(())
  }
}

impl<'a> IntoIterator for &'a EventLog {
  type Item = Trace<'a>;
  type IntoIter = Traces<'a>;

  fn into_iter(self) -> Self::IntoIter {
    self.traces()
  }
}

/// Signed difference in seconds with millisecond precision.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
  (to - from).num_milliseconds() as f64 / 1_000.0
}
