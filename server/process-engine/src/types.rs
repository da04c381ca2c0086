//! Core types for the process engine (input contract + normalized events).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TimeUnit;

/// Synthetic source node of every process graph.
pub const START: &str = "START";
/// Synthetic sink node of every process graph.
pub const END: &str = "END";

// ---------------------------------------------------------------------------
// Inbound types (the tabular contract handed over by ingestion)
// ---------------------------------------------------------------------------

/// A raw event-log table: named columns and rows of optional cells.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Table {
  pub columns: Vec<String>,
  #[serde(default)]
  pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
  pub fn new<I, S>(columns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      columns: columns.into_iter().map(Into::into).collect(),
      rows: Vec::new(),
    }
  }

  /// Append a row of present cells.
  pub fn push_row<I, S>(&mut self, cells: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.rows.push(cells.into_iter().map(|c| Some(c.into())).collect());
  }

  /// Append a row where some cells may be missing.
  pub fn push_cells(&mut self, cells: Vec<Option<String>>) {
    self.rows.push(cells);
  }

  pub fn column_index(&self, name: &str) -> Option<usize> {
    self.columns.iter().position(|c| c == name)
  }
}

/// Explicit column roles. No schema inference is ever attempted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnRoles {
  pub case_id: String,
  pub activity: String,
  pub timestamp: String,
  #[serde(default)]
  pub user: Option<String>,
  /// Completion time of each event. `timestamp` is then its start.
  #[serde(default)]
  pub end_timestamp: Option<String>,
  /// Precomputed numeric event duration, in `duration_unit`.
  #[serde(default)]
  pub duration: Option<String>,
  #[serde(default)]
  pub duration_unit: Option<TimeUnit>,
  /// chrono format string; RFC 3339 or integer epoch seconds when absent.
  #[serde(default)]
  pub time_format: Option<String>,
}

impl ColumnRoles {
  pub fn new(case_id: &str, activity: &str, timestamp: &str) -> Self {
    Self {
      case_id: case_id.to_string(),
      activity: activity.to_string(),
      timestamp: timestamp.to_string(),
      user: None,
      end_timestamp: None,
      duration: None,
      duration_unit: None,
      time_format: None,
    }
  }

  pub fn with_user(mut self, column: &str) -> Self {
    self.user = Some(column.to_string());
    self
  }

  pub fn with_end_timestamp(mut self, column: &str) -> Self {
    self.end_timestamp = Some(column.to_string());
    self
  }

  /// Numeric duration column; values are read in `unit`.
  pub fn with_duration(mut self, column: &str, unit: TimeUnit) -> Self {
    self.duration = Some(column.to_string());
    self.duration_unit = Some(unit);
    self
  }

  pub fn with_time_format(mut self, format: &str) -> Self {
    self.time_format = Some(format.to_string());
    self
  }
}

// ---------------------------------------------------------------------------
// Internal normalized types
// ---------------------------------------------------------------------------

/// Canonical event after normalization + validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
  pub case_id: String,
  pub activity: String,
  /// Start time; the only time when the log records one per event.
  pub timestamp: DateTime<Utc>,
  pub end_timestamp: Option<DateTime<Utc>>,
  /// Explicit duration in seconds.
  pub duration: Option<f64>,
  pub user: Option<String>,
  pub attributes: BTreeMap<String, String>,
}

impl Event {
  pub fn new(case_id: &str, activity: &str, timestamp: DateTime<Utc>) -> Self {
    Self {
      case_id: case_id.to_string(),
      activity: activity.to_string(),
      timestamp,
      end_timestamp: None,
      duration: None,
      user: None,
      attributes: BTreeMap::new(),
    }
  }

  pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
    self.end_timestamp = Some(end);
    self
  }

  pub fn with_duration(mut self, seconds: f64) -> Self {
    self.duration = Some(seconds);
    self
  }

  /// Recorded length of the event in seconds: the explicit duration, else
  /// end minus start. `None` when the log carries neither.
  pub fn own_seconds(&self) -> Option<f64> {
    self.duration.or_else(|| {
      self
        .end_timestamp
        .map(|end| (end - self.timestamp).num_milliseconds() as f64 / 1_000.0)
    })
  }

  pub fn with_user(mut self, user: &str) -> Self {
    self.user = Some(user.to_string());
    self
  }

  pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
    self.attributes.insert(key.to_string(), value.to_string());
    self
  }
}

// ---------------------------------------------------------------------------
// Trace signature
// ---------------------------------------------------------------------------

/// The activity sequence shared by one or more cases.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceSignature(pub Vec<String>);

impl TraceSignature {
  /// Stable short id for joins downstream: "trace-" + 16 hex chars of blake3.
  pub fn id(&self) -> String {
    let mut hasher = blake3::Hasher::new();
    for (i, activity) in self.0.iter().enumerate() {
      if i > 0 {
        hasher.update(b"|");
      }
      hasher.update(activity.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    format!("trace-{}", &hex[..16])
  }

  pub fn activities(&self) -> &[String] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for TraceSignature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.join(" -> "))
  }
}
