//! Bag-of-activities vectors, one per case.

use rayon::prelude::*;
use serde::Serialize;

use crate::error::EngineError;
use crate::log::EventLog;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountVectorizer {
  /// Clamp counts to 0/1.
  pub binary: bool,
}

/// Dense case-by-activity matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountMatrix {
  /// Sorted activity names.
  pub columns: Vec<String>,
  /// Case ids in log order, one per row.
  pub case_ids: Vec<String>,
  pub rows: Vec<Vec<u64>>,
}

impl CountMatrix {
  pub fn row(&self, case_id: &str) -> Option<&[u64]> {
    let i = self.case_ids.iter().position(|c| c == case_id)?;
    Some(&self.rows[i])
  }
}

impl CountVectorizer {
  pub fn new(binary: bool) -> Self {
    Self { binary }
  }

  pub fn transform(&self, log: &EventLog) -> Result<CountMatrix, EngineError> {
    log.require_traces("vectorize")?;
    let columns = log.activities().to_vec();
    let rows: Vec<Vec<u64>> = log
      .par_traces()
      .map(|trace| {
        let mut row = vec![0u64; columns.len()];
        for activity in trace.activities() {
          if let Ok(i) = columns.binary_search_by(|c| c.as_str().cmp(activity)) {
            row[i] = if self.binary { 1 } else { row[i] + 1 };
          }
        }
        row
      })
      .collect();
    Ok(CountMatrix {
      case_ids: log.traces().map(|t| t.case_id().to_string()).collect(),
      columns,
      rows,
    })
  }
}
