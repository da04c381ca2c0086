//! Normalize inbound table rows into canonical Event models.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::config::TimeUnit;
use crate::error::EngineError;
use crate::types::*;

/// Parse and validate every row of `table` under the given column roles.
pub fn normalize(table: &Table, roles: &ColumnRoles) -> Result<Vec<Event>, EngineError> {
  let case_col = required_column(table, "case_id", &roles.case_id)?;
  let activity_col = required_column(table, "activity", &roles.activity)?;
  let ts_col = required_column(table, "timestamp", &roles.timestamp)?;
  let user_col = match &roles.user {
    Some(name) => Some(required_column(table, "user", name)?),
    None => None,
  };
  let end_col = match &roles.end_timestamp {
    Some(name) => Some(required_column(table, "end_timestamp", name)?),
    None => None,
  };
  let duration_col = match &roles.duration {
    Some(name) => Some(required_column(table, "duration", name)?),
    None => None,
  };
  let duration_unit = roles.duration_unit.unwrap_or(TimeUnit::Second);

  // Columns without a role become free attributes.
  let role_cols = [Some(case_col), Some(activity_col), Some(ts_col), user_col, end_col, duration_col];
  let attribute_cols: Vec<(usize, &str)> = table
    .columns
    .iter()
    .enumerate()
    .filter(|(i, _)| !role_cols.contains(&Some(*i)))
    .map(|(i, name)| (i, name.as_str()))
    .collect();

  table
    .rows
    .iter()
    .enumerate()
    .map(|(row_idx, row)| {
      if row.len() != table.columns.len() {
        return Err(EngineError::malformed(
          &format!("rows[{}]", row_idx),
          &format!("expected {} cells, got {}", table.columns.len(), row.len()),
        ));
      }

      let case_id = required_cell(row, case_col, "case_id", row_idx)?;
      let activity = required_cell(row, activity_col, "activity", row_idx)?;
      let raw_ts = required_cell(row, ts_col, "timestamp", row_idx)?;
      let timestamp = parse_timestamp(raw_ts, roles.time_format.as_deref()).map_err(|reason| {
        EngineError::malformed("timestamp", &format!("rows[{}]: {}", row_idx, reason))
      })?;

      let end_timestamp = end_col
        .and_then(|c| cell(row, c))
        .map(|raw| {
          parse_timestamp(raw, roles.time_format.as_deref()).map_err(|reason| {
            EngineError::malformed("end_timestamp", &format!("rows[{}]: {}", row_idx, reason))
          })
        })
        .transpose()?;

      let duration = duration_col
        .and_then(|c| cell(row, c))
        .map(|raw| {
          raw
            .parse::<f64>()
            .map(|v| v * duration_unit.seconds())
            .map_err(|e| {
              EngineError::malformed(
                "duration",
                &format!("rows[{}]: {:?} is not a number: {}", row_idx, raw, e),
              )
            })
        })
        .transpose()?;

      let user = user_col
        .and_then(|c| cell(row, c))
        .map(str::to_string);

      let attributes = attribute_cols
        .iter()
        .filter_map(|&(c, name)| cell(row, c).map(|v| (name.to_string(), v.to_string())))
        .collect();

      let event = Event {
        case_id: case_id.to_string(),
        activity: activity.to_string(),
        timestamp,
        end_timestamp,
        duration,
        user,
        attributes,
      };
      validate_event(&event).map_err(|e| match e {
        EngineError::MalformedLog { field, reason } => EngineError::MalformedLog {
          field,
          reason: format!("rows[{}]: {}", row_idx, reason),
        },
        other => other,
      })?;
      Ok(event)
    })
    .collect()
}

/// Invariants every event must satisfy, whatever its origin.
pub fn validate_event(event: &Event) -> Result<(), EngineError> {
  if event.case_id.trim().is_empty() {
    return Err(EngineError::malformed("case_id", "must not be empty"));
  }
  if event.activity.trim().is_empty() {
    return Err(EngineError::malformed(
      "activity",
      &format!("case {:?} has an event without an activity", event.case_id),
    ));
  }
  if event.activity == START || event.activity == END {
    return Err(EngineError::malformed(
      "activity",
      &format!("{:?} is reserved for the synthetic graph nodes", event.activity),
    ));
  }
  if let Some(end) = event.end_timestamp {
    if end < event.timestamp {
      return Err(EngineError::malformed(
        "end_timestamp",
        &format!("case {:?}: {} ends before it starts", event.case_id, event.activity),
      ));
    }
  }
  if let Some(d) = event.duration {
    if !d.is_finite() || d < 0.0 {
      return Err(EngineError::malformed(
        "duration",
        &format!("case {:?}: expected a non-negative duration, got {}", event.case_id, d),
      ));
    }
  }
  Ok(())
}

/// Parse a timestamp cell.
///
/// With a format: a full date-time, or a date-only value at midnight (UTC).
/// Without: RFC 3339, falling back to integer epoch seconds.
pub fn parse_timestamp(raw: &str, format: Option<&str>) -> Result<DateTime<Utc>, String> {
  let raw = raw.trim();
  match format {
    Some(fmt) => NaiveDateTime::parse_from_str(raw, fmt)
      .map(|dt| dt.and_utc())
      .or_else(|_| {
        NaiveDate::parse_from_str(raw, fmt)
          .map_err(|e| format!("{:?} does not match {:?}: {}", raw, fmt, e))
          .and_then(|d| {
            d.and_hms_opt(0, 0, 0)
              .map(|dt| dt.and_utc())
              .ok_or_else(|| format!("{:?} has no midnight", raw))
          })
      }),
    None => match DateTime::parse_from_rfc3339(raw) {
      Ok(dt) => Ok(dt.with_timezone(&Utc)),
      Err(e) => raw
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| format!("invalid RFC3339 or epoch seconds {:?}: {}", raw, e)),
    },
  }
}

fn required_column(table: &Table, role: &str, name: &str) -> Result<usize, EngineError> {
  table.column_index(name).ok_or_else(|| {
    EngineError::malformed(role, &format!("column {:?} not found in table", name))
  })
}

fn cell(row: &[Option<String>], col: usize) -> Option<&str> {
  row
    .get(col)
    .and_then(|c| c.as_deref())
    .map(str::trim)
    .filter(|c| !c.is_empty())
}

fn required_cell<'a>(
  row: &'a [Option<String>],
  col: usize,
  field: &str,
  row_idx: usize,
) -> Result<&'a str, EngineError> {
  cell(row, col)
    .ok_or_else(|| EngineError::malformed(field, &format!("rows[{}]: missing value", row_idx)))
}
