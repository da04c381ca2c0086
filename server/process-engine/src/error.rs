//! Structured error types for the process engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  /// Structural problem in the input table, detected before an `EventLog` exists.
  #[error("malformed log: {field}: {reason}")]
  MalformedLog { field: String, reason: String },

  /// Nothing to mine or measure.
  #[error("empty log: {operation} needs at least one trace")]
  EmptyLog { operation: String },

  #[error("invalid config: {field}: {reason}")]
  InvalidConfig { field: String, reason: String },

  #[error("unsupported algorithm: {0:?} (expected simple|heuristic|causal|alpha|alpha_plus)")]
  UnsupportedAlgorithm(String),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn malformed(field: &str, reason: &str) -> Self {
    Self::MalformedLog {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn empty(operation: &str) -> Self {
    Self::EmptyLog {
      operation: operation.to_string(),
    }
  }

  pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
    Self::InvalidConfig {
      field: field.to_string(),
      reason: reason.into(),
    }
  }

  pub fn unsupported(name: impl Into<String>) -> Self {
    Self::UnsupportedAlgorithm(name.into())
  }
}
