//! Engine configuration with sane defaults.
//!
//! `Config` is the typed, validated form. `RawConfig` is the loose JSON
//! contract a caller may send; `Config::from_raw` validates every field and
//! reports the offending value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::insights::InsightMetric;

// ---------------------------------------------------------------------------
// Algorithm selection
// ---------------------------------------------------------------------------

/// Discovery algorithm. A closed set; see `miners::Miner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
  Simple,
  Heuristic,
  Causal,
  Alpha,
  AlphaPlus,
}

impl Algorithm {
  pub const ALL: [Algorithm; 5] = [
    Algorithm::Simple,
    Algorithm::Heuristic,
    Algorithm::Causal,
    Algorithm::Alpha,
    Algorithm::AlphaPlus,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Simple => "simple",
      Self::Heuristic => "heuristic",
      Self::Causal => "causal",
      Self::Alpha => "alpha",
      Self::AlphaPlus => "alpha_plus",
    }
  }
}

impl fmt::Display for Algorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Algorithm {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "simple" => Ok(Self::Simple),
      "heuristic" | "heu" => Ok(Self::Heuristic),
      "causal" => Ok(Self::Causal),
      "alpha" => Ok(Self::Alpha),
      "alpha_plus" | "alpha+" | "alphaplus" | "alpha-plus" => Ok(Self::AlphaPlus),
      _ => Err(EngineError::unsupported(s)),
    }
  }
}

// ---------------------------------------------------------------------------
// Time unit for reported durations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
  Second,
  Minute,
  Hour,
  Day,
  Week,
}

impl TimeUnit {
  /// Length of one unit in seconds.
  pub fn seconds(self) -> f64 {
    match self {
      Self::Second => 1.0,
      Self::Minute => 60.0,
      Self::Hour => 3_600.0,
      Self::Day => 86_400.0,
      Self::Week => 604_800.0,
    }
  }

  /// Convert a duration in seconds into this unit.
  pub fn from_seconds(self, secs: f64) -> f64 {
    secs / self.seconds()
  }
}

impl FromStr for TimeUnit {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "s" | "second" => Ok(Self::Second),
      "m" | "minute" => Ok(Self::Minute),
      "h" | "hour" => Ok(Self::Hour),
      "d" | "day" => Ok(Self::Day),
      "w" | "week" => Ok(Self::Week),
      other => Err(EngineError::invalid(
        "time_unit",
        format!("unknown time unit {:?} (expected s|m|h|d|w)", other),
      )),
    }
  }
}

// ---------------------------------------------------------------------------
// Outlier rule for the insight detector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum OutlierRule {
  /// Flag when |value - mean| / std exceeds `threshold`.
  ZScore { threshold: f64 },
  /// Flag the `k` highest values.
  TopK { k: usize },
  /// Flag the `k` lowest values.
  BottomK { k: usize },
  /// Flag values below the `low` quantile or above the `high` quantile.
  Quantile { low: f64, high: f64 },
}

impl OutlierRule {
  pub const DEFAULT_ZSCORE: f64 = 2.0;
  pub const DEFAULT_K: usize = 3;
  pub const DEFAULT_QUANTILE_LOW: f64 = 0.1;
  pub const DEFAULT_QUANTILE_HIGH: f64 = 0.85;

  pub fn validate(&self) -> Result<(), EngineError> {
    match *self {
      Self::ZScore { threshold } => {
        if !threshold.is_finite() || threshold <= 0.0 {
          return Err(EngineError::invalid(
            "outlier_sensitivity",
            format!("z-score threshold must be a positive number, got {}", threshold),
          ));
        }
      }
      Self::TopK { k } | Self::BottomK { k } => {
        if k == 0 {
          return Err(EngineError::invalid(
            "outlier_sensitivity",
            "k must be at least 1, got 0",
          ));
        }
      }
      Self::Quantile { low, high } => {
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low >= high {
          return Err(EngineError::invalid(
            "quantile",
            format!("expected 0 <= low < high <= 1, got low={} high={}", low, high),
          ));
        }
      }
    }
    Ok(())
  }
}

impl Default for OutlierRule {
  fn default() -> Self {
    Self::ZScore {
      threshold: Self::DEFAULT_ZSCORE,
    }
  }
}

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

/// Tunable thresholds for discovery, metrics and insight detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub algorithm: Algorithm,
  /// Minimum direct-succession count for Heuristic/Causal edges.
  pub min_frequency: u64,
  /// Heuristic dependency threshold (0..1).
  pub dependency_threshold: f64,
  /// Causal miner pruning threshold (0..1).
  pub causality_threshold: f64,
  /// AND-measure threshold separating parallel from exclusive splits/joins (0..1).
  pub and_threshold: f64,
  pub outlier_rule: OutlierRule,
  /// Metrics the insight detector evaluates, in output order.
  pub insight_metrics: Vec<InsightMetric>,
  pub time_unit: TimeUnit,
  /// Restrict the cycle metric to loops of exactly this length.
  pub cycle_length: Option<usize>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      algorithm: Algorithm::Heuristic,
      min_frequency: 1,
      dependency_threshold: 0.5,
      causality_threshold: 0.5,
      and_threshold: 0.1,
      outlier_rule: OutlierRule::default(),
      insight_metrics: InsightMetric::DEFAULTS.to_vec(),
      time_unit: TimeUnit::Second,
      cycle_length: None,
    }
  }
}

impl Config {
  /// Check every threshold against its domain. Called before any computation.
  pub fn validate(&self) -> Result<(), EngineError> {
    check_unit_interval("dependency_threshold", self.dependency_threshold)?;
    check_unit_interval("causality_threshold", self.causality_threshold)?;
    check_unit_interval("and_threshold", self.and_threshold)?;
    self.outlier_rule.validate()?;
    if self.insight_metrics.is_empty() {
      return Err(EngineError::invalid(
        "insight_metrics",
        "at least one metric is required",
      ));
    }
    if self.cycle_length == Some(0) {
      return Err(EngineError::invalid(
        "cycle_length",
        "must be at least 1 when set, got 0",
      ));
    }
    Ok(())
  }

  /// Build a validated config from the loose JSON contract.
  pub fn from_raw(raw: &RawConfig) -> Result<Self, EngineError> {
    let mut config = Config::default();

    if let Some(name) = &raw.algorithm {
      config.algorithm = name.parse()?;
    }
    if let Some(min) = raw.min_frequency {
      if min < 0 {
        return Err(EngineError::invalid(
          "min_frequency",
          format!("must be a non-negative integer, got {}", min),
        ));
      }
      config.min_frequency = min as u64;
    }
    if let Some(t) = raw.dependency_threshold {
      config.dependency_threshold = t;
    }
    if let Some(t) = raw.causality_threshold {
      config.causality_threshold = t;
    }
    if let Some(t) = raw.and_threshold {
      config.and_threshold = t;
    }
    if let Some(unit) = &raw.time_unit {
      config.time_unit = unit.parse()?;
    }
    if let Some(len) = raw.cycle_length {
      if len < 1 {
        return Err(EngineError::invalid(
          "cycle_length",
          format!("must be at least 1, got {}", len),
        ));
      }
      config.cycle_length = Some(len as usize);
    }
    if let Some(names) = &raw.insight_metrics {
      config.insight_metrics = names
        .iter()
        .map(|n| n.parse())
        .collect::<Result<Vec<_>, _>>()?;
    }

    config.outlier_rule = outlier_rule_from_raw(raw)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json(json: &str) -> Result<Self, EngineError> {
    let raw: RawConfig = serde_json::from_str(json)?;
    Self::from_raw(&raw)
  }
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), EngineError> {
  if !(0.0..=1.0).contains(&value) {
    return Err(EngineError::invalid(
      field,
      format!("must be within [0, 1], got {}", value),
    ));
  }
  Ok(())
}

fn outlier_rule_from_raw(raw: &RawConfig) -> Result<OutlierRule, EngineError> {
  let rule = raw.outlier_rule.as_deref().unwrap_or("zscore");
  let sensitivity = raw.outlier_sensitivity;

  let as_k = |default: usize| -> Result<usize, EngineError> {
    match sensitivity {
      None => Ok(default),
      Some(v) if v.is_finite() && v >= 1.0 && v.fract() == 0.0 => Ok(v as usize),
      Some(v) => Err(EngineError::invalid(
        "outlier_sensitivity",
        format!("k must be a positive integer, got {}", v),
      )),
    }
  };

  match rule.trim().to_ascii_lowercase().as_str() {
    "zscore" | "z_score" | "z-score" => Ok(OutlierRule::ZScore {
      threshold: sensitivity.unwrap_or(OutlierRule::DEFAULT_ZSCORE),
    }),
    "top_k" | "topk" => Ok(OutlierRule::TopK {
      k: as_k(OutlierRule::DEFAULT_K)?,
    }),
    "bottom_k" | "bottomk" => Ok(OutlierRule::BottomK {
      k: as_k(OutlierRule::DEFAULT_K)?,
    }),
    "quantile" => Ok(OutlierRule::Quantile {
      low: raw.quantile_low.unwrap_or(OutlierRule::DEFAULT_QUANTILE_LOW),
      high: raw.quantile_high.unwrap_or(OutlierRule::DEFAULT_QUANTILE_HIGH),
    }),
    other => Err(EngineError::invalid(
      "outlier_rule",
      format!("unknown rule {:?} (expected zscore|top_k|bottom_k|quantile)", other),
    )),
  }
}

// ---------------------------------------------------------------------------
// Raw config (JSON contract, unknown fields ignored)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
  pub algorithm: Option<String>,
  pub min_frequency: Option<i64>,
  pub dependency_threshold: Option<f64>,
  pub causality_threshold: Option<f64>,
  pub and_threshold: Option<f64>,
  pub outlier_rule: Option<String>,
  pub outlier_sensitivity: Option<f64>,
  pub quantile_low: Option<f64>,
  pub quantile_high: Option<f64>,
  pub insight_metrics: Option<Vec<String>>,
  pub time_unit: Option<String>,
  pub cycle_length: Option<i64>,
}
