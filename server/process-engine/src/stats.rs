//! Descriptive statistics shared by the metric tables and the insight detector.

use serde::Serialize;

/// Summary of a sample of durations (already converted to the report unit).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DurationStats {
  pub total: f64,
  pub min: f64,
  pub max: f64,
  pub mean: f64,
  pub median: f64,
  /// Population variance (ddof = 0).
  pub variance: f64,
  pub std: f64,
}

impl DurationStats {
  /// Summarize `values`; an empty sample yields all zeros.
  ///
  /// Values are sorted first so the floating-point sums do not depend on the
  /// order partial results were merged in.
  pub fn from_values(values: &[f64]) -> Self {
    if values.is_empty() {
      return Self::default();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let total: f64 = sorted.iter().sum();
    let variance = variance(&sorted);
    Self {
      total,
      min: sorted[0],
      max: sorted[sorted.len() - 1],
      mean: total / sorted.len() as f64,
      median: median(&sorted),
      variance,
      std: variance.sqrt(),
    }
  }
}

pub fn mean(values: &[f64]) -> f64 {
  if values.is_empty() {
    return 0.0;
  }
  values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (ddof = 0).
pub fn variance(values: &[f64]) -> f64 {
  if values.is_empty() {
    return 0.0;
  }
  let m = mean(values);
  values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
  variance(values).sqrt()
}

pub fn median(values: &[f64]) -> f64 {
  quantile(values, 0.5)
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> f64 {
  if values.is_empty() {
    return 0.0;
  }
  let mut sorted = values.to_vec();
  sorted.sort_by(f64::total_cmp);
  let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
  let lo = pos.floor() as usize;
  let hi = pos.ceil() as usize;
  let frac = pos - lo as f64;
  sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Standard scores of `values`, all zero when the sample has no spread.
///
/// Equal values whose mean picks up rounding noise count as no spread.
pub fn z_scores(values: &[f64]) -> Vec<f64> {
  let m = mean(values);
  let std = std_dev(values);
  let flat = values.windows(2).all(|w| w[0] == w[1]);
  if flat || std <= f64::EPSILON * m.abs().max(1.0) {
    return vec![0.0; values.len()];
  }
  values.iter().map(|v| (v - m) / std).collect()
}

/// Divide, reporting 0 for an empty denominator.
pub fn ratio(num: f64, den: f64) -> f64 {
  if den == 0.0 {
    0.0
  } else {
    num / den
  }
}
