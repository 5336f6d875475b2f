#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Descriptive statistics used across the analysis.
//!
//! The central operation is [`weighted_mean`], which is weight-agnostic:
//! callers decide whether the weights are employment, revenue, or revenue
//! per employee, and label the result accordingly. A zero total weight is
//! reported as [`StatsError::ZeroTotalWeight`] instead of producing `NaN`.

/// Errors returned when a statistic is not computable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    /// No values were supplied.
    #[error("no values to aggregate")]
    Empty,

    /// `values` and `weights` differ in length.
    #[error("length mismatch: {values} values vs {weights} weights")]
    LengthMismatch {
        /// Number of values.
        values: usize,
        /// Number of weights.
        weights: usize,
    },

    /// The weights sum to zero, so the weighted mean is undefined.
    #[error("weights sum to zero; weighted mean is not computable")]
    ZeroTotalWeight,

    /// A value or weight is NaN or infinite.
    #[error("non-finite input at position {index}")]
    NonFinite {
        /// Position of the offending element.
        index: usize,
    },

    /// Quantile fraction outside `[0, 1]`.
    #[error("quantile must be within [0, 1]")]
    InvalidQuantile,
}

/// Computes `Σ(value·weight) / Σ(weight)`.
///
/// # Errors
///
/// * [`StatsError::Empty`] if no values are given.
/// * [`StatsError::LengthMismatch`] if the slices differ in length.
/// * [`StatsError::NonFinite`] if any input is NaN or infinite.
/// * [`StatsError::ZeroTotalWeight`] if the weights sum to zero.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Result<f64, StatsError> {
    if values.len() != weights.len() {
        return Err(StatsError::LengthMismatch {
            values: values.len(),
            weights: weights.len(),
        });
    }
    if values.is_empty() {
        return Err(StatsError::Empty);
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for (index, (value, weight)) in values.iter().zip(weights).enumerate() {
        if !value.is_finite() || !weight.is_finite() {
            return Err(StatsError::NonFinite { index });
        }
        weighted_sum += value * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return Err(StatsError::ZeroTotalWeight);
    }

    Ok(weighted_sum / total_weight)
}

/// Arithmetic mean.
///
/// # Errors
///
/// Returns [`StatsError::Empty`] for an empty slice.
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::Empty);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Minimum and maximum of a slice, ignoring nothing (callers filter first).
#[must_use]
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Quantile with linear interpolation between closest ranks.
///
/// `q = 0.5` is the median; `q = 0.9` is the 90th percentile threshold used
/// for top-decile selection.
///
/// # Errors
///
/// Returns [`StatsError::Empty`] for an empty slice and
/// [`StatsError::InvalidQuantile`] if `q` is outside `[0, 1]`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile(values: &[f64], q: f64) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::Empty);
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(StatsError::InvalidQuantile);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Median (the 0.5 quantile).
///
/// # Errors
///
/// Returns [`StatsError::Empty`] for an empty slice.
pub fn median(values: &[f64]) -> Result<f64, StatsError> {
    quantile(values, 0.5)
}

/// Z-score standardization using the population standard deviation.
///
/// A column with zero variance maps to all zeros.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn standardize(values: &[f64]) -> Vec<f64> {
    let Ok(mu) = mean(values) else {
        return Vec::new();
    };
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return vec![0.0; values.len()];
    }

    values.iter().map(|v| (v - mu) / std_dev).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn equal_weights_match_simple_mean() {
        let values = [3.0, 7.5, 11.0, -2.0];
        let weights = [2.0; 4];
        let weighted = weighted_mean(&values, &weights).unwrap();
        assert!((weighted - mean(&values).unwrap()).abs() < EPS);
    }

    #[test]
    fn weights_shift_the_mean() {
        let weighted = weighted_mean(&[10.0, 20.0], &[3.0, 1.0]).unwrap();
        assert!((weighted - 12.5).abs() < EPS);
    }

    #[test]
    fn zero_weights_are_not_computable() {
        assert_eq!(
            weighted_mean(&[1.0, 2.0], &[0.0, 0.0]),
            Err(StatsError::ZeroTotalWeight)
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(weighted_mean(&[], &[]), Err(StatsError::Empty));
        assert_eq!(
            weighted_mean(&[1.0], &[1.0, 2.0]),
            Err(StatsError::LengthMismatch {
                values: 1,
                weights: 2
            })
        );
        assert_eq!(
            weighted_mean(&[1.0, f64::NAN], &[1.0, 1.0]),
            Err(StatsError::NonFinite { index: 1 })
        );
    }

    #[test]
    fn quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert!((quantile(&values, 0.9).unwrap() - 9.1).abs() < EPS);
        assert!((median(&values).unwrap() - 5.5).abs() < EPS);
        assert!((quantile(&values, 0.0).unwrap() - 1.0).abs() < EPS);
        assert!((quantile(&values, 1.0).unwrap() - 10.0).abs() < EPS);
        assert_eq!(quantile(&values, 1.5), Err(StatsError::InvalidQuantile));
    }

    #[test]
    fn min_max_of_slice() {
        assert_eq!(min_max(&[]), None);
        assert_eq!(min_max(&[4.0, -1.0, 9.0]), Some((-1.0, 9.0)));
    }

    #[test]
    fn standardize_centers_and_scales() {
        let z = standardize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!(mean(&z).unwrap().abs() < EPS);
        // population std of the input is exactly 2
        assert!((z[0] + 1.5).abs() < EPS);
        assert!((z[7] - 2.0).abs() < EPS);
    }

    #[test]
    fn standardize_constant_column_is_zero() {
        assert_eq!(standardize(&[3.0, 3.0, 3.0]), vec![0.0, 0.0, 0.0]);
        assert!(standardize(&[]).is_empty());
    }
}
