//! Min-max normalization with an explicit degenerate case.

/// Score assigned to every value when an attribute has zero range in scope.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Observed range of an attribute within one comparison scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Smallest observed value.
    pub min: f64,
    /// Largest observed value.
    pub max: f64,
}

impl Bounds {
    /// Computes bounds over the present values, or `None` if there are none.
    #[must_use]
    pub fn of(values: &[Option<f64>]) -> Option<Self> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        access_map_stats::min_max(&present).map(|(min, max)| Self { min, max })
    }

    /// Zero range: every value in scope is identical.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    /// Scales `value` into `[0, 1]`, or returns [`NEUTRAL_SCORE`] when the
    /// range is degenerate.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            NEUTRAL_SCORE
        } else {
            (value - self.min) / (self.max - self.min)
        }
    }
}

/// Normalizes a column of optional values within one scope.
///
/// Missing values stay missing. Returns the scores and whether the column
/// was degenerate.
#[must_use]
pub fn min_max_normalize(values: &[Option<f64>]) -> (Vec<Option<f64>>, bool) {
    let Some(bounds) = Bounds::of(values) else {
        return (vec![None; values.len()], false);
    };
    let scores = values.iter().map(|v| v.map(|v| bounds.normalize(v))).collect();
    (scores, bounds.is_degenerate())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_into_unit_interval() {
        let (scores, degenerate) = min_max_normalize(&[Some(10.0), Some(20.0), Some(15.0)]);
        assert!(!degenerate);
        assert_eq!(scores, vec![Some(0.0), Some(1.0), Some(0.5)]);
    }

    #[test]
    fn zero_range_is_neutral() {
        let (scores, degenerate) = min_max_normalize(&[Some(7.0), Some(7.0), Some(7.0)]);
        assert!(degenerate);
        assert!(scores.iter().all(|s| *s == Some(NEUTRAL_SCORE)));
    }

    #[test]
    fn single_value_is_degenerate() {
        let (scores, degenerate) = min_max_normalize(&[Some(42.0)]);
        assert!(degenerate);
        assert_eq!(scores, vec![Some(NEUTRAL_SCORE)]);
    }

    #[test]
    fn missing_values_pass_through() {
        let (scores, _) = min_max_normalize(&[Some(1.0), None, Some(3.0)]);
        assert_eq!(scores, vec![Some(0.0), None, Some(1.0)]);

        let (scores, degenerate) = min_max_normalize(&[None, None]);
        assert_eq!(scores, vec![None, None]);
        assert!(!degenerate);
    }
}
