use serde_json::{json, Value};

use crate::error::AuthoringError;
use crate::utils::{get_lower_index, linear_interpolation};

/// How a [`ValueMap`] is read between its points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Step function: the value of the closest point at or before the query time.
    #[default]
    ZeroOrder,
    /// Linear interpolation between neighbouring points.
    Linear,
}

/// An ordered `(times, values)` pair. Constant outside of its ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMap {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl ValueMap {
    /// # Errors
    /// - If `times` and `values` differ in length or are empty
    /// - If `times` is not strictly ascending
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Result<Self, AuthoringError> {
        if times.len() != values.len() {
            return Err(AuthoringError::configuration(format!(
                "value map times ({}) and values ({}) must have the same length",
                times.len(),
                values.len()
            )));
        }
        if times.is_empty() {
            return Err(AuthoringError::configuration(
                "value map must contain at least one point",
            ));
        }
        if let Some(pair) = times.windows(2).find(|w| w[0] >= w[1]) {
            return Err(AuthoringError::configuration(format!(
                "value map times must be strictly ascending, found {} followed by {}",
                pair[0], pair[1]
            )));
        }
        if let Some(v) = times.iter().chain(values.iter()).find(|v| !v.is_finite()) {
            return Err(AuthoringError::configuration(format!(
                "value map entries must be finite, found {v}"
            )));
        }
        Ok(Self { times, values })
    }

    /// Builds a map from `(time, value)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, AuthoringError> {
        let (times, values) = pairs.iter().copied().unzip();
        Self::new(times, values)
    }

    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Reads the map at `t`. A NaN time reads the last value.
    #[must_use]
    pub fn evaluate(&self, t: f64, interpolation: Interpolation) -> f64 {
        let last = self.times.len() - 1;
        if t <= self.times[0] {
            return self.values[0];
        }
        if t.is_nan() || t >= self.times[last] {
            return self.values[last];
        }
        let (lower, _) = get_lower_index(&self.times, t);
        match interpolation {
            Interpolation::ZeroOrder => self.values[lower],
            Interpolation::Linear => linear_interpolation(
                self.times[lower],
                self.times[lower + 1],
                self.values[lower],
                self.values[lower + 1],
                t,
            ),
        }
    }

    /// Number of points whose time lies in `[start, end]`.
    #[must_use]
    pub fn count_within(&self, start: f64, end: f64) -> usize {
        self.times.iter().filter(|&&t| t >= start && t <= end).count()
    }

    /// Checks every value against `[min, max]`.
    pub fn check_values(&self, name: &str, min: f64, max: f64) -> Result<(), AuthoringError> {
        for &v in &self.values {
            crate::error::check_range(name, v, min, max)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({ "Times": self.times, "Values": self.values })
    }
}

#[cfg(test)]
mod test {
    use statrs::assert_almost_eq;

    use super::{Interpolation, ValueMap};

    fn circumcision_map() -> ValueMap {
        ValueMap::from_pairs(&[
            (1960.0, 0.25),
            (1961.0, 0.375),
            (1962.0, 0.4),
            (1963.0, 0.4375),
            (1964.0, 0.46875),
        ])
        .unwrap()
    }

    #[test]
    fn test_zero_order_reads_previous_point() {
        let map = circumcision_map();
        assert_almost_eq!(map.evaluate(1961.5, Interpolation::ZeroOrder), 0.375, 0.0);
        assert_almost_eq!(map.evaluate(1962.0, Interpolation::ZeroOrder), 0.4, 0.0);
    }

    #[test]
    fn test_linear_between_points() {
        let map = circumcision_map();
        assert_almost_eq!(map.evaluate(1960.5, Interpolation::Linear), 0.3125, 1e-12);
    }

    #[test]
    fn test_constant_outside_ends() {
        let map = circumcision_map();
        assert_almost_eq!(map.evaluate(1900.0, Interpolation::Linear), 0.25, 0.0);
        assert_almost_eq!(map.evaluate(2000.0, Interpolation::ZeroOrder), 0.46875, 0.0);
    }

    #[test]
    fn test_nan_time_reads_last_value() {
        let map = circumcision_map();
        for interpolation in [Interpolation::Linear, Interpolation::ZeroOrder] {
            assert_almost_eq!(map.evaluate(f64::NAN, interpolation), 0.46875, 0.0);
        }
    }

    #[test]
    fn test_rejects_unsorted_times() {
        assert!(ValueMap::new(vec![2.0, 1.0], vec![0.0, 0.0]).is_err());
        assert!(ValueMap::new(vec![1.0, 1.0], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let e = ValueMap::new(vec![1.0, 2.0], vec![0.0]).unwrap_err();
        assert!(e.to_string().contains("(2)"));
    }

    #[test]
    fn test_count_within() {
        let map = circumcision_map();
        assert_eq!(map.count_within(1961.0, 1963.0), 3);
        assert_eq!(map.count_within(1970.0, 1980.0), 0);
    }
}
