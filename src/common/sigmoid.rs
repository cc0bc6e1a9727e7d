use serde_json::{json, Value};

use crate::error::{check_probability, AuthoringError};

/// `min + (max - min) / (1 + exp(-rate * (t - mid)))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sigmoid {
    pub min: f64,
    pub max: f64,
    pub mid: f64,
    pub rate: f64,
}

impl Sigmoid {
    /// # Errors
    /// - If `min >= max`
    /// - If any parameter is not finite
    pub fn new(min: f64, max: f64, mid: f64, rate: f64) -> Result<Self, AuthoringError> {
        if [min, max, mid, rate].iter().any(|v| !v.is_finite()) {
            return Err(AuthoringError::configuration(format!(
                "sigmoid parameters must be finite: min={min}, max={max}, mid={mid}, rate={rate}"
            )));
        }
        if min >= max {
            return Err(AuthoringError::configuration(format!(
                "sigmoid min ({min}) must be less than max ({max})"
            )));
        }
        Ok(Self {
            min,
            max,
            mid,
            rate,
        })
    }

    /// A sigmoid whose bounds are probabilities.
    pub fn probability(min: f64, max: f64, mid: f64, rate: f64) -> Result<Self, AuthoringError> {
        check_probability("Sigmoid Min", min)?;
        check_probability("Sigmoid Max", max)?;
        Self::new(min, max, mid, rate)
    }

    #[must_use]
    pub fn evaluate(&self, t: f64) -> f64 {
        self.min + (self.max - self.min) / (1.0 + (-self.rate * (t - self.mid)).exp())
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "Min": self.min,
            "Max": self.max,
            "Mid": self.mid,
            "Rate": self.rate,
        })
    }
}

#[cfg(test)]
mod test {
    use statrs::assert_almost_eq;

    use super::Sigmoid;

    #[test]
    fn test_limits_and_midpoint() {
        let condom_usage = Sigmoid::probability(0.0, 0.6, 2000.0, 1.0).unwrap();
        assert_almost_eq!(condom_usage.evaluate(1900.0), 0.0, 1e-12);
        assert_almost_eq!(condom_usage.evaluate(2100.0), 0.6, 1e-12);
        assert_almost_eq!(condom_usage.evaluate(2000.0), 0.3, 1e-12);
    }

    #[test]
    fn test_min_must_be_below_max() {
        assert!(Sigmoid::new(0.5, 0.5, 2000.0, 1.0).is_err());
        assert!(Sigmoid::new(0.7, 0.5, 2000.0, 1.0).is_err());
    }

    #[test]
    fn test_probability_bounds() {
        assert!(Sigmoid::probability(0.0, 1.5, 2000.0, 1.0).is_err());
    }

    #[test]
    fn test_to_json() {
        let s = Sigmoid::new(0.1, 0.9, 1995.0, 2.0).unwrap();
        assert_eq!(
            s.to_json(),
            serde_json::json!({"Min": 0.1, "Max": 0.9, "Mid": 1995.0, "Rate": 2.0})
        );
    }
}
