//! The parameterized distributions the simulator accepts for delays, durations
//! and expirations.
//!
//! A distribution is serialized relative to a field prefix, e.g. a delay
//! becomes `Delay_Period_Distribution = "GAUSSIAN_DISTRIBUTION"` together with
//! `Delay_Period_Gaussian_Mean` and `Delay_Period_Gaussian_Std_Dev`.

use rand::Rng;
use rand_distr::{Distribution as _, Exp, LogNormal, Normal, Poisson, Weibull};
use serde_json::{Map, Value};

use crate::error::{check_non_negative, check_probability, AuthoringError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    Constant { value: f64 },
    Uniform { min: f64, max: f64 },
    Gaussian { mean: f64, std_dev: f64 },
    Exponential { mean: f64 },
    Poisson { mean: f64 },
    LogNormal { mu: f64, sigma: f64 },
    /// `proportion_0` of the draws are zero, the rest are `peak_2_value`.
    DualConstant { proportion_0: f64, peak_2_value: f64 },
    Weibull { kappa: f64, lambda: f64 },
    DualExponential { mean_1: f64, mean_2: f64, proportion_1: f64 },
}

impl Distribution {
    pub fn constant(value: f64) -> Result<Self, AuthoringError> {
        check_non_negative("Constant", value)?;
        Ok(Distribution::Constant { value })
    }

    pub fn uniform(min: f64, max: f64) -> Result<Self, AuthoringError> {
        Distribution::Uniform { min, max }.validated()
    }

    pub fn gaussian(mean: f64, std_dev: f64) -> Result<Self, AuthoringError> {
        Distribution::Gaussian { mean, std_dev }.validated()
    }

    pub fn exponential(mean: f64) -> Result<Self, AuthoringError> {
        Distribution::Exponential { mean }.validated()
    }

    pub fn poisson(mean: f64) -> Result<Self, AuthoringError> {
        Distribution::Poisson { mean }.validated()
    }

    pub fn log_normal(mu: f64, sigma: f64) -> Result<Self, AuthoringError> {
        Distribution::LogNormal { mu, sigma }.validated()
    }

    pub fn dual_constant(proportion_0: f64, peak_2_value: f64) -> Result<Self, AuthoringError> {
        Distribution::DualConstant {
            proportion_0,
            peak_2_value,
        }
        .validated()
    }

    pub fn weibull(kappa: f64, lambda: f64) -> Result<Self, AuthoringError> {
        Distribution::Weibull { kappa, lambda }.validated()
    }

    pub fn dual_exponential(
        mean_1: f64,
        mean_2: f64,
        proportion_1: f64,
    ) -> Result<Self, AuthoringError> {
        Distribution::DualExponential {
            mean_1,
            mean_2,
            proportion_1,
        }
        .validated()
    }

    fn validated(self) -> Result<Self, AuthoringError> {
        self.validate()?;
        Ok(self)
    }

    /// # Errors
    /// - If a scale parameter is negative (or not positive where the distribution needs it)
    /// - If a proportion is outside of [0, 1]
    /// - If a uniform distribution has `min > max`
    pub fn validate(&self) -> Result<(), AuthoringError> {
        match *self {
            Distribution::Constant { value } => {
                check_non_negative("Constant", value)?;
            }
            Distribution::Uniform { min, max } => {
                check_non_negative("Min", min)?;
                check_non_negative("Max", max)?;
                if min > max {
                    return Err(AuthoringError::configuration(format!(
                        "uniform distribution min ({min}) must not exceed max ({max})"
                    )));
                }
            }
            Distribution::Gaussian { mean, std_dev } => {
                check_non_negative("Gaussian_Mean", mean)?;
                check_non_negative("Gaussian_Std_Dev", std_dev)?;
            }
            Distribution::Exponential { mean } => {
                check_positive("Exponential", mean)?;
            }
            Distribution::Poisson { mean } => {
                check_positive("Poisson_Mean", mean)?;
            }
            Distribution::LogNormal { mu, sigma } => {
                if !mu.is_finite() {
                    return Err(AuthoringError::configuration(format!(
                        "log normal mu must be finite, got {mu}"
                    )));
                }
                check_non_negative("Log_Normal_Sigma", sigma)?;
            }
            Distribution::DualConstant {
                proportion_0,
                peak_2_value,
            } => {
                check_probability("Proportion_0", proportion_0)?;
                check_non_negative("Peak_2_Value", peak_2_value)?;
            }
            Distribution::Weibull { kappa, lambda } => {
                check_positive("Kappa", kappa)?;
                check_positive("Lambda", lambda)?;
            }
            Distribution::DualExponential {
                mean_1,
                mean_2,
                proportion_1,
            } => {
                check_positive("Mean_1", mean_1)?;
                check_positive("Mean_2", mean_2)?;
                check_probability("Proportion_1", proportion_1)?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Distribution::Constant { .. } => "CONSTANT_DISTRIBUTION",
            Distribution::Uniform { .. } => "UNIFORM_DISTRIBUTION",
            Distribution::Gaussian { .. } => "GAUSSIAN_DISTRIBUTION",
            Distribution::Exponential { .. } => "EXPONENTIAL_DISTRIBUTION",
            Distribution::Poisson { .. } => "POISSON_DISTRIBUTION",
            Distribution::LogNormal { .. } => "LOG_NORMAL_DISTRIBUTION",
            Distribution::DualConstant { .. } => "DUAL_CONSTANT_DISTRIBUTION",
            Distribution::Weibull { .. } => "WEIBULL_DISTRIBUTION",
            Distribution::DualExponential { .. } => "DUAL_EXPONENTIAL_DISTRIBUTION",
        }
    }

    /// Writes `<prefix>_Distribution` and the parameter fields into `object`.
    pub fn write_fields(&self, prefix: &str, object: &mut Map<String, Value>) {
        object.insert(format!("{prefix}_Distribution"), self.type_name().into());
        let mut put = |suffix: &str, value: f64| {
            object.insert(format!("{prefix}_{suffix}"), value.into());
        };
        match *self {
            Distribution::Constant { value } => put("Constant", value),
            Distribution::Uniform { min, max } => {
                put("Min", min);
                put("Max", max);
            }
            Distribution::Gaussian { mean, std_dev } => {
                put("Gaussian_Mean", mean);
                put("Gaussian_Std_Dev", std_dev);
            }
            Distribution::Exponential { mean } => put("Exponential", mean),
            Distribution::Poisson { mean } => put("Poisson_Mean", mean),
            Distribution::LogNormal { mu, sigma } => {
                put("Log_Normal_Mu", mu);
                put("Log_Normal_Sigma", sigma);
            }
            Distribution::DualConstant {
                proportion_0,
                peak_2_value,
            } => {
                put("Proportion_0", proportion_0);
                put("Peak_2_Value", peak_2_value);
            }
            Distribution::Weibull { kappa, lambda } => {
                put("Kappa", kappa);
                put("Lambda", lambda);
            }
            Distribution::DualExponential {
                mean_1,
                mean_2,
                proportion_1,
            } => {
                put("Mean_1", mean_1);
                put("Mean_2", mean_2);
                put("Proportion_1", proportion_1);
            }
        }
    }

    /// The expected value of a draw.
    #[must_use]
    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Uniform { min, max } => f64::midpoint(min, max),
            Distribution::Gaussian { mean, .. }
            | Distribution::Exponential { mean }
            | Distribution::Poisson { mean } => mean,
            Distribution::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            Distribution::DualConstant {
                proportion_0,
                peak_2_value,
            } => (1.0 - proportion_0) * peak_2_value,
            Distribution::Weibull { kappa, lambda } => lambda * gamma(1.0 + 1.0 / kappa),
            Distribution::DualExponential {
                mean_1,
                mean_2,
                proportion_1,
            } => proportion_1 * mean_1 + (1.0 - proportion_1) * mean_2,
        }
    }

    /// Draws a value. Gaussian draws are truncated at zero, as the simulator does for
    /// durations.
    ///
    /// # Errors
    /// If the parameters are rejected by the sampler.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<f64, AuthoringError> {
        let sampler_error = |e: &dyn std::fmt::Display| {
            AuthoringError::configuration(format!("cannot sample {}: {e}", self.type_name()))
        };
        let value = match *self {
            Distribution::Constant { value } => value,
            Distribution::Uniform { min, max } => {
                if min < max {
                    rng.random_range(min..max)
                } else {
                    min
                }
            }
            Distribution::Gaussian { mean, std_dev } => Normal::new(mean, std_dev)
                .map_err(|e| sampler_error(&e))?
                .sample(rng)
                .max(0.0),
            Distribution::Exponential { mean } => Exp::new(1.0 / mean)
                .map_err(|e| sampler_error(&e))?
                .sample(rng),
            Distribution::Poisson { mean } => Poisson::new(mean)
                .map_err(|e| sampler_error(&e))?
                .sample(rng),
            Distribution::LogNormal { mu, sigma } => LogNormal::new(mu, sigma)
                .map_err(|e| sampler_error(&e))?
                .sample(rng),
            Distribution::DualConstant {
                proportion_0,
                peak_2_value,
            } => {
                if rng.random_bool(proportion_0) {
                    0.0
                } else {
                    peak_2_value
                }
            }
            Distribution::Weibull { kappa, lambda } => Weibull::new(lambda, kappa)
                .map_err(|e| sampler_error(&e))?
                .sample(rng),
            Distribution::DualExponential {
                mean_1,
                mean_2,
                proportion_1,
            } => {
                let mean = if rng.random_bool(proportion_1) {
                    mean_1
                } else {
                    mean_2
                };
                Exp::new(1.0 / mean)
                    .map_err(|e| sampler_error(&e))?
                    .sample(rng)
            }
        };
        Ok(value)
    }
}

fn check_positive(name: &str, value: f64) -> Result<f64, AuthoringError> {
    if value.is_nan() || value <= 0.0 {
        return Err(AuthoringError::range(name, value, f64::MIN_POSITIVE, f64::MAX));
    }
    Ok(value)
}

/// Lanczos approximation of the gamma function, good to ~1e-13 for positive arguments.
fn gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        return std::f64::consts::PI / ((std::f64::consts::PI * x).sin() * gamma(1.0 - x));
    }
    let x = x - 1.0;
    let mut a = COEFFICIENTS[0];
    let t = x + G + 0.5;
    for (i, c) in COEFFICIENTS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    (2.0 * std::f64::consts::PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * a
}
