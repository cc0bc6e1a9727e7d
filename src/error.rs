use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Every fallible operation in the crate returns this error. Messages always
/// carry the offending value so the modeler can find the bad argument.
#[derive(Error, Debug)]
pub enum AuthoringError {
    /// A structural rule was violated (mismatched lengths, overlapping age bands,
    /// missing companion parameter, distribution not summing to one, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A numeric value is outside of its declared domain.
    #[error("range error: {name} = {value} is outside of [{min}, {max}]")]
    Range {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Reference to a class that the schema does not declare.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("schema error: class '{class}' has no field '{field}'")]
    FieldUnknown { class: String, field: String },

    #[error("type error: field '{field}' of '{class}' expects {expected}, got {value}")]
    Type {
        class: String,
        field: String,
        expected: String,
        value: String,
    },

    #[error("incomplete object: '{class}' is missing required field(s) {missing:?}")]
    IncompleteObject { class: String, missing: Vec<String> },

    #[error("unknown node: no node with id {0}")]
    UnknownNode(u32),

    #[error("forbidden parameter: '{intervention}' does not accept '{parameter}'")]
    ForbiddenParameter {
        intervention: String,
        parameter: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl AuthoringError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AuthoringError::Configuration(message.into())
    }

    pub fn range(name: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        AuthoringError::Range {
            name: name.into(),
            value,
            min,
            max,
        }
    }

    pub fn forbidden(intervention: impl Into<String>, parameter: impl Into<String>) -> Self {
        AuthoringError::ForbiddenParameter {
            intervention: intervention.into(),
            parameter: parameter.into(),
        }
    }
}

/// Checks that `value` lies in the closed interval `[min, max]`.
///
/// # Errors
/// Returns [`AuthoringError::Range`] naming the parameter when it does not, or when
/// `value` is NaN.
pub fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<f64, AuthoringError> {
    if value.is_nan() || value < min || value > max {
        return Err(AuthoringError::range(name, value, min, max));
    }
    Ok(value)
}

pub fn check_probability(name: &str, value: f64) -> Result<f64, AuthoringError> {
    check_range(name, value, 0.0, 1.0)
}

pub fn check_non_negative(name: &str, value: f64) -> Result<f64, AuthoringError> {
    check_range(name, value, 0.0, f64::MAX)
}

/// A soft notice raised while building a document. Warnings never change the
/// object they were raised on; they are collected so tooling can act on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub source: String,
    pub message: String,
}

impl Warning {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        let warning = Warning {
            source: source.into(),
            message: message.into(),
        };
        log::warn!("{warning}");
        warning
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}
