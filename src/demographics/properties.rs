use indexmap::IndexSet;
use serde_json::{json, Value};

use crate::common::Risk;
use crate::error::{check_probability, AuthoringError};

/// The values the simulator recognizes for the `CascadeState` property.
pub const CASCADE_STATES: [&str; 14] = [
    "",
    "LostForever",
    "ARTStaging",
    "TestingOnSymptomatic",
    "TestingOnANC",
    "TestingOnChild6w",
    "ARTStagingDiagnosticTest",
    "LinkingToART",
    "LinkingToPreART",
    "OnART",
    "OnPreART",
    "HCTTestingLoop",
    "HCTUptakeAtDebut",
    "HCTUptakePostDebut",
];

const SUM_TOLERANCE: f64 = 1e-6;

/// An individual property with its values and the fraction of the population
/// starting in each.
#[derive(Debug, Clone, PartialEq)]
pub struct IndividualProperty {
    property: String,
    values: Vec<String>,
    initial_distribution: Vec<f64>,
}

impl IndividualProperty {
    /// # Errors
    /// - If the property name is empty or a value is repeated
    /// - If `values` and `initial_distribution` differ in length or are empty
    /// - If a fraction is outside [0, 1] or the fractions do not sum to 1
    pub fn new<S: AsRef<str>>(
        property: &str,
        values: &[S],
        initial_distribution: &[f64],
    ) -> Result<Self, AuthoringError> {
        let property = property.trim();
        if property.is_empty() {
            return Err(AuthoringError::configuration(
                "an individual property needs a name",
            ));
        }
        if values.is_empty() || values.len() != initial_distribution.len() {
            return Err(AuthoringError::configuration(format!(
                "individual property '{property}' has {} value(s) but an initial distribution of length {}",
                values.len(),
                initial_distribution.len()
            )));
        }
        let unique: IndexSet<&str> = values.iter().map(|v| v.as_ref()).collect();
        if unique.len() != values.len() {
            return Err(AuthoringError::configuration(format!(
                "individual property '{property}' repeats a value"
            )));
        }
        for &fraction in initial_distribution {
            check_probability("Initial_Distribution", fraction)?;
        }
        let sum: f64 = initial_distribution.iter().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(AuthoringError::configuration(format!(
                "the initial distribution of individual property '{property}' sums to {sum}, not 1"
            )));
        }
        Ok(IndividualProperty {
            property: property.to_string(),
            values: values.iter().map(|v| v.as_ref().to_string()).collect(),
            initial_distribution: initial_distribution.to_vec(),
        })
    }

    /// # Errors
    /// See [`IndividualProperty::new`].
    pub fn risk(low: f64, medium: f64, high: f64) -> Result<Self, AuthoringError> {
        Self::new("Risk", &Risk::ALL.map(Risk::as_str), &[low, medium, high])
    }

    /// # Errors
    /// See [`IndividualProperty::new`].
    pub fn accessibility(yes: f64) -> Result<Self, AuthoringError> {
        Self::new("Accessibility", &["Yes", "No"], &[yes, 1.0 - yes])
    }

    /// # Errors
    /// If a value is not a recognized cascade state, otherwise see [`IndividualProperty::new`].
    pub fn cascade_state<S: AsRef<str>>(
        values: &[S],
        initial_distribution: &[f64],
    ) -> Result<Self, AuthoringError> {
        if let Some(unknown) = values
            .iter()
            .map(|v| v.as_ref())
            .find(|v| !CASCADE_STATES.contains(v))
        {
            return Err(AuthoringError::configuration(format!(
                "'{unknown}' is not a recognized CascadeState value"
            )));
        }
        Self::new("CascadeState", values, initial_distribution)
    }

    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    #[must_use]
    pub fn initial_distribution(&self) -> &[f64] {
        &self.initial_distribution
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "Property": self.property,
            "Values": self.values,
            "Initial_Distribution": self.initial_distribution,
        })
    }
}

/// Replaces the property of the same name in `properties`, or appends it.
pub(crate) fn upsert(properties: &mut Vec<IndividualProperty>, property: IndividualProperty) {
    match properties.iter_mut().find(|p| p.property == property.property) {
        Some(existing) => *existing = property,
        None => properties.push(property),
    }
}
