use serde_json::{Map, Value};

use super::{check_event, Intervention};
use crate::error::AuthoringError;

/// What an intervention does when it resolves: broadcast an event, or hand out a
/// further intervention.
#[derive(Debug, Clone)]
pub enum Outcome {
    Event(String),
    Config(Box<Intervention>),
}

impl Outcome {
    /// # Errors
    /// If `event` is empty.
    pub fn event(event: &str) -> Result<Self, AuthoringError> {
        Ok(Outcome::Event(check_event("Outcome", event)?))
    }

    #[must_use]
    pub fn config(intervention: impl Into<Intervention>) -> Self {
        Outcome::Config(Box::new(intervention.into()))
    }

    /// The simulator's `Event_Or_Config` switch value.
    #[must_use]
    pub fn switch(&self) -> &'static str {
        match self {
            Outcome::Event(_) => "Event",
            Outcome::Config(_) => "Config",
        }
    }

    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        match self {
            Outcome::Event(event) => Some(event),
            Outcome::Config(_) => None,
        }
    }

    #[must_use]
    pub fn intervention(&self) -> Option<&Intervention> {
        match self {
            Outcome::Event(_) => None,
            Outcome::Config(intervention) => Some(intervention),
        }
    }

    /// Writes `<event_field>` or `<config_field>` depending on the variant.
    pub(crate) fn write_fields(&self, event_field: &str, config_field: &str, object: &mut Map<String, Value>) {
        match self {
            Outcome::Event(event) => {
                object.insert(event_field.to_string(), event.clone().into());
            }
            Outcome::Config(intervention) => {
                object.insert(config_field.to_string(), intervention.to_json());
            }
        }
    }
}

/// Positive and optional negative outcome of a diagnostic. The simulator reads
/// both through one `Event_Or_Config` switch, so they must be of the same variant.
#[derive(Debug, Clone)]
pub struct DiagnosisOutcomes {
    positive: Outcome,
    negative: Option<Outcome>,
}

impl DiagnosisOutcomes {
    /// # Errors
    /// If the negative outcome is not of the same variant as the positive one.
    pub fn new(positive: Outcome, negative: Option<Outcome>) -> Result<Self, AuthoringError> {
        if let Some(negative) = &negative {
            if negative.switch() != positive.switch() {
                return Err(AuthoringError::configuration(format!(
                    "The negative diagnosis is a {} but the positive diagnosis is a {}; \
                     both must be events or both must be configs.",
                    negative.switch(),
                    positive.switch()
                )));
            }
        }
        Ok(DiagnosisOutcomes { positive, negative })
    }

    #[must_use]
    pub fn positive_event(event: &str) -> Self {
        DiagnosisOutcomes {
            positive: Outcome::Event(event.to_string()),
            negative: None,
        }
    }

    /// Builds the outcomes from the four optional parameters a modeler may set.
    ///
    /// # Errors
    /// - If neither or both positive parameters are given
    /// - If both negative parameters are given
    /// - If the negative parameter is not of the same variant as the positive one
    pub fn from_parts(
        positive_config: Option<Intervention>,
        positive_event: Option<&str>,
        negative_config: Option<Intervention>,
        negative_event: Option<&str>,
    ) -> Result<Self, AuthoringError> {
        let positive = match (positive_config, positive_event) {
            (Some(config), None) => Outcome::config(config),
            (None, Some(event)) => Outcome::Event(check_event("Positive_Diagnosis_Event", event)?),
            (Some(_), Some(_)) => {
                return Err(AuthoringError::configuration(
                    "Only one of positive_diagnosis_config and positive_diagnosis_event may be set.",
                ))
            }
            (None, None) => {
                return Err(AuthoringError::configuration(
                    "One of positive_diagnosis_config and positive_diagnosis_event must be set.",
                ))
            }
        };
        let negative = match (negative_config, negative_event) {
            (Some(config), None) => Some(Outcome::config(config)),
            (None, Some(event)) => Some(Outcome::Event(check_event(
                "Negative_Diagnosis_Event",
                event,
            )?)),
            (Some(_), Some(_)) => {
                return Err(AuthoringError::configuration(
                    "Only one of negative_diagnosis_config and negative_diagnosis_event may be set.",
                ))
            }
            (None, None) => None,
        };
        Self::new(positive, negative)
    }

    #[must_use]
    pub fn positive(&self) -> &Outcome {
        &self.positive
    }

    #[must_use]
    pub fn negative(&self) -> Option<&Outcome> {
        self.negative.as_ref()
    }

    pub(crate) fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("Event_Or_Config".to_string(), self.positive.switch().into());
        self.positive
            .write_fields("Positive_Diagnosis_Event", "Positive_Diagnosis_Config", object);
        if let Some(negative) = &self.negative {
            negative.write_fields("Negative_Diagnosis_Event", "Negative_Diagnosis_Config", object);
        }
    }

    pub(crate) fn event_references(&self) -> Vec<&str> {
        [Some(&self.positive), self.negative.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(Outcome::event_name)
            .collect()
    }

    pub(crate) fn nested(&self) -> Vec<&Intervention> {
        [Some(&self.positive), self.negative.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(Outcome::intervention)
            .collect()
    }
}
