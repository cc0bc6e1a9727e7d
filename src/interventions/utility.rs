use serde_json::{Map, Value};

use super::{check_event, flag, InterventionPayload};
use crate::common::parse_key_value;
use crate::error::{check_non_negative, check_probability, AuthoringError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    pub event: String,
}

impl BroadcastEvent {
    /// # Errors
    /// If `event` is empty.
    pub fn new(event: &str) -> Result<Self, AuthoringError> {
        Ok(BroadcastEvent {
            event: check_event("Broadcast_Event", event)?,
        })
    }
}

impl InterventionPayload for BroadcastEvent {
    fn class_name(&self) -> &str {
        "BroadcastEvent"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("Broadcast_Event".to_string(), self.event.clone().into());
    }

    fn event_references(&self) -> Vec<&str> {
        vec![self.event.as_str()]
    }

    fn accepts_cost(&self) -> bool {
        false
    }
}

/// Moves the recipient to a new individual property value, each day with
/// `daily_probability`, optionally reverting after `revert_days`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValueChanger {
    pub target_property_key: String,
    pub target_property_value: String,
    pub daily_probability: f64,
    pub maximum_duration: f64,
    pub revert_days: Option<f64>,
}

impl PropertyValueChanger {
    /// # Errors
    /// If `key_value` is not of the form `Key:Value` or the probability is outside of
    /// [0, 1].
    pub fn new(key_value: &str, daily_probability: f64) -> Result<Self, AuthoringError> {
        let (key, value) = parse_key_value(key_value)?;
        Ok(PropertyValueChanger {
            target_property_key: key,
            target_property_value: value,
            daily_probability: check_probability("Daily_Probability", daily_probability)?,
            maximum_duration: 3.40282e38,
            revert_days: None,
        })
    }

    /// # Errors
    /// If `days` is negative.
    pub fn with_revert(mut self, days: f64) -> Result<Self, AuthoringError> {
        self.revert_days = Some(check_non_negative("Revert", days)?);
        Ok(self)
    }

    /// # Errors
    /// If `days` is negative.
    pub fn with_maximum_duration(mut self, days: f64) -> Result<Self, AuthoringError> {
        self.maximum_duration = check_non_negative("Maximum_Duration", days)?;
        Ok(self)
    }
}

impl InterventionPayload for PropertyValueChanger {
    fn class_name(&self) -> &str {
        "PropertyValueChanger"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "Target_Property_Key".to_string(),
            self.target_property_key.clone().into(),
        );
        object.insert(
            "Target_Property_Value".to_string(),
            self.target_property_value.clone().into(),
        );
        object.insert("Daily_Probability".to_string(), self.daily_probability.into());
        object.insert("Maximum_Duration".to_string(), self.maximum_duration.into());
        if let Some(days) = self.revert_days {
            object.insert("Revert".to_string(), days.into());
        }
    }
}

/// Infects the recipient directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutbreakIndividual {
    pub ignore_immunity: bool,
    /// Days of incubation, overriding the drawn one.
    pub incubation_period_override: Option<f64>,
}

impl OutbreakIndividual {
    /// # Errors
    /// If the override is negative.
    pub fn new(
        ignore_immunity: bool,
        incubation_period_override: Option<f64>,
    ) -> Result<Self, AuthoringError> {
        if let Some(days) = incubation_period_override {
            check_non_negative("Incubation_Period_Override", days)?;
        }
        Ok(OutbreakIndividual {
            ignore_immunity,
            incubation_period_override,
        })
    }
}

impl InterventionPayload for OutbreakIndividual {
    fn class_name(&self) -> &str {
        "OutbreakIndividual"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("Ignore_Immunity".to_string(), flag(self.ignore_immunity));
        object.insert(
            "Incubation_Period_Override".to_string(),
            self.incubation_period_override.unwrap_or(-1.0).into(),
        );
    }
}

/// Records the recipient's viral load and CD4 count, then broadcasts an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HivDrawBlood {
    pub positive_event: String,
}

impl HivDrawBlood {
    /// # Errors
    /// If `positive_event` is empty.
    pub fn new(positive_event: &str) -> Result<Self, AuthoringError> {
        Ok(HivDrawBlood {
            positive_event: check_event("Positive_Diagnosis_Event", positive_event)?,
        })
    }
}

impl InterventionPayload for HivDrawBlood {
    fn class_name(&self) -> &str {
        "HIVDrawBlood"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "Positive_Diagnosis_Event".to_string(),
            self.positive_event.clone().into(),
        );
    }

    fn event_references(&self) -> Vec<&str> {
        vec![self.positive_event.as_str()]
    }
}
