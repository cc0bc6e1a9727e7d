use serde_json::{Map, Value};

use super::{check_interventions, intervention_config, RepetitionConfig, Targeting};
use crate::error::AuthoringError;
use crate::interventions::Intervention;

/// Distributes the interventions once at the event's start, optionally repeating,
/// to `Demographic_Coverage` of the eligible agents.
#[derive(Debug, Clone)]
pub struct ScheduledCoordinator {
    pub interventions: Vec<Intervention>,
    pub targeting: Targeting,
    pub repetition: Option<RepetitionConfig>,
}

impl ScheduledCoordinator {
    /// # Errors
    /// If `interventions` is empty.
    pub fn new(interventions: Vec<Intervention>, targeting: Targeting) -> Result<Self, AuthoringError> {
        check_interventions(&interventions)?;
        Ok(ScheduledCoordinator {
            interventions,
            targeting,
            repetition: None,
        })
    }

    #[must_use]
    pub fn with_repetition(mut self, repetition: RepetitionConfig) -> Self {
        self.repetition = Some(repetition);
        self
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            "class".to_string(),
            "StandardInterventionDistributionEventCoordinator".into(),
        );
        self.targeting.write_fields(Some(1.0), &mut object);
        if let Some(repetition) = &self.repetition {
            repetition.write_fields(&mut object);
        }
        object.insert(
            "Intervention_Config".to_string(),
            intervention_config(&self.interventions),
        );
        Value::Object(object)
    }
}
