use serde_json::{Map, Value};

use super::{check_interventions, intervention_config, RepetitionConfig, Targeting};
use crate::common::Distribution;
use crate::error::AuthoringError;
use crate::interventions::{check_event, DelayedIntervention, Intervention};

/// Where in the simulator's timestep a triggered handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerTier {
    /// Runs per agent after relationships are updated, so relationships that
    /// started this timestep are visible to `HasRelationship(that_recently = STARTED)`.
    #[default]
    Individual,
    /// Runs at coordinator level before relationships are updated; this timestep's
    /// relationship changes are not yet visible.
    Coordinator,
}

/// Applies its interventions each time an agent broadcasts one of `triggers`.
#[derive(Debug, Clone)]
pub struct TriggeredCoordinator {
    pub interventions: Vec<Intervention>,
    pub triggers: Vec<String>,
    /// Days the listener stays active; `-1` keeps it forever.
    pub duration: f64,
    pub tier: TriggerTier,
    pub targeting: Targeting,
    pub delay: Option<Distribution>,
    pub stop_triggers: Vec<String>,
    pub completion_event: Option<String>,
    pub repetition: Option<RepetitionConfig>,
}

impl TriggeredCoordinator {
    /// # Errors
    /// - If `interventions` or `triggers` is empty, or a trigger name is empty
    /// - If `duration` is neither `-1` nor non-negative
    pub fn new(
        interventions: Vec<Intervention>,
        triggers: &[&str],
        duration: f64,
        targeting: Targeting,
    ) -> Result<Self, AuthoringError> {
        check_interventions(&interventions)?;
        if triggers.is_empty() {
            return Err(AuthoringError::configuration(
                "A triggered coordinator needs at least one trigger.",
            ));
        }
        let triggers = triggers
            .iter()
            .map(|t| check_event("Trigger_Condition_List", t))
            .collect::<Result<Vec<_>, _>>()?;
        #[allow(clippy::float_cmp)]
        let forever = duration == -1.0;
        if !forever && (duration.is_nan() || duration < 0.0) {
            return Err(AuthoringError::configuration(format!(
                "Duration must be -1 (forever) or non-negative, got {duration}."
            )));
        }
        Ok(TriggeredCoordinator {
            interventions,
            triggers,
            duration,
            tier: TriggerTier::Individual,
            targeting,
            delay: None,
            stop_triggers: Vec::new(),
            completion_event: None,
            repetition: None,
        })
    }

    /// Moves the handler to the coordinator tier.
    ///
    /// # Errors
    /// If a stop trigger or the completion event is empty.
    pub fn at_coordinator_tier(
        mut self,
        stop_triggers: &[&str],
        completion_event: Option<&str>,
    ) -> Result<Self, AuthoringError> {
        self.tier = TriggerTier::Coordinator;
        self.stop_triggers = stop_triggers
            .iter()
            .map(|t| check_event("Stop_Trigger_Condition_List", t))
            .collect::<Result<Vec<_>, _>>()?;
        self.completion_event = completion_event
            .map(|event| check_event("Completion_Event", event))
            .transpose()?;
        Ok(self)
    }

    /// Delays the interventions by a draw from `delay`. Only the individual tier
    /// supports a delay.
    ///
    /// # Errors
    /// If the delay is invalid or the coordinator is at the coordinator tier.
    pub fn with_delay(mut self, delay: Distribution) -> Result<Self, AuthoringError> {
        delay.validate()?;
        if self.tier == TriggerTier::Coordinator {
            return Err(AuthoringError::configuration(
                "A delay can only be applied to an individual-tier triggered coordinator.",
            ));
        }
        self.delay = Some(delay);
        Ok(self)
    }

    #[must_use]
    pub fn with_repetition(mut self, repetition: RepetitionConfig) -> Self {
        self.repetition = Some(repetition);
        self
    }

    pub(crate) fn trigger_events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.triggers.iter().map(String::as_str).collect();
        events.extend(self.stop_triggers.iter().map(String::as_str));
        events.extend(self.completion_event.as_deref());
        events
    }

    fn actual_config(&self) -> Value {
        match &self.delay {
            None => intervention_config(&self.interventions),
            Some(delay) => Intervention::from(DelayedIntervention {
                delay: *delay,
                configs: self.interventions.clone(),
            })
            .to_json(),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self.tier {
            TriggerTier::Individual => self.individual_tier_json(),
            TriggerTier::Coordinator => self.coordinator_tier_json(),
        }
    }

    fn individual_tier_json(&self) -> Value {
        let mut listener = Map::new();
        listener.insert("class".to_string(), "NodeLevelHealthTriggeredIV".into());
        listener.insert("Trigger_Condition_List".to_string(), self.triggers.clone().into());
        listener.insert("Duration".to_string(), self.duration.into());
        self.targeting.write_fields(Some(1.0), &mut listener);
        listener.insert(
            "Actual_IndividualIntervention_Config".to_string(),
            self.actual_config(),
        );

        let mut object = Map::new();
        object.insert(
            "class".to_string(),
            "StandardInterventionDistributionEventCoordinator".into(),
        );
        if let Some(repetition) = &self.repetition {
            repetition.write_fields(&mut object);
        }
        object.insert("Intervention_Config".to_string(), Value::Object(listener));
        Value::Object(object)
    }

    fn coordinator_tier_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("class".to_string(), "TriggeredEventCoordinator".into());
        object.insert(
            "Start_Trigger_Condition_List".to_string(),
            self.triggers.clone().into(),
        );
        object.insert(
            "Stop_Trigger_Condition_List".to_string(),
            self.stop_triggers.clone().into(),
        );
        object.insert("Duration".to_string(), self.duration.into());
        self.targeting.write_fields(Some(1.0), &mut object);
        if let Some(repetition) = &self.repetition {
            repetition.write_fields(&mut object);
        }
        if let Some(event) = &self.completion_event {
            object.insert("Completion_Event".to_string(), event.clone().into());
        }
        object.insert(
            "Intervention_Config".to_string(),
            intervention_config(&self.interventions),
        );
        Value::Object(object)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{TriggerTier, TriggeredCoordinator};
    use crate::common::Distribution;
    use crate::coordinators::{Coordinator, Targeting};
    use crate::interventions::{ArtDropout, BroadcastEvent, Intervention};

    fn art_dropout() -> Vec<Intervention> {
        vec![Intervention::from(ArtDropout)]
    }

    #[test]
    fn test_individual_tier_wraps_listener() {
        let coordinator =
            TriggeredCoordinator::new(art_dropout(), &["HIVTestedPositive"], -1.0, Targeting::default())
                .unwrap();
        assert_eq!(coordinator.tier, TriggerTier::Individual);
        let json = coordinator.to_json();
        assert_eq!(
            json["class"],
            "StandardInterventionDistributionEventCoordinator"
        );
        let listener = &json["Intervention_Config"];
        assert_eq!(listener["class"], "NodeLevelHealthTriggeredIV");
        assert_eq!(listener["Trigger_Condition_List"], json!(["HIVTestedPositive"]));
        assert_eq!(listener["Duration"], json!(-1.0));
        assert_eq!(
            listener["Actual_IndividualIntervention_Config"]["class"],
            "ARTDropout"
        );
    }

    #[test]
    fn test_coordinator_tier() {
        let coordinator =
            TriggeredCoordinator::new(art_dropout(), &["StartCampaign"], 365.0, Targeting::default())
                .unwrap()
                .at_coordinator_tier(&["StopCampaign"], Some("CampaignDone"))
                .unwrap();
        let json = coordinator.to_json();
        assert_eq!(json["class"], "TriggeredEventCoordinator");
        assert_eq!(json["Start_Trigger_Condition_List"], json!(["StartCampaign"]));
        assert_eq!(json["Stop_Trigger_Condition_List"], json!(["StopCampaign"]));
        assert_eq!(json["Completion_Event"], "CampaignDone");
        assert!(coordinator
            .clone()
            .with_delay(Distribution::constant(1.0).unwrap())
            .is_err());
        assert_eq!(
            Coordinator::from(coordinator).event_references(),
            vec!["StartCampaign", "StopCampaign", "CampaignDone"]
        );
    }

    #[test]
    fn test_delay_wraps_interventions() {
        let coordinator = TriggeredCoordinator::new(
            vec![Intervention::from(BroadcastEvent::new("Retest").unwrap())],
            &["HIVTestedNegative"],
            -1.0,
            Targeting::default(),
        )
        .unwrap()
        .with_delay(Distribution::uniform(30.0, 90.0).unwrap())
        .unwrap();
        let json = coordinator.to_json();
        let actual = &json["Intervention_Config"]["Actual_IndividualIntervention_Config"];
        assert_eq!(actual["class"], "DelayedIntervention");
        assert_eq!(actual["Delay_Period_Min"], json!(30.0));
        assert_eq!(
            Coordinator::from(coordinator).event_references(),
            vec!["HIVTestedNegative", "Retest"]
        );
    }

    #[test]
    fn test_validation() {
        assert!(TriggeredCoordinator::new(art_dropout(), &[], -1.0, Targeting::default()).is_err());
        assert!(
            TriggeredCoordinator::new(art_dropout(), &["Births"], -2.0, Targeting::default())
                .is_err()
        );
        assert!(TriggeredCoordinator::new(vec![], &["Births"], -1.0, Targeting::default()).is_err());
    }
}
