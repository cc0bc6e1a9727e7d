//! Interventions that route agents to other interventions: delays, muxers,
//! random choices and partner notification.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::outcome::Outcome;
use super::utility::BroadcastEvent;
use super::{check_event, Intervention, InterventionPayload};
use crate::common::{Distribution, RelationshipType};
use crate::error::{check_non_negative, check_range, AuthoringError, Warning};

/// Waits a drawn delay, then hands out its configs.
#[derive(Debug, Clone)]
pub struct DelayedIntervention {
    pub delay: Distribution,
    pub configs: Vec<Intervention>,
}

impl DelayedIntervention {
    /// # Errors
    /// If the delay is invalid or `configs` is empty.
    pub fn new(delay: Distribution, configs: Vec<Intervention>) -> Result<Self, AuthoringError> {
        delay.validate()?;
        if configs.is_empty() {
            return Err(AuthoringError::configuration(
                "A DelayedIntervention needs at least one intervention to distribute.",
            ));
        }
        Ok(DelayedIntervention { delay, configs })
    }

    /// Waits a drawn delay, then broadcasts `event`.
    ///
    /// # Errors
    /// If the delay is invalid or `event` is empty.
    pub fn broadcast(delay: Distribution, event: &str) -> Result<Self, AuthoringError> {
        Self::new(delay, vec![BroadcastEvent::new(event)?.into()])
    }

    /// # Errors
    /// If the delay is invalid.
    pub fn from_outcome(delay: Distribution, outcome: Outcome) -> Result<Self, AuthoringError> {
        match outcome {
            Outcome::Event(event) => Self::broadcast(delay, &event),
            Outcome::Config(config) => Self::new(delay, vec![*config]),
        }
    }
}

impl InterventionPayload for DelayedIntervention {
    fn class_name(&self) -> &str {
        "DelayedIntervention"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        self.delay.write_fields("Delay_Period", object);
        let configs: Vec<Value> = self.configs.iter().map(Intervention::to_json).collect();
        object.insert("Actual_IndividualIntervention_Configs".to_string(), configs.into());
    }

    fn nested(&self) -> Vec<&Intervention> {
        self.configs.iter().collect()
    }

    fn accepts_cost(&self) -> bool {
        false
    }
}

/// The HIV flavour of a delay. It may expire before the delay elapses, and can be
/// limited to a calendar window.
#[derive(Debug, Clone)]
pub struct HivDelayedIntervention {
    pub delay: Distribution,
    pub outcome: Outcome,
    pub expiration_period: Option<f64>,
    pub broadcast_on_expiration_event: Option<String>,
    /// `[start_year, end_year)` outside of which the intervention does nothing.
    pub year_range: Option<(f64, f64)>,
}

impl HivDelayedIntervention {
    /// # Errors
    /// If the delay is invalid.
    pub fn new(delay: Distribution, outcome: Outcome) -> Result<Self, AuthoringError> {
        delay.validate()?;
        Ok(HivDelayedIntervention {
            delay,
            outcome,
            expiration_period: None,
            broadcast_on_expiration_event: None,
            year_range: None,
        })
    }

    /// # Errors
    /// If `expiration_period` is negative or the event is empty.
    pub fn with_expiration(
        mut self,
        expiration_period: f64,
        broadcast_on_expiration_event: Option<&str>,
    ) -> Result<Self, AuthoringError> {
        self.expiration_period = Some(check_non_negative("Expiration_Period", expiration_period)?);
        self.broadcast_on_expiration_event = broadcast_on_expiration_event
            .map(|event| check_event("Broadcast_On_Expiration_Event", event))
            .transpose()?;
        Ok(self)
    }

    /// # Errors
    /// If `start_year >= end_year`.
    pub fn with_year_range(mut self, start_year: f64, end_year: f64) -> Result<Self, AuthoringError> {
        if start_year >= end_year {
            return Err(AuthoringError::configuration(format!(
                "The start year ({start_year}) must be before the end year ({end_year})."
            )));
        }
        self.year_range = Some((start_year, end_year));
        Ok(self)
    }

    fn write_delayed_fields(&self, object: &mut Map<String, Value>) {
        self.delay.write_fields("Delay_Period", object);
        match &self.outcome {
            Outcome::Event(event) => {
                object.insert("Broadcast_Event".to_string(), event.clone().into());
            }
            Outcome::Config(config) => {
                object.insert(
                    "Actual_IndividualIntervention_Configs".to_string(),
                    vec![config.to_json()].into(),
                );
            }
        }
        if let Some(period) = self.expiration_period {
            object.insert("Expiration_Period".to_string(), period.into());
        }
        if let Some(event) = &self.broadcast_on_expiration_event {
            object.insert(
                "Broadcast_On_Expiration_Event".to_string(),
                event.clone().into(),
            );
        }
        if let Some((start_year, end_year)) = self.year_range {
            object.insert("Start_Year".to_string(), start_year.into());
            object.insert("End_Year".to_string(), end_year.into());
        }
    }

    fn delayed_events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.outcome.event_name().into_iter().collect();
        events.extend(self.broadcast_on_expiration_event.as_deref());
        events
    }
}

impl InterventionPayload for HivDelayedIntervention {
    fn class_name(&self) -> &str {
        "HIVDelayedIntervention"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        self.write_delayed_fields(object);
    }

    fn event_references(&self) -> Vec<&str> {
        self.delayed_events()
    }

    fn nested(&self) -> Vec<&Intervention> {
        self.outcome.intervention().into_iter().collect()
    }

    fn accepts_cost(&self) -> bool {
        false
    }
}

/// A delayed intervention that admits at most `max_entries` copies under the same
/// muxer name per agent.
#[derive(Debug, Clone)]
pub struct HivMuxer {
    pub muxer_name: String,
    pub max_entries: u32,
    pub delayed: HivDelayedIntervention,
}

impl HivMuxer {
    /// # Errors
    /// If the name is empty or `max_entries` is zero.
    pub fn new(
        muxer_name: &str,
        max_entries: u32,
        delayed: HivDelayedIntervention,
    ) -> Result<Self, AuthoringError> {
        if muxer_name.trim().is_empty() {
            return Err(AuthoringError::configuration(
                "The muxer name must not be empty.",
            ));
        }
        if max_entries == 0 {
            return Err(AuthoringError::range("Max_Entries", 0.0, 1.0, f64::from(u32::MAX)));
        }
        Ok(HivMuxer {
            muxer_name: muxer_name.to_string(),
            max_entries,
            delayed,
        })
    }
}

impl InterventionPayload for HivMuxer {
    fn class_name(&self) -> &str {
        "HIVMuxer"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("Muxer_Name".to_string(), self.muxer_name.clone().into());
        object.insert("Max_Entries".to_string(), self.max_entries.into());
        self.delayed.write_delayed_fields(object);
    }

    fn event_references(&self) -> Vec<&str> {
        self.delayed.delayed_events()
    }

    fn nested(&self) -> Vec<&Intervention> {
        self.delayed.outcome.intervention().into_iter().collect()
    }

    fn accepts_cost(&self) -> bool {
        false
    }
}

const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Broadcasts one event drawn from a weighted table.
#[derive(Debug, Clone)]
pub struct HivRandomChoice {
    choices: IndexMap<String, f64>,
    warnings: Vec<Warning>,
}

impl HivRandomChoice {
    /// Probabilities that do not sum to one are normalized, with a warning.
    ///
    /// # Errors
    /// - If `choices` is empty or repeats an event
    /// - If a probability is negative or they sum to zero
    pub fn new(choices: &[(&str, f64)]) -> Result<Self, AuthoringError> {
        if choices.is_empty() {
            return Err(AuthoringError::configuration(
                "HIVRandomChoice needs at least one choice.",
            ));
        }
        let mut table = IndexMap::new();
        for &(event, probability) in choices {
            check_non_negative(&format!("Choice_Probabilities[{event}]"), probability)?;
            let event = check_event("Choice_Names", event)?;
            if table.insert(event.clone(), probability).is_some() {
                return Err(AuthoringError::configuration(format!(
                    "HIVRandomChoice lists the event '{event}' more than once."
                )));
            }
        }
        let total: f64 = table.values().sum();
        if total <= 0.0 {
            return Err(AuthoringError::configuration(
                "HIVRandomChoice probabilities sum to zero.",
            ));
        }
        let mut warnings = Vec::new();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            warnings.push(Warning::new(
                "HIVRandomChoice",
                format!("choice probabilities sum to {total}; normalizing to 1"),
            ));
            for probability in table.values_mut() {
                *probability /= total;
            }
        }
        Ok(HivRandomChoice {
            choices: table,
            warnings,
        })
    }

    #[must_use]
    pub fn choices(&self) -> &IndexMap<String, f64> {
        &self.choices
    }
}

impl InterventionPayload for HivRandomChoice {
    fn class_name(&self) -> &str {
        "HIVRandomChoice"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        let names: Vec<Value> = self.choices.keys().map(|k| k.clone().into()).collect();
        let probabilities: Vec<Value> = self.choices.values().map(|&p| p.into()).collect();
        object.insert("Choice_Names".to_string(), names.into());
        object.insert("Choice_Probabilities".to_string(), probabilities.into());
    }

    fn event_references(&self) -> Vec<&str> {
        self.choices.keys().map(String::as_str).collect()
    }

    fn accepts_cost(&self) -> bool {
        false
    }

    fn warnings(&self) -> Vec<Warning> {
        self.warnings.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrioritizePartnersBy {
    #[default]
    NoPrioritization,
    ChosenAtRandom,
    LongerTimeInRelationship,
    ShorterTimeInRelationship,
    OlderAge,
    YoungerAge,
    /// Partners in the order of the listed relationship types.
    RelationshipTypeOrder,
}

impl PrioritizePartnersBy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PrioritizePartnersBy::NoPrioritization => "NO_PRIORITIZATION",
            PrioritizePartnersBy::ChosenAtRandom => "CHOSEN_AT_RANDOM",
            PrioritizePartnersBy::LongerTimeInRelationship => "LONGER_TIME_IN_RELATIONSHIP",
            PrioritizePartnersBy::ShorterTimeInRelationship => "SHORTER_TIME_IN_RELATIONSHIP",
            PrioritizePartnersBy::OlderAge => "OLDER_AGE",
            PrioritizePartnersBy::YoungerAge => "YOUNGER_AGE",
            PrioritizePartnersBy::RelationshipTypeOrder => "RELATIONSHIP_TYPE_ORDER",
        }
    }
}

pub const MAX_PARTNERS: f64 = 100.0;

/// Distributes an intervention (or broadcasts an event) to the recipient's current
/// partners.
#[derive(Debug, Clone)]
pub struct InterventionForCurrentPartners {
    /// Empty means every type.
    pub relationship_types: Vec<RelationshipType>,
    pub prioritize_partners_by: PrioritizePartnersBy,
    pub minimum_duration_years: f64,
    pub maximum_partners: f64,
    pub outcome: Outcome,
}

impl InterventionForCurrentPartners {
    /// # Errors
    /// - If `minimum_duration_years` is negative
    /// - If `maximum_partners` is outside of [0, 100]
    /// - If `RELATIONSHIP_TYPE_ORDER` is requested without relationship types
    pub fn new(
        relationship_types: Vec<RelationshipType>,
        prioritize_partners_by: PrioritizePartnersBy,
        minimum_duration_years: f64,
        maximum_partners: f64,
        outcome: Outcome,
    ) -> Result<Self, AuthoringError> {
        check_non_negative("Minimum_Duration_Years", minimum_duration_years)?;
        check_range("Maximum_Partners", maximum_partners, 0.0, MAX_PARTNERS)?;
        if prioritize_partners_by == PrioritizePartnersBy::RelationshipTypeOrder
            && relationship_types.is_empty()
        {
            return Err(AuthoringError::configuration(
                "RELATIONSHIP_TYPE_ORDER prioritization needs at least one relationship type.",
            ));
        }
        Ok(InterventionForCurrentPartners {
            relationship_types,
            prioritize_partners_by,
            minimum_duration_years,
            maximum_partners,
            outcome,
        })
    }
}

impl InterventionPayload for InterventionForCurrentPartners {
    fn class_name(&self) -> &str {
        "InterventionForCurrentPartners"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        let types: Vec<Value> = self
            .relationship_types
            .iter()
            .map(|t| t.as_str().into())
            .collect();
        object.insert("Relationship_Types".to_string(), types.into());
        object.insert(
            "Prioritize_Partners_By".to_string(),
            self.prioritize_partners_by.as_str().into(),
        );
        object.insert(
            "Minimum_Duration_Years".to_string(),
            self.minimum_duration_years.into(),
        );
        object.insert("Maximum_Partners".to_string(), self.maximum_partners.into());
        object.insert("Event_Or_Config".to_string(), self.outcome.switch().into());
        self.outcome
            .write_fields("Broadcast_Event", "Intervention_Config", object);
    }

    fn event_references(&self) -> Vec<&str> {
        self.outcome.event_name().into_iter().collect()
    }

    fn nested(&self) -> Vec<&Intervention> {
        self.outcome.intervention().into_iter().collect()
    }

    fn accepts_cost(&self) -> bool {
        false
    }
}
