//! Distribution rules that decide when, to whom and how many agents receive an
//! intervention, and the campaign event that wraps them.

pub mod nchooser;
pub mod reference_tracking;
pub mod scheduled;
pub mod triggered;

use serde_json::{json, Map, Value};

pub use nchooser::{
    step_allocation, AgeRange, Cell, DiseaseStateAtom, NChooserCoordinator, NChooserRow, RowCount,
    TargetCounts, TargetedDistribution,
};
pub use reference_tracking::ReferenceTrackingCoordinator;
pub use scheduled::ScheduledCoordinator;
pub use triggered::{TriggerTier, TriggeredCoordinator};

use crate::common::{PropertyRestrictions, Sex};
use crate::error::{check_non_negative, check_probability, AuthoringError, Warning};
use crate::interventions::Intervention;
use crate::targeting::Predicate;

/// When a campaign event fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Start {
    /// Simulation day, emitted as a `CampaignEvent`.
    Day(f64),
    /// Calendar year, emitted as a `CampaignEventByYear`.
    Year(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeSet {
    #[default]
    All,
    List(Vec<u32>),
}

impl NodeSet {
    /// `None` targets every node.
    ///
    /// # Errors
    /// If an explicit list is empty or contains the default node id 0.
    pub fn from_ids(node_ids: Option<&[u32]>) -> Result<Self, AuthoringError> {
        match node_ids {
            None => Ok(NodeSet::All),
            Some([]) => Err(AuthoringError::configuration(
                "An explicit node list must not be empty; pass None to target every node.",
            )),
            Some(ids) => {
                if ids.contains(&0) {
                    return Err(AuthoringError::UnknownNode(0));
                }
                Ok(NodeSet::List(ids.to_vec()))
            }
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            NodeSet::All => json!({"class": "NodeSetAll"}),
            NodeSet::List(ids) => json!({"class": "NodeSetNodeList", "Node_List": ids}),
        }
    }
}

/// Who, by age and sex, a coordinator reaches, and what fraction of them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TargetDemographics {
    coverage: Option<f64>,
    age_range: Option<(f64, f64)>,
    gender: Option<Sex>,
}

impl TargetDemographics {
    #[must_use]
    pub fn everyone() -> Self {
        Self::default()
    }

    /// # Errors
    /// If `coverage` is outside of [0, 1].
    pub fn with_coverage(mut self, coverage: f64) -> Result<Self, AuthoringError> {
        self.coverage = Some(check_probability("Demographic_Coverage", coverage)?);
        Ok(self)
    }

    /// Ages in `[min_age, max_age)` years.
    ///
    /// # Errors
    /// If a bound is negative or `min_age >= max_age`.
    pub fn with_age_range(mut self, min_age: f64, max_age: f64) -> Result<Self, AuthoringError> {
        check_non_negative("Target_Age_Min", min_age)?;
        check_non_negative("Target_Age_Max", max_age)?;
        if min_age >= max_age {
            return Err(AuthoringError::configuration(format!(
                "Target_Age_Min ({min_age}) must be less than Target_Age_Max ({max_age})."
            )));
        }
        self.age_range = Some((min_age, max_age));
        Ok(self)
    }

    #[must_use]
    pub fn with_gender(mut self, gender: Sex) -> Self {
        self.gender = Some(gender);
        self
    }

    #[must_use]
    pub fn coverage(&self) -> Option<f64> {
        self.coverage
    }

    #[must_use]
    pub fn age_range(&self) -> Option<(f64, f64)> {
        self.age_range
    }

    #[must_use]
    pub fn gender(&self) -> Option<Sex> {
        self.gender
    }

    #[must_use]
    pub fn target_demographic(&self) -> &'static str {
        match (self.age_range.is_some(), self.gender.is_some()) {
            (false, false) => "Everyone",
            (true, false) => "ExplicitAgeRanges",
            (false, true) => "ExplicitGender",
            (true, true) => "ExplicitAgeRangesAndGender",
        }
    }

    /// Whether an agent of this sex and age is in the targeted group. Coverage is
    /// not applied here.
    #[must_use]
    pub fn admits(&self, sex: Sex, age_years: f64) -> bool {
        let age_ok = self
            .age_range
            .is_none_or(|(min, max)| age_years >= min && age_years < max);
        let sex_ok = self.gender.is_none_or(|gender| gender == sex);
        age_ok && sex_ok
    }

    /// Writes the demographic fields, using `default_coverage` when no coverage was
    /// set. Coordinators that forbid a coverage pass `None`.
    pub(crate) fn write_fields(&self, default_coverage: Option<f64>, object: &mut Map<String, Value>) {
        if let Some(coverage) = self.coverage.or(default_coverage) {
            object.insert("Demographic_Coverage".to_string(), coverage.into());
        }
        object.insert(
            "Target_Demographic".to_string(),
            self.target_demographic().into(),
        );
        if let Some((min, max)) = self.age_range {
            object.insert("Target_Age_Min".to_string(), min.into());
            object.insert("Target_Age_Max".to_string(), max.into());
        }
        if let Some(gender) = self.gender {
            object.insert("Target_Gender".to_string(), gender.as_str().into());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepetitionConfig {
    /// `-1` repeats forever.
    pub number_repetitions: i32,
    pub timesteps_between_repetitions: f64,
}

impl RepetitionConfig {
    /// # Errors
    /// If `number_repetitions < -1` or the gap is not positive.
    pub fn new(number_repetitions: i32, timesteps_between_repetitions: f64) -> Result<Self, AuthoringError> {
        if number_repetitions < -1 {
            return Err(AuthoringError::range(
                "Number_Repetitions",
                f64::from(number_repetitions),
                -1.0,
                f64::from(i32::MAX),
            ));
        }
        if timesteps_between_repetitions.is_nan() || timesteps_between_repetitions <= 0.0 {
            return Err(AuthoringError::configuration(format!(
                "Timesteps_Between_Repetitions must be positive, got {timesteps_between_repetitions}."
            )));
        }
        Ok(RepetitionConfig {
            number_repetitions,
            timesteps_between_repetitions,
        })
    }

    pub(crate) fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "Number_Repetitions".to_string(),
            self.number_repetitions.into(),
        );
        object.insert(
            "Timesteps_Between_Repetitions".to_string(),
            self.timesteps_between_repetitions.into(),
        );
    }
}

/// Targeting shared by the scheduled, triggered and reference-tracking rules.
#[derive(Debug, Clone, Default)]
pub struct Targeting {
    pub demographics: TargetDemographics,
    pub property_restrictions: PropertyRestrictions,
    pub predicate: Option<Predicate>,
}

impl Targeting {
    pub(crate) fn write_fields(&self, default_coverage: Option<f64>, object: &mut Map<String, Value>) {
        self.demographics.write_fields(default_coverage, object);
        self.property_restrictions.write_fields(object);
        if let Some(predicate) = &self.predicate {
            object.insert("Targeting_Config".to_string(), predicate.to_json());
        }
    }

    fn warnings(&self) -> Vec<Warning> {
        self.predicate
            .as_ref()
            .map(Predicate::warnings)
            .unwrap_or_default()
    }
}

/// One intervention is written as is; several go through a distributor.
pub(crate) fn intervention_config(interventions: &[Intervention]) -> Value {
    match interventions {
        [single] => single.to_json(),
        many => json!({
            "class": "MultiInterventionDistributor",
            "Intervention_List": many.iter().map(Intervention::to_json).collect::<Vec<_>>(),
        }),
    }
}

pub(crate) fn check_interventions(interventions: &[Intervention]) -> Result<(), AuthoringError> {
    if interventions.is_empty() {
        return Err(AuthoringError::configuration(
            "A coordinator needs at least one intervention to distribute.",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub enum Coordinator {
    Scheduled(ScheduledCoordinator),
    Triggered(TriggeredCoordinator),
    NChooser(NChooserCoordinator),
    ReferenceTracking(ReferenceTrackingCoordinator),
}

impl Coordinator {
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Coordinator::Scheduled(c) => c.to_json(),
            Coordinator::Triggered(c) => c.to_json(),
            Coordinator::NChooser(c) => c.to_json(),
            Coordinator::ReferenceTracking(c) => c.to_json(),
        }
    }

    #[must_use]
    pub fn interventions(&self) -> &[Intervention] {
        match self {
            Coordinator::Scheduled(c) => &c.interventions,
            Coordinator::Triggered(c) => &c.interventions,
            Coordinator::NChooser(c) => std::slice::from_ref(&c.intervention),
            Coordinator::ReferenceTracking(c) => &c.interventions,
        }
    }

    /// Every event name the coordinator listens for or its interventions broadcast.
    #[must_use]
    pub fn event_references(&self) -> Vec<&str> {
        let mut events = match self {
            Coordinator::Triggered(c) => c.trigger_events(),
            _ => Vec::new(),
        };
        for intervention in self.interventions() {
            events.extend(intervention.event_references());
        }
        events
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = match self {
            Coordinator::Scheduled(c) => c.targeting.warnings(),
            Coordinator::Triggered(c) => c.targeting.warnings(),
            Coordinator::NChooser(_) => Vec::new(),
            Coordinator::ReferenceTracking(c) => c.warnings(),
        };
        for intervention in self.interventions() {
            warnings.extend(intervention.warnings());
        }
        warnings
    }
}

macro_rules! into_coordinator {
    ($($variant:ident => $kind:ty),* $(,)?) => {
        $(
            impl From<$kind> for Coordinator {
                fn from(coordinator: $kind) -> Self {
                    Coordinator::$variant(coordinator)
                }
            }
        )*
    };
}

into_coordinator!(
    Scheduled => ScheduledCoordinator,
    Triggered => TriggeredCoordinator,
    NChooser => NChooserCoordinator,
    ReferenceTracking => ReferenceTrackingCoordinator,
);

/// One entry of the campaign's `Events` list.
#[derive(Debug, Clone)]
pub struct CampaignEvent {
    pub start: Start,
    pub node_set: NodeSet,
    pub event_name: Option<String>,
    pub coordinator: Coordinator,
}

impl CampaignEvent {
    #[must_use]
    pub fn new(start: Start, coordinator: impl Into<Coordinator>) -> Self {
        CampaignEvent {
            start,
            node_set: NodeSet::All,
            event_name: None,
            coordinator: coordinator.into(),
        }
    }

    /// # Errors
    /// See [`NodeSet::from_ids`].
    pub fn with_nodes(mut self, node_ids: Option<&[u32]>) -> Result<Self, AuthoringError> {
        self.node_set = NodeSet::from_ids(node_ids)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_name(mut self, event_name: &str) -> Self {
        self.event_name = Some(event_name.to_string());
        self
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        match self.start {
            Start::Day(day) => {
                object.insert("class".to_string(), "CampaignEvent".into());
                object.insert("Start_Day".to_string(), day.into());
            }
            Start::Year(year) => {
                object.insert("class".to_string(), "CampaignEventByYear".into());
                object.insert("Start_Year".to_string(), year.into());
            }
        }
        if let Some(name) = &self.event_name {
            object.insert("Event_Name".to_string(), name.clone().into());
        }
        object.insert("Nodeset_Config".to_string(), self.node_set.to_json());
        object.insert(
            "Event_Coordinator_Config".to_string(),
            self.coordinator.to_json(),
        );
        Value::Object(object)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{NodeSet, RepetitionConfig, TargetDemographics};
    use crate::common::Sex;
    use crate::error::AuthoringError;

    #[test]
    fn test_node_set_json() {
        assert_eq!(NodeSet::from_ids(None).unwrap().to_json(), json!({"class": "NodeSetAll"}));
        assert_eq!(
            NodeSet::from_ids(Some(&[1, 3])).unwrap().to_json(),
            json!({"class": "NodeSetNodeList", "Node_List": [1, 3]})
        );
        assert!(NodeSet::from_ids(Some(&[])).is_err());
        assert!(matches!(
            NodeSet::from_ids(Some(&[0])),
            Err(AuthoringError::UnknownNode(0))
        ));
    }

    #[test]
    fn test_target_demographic_kind() {
        let everyone = TargetDemographics::everyone();
        assert_eq!(everyone.target_demographic(), "Everyone");
        let males = TargetDemographics::everyone().with_gender(Sex::Male);
        assert_eq!(males.target_demographic(), "ExplicitGender");
        let both = males.with_age_range(15.0, 50.0).unwrap();
        assert_eq!(both.target_demographic(), "ExplicitAgeRangesAndGender");
        assert!(both.admits(Sex::Male, 15.0));
        assert!(!both.admits(Sex::Male, 50.0));
        assert!(!both.admits(Sex::Female, 20.0));
    }

    #[test]
    fn test_demographics_validation() {
        assert!(TargetDemographics::everyone().with_coverage(1.1).is_err());
        assert!(TargetDemographics::everyone()
            .with_age_range(50.0, 15.0)
            .is_err());
    }

    #[test]
    fn test_repetition_validation() {
        assert!(RepetitionConfig::new(-1, 365.0).is_ok());
        assert!(RepetitionConfig::new(-2, 365.0).is_err());
        assert!(RepetitionConfig::new(3, 0.0).is_err());
    }
}
