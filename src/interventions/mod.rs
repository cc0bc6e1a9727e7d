//! Individual-level interventions a coordinator hands out.
//!
//! Every kind is a plain value validated at construction. An [`Intervention`]
//! pairs a kind with the attributes every intervention carries (name, cost,
//! disqualifying properties, ...) and serializes to the simulator's
//! `{"class": ..., ...}` fragment through [`Intervention::to_json`].

pub mod art;
pub mod behavior;
pub mod diagnostics;
pub mod flow;
pub mod outcome;
pub mod utility;

use std::fmt::Debug;

use dyn_clone::DynClone;
use serde_json::{Map, Value};

pub use art::{AntiretroviralTherapy, AntiretroviralTherapyFull, ArtDropout, ArtHazardRatios, ArtMortalityTable};
pub use behavior::{
    CoitalActRiskFactors, DebutAgeSetting, FemaleContraceptive, MaleCircumcision,
    ModifyStiCoInfectionStatus, Pmtct, SetSexualDebutAge, StartNewRelationship, StiBarrier,
    StiIsPostDebut,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticParameters, ThresholdEvent, WhoStageThresholds};
pub use flow::{
    DelayedIntervention, HivDelayedIntervention, HivMuxer, HivRandomChoice,
    InterventionForCurrentPartners, PrioritizePartnersBy,
};
pub use outcome::{DiagnosisOutcomes, Outcome};
pub use utility::{BroadcastEvent, HivDrawBlood, OutbreakIndividual, PropertyValueChanger};

use crate::common::parse_key_value;
use crate::error::{check_non_negative, AuthoringError, Warning};
use crate::schema::SchemaObject;

/// The kind-specific part of an intervention.
///
/// Built-in kinds implement it, and so can user types plugged in through
/// [`Intervention::custom`].
pub trait InterventionPayload: DynClone + Debug + Send + Sync {
    /// The simulator class this payload serializes as.
    fn class_name(&self) -> &str;

    /// Writes the kind-specific fields. `class` and the common attributes are
    /// written by [`Intervention::to_json`].
    fn write_fields(&self, object: &mut Map<String, Value>);

    /// Names of the events this payload broadcasts.
    fn event_references(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Interventions embedded in this one (delayed configs, diagnosis configs, ...).
    fn nested(&self) -> Vec<&Intervention> {
        Vec::new()
    }

    /// `false` for kinds the simulator does not charge a consumer cost for.
    fn accepts_cost(&self) -> bool {
        true
    }

    fn warnings(&self) -> Vec<Warning> {
        Vec::new()
    }
}

dyn_clone::clone_trait_object!(InterventionPayload);

impl InterventionPayload for SchemaObject {
    fn class_name(&self) -> &str {
        SchemaObject::class_name(self)
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        if let Value::Object(fields) = self.to_json() {
            for (key, value) in fields {
                if key != "class" {
                    object.insert(key, value);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum InterventionKind {
    MaleCircumcision(MaleCircumcision),
    Diagnostic(Diagnostic),
    AntiretroviralTherapy(AntiretroviralTherapy),
    AntiretroviralTherapyFull(AntiretroviralTherapyFull),
    ArtDropout(ArtDropout),
    ArtMortalityTable(ArtMortalityTable),
    CoitalActRiskFactors(CoitalActRiskFactors),
    StiBarrier(StiBarrier),
    Pmtct(Pmtct),
    SetSexualDebutAge(SetSexualDebutAge),
    StartNewRelationship(StartNewRelationship),
    FemaleContraceptive(FemaleContraceptive),
    ModifyStiCoInfectionStatus(ModifyStiCoInfectionStatus),
    StiIsPostDebut(StiIsPostDebut),
    HivMuxer(HivMuxer),
    DelayedIntervention(DelayedIntervention),
    HivDelayedIntervention(HivDelayedIntervention),
    HivRandomChoice(HivRandomChoice),
    InterventionForCurrentPartners(InterventionForCurrentPartners),
    BroadcastEvent(BroadcastEvent),
    PropertyValueChanger(PropertyValueChanger),
    OutbreakIndividual(OutbreakIndividual),
    HivDrawBlood(HivDrawBlood),
    /// A schema-only class with no typed constructor.
    Generic(SchemaObject),
    Custom(Box<dyn InterventionPayload>),
}

impl InterventionKind {
    fn payload(&self) -> &dyn InterventionPayload {
        match self {
            InterventionKind::MaleCircumcision(p) => p,
            InterventionKind::Diagnostic(p) => p,
            InterventionKind::AntiretroviralTherapy(p) => p,
            InterventionKind::AntiretroviralTherapyFull(p) => p,
            InterventionKind::ArtDropout(p) => p,
            InterventionKind::ArtMortalityTable(p) => p,
            InterventionKind::CoitalActRiskFactors(p) => p,
            InterventionKind::StiBarrier(p) => p,
            InterventionKind::Pmtct(p) => p,
            InterventionKind::SetSexualDebutAge(p) => p,
            InterventionKind::StartNewRelationship(p) => p,
            InterventionKind::FemaleContraceptive(p) => p,
            InterventionKind::ModifyStiCoInfectionStatus(p) => p,
            InterventionKind::StiIsPostDebut(p) => p,
            InterventionKind::HivMuxer(p) => p,
            InterventionKind::DelayedIntervention(p) => p,
            InterventionKind::HivDelayedIntervention(p) => p,
            InterventionKind::HivRandomChoice(p) => p,
            InterventionKind::InterventionForCurrentPartners(p) => p,
            InterventionKind::BroadcastEvent(p) => p,
            InterventionKind::PropertyValueChanger(p) => p,
            InterventionKind::OutbreakIndividual(p) => p,
            InterventionKind::HivDrawBlood(p) => p,
            InterventionKind::Generic(p) => p,
            InterventionKind::Custom(p) => p.as_ref(),
        }
    }
}

/// Attributes shared by every intervention kind. `None` fields are not written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonIntervention {
    pub intervention_name: Option<String>,
    pub cost_to_consumer: Option<f64>,
    pub disqualifying_properties: Vec<String>,
    pub new_property_value: Option<String>,
    pub dont_allow_duplicates: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Intervention {
    common: CommonIntervention,
    kind: InterventionKind,
}

impl Intervention {
    #[must_use]
    pub fn new(kind: InterventionKind) -> Self {
        Intervention {
            common: CommonIntervention::default(),
            kind,
        }
    }

    /// Wraps a user-supplied payload.
    #[must_use]
    pub fn custom(payload: impl InterventionPayload + 'static) -> Self {
        Self::new(InterventionKind::Custom(Box::new(payload)))
    }

    #[must_use]
    pub fn generic(object: SchemaObject) -> Self {
        Self::new(InterventionKind::Generic(object))
    }

    /// # Errors
    /// If `name` is empty.
    pub fn with_name(mut self, name: &str) -> Result<Self, AuthoringError> {
        if name.trim().is_empty() {
            return Err(AuthoringError::configuration(
                "The intervention name must not be empty.",
            ));
        }
        self.common.intervention_name = Some(name.to_string());
        Ok(self)
    }

    /// # Errors
    /// - [`AuthoringError::ForbiddenParameter`] if this kind carries no consumer cost
    /// - [`AuthoringError::Range`] if `cost` is negative
    pub fn with_cost(mut self, cost: f64) -> Result<Self, AuthoringError> {
        if !self.kind.payload().accepts_cost() {
            return Err(AuthoringError::forbidden(
                self.class_name(),
                "Cost_To_Consumer",
            ));
        }
        self.common.cost_to_consumer = Some(check_non_negative("Cost_To_Consumer", cost)?);
        Ok(self)
    }

    /// Agents carrying any of these `Key:Value` properties abort the intervention.
    ///
    /// # Errors
    /// If an entry is not of the form `Key:Value`.
    pub fn with_disqualifying_properties<I, S>(mut self, key_values: I) -> Result<Self, AuthoringError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut properties = Vec::new();
        for key_value in key_values {
            let (key, value) = parse_key_value(key_value.as_ref())?;
            properties.push(format!("{key}:{value}"));
        }
        self.common.disqualifying_properties = properties;
        Ok(self)
    }

    /// Property value assigned to the recipient while the intervention is active.
    ///
    /// # Errors
    /// If `key_value` is not of the form `Key:Value`.
    pub fn with_new_property_value(mut self, key_value: &str) -> Result<Self, AuthoringError> {
        let (key, value) = parse_key_value(key_value)?;
        self.common.new_property_value = Some(format!("{key}:{value}"));
        Ok(self)
    }

    #[must_use]
    pub fn with_dont_allow_duplicates(mut self, dont_allow_duplicates: bool) -> Self {
        self.common.dont_allow_duplicates = Some(dont_allow_duplicates);
        self
    }

    #[must_use]
    pub fn common(&self) -> &CommonIntervention {
        &self.common
    }

    #[must_use]
    pub fn kind(&self) -> &InterventionKind {
        &self.kind
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        self.kind.payload().class_name()
    }

    /// The name agents hold the intervention under: the explicit name if one was
    /// given, otherwise the class name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.common
            .intervention_name
            .as_deref()
            .unwrap_or_else(|| self.class_name())
    }

    /// Every event name this intervention, and anything nested inside it, broadcasts.
    #[must_use]
    pub fn event_references(&self) -> Vec<&str> {
        let payload = self.kind.payload();
        let mut events = payload.event_references();
        for nested in payload.nested() {
            events.extend(nested.event_references());
        }
        events
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<Warning> {
        let payload = self.kind.payload();
        let mut warnings = payload.warnings();
        for nested in payload.nested() {
            warnings.extend(nested.warnings());
        }
        warnings
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let payload = self.kind.payload();
        let mut object = Map::new();
        object.insert("class".to_string(), payload.class_name().into());
        if let Some(name) = &self.common.intervention_name {
            object.insert("Intervention_Name".to_string(), name.clone().into());
        }
        if let Some(cost) = self.common.cost_to_consumer {
            object.insert("Cost_To_Consumer".to_string(), cost.into());
        }
        if !self.common.disqualifying_properties.is_empty() {
            object.insert(
                "Disqualifying_Properties".to_string(),
                self.common.disqualifying_properties.clone().into(),
            );
        }
        if let Some(value) = &self.common.new_property_value {
            object.insert("New_Property_Value".to_string(), value.clone().into());
        }
        if let Some(dont_allow_duplicates) = self.common.dont_allow_duplicates {
            object.insert(
                "Dont_Allow_Duplicates".to_string(),
                u8::from(dont_allow_duplicates).into(),
            );
        }
        payload.write_fields(&mut object);
        Value::Object(object)
    }
}

macro_rules! into_intervention {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<$kind> for Intervention {
                fn from(payload: $kind) -> Self {
                    Intervention::new(InterventionKind::$kind(payload))
                }
            }
        )*
    };
}

into_intervention!(
    MaleCircumcision,
    Diagnostic,
    AntiretroviralTherapy,
    AntiretroviralTherapyFull,
    ArtDropout,
    ArtMortalityTable,
    CoitalActRiskFactors,
    StiBarrier,
    Pmtct,
    SetSexualDebutAge,
    StartNewRelationship,
    FemaleContraceptive,
    ModifyStiCoInfectionStatus,
    StiIsPostDebut,
    HivMuxer,
    DelayedIntervention,
    HivDelayedIntervention,
    HivRandomChoice,
    InterventionForCurrentPartners,
    BroadcastEvent,
    PropertyValueChanger,
    OutbreakIndividual,
    HivDrawBlood,
);

/// Rejects an empty event name for `field`.
pub(crate) fn check_event(field: &str, event: &str) -> Result<String, AuthoringError> {
    if event.trim().is_empty() {
        return Err(AuthoringError::configuration(format!(
            "The event name given for {field} must not be empty."
        )));
    }
    Ok(event.to_string())
}

/// Writes `1`/`0` for a flag, the simulator's boolean encoding.
pub(crate) fn flag(value: bool) -> Value {
    u8::from(value).into()
}

#[cfg(test)]
mod test {
    use serde_json::{json, Map, Value};

    use super::{BroadcastEvent, Intervention, InterventionPayload, MaleCircumcision};
    use crate::error::AuthoringError;

    #[derive(Debug, Clone)]
    struct Vaccine {
        efficacy: f64,
    }

    impl InterventionPayload for Vaccine {
        fn class_name(&self) -> &str {
            "SimpleVaccine"
        }

        fn write_fields(&self, object: &mut Map<String, Value>) {
            object.insert("Efficacy".to_string(), self.efficacy.into());
        }
    }

    #[test]
    fn test_common_attributes_serialize() {
        let intervention = Intervention::from(
            MaleCircumcision::new(0.6, false, None).unwrap(),
        )
        .with_name("VMMC")
        .unwrap()
        .with_disqualifying_properties(["CascadeState:LostForever"])
        .unwrap()
        .with_new_property_value("CascadeState:OnART")
        .unwrap();
        let json = intervention.to_json();
        assert_eq!(json["class"], "MaleCircumcision");
        assert_eq!(json["Intervention_Name"], "VMMC");
        assert_eq!(json["Disqualifying_Properties"], json!(["CascadeState:LostForever"]));
        assert_eq!(json["New_Property_Value"], "CascadeState:OnART");
        assert!(json.get("Cost_To_Consumer").is_none());
        assert_eq!(intervention.name(), "VMMC");
    }

    #[test]
    fn test_forbidden_cost() {
        let result = Intervention::from(BroadcastEvent::new("MyEvent").unwrap()).with_cost(1.0);
        match result {
            Err(AuthoringError::ForbiddenParameter {
                intervention,
                parameter,
            }) => {
                assert_eq!(intervention, "BroadcastEvent");
                assert_eq!(parameter, "Cost_To_Consumer");
            }
            other => panic!("expected a forbidden parameter error, got {other:?}"),
        }
    }

    #[test]
    fn test_name_defaults_to_class() {
        let intervention = Intervention::from(BroadcastEvent::new("MyEvent").unwrap());
        assert_eq!(intervention.name(), "BroadcastEvent");
        assert!(intervention.to_json().get("Intervention_Name").is_none());
    }

    #[test]
    fn test_custom_payload() {
        let intervention = Intervention::custom(Vaccine { efficacy: 0.9 })
            .with_cost(2.5)
            .unwrap();
        let cloned = intervention.clone();
        assert_eq!(
            cloned.to_json(),
            json!({"class": "SimpleVaccine", "Cost_To_Consumer": 2.5, "Efficacy": 0.9})
        );
    }

    #[test]
    fn test_bad_property_rejected() {
        let result = Intervention::from(BroadcastEvent::new("MyEvent").unwrap())
            .with_disqualifying_properties(["Risk"]);
        assert!(result.is_err());
    }
}
