use serde_json::{Map, Value};

use super::{check_event, flag, InterventionPayload};
use crate::common::{parse_key_value, Distribution, RelationshipType, Sigmoid, WaningEffect};
use crate::error::{check_non_negative, check_probability, check_range, AuthoringError};

/// Voluntary medical male circumcision.
#[derive(Debug, Clone, PartialEq)]
pub struct MaleCircumcision {
    pub circumcision_reduced_acquire: f64,
    /// Re-circumcise only if the new efficacy is higher than the one the agent has.
    pub apply_if_higher_reduced_acquire: bool,
    pub distributed_event_trigger: Option<String>,
}

impl MaleCircumcision {
    /// # Errors
    /// If the efficacy is outside of [0, 1] or the event is empty.
    pub fn new(
        circumcision_reduced_acquire: f64,
        apply_if_higher_reduced_acquire: bool,
        distributed_event_trigger: Option<&str>,
    ) -> Result<Self, AuthoringError> {
        check_probability("Circumcision_Reduced_Acquire", circumcision_reduced_acquire)?;
        Ok(MaleCircumcision {
            circumcision_reduced_acquire,
            apply_if_higher_reduced_acquire,
            distributed_event_trigger: distributed_event_trigger
                .map(|event| check_event("Distributed_Event_Trigger", event))
                .transpose()?,
        })
    }
}

impl InterventionPayload for MaleCircumcision {
    fn class_name(&self) -> &str {
        "MaleCircumcision"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "Circumcision_Reduced_Acquire".to_string(),
            self.circumcision_reduced_acquire.into(),
        );
        object.insert(
            "Apply_If_Higher_Reduced_Acquire".to_string(),
            flag(self.apply_if_higher_reduced_acquire),
        );
        if let Some(event) = &self.distributed_event_trigger {
            object.insert("Distributed_Event_Trigger".to_string(), event.clone().into());
        }
    }

    fn event_references(&self) -> Vec<&str> {
        self.distributed_event_trigger.as_deref().into_iter().collect()
    }

    fn accepts_cost(&self) -> bool {
        false
    }
}

/// Transiently scales the risk of every coital act the recipient has.
#[derive(Debug, Clone, PartialEq)]
pub struct CoitalActRiskFactors {
    pub acquisition_multiplier: f64,
    pub transmission_multiplier: f64,
    pub expiration_period: Distribution,
    pub expiration_event: Option<String>,
}

impl CoitalActRiskFactors {
    /// # Errors
    /// If a multiplier is negative, the expiration distribution is invalid, or the
    /// event is empty.
    pub fn new(
        acquisition_multiplier: f64,
        transmission_multiplier: f64,
        expiration_period: Distribution,
        expiration_event: Option<&str>,
    ) -> Result<Self, AuthoringError> {
        check_non_negative("Acquisition_Multiplier", acquisition_multiplier)?;
        check_non_negative("Transmission_Multiplier", transmission_multiplier)?;
        expiration_period.validate()?;
        Ok(CoitalActRiskFactors {
            acquisition_multiplier,
            transmission_multiplier,
            expiration_period,
            expiration_event: expiration_event
                .map(|event| check_event("Expiration_Event_Trigger", event))
                .transpose()?,
        })
    }
}

impl InterventionPayload for CoitalActRiskFactors {
    fn class_name(&self) -> &str {
        "CoitalActRiskFactors"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "Acquisition_Multiplier".to_string(),
            self.acquisition_multiplier.into(),
        );
        object.insert(
            "Transmission_Multiplier".to_string(),
            self.transmission_multiplier.into(),
        );
        self.expiration_period.write_fields("Expiration_Period", object);
        if let Some(event) = &self.expiration_event {
            object.insert("Expiration_Event_Trigger".to_string(), event.clone().into());
        }
    }

    fn event_references(&self) -> Vec<&str> {
        self.expiration_event.as_deref().into_iter().collect()
    }
}

/// Condom use over calendar time for one relationship type.
#[derive(Debug, Clone, PartialEq)]
pub struct StiBarrier {
    pub relationship_type: RelationshipType,
    /// `Early`/`Late` are the sigmoid's min/max, `MidYear` its midpoint.
    pub usage: Sigmoid,
    pub usage_duration: Option<Distribution>,
    pub usage_expiration_event: Option<String>,
}

impl StiBarrier {
    /// # Errors
    /// If the usage bounds are not probabilities.
    pub fn new(relationship_type: RelationshipType, usage: Sigmoid) -> Result<Self, AuthoringError> {
        check_probability("Early", usage.min)?;
        check_probability("Late", usage.max)?;
        Ok(StiBarrier {
            relationship_type,
            usage,
            usage_duration: None,
            usage_expiration_event: None,
        })
    }

    /// # Errors
    /// If the distribution is invalid or the event is empty.
    pub fn with_expiration(
        mut self,
        usage_duration: Distribution,
        usage_expiration_event: Option<&str>,
    ) -> Result<Self, AuthoringError> {
        usage_duration.validate()?;
        self.usage_duration = Some(usage_duration);
        self.usage_expiration_event = usage_expiration_event
            .map(|event| check_event("Usage_Expiration_Event", event))
            .transpose()?;
        Ok(self)
    }
}

impl InterventionPayload for StiBarrier {
    fn class_name(&self) -> &str {
        "STIBarrier"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "Relationship_Type".to_string(),
            self.relationship_type.as_str().into(),
        );
        object.insert("Early".to_string(), self.usage.min.into());
        object.insert("Late".to_string(), self.usage.max.into());
        object.insert("MidYear".to_string(), self.usage.mid.into());
        object.insert("Rate".to_string(), self.usage.rate.into());
        if let Some(duration) = &self.usage_duration {
            duration.write_fields("Usage_Duration", object);
        }
        if let Some(event) = &self.usage_expiration_event {
            object.insert("Usage_Expiration_Event".to_string(), event.clone().into());
        }
    }

    fn event_references(&self) -> Vec<&str> {
        self.usage_expiration_event.as_deref().into_iter().collect()
    }
}

/// Prevention of mother-to-child transmission. The simulator expires it 40 weeks
/// after distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pmtct {
    pub efficacy: f64,
}

impl Pmtct {
    pub const DURATION_DAYS: f64 = 40.0 * 7.0;

    /// # Errors
    /// If `efficacy` is outside of [0, 1].
    pub fn new(efficacy: f64) -> Result<Self, AuthoringError> {
        Ok(Pmtct {
            efficacy: check_probability("Efficacy", efficacy)?,
        })
    }
}

impl InterventionPayload for Pmtct {
    fn class_name(&self) -> &str {
        "PMTCT"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("Efficacy".to_string(), self.efficacy.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebutAgeSetting {
    /// Debut at the recipient's current age.
    CurrentAge,
    UserSpecified { age_years: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetSexualDebutAge {
    pub setting: DebutAgeSetting,
}

impl SetSexualDebutAge {
    /// # Errors
    /// If a user-specified age is outside of [0, 125].
    pub fn new(setting: DebutAgeSetting) -> Result<Self, AuthoringError> {
        if let DebutAgeSetting::UserSpecified { age_years } = setting {
            check_range("Age_Years", age_years, 0.0, 125.0)?;
        }
        Ok(SetSexualDebutAge { setting })
    }
}

impl InterventionPayload for SetSexualDebutAge {
    fn class_name(&self) -> &str {
        "SetSexualDebutAge"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        match self.setting {
            DebutAgeSetting::CurrentAge => {
                object.insert("Setting_Type".to_string(), "CURRENT_AGE".into());
            }
            DebutAgeSetting::UserSpecified { age_years } => {
                object.insert("Setting_Type".to_string(), "USER_SPECIFIED".into());
                object.insert("Age_Years".to_string(), age_years.into());
            }
        }
    }
}

/// Creates a relationship for the recipient without going through pair formation.
#[derive(Debug, Clone, PartialEq)]
pub struct StartNewRelationship {
    pub relationship_type: RelationshipType,
    /// Only partners carrying this `Key:Value` property are eligible.
    pub partner_has_ip: Option<String>,
    /// Overrides the society's condom usage for the new relationship.
    pub condom_usage: Option<Sigmoid>,
    pub relationship_created_event: Option<String>,
}

impl StartNewRelationship {
    #[must_use]
    pub fn new(relationship_type: RelationshipType) -> Self {
        StartNewRelationship {
            relationship_type,
            partner_has_ip: None,
            condom_usage: None,
            relationship_created_event: None,
        }
    }

    /// # Errors
    /// If `key_value` is not of the form `Key:Value`.
    pub fn with_partner_has_ip(mut self, key_value: &str) -> Result<Self, AuthoringError> {
        let (key, value) = parse_key_value(key_value)?;
        self.partner_has_ip = Some(format!("{key}:{value}"));
        Ok(self)
    }

    /// # Errors
    /// If the usage bounds are not probabilities.
    pub fn with_condom_usage(mut self, usage: Sigmoid) -> Result<Self, AuthoringError> {
        check_probability("Condom_Usage_Min", usage.min)?;
        check_probability("Condom_Usage_Max", usage.max)?;
        self.condom_usage = Some(usage);
        Ok(self)
    }

    /// # Errors
    /// If `event` is empty.
    pub fn with_relationship_created_event(mut self, event: &str) -> Result<Self, AuthoringError> {
        self.relationship_created_event = Some(check_event("Relationship_Created_Event", event)?);
        Ok(self)
    }
}

impl InterventionPayload for StartNewRelationship {
    fn class_name(&self) -> &str {
        "StartNewRelationship"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "Relationship_Type".to_string(),
            self.relationship_type.as_str().into(),
        );
        if let Some(ip) = &self.partner_has_ip {
            object.insert("Partner_Has_IP".to_string(), ip.clone().into());
        }
        match &self.condom_usage {
            None => {
                object.insert("Condom_Usage_Parameters_Type".to_string(), "USE_DEFAULT".into());
            }
            Some(usage) => {
                object.insert(
                    "Condom_Usage_Parameters_Type".to_string(),
                    "SPECIFY_PARAMETERS".into(),
                );
                object.insert("Condom_Usage_Sigmoid".to_string(), usage.to_json());
            }
        }
        if let Some(event) = &self.relationship_created_event {
            object.insert("Relationship_Created_Event".to_string(), event.clone().into());
        }
    }

    fn event_references(&self) -> Vec<&str> {
        self.relationship_created_event.as_deref().into_iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FemaleContraceptive {
    pub waning: WaningEffect,
    pub usage_duration: Distribution,
    pub usage_expiration_event: Option<String>,
}

impl FemaleContraceptive {
    /// # Errors
    /// If the waning effect or the usage duration is invalid, or the event is empty.
    pub fn new(
        waning: WaningEffect,
        usage_duration: Distribution,
        usage_expiration_event: Option<&str>,
    ) -> Result<Self, AuthoringError> {
        waning.validate()?;
        usage_duration.validate()?;
        Ok(FemaleContraceptive {
            waning,
            usage_duration,
            usage_expiration_event: usage_expiration_event
                .map(|event| check_event("Usage_Expiration_Event", event))
                .transpose()?,
        })
    }
}

impl InterventionPayload for FemaleContraceptive {
    fn class_name(&self) -> &str {
        "FemaleContraceptive"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("Waning_Config".to_string(), self.waning.to_json());
        self.usage_duration.write_fields("Usage_Duration", object);
        if let Some(event) = &self.usage_expiration_event {
            object.insert("Usage_Expiration_Event".to_string(), event.clone().into());
        }
    }

    fn event_references(&self) -> Vec<&str> {
        self.usage_expiration_event.as_deref().into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifyStiCoInfectionStatus {
    pub new_sti_coinfection_status: bool,
}

impl InterventionPayload for ModifyStiCoInfectionStatus {
    fn class_name(&self) -> &str {
        "ModifyStiCoInfectionStatus"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "New_STI_CoInfection_Status".to_string(),
            flag(self.new_sti_coinfection_status),
        );
    }
}

/// Broadcasts one event for agents past sexual debut and optionally another for
/// the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct StiIsPostDebut {
    pub positive_event: String,
    pub negative_event: Option<String>,
}

impl StiIsPostDebut {
    /// # Errors
    /// If an event name is empty.
    pub fn new(positive_event: &str, negative_event: Option<&str>) -> Result<Self, AuthoringError> {
        Ok(StiIsPostDebut {
            positive_event: check_event("Positive_Diagnosis_Event", positive_event)?,
            negative_event: negative_event
                .map(|event| check_event("Negative_Diagnosis_Event", event))
                .transpose()?,
        })
    }
}

impl InterventionPayload for StiIsPostDebut {
    fn class_name(&self) -> &str {
        "STIIsPostDebut"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "Positive_Diagnosis_Event".to_string(),
            self.positive_event.clone().into(),
        );
        if let Some(event) = &self.negative_event {
            object.insert("Negative_Diagnosis_Event".to_string(), event.clone().into());
        }
    }

    fn event_references(&self) -> Vec<&str> {
        let mut events = vec![self.positive_event.as_str()];
        events.extend(self.negative_event.as_deref());
        events
    }
}
