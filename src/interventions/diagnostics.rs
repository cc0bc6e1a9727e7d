//! HIV diagnostics. All share sensitivity, specificity and outcome parameters and
//! differ in what they read off the agent.

use serde_json::{json, Map, Value};

use super::outcome::DiagnosisOutcomes;
use super::{check_event, flag, Intervention, InterventionPayload};
use crate::common::{Interpolation, Sigmoid, ValueMap};
use crate::error::{check_non_negative, check_probability, check_range, AuthoringError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticParameters {
    pub base_sensitivity: f64,
    pub base_specificity: f64,
    pub treatment_fraction: f64,
    pub days_to_diagnosis: f64,
    /// Only test agents who are symptomatic.
    pub enable_is_symptomatic: bool,
}

impl Default for DiagnosticParameters {
    fn default() -> Self {
        DiagnosticParameters {
            base_sensitivity: 1.0,
            base_specificity: 1.0,
            treatment_fraction: 1.0,
            days_to_diagnosis: 0.0,
            enable_is_symptomatic: false,
        }
    }
}

impl DiagnosticParameters {
    /// # Errors
    /// If a probability is outside of [0, 1] or `days_to_diagnosis` is negative.
    pub fn validate(&self) -> Result<(), AuthoringError> {
        check_probability("Base_Sensitivity", self.base_sensitivity)?;
        check_probability("Base_Specificity", self.base_specificity)?;
        check_probability("Treatment_Fraction", self.treatment_fraction)?;
        check_non_negative("Days_To_Diagnosis", self.days_to_diagnosis)?;
        Ok(())
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert("Base_Sensitivity".to_string(), self.base_sensitivity.into());
        object.insert("Base_Specificity".to_string(), self.base_specificity.into());
        object.insert("Treatment_Fraction".to_string(), self.treatment_fraction.into());
        object.insert("Days_To_Diagnosis".to_string(), self.days_to_diagnosis.into());
        object.insert(
            "Enable_IsSymptomatic".to_string(),
            flag(self.enable_is_symptomatic),
        );
    }
}

/// A `[low, high)` band mapped to the event broadcast for agents inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdEvent {
    pub low: f64,
    pub high: f64,
    pub event: String,
}

impl ThresholdEvent {
    /// # Errors
    /// If `low >= high`, a bound is negative, or the event is empty.
    pub fn new(low: f64, high: f64, event: &str) -> Result<Self, AuthoringError> {
        check_non_negative("Low", low)?;
        check_non_negative("High", high)?;
        if low >= high {
            return Err(AuthoringError::configuration(format!(
                "The threshold band [{low}, {high}) is empty; Low must be less than High."
            )));
        }
        Ok(ThresholdEvent {
            low,
            high,
            event: check_event("Event", event)?,
        })
    }

    fn to_json(&self) -> Value {
        json!({"Low": self.low, "High": self.high, "Event": self.event})
    }
}

fn check_thresholds(name: &str, thresholds: &[ThresholdEvent]) -> Result<(), AuthoringError> {
    if thresholds.is_empty() {
        return Err(AuthoringError::configuration(format!(
            "{name} needs at least one threshold band."
        )));
    }
    let mut sorted: Vec<&ThresholdEvent> = thresholds.iter().collect();
    sorted.sort_by(|a, b| a.low.total_cmp(&b.low));
    for pair in sorted.windows(2) {
        if pair[1].low < pair[0].high {
            return Err(AuthoringError::configuration(format!(
                "{name} bands [{}, {}) and [{}, {}) overlap.",
                pair[0].low, pair[0].high, pair[1].low, pair[1].high
            )));
        }
    }
    Ok(())
}

/// WHO-stage treatment thresholds of the CD4-agnostic staging diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct WhoStageThresholds {
    pub adult_treatment_age: f64,
    pub adult_by_who_stage: ValueMap,
    pub child_treat_under_age_in_years_threshold: ValueMap,
    pub child_by_who_stage: ValueMap,
    pub adult_by_tb: ValueMap,
    pub adult_by_pregnant: ValueMap,
    pub child_by_tb: ValueMap,
}

impl WhoStageThresholds {
    fn validate(&self) -> Result<(), AuthoringError> {
        check_range("Adult_Treatment_Age", self.adult_treatment_age, 0.0, 125.0)?;
        self.adult_by_who_stage
            .check_values("Adult_By_WHO_Stage", 1.0, 5.0)?;
        self.child_by_who_stage
            .check_values("Child_By_WHO_Stage", 1.0, 5.0)?;
        self.child_treat_under_age_in_years_threshold
            .check_values("Child_Treat_Under_Age_In_Years_Threshold", 0.0, 125.0)?;
        for (name, map) in [
            ("Adult_By_TB", &self.adult_by_tb),
            ("Adult_By_Pregnant", &self.adult_by_pregnant),
            ("Child_By_TB", &self.child_by_tb),
        ] {
            map.check_values(name, 0.0, 1.0)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    Standard,
    Age {
        thresholds: Vec<ThresholdEvent>,
    },
    Cd4 {
        thresholds: Vec<ThresholdEvent>,
    },
    RapidHiv {
        probability_received_result: f64,
    },
    SigmoidByYearAndSex {
        ramp: Sigmoid,
        female_multiplier: f64,
    },
    PiecewiseByYearAndSex {
        time_value_map: ValueMap,
        interpolation: Interpolation,
        female_multiplier: f64,
        default_value: f64,
    },
    ArtStagingByCd4 {
        threshold: ValueMap,
        if_active_tb: ValueMap,
        if_pregnant: ValueMap,
    },
    ArtStagingCd4Agnostic(WhoStageThresholds),
}

impl DiagnosticKind {
    fn class_name(&self) -> &'static str {
        match self {
            DiagnosticKind::Standard => "StandardDiagnostic",
            DiagnosticKind::Age { .. } => "AgeDiagnostic",
            DiagnosticKind::Cd4 { .. } => "CD4Diagnostic",
            DiagnosticKind::RapidHiv { .. } => "HIVRapidHIVDiagnostic",
            DiagnosticKind::SigmoidByYearAndSex { .. } => "HIVSigmoidByYearAndSexDiagnostic",
            DiagnosticKind::PiecewiseByYearAndSex { .. } => "HIVPiecewiseByYearAndSexDiagnostic",
            DiagnosticKind::ArtStagingByCd4 { .. } => "HIVARTStagingByCD4Diagnostic",
            DiagnosticKind::ArtStagingCd4Agnostic(_) => "HIVARTStagingCD4AgnosticDiagnostic",
        }
    }

    fn validate(&self) -> Result<(), AuthoringError> {
        match self {
            DiagnosticKind::Standard => {}
            DiagnosticKind::Age { thresholds } => {
                check_thresholds("Age_Thresholds", thresholds)?;
                for threshold in thresholds {
                    check_range("Age_Thresholds High", threshold.high, 0.0, 200.0)?;
                }
            }
            DiagnosticKind::Cd4 { thresholds } => {
                check_thresholds("CD4_Thresholds", thresholds)?;
                for threshold in thresholds {
                    check_range("CD4_Thresholds High", threshold.high, 0.0, 2000.0)?;
                }
            }
            DiagnosticKind::RapidHiv {
                probability_received_result,
            } => {
                check_probability("Probability_Received_Result", *probability_received_result)?;
            }
            DiagnosticKind::SigmoidByYearAndSex {
                ramp,
                female_multiplier,
            } => {
                check_probability("Ramp_Min", ramp.min)?;
                check_probability("Ramp_Max", ramp.max)?;
                check_non_negative("Female_Multiplier", *female_multiplier)?;
            }
            DiagnosticKind::PiecewiseByYearAndSex {
                time_value_map,
                female_multiplier,
                default_value,
                ..
            } => {
                time_value_map.check_values("Time_Value_Map", 0.0, 1.0)?;
                check_non_negative("Female_Multiplier", *female_multiplier)?;
                check_probability("Default_Value", *default_value)?;
            }
            DiagnosticKind::ArtStagingByCd4 {
                threshold,
                if_active_tb,
                if_pregnant,
            } => {
                threshold.check_values("Threshold", 0.0, 2000.0)?;
                if_active_tb.check_values("If_Active_TB", 0.0, 2000.0)?;
                if_pregnant.check_values("If_Pregnant", 0.0, 2000.0)?;
            }
            DiagnosticKind::ArtStagingCd4Agnostic(thresholds) => thresholds.validate()?,
        }
        Ok(())
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        match self {
            DiagnosticKind::Standard => {}
            DiagnosticKind::Age { thresholds } => {
                let thresholds: Vec<Value> = thresholds.iter().map(ThresholdEvent::to_json).collect();
                object.insert("Age_Thresholds".to_string(), thresholds.into());
            }
            DiagnosticKind::Cd4 { thresholds } => {
                let thresholds: Vec<Value> = thresholds.iter().map(ThresholdEvent::to_json).collect();
                object.insert("CD4_Thresholds".to_string(), thresholds.into());
            }
            DiagnosticKind::RapidHiv {
                probability_received_result,
            } => {
                object.insert(
                    "Probability_Received_Result".to_string(),
                    (*probability_received_result).into(),
                );
            }
            DiagnosticKind::SigmoidByYearAndSex {
                ramp,
                female_multiplier,
            } => {
                object.insert("Ramp_Min".to_string(), ramp.min.into());
                object.insert("Ramp_Max".to_string(), ramp.max.into());
                object.insert("Ramp_MidYear".to_string(), ramp.mid.into());
                object.insert("Ramp_Rate".to_string(), ramp.rate.into());
                object.insert("Female_Multiplier".to_string(), (*female_multiplier).into());
            }
            DiagnosticKind::PiecewiseByYearAndSex {
                time_value_map,
                interpolation,
                female_multiplier,
                default_value,
            } => {
                object.insert("Time_Value_Map".to_string(), time_value_map.to_json());
                let order = match interpolation {
                    Interpolation::ZeroOrder => 0,
                    Interpolation::Linear => 1,
                };
                object.insert("Interpolation_Order".to_string(), order.into());
                object.insert("Female_Multiplier".to_string(), (*female_multiplier).into());
                object.insert("Default_Value".to_string(), (*default_value).into());
            }
            DiagnosticKind::ArtStagingByCd4 {
                threshold,
                if_active_tb,
                if_pregnant,
            } => {
                object.insert("Threshold".to_string(), threshold.to_json());
                object.insert("If_Active_TB".to_string(), if_active_tb.to_json());
                object.insert("If_Pregnant".to_string(), if_pregnant.to_json());
            }
            DiagnosticKind::ArtStagingCd4Agnostic(thresholds) => {
                object.insert(
                    "Adult_Treatment_Age".to_string(),
                    thresholds.adult_treatment_age.into(),
                );
                object.insert(
                    "Adult_By_WHO_Stage".to_string(),
                    thresholds.adult_by_who_stage.to_json(),
                );
                object.insert(
                    "Child_Treat_Under_Age_In_Years_Threshold".to_string(),
                    thresholds.child_treat_under_age_in_years_threshold.to_json(),
                );
                object.insert(
                    "Child_By_WHO_Stage".to_string(),
                    thresholds.child_by_who_stage.to_json(),
                );
                object.insert("Adult_By_TB".to_string(), thresholds.adult_by_tb.to_json());
                object.insert(
                    "Adult_By_Pregnant".to_string(),
                    thresholds.adult_by_pregnant.to_json(),
                );
                object.insert("Child_By_TB".to_string(), thresholds.child_by_tb.to_json());
            }
        }
    }

    fn event_references(&self) -> Vec<&str> {
        match self {
            DiagnosticKind::Age { thresholds } | DiagnosticKind::Cd4 { thresholds } => {
                thresholds.iter().map(|t| t.event.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub parameters: DiagnosticParameters,
    pub outcomes: DiagnosisOutcomes,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// # Errors
    /// If the shared parameters or the kind-specific payload are out of range.
    pub fn new(
        kind: DiagnosticKind,
        parameters: DiagnosticParameters,
        outcomes: DiagnosisOutcomes,
    ) -> Result<Self, AuthoringError> {
        parameters.validate()?;
        kind.validate()?;
        Ok(Diagnostic {
            parameters,
            outcomes,
            kind,
        })
    }

    /// A `StandardDiagnostic` with default sensitivity and specificity.
    ///
    /// # Errors
    /// If `positive_event` is empty.
    pub fn standard(positive_event: &str) -> Result<Self, AuthoringError> {
        Self::new(
            DiagnosticKind::Standard,
            DiagnosticParameters::default(),
            DiagnosisOutcomes::positive_event(&check_event("Positive_Diagnosis_Event", positive_event)?),
        )
    }
}

impl InterventionPayload for Diagnostic {
    fn class_name(&self) -> &str {
        self.kind.class_name()
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        self.parameters.write_fields(object);
        self.kind.write_fields(object);
        self.outcomes.write_fields(object);
    }

    fn event_references(&self) -> Vec<&str> {
        let mut events = self.outcomes.event_references();
        events.extend(self.kind.event_references());
        events
    }

    fn nested(&self) -> Vec<&Intervention> {
        self.outcomes.nested()
    }
}
