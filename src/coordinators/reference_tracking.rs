use serde_json::{Map, Value};

use super::{check_interventions, intervention_config, CampaignEvent, Start, Targeting};
use crate::common::{Interpolation, ValueMap};
use crate::error::{AuthoringError, Warning};
use crate::interventions::Intervention;
use crate::targeting::Predicate;

/// Keeps the share of the targeted group that satisfies `tracking` at or above a
/// desired level read from `time_value_map`, polling every `update_period_days`.
#[derive(Debug, Clone)]
pub struct ReferenceTrackingCoordinator {
    pub interventions: Vec<Intervention>,
    pub time_value_map: ValueMap,
    pub tracking: Predicate,
    pub targeting: Targeting,
    pub start_year: f64,
    pub end_year: f64,
    pub update_period_days: f64,
    warnings: Vec<Warning>,
}

impl ReferenceTrackingCoordinator {
    /// # Errors
    /// - If `interventions` is empty
    /// - If the targeting sets a demographic coverage
    /// - If `end_year <= start_year` or the update period is not positive
    /// - If a desired level lies outside of [0, 1]
    /// - If no point of `time_value_map` lies in `[start_year, end_year]`
    pub fn new(
        interventions: Vec<Intervention>,
        time_value_map: ValueMap,
        tracking: Predicate,
        targeting: Targeting,
        start_year: f64,
        end_year: f64,
        update_period_days: f64,
    ) -> Result<Self, AuthoringError> {
        check_interventions(&interventions)?;
        if let Some(coverage) = targeting.demographics.coverage() {
            return Err(AuthoringError::configuration(format!(
                "Reference tracking does not use Demographic_Coverage, but {coverage} was given."
            )));
        }
        if start_year.is_nan() || end_year.is_nan() || end_year <= start_year {
            return Err(AuthoringError::configuration(format!(
                "End_Year ({end_year}) must be after Start_Year ({start_year})."
            )));
        }
        if update_period_days.is_nan() || update_period_days <= 0.0 {
            return Err(AuthoringError::configuration(format!(
                "Update_Period must be positive, got {update_period_days}."
            )));
        }
        time_value_map.check_values("Time_Value_Map", 0.0, 1.0)?;

        let inside = time_value_map.count_within(start_year, end_year);
        let total = time_value_map.times().len();
        if inside == 0 {
            return Err(AuthoringError::configuration(format!(
                "None of the {total} Time_Value_Map point(s) lie within [{start_year}, {end_year}]."
            )));
        }
        let mut warnings = Vec::new();
        if inside < total {
            warnings.push(Warning::new(
                "ReferenceTrackingEventCoordinatorTrackingConfig",
                format!(
                    "{} of {total} Time_Value_Map point(s) lie outside of [{start_year}, {end_year}] and will be ignored.",
                    total - inside
                ),
            ));
        }
        Ok(ReferenceTrackingCoordinator {
            interventions,
            time_value_map,
            tracking,
            targeting,
            start_year,
            end_year,
            update_period_days,
            warnings,
        })
    }

    /// The desired share at `year`, holding the most recent point.
    #[must_use]
    pub fn desired(&self, year: f64) -> f64 {
        self.time_value_map.evaluate(year, Interpolation::ZeroOrder)
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = self.warnings.clone();
        warnings.extend(self.tracking.warnings());
        warnings.extend(self.targeting.warnings());
        warnings
    }

    #[must_use]
    pub fn campaign_event(self) -> CampaignEvent {
        CampaignEvent::new(Start::Year(self.start_year), self)
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            "class".to_string(),
            "ReferenceTrackingEventCoordinatorTrackingConfig".into(),
        );
        object.insert("Time_Value_Map".to_string(), self.time_value_map.to_json());
        object.insert("Tracking_Config".to_string(), self.tracking.to_json());
        self.targeting.write_fields(None, &mut object);
        object.insert("Update_Period".to_string(), self.update_period_days.into());
        object.insert("End_Year".to_string(), self.end_year.into());
        object.insert(
            "Intervention_Config".to_string(),
            intervention_config(&self.interventions),
        );
        Value::Object(object)
    }
}
