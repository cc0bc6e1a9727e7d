use serde_json::{Map, Value};

use super::{check_event, flag, InterventionPayload};
use crate::common::Distribution;
use crate::error::{check_non_negative, check_probability, check_range, AuthoringError};

/// Cox proportional-hazard parameters for survival on ART.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArtHazardRatios {
    pub baseline_hazard_weibull_shape: f64,
    pub baseline_hazard_weibull_scale: f64,
    pub hazard_ratio_female: f64,
    pub hazard_ratio_age_over_40_years: f64,
    /// Agents at or above this WHO stage get `hazard_ratio_who_stage_3_plus`.
    pub who_stage_threshold_for_cox: f64,
    pub hazard_ratio_who_stage_3_plus: f64,
    pub hazard_ratio_cd4_slope: f64,
    pub hazard_ratio_cd4_intercept: f64,
    pub hazard_ratio_body_weight_kg_slope: f64,
    pub hazard_ratio_body_weight_kg_intercept: f64,
}

impl Default for ArtHazardRatios {
    fn default() -> Self {
        ArtHazardRatios {
            baseline_hazard_weibull_shape: 0.34,
            baseline_hazard_weibull_scale: 123.83,
            hazard_ratio_female: 0.6775,
            hazard_ratio_age_over_40_years: 1.4309,
            who_stage_threshold_for_cox: 3.0,
            hazard_ratio_who_stage_3_plus: 2.7142,
            hazard_ratio_cd4_slope: -0.00758256281931556,
            hazard_ratio_cd4_intercept: 0.282851687024819,
            hazard_ratio_body_weight_kg_slope: -0.0731,
            hazard_ratio_body_weight_kg_intercept: 3.05,
        }
    }
}

impl ArtHazardRatios {
    /// # Errors
    /// If a shape, scale or ratio is negative, or the WHO stage threshold is
    /// outside of [1, 5].
    pub fn validate(&self) -> Result<(), AuthoringError> {
        check_range(
            "ART_Survival_Baseline_Hazard_Weibull_Shape",
            self.baseline_hazard_weibull_shape,
            0.0,
            10.0,
        )?;
        check_range(
            "ART_Survival_Baseline_Hazard_Weibull_Scale",
            self.baseline_hazard_weibull_scale,
            0.0,
            1.0e6,
        )?;
        check_non_negative("ART_Survival_Hazard_Ratio_Female", self.hazard_ratio_female)?;
        check_non_negative(
            "ART_Survival_Hazard_Ratio_Age_Over_40Yr",
            self.hazard_ratio_age_over_40_years,
        )?;
        check_range(
            "ART_Survival_WHO_Stage_Threshold_For_Cox",
            self.who_stage_threshold_for_cox,
            1.0,
            5.0,
        )?;
        check_non_negative(
            "ART_Survival_Hazard_Ratio_WHO_Stage_3Plus",
            self.hazard_ratio_who_stage_3_plus,
        )?;
        Ok(())
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        let fields = [
            (
                "ART_Survival_Baseline_Hazard_Weibull_Shape",
                self.baseline_hazard_weibull_shape,
            ),
            (
                "ART_Survival_Baseline_Hazard_Weibull_Scale",
                self.baseline_hazard_weibull_scale,
            ),
            ("ART_Survival_Hazard_Ratio_Female", self.hazard_ratio_female),
            (
                "ART_Survival_Hazard_Ratio_Age_Over_40Yr",
                self.hazard_ratio_age_over_40_years,
            ),
            (
                "ART_Survival_WHO_Stage_Threshold_For_Cox",
                self.who_stage_threshold_for_cox,
            ),
            (
                "ART_Survival_Hazard_Ratio_WHO_Stage_3Plus",
                self.hazard_ratio_who_stage_3_plus,
            ),
            ("ART_Survival_Hazard_Ratio_CD4_Slope", self.hazard_ratio_cd4_slope),
            (
                "ART_Survival_Hazard_Ratio_CD4_Intercept",
                self.hazard_ratio_cd4_intercept,
            ),
            (
                "ART_Survival_Hazard_Ratio_Body_Weight_Kg_Slope",
                self.hazard_ratio_body_weight_kg_slope,
            ),
            (
                "ART_Survival_Hazard_Ratio_Body_Weight_Kg_Intercept",
                self.hazard_ratio_body_weight_kg_intercept,
            ),
        ];
        for (name, value) in fields {
            object.insert(name.to_string(), value.into());
        }
    }
}

/// Puts the recipient on ART.
#[derive(Debug, Clone, PartialEq)]
pub struct AntiretroviralTherapy {
    pub hazard_ratios: ArtHazardRatios,
    pub days_to_achieve_viral_suppression: f64,
    pub art_multiplier_on_transmission_prob_per_act: f64,
    pub is_active_against_mortality_and_transmission: bool,
}

impl AntiretroviralTherapy {
    /// # Errors
    /// If a hazard ratio or the suppression delay is out of range.
    pub fn new(
        hazard_ratios: ArtHazardRatios,
        days_to_achieve_viral_suppression: f64,
    ) -> Result<Self, AuthoringError> {
        hazard_ratios.validate()?;
        check_non_negative(
            "Days_To_Achieve_Viral_Suppression",
            days_to_achieve_viral_suppression,
        )?;
        Ok(AntiretroviralTherapy {
            hazard_ratios,
            days_to_achieve_viral_suppression,
            art_multiplier_on_transmission_prob_per_act: 0.08,
            is_active_against_mortality_and_transmission: true,
        })
    }

    /// # Errors
    /// If `multiplier` is outside of [0, 1].
    pub fn with_transmission_multiplier(mut self, multiplier: f64) -> Result<Self, AuthoringError> {
        self.art_multiplier_on_transmission_prob_per_act =
            check_probability("ART_Multiplier_On_Transmission_Prob_Per_Act", multiplier)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_active_against_mortality_and_transmission(mut self, active: bool) -> Self {
        self.is_active_against_mortality_and_transmission = active;
        self
    }
}

impl Default for AntiretroviralTherapy {
    fn default() -> Self {
        AntiretroviralTherapy {
            hazard_ratios: ArtHazardRatios::default(),
            days_to_achieve_viral_suppression: 183.0,
            art_multiplier_on_transmission_prob_per_act: 0.08,
            is_active_against_mortality_and_transmission: true,
        }
    }
}

fn write_art_fields(art: &AntiretroviralTherapy, object: &mut Map<String, Value>) {
    art.hazard_ratios.write_fields(object);
    object.insert(
        "Days_To_Achieve_Viral_Suppression".to_string(),
        art.days_to_achieve_viral_suppression.into(),
    );
    object.insert(
        "ART_Multiplier_On_Transmission_Prob_Per_Act".to_string(),
        art.art_multiplier_on_transmission_prob_per_act.into(),
    );
    object.insert(
        "ART_Is_Active_Against_Mortality_And_Transmission".to_string(),
        flag(art.is_active_against_mortality_and_transmission),
    );
}

impl InterventionPayload for AntiretroviralTherapy {
    fn class_name(&self) -> &str {
        "AntiretroviralTherapy"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        write_art_fields(self, object);
    }
}

/// ART with a timer: the agent stops ART after a drawn time on treatment.
#[derive(Debug, Clone, PartialEq)]
pub struct AntiretroviralTherapyFull {
    pub art: AntiretroviralTherapy,
    pub time_on_art: Distribution,
    pub stop_art_event: Option<String>,
}

impl AntiretroviralTherapyFull {
    /// # Errors
    /// If `time_on_art` is invalid or `stop_art_event` is empty.
    pub fn new(
        art: AntiretroviralTherapy,
        time_on_art: Distribution,
        stop_art_event: Option<&str>,
    ) -> Result<Self, AuthoringError> {
        time_on_art.validate()?;
        let stop_art_event = stop_art_event
            .map(|event| check_event("Stop_ART_Event", event))
            .transpose()?;
        Ok(AntiretroviralTherapyFull {
            art,
            time_on_art,
            stop_art_event,
        })
    }
}

impl InterventionPayload for AntiretroviralTherapyFull {
    fn class_name(&self) -> &str {
        "AntiretroviralTherapyFull"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        write_art_fields(&self.art, object);
        self.time_on_art.write_fields("Time_On_ART", object);
        if let Some(event) = &self.stop_art_event {
            object.insert("Stop_ART_Event".to_string(), event.clone().into());
        }
    }

    fn event_references(&self) -> Vec<&str> {
        self.stop_art_event.as_deref().into_iter().collect()
    }
}

/// Takes the recipient off ART.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArtDropout;

impl InterventionPayload for ArtDropout {
    fn class_name(&self) -> &str {
        "ARTDropout"
    }

    fn write_fields(&self, _object: &mut Map<String, Value>) {}
}

const MAX_AGE_BIN_YEARS: f64 = 125.0;
const MAX_CD4_BIN: f64 = 1000.0;

/// ART with mortality read from a table indexed by
/// `[duration on ART][age][CD4]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtMortalityTable {
    art_duration_days_bins: Vec<f64>,
    age_years_bins: Vec<f64>,
    cd4_count_bins: Vec<f64>,
    mortality_table: Vec<Vec<Vec<f64>>>,
    pub days_to_achieve_viral_suppression: f64,
    pub art_multiplier_on_transmission_prob_per_act: f64,
    pub is_active_against_mortality_and_transmission: bool,
}

fn check_bins(name: &str, bins: &[f64], max: f64) -> Result<(), AuthoringError> {
    if bins.is_empty() {
        return Err(AuthoringError::configuration(format!(
            "{name} must have at least one bin."
        )));
    }
    for &bin in bins {
        check_range(name, bin, 0.0, max)?;
    }
    if let Some(pair) = bins.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(AuthoringError::configuration(format!(
            "{name} must be strictly ascending, but {} is followed by {}.",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

impl ArtMortalityTable {
    /// # Errors
    /// - If a bin vector is empty, not strictly ascending, negative, or above its
    ///   cap (125 years for age, 1000 for CD4)
    /// - If the table dimensions differ from the bin vector lengths
    /// - If a cell is outside of [0, 1]
    pub fn new(
        art_duration_days_bins: Vec<f64>,
        age_years_bins: Vec<f64>,
        cd4_count_bins: Vec<f64>,
        mortality_table: Vec<Vec<Vec<f64>>>,
    ) -> Result<Self, AuthoringError> {
        check_bins("ART_Duration_Days_Bins", &art_duration_days_bins, f64::MAX)?;
        check_bins("Age_Years_Bins", &age_years_bins, MAX_AGE_BIN_YEARS)?;
        check_bins("CD4_Count_Bins", &cd4_count_bins, MAX_CD4_BIN)?;

        if mortality_table.len() != art_duration_days_bins.len() {
            return Err(AuthoringError::configuration(format!(
                "MortalityTable has {} duration rows but ART_Duration_Days_Bins has {} bins.",
                mortality_table.len(),
                art_duration_days_bins.len()
            )));
        }
        for (i, by_age) in mortality_table.iter().enumerate() {
            if by_age.len() != age_years_bins.len() {
                return Err(AuthoringError::configuration(format!(
                    "MortalityTable[{i}] has {} age rows but Age_Years_Bins has {} bins.",
                    by_age.len(),
                    age_years_bins.len()
                )));
            }
            for (j, by_cd4) in by_age.iter().enumerate() {
                if by_cd4.len() != cd4_count_bins.len() {
                    return Err(AuthoringError::configuration(format!(
                        "MortalityTable[{i}][{j}] has {} CD4 cells but CD4_Count_Bins has {} bins.",
                        by_cd4.len(),
                        cd4_count_bins.len()
                    )));
                }
                for (k, &cell) in by_cd4.iter().enumerate() {
                    check_probability(&format!("MortalityTable[{i}][{j}][{k}]"), cell)?;
                }
            }
        }

        Ok(ArtMortalityTable {
            art_duration_days_bins,
            age_years_bins,
            cd4_count_bins,
            mortality_table,
            days_to_achieve_viral_suppression: 183.0,
            art_multiplier_on_transmission_prob_per_act: 0.08,
            is_active_against_mortality_and_transmission: true,
        })
    }

    /// The mortality rate for the bins containing the given covariates. Values below
    /// the first bin read the first bin.
    #[must_use]
    pub fn mortality(&self, days_on_art: f64, age_years: f64, cd4: f64) -> f64 {
        let index = |bins: &[f64], x: f64| bins.iter().rposition(|&b| b <= x).unwrap_or(0);
        let i = index(&self.art_duration_days_bins, days_on_art);
        let j = index(&self.age_years_bins, age_years);
        let k = index(&self.cd4_count_bins, cd4);
        self.mortality_table[i][j][k]
    }
}

impl InterventionPayload for ArtMortalityTable {
    fn class_name(&self) -> &str {
        "ARTMortalityTable"
    }

    fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "ART_Duration_Days_Bins".to_string(),
            self.art_duration_days_bins.clone().into(),
        );
        object.insert("Age_Years_Bins".to_string(), self.age_years_bins.clone().into());
        object.insert("CD4_Count_Bins".to_string(), self.cd4_count_bins.clone().into());
        object.insert("MortalityTable".to_string(), self.mortality_table.clone().into());
        object.insert(
            "Days_To_Achieve_Viral_Suppression".to_string(),
            self.days_to_achieve_viral_suppression.into(),
        );
        object.insert(
            "ART_Multiplier_On_Transmission_Prob_Per_Act".to_string(),
            self.art_multiplier_on_transmission_prob_per_act.into(),
        );
        object.insert(
            "ART_Is_Active_Against_Mortality_And_Transmission".to_string(),
            flag(self.is_active_against_mortality_and_transmission),
        );
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use statrs::assert_almost_eq;

    use super::{AntiretroviralTherapy, AntiretroviralTherapyFull, ArtHazardRatios, ArtMortalityTable};
    use crate::common::Distribution;
    use crate::error::AuthoringError;
    use crate::interventions::Intervention;

    fn table(cell: f64) -> Vec<Vec<Vec<f64>>> {
        vec![vec![vec![cell; 3]; 2]; 2]
    }

    #[test]
    fn test_mortality_table_accepts_matching_shape() {
        let mortality = ArtMortalityTable::new(
            vec![0.0, 183.0],
            vec![0.0, 40.0],
            vec![0.0, 200.0, 350.0],
            table(0.1),
        )
        .unwrap();
        assert_almost_eq!(mortality.mortality(365.0, 25.0, 500.0), 0.1, 1e-12);
        let json = Intervention::from(mortality).to_json();
        assert_eq!(json["class"], "ARTMortalityTable");
        assert_eq!(json["CD4_Count_Bins"], json!([0.0, 200.0, 350.0]));
    }

    #[test]
    fn test_mortality_table_shape_mismatch() {
        let result = ArtMortalityTable::new(
            vec![0.0, 183.0, 365.0],
            vec![0.0, 40.0],
            vec![0.0, 200.0, 350.0],
            table(0.1),
        );
        assert!(matches!(result, Err(AuthoringError::Configuration(_))));
    }

    #[test]
    fn test_mortality_table_bins_must_ascend() {
        let result = ArtMortalityTable::new(
            vec![183.0, 0.0],
            vec![0.0, 40.0],
            vec![0.0, 200.0, 350.0],
            table(0.1),
        );
        assert!(matches!(result, Err(AuthoringError::Configuration(_))));
    }

    #[test]
    fn test_mortality_table_caps() {
        let result = ArtMortalityTable::new(
            vec![0.0, 183.0],
            vec![0.0, 130.0],
            vec![0.0, 200.0, 350.0],
            table(0.1),
        );
        assert!(matches!(result, Err(AuthoringError::Range { .. })));
        let result = ArtMortalityTable::new(
            vec![0.0, 183.0],
            vec![0.0, 40.0],
            vec![0.0, 200.0, 1001.0],
            table(0.1),
        );
        assert!(matches!(result, Err(AuthoringError::Range { .. })));
        let result = ArtMortalityTable::new(
            vec![0.0, 183.0],
            vec![0.0, 40.0],
            vec![0.0, 200.0, 350.0],
            table(1.5),
        );
        assert!(matches!(result, Err(AuthoringError::Range { .. })));
    }

    #[test]
    fn test_art_full_serializes_timer() {
        let full = AntiretroviralTherapyFull::new(
            AntiretroviralTherapy::default(),
            Distribution::exponential(365.0).unwrap(),
            Some("StoppedART"),
        )
        .unwrap();
        let intervention = Intervention::from(full);
        let json = intervention.to_json();
        assert_eq!(json["Time_On_ART_Distribution"], "EXPONENTIAL_DISTRIBUTION");
        assert_eq!(json["Time_On_ART_Exponential"], json!(365.0));
        assert_eq!(json["Stop_ART_Event"], "StoppedART");
        assert_eq!(intervention.event_references(), vec!["StoppedART"]);
    }

    #[test]
    fn test_hazard_ratio_validation() {
        let ratios = ArtHazardRatios {
            who_stage_threshold_for_cox: 7.0,
            ..ArtHazardRatios::default()
        };
        assert!(AntiretroviralTherapy::new(ratios, 183.0).is_err());
        assert!(AntiretroviralTherapy::new(ArtHazardRatios::default(), -1.0).is_err());
    }
}
