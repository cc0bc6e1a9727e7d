use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use super::{CampaignEvent, Start};
use crate::common::{PropertyRestrictions, Sex};
use crate::error::{check_non_negative, AuthoringError};
use crate::interventions::Intervention;

/// Distance between a window's start year and its default end year.
pub const WINDOW_LENGTH_YEARS: f64 = 0.999_999;

/// An age band in years, `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeRange {
    pub min: f64,
    pub max: f64,
}

impl AgeRange {
    #[must_use]
    pub fn contains(&self, age_years: f64) -> bool {
        age_years >= self.min && age_years < self.max
    }

    #[must_use]
    pub fn overlaps(&self, other: &AgeRange) -> bool {
        self.min < other.max && other.min < self.max
    }
}

/// The disease-state atoms a `Target_Disease_State` conjunction is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiseaseStateAtom {
    HivPositive,
    HivNegative,
    TestedPositive,
    TestedNegative,
    MaleCircumcisionPositive,
    MaleCircumcisionNegative,
    HasIntervention,
    NotHaveIntervention,
}

impl DiseaseStateAtom {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DiseaseStateAtom::HivPositive => "HIV_Positive",
            DiseaseStateAtom::HivNegative => "HIV_Negative",
            DiseaseStateAtom::TestedPositive => "Tested_Positive",
            DiseaseStateAtom::TestedNegative => "Tested_Negative",
            DiseaseStateAtom::MaleCircumcisionPositive => "Male_Circumcision_Positive",
            DiseaseStateAtom::MaleCircumcisionNegative => "Male_Circumcision_Negative",
            DiseaseStateAtom::HasIntervention => "Has_Intervention",
            DiseaseStateAtom::NotHaveIntervention => "Not_Have_Intervention",
        }
    }

    #[must_use]
    pub fn needs_intervention_name(self) -> bool {
        matches!(
            self,
            DiseaseStateAtom::HasIntervention | DiseaseStateAtom::NotHaveIntervention
        )
    }
}

/// Target counts per age band, either regardless of sex or per sex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCounts {
    Total(Vec<u32>),
    BySex { males: Vec<u32>, females: Vec<u32> },
}

impl TargetCounts {
    /// Per-sex counts where a missing list defaults to zeros of the other's arity.
    ///
    /// # Errors
    /// If both lists are missing or their lengths differ.
    pub fn by_sex(males: Option<Vec<u32>>, females: Option<Vec<u32>>) -> Result<Self, AuthoringError> {
        let (males, females) = match (males, females) {
            (None, None) => {
                return Err(AuthoringError::configuration(
                    "Either Num_Targeted or at least one of Num_Targeted_Males and Num_Targeted_Females must be given.",
                ))
            }
            (Some(males), None) => {
                let zeros = vec![0; males.len()];
                (males, zeros)
            }
            (None, Some(females)) => (vec![0; females.len()], females),
            (Some(males), Some(females)) => (males, females),
        };
        if males.len() != females.len() {
            return Err(AuthoringError::configuration(format!(
                "Num_Targeted_Males has {} entries but Num_Targeted_Females has {}.",
                males.len(),
                females.len()
            )));
        }
        Ok(TargetCounts::BySex { males, females })
    }

    fn arity(&self) -> usize {
        match self {
            TargetCounts::Total(counts) => counts.len(),
            TargetCounts::BySex { males, .. } => males.len(),
        }
    }

    fn sum(&self) -> u64 {
        match self {
            TargetCounts::Total(counts) => counts.iter().map(|&n| u64::from(n)).sum(),
            TargetCounts::BySex { males, females } => males
                .iter()
                .chain(females.iter())
                .map(|&n| u64::from(n))
                .sum(),
        }
    }
}

/// One exact-count target: an age band, optionally a sex, and its count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub age_range: AgeRange,
    pub sex: Option<Sex>,
    pub count: u32,
}

/// Exact-count targets for one time window `[start_year, end_year)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetedDistribution {
    pub start_year: f64,
    pub end_year: f64,
    age_ranges: Vec<AgeRange>,
    counts: TargetCounts,
    property_restrictions: PropertyRestrictions,
    disease_state: Vec<Vec<DiseaseStateAtom>>,
    has_intervention_name: Option<String>,
}

impl TargetedDistribution {
    /// # Errors
    /// - If `start_year >= end_year`
    /// - If `age_mins` and `age_maxs` differ in length, a band has `min > max`, or
    ///   two bands overlap
    /// - If the count lists do not have one entry per band
    pub fn new(
        start_year: f64,
        end_year: f64,
        age_mins: &[f64],
        age_maxs: &[f64],
        counts: TargetCounts,
    ) -> Result<Self, AuthoringError> {
        if start_year.is_nan() || end_year.is_nan() || start_year >= end_year {
            return Err(AuthoringError::configuration(format!(
                "Start_Year ({start_year}) must be before End_Year ({end_year})."
            )));
        }
        if age_mins.len() != age_maxs.len() {
            return Err(AuthoringError::configuration(format!(
                "{} minimum ages were given for {} maximum ages.",
                age_mins.len(),
                age_maxs.len()
            )));
        }
        let mut age_ranges = Vec::with_capacity(age_mins.len());
        for (&min, &max) in age_mins.iter().zip(age_maxs) {
            check_non_negative("Age_Ranges_Years.Min", min)?;
            check_non_negative("Age_Ranges_Years.Max", max)?;
            if min > max {
                return Err(AuthoringError::configuration(format!(
                    "Age range minimum {min} is greater than its maximum {max}."
                )));
            }
            let range = AgeRange { min, max };
            if let Some(other) = age_ranges.iter().find(|r: &&AgeRange| r.overlaps(&range)) {
                return Err(AuthoringError::configuration(format!(
                    "Age ranges [{}, {}) and [{min}, {max}) overlap.",
                    other.min, other.max
                )));
            }
            age_ranges.push(range);
        }
        if counts.arity() != age_ranges.len() {
            return Err(AuthoringError::configuration(format!(
                "{} age ranges were given but the count lists have {} entries.",
                age_ranges.len(),
                counts.arity()
            )));
        }
        Ok(TargetedDistribution {
            start_year,
            end_year,
            age_ranges,
            counts,
            property_restrictions: PropertyRestrictions::new(),
            disease_state: Vec::new(),
            has_intervention_name: None,
        })
    }

    /// # Errors
    /// If `restrictions` includes node-level property restrictions.
    pub fn with_property_restrictions(
        mut self,
        restrictions: PropertyRestrictions,
    ) -> Result<Self, AuthoringError> {
        if restrictions.has_node_restrictions() {
            return Err(AuthoringError::configuration(
                "N-Chooser distributions only accept individual property restrictions.",
            ));
        }
        self.property_restrictions = restrictions;
        Ok(self)
    }

    /// Restricts candidates to a disease state in disjunctive normal form. The
    /// intervention name is required exactly when an atom tests for an intervention.
    ///
    /// # Errors
    /// If the intervention name is missing, empty or not needed.
    pub fn with_disease_state(
        mut self,
        disease_state: Vec<Vec<DiseaseStateAtom>>,
        has_intervention_name: Option<&str>,
    ) -> Result<Self, AuthoringError> {
        let needs_name = disease_state
            .iter()
            .flatten()
            .any(|atom| atom.needs_intervention_name());
        let name = has_intervention_name.map(str::trim);
        match (needs_name, name) {
            (true, None | Some("")) => {
                return Err(AuthoringError::configuration(
                    "Target_Disease_State tests for an intervention, so \
                     Target_Disease_State_Has_Intervention_Name must be given.",
                ))
            }
            (false, Some(name)) => {
                return Err(AuthoringError::configuration(format!(
                    "Target_Disease_State_Has_Intervention_Name '{name}' was given but no \
                     Has_Intervention or Not_Have_Intervention atom uses it."
                )))
            }
            _ => {}
        }
        self.disease_state = disease_state;
        self.has_intervention_name = name.map(str::to_string);
        Ok(self)
    }

    #[must_use]
    pub fn age_ranges(&self) -> &[AgeRange] {
        &self.age_ranges
    }

    #[must_use]
    pub fn counts(&self) -> &TargetCounts {
        &self.counts
    }

    #[must_use]
    pub fn property_restrictions(&self) -> &PropertyRestrictions {
        &self.property_restrictions
    }

    #[must_use]
    pub fn disease_state(&self) -> &[Vec<DiseaseStateAtom>] {
        &self.disease_state
    }

    #[must_use]
    pub fn has_intervention_name(&self) -> Option<&str> {
        self.has_intervention_name.as_deref()
    }

    #[must_use]
    pub fn contains_year(&self, year: f64) -> bool {
        year >= self.start_year && year < self.end_year
    }

    /// The exact-count cells, band by band and males before females.
    #[must_use]
    pub fn cells(&self) -> Vec<Cell> {
        match &self.counts {
            TargetCounts::Total(counts) => self
                .age_ranges
                .iter()
                .zip(counts)
                .map(|(&age_range, &count)| Cell {
                    age_range,
                    sex: None,
                    count,
                })
                .collect(),
            TargetCounts::BySex { males, females } => self
                .age_ranges
                .iter()
                .zip(males.iter().zip(females))
                .flat_map(|(&age_range, (&male, &female))| {
                    [
                        Cell {
                            age_range,
                            sex: Some(Sex::Male),
                            count: male,
                        },
                        Cell {
                            age_range,
                            sex: Some(Sex::Female),
                            count: female,
                        },
                    ]
                })
                .collect(),
        }
    }

    /// Window totals per cell after scaling by `x_base_population`. The totals add
    /// up to `round(sum(counts) * x_base_population)`; the rounding remainder goes
    /// to the cells with the largest fractional parts.
    #[must_use]
    pub fn cell_targets(&self, x_base_population: f64) -> Vec<u32> {
        let cells = self.cells();
        #[allow(clippy::cast_precision_loss)]
        let scaled: Vec<f64> = cells
            .iter()
            .map(|cell| f64::from(cell.count) * x_base_population)
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let total = (self.counts.sum() as f64 * x_base_population).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut targets: Vec<u32> = scaled.iter().map(|s| s.floor() as u32).collect();
        let assigned: f64 = targets.iter().map(|&t| f64::from(t)).sum();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let remainder = (total - assigned).max(0.0) as usize;

        let mut by_fraction: Vec<usize> = (0..cells.len()).collect();
        by_fraction.sort_by(|&a, &b| {
            let fa = scaled[a] - scaled[a].floor();
            let fb = scaled[b] - scaled[b].floor();
            fb.total_cmp(&fa).then(a.cmp(&b))
        });
        for &index in by_fraction.iter().take(remainder) {
            targets[index] += 1;
        }
        targets
    }

    /// The per-step, per-cell allocation over a window of `steps` timesteps:
    /// `plan[k][c]` is how many agents cell `c` receives at step `k`.
    #[must_use]
    pub fn step_plan(&self, x_base_population: f64, steps: u32) -> Vec<Vec<u32>> {
        let targets = self.cell_targets(x_base_population);
        (0..steps)
            .map(|k| {
                targets
                    .iter()
                    .map(|&total| step_allocation(total, steps, k))
                    .collect()
            })
            .collect()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("Start_Year".to_string(), self.start_year.into());
        object.insert("End_Year".to_string(), self.end_year.into());
        object.insert(
            "Age_Ranges_Years".to_string(),
            self.age_ranges
                .iter()
                .map(|r| json!({"Min": r.min, "Max": r.max}))
                .collect(),
        );
        match &self.counts {
            TargetCounts::Total(counts) => {
                object.insert("Num_Targeted".to_string(), json!(counts));
            }
            TargetCounts::BySex { males, females } => {
                object.insert("Num_Targeted_Males".to_string(), json!(males));
                object.insert("Num_Targeted_Females".to_string(), json!(females));
            }
        }
        object.insert(
            "Property_Restrictions_Within_Node".to_string(),
            self.property_restrictions.individual_json(),
        );
        object.insert(
            "Target_Disease_State".to_string(),
            self.disease_state
                .iter()
                .map(|conjunction| {
                    conjunction
                        .iter()
                        .map(|atom| Value::from(atom.as_str()))
                        .collect::<Value>()
                })
                .collect(),
        );
        if let Some(name) = &self.has_intervention_name {
            object.insert(
                "Target_Disease_State_Has_Intervention_Name".to_string(),
                name.clone().into(),
            );
        }
        Value::Object(object)
    }
}

/// How many of `total` agents step `k` of `steps` receives. Step `k` gets
/// `round((k+1)·total/steps) − round(k·total/steps)`, so the running sum after the
/// last step is exactly `total`.
#[must_use]
pub fn step_allocation(total: u32, steps: u32, k: u32) -> u32 {
    if steps == 0 || k >= steps {
        return 0;
    }
    let cumulative = |i: u32| -> u128 {
        let numerator = u128::from(i) * u128::from(total);
        let steps = u128::from(steps);
        (2 * numerator + steps) / (2 * steps)
    };
    #[allow(clippy::cast_possible_truncation)]
    let allocation = (cumulative(k + 1) - cumulative(k)) as u32;
    allocation
}

/// Count column of an [`NChooserRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCount {
    Total(u32),
    BySex { male: u32, female: u32 },
}

/// One row of an N-Chooser table: a year, an age band and its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NChooserRow {
    pub year: i32,
    pub age_min: f64,
    pub age_max: f64,
    pub count: RowCount,
}

/// Chooses exactly the targeted number of agents per window and cell.
#[derive(Debug, Clone)]
pub struct NChooserCoordinator {
    pub distributions: Vec<TargetedDistribution>,
    pub intervention: Intervention,
}

impl NChooserCoordinator {
    /// # Errors
    /// If there are no distributions or two windows overlap.
    pub fn new(
        distributions: Vec<TargetedDistribution>,
        intervention: Intervention,
    ) -> Result<Self, AuthoringError> {
        if distributions.is_empty() {
            return Err(AuthoringError::configuration(
                "An N-Chooser needs at least one targeted distribution.",
            ));
        }
        let mut windows: Vec<(f64, f64)> = distributions
            .iter()
            .map(|d| (d.start_year, d.end_year))
            .collect();
        windows.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(pair) = windows.windows(2).find(|w| w[1].0 < w[0].1) {
            return Err(AuthoringError::configuration(format!(
                "N-Chooser windows [{}, {}) and [{}, {}) overlap.",
                pair[0].0, pair[0].1, pair[1].0, pair[1].1
            )));
        }
        Ok(NChooserCoordinator {
            distributions,
            intervention,
        })
    }

    /// Builds one distribution per distinct year of `rows`, each covering
    /// `[year, year + 0.999999)`. Every row of a year must use the same count form.
    ///
    /// # Errors
    /// See [`TargetedDistribution::new`], [`TargetedDistribution::with_disease_state`]
    /// and [`TargetedDistribution::with_property_restrictions`]; also fails if rows of
    /// one year mix total and per-sex counts.
    pub fn from_table(
        rows: &[NChooserRow],
        disease_state: &[Vec<DiseaseStateAtom>],
        has_intervention_name: Option<&str>,
        property_restrictions: &PropertyRestrictions,
        intervention: Intervention,
    ) -> Result<Self, AuthoringError> {
        let mut by_year: BTreeMap<i32, Vec<&NChooserRow>> = BTreeMap::new();
        for row in rows {
            by_year.entry(row.year).or_default().push(row);
        }

        let mut distributions = Vec::with_capacity(by_year.len());
        for (year, rows) in by_year {
            let mins: Vec<f64> = rows.iter().map(|r| r.age_min).collect();
            let maxs: Vec<f64> = rows.iter().map(|r| r.age_max).collect();
            let counts = if rows.iter().all(|r| matches!(r.count, RowCount::Total(_))) {
                TargetCounts::Total(
                    rows.iter()
                        .filter_map(|r| match r.count {
                            RowCount::Total(n) => Some(n),
                            RowCount::BySex { .. } => None,
                        })
                        .collect(),
                )
            } else if rows.iter().all(|r| matches!(r.count, RowCount::BySex { .. })) {
                let (males, females) = rows
                    .iter()
                    .filter_map(|r| match r.count {
                        RowCount::BySex { male, female } => Some((male, female)),
                        RowCount::Total(_) => None,
                    })
                    .unzip();
                TargetCounts::BySex { males, females }
            } else {
                return Err(AuthoringError::configuration(format!(
                    "Rows for year {year} mix total and per-sex counts."
                )));
            };
            let start_year = f64::from(year);
            let distribution =
                TargetedDistribution::new(start_year, start_year + WINDOW_LENGTH_YEARS, &mins, &maxs, counts)?
                    .with_disease_state(disease_state.to_vec(), has_intervention_name)?
                    .with_property_restrictions(property_restrictions.clone())?;
            distributions.push(distribution);
        }
        log::debug!(
            "built {} N-Chooser distribution(s) from {} table row(s)",
            distributions.len(),
            rows.len()
        );
        Self::new(distributions, intervention)
    }

    /// A by-year campaign event starting at the earliest window.
    #[must_use]
    pub fn campaign_event(self) -> CampaignEvent {
        let start = self
            .distributions
            .iter()
            .map(|d| d.start_year)
            .fold(f64::INFINITY, f64::min);
        CampaignEvent::new(Start::Year(start), self)
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "class": "NChooserEventCoordinatorHIV",
            "Distributions": self.distributions.iter().map(TargetedDistribution::to_json).collect::<Vec<_>>(),
            "Intervention_Config": self.intervention.to_json(),
        })
    }
}
