use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::common::{RelationshipType, Risk, Sex, Sigmoid, ValueMap};
use crate::error::{check_non_negative, check_probability, check_range, AuthoringError};

/// Risk-by-risk mixing weights, rows and columns ordered LOW, MEDIUM, HIGH.
pub type AssortivityMatrix = [[f64; 3]; 3];

/// Checks the shape and entries of a user-supplied assortivity matrix.
///
/// # Errors
/// If the matrix is not 3×3 or an entry is negative.
pub fn assortivity_matrix(rows: &[Vec<f64>]) -> Result<AssortivityMatrix, AuthoringError> {
    if rows.len() != 3 || rows.iter().any(|row| row.len() != 3) {
        return Err(AuthoringError::configuration(format!(
            "the assortivity matrix must be 3x3, got {} row(s) of length(s) {:?}",
            rows.len(),
            rows.iter().map(Vec::len).collect::<Vec<_>>()
        )));
    }
    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in rows.iter().enumerate() {
        for (j, &weight) in row.iter().enumerate() {
            matrix[i][j] = check_non_negative("Assortivity", weight)?;
        }
    }
    Ok(matrix)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormationRate {
    Constant(f64),
    TimeVarying(ValueMap),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairFormationParameters {
    pub formation_rate: FormationRate,
    pub assortivity: AssortivityMatrix,
}

impl PairFormationParameters {
    /// # Errors
    /// - If the rate is negative
    /// - If the matrix is not 3×3, see [`assortivity_matrix`]
    pub fn new(formation_rate: f64, assortivity: &[Vec<f64>]) -> Result<Self, AuthoringError> {
        Ok(PairFormationParameters {
            formation_rate: FormationRate::Constant(check_non_negative(
                "Formation_Rate_Constant",
                formation_rate,
            )?),
            assortivity: assortivity_matrix(assortivity)?,
        })
    }

    /// # Errors
    /// If any rate in `rates` is negative.
    pub fn time_varying(rates: ValueMap, assortivity: AssortivityMatrix) -> Result<Self, AuthoringError> {
        rates.check_values("Formation_Rate_Interpolated_Values", 0.0, f64::MAX)?;
        Ok(PairFormationParameters {
            formation_rate: FormationRate::TimeVarying(rates),
            assortivity,
        })
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        match &self.formation_rate {
            FormationRate::Constant(rate) => {
                object.insert("Formation_Rate_Type".into(), json!("CONSTANT"));
                object.insert("Formation_Rate_Constant".into(), json!(rate));
            }
            FormationRate::TimeVarying(rates) => {
                object.insert("Formation_Rate_Type".into(), json!("INTERPOLATED_VALUES"));
                object.insert("Formation_Rate_Interpolated_Values".into(), rates.to_json());
            }
        }
        object.insert(
            "Assortivity".into(),
            json!({
                "Group": "STI_INSERT",
                "Axes": Risk::ALL.map(Risk::as_str),
                "Matrix": self.assortivity,
            }),
        );
        Value::Object(object)
    }
}

/// Coital act rate, condom usage over time and a Weibull relationship duration.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipParameters {
    pub coital_act_rate: f64,
    pub condom_usage: Sigmoid,
    /// Years.
    pub duration_weibull_scale: f64,
    duration_weibull_shape: f64,
}

impl RelationshipParameters {
    /// `duration_heterogeneity` is the inverse of the Weibull shape.
    ///
    /// # Errors
    /// - If the coital act rate or the Weibull scale is not positive
    /// - If the heterogeneity is not in (0, 100]
    /// - If the condom usage bounds are not probabilities
    pub fn new(
        coital_act_rate: f64,
        condom_usage: Sigmoid,
        duration_weibull_scale: f64,
        duration_heterogeneity: f64,
    ) -> Result<Self, AuthoringError> {
        check_range("Coital_Act_Rate", coital_act_rate, f64::MIN_POSITIVE, 20.0)?;
        check_range(
            "Duration_Weibull_Scale",
            duration_weibull_scale,
            f64::MIN_POSITIVE,
            f64::MAX,
        )?;
        check_range(
            "Duration_Weibull_Heterogeneity",
            duration_heterogeneity,
            f64::MIN_POSITIVE,
            100.0,
        )?;
        check_probability("Condom_Usage_Probability Min", condom_usage.min)?;
        check_probability("Condom_Usage_Probability Max", condom_usage.max)?;
        Ok(RelationshipParameters {
            coital_act_rate,
            condom_usage,
            duration_weibull_scale,
            duration_weibull_shape: 1.0 / duration_heterogeneity,
        })
    }

    #[must_use]
    pub fn duration_weibull_shape(&self) -> f64 {
        self.duration_weibull_shape
    }

    #[must_use]
    pub fn duration_heterogeneity(&self) -> f64 {
        1.0 / self.duration_weibull_shape
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "Coital_Act_Rate": self.coital_act_rate,
            "Condom_Usage_Probability": self.condom_usage.to_json(),
            "Duration_Weibull_Heterogeneity": self.duration_heterogeneity(),
            "Duration_Weibull_Scale": self.duration_weibull_scale,
        })
    }
}

/// Concurrency limits for one sex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SexConcurrency {
    pub probability_extra_relationship: f64,
    pub max_simultaneous_relationships: u32,
}

impl SexConcurrency {
    /// # Errors
    /// If the probability is outside [0, 1] or the cap is above 63.
    pub fn new(
        probability_extra_relationship: f64,
        max_simultaneous_relationships: u32,
    ) -> Result<Self, AuthoringError> {
        check_probability("Prob_Extra_Relationship", probability_extra_relationship)?;
        check_range(
            "Max_Simultaneous_Relationships",
            f64::from(max_simultaneous_relationships),
            0.0,
            63.0,
        )?;
        Ok(SexConcurrency {
            probability_extra_relationship,
            max_simultaneous_relationships,
        })
    }
}

/// Per-sex concurrency for one relationship type and risk group. A sex that was
/// never set inherits from the default node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConcurrencyParameters {
    pub male: Option<SexConcurrency>,
    pub female: Option<SexConcurrency>,
}

impl ConcurrencyParameters {
    #[must_use]
    pub fn get(&self, sex: Sex) -> Option<SexConcurrency> {
        match sex {
            Sex::Male => self.male,
            Sex::Female => self.female,
        }
    }

    pub fn set(&mut self, sex: Sex, concurrency: SexConcurrency) {
        match sex {
            Sex::Male => self.male = Some(concurrency),
            Sex::Female => self.female = Some(concurrency),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for sex in Sex::ALL {
            if let Some(concurrency) = self.get(sex) {
                object.insert(
                    format!("Max_Simultaneous_Relationships_{}", sex.as_str()),
                    json!(concurrency.max_simultaneous_relationships),
                );
                object.insert(
                    format!("Prob_Extra_Relationship_{}", sex.as_str()),
                    json!(concurrency.probability_extra_relationship),
                );
            }
        }
        Value::Object(object)
    }
}

/// How an agent's extra relationships are allowed across relationship types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraRelationalFlag {
    Independent,
    /// Extra relationships are allowed in types later in this order only when the
    /// agent is already in the earlier ones.
    Correlated(Vec<RelationshipType>),
}

impl ExtraRelationalFlag {
    /// # Errors
    /// If `order` is not a permutation of the four relationship types.
    pub fn correlated(order: &[RelationshipType]) -> Result<Self, AuthoringError> {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != RelationshipType::ALL.len() || order.len() != sorted.len() {
            return Err(AuthoringError::configuration(format!(
                "the correlated relationship type order must list every relationship type once, got {order:?}"
            )));
        }
        Ok(ExtraRelationalFlag::Correlated(order.to_vec()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyConfiguration {
    pub probability_person_is_behavioral_super_spreader: f64,
    pub flags: IndexMap<Risk, ExtraRelationalFlag>,
}

impl ConcurrencyConfiguration {
    /// # Errors
    /// If the super-spreader probability is outside [0, 1].
    pub fn new(
        probability_person_is_behavioral_super_spreader: f64,
        flags: &[(Risk, ExtraRelationalFlag)],
    ) -> Result<Self, AuthoringError> {
        check_probability(
            "Probability_Person_Is_Behavioral_Super_Spreader",
            probability_person_is_behavioral_super_spreader,
        )?;
        Ok(ConcurrencyConfiguration {
            probability_person_is_behavioral_super_spreader,
            flags: flags.iter().cloned().collect(),
        })
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            "Probability_Person_Is_Behavioral_Super_Spreader".into(),
            json!(self.probability_person_is_behavioral_super_spreader),
        );
        object.insert("Individual_Property_Name".into(), json!("Risk"));
        for (risk, flag) in &self.flags {
            let entry = match flag {
                ExtraRelationalFlag::Independent => json!({
                    "Extra_Relational_Flag_Type": "Independent",
                }),
                ExtraRelationalFlag::Correlated(order) => json!({
                    "Extra_Relational_Flag_Type": "Correlated",
                    "Correlated_Relationship_Type_Order":
                        order.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                }),
            };
            object.insert(risk.as_str().into(), entry);
        }
        Value::Object(object)
    }
}

/// The society block of one relationship type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationshipSociety {
    pub pair_formation: Option<PairFormationParameters>,
    pub relationship: Option<RelationshipParameters>,
    pub concurrency: IndexMap<Risk, ConcurrencyParameters>,
}

impl RelationshipSociety {
    fn is_empty(&self) -> bool {
        self.pair_formation.is_none() && self.relationship.is_none() && self.concurrency.is_empty()
    }

    fn to_json(&self) -> Value {
        let mut object = Map::new();
        if let Some(relationship) = &self.relationship {
            object.insert("Relationship_Parameters".into(), relationship.to_json());
        }
        if let Some(pair_formation) = &self.pair_formation {
            object.insert("Pair_Formation_Parameters".into(), pair_formation.to_json());
        }
        if !self.concurrency.is_empty() {
            let concurrency: Map<String, Value> = self
                .concurrency
                .iter()
                .map(|(risk, c)| (risk.as_str().to_string(), c.to_json()))
                .collect();
            object.insert("Concurrency_Parameters".into(), Value::Object(concurrency));
        }
        Value::Object(object)
    }
}

/// Sexual-network parameters of a node. Only what was explicitly set is held;
/// everything else is inherited from the default node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Society {
    pub relationships: IndexMap<RelationshipType, RelationshipSociety>,
    pub concurrency_configuration: Option<ConcurrencyConfiguration>,
}

impl Society {
    pub fn relationship_mut(&mut self, relationship_type: RelationshipType) -> &mut RelationshipSociety {
        self.relationships.entry(relationship_type).or_default()
    }

    #[must_use]
    pub fn relationship(&self, relationship_type: RelationshipType) -> Option<&RelationshipSociety> {
        self.relationships.get(&relationship_type)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concurrency_configuration.is_none()
            && self.relationships.values().all(RelationshipSociety::is_empty)
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for relationship_type in RelationshipType::ALL {
            if let Some(society) = self
                .relationships
                .get(&relationship_type)
                .filter(|s| !s.is_empty())
            {
                object.insert(relationship_type.as_str().into(), society.to_json());
            }
        }
        if let Some(configuration) = &self.concurrency_configuration {
            object.insert("Concurrency_Configuration".into(), configuration.to_json());
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use statrs::assert_almost_eq;

    use super::{
        assortivity_matrix, ConcurrencyConfiguration, ExtraRelationalFlag, PairFormationParameters,
        RelationshipParameters, SexConcurrency, Society,
    };
    use crate::common::{RelationshipType, Risk, Sex, Sigmoid};
    use crate::error::AuthoringError;

    #[test]
    fn test_assortivity_shape() {
        assert!(assortivity_matrix(&[vec![1.0; 3], vec![1.0; 3], vec![1.0; 3]]).is_ok());
        assert!(matches!(
            assortivity_matrix(&[vec![1.0; 3], vec![1.0; 3]]),
            Err(AuthoringError::Configuration(_))
        ));
        assert!(assortivity_matrix(&[vec![1.0; 3], vec![1.0; 2], vec![1.0; 3]]).is_err());
        assert!(assortivity_matrix(&[vec![1.0; 3], vec![-1.0; 3], vec![1.0; 3]]).is_err());
    }

    #[test]
    fn test_weibull_heterogeneity_round_trip() {
        let condom = Sigmoid::probability(0.1, 0.6, 2000.0, 1.5).unwrap();
        for h in [0.25, 0.833, 1.0, 3.0] {
            let parameters = RelationshipParameters::new(0.33, condom, 0.956, h).unwrap();
            assert_almost_eq!(parameters.duration_weibull_shape(), 1.0 / h, 1e-12);
            assert_almost_eq!(parameters.duration_heterogeneity(), h, 1e-12);
            assert_almost_eq!(
                parameters.to_json()["Duration_Weibull_Heterogeneity"]
                    .as_f64()
                    .unwrap(),
                h,
                1e-12
            );
        }
        assert!(RelationshipParameters::new(0.33, condom, 0.956, 0.0).is_err());
        assert!(RelationshipParameters::new(
            0.33,
            Sigmoid::new(0.0, 2.0, 2000.0, 1.0).unwrap(),
            0.956,
            1.0
        )
        .is_err());
    }

    #[test]
    fn test_correlated_order() {
        assert!(ExtraRelationalFlag::correlated(&RelationshipType::ALL).is_ok());
        assert!(ExtraRelationalFlag::correlated(&[
            RelationshipType::Marital,
            RelationshipType::Marital,
            RelationshipType::Informal,
            RelationshipType::Transitory,
        ])
        .is_err());
    }

    #[test]
    fn test_society_json() {
        let mut society = Society::default();
        assert!(society.is_empty());
        let transitory = society.relationship_mut(RelationshipType::Transitory);
        transitory.pair_formation = Some(
            PairFormationParameters::new(
                0.0006,
                &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
            )
            .unwrap(),
        );
        transitory
            .concurrency
            .entry(Risk::High)
            .or_default()
            .set(Sex::Female, SexConcurrency::new(0.2, 3).unwrap());
        society.concurrency_configuration = Some(
            ConcurrencyConfiguration::new(0.0, &[(Risk::Low, ExtraRelationalFlag::Independent)])
                .unwrap(),
        );
        assert_eq!(
            society.to_json(),
            json!({
                "TRANSITORY": {
                    "Pair_Formation_Parameters": {
                        "Formation_Rate_Type": "CONSTANT",
                        "Formation_Rate_Constant": 0.0006,
                        "Assortivity": {
                            "Group": "STI_INSERT",
                            "Axes": ["LOW", "MEDIUM", "HIGH"],
                            "Matrix": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
                        }
                    },
                    "Concurrency_Parameters": {
                        "HIGH": {
                            "Max_Simultaneous_Relationships_Female": 3,
                            "Prob_Extra_Relationship_Female": 0.2
                        }
                    }
                },
                "Concurrency_Configuration": {
                    "Probability_Person_Is_Behavioral_Super_Spreader": 0.0,
                    "Individual_Property_Name": "Risk",
                    "LOW": {"Extra_Relational_Flag_Type": "Independent"}
                }
            })
        );
    }
}
