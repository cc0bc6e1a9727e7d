use serde_json::{json, Map, Value};

use super::properties::IndividualProperty;
use super::society::Society;
use super::vital_rates::AgeYearTable;
use crate::error::{check_non_negative, check_probability, check_range, AuthoringError};
use crate::evaluation::DAYS_PER_YEAR;

/// Initial age (days) or prevalence draw, written as a numbered flag and two
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimpleDistribution {
    Constant(f64),
    Uniform { min: f64, max: f64 },
    Gaussian { mean: f64, std_dev: f64 },
    Exponential { rate: f64 },
}

impl SimpleDistribution {
    fn flag(self) -> u8 {
        match self {
            SimpleDistribution::Constant(_) => 0,
            SimpleDistribution::Uniform { .. } => 1,
            SimpleDistribution::Gaussian { .. } => 2,
            SimpleDistribution::Exponential { .. } => 3,
        }
    }

    fn parameters(self) -> (f64, f64) {
        match self {
            SimpleDistribution::Constant(value) => (value, 0.0),
            SimpleDistribution::Uniform { min, max } => (min, max),
            SimpleDistribution::Gaussian { mean, std_dev } => (mean, std_dev),
            SimpleDistribution::Exponential { rate } => (rate, 0.0),
        }
    }

    /// Checks that every value the distribution can produce lies in `[min, max]`
    /// where that can be told from the parameters.
    fn check(self, name: &str, min: f64, max: f64) -> Result<Self, AuthoringError> {
        match self {
            SimpleDistribution::Constant(value) => {
                check_range(name, value, min, max)?;
            }
            SimpleDistribution::Uniform { min: low, max: high } => {
                check_range(name, low, min, max)?;
                check_range(name, high, low, max)?;
            }
            SimpleDistribution::Gaussian { mean, std_dev } => {
                check_range(name, mean, min, max)?;
                check_non_negative(name, std_dev)?;
            }
            SimpleDistribution::Exponential { rate } => {
                check_range(name, rate, f64::MIN_POSITIVE, f64::MAX)?;
            }
        }
        Ok(self)
    }

    fn write_fields(self, prefix: &str, object: &mut Map<String, Value>) {
        let (first, second) = self.parameters();
        object.insert(format!("{prefix}Flag"), json!(self.flag()));
        object.insert(format!("{prefix}1"), json!(first));
        object.insert(format!("{prefix}2"), json!(second));
    }

    pub(crate) fn age(self) -> Result<Self, AuthoringError> {
        self.check("AgeDistribution", 0.0, f64::MAX)
    }

    pub(crate) fn prevalence(self) -> Result<Self, AuthoringError> {
        if let SimpleDistribution::Uniform { min, max } = self {
            check_probability("PrevalenceDistribution1", min)?;
            check_probability("PrevalenceDistribution2", max)?;
        }
        self.check("PrevalenceDistribution", 0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndividualAttributes {
    pub age_distribution: Option<SimpleDistribution>,
    pub prevalence_distribution: Option<SimpleDistribution>,
    pub fertility: Option<AgeYearTable>,
    pub mortality_male: Option<AgeYearTable>,
    pub mortality_female: Option<AgeYearTable>,
}

impl IndividualAttributes {
    fn to_json(&self) -> Map<String, Value> {
        let mut object = Map::new();
        if let Some(age) = self.age_distribution {
            age.write_fields("AgeDistribution", &mut object);
        }
        if let Some(prevalence) = self.prevalence_distribution {
            prevalence.write_fields("PrevalenceDistribution", &mut object);
        }
        if let Some(fertility) = &self.fertility {
            object.insert("FertilityDistribution".into(), fertility.to_json());
        }
        if let Some(male) = &self.mortality_male {
            object.insert("MortalityDistributionMale".into(), male.to_json());
        }
        if let Some(female) = &self.mortality_female {
            object.insert("MortalityDistributionFemale".into(), female.to_json());
        }
        object
    }
}

/// A location of the demographics document. Every value is optional: what a
/// regular node leaves unset is taken from the default node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    id: u32,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub initial_population: Option<u32>,
    /// Births per person per year.
    pub birth_rate: Option<f64>,
    pub individual_attributes: IndividualAttributes,
    pub individual_properties: Vec<IndividualProperty>,
    pub society: Society,
}

impl Node {
    /// A regular node.
    ///
    /// # Errors
    /// If `id` is 0, which is reserved for the default node.
    pub fn new(id: u32, name: &str, population: u32) -> Result<Self, AuthoringError> {
        if id == 0 {
            return Err(AuthoringError::configuration(format!(
                "node id 0 is reserved for the default node, cannot add '{name}' with it"
            )));
        }
        Ok(Node {
            id,
            name: Some(name.to_string()),
            initial_population: Some(population),
            ..Node::default()
        })
    }

    /// # Errors
    /// If the coordinates are not a valid latitude and longitude.
    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Result<Self, AuthoringError> {
        self.latitude = Some(check_range("Latitude", latitude, -90.0, 90.0)?);
        self.longitude = Some(check_range("Longitude", longitude, -180.0, 180.0)?);
        Ok(self)
    }

    /// The default node with the stock initial conditions: Risk split 0.667 /
    /// 0.333 / 0, ages uniform over 0 to 50 years, no initial prevalence and a
    /// 3.567% annual growth in births.
    pub(crate) fn default_node() -> Result<Self, AuthoringError> {
        Ok(Node {
            birth_rate: Some(1.03567_f64.ln()),
            individual_attributes: IndividualAttributes {
                age_distribution: Some(SimpleDistribution::Uniform {
                    min: 0.0,
                    max: 18250.0,
                }),
                prevalence_distribution: Some(SimpleDistribution::Uniform { min: 0.0, max: 0.0 }),
                ..IndividualAttributes::default()
            },
            individual_properties: vec![IndividualProperty::risk(0.667, 0.333, 0.0)?],
            ..Node::default()
        })
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.id == 0
    }

    #[must_use]
    pub fn has_mortality(&self) -> bool {
        self.individual_attributes.mortality_male.is_some()
            || self.individual_attributes.mortality_female.is_some()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut attributes = Map::new();
        if let Some(name) = &self.name {
            attributes.insert("FacilityName".into(), json!(name));
        }
        if let Some(latitude) = self.latitude {
            attributes.insert("Latitude".into(), json!(latitude));
        }
        if let Some(longitude) = self.longitude {
            attributes.insert("Longitude".into(), json!(longitude));
        }
        if let Some(population) = self.initial_population {
            attributes.insert("InitialPopulation".into(), json!(population));
        }
        // The simulator reads a daily rate.
        if let Some(birth_rate) = self.birth_rate {
            attributes.insert("BirthRate".into(), json!(birth_rate / DAYS_PER_YEAR));
        }

        let mut object = Map::new();
        if !self.is_default() {
            object.insert("NodeID".into(), json!(self.id));
        }
        if !attributes.is_empty() {
            object.insert("NodeAttributes".into(), Value::Object(attributes));
        }
        let individual_attributes = self.individual_attributes.to_json();
        if !individual_attributes.is_empty() {
            object.insert("IndividualAttributes".into(), Value::Object(individual_attributes));
        }
        if !self.individual_properties.is_empty() {
            object.insert(
                "IndividualProperties".into(),
                self.individual_properties
                    .iter()
                    .map(IndividualProperty::to_json)
                    .collect(),
            );
        }
        if !self.society.is_empty() {
            object.insert("Society".into(), self.society.to_json());
        }
        Value::Object(object)
    }
}
