//! The demographics document: a default node whose values every regular node
//! inherits unless it overrides them, plus the sexual-network society and the
//! initial individual properties of each node.
//!
//! Every setter takes `node_ids`. `None` or `Some(&[0])` update the default node
//! only; an explicit list updates exactly the listed nodes.

mod input;
mod node;
mod properties;
mod society;
mod vital_rates;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use indexmap::IndexSet;
use serde_json::{json, Value};

pub use input::{FertilityRecord, MortalityRecord, PopulationRecord};
pub use node::{IndividualAttributes, Node, SimpleDistribution};
pub use properties::{IndividualProperty, CASCADE_STATES};
pub use society::{
    assortivity_matrix, AssortivityMatrix, ConcurrencyConfiguration, ConcurrencyParameters,
    ExtraRelationalFlag, FormationRate, PairFormationParameters, RelationshipParameters,
    RelationshipSociety, SexConcurrency, Society,
};
pub use vital_rates::{AgeReference, AgeYearTable, LeeCarter, MortalityOptions};

use crate::common::{RelationshipType, Risk, Sex, ValueMap};
use crate::error::{AuthoringError, Warning};

/// Which node a setter writes to: the default node or an index into the regular nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Default,
    Regular(usize),
}

#[derive(Debug, Clone)]
pub struct Demographics {
    default_node: Node,
    nodes: Vec<Node>,
    id_reference: String,
    warnings: Vec<Warning>,
}

impl Demographics {
    /// A document with only the default node.
    ///
    /// # Errors
    /// If the stock defaults fail validation.
    pub fn new() -> Result<Self, AuthoringError> {
        Ok(Demographics {
            default_node: Node::default_node()?,
            nodes: Vec::new(),
            id_reference: "Custom".to_string(),
            warnings: Vec::new(),
        })
    }

    /// A single node at the given coordinates.
    ///
    /// # Errors
    /// If the node id is 0 or the coordinates are invalid.
    pub fn from_template(
        node_id: u32,
        name: &str,
        latitude: f64,
        longitude: f64,
        population: u32,
    ) -> Result<Self, AuthoringError> {
        let mut demographics = Self::new()?;
        demographics.add_node(Node::new(node_id, name, population)?.with_location(latitude, longitude)?)?;
        Ok(demographics)
    }

    /// One node per record, in record order.
    ///
    /// # Errors
    /// - If a node id is 0 or repeated
    /// - If a record has only one of latitude and longitude, or invalid coordinates
    pub fn from_population_records(records: &[PopulationRecord]) -> Result<Self, AuthoringError> {
        let mut demographics = Self::new()?;
        for record in records {
            let node = Node::new(record.node_id, &record.name, record.population)?;
            let node = match (record.latitude, record.longitude) {
                (Some(latitude), Some(longitude)) => node.with_location(latitude, longitude)?,
                (None, None) => node,
                _ => {
                    return Err(AuthoringError::configuration(format!(
                        "node {} has only one of latitude and longitude",
                        record.node_id
                    )))
                }
            };
            demographics.add_node(node)?;
        }
        log::debug!("built demographics with {} node(s)", demographics.nodes.len());
        Ok(demographics)
    }

    /// Reads a population file with columns `node_id,name,population` and
    /// optionally `latitude,longitude`.
    ///
    /// # Errors
    /// If the file cannot be read, otherwise see [`Demographics::from_population_records`].
    pub fn from_population_csv(path: &Path) -> Result<Self, AuthoringError> {
        let records: Vec<PopulationRecord> = input::read_records(path)?;
        Self::from_population_records(&records)
    }

    #[must_use]
    pub fn with_id_reference(mut self, id_reference: &str) -> Self {
        self.id_reference = id_reference.to_string();
        self
    }

    /// # Errors
    /// If a node with the same id already exists.
    pub fn add_node(&mut self, node: Node) -> Result<&mut Self, AuthoringError> {
        if node.is_default() || self.nodes.iter().any(|n| n.id() == node.id()) {
            return Err(AuthoringError::configuration(format!(
                "node id {} is already in use",
                node.id()
            )));
        }
        self.nodes.push(node);
        Ok(self)
    }

    #[must_use]
    pub fn default_node(&self) -> &Node {
        &self.default_node
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] if there is no node with `node_id`.
    pub fn node(&self, node_id: u32) -> Result<&Node, AuthoringError> {
        if node_id == 0 {
            return Ok(&self.default_node);
        }
        self.nodes
            .iter()
            .find(|n| n.id() == node_id)
            .ok_or(AuthoringError::UnknownNode(node_id))
    }

    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    fn slots(&self, node_ids: Option<&[u32]>) -> Result<Vec<Slot>, AuthoringError> {
        let Some(node_ids) = node_ids else {
            return Ok(vec![Slot::Default]);
        };
        if node_ids.is_empty() {
            return Err(AuthoringError::configuration(
                "node_ids must name at least one node, pass None for the default node",
            ));
        }
        let mut slots = IndexSet::new();
        for &node_id in node_ids {
            let slot = if node_id == 0 {
                Slot::Default
            } else {
                self.nodes
                    .iter()
                    .position(|n| n.id() == node_id)
                    .map(Slot::Regular)
                    .ok_or(AuthoringError::UnknownNode(node_id))?
            };
            slots.insert(slot);
        }
        Ok(slots.into_iter().collect())
    }

    fn slot(&self, slot: Slot) -> &Node {
        match slot {
            Slot::Default => &self.default_node,
            Slot::Regular(i) => &self.nodes[i],
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Node {
        match slot {
            Slot::Default => &mut self.default_node,
            Slot::Regular(i) => &mut self.nodes[i],
        }
    }

    /// Applies `apply` to every node named by `node_ids`. Unknown ids are
    /// reported before any node changes.
    fn update<F>(&mut self, node_ids: Option<&[u32]>, mut apply: F) -> Result<&mut Self, AuthoringError>
    where
        F: FnMut(&mut Node),
    {
        for slot in self.slots(node_ids)? {
            apply(self.slot_mut(slot));
        }
        Ok(self)
    }

    /// The value `get` finds on `node_id`, or on the default node when the node
    /// does not set it.
    fn inherited<'a, T, F>(&'a self, node_id: u32, get: F) -> Result<Option<T>, AuthoringError>
    where
        F: Fn(&'a Node) -> Option<T>,
    {
        Ok(get(self.node(node_id)?).or_else(|| get(&self.default_node)))
    }

    /// # Errors
    /// - If the rate is negative or the matrix is not 3×3
    /// - [`AuthoringError::UnknownNode`] for an unknown id
    pub fn set_pair_formation_parameters(
        &mut self,
        relationship_type: RelationshipType,
        formation_rate: f64,
        assortivity: &[Vec<f64>],
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        let parameters = PairFormationParameters::new(formation_rate, assortivity)?;
        self.update(node_ids, |node| {
            node.society.relationship_mut(relationship_type).pair_formation = Some(parameters.clone());
        })
    }

    /// Replaces the formation rate with a time-varying one, keeping each node's
    /// assortivity.
    ///
    /// # Errors
    /// - If a rate is negative
    /// - If a named node has no pair formation parameters for the type, set or inherited
    /// - [`AuthoringError::UnknownNode`] for an unknown id
    pub fn set_formation_rate_time_varying(
        &mut self,
        relationship_type: RelationshipType,
        rates: &ValueMap,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        let mut planned = Vec::new();
        for slot in self.slots(node_ids)? {
            let node = self.slot(slot);
            let assortivity = self
                .inherited(node.id(), |n| {
                    n.society
                        .relationship(relationship_type)
                        .and_then(|s| s.pair_formation.as_ref())
                        .map(|p| p.assortivity)
                })?
                .ok_or_else(|| {
                    AuthoringError::configuration(format!(
                        "node {} has no {} pair formation parameters to give a time-varying rate",
                        node.id(),
                        relationship_type.as_str()
                    ))
                })?;
            planned.push((slot, PairFormationParameters::time_varying(rates.clone(), assortivity)?));
        }
        for (slot, parameters) in planned {
            self.slot_mut(slot)
                .society
                .relationship_mut(relationship_type)
                .pair_formation = Some(parameters);
        }
        Ok(self)
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn set_relationship_parameters(
        &mut self,
        relationship_type: RelationshipType,
        parameters: &RelationshipParameters,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        self.update(node_ids, |node| {
            node.society.relationship_mut(relationship_type).relationship = Some(parameters.clone());
        })
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn set_concurrency_parameters(
        &mut self,
        relationship_type: RelationshipType,
        risk: Risk,
        sex: Sex,
        concurrency: SexConcurrency,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        self.update(node_ids, |node| {
            node.society
                .relationship_mut(relationship_type)
                .concurrency
                .entry(risk)
                .or_default()
                .set(sex, concurrency);
        })
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn set_concurrency_configuration(
        &mut self,
        configuration: &ConcurrencyConfiguration,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        self.update(node_ids, |node| {
            node.society.concurrency_configuration = Some(configuration.clone());
        })
    }

    /// Adds `property`, or replaces the property of the same name.
    ///
    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn add_or_update_individual_property(
        &mut self,
        property: &IndividualProperty,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        self.update(node_ids, |node| {
            properties::upsert(&mut node.individual_properties, property.clone());
        })
    }

    /// Initial ages in days.
    ///
    /// # Errors
    /// - If the distribution can produce negative ages
    /// - [`AuthoringError::UnknownNode`] for an unknown id
    pub fn set_age_distribution(
        &mut self,
        distribution: SimpleDistribution,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        let distribution = distribution.age()?;
        self.update(node_ids, |node| {
            node.individual_attributes.age_distribution = Some(distribution);
        })
    }

    /// Initial HIV prevalence.
    ///
    /// # Errors
    /// - If the distribution is not over probabilities
    /// - [`AuthoringError::UnknownNode`] for an unknown id
    pub fn set_initial_prevalence(
        &mut self,
        distribution: SimpleDistribution,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        let distribution = distribution.prevalence()?;
        self.update(node_ids, |node| {
            node.individual_attributes.prevalence_distribution = Some(distribution);
        })
    }

    /// Births per person per year.
    ///
    /// # Errors
    /// - If the rate is negative
    /// - [`AuthoringError::UnknownNode`] for an unknown id
    pub fn set_birth_rate(&mut self, rate: f64, node_ids: Option<&[u32]>) -> Result<&mut Self, AuthoringError> {
        let rate = crate::error::check_non_negative("BirthRate", rate)?;
        self.update(node_ids, |node| node.birth_rate = Some(rate))
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn set_fertility_table(
        &mut self,
        table: &AgeYearTable,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        self.update(node_ids, |node| {
            node.individual_attributes.fertility = Some(table.clone());
        })
    }

    /// # Errors
    /// See [`AgeYearTable::fertility_from_csv`]; [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn set_fertility(&mut self, path: &Path, node_ids: Option<&[u32]>) -> Result<&mut Self, AuthoringError> {
        let table = AgeYearTable::fertility_from_csv(path)?;
        self.set_fertility_table(&table, node_ids)
    }

    /// Sets both mortality tables, which turns natural mortality on.
    ///
    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn set_mortality_tables(
        &mut self,
        male: &AgeYearTable,
        female: &AgeYearTable,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        self.update(node_ids, |node| {
            node.individual_attributes.mortality_male = Some(male.clone());
            node.individual_attributes.mortality_female = Some(female.clone());
        })
    }

    /// Reads and, if asked to, projects male and female mortality. Capped
    /// projections are kept as warnings.
    ///
    /// # Errors
    /// See [`AgeYearTable::mortality_from_csv`]; [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn set_mortality(
        &mut self,
        male_path: &Path,
        female_path: &Path,
        options: &MortalityOptions,
        node_ids: Option<&[u32]>,
    ) -> Result<&mut Self, AuthoringError> {
        self.slots(node_ids)?;
        let (male, male_warnings) = AgeYearTable::mortality_from_csv(male_path, options)?;
        let (female, female_warnings) = AgeYearTable::mortality_from_csv(female_path, options)?;
        self.warnings.extend(male_warnings);
        self.warnings.extend(female_warnings);
        self.set_mortality_tables(&male, &female, node_ids)
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn pair_formation_parameters(
        &self,
        node_id: u32,
        relationship_type: RelationshipType,
    ) -> Result<Option<&PairFormationParameters>, AuthoringError> {
        self.inherited(node_id, |n| {
            n.society
                .relationship(relationship_type)
                .and_then(|s| s.pair_formation.as_ref())
        })
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn relationship_parameters(
        &self,
        node_id: u32,
        relationship_type: RelationshipType,
    ) -> Result<Option<&RelationshipParameters>, AuthoringError> {
        self.inherited(node_id, |n| {
            n.society
                .relationship(relationship_type)
                .and_then(|s| s.relationship.as_ref())
        })
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn concurrency_parameters(
        &self,
        node_id: u32,
        relationship_type: RelationshipType,
        risk: Risk,
        sex: Sex,
    ) -> Result<Option<SexConcurrency>, AuthoringError> {
        self.inherited(node_id, |n| {
            n.society
                .relationship(relationship_type)
                .and_then(|s| s.concurrency.get(&risk))
                .and_then(|c| c.get(sex))
        })
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn concurrency_configuration(
        &self,
        node_id: u32,
    ) -> Result<Option<&ConcurrencyConfiguration>, AuthoringError> {
        self.inherited(node_id, |n| n.society.concurrency_configuration.as_ref())
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn age_distribution(&self, node_id: u32) -> Result<Option<SimpleDistribution>, AuthoringError> {
        self.inherited(node_id, |n| n.individual_attributes.age_distribution)
    }

    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn birth_rate(&self, node_id: u32) -> Result<Option<f64>, AuthoringError> {
        self.inherited(node_id, |n| n.birth_rate)
    }

    /// The node's properties: the default node's, with the node's own replacing
    /// those of the same name, followed by the node's own new ones.
    ///
    /// # Errors
    /// [`AuthoringError::UnknownNode`] for an unknown id.
    pub fn individual_properties(&self, node_id: u32) -> Result<Vec<IndividualProperty>, AuthoringError> {
        let node = self.node(node_id)?;
        let mut merged = self.default_node.individual_properties.clone();
        if !node.is_default() {
            for property in &node.individual_properties {
                properties::upsert(&mut merged, property.clone());
            }
        }
        Ok(merged)
    }

    fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::once(&self.default_node).chain(&self.nodes)
    }

    #[must_use]
    pub fn natural_mortality(&self) -> bool {
        self.all_nodes().any(Node::has_mortality)
    }

    /// Simulator configuration implied by the document.
    #[must_use]
    pub fn implicit_config(&self) -> Value {
        let fertility = self
            .all_nodes()
            .any(|n| n.individual_attributes.fertility.is_some());
        let natural_mortality = self.natural_mortality();
        json!({
            "Enable_Vital_Dynamics": 1,
            "Enable_Natural_Mortality": u8::from(natural_mortality),
            "Death_Rate_Dependence": if natural_mortality {
                "NONDISEASE_MORTALITY_BY_AGE_AND_GENDER"
            } else {
                "NOT_INITIALIZED"
            },
            "Birth_Rate_Dependence": if fertility {
                "INDIVIDUAL_PREGNANCIES_BY_AGE_AND_YEAR"
            } else {
                "POPULATION_DEP_RATE"
            },
            "Age_Initialization_Distribution_Type": "DISTRIBUTION_SIMPLE",
        })
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        log::debug!("serializing demographics with {} node(s)", self.nodes.len());
        json!({
            "Metadata": {
                "IdReference": self.id_reference,
                "NodeCount": self.nodes.len(),
                "Tool": env!("CARGO_PKG_NAME"),
            },
            "Defaults": self.default_node.to_json(),
            "Nodes": self.nodes.iter().map(Node::to_json).collect::<Vec<_>>(),
        })
    }

    /// # Errors
    /// If the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), AuthoringError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.to_json())?;
        writer.flush()?;
        log::debug!("wrote demographics to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use serde_json::json;
    use statrs::assert_almost_eq;
    use tempfile::{tempdir, NamedTempFile};

    use super::{
        ConcurrencyConfiguration, Demographics, ExtraRelationalFlag, IndividualProperty,
        MortalityOptions, Node, PopulationRecord, RelationshipParameters, SexConcurrency,
        SimpleDistribution,
    };
    use crate::common::{RelationshipType, Risk, Sex, Sigmoid, ValueMap};
    use crate::error::AuthoringError;

    const TRANSITORY: RelationshipType = RelationshipType::Transitory;

    fn identity() -> Vec<Vec<f64>> {
        vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]]
    }

    fn uniform() -> Vec<Vec<f64>> {
        vec![vec![1.0; 3]; 3]
    }

    fn two_nodes() -> Demographics {
        Demographics::from_population_records(&[
            PopulationRecord {
                node_id: 1,
                name: "Lusaka".to_string(),
                population: 1000,
                latitude: None,
                longitude: None,
            },
            PopulationRecord {
                node_id: 2,
                name: "Ndola".to_string(),
                population: 500,
                latitude: Some(-12.97),
                longitude: Some(28.64),
            },
        ])
        .unwrap()
    }

    fn persist_tmp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_regular_nodes_inherit_default_pair_formation() {
        let mut demographics = two_nodes();
        demographics
            .set_pair_formation_parameters(TRANSITORY, 0.0006, &identity(), Some(&[0]))
            .unwrap();
        demographics
            .set_pair_formation_parameters(TRANSITORY, 0.0006, &uniform(), Some(&[1]))
            .unwrap();
        let assortivity = |node_id| {
            demographics
                .pair_formation_parameters(node_id, TRANSITORY)
                .unwrap()
                .unwrap()
                .assortivity
        };
        assert_eq!(assortivity(0), [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(assortivity(1), [[1.0; 3]; 3]);
        assert_eq!(assortivity(2), assortivity(0));

        let json = demographics.to_json();
        assert!(json["Nodes"][1].get("Society").is_none());
        assert_eq!(
            json["Nodes"][0]["Society"]["TRANSITORY"]["Pair_Formation_Parameters"]["Assortivity"]["Matrix"],
            json!([[1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0]])
        );
        assert!(demographics
            .pair_formation_parameters(0, RelationshipType::Marital)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_every_society_setter_keeps_nodes_independent() {
        let condom = Sigmoid::probability(0.0, 0.5, 2000.0, 1.0).unwrap();
        let relationship = |scale| RelationshipParameters::new(0.33, condom, scale, 0.833).unwrap();
        let concurrency = |p| SexConcurrency::new(p, 2).unwrap();
        let configuration = |p| {
            ConcurrencyConfiguration::new(p, &[(Risk::High, ExtraRelationalFlag::Independent)]).unwrap()
        };

        let mut demographics = two_nodes();
        demographics
            .set_pair_formation_parameters(TRANSITORY, 0.1, &identity(), None)
            .unwrap()
            .set_relationship_parameters(TRANSITORY, &relationship(1.0), None)
            .unwrap()
            .set_concurrency_parameters(TRANSITORY, Risk::High, Sex::Male, concurrency(0.1), None)
            .unwrap()
            .set_concurrency_configuration(&configuration(0.1), None)
            .unwrap();

        demographics
            .set_pair_formation_parameters(TRANSITORY, 0.2, &uniform(), Some(&[1]))
            .unwrap()
            .set_relationship_parameters(TRANSITORY, &relationship(2.0), Some(&[1]))
            .unwrap()
            .set_concurrency_parameters(TRANSITORY, Risk::High, Sex::Male, concurrency(0.2), Some(&[1]))
            .unwrap()
            .set_concurrency_configuration(&configuration(0.2), Some(&[1]))
            .unwrap();

        let snapshot = |d: &Demographics, node_id| {
            (
                d.pair_formation_parameters(node_id, TRANSITORY).unwrap().cloned(),
                d.relationship_parameters(node_id, TRANSITORY).unwrap().cloned(),
                d.concurrency_parameters(node_id, TRANSITORY, Risk::High, Sex::Male)
                    .unwrap(),
                d.concurrency_configuration(node_id).unwrap().cloned(),
            )
        };
        let default_before = snapshot(&demographics, 0);
        let node_before = snapshot(&demographics, 1);
        assert_ne!(default_before, node_before);
        assert_eq!(snapshot(&demographics, 2), default_before);

        // Changing the default node leaves node 1's explicit values alone.
        demographics
            .set_pair_formation_parameters(TRANSITORY, 0.3, &identity(), None)
            .unwrap()
            .set_relationship_parameters(TRANSITORY, &relationship(3.0), Some(&[0]))
            .unwrap()
            .set_concurrency_parameters(TRANSITORY, Risk::High, Sex::Male, concurrency(0.3), None)
            .unwrap()
            .set_concurrency_configuration(&configuration(0.3), None)
            .unwrap();
        assert_eq!(snapshot(&demographics, 1), node_before);
        assert_ne!(snapshot(&demographics, 0), default_before);
        assert_eq!(snapshot(&demographics, 2), snapshot(&demographics, 0));

        // Changing node 2 leaves the default node alone.
        let default_now = snapshot(&demographics, 0);
        demographics
            .set_relationship_parameters(TRANSITORY, &relationship(4.0), Some(&[2]))
            .unwrap();
        assert_eq!(snapshot(&demographics, 0), default_now);
        assert_almost_eq!(
            demographics
                .relationship_parameters(2, TRANSITORY)
                .unwrap()
                .unwrap()
                .duration_weibull_scale,
            4.0,
            1e-12
        );
    }

    #[test]
    fn test_concurrency_inherits_per_sex() {
        let mut demographics = two_nodes();
        demographics
            .set_concurrency_parameters(
                TRANSITORY,
                Risk::Low,
                Sex::Female,
                SexConcurrency::new(0.3, 1).unwrap(),
                None,
            )
            .unwrap()
            .set_concurrency_parameters(
                TRANSITORY,
                Risk::Low,
                Sex::Male,
                SexConcurrency::new(0.5, 3).unwrap(),
                Some(&[1]),
            )
            .unwrap();
        let female = demographics
            .concurrency_parameters(1, TRANSITORY, Risk::Low, Sex::Female)
            .unwrap()
            .unwrap();
        assert_eq!(female.max_simultaneous_relationships, 1);
        assert!(demographics
            .concurrency_parameters(0, TRANSITORY, Risk::Low, Sex::Male)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unknown_nodes() {
        let mut demographics = two_nodes();
        assert!(matches!(demographics.node(7), Err(AuthoringError::UnknownNode(7))));
        let before = demographics.to_json();
        assert!(matches!(
            demographics.set_birth_rate(0.01, Some(&[1, 9])),
            Err(AuthoringError::UnknownNode(9))
        ));
        assert_eq!(demographics.to_json(), before);
        assert!(demographics.set_birth_rate(0.01, Some(&[])).is_err());
        assert!(matches!(
            demographics.relationship_parameters(3, TRANSITORY),
            Err(AuthoringError::UnknownNode(3))
        ));
    }

    #[test]
    fn test_individual_properties() {
        let mut demographics = two_nodes();
        assert!(matches!(
            IndividualProperty::new("Risk", &["LOW", "HIGH"], &[0.6, 0.5]),
            Err(AuthoringError::Configuration(_))
        ));
        demographics
            .add_or_update_individual_property(&IndividualProperty::risk(0.2, 0.3, 0.5).unwrap(), Some(&[2]))
            .unwrap()
            .add_or_update_individual_property(&IndividualProperty::accessibility(0.8).unwrap(), Some(&[2]))
            .unwrap();
        let default = demographics.individual_properties(0).unwrap();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].initial_distribution(), [0.667, 0.333, 0.0]);
        let node = demographics.individual_properties(2).unwrap();
        assert_eq!(node.len(), 2);
        assert_eq!(node[0].initial_distribution(), [0.2, 0.3, 0.5]);
        assert_eq!(demographics.individual_properties(1).unwrap(), default);
        for property in &node {
            assert_eq!(property.values().len(), property.initial_distribution().len());
            assert_almost_eq!(property.initial_distribution().iter().sum::<f64>(), 1.0, 1e-9);
        }
    }

    #[test]
    fn test_defaults() {
        let demographics = Demographics::new().unwrap();
        assert!(!demographics.natural_mortality());
        assert_eq!(
            demographics.age_distribution(0).unwrap(),
            Some(SimpleDistribution::Uniform { min: 0.0, max: 18250.0 })
        );
        assert_almost_eq!(demographics.birth_rate(0).unwrap().unwrap(), 1.03567_f64.ln(), 1e-12);
        assert_eq!(demographics.implicit_config()["Enable_Natural_Mortality"], 0);
        assert_eq!(
            demographics.implicit_config()["Birth_Rate_Dependence"],
            "POPULATION_DEP_RATE"
        );
        let json = demographics.to_json();
        assert_eq!(json["Metadata"]["NodeCount"], 0);
        assert_eq!(json["Nodes"], json!([]));
    }

    #[test]
    fn test_time_varying_formation_rate() {
        let rates = ValueMap::from_pairs(&[(1980.0, 0.001), (2000.0, 0.0005)]).unwrap();
        let mut demographics = two_nodes();
        assert!(demographics
            .set_formation_rate_time_varying(TRANSITORY, &rates, None)
            .is_err());
        demographics
            .set_pair_formation_parameters(TRANSITORY, 0.0006, &uniform(), None)
            .unwrap()
            .set_formation_rate_time_varying(TRANSITORY, &rates, Some(&[2]))
            .unwrap();
        let json = demographics.to_json();
        let node = &json["Nodes"][1]["Society"]["TRANSITORY"]["Pair_Formation_Parameters"];
        assert_eq!(node["Formation_Rate_Type"], "INTERPOLATED_VALUES");
        assert_eq!(
            node["Formation_Rate_Interpolated_Values"],
            json!({"Times": [1980.0, 2000.0], "Values": [0.001, 0.0005]})
        );
        assert_eq!(node["Assortivity"]["Matrix"][0], json!([1.0, 1.0, 1.0]));
        assert_eq!(
            json["Defaults"]["Society"]["TRANSITORY"]["Pair_Formation_Parameters"]["Formation_Rate_Type"],
            "CONSTANT"
        );
    }

    #[test]
    fn test_population_csv_factories() {
        let file = persist_tmp_csv("node_id,name,population,latitude,longitude\n1,A,100,1.0,2.0\n2,B,200,3.0,4.0\n");
        let demographics = Demographics::from_population_csv(file.path()).unwrap();
        assert_eq!(demographics.nodes().len(), 2);
        assert_eq!(demographics.node(2).unwrap().initial_population, Some(200));

        let duplicate = persist_tmp_csv("node_id,name,population\n1,A,100\n1,B,200\n");
        assert!(Demographics::from_population_csv(duplicate.path()).is_err());
        let reserved = persist_tmp_csv("node_id,name,population\n0,A,100\n");
        assert!(Demographics::from_population_csv(reserved.path()).is_err());

        let template = Demographics::from_template(1, "Erewhon", 0.0, 0.0, 1_000_000).unwrap();
        assert_eq!(template.nodes()[0].latitude, Some(0.0));
        assert!(Demographics::from_template(1, "Erewhon", 0.0, 200.0, 10).is_err());

        let mut demographics = Demographics::new().unwrap();
        demographics.add_node(Node::new(5, "E", 10).unwrap()).unwrap();
        assert!(demographics.add_node(Node::new(5, "F", 10).unwrap()).is_err());
    }

    #[test]
    fn test_vital_dynamics_and_write() {
        let fertility = persist_tmp_csv("year,age,rate\n2000,20,150\n2000,30,100\n2010,20,120\n2010,30,90\n");
        let mortality = persist_tmp_csv(
            "year,age_min,age_max,rate\n2000,0,50,0.01\n2000,50,100,0.1\n2005,0,50,0.008\n2005,50,100,0.09\n",
        );
        let mut demographics = two_nodes();
        demographics
            .set_fertility(fertility.path(), Some(&[1]))
            .unwrap()
            .set_mortality(
                mortality.path(),
                mortality.path(),
                &MortalityOptions {
                    prediction_horizon: Some(2015.0),
                    ..MortalityOptions::default()
                },
                None,
            )
            .unwrap()
            .set_initial_prevalence(SimpleDistribution::Uniform { min: 0.01, max: 0.02 }, Some(&[2]))
            .unwrap();
        assert!(demographics.natural_mortality());
        let config = demographics.implicit_config();
        assert_eq!(config["Enable_Natural_Mortality"], 1);
        assert_eq!(config["Birth_Rate_Dependence"], "INDIVIDUAL_PREGNANCIES_BY_AGE_AND_YEAR");

        let dir = tempdir().unwrap();
        let path = dir.path().join("demographics.json");
        demographics.write(&path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, demographics.to_json());
        assert_eq!(
            written["Defaults"]["IndividualAttributes"]["MortalityDistributionMale"]["PopulationGroups"][1],
            json!([2000.0, 2005.0, 2010.0, 2015.0])
        );
        assert!(written["Nodes"][0]["IndividualAttributes"]
            .get("FertilityDistribution")
            .is_some());
        assert_eq!(
            written["Nodes"][1]["IndividualAttributes"]["PrevalenceDistribution2"],
            0.02
        );
        assert!(demographics.set_initial_prevalence(SimpleDistribution::Constant(1.5), None).is_err());
    }
}
