//! A static population snapshot that gives targeting predicates and the
//! exact-count and tracking distribution rules executable semantics. Nothing here
//! models infection, aging or relationship formation; agents only change when
//! they receive an intervention.

mod evaluator;

use indexmap::{IndexMap, IndexSet};

pub use evaluator::{
    Evaluator, NChooserReport, NChooserWindowReport, ReferenceTrackingReport, TrackingTick,
};

use crate::common::{parse_key_value, RelationshipType, Sex};
use crate::error::AuthoringError;
use crate::interventions::{Intervention, InterventionKind};
use crate::targeting::RelationshipTerminationReasonType;

pub const DAYS_PER_YEAR: f64 = 365.0;
pub const DAYS_PER_MONTH: f64 = DAYS_PER_YEAR / 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelationshipEnd {
    pub day: f64,
    pub reason: RelationshipTerminationReasonType,
}

/// One side of a relationship, stored on each partner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relationship {
    pub relationship_type: RelationshipType,
    pub partner: AgentId,
    pub start_day: f64,
    pub end: Option<RelationshipEnd>,
}

impl Relationship {
    /// Whether the relationship spans any part of `[from_day, to_day]`.
    #[must_use]
    pub fn overlaps(&self, from_day: f64, to_day: f64) -> bool {
        self.start_day <= to_day && self.end.is_none_or(|end| end.day >= from_day)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub sex: Sex,
    pub age_years: f64,
    pub hiv_positive: bool,
    pub on_art: bool,
    pub months_on_art: f64,
    pub circumcised: bool,
    pub sti_coinfected: bool,
    pub cd4: f64,
    pub ever_tested: bool,
    pub ever_tested_positive: bool,
    pub received_positive_results: bool,
    pub pregnant: bool,
    pub post_debut: bool,
    pub properties: IndexMap<String, String>,
    pub interventions: IndexSet<String>,
    pub relationships: Vec<Relationship>,
}

impl Agent {
    /// An uninfected, untested, post-debut agent with a healthy CD4 count.
    #[must_use]
    pub fn new(sex: Sex, age_years: f64) -> Self {
        Agent {
            sex,
            age_years,
            hiv_positive: false,
            on_art: false,
            months_on_art: 0.0,
            circumcised: false,
            sti_coinfected: false,
            cd4: 1000.0,
            ever_tested: false,
            ever_tested_positive: false,
            received_positive_results: false,
            pregnant: false,
            post_debut: true,
            properties: IndexMap::new(),
            interventions: IndexSet::new(),
            relationships: Vec::new(),
        }
    }

    /// # Errors
    /// If `key_value` is not of the form `Key:Value`.
    pub fn with_property(mut self, key_value: &str) -> Result<Self, AuthoringError> {
        let (key, value) = parse_key_value(key_value)?;
        self.properties.insert(key, value);
        Ok(self)
    }

    fn carries(&self, key_value: &str) -> bool {
        parse_key_value(key_value)
            .is_ok_and(|(key, value)| self.properties.get(&key) == Some(&value))
    }

    /// Whether the agent would accept `intervention`. A recipient carrying a
    /// disqualifying property, or already holding an intervention of the same name
    /// that disallows duplicates, refuses it.
    #[must_use]
    pub fn accepts(&self, intervention: &Intervention) -> bool {
        let common = intervention.common();
        !common
            .disqualifying_properties
            .iter()
            .any(|key_value| self.carries(key_value))
            && !(common.dont_allow_duplicates == Some(true)
                && self.interventions.contains(intervention.name()))
    }

    /// Applies `intervention` and returns whether it was accepted.
    pub fn receive(&mut self, intervention: &Intervention) -> bool {
        if !self.accepts(intervention) {
            return false;
        }
        let common = intervention.common();
        let name = intervention.name();

        match intervention.kind() {
            InterventionKind::MaleCircumcision(_) => {
                if self.sex == Sex::Male {
                    self.circumcised = true;
                }
            }
            InterventionKind::AntiretroviralTherapy(_)
            | InterventionKind::AntiretroviralTherapyFull(_) => {
                if !self.on_art {
                    self.on_art = true;
                    self.months_on_art = 0.0;
                }
            }
            InterventionKind::ArtDropout(_) => {
                self.on_art = false;
                self.months_on_art = 0.0;
            }
            InterventionKind::ModifyStiCoInfectionStatus(modify) => {
                self.sti_coinfected = modify.new_sti_coinfection_status;
            }
            InterventionKind::PropertyValueChanger(changer) => {
                self.properties.insert(
                    changer.target_property_key.clone(),
                    changer.target_property_value.clone(),
                );
            }
            _ => {}
        }
        if let Some(Ok((key, value))) = common.new_property_value.as_deref().map(parse_key_value) {
            self.properties.insert(key, value);
        }
        self.interventions.insert(name.to_string());
        true
    }
}

/// The agents plus the clock the predicates are evaluated against.
#[derive(Debug, Clone)]
pub struct Population {
    agents: Vec<Agent>,
    pub base_year: f64,
    pub timestep_days: f64,
    pub current_day: f64,
}

impl Population {
    /// # Errors
    /// If `timestep_days` is not positive.
    pub fn new(base_year: f64, timestep_days: f64) -> Result<Self, AuthoringError> {
        if timestep_days.is_nan() || timestep_days <= 0.0 {
            return Err(AuthoringError::configuration(format!(
                "the simulation timestep must be positive, got {timestep_days}"
            )));
        }
        Ok(Population {
            agents: Vec::new(),
            base_year,
            timestep_days,
            current_day: 0.0,
        })
    }

    pub fn add_agent(&mut self, agent: Agent) -> AgentId {
        self.agents.push(agent);
        AgentId(self.agents.len() - 1)
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id.0)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> {
        (0..self.agents.len()).map(AgentId)
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter().enumerate().map(|(i, a)| (AgentId(i), a))
    }

    #[must_use]
    pub fn current_year(&self) -> f64 {
        self.base_year + self.current_day / DAYS_PER_YEAR
    }

    #[must_use]
    pub fn day_of_year(&self, year: f64) -> f64 {
        (year - self.base_year) * DAYS_PER_YEAR
    }

    /// Whether `day` falls in the timestep ending at the current day.
    #[must_use]
    pub fn in_current_step(&self, day: f64) -> bool {
        day > self.current_day - self.timestep_days && day <= self.current_day
    }

    /// Pairs two agents starting on `start_day`.
    ///
    /// # Errors
    /// If either agent does not exist or both ids are the same.
    pub fn add_relationship(
        &mut self,
        a: AgentId,
        b: AgentId,
        relationship_type: RelationshipType,
        start_day: f64,
    ) -> Result<(), AuthoringError> {
        self.check_pair(a, b)?;
        for (agent, partner) in [(a, b), (b, a)] {
            self.agents[agent.0].relationships.push(Relationship {
                relationship_type,
                partner,
                start_day,
                end: None,
            });
        }
        Ok(())
    }

    /// Ends the open relationship between `a` and `b`, recording `reason` on both sides.
    ///
    /// # Errors
    /// If either agent does not exist or they have no open relationship.
    pub fn end_relationship(
        &mut self,
        a: AgentId,
        b: AgentId,
        day: f64,
        reason: RelationshipTerminationReasonType,
    ) -> Result<(), AuthoringError> {
        self.check_pair(a, b)?;
        let open = |agent: AgentId, partner: AgentId| {
            self.agents[agent.0]
                .relationships
                .iter()
                .position(|r| r.partner == partner && r.end.is_none())
        };
        let (Some(i), Some(j)) = (open(a, b), open(b, a)) else {
            return Err(AuthoringError::configuration(format!(
                "agents {} and {} have no open relationship",
                a.0, b.0
            )));
        };
        for (agent, index) in [(a, i), (b, j)] {
            self.agents[agent.0].relationships[index].end = Some(RelationshipEnd { day, reason });
        }
        Ok(())
    }

    fn check_pair(&self, a: AgentId, b: AgentId) -> Result<(), AuthoringError> {
        if a == b {
            return Err(AuthoringError::configuration(format!(
                "agent {} cannot partner with itself",
                a.0
            )));
        }
        for id in [a, b] {
            if id.0 >= self.agents.len() {
                return Err(AuthoringError::configuration(format!(
                    "no agent with id {}",
                    id.0
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Agent, AgentId, Population};
    use crate::common::{RelationshipType, Sex};
    use crate::interventions::{
        AntiretroviralTherapy, ArtDropout, BroadcastEvent, Intervention, MaleCircumcision,
        PropertyValueChanger,
    };
    use crate::targeting::RelationshipTerminationReasonType;

    #[test]
    fn test_receive_updates_attributes() {
        let mut agent = Agent::new(Sex::Male, 25.0);
        assert!(agent.receive(&Intervention::from(
            MaleCircumcision::new(0.6, false, None).unwrap()
        )));
        assert!(agent.circumcised);
        assert!(agent.interventions.contains("MaleCircumcision"));

        agent.receive(&Intervention::from(AntiretroviralTherapy::default()));
        assert!(agent.on_art);
        agent.receive(&Intervention::from(ArtDropout));
        assert!(!agent.on_art);

        agent.receive(&Intervention::from(
            PropertyValueChanger::new("CascadeState:OnART", 1.0).unwrap(),
        ));
        assert_eq!(agent.properties["CascadeState"], "OnART");
    }

    #[test]
    fn test_receive_respects_common_attributes() {
        let mut agent = Agent::new(Sex::Female, 30.0)
            .with_property("CascadeState:LostForever")
            .unwrap();
        let disqualified = Intervention::from(BroadcastEvent::new("Retest").unwrap())
            .with_disqualifying_properties(["CascadeState:LostForever"])
            .unwrap();
        assert!(!agent.receive(&disqualified));
        assert!(agent.interventions.is_empty());

        let once = Intervention::from(AntiretroviralTherapy::default())
            .with_name("FirstLineART")
            .unwrap()
            .with_dont_allow_duplicates(true)
            .with_new_property_value("CascadeState:OnART")
            .unwrap();
        assert!(agent.receive(&once));
        assert_eq!(agent.properties["CascadeState"], "OnART");
        assert!(!agent.receive(&once));
    }

    #[test]
    fn test_relationship_bookkeeping() {
        let mut population = Population::new(2000.0, 30.0).unwrap();
        let a = population.add_agent(Agent::new(Sex::Male, 30.0));
        let b = population.add_agent(Agent::new(Sex::Female, 28.0));
        population
            .add_relationship(a, b, RelationshipType::Marital, 10.0)
            .unwrap();
        population
            .end_relationship(b, a, 40.0, RelationshipTerminationReasonType::BrokeUp)
            .unwrap();
        let side = population.agent(a).unwrap().relationships[0];
        assert_eq!(side.partner, b);
        assert!(side.end.is_some());
        assert!(side.overlaps(35.0, 50.0));
        assert!(!side.overlaps(41.0, 50.0));
        assert!(population
            .end_relationship(a, b, 50.0, RelationshipTerminationReasonType::BrokeUp)
            .is_err());
        assert!(population
            .add_relationship(a, AgentId(7), RelationshipType::Informal, 0.0)
            .is_err());
        assert!(Population::new(2000.0, 0.0).is_err());
    }

    #[test]
    fn test_end_relationship_leaves_both_sides_alone_on_error() {
        let mut population = Population::new(2000.0, 30.0).unwrap();
        let a = population.add_agent(Agent::new(Sex::Male, 30.0));
        let b = population.add_agent(Agent::new(Sex::Female, 28.0));
        population
            .add_relationship(a, b, RelationshipType::Transitory, 0.0)
            .unwrap();
        population.agent_mut(b).unwrap().relationships.clear();
        assert!(population
            .end_relationship(a, b, 20.0, RelationshipTerminationReasonType::BrokeUp)
            .is_err());
        assert!(population.agent(a).unwrap().relationships[0].end.is_none());
    }

    #[test]
    fn test_accepts_matches_receive() {
        let mut agent = Agent::new(Sex::Male, 30.0).with_property("Access:No").unwrap();
        let circumcision = Intervention::from(MaleCircumcision::new(0.6, false, None).unwrap());
        let restricted = circumcision
            .clone()
            .with_disqualifying_properties(["Access:No"])
            .unwrap();
        assert!(!agent.accepts(&restricted));
        assert!(!agent.receive(&restricted));

        let once = circumcision.with_dont_allow_duplicates(true);
        assert!(agent.accepts(&once));
        assert!(agent.receive(&once));
        assert!(!agent.accepts(&once));
    }
}
