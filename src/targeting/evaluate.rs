use super::{Condition, HasRelationship, Predicate, RecentlyType, RelationshipTerminationReasonType};
use crate::coordinators::TriggerTier;
use crate::evaluation::{Agent, AgentId, Population, Relationship, DAYS_PER_MONTH};

/// What a relationship looks like to a handler running at a given tier.
#[derive(Debug, Clone, Copy)]
struct View {
    started_this_step: bool,
    ended_this_step: bool,
    active: bool,
}

fn view(population: &Population, relationship: &Relationship, tier: TriggerTier) -> Option<View> {
    let started_this_step = population.in_current_step(relationship.start_day);
    let ended_this_step = relationship
        .end
        .is_some_and(|end| population.in_current_step(end.day));
    if relationship.start_day > population.current_day {
        return None;
    }
    match tier {
        TriggerTier::Individual => Some(View {
            started_this_step,
            ended_this_step,
            active: relationship.end.is_none_or(|end| end.day > population.current_day),
        }),
        // Changes made during this timestep are not visible yet.
        TriggerTier::Coordinator => {
            if started_this_step {
                return None;
            }
            let ended_before = relationship
                .end
                .is_some_and(|end| end.day <= population.current_day - population.timestep_days);
            Some(View {
                started_this_step: false,
                ended_this_step: false,
                active: !ended_before,
            })
        }
    }
}

impl Predicate {
    /// Whether agent `id` satisfies this predicate, as seen by a handler at the
    /// individual tier. An unknown id satisfies nothing.
    #[must_use]
    pub fn evaluate(&self, population: &Population, id: AgentId) -> bool {
        self.evaluate_at(population, id, TriggerTier::Individual)
    }

    #[must_use]
    pub fn evaluate_at(&self, population: &Population, id: AgentId, tier: TriggerTier) -> bool {
        let Some(agent) = population.agent(id) else {
            return false;
        };
        match self {
            Predicate::Leaf {
                condition,
                is_equal_to,
            } => condition.holds(population, agent, tier) == *is_equal_to,
            Predicate::And(children) => children.iter().all(|c| c.evaluate_at(population, id, tier)),
            Predicate::Or(children) => children.iter().any(|c| c.evaluate_at(population, id, tier)),
            Predicate::Not(inner) => !inner.evaluate_at(population, id, tier),
        }
    }
}

impl Condition {
    fn holds(&self, population: &Population, agent: &Agent, tier: TriggerTier) -> bool {
        match self {
            Condition::IsCircumcised => agent.circumcised,
            Condition::IsHivPositive(history) => {
                agent.hiv_positive
                    && history.has_ever_been_tested.admits(agent.ever_tested)
                    && history
                        .has_ever_tested_positive
                        .admits(agent.ever_tested_positive)
                    && history
                        .has_received_positive_results
                        .admits(agent.received_positive_results)
            }
            Condition::IsOnArt => agent.on_art,
            Condition::IsPostDebut => agent.post_debut,
            Condition::IsPregnant => agent.pregnant,
            Condition::HasBeenOnArtMoreOrLessThanNumMonths {
                num_months,
                more_or_less,
            } => agent.on_art && more_or_less.compare(agent.months_on_art, *num_months),
            Condition::HasMoreOrLessThanNumPartners {
                num_partners,
                more_or_less,
                of_relationship_type,
            } => {
                let count = agent
                    .relationships
                    .iter()
                    .filter(|r| of_relationship_type.admits(r.relationship_type))
                    .filter_map(|r| view(population, r, tier))
                    .filter(|v| v.active)
                    .count();
                #[allow(clippy::cast_precision_loss)]
                let count = count as f64;
                more_or_less.compare(count, *num_partners)
            }
            Condition::HasHadMultiplePartnersInLastNumMonths {
                num_months,
                of_relationship_type,
            } => {
                let from_day = population.current_day - f64::from(num_months.months()) * DAYS_PER_MONTH;
                let mut partners: Vec<AgentId> = agent
                    .relationships
                    .iter()
                    .filter(|r| of_relationship_type.admits(r.relationship_type))
                    .filter(|r| view(population, r, tier).is_some())
                    .filter(|r| r.overlaps(from_day, population.current_day))
                    .map(|r| r.partner)
                    .collect();
                partners.sort_unstable();
                partners.dedup();
                partners.len() >= 2
            }
            Condition::HasCd4BetweenMinAndMax { min_cd4, max_cd4 } => {
                agent.cd4 >= *min_cd4 && agent.cd4 < *max_cd4
            }
            Condition::HasIp { key, value } => agent.properties.get(key) == Some(value),
            Condition::HasIntervention { name } => agent.interventions.contains(name),
            Condition::HasRelationship(relationship) => agent
                .relationships
                .iter()
                .any(|r| relationship.matches(population, r, tier)),
        }
    }
}

impl HasRelationship {
    fn matches(&self, population: &Population, relationship: &Relationship, tier: TriggerTier) -> bool {
        if !self.of_relationship_type.admits(relationship.relationship_type) {
            return false;
        }
        let Some(view) = view(population, relationship, tier) else {
            return false;
        };
        let timing = match self.that_recently {
            RecentlyType::Na => view.active,
            RecentlyType::Started => view.started_this_step,
            RecentlyType::Ended => {
                view.ended_this_step
                    && (self.that_recently_ended_due_to == RelationshipTerminationReasonType::Na
                        || relationship
                            .end
                            .is_some_and(|end| end.reason == self.that_recently_ended_due_to))
            }
        };
        timing
            && self.with_partner_who.as_ref().is_none_or(|partner| {
                partner.evaluate_at(population, relationship.partner, tier)
            })
    }
}

#[cfg(test)]
mod test {
    use crate::common::{RelationshipType, Sex};
    use crate::coordinators::TriggerTier;
    use crate::evaluation::{Agent, AgentId, Population};
    use crate::targeting::{
        MoreOrLess, NumMonthsType, OfRelationshipType, Predicate, RecentlyType,
        RelationshipTerminationReasonType, TestHistory, YesNoNa,
    };

    /// A small population covering every combination of HIV, ART and circumcision.
    fn population() -> Population {
        let mut population = Population::new(2000.0, 30.0).unwrap();
        for i in 0..8 {
            let mut agent = Agent::new(if i % 2 == 0 { Sex::Male } else { Sex::Female }, 20.0 + f64::from(i));
            agent.hiv_positive = i & 1 == 1;
            agent.on_art = i & 2 == 2;
            agent.circumcised = i & 4 == 4;
            agent.cd4 = 100.0 * f64::from(i);
            population.add_agent(agent);
        }
        population.current_day = 300.0;
        population
    }

    #[test]
    fn test_distribution_holds_for_every_agent() {
        let population = population();
        let a = || Predicate::is_hiv_positive();
        let b = || Predicate::is_on_art();
        let c = || Predicate::is_circumcised();
        let left = a() & (b() | c());
        let right = (a() & b()) | (a() & c());
        for id in population.ids() {
            assert_eq!(left.evaluate(&population, id), right.evaluate(&population, id));
        }
    }

    #[test]
    fn test_not_and_double_negation() {
        let population = population();
        let p = Predicate::is_on_art() | Predicate::is_circumcised();
        let not_not = !!p.clone();
        for id in population.ids() {
            assert_eq!(p.evaluate(&population, id), not_not.evaluate(&population, id));
            assert_ne!(p.evaluate(&population, id), (!p.clone()).evaluate(&population, id));
        }
    }

    #[test]
    fn test_parameterized_leaves() {
        let mut population = population();
        let cd4 = Predicate::has_cd4_between_min_and_max(200.0, 400.0).unwrap();
        assert!(!cd4.evaluate(&population, AgentId(1)));
        assert!(cd4.evaluate(&population, AgentId(2)));
        assert!(!cd4.evaluate(&population, AgentId(4)));

        let agent = population.agent_mut(AgentId(3)).unwrap();
        agent.months_on_art = 7.0;
        agent.ever_tested = true;
        let on_art_long = Predicate::has_been_on_art_more_or_less_than_num_months(6.0, MoreOrLess::More).unwrap();
        assert!(on_art_long.evaluate(&population, AgentId(3)));
        // Not on ART.
        assert!(!on_art_long.evaluate(&population, AgentId(1)));

        let tested = Predicate::is_hiv_positive_with(TestHistory {
            has_ever_been_tested: YesNoNa::Yes,
            ..TestHistory::default()
        });
        assert!(tested.evaluate(&population, AgentId(3)));
        assert!(!tested.evaluate(&population, AgentId(1)));
        assert!(!tested.evaluate(&population, AgentId(99)));
    }

    #[test]
    fn test_ip_and_intervention_leaves() {
        let mut population = population();
        let agent = population.agent_mut(AgentId(0)).unwrap();
        agent.properties.insert("Risk".to_string(), "HIGH".to_string());
        agent.interventions.insert("PrEP".to_string());
        assert!(Predicate::has_ip("Risk:HIGH").unwrap().evaluate(&population, AgentId(0)));
        assert!(!Predicate::has_ip("Risk:LOW").unwrap().evaluate(&population, AgentId(0)));
        assert!(Predicate::has_intervention("PrEP").unwrap().evaluate(&population, AgentId(0)));
        assert!(!Predicate::has_intervention("PrEP").unwrap().evaluate(&population, AgentId(1)));
    }

    #[test]
    fn test_partner_counts() {
        let mut population = population();
        population
            .add_relationship(AgentId(0), AgentId(1), RelationshipType::Transitory, 10.0)
            .unwrap();
        population
            .add_relationship(AgentId(0), AgentId(3), RelationshipType::Marital, 100.0)
            .unwrap();
        population
            .end_relationship(AgentId(0), AgentId(1), 150.0, RelationshipTerminationReasonType::BrokeUp)
            .unwrap();

        let more_than_zero = Predicate::has_more_or_less_than_num_partners(
            0.0,
            MoreOrLess::More,
            OfRelationshipType::Na,
        )
        .unwrap();
        assert!(more_than_zero.evaluate(&population, AgentId(0)));
        assert!(!more_than_zero.evaluate(&population, AgentId(1)));

        let multiple = |months| {
            Predicate::has_had_multiple_partners_in_last_num_months(months, OfRelationshipType::Na)
        };
        assert!(multiple(NumMonthsType::TwelveMonths).evaluate(&population, AgentId(0)));
        assert!(!multiple(NumMonthsType::ThreeMonths).evaluate(&population, AgentId(0)));
    }

    #[test]
    fn test_recent_relationships_by_tier() {
        let mut population = population();
        population
            .add_relationship(AgentId(0), AgentId(1), RelationshipType::Transitory, 290.0)
            .unwrap();
        population
            .add_relationship(AgentId(2), AgentId(3), RelationshipType::Transitory, 50.0)
            .unwrap();
        population
            .end_relationship(AgentId(2), AgentId(3), 295.0, RelationshipTerminationReasonType::PartnerDied)
            .unwrap();

        let started = Predicate::has_relationship()
            .that_recently(RecentlyType::Started)
            .build()
            .unwrap();
        assert!(started.evaluate_at(&population, AgentId(0), TriggerTier::Individual));
        assert!(!started.evaluate_at(&population, AgentId(0), TriggerTier::Coordinator));

        let ended = Predicate::has_relationship()
            .of_relationship_type(OfRelationshipType::Transitory)
            .that_recently(RecentlyType::Ended)
            .that_recently_ended_due_to(RelationshipTerminationReasonType::PartnerDied)
            .with_partner_who(Predicate::is_hiv_positive() & Predicate::is_on_art())
            .build()
            .unwrap();
        assert!(ended.evaluate(&population, AgentId(2)));
        // Agent 2 is negative and not on ART.
        assert!(!ended.evaluate(&population, AgentId(3)));
        assert!(!ended.evaluate_at(&population, AgentId(2), TriggerTier::Coordinator));

        let current = Predicate::has_relationship()
            .of_relationship_type(OfRelationshipType::Transitory)
            .build()
            .unwrap();
        assert!(current.evaluate_at(&population, AgentId(2), TriggerTier::Coordinator));
        assert!(!current.evaluate_at(&population, AgentId(2), TriggerTier::Individual));
    }
}
