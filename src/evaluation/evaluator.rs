use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;

use super::{Agent, AgentId, Population};
use crate::coordinators::{
    Cell, DiseaseStateAtom, NChooserCoordinator, ReferenceTrackingCoordinator, TargetedDistribution,
    Targeting, TriggerTier,
};
use crate::error::{AuthoringError, Warning};
use crate::interventions::Intervention;
use crate::parameters::Params;

/// Runs distribution rules step by step against a [`Population`].
pub struct Evaluator {
    rng: StdRng,
    x_base_population: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NChooserWindowReport {
    pub start_year: f64,
    pub end_year: f64,
    pub steps: u32,
    /// Agents that received the intervention, per cell in [`TargetedDistribution::cells`] order.
    pub distributed: Vec<u32>,
    /// Agents the plan asked for but no willing candidate was left to receive.
    pub shortfall: u32,
    pub recipients: Vec<AgentId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NChooserReport {
    pub windows: Vec<NChooserWindowReport>,
}

impl NChooserReport {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.windows
            .iter()
            .map(|w| w.distributed.iter().sum::<u32>())
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingTick {
    pub year: f64,
    pub desired: f64,
    pub numerator: usize,
    pub denominator: usize,
    pub distributed: usize,
    /// Share of the targeted group with the tracked attribute after distributing.
    pub fraction_after: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTrackingReport {
    pub ticks: Vec<TrackingTick>,
    pub warnings: Vec<Warning>,
}

fn admits_atom(agent: &Agent, atom: DiseaseStateAtom, intervention_name: Option<&str>) -> bool {
    let holds = |name: Option<&str>| name.is_some_and(|n| agent.interventions.contains(n));
    match atom {
        DiseaseStateAtom::HivPositive => agent.hiv_positive,
        DiseaseStateAtom::HivNegative => !agent.hiv_positive,
        DiseaseStateAtom::TestedPositive => agent.ever_tested_positive,
        DiseaseStateAtom::TestedNegative => agent.ever_tested && !agent.ever_tested_positive,
        DiseaseStateAtom::MaleCircumcisionPositive => agent.circumcised,
        DiseaseStateAtom::MaleCircumcisionNegative => !agent.circumcised,
        DiseaseStateAtom::HasIntervention => holds(intervention_name),
        DiseaseStateAtom::NotHaveIntervention => !holds(intervention_name),
    }
}

fn is_candidate(distribution: &TargetedDistribution, cell: &Cell, agent: &Agent) -> bool {
    let disease_state = distribution.disease_state();
    cell.age_range.contains(agent.age_years)
        && cell.sex.is_none_or(|sex| sex == agent.sex)
        && distribution.property_restrictions().matches(&agent.properties)
        && (disease_state.is_empty()
            || disease_state.iter().any(|conjunction| {
                conjunction.iter().all(|&atom| {
                    admits_atom(agent, atom, distribution.has_intervention_name())
                })
            }))
}

fn accepts_any(agent: &Agent, interventions: &[Intervention]) -> bool {
    interventions.iter().any(|intervention| agent.accepts(intervention))
}

fn is_targeted(targeting: &Targeting, population: &Population, id: AgentId, agent: &Agent) -> bool {
    targeting.demographics.admits(agent.sex, agent.age_years)
        && targeting.property_restrictions.matches(&agent.properties)
        && targeting
            .predicate
            .as_ref()
            .is_none_or(|p| p.evaluate_at(population, id, TriggerTier::Coordinator))
}

impl Evaluator {
    /// # Errors
    /// If `x_base_population` is not positive.
    pub fn new(seed: u64, x_base_population: f64) -> Result<Self, AuthoringError> {
        if x_base_population.is_nan() || x_base_population <= 0.0 {
            return Err(AuthoringError::configuration(format!(
                "x_base_population must be positive, got {x_base_population}"
            )));
        }
        Ok(Evaluator {
            rng: StdRng::seed_from_u64(seed),
            x_base_population,
        })
    }

    /// # Errors
    /// See [`Evaluator::new`].
    pub fn from_params(params: &Params) -> Result<Self, AuthoringError> {
        Self::new(params.seed, params.x_base_population)
    }

    /// Draws up to `amount` of `candidates` uniformly without replacement.
    fn choose(&mut self, candidates: &[AgentId], amount: usize) -> Vec<AgentId> {
        let amount = amount.min(candidates.len());
        sample(&mut self.rng, candidates.len(), amount)
            .into_iter()
            .map(|i| candidates[i])
            .collect()
    }

    fn give(population: &mut Population, id: AgentId, interventions: &[Intervention]) -> bool {
        let Some(agent) = population.agent_mut(id) else {
            return false;
        };
        let mut received = false;
        for intervention in interventions {
            received |= agent.receive(intervention);
        }
        received
    }

    /// Timestep days whose calendar year falls in `[start_year, end_year)`.
    fn window_days(population: &Population, start_year: f64, end_year: f64) -> Vec<f64> {
        let dt = population.timestep_days;
        let first = (population.day_of_year(start_year) / dt).ceil().max(0.0);
        let mut days = Vec::new();
        let mut k = first;
        loop {
            let day = k * dt;
            if population.base_year + day / super::DAYS_PER_YEAR >= end_year {
                break;
            }
            days.push(day);
            k += 1.0;
        }
        days
    }

    /// Executes every window of `coordinator` in order.
    pub fn run_nchooser(
        &mut self,
        population: &mut Population,
        coordinator: &NChooserCoordinator,
    ) -> NChooserReport {
        let mut report = NChooserReport::default();
        let interventions = std::slice::from_ref(&coordinator.intervention);
        for distribution in &coordinator.distributions {
            let days = Self::window_days(population, distribution.start_year, distribution.end_year);
            #[allow(clippy::cast_possible_truncation)]
            let steps = days.len() as u32;
            let plan = distribution.step_plan(self.x_base_population, steps);
            let cells = distribution.cells();
            let mut window = NChooserWindowReport {
                start_year: distribution.start_year,
                end_year: distribution.end_year,
                steps,
                distributed: vec![0; cells.len()],
                shortfall: 0,
                recipients: Vec::new(),
            };
            let mut selected = vec![false; population.len()];

            for (day, allocation) in days.iter().zip(&plan) {
                population.current_day = *day;
                for (c, (cell, &wanted)) in cells.iter().zip(allocation).enumerate() {
                    if wanted == 0 {
                        continue;
                    }
                    let candidates: Vec<AgentId> = population
                        .agents()
                        .filter(|(id, agent)| {
                            !selected[id.0]
                                && is_candidate(distribution, cell, agent)
                                && accepts_any(agent, interventions)
                        })
                        .map(|(id, _)| id)
                        .collect();
                    let chosen = self.choose(&candidates, wanted as usize);
                    let mut given = 0;
                    for id in chosen {
                        selected[id.0] = true;
                        if Self::give(population, id, interventions) {
                            given += 1;
                            window.recipients.push(id);
                        }
                    }
                    window.distributed[c] += given;
                    let short = wanted - given;
                    window.shortfall += short;
                    log::trace!(
                        "day {day}: cell {c} wanted {wanted} from {} candidate(s), short {short}",
                        candidates.len()
                    );
                }
            }
            log::debug!(
                "N-Chooser window [{}, {}) over {steps} step(s) distributed {:?}",
                window.start_year,
                window.end_year,
                window.distributed
            );
            report.windows.push(window);
        }
        report
    }

    /// Polls `coordinator` every update period from its start to its end year.
    pub fn run_reference_tracking(
        &mut self,
        population: &mut Population,
        coordinator: &ReferenceTrackingCoordinator,
    ) -> ReferenceTrackingReport {
        let mut report = ReferenceTrackingReport::default();
        let mut day = population.day_of_year(coordinator.start_year);
        loop {
            population.current_day = day;
            let year = population.current_year();
            if year > coordinator.end_year {
                break;
            }
            let desired = coordinator.desired(year);
            let snapshot: &Population = population;
            let targeted: Vec<AgentId> = snapshot
                .agents()
                .filter(|(id, agent)| is_targeted(&coordinator.targeting, snapshot, *id, agent))
                .map(|(id, _)| id)
                .collect();
            let (tracked, untracked): (Vec<AgentId>, Vec<AgentId>) = targeted
                .iter()
                .copied()
                .partition(|&id| coordinator.tracking.evaluate_at(snapshot, id, TriggerTier::Coordinator));
            let willing: Vec<AgentId> = untracked
                .into_iter()
                .filter(|&id| {
                    snapshot
                        .agent(id)
                        .is_some_and(|agent| accepts_any(agent, &coordinator.interventions))
                })
                .collect();
            let denominator = targeted.len();
            let numerator = tracked.len();

            let mut distributed = 0;
            if denominator == 0 {
                report.warnings.push(Warning::new(
                    "ReferenceTrackingEventCoordinatorTrackingConfig",
                    format!("no agent matches the targeting in year {year}; nothing was distributed"),
                ));
            } else {
                #[allow(clippy::cast_precision_loss)]
                let fraction = numerator as f64 / denominator as f64;
                if fraction < desired {
                    #[allow(
                        clippy::cast_precision_loss,
                        clippy::cast_possible_truncation,
                        clippy::cast_sign_loss
                    )]
                    let needed = ((desired * denominator as f64 - 1e-9).ceil() as usize).saturating_sub(numerator);
                    for id in self.choose(&willing, needed) {
                        if Self::give(population, id, &coordinator.interventions) {
                            distributed += 1;
                        }
                    }
                    if distributed < needed {
                        report.warnings.push(Warning::new(
                            "ReferenceTrackingEventCoordinatorTrackingConfig",
                            format!(
                                "only {distributed} of the {needed} agent(s) needed in year {year} would accept the intervention"
                            ),
                        ));
                    }
                }
            }
            let now_tracked = targeted
                .iter()
                .filter(|&&id| coordinator.tracking.evaluate_at(population, id, TriggerTier::Coordinator))
                .count();
            #[allow(clippy::cast_precision_loss)]
            let fraction_after = if denominator == 0 {
                0.0
            } else {
                now_tracked as f64 / denominator as f64
            };
            log::trace!(
                "year {year:.3}: desired {desired}, {numerator}/{denominator} tracked, distributed {distributed}"
            );
            report.ticks.push(TrackingTick {
                year,
                desired,
                numerator,
                denominator,
                distributed,
                fraction_after,
            });
            day += coordinator.update_period_days;
        }
        report
    }
}

#[cfg(test)]
mod test {
    use statrs::assert_almost_eq;

    use super::Evaluator;
    use crate::common::{PropertyRestrictions, Risk, Sex, ValueMap};
    use crate::coordinators::{
        DiseaseStateAtom, NChooserCoordinator, ReferenceTrackingCoordinator, TargetCounts,
        TargetDemographics, TargetedDistribution, Targeting,
    };
    use crate::evaluation::{Agent, Population};
    use crate::interventions::{Intervention, MaleCircumcision};
    use crate::targeting::Predicate;

    fn circumcision() -> Intervention {
        Intervention::from(MaleCircumcision::new(0.6, true, None).unwrap())
    }

    /// 6000 males and 6000 females aged 0 to 59, a fifth of them HIV positive and
    /// a seventh of the males already circumcised.
    fn population() -> Population {
        let mut population = Population::new(2000.0, 30.0).unwrap();
        for i in 0..12_000u32 {
            let sex = if i % 2 == 0 { Sex::Male } else { Sex::Female };
            let mut agent = Agent::new(sex, f64::from(i % 60) + 0.5);
            agent.hiv_positive = i % 10 == 3 || i % 10 == 4;
            if sex == Sex::Male && i % 7 == 0 {
                agent.circumcised = true;
                agent.interventions.insert("MaleCircumcision".to_string());
            }
            population.add_agent(agent);
        }
        population
    }

    fn s1_coordinator() -> NChooserCoordinator {
        let distribution = TargetedDistribution::new(
            2010.0,
            2010.999_999,
            &[1.0, 15.0],
            &[14.999_999, 49.999_999],
            TargetCounts::by_sex(Some(vec![200, 1300]), Some(vec![0, 0])).unwrap(),
        )
        .unwrap()
        .with_disease_state(
            vec![vec![
                DiseaseStateAtom::HivNegative,
                DiseaseStateAtom::NotHaveIntervention,
            ]],
            Some("MaleCircumcision"),
        )
        .unwrap();
        NChooserCoordinator::new(vec![distribution], circumcision()).unwrap()
    }

    #[test]
    fn test_nchooser_single_year_circumcision() {
        let mut population = population();
        let before = population.clone();
        let mut evaluator = Evaluator::new(8_675_309, 1.0).unwrap();
        let report = evaluator.run_nchooser(&mut population, &s1_coordinator());

        assert_eq!(report.total(), 1500);
        let window = &report.windows[0];
        assert_eq!(window.steps, 12);
        assert_eq!(window.distributed, vec![200, 0, 1300, 0]);
        assert_eq!(window.shortfall, 0);
        for id in &window.recipients {
            let was = before.agent(*id).unwrap();
            assert_eq!(was.sex, Sex::Male);
            assert!(!was.hiv_positive);
            assert!(!was.interventions.contains("MaleCircumcision"));
            assert!(population.agent(*id).unwrap().circumcised);
        }
        let mut unique = window.recipients.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 1500);
    }

    #[test]
    fn test_nchooser_scaled_population() {
        let mut population = population();
        let mut evaluator = Evaluator::new(1, 0.5).unwrap();
        let report = evaluator.run_nchooser(&mut population, &s1_coordinator());
        assert_eq!(report.total(), 750);
        assert_eq!(report.windows[0].distributed, vec![100, 0, 650, 0]);
    }

    #[test]
    fn test_nchooser_cumulative_matches_rounded_target() {
        for x in [0.13, 0.5, 0.77, 1.0] {
            let distribution = TargetedDistribution::new(
                2001.0,
                2001.999_999,
                &[15.0, 25.0, 35.0],
                &[25.0, 35.0, 45.0],
                TargetCounts::Total(vec![41, 17, 9]),
            )
            .unwrap();
            let coordinator = NChooserCoordinator::new(vec![distribution], circumcision()).unwrap();
            let mut population = population();
            let report = Evaluator::new(3, x)
                .unwrap()
                .run_nchooser(&mut population, &coordinator);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let expected = (67.0 * x).round() as u32;
            assert_eq!(report.total(), expected, "x = {x}");
        }
    }

    #[test]
    fn test_nchooser_records_shortfall() {
        let distribution = TargetedDistribution::new(
            2001.0,
            2002.0,
            &[59.0],
            &[60.0],
            TargetCounts::by_sex(Some(vec![500]), None).unwrap(),
        )
        .unwrap();
        let coordinator = NChooserCoordinator::new(vec![distribution], circumcision()).unwrap();
        let mut population = population();
        let report = Evaluator::new(3, 1.0)
            .unwrap()
            .run_nchooser(&mut population, &coordinator);
        let window = &report.windows[0];
        assert_eq!(window.distributed[0] + window.shortfall, 500);
        assert!(window.shortfall > 0);
    }

    fn medium_risk_males() -> Targeting {
        Targeting {
            demographics: TargetDemographics::everyone().with_gender(Sex::Male),
            property_restrictions: PropertyRestrictions::new(),
            predicate: Some(Predicate::has_ip("Risk:MEDIUM").unwrap()),
        }
    }

    fn risk_population() -> Population {
        let mut population = Population::new(1960.0, 30.0).unwrap();
        for i in 0..900u32 {
            let sex = if i % 3 == 0 { Sex::Female } else { Sex::Male };
            let risk = [Risk::Low, Risk::Medium, Risk::High][(i % 5 % 3) as usize];
            let mut agent = Agent::new(sex, 20.0)
                .with_property(&format!("Risk:{}", risk.as_str()))
                .unwrap();
            agent.circumcised = sex == Sex::Male && i % 11 == 0;
            population.add_agent(agent);
        }
        population
    }

    #[test]
    fn test_reference_tracking_reaches_desired() {
        let map = ValueMap::from_pairs(&[
            (1960.0, 0.25),
            (1961.0, 0.375),
            (1962.0, 0.4),
            (1963.0, 0.4375),
            (1964.0, 0.46875),
        ])
        .unwrap();
        let coordinator = ReferenceTrackingCoordinator::new(
            vec![circumcision()],
            map,
            Predicate::is_circumcised(),
            medium_risk_males(),
            1960.0,
            1965.0,
            182.0,
        )
        .unwrap();
        let mut population = risk_population();
        let report = Evaluator::new(42, 1.0)
            .unwrap()
            .run_reference_tracking(&mut population, &coordinator);

        assert_eq!(report.ticks.len(), 11);
        assert!(report.warnings.is_empty());
        let mut previous = 0.0;
        for tick in &report.ticks {
            assert!(tick.denominator > 0);
            assert!(tick.fraction_after >= tick.desired - 1e-12, "{tick:?}");
            assert!(tick.fraction_after >= previous);
            previous = tick.fraction_after;
        }
        // Only medium-risk males were circumcised by the coordinator.
        for (_, agent) in population.agents() {
            if agent.interventions.contains("MaleCircumcision") {
                assert_eq!(agent.sex, Sex::Male);
                assert_eq!(agent.properties["Risk"], "MEDIUM");
            }
        }
    }

    #[test]
    fn test_reference_tracking_constant_target() {
        let coordinator = ReferenceTrackingCoordinator::new(
            vec![circumcision()],
            ValueMap::from_pairs(&[(1960.0, 0.6)]).unwrap(),
            Predicate::is_circumcised(),
            medium_risk_males(),
            1960.0,
            1962.0,
            365.0,
        )
        .unwrap();
        let mut population = risk_population();
        let report = Evaluator::new(5, 1.0)
            .unwrap()
            .run_reference_tracking(&mut population, &coordinator);
        let first = report.ticks[0];
        assert!(first.distributed > 0);
        assert!(first.fraction_after >= 0.6 && first.fraction_after <= 1.0);
        for tick in &report.ticks[1..] {
            assert_eq!(tick.distributed, 0);
            assert!(tick.fraction_after >= 0.6);
        }
    }

    #[test]
    fn test_reference_tracking_empty_denominator_warns() {
        let targeting = Targeting {
            predicate: Some(Predicate::has_ip("Risk:NONE").unwrap()),
            ..medium_risk_males()
        };
        let coordinator = ReferenceTrackingCoordinator::new(
            vec![circumcision()],
            ValueMap::from_pairs(&[(1960.0, 0.5)]).unwrap(),
            Predicate::is_circumcised(),
            targeting,
            1960.0,
            1961.0,
            365.0,
        )
        .unwrap();
        let mut population = risk_population();
        let report = Evaluator::new(5, 1.0)
            .unwrap()
            .run_reference_tracking(&mut population, &coordinator);
        assert_eq!(report.ticks.len(), 2);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.ticks.iter().all(|t| t.distributed == 0));
    }

    /// 1000 males aged 20, every other one without access to services.
    fn access_population() -> Population {
        let mut population = Population::new(2000.0, 30.0).unwrap();
        for i in 0..1000u32 {
            let access = if i % 2 == 0 { "Access:Yes" } else { "Access:No" };
            population.add_agent(Agent::new(Sex::Male, 20.0).with_property(access).unwrap());
        }
        population
    }

    fn access_only_circumcision() -> Intervention {
        circumcision()
            .with_disqualifying_properties(["Access:No"])
            .unwrap()
    }

    fn young_adults(target: u32, intervention: Intervention) -> NChooserCoordinator {
        let distribution = TargetedDistribution::new(
            2001.0,
            2001.999_999,
            &[15.0],
            &[25.0],
            TargetCounts::Total(vec![target]),
        )
        .unwrap();
        NChooserCoordinator::new(vec![distribution], intervention).unwrap()
    }

    #[test]
    fn test_nchooser_draws_only_willing_recipients() {
        let mut population = access_population();
        let coordinator = young_adults(100, access_only_circumcision());
        let report = Evaluator::new(11, 1.0)
            .unwrap()
            .run_nchooser(&mut population, &coordinator);
        let window = &report.windows[0];
        assert_eq!(window.distributed, vec![100]);
        assert_eq!(window.shortfall, 0);
        for id in &window.recipients {
            let agent = population.agent(*id).unwrap();
            assert_eq!(agent.properties["Access"], "Yes");
            assert!(agent.circumcised);
        }
    }

    #[test]
    fn test_nchooser_skips_duplicate_holders() {
        let mut population = access_population();
        for id in population.ids().collect::<Vec<_>>() {
            if id.0 % 4 != 0 {
                let agent = population.agent_mut(id).unwrap();
                agent.interventions.insert("MaleCircumcision".to_string());
            }
        }
        let coordinator = young_adults(300, circumcision().with_dont_allow_duplicates(true));
        let report = Evaluator::new(12, 1.0)
            .unwrap()
            .run_nchooser(&mut population, &coordinator);
        let window = &report.windows[0];
        assert_eq!(window.distributed, vec![250]);
        assert_eq!(window.shortfall, 50);
        assert!(window.recipients.iter().all(|id| id.0 % 4 == 0));
    }

    #[test]
    fn test_nchooser_shortfall_counts_refusals() {
        let mut population = access_population();
        let coordinator = young_adults(600, access_only_circumcision());
        let report = Evaluator::new(13, 1.0)
            .unwrap()
            .run_nchooser(&mut population, &coordinator);
        let window = &report.windows[0];
        assert_eq!(window.distributed, vec![500]);
        assert_eq!(window.distributed[0] + window.shortfall, 600);
    }

    fn track_access_circumcision(desired: f64) -> ReferenceTrackingCoordinator {
        ReferenceTrackingCoordinator::new(
            vec![access_only_circumcision()],
            ValueMap::from_pairs(&[(2000.0, desired)]).unwrap(),
            Predicate::is_circumcised(),
            Targeting {
                demographics: TargetDemographics::everyone().with_gender(Sex::Male),
                property_restrictions: PropertyRestrictions::new(),
                predicate: None,
            },
            2000.0,
            2000.5,
            365.0,
        )
        .unwrap()
    }

    #[test]
    fn test_reference_tracking_counts_only_accepted() {
        let mut population = access_population();
        let report = Evaluator::new(21, 1.0)
            .unwrap()
            .run_reference_tracking(&mut population, &track_access_circumcision(0.4));
        assert_eq!(report.ticks.len(), 1);
        let tick = report.ticks[0];
        assert_eq!(tick.distributed, 400);
        assert_almost_eq!(tick.fraction_after, 0.4, 1e-12);
        assert!(report.warnings.is_empty());
        let received = population
            .agents()
            .filter(|(_, agent)| agent.circumcised)
            .count();
        assert_eq!(received, tick.distributed);
    }

    #[test]
    fn test_reference_tracking_warns_when_acceptors_run_out() {
        let mut population = access_population();
        let report = Evaluator::new(22, 1.0)
            .unwrap()
            .run_reference_tracking(&mut population, &track_access_circumcision(0.7));
        let tick = report.ticks[0];
        assert_eq!(tick.distributed, 500);
        assert_almost_eq!(tick.fraction_after, 0.5, 1e-12);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        assert!(Evaluator::new(0, 0.0).is_err());
    }
}
