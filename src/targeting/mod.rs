//! A side-effect free boolean language over per-agent attributes used to pick
//! who is eligible for an intervention.
//!
//! Predicates are built from leaf conditions and combined with `&`, `|` and `!`
//! (or [`Predicate::all`], [`Predicate::any`]). They serialize to the
//! simulator's targeting-config form, see [`Predicate::to_json`].

mod canonical;
pub mod enums;
mod evaluate;

use std::ops::{BitAnd, BitOr, Not};

pub use canonical::{Conjunction, Literal};
pub use enums::{
    MoreOrLess, NumMonthsType, OfRelationshipType, RecentlyType, RelationshipTerminationReasonType,
    YesNoNa,
};

use crate::common::parse_key_value;
use crate::error::{check_range, AuthoringError, Warning};

/// Largest partner count the simulator tracks per agent.
pub const MAX_NUM_PARTNERS: f64 = 62.0;

/// Test-history requirements attached to [`Condition::IsHivPositive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestHistory {
    pub has_ever_been_tested: YesNoNa,
    pub has_ever_tested_positive: YesNoNa,
    pub has_received_positive_results: YesNoNa,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HasRelationship {
    pub of_relationship_type: OfRelationshipType,
    pub that_recently: RecentlyType,
    pub that_recently_ended_due_to: RelationshipTerminationReasonType,
    pub with_partner_who: Option<Box<Predicate>>,
}

/// The attribute a leaf reads.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    IsCircumcised,
    IsHivPositive(TestHistory),
    IsOnArt,
    IsPostDebut,
    IsPregnant,
    HasBeenOnArtMoreOrLessThanNumMonths {
        num_months: f64,
        more_or_less: MoreOrLess,
    },
    HasMoreOrLessThanNumPartners {
        num_partners: f64,
        more_or_less: MoreOrLess,
        of_relationship_type: OfRelationshipType,
    },
    HasHadMultiplePartnersInLastNumMonths {
        num_months: NumMonthsType,
        of_relationship_type: OfRelationshipType,
    },
    HasCd4BetweenMinAndMax {
        min_cd4: f64,
        max_cd4: f64,
    },
    HasIp {
        key: String,
        value: String,
    },
    HasIntervention {
        name: String,
    },
    HasRelationship(HasRelationship),
}

impl Condition {
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            Condition::IsCircumcised => "IsCircumcised",
            Condition::IsHivPositive(_) => "IsHivPositive",
            Condition::IsOnArt => "IsOnART",
            Condition::IsPostDebut => "IsPostDebut",
            Condition::IsPregnant => "IsPregnant",
            Condition::HasBeenOnArtMoreOrLessThanNumMonths { .. } => {
                "HasBeenOnArtMoreOrLessThanNumMonths"
            }
            Condition::HasMoreOrLessThanNumPartners { .. } => "HasMoreOrLessThanNumPartners",
            Condition::HasHadMultiplePartnersInLastNumMonths { .. } => {
                "HasHadMultiplePartnersInLastNumMonths"
            }
            Condition::HasCd4BetweenMinAndMax { .. } => "HasCd4BetweenMinAndMax",
            Condition::HasIp { .. } => "HasIP",
            Condition::HasIntervention { .. } => "HasIntervention",
            Condition::HasRelationship(_) => "HasRelationship",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Leaf {
        condition: Condition,
        is_equal_to: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    fn leaf(condition: Condition) -> Self {
        Predicate::Leaf {
            condition,
            is_equal_to: true,
        }
    }

    #[must_use]
    pub fn is_circumcised() -> Self {
        Self::leaf(Condition::IsCircumcised)
    }

    #[must_use]
    pub fn is_hiv_positive() -> Self {
        Self::leaf(Condition::IsHivPositive(TestHistory::default()))
    }

    /// HIV positive with requirements on the agent's testing history.
    #[must_use]
    pub fn is_hiv_positive_with(history: TestHistory) -> Self {
        Self::leaf(Condition::IsHivPositive(history))
    }

    #[must_use]
    pub fn is_on_art() -> Self {
        Self::leaf(Condition::IsOnArt)
    }

    #[must_use]
    pub fn is_post_debut() -> Self {
        Self::leaf(Condition::IsPostDebut)
    }

    #[must_use]
    pub fn is_pregnant() -> Self {
        Self::leaf(Condition::IsPregnant)
    }

    /// # Errors
    /// If `num_months` is negative.
    pub fn has_been_on_art_more_or_less_than_num_months(
        num_months: f64,
        more_or_less: MoreOrLess,
    ) -> Result<Self, AuthoringError> {
        check_range("Num_Months", num_months, 0.0, f64::MAX)?;
        Ok(Self::leaf(Condition::HasBeenOnArtMoreOrLessThanNumMonths {
            num_months,
            more_or_less,
        }))
    }

    /// # Errors
    /// If `num_partners` is outside of `[0, 62]`.
    pub fn has_more_or_less_than_num_partners(
        num_partners: f64,
        more_or_less: MoreOrLess,
        of_relationship_type: OfRelationshipType,
    ) -> Result<Self, AuthoringError> {
        check_range("Num_Partners", num_partners, 0.0, MAX_NUM_PARTNERS)?;
        Ok(Self::leaf(Condition::HasMoreOrLessThanNumPartners {
            num_partners,
            more_or_less,
            of_relationship_type,
        }))
    }

    #[must_use]
    pub fn has_had_multiple_partners_in_last_num_months(
        num_months: NumMonthsType,
        of_relationship_type: OfRelationshipType,
    ) -> Self {
        Self::leaf(Condition::HasHadMultiplePartnersInLastNumMonths {
            num_months,
            of_relationship_type,
        })
    }

    /// Agents whose CD4 count lies in `[min_cd4, max_cd4)`.
    ///
    /// # Errors
    /// - If either bound is negative
    /// - If `min_cd4 >= max_cd4`
    pub fn has_cd4_between_min_and_max(min_cd4: f64, max_cd4: f64) -> Result<Self, AuthoringError> {
        check_range("Min_CD4", min_cd4, 0.0, f64::MAX)?;
        check_range("Max_CD4", max_cd4, 0.0, f64::MAX)?;
        if min_cd4 >= max_cd4 {
            return Err(AuthoringError::configuration(format!(
                "Min_CD4 ({min_cd4}) must be less than Max_CD4 ({max_cd4})"
            )));
        }
        Ok(Self::leaf(Condition::HasCd4BetweenMinAndMax { min_cd4, max_cd4 }))
    }

    /// Agents carrying an individual property value, given as `"Key:Value"`.
    ///
    /// # Errors
    /// If `key_value` is not of the form `Key:Value`.
    pub fn has_ip(key_value: &str) -> Result<Self, AuthoringError> {
        let (key, value) = parse_key_value(key_value)?;
        Ok(Self::leaf(Condition::HasIp { key, value }))
    }

    /// # Errors
    /// If `name` is empty.
    pub fn has_intervention(name: &str) -> Result<Self, AuthoringError> {
        if name.trim().is_empty() {
            return Err(AuthoringError::configuration(
                "HasIntervention requires a non-empty intervention name",
            ));
        }
        Ok(Self::leaf(Condition::HasIntervention {
            name: name.to_string(),
        }))
    }

    /// Starts a `HasRelationship` leaf. At least one of its parameters must be set
    /// before [`HasRelationshipBuilder::build`].
    #[must_use]
    pub fn has_relationship() -> HasRelationshipBuilder {
        HasRelationshipBuilder::default()
    }

    /// Conjunction of `predicates`. Nested conjunctions are flattened.
    ///
    /// # Errors
    /// If `predicates` is empty.
    pub fn all(predicates: Vec<Predicate>) -> Result<Self, AuthoringError> {
        Self::combine(predicates, true)
    }

    /// Disjunction of `predicates`. Nested disjunctions are flattened.
    ///
    /// # Errors
    /// If `predicates` is empty.
    pub fn any(predicates: Vec<Predicate>) -> Result<Self, AuthoringError> {
        Self::combine(predicates, false)
    }

    fn combine(predicates: Vec<Predicate>, conjunction: bool) -> Result<Self, AuthoringError> {
        if predicates.is_empty() {
            return Err(AuthoringError::configuration(format!(
                "{} requires at least one predicate",
                if conjunction { "AND" } else { "OR" }
            )));
        }
        Ok(Self::flatten(predicates, conjunction))
    }

    fn flatten(predicates: Vec<Predicate>, conjunction: bool) -> Self {
        let mut flattened = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            match (predicate, conjunction) {
                (Predicate::And(children), true) | (Predicate::Or(children), false) => {
                    flattened.extend(children);
                }
                (other, _) => flattened.push(other),
            }
        }
        if flattened.len() == 1 {
            return flattened.remove(0);
        }
        if conjunction {
            Predicate::And(flattened)
        } else {
            Predicate::Or(flattened)
        }
    }

    /// Soft notices about this predicate: a `HasRelationship` nested inside a
    /// `With_Partner_Who` interrogates friend-of-friend structure.
    #[must_use]
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        self.collect_warnings(0, &mut warnings);
        warnings
    }

    fn collect_warnings(&self, partner_depth: usize, warnings: &mut Vec<Warning>) {
        match self {
            Predicate::Leaf {
                condition: Condition::HasRelationship(relationship),
                ..
            } => {
                if partner_depth > 0 {
                    warnings.push(Warning::new(
                        "HasRelationship",
                        "a HasRelationship inside With_Partner_Who targets the partners of partners",
                    ));
                }
                if let Some(partner) = &relationship.with_partner_who {
                    partner.collect_warnings(partner_depth + 1, warnings);
                }
            }
            Predicate::Leaf { .. } => {}
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_warnings(partner_depth, warnings);
                }
            }
            Predicate::Not(inner) => inner.collect_warnings(partner_depth, warnings),
        }
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        Predicate::flatten(vec![self, rhs], true)
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        Predicate::flatten(vec![self, rhs], false)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        match self {
            Predicate::Leaf {
                condition,
                is_equal_to,
            } => Predicate::Leaf {
                condition,
                is_equal_to: !is_equal_to,
            },
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HasRelationshipBuilder {
    of_relationship_type: OfRelationshipType,
    that_recently: RecentlyType,
    that_recently_ended_due_to: RelationshipTerminationReasonType,
    with_partner_who: Option<Predicate>,
}

impl HasRelationshipBuilder {
    #[must_use]
    pub fn of_relationship_type(mut self, of_relationship_type: OfRelationshipType) -> Self {
        self.of_relationship_type = of_relationship_type;
        self
    }

    #[must_use]
    pub fn that_recently(mut self, that_recently: RecentlyType) -> Self {
        self.that_recently = that_recently;
        self
    }

    #[must_use]
    pub fn that_recently_ended_due_to(mut self, reason: RelationshipTerminationReasonType) -> Self {
        self.that_recently_ended_due_to = reason;
        self
    }

    #[must_use]
    pub fn with_partner_who(mut self, partner: Predicate) -> Self {
        self.with_partner_who = Some(partner);
        self
    }

    /// # Errors
    /// - If every parameter is left at its default, since the leaf would match anyone
    ///   with a relationship
    /// - If a termination reason is given without `that_recently = ENDED`
    pub fn build(self) -> Result<Predicate, AuthoringError> {
        if self.of_relationship_type == OfRelationshipType::Na
            && self.that_recently == RecentlyType::Na
            && self.that_recently_ended_due_to == RelationshipTerminationReasonType::Na
            && self.with_partner_who.is_none()
        {
            return Err(AuthoringError::configuration(
                "HasRelationship needs at least one of of_relationship_type, that_recently, \
                 that_recently_ended_due_to or with_partner_who",
            ));
        }
        if self.that_recently_ended_due_to != RelationshipTerminationReasonType::Na
            && self.that_recently != RecentlyType::Ended
        {
            return Err(AuthoringError::configuration(format!(
                "That_Recently_Ended_Due_To = {} requires That_Recently = ENDED, got {}",
                self.that_recently_ended_due_to.as_str(),
                self.that_recently.as_str()
            )));
        }
        Ok(Predicate::leaf(Condition::HasRelationship(HasRelationship {
            of_relationship_type: self.of_relationship_type,
            that_recently: self.that_recently,
            that_recently_ended_due_to: self.that_recently_ended_due_to,
            with_partner_who: self.with_partner_who.map(Box::new),
        })))
    }
}
