use serde_json::{json, Map, Value};

use super::{Condition, Predicate};

/// A leaf after negations have been pushed down: a condition and the value it must equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub condition: Condition,
    pub is_equal_to: bool,
}

pub type Conjunction = Vec<Literal>;

impl Predicate {
    /// Disjunctive normal form: the predicate holds when every literal of at least one
    /// conjunction holds. `NOT` is pushed to the leaves by De Morgan's laws, so double
    /// negation cancels.
    #[must_use]
    pub fn to_dnf(&self) -> Vec<Conjunction> {
        dnf(self, false)
    }

    /// Serializes to the simulator's targeting-config form. A single leaf is written as
    /// the leaf object itself; anything else becomes a `TargetingLogic` whose `Logic`
    /// is the disjunctive normal form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let dnf = self.to_dnf();
        if let [conjunction] = dnf.as_slice() {
            if let [literal] = conjunction.as_slice() {
                return literal.to_json();
            }
        }
        let logic: Vec<Value> = dnf
            .iter()
            .map(|conjunction| Value::Array(conjunction.iter().map(Literal::to_json).collect()))
            .collect();
        json!({
            "class": "TargetingLogic",
            "Is_Equal_To": 1,
            "Logic": logic,
        })
    }
}

fn dnf(predicate: &Predicate, negated: bool) -> Vec<Conjunction> {
    match predicate {
        Predicate::Leaf {
            condition,
            is_equal_to,
        } => vec![vec![Literal {
            condition: condition.clone(),
            is_equal_to: *is_equal_to != negated,
        }]],
        Predicate::Not(inner) => dnf(inner, !negated),
        Predicate::And(children) if !negated => cross(children, negated),
        Predicate::Or(children) if negated => cross(children, negated),
        Predicate::And(children) | Predicate::Or(children) => children
            .iter()
            .flat_map(|child| dnf(child, negated))
            .collect(),
    }
}

/// Distributes a conjunction over its children's disjunctions.
fn cross(children: &[Predicate], negated: bool) -> Vec<Conjunction> {
    let mut result: Vec<Conjunction> = vec![Vec::new()];
    for child in children {
        let child_dnf = dnf(child, negated);
        let mut next = Vec::with_capacity(result.len() * child_dnf.len());
        for prefix in &result {
            for conjunction in &child_dnf {
                let mut combined = prefix.clone();
                for literal in conjunction {
                    if !combined.contains(literal) {
                        combined.push(literal.clone());
                    }
                }
                next.push(combined);
            }
        }
        result = next;
    }
    result
}

impl Literal {
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("class".to_string(), self.condition.class_name().into());
        object.insert("Is_Equal_To".to_string(), u8::from(self.is_equal_to).into());
        match &self.condition {
            Condition::IsCircumcised
            | Condition::IsOnArt
            | Condition::IsPostDebut
            | Condition::IsPregnant => {}
            Condition::IsHivPositive(history) => {
                object.insert(
                    "And_Has_Ever_Been_Tested".to_string(),
                    history.has_ever_been_tested.as_str().into(),
                );
                object.insert(
                    "And_Has_Ever_Tested_Positive".to_string(),
                    history.has_ever_tested_positive.as_str().into(),
                );
                object.insert(
                    "And_Has_Received_Positive_Results".to_string(),
                    history.has_received_positive_results.as_str().into(),
                );
            }
            Condition::HasBeenOnArtMoreOrLessThanNumMonths {
                num_months,
                more_or_less,
            } => {
                object.insert("Num_Months".to_string(), (*num_months).into());
                object.insert("More_Or_Less".to_string(), more_or_less.as_str().into());
            }
            Condition::HasMoreOrLessThanNumPartners {
                num_partners,
                more_or_less,
                of_relationship_type,
            } => {
                object.insert("Num_Partners".to_string(), (*num_partners).into());
                object.insert("More_Or_Less".to_string(), more_or_less.as_str().into());
                object.insert(
                    "Of_Relationship_Type".to_string(),
                    of_relationship_type.as_str().into(),
                );
            }
            Condition::HasHadMultiplePartnersInLastNumMonths {
                num_months,
                of_relationship_type,
            } => {
                object.insert("Num_Months_Type".to_string(), num_months.as_str().into());
                object.insert(
                    "Of_Relationship_Type".to_string(),
                    of_relationship_type.as_str().into(),
                );
            }
            Condition::HasCd4BetweenMinAndMax { min_cd4, max_cd4 } => {
                object.insert("Min_CD4".to_string(), (*min_cd4).into());
                object.insert("Max_CD4".to_string(), (*max_cd4).into());
            }
            Condition::HasIp { key, value } => {
                object.insert("IP_Key_Value".to_string(), format!("{key}:{value}").into());
            }
            Condition::HasIntervention { name } => {
                object.insert("Intervention_Name".to_string(), name.clone().into());
            }
            Condition::HasRelationship(relationship) => {
                object.insert(
                    "Of_Relationship_Type".to_string(),
                    relationship.of_relationship_type.as_str().into(),
                );
                object.insert(
                    "That_Recently".to_string(),
                    relationship.that_recently.as_str().into(),
                );
                object.insert(
                    "That_Recently_Ended_Due_To".to_string(),
                    relationship.that_recently_ended_due_to.as_str().into(),
                );
                if let Some(partner) = &relationship.with_partner_who {
                    object.insert("With_Partner_Who".to_string(), partner.to_json());
                }
            }
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::targeting::{
        OfRelationshipType, Predicate, RecentlyType, RelationshipTerminationReasonType,
    };

    #[test]
    fn test_single_leaf_serializes_bare() {
        assert_eq!(
            Predicate::is_circumcised().to_json(),
            json!({"class": "IsCircumcised", "Is_Equal_To": 1})
        );
        assert_eq!(
            (!Predicate::is_circumcised()).to_json(),
            json!({"class": "IsCircumcised", "Is_Equal_To": 0})
        );
    }

    #[test]
    fn test_double_negation_is_a_no_op() {
        let p = Predicate::is_on_art() | (Predicate::is_pregnant() & !Predicate::is_post_debut());
        let doubled = Predicate::Not(Box::new(Predicate::Not(Box::new(p.clone()))));
        assert_eq!(doubled.to_json(), p.to_json());
        let leaf = Predicate::has_ip("Risk:HIGH").unwrap();
        assert_eq!((!!leaf.clone()).to_json(), leaf.to_json());
    }

    #[test]
    fn test_de_morgan() {
        let p = !(Predicate::is_on_art() & Predicate::is_pregnant());
        assert_eq!(
            p.to_json(),
            json!({
                "class": "TargetingLogic",
                "Is_Equal_To": 1,
                "Logic": [
                    [{"class": "IsOnART", "Is_Equal_To": 0}],
                    [{"class": "IsPregnant", "Is_Equal_To": 0}]
                ]
            })
        );
    }

    #[test]
    fn test_and_distributes_over_or() {
        let a = Predicate::is_on_art();
        let b = Predicate::is_pregnant();
        let c = Predicate::is_circumcised();
        let lhs = a.clone() & (b.clone() | c.clone());
        let rhs = (a.clone() & b) | (a & c);
        assert_eq!(lhs.to_json(), rhs.to_json());
        assert_eq!(lhs.to_dnf().len(), 2);
    }

    #[test]
    fn test_has_relationship_with_partner_who() {
        let p = Predicate::has_relationship()
            .of_relationship_type(OfRelationshipType::Transitory)
            .that_recently(RecentlyType::Ended)
            .that_recently_ended_due_to(RelationshipTerminationReasonType::PartnerDied)
            .with_partner_who(Predicate::is_hiv_positive() & Predicate::is_on_art())
            .build()
            .unwrap();
        assert_eq!(
            p.to_json(),
            json!({
                "class": "HasRelationship",
                "Is_Equal_To": 1,
                "Of_Relationship_Type": "TRANSITORY",
                "That_Recently": "ENDED",
                "That_Recently_Ended_Due_To": "PARTNER_DIED",
                "With_Partner_Who": {
                    "class": "TargetingLogic",
                    "Is_Equal_To": 1,
                    "Logic": [[
                        {
                            "class": "IsHivPositive",
                            "Is_Equal_To": 1,
                            "And_Has_Ever_Been_Tested": "NA",
                            "And_Has_Ever_Tested_Positive": "NA",
                            "And_Has_Received_Positive_Results": "NA"
                        },
                        {"class": "IsOnART", "Is_Equal_To": 1}
                    ]]
                }
            })
        );
    }

    #[test]
    fn test_duplicate_literals_collapse() {
        let p = Predicate::is_on_art() & Predicate::is_on_art();
        assert_eq!(p.to_json(), json!({"class": "IsOnART", "Is_Equal_To": 1}));
    }

    #[test]
    fn test_parameterized_leaves() {
        let p = Predicate::has_cd4_between_min_and_max(0.0, 350.0).unwrap();
        assert_eq!(
            p.to_json(),
            json!({"class": "HasCd4BetweenMinAndMax", "Is_Equal_To": 1, "Min_CD4": 0.0, "Max_CD4": 350.0})
        );
        let p = Predicate::has_intervention("MaleCircumcision").unwrap();
        assert_eq!(
            p.to_json(),
            json!({"class": "HasIntervention", "Is_Equal_To": 1, "Intervention_Name": "MaleCircumcision"})
        );
    }
}
