use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthoringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Transitory,
    Informal,
    Marital,
    Commercial,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 4] = [
        RelationshipType::Transitory,
        RelationshipType::Informal,
        RelationshipType::Marital,
        RelationshipType::Commercial,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::Transitory => "TRANSITORY",
            RelationshipType::Informal => "INFORMAL",
            RelationshipType::Marital => "MARITAL",
            RelationshipType::Commercial => "COMMERCIAL",
        }
    }
}

/// Values of the conventional `Risk` individual property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    pub const ALL: [Risk; 3] = [Risk::Low, Risk::Medium, Risk::High];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Risk::Low => "LOW",
            Risk::Medium => "MEDIUM",
            Risk::High => "HIGH",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Splits a `"Key:Value"` restriction into its parts.
///
/// # Errors
/// If the string has no `:` separator or either side is empty.
pub fn parse_key_value(key_value: &str) -> Result<(String, String), AuthoringError> {
    match key_value.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(AuthoringError::configuration(format!(
            "property restriction '{key_value}' must have the form 'Key:Value'"
        ))),
    }
}

type Conjunction = IndexMap<String, String>;

/// Individual and node property restrictions in disjunctive normal form: an agent
/// matches when it carries every key/value of at least one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyRestrictions {
    individual: Vec<Conjunction>,
    node: Vec<Conjunction>,
}

fn conjunction<I, S>(key_values: I) -> Result<Conjunction, AuthoringError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut group = Conjunction::new();
    for key_value in key_values {
        let (key, value) = parse_key_value(key_value.as_ref())?;
        if let Some(previous) = group.insert(key.clone(), value.clone()) {
            return Err(AuthoringError::configuration(format!(
                "property '{key}' is restricted to both '{previous}' and '{value}' in the same group"
            )));
        }
    }
    if group.is_empty() {
        return Err(AuthoringError::configuration(
            "a property restriction group must not be empty",
        ));
    }
    Ok(group)
}

impl PropertyRestrictions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Individuals must carry every one of `key_values`, e.g. `["Risk:HIGH", "Accessibility:Yes"]`.
    pub fn all_of<I, S>(key_values: I) -> Result<Self, AuthoringError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new().or_all_of(key_values)
    }

    /// Adds an alternative group of individual restrictions.
    pub fn or_all_of<I, S>(mut self, key_values: I) -> Result<Self, AuthoringError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.individual.push(conjunction(key_values)?);
        Ok(self)
    }

    /// Adds an alternative group of node property restrictions.
    pub fn or_node_all_of<I, S>(mut self, key_values: I) -> Result<Self, AuthoringError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.node.push(conjunction(key_values)?);
        Ok(self)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.individual.is_empty() && self.node.is_empty()
    }

    #[must_use]
    pub fn has_node_restrictions(&self) -> bool {
        !self.node.is_empty()
    }

    /// Every individual property key referenced.
    pub fn individual_keys(&self) -> impl Iterator<Item = &str> {
        self.individual.iter().flat_map(|g| g.keys().map(String::as_str))
    }

    /// Whether an agent carrying `properties` passes the individual restrictions.
    #[must_use]
    pub fn matches(&self, properties: &IndexMap<String, String>) -> bool {
        self.individual.is_empty()
            || self.individual.iter().any(|group| {
                group
                    .iter()
                    .all(|(key, value)| properties.get(key) == Some(value))
            })
    }

    fn groups_to_json(groups: &[Conjunction]) -> Value {
        Value::Array(
            groups
                .iter()
                .map(|g| {
                    Value::Object(
                        g.iter()
                            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn individual_json(&self) -> Value {
        Self::groups_to_json(&self.individual)
    }

    /// Writes `Property_Restrictions_Within_Node` and `Node_Property_Restrictions`.
    /// The individual list is always written since the simulator expects it.
    pub fn write_fields(&self, object: &mut Map<String, Value>) {
        object.insert(
            "Property_Restrictions_Within_Node".to_string(),
            self.individual_json(),
        );
        if !self.node.is_empty() {
            object.insert(
                "Node_Property_Restrictions".to_string(),
                Self::groups_to_json(&self.node),
            );
        }
    }
}

#[cfg(test)]
mod test {
    use indexmap::IndexMap;
    use serde_json::{json, Map, Value};

    use super::{parse_key_value, PropertyRestrictions, RelationshipType, Risk};

    fn properties(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("Risk:HIGH").unwrap(),
            ("Risk".to_string(), "HIGH".to_string())
        );
        assert!(parse_key_value("RiskHIGH").is_err());
        assert!(parse_key_value("Risk:").is_err());
    }

    #[test]
    fn test_matches_dnf() {
        let restrictions = PropertyRestrictions::all_of(["Risk:HIGH", "Accessibility:Yes"])
            .unwrap()
            .or_all_of(["Risk:MEDIUM"])
            .unwrap();
        assert!(restrictions.matches(&properties(&[("Risk", "HIGH"), ("Accessibility", "Yes")])));
        assert!(!restrictions.matches(&properties(&[("Risk", "HIGH"), ("Accessibility", "No")])));
        assert!(restrictions.matches(&properties(&[("Risk", "MEDIUM")])));
        assert!(PropertyRestrictions::new().matches(&properties(&[])));
    }

    #[test]
    fn test_conflicting_values_in_group() {
        assert!(PropertyRestrictions::all_of(["Risk:HIGH", "Risk:LOW"]).is_err());
    }

    #[test]
    fn test_write_fields() {
        let restrictions = PropertyRestrictions::all_of(["Risk:LOW"])
            .unwrap()
            .or_node_all_of(["Place:Urban"])
            .unwrap();
        let mut object = Map::new();
        restrictions.write_fields(&mut object);
        assert_eq!(
            Value::Object(object),
            json!({
                "Property_Restrictions_Within_Node": [{"Risk": "LOW"}],
                "Node_Property_Restrictions": [{"Place": "Urban"}],
            })
        );
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(RelationshipType::Commercial.as_str(), "COMMERCIAL");
        assert_eq!(Risk::Medium.as_str(), "MEDIUM");
        assert_eq!(Risk::High.index(), 2);
    }
}
