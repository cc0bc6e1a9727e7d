use serde::{Deserialize, Serialize};

use crate::common::RelationshipType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum YesNoNa {
    Yes,
    No,
    #[default]
    Na,
}

impl YesNoNa {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            YesNoNa::Yes => "YES",
            YesNoNa::No => "NO",
            YesNoNa::Na => "NA",
        }
    }

    /// Whether a flag with value `flag` satisfies this requirement.
    #[must_use]
    pub fn admits(self, flag: bool) -> bool {
        match self {
            YesNoNa::Yes => flag,
            YesNoNa::No => !flag,
            YesNoNa::Na => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoreOrLess {
    Less,
    More,
}

impl MoreOrLess {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MoreOrLess::Less => "LESS",
            MoreOrLess::More => "MORE",
        }
    }

    /// Strict comparison of `value` against `threshold`.
    #[must_use]
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            MoreOrLess::Less => value < threshold,
            MoreOrLess::More => value > threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfRelationshipType {
    #[default]
    Na,
    Transitory,
    Informal,
    Marital,
    Commercial,
}

impl OfRelationshipType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OfRelationshipType::Na => "NA",
            OfRelationshipType::Transitory => "TRANSITORY",
            OfRelationshipType::Informal => "INFORMAL",
            OfRelationshipType::Marital => "MARITAL",
            OfRelationshipType::Commercial => "COMMERCIAL",
        }
    }

    #[must_use]
    pub fn admits(self, relationship_type: RelationshipType) -> bool {
        match self {
            OfRelationshipType::Na => true,
            OfRelationshipType::Transitory => relationship_type == RelationshipType::Transitory,
            OfRelationshipType::Informal => relationship_type == RelationshipType::Informal,
            OfRelationshipType::Marital => relationship_type == RelationshipType::Marital,
            OfRelationshipType::Commercial => relationship_type == RelationshipType::Commercial,
        }
    }
}

impl From<RelationshipType> for OfRelationshipType {
    fn from(value: RelationshipType) -> Self {
        match value {
            RelationshipType::Transitory => OfRelationshipType::Transitory,
            RelationshipType::Informal => OfRelationshipType::Informal,
            RelationshipType::Marital => OfRelationshipType::Marital,
            RelationshipType::Commercial => OfRelationshipType::Commercial,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumMonthsType {
    ThreeMonths,
    SixMonths,
    NineMonths,
    TwelveMonths,
}

impl NumMonthsType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NumMonthsType::ThreeMonths => "THREE_MONTHS",
            NumMonthsType::SixMonths => "SIX_MONTHS",
            NumMonthsType::NineMonths => "NINE_MONTHS",
            NumMonthsType::TwelveMonths => "TWELVE_MONTHS",
        }
    }

    #[must_use]
    pub fn months(self) -> u32 {
        match self {
            NumMonthsType::ThreeMonths => 3,
            NumMonthsType::SixMonths => 6,
            NumMonthsType::NineMonths => 9,
            NumMonthsType::TwelveMonths => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecentlyType {
    #[default]
    Na,
    Started,
    Ended,
}

impl RecentlyType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecentlyType::Na => "NA",
            RecentlyType::Started => "STARTED",
            RecentlyType::Ended => "ENDED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipTerminationReasonType {
    #[default]
    Na,
    BrokeUp,
    SelfMigrating,
    PartnerDied,
    PartnerTerminated,
    PartnerMigrating,
}

impl RelationshipTerminationReasonType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipTerminationReasonType::Na => "NA",
            RelationshipTerminationReasonType::BrokeUp => "BROKE_UP",
            RelationshipTerminationReasonType::SelfMigrating => "SELF_MIGRATING",
            RelationshipTerminationReasonType::PartnerDied => "PARTNER_DIED",
            RelationshipTerminationReasonType::PartnerTerminated => "PARTNER_TERMINATED",
            RelationshipTerminationReasonType::PartnerMigrating => "PARTNER_MIGRATING",
        }
    }
}

#[cfg(test)]
mod test {
    use super::{MoreOrLess, NumMonthsType, OfRelationshipType, YesNoNa};
    use crate::common::RelationshipType;

    #[test]
    fn test_yes_no_na_admits() {
        assert!(YesNoNa::Na.admits(false));
        assert!(YesNoNa::Yes.admits(true));
        assert!(!YesNoNa::Yes.admits(false));
        assert!(YesNoNa::No.admits(false));
    }

    #[test]
    fn test_more_or_less_is_strict() {
        assert!(MoreOrLess::More.compare(3.0, 2.0));
        assert!(!MoreOrLess::More.compare(2.0, 2.0));
        assert!(!MoreOrLess::Less.compare(2.0, 2.0));
    }

    #[test]
    fn test_of_relationship_type() {
        assert!(OfRelationshipType::Na.admits(RelationshipType::Commercial));
        assert!(!OfRelationshipType::Marital.admits(RelationshipType::Informal));
        assert_eq!(
            OfRelationshipType::from(RelationshipType::Informal).as_str(),
            "INFORMAL"
        );
    }

    #[test]
    fn test_num_months() {
        assert_eq!(NumMonthsType::NineMonths.months(), 9);
        assert_eq!(NumMonthsType::TwelveMonths.as_str(), "TWELVE_MONTHS");
    }
}
