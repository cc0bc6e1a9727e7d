// Re-export the types a modeler touches most at the crate root
pub use campaign::Campaign;
pub use common::{Distribution, PropertyRestrictions, RelationshipType, Risk, Sex, Sigmoid, ValueMap};
pub use coordinators::{
    CampaignEvent, Coordinator, NChooserCoordinator, ReferenceTrackingCoordinator,
    ScheduledCoordinator, Start, Targeting, TriggerTier, TriggeredCoordinator,
};
pub use demographics::{Demographics, IndividualProperty, Node};
pub use error::{AuthoringError, Warning};
pub use evaluation::{Agent, AgentId, Evaluator, Population};
pub use interventions::Intervention;
pub use parameters::Params;
pub use schema::Schema;
pub use targeting::Predicate;

// Module declarations
pub mod campaign;
pub mod common;
pub mod coordinators;
pub mod demographics;
pub mod error;
pub mod evaluation;
pub mod interventions;
pub mod parameters;
pub mod schema;
pub mod targeting;
pub mod utils;
