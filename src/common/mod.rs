//! Value types shared by the campaign and demographics builders.

pub mod distributions;
pub mod events;
pub mod properties;
pub mod sigmoid;
pub mod value_map;
pub mod waning;

pub use distributions::Distribution;
pub use events::{is_built_in, BUILT_IN_EVENTS};
pub use properties::{parse_key_value, PropertyRestrictions, RelationshipType, Risk, Sex};
pub use sigmoid::Sigmoid;
pub use value_map::{Interpolation, ValueMap};
pub use waning::WaningEffect;
