use serde_json::{json, Value};

use crate::common::ValueMap;
use crate::error::{check_non_negative, check_probability, AuthoringError};

/// How the effect of an intervention decays after it is received.
#[derive(Debug, Clone, PartialEq)]
pub enum WaningEffect {
    Constant {
        initial_effect: f64,
    },
    Box {
        initial_effect: f64,
        box_duration: f64,
    },
    Exponential {
        initial_effect: f64,
        decay_time_constant: f64,
    },
    BoxExponential {
        initial_effect: f64,
        box_duration: f64,
        decay_time_constant: f64,
    },
    /// Durability read from a map of days-since-distribution to multiplier,
    /// linearly interpolated.
    MapLinear {
        initial_effect: f64,
        durability_map: ValueMap,
        expire_at_durability_map_end: bool,
    },
    /// Same as `MapLinear` but read as a step function.
    MapPiecewise {
        initial_effect: f64,
        durability_map: ValueMap,
        expire_at_durability_map_end: bool,
    },
}

impl WaningEffect {
    /// # Errors
    /// - If the initial effect is outside of [0, 1]
    /// - If a duration or decay constant is negative
    /// - If a durability map holds a multiplier outside of [0, 1]
    pub fn validate(&self) -> Result<(), AuthoringError> {
        match self {
            WaningEffect::Constant { initial_effect } => {
                check_probability("Initial_Effect", *initial_effect)?;
            }
            WaningEffect::Box {
                initial_effect,
                box_duration,
            } => {
                check_probability("Initial_Effect", *initial_effect)?;
                check_non_negative("Box_Duration", *box_duration)?;
            }
            WaningEffect::Exponential {
                initial_effect,
                decay_time_constant,
            } => {
                check_probability("Initial_Effect", *initial_effect)?;
                check_non_negative("Decay_Time_Constant", *decay_time_constant)?;
            }
            WaningEffect::BoxExponential {
                initial_effect,
                box_duration,
                decay_time_constant,
            } => {
                check_probability("Initial_Effect", *initial_effect)?;
                check_non_negative("Box_Duration", *box_duration)?;
                check_non_negative("Decay_Time_Constant", *decay_time_constant)?;
            }
            WaningEffect::MapLinear {
                initial_effect,
                durability_map,
                ..
            }
            | WaningEffect::MapPiecewise {
                initial_effect,
                durability_map,
                ..
            } => {
                check_probability("Initial_Effect", *initial_effect)?;
                durability_map.check_values("Durability_Map", 0.0, 1.0)?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            WaningEffect::Constant { initial_effect } => json!({
                "class": "WaningEffectConstant",
                "Initial_Effect": initial_effect,
            }),
            WaningEffect::Box {
                initial_effect,
                box_duration,
            } => json!({
                "class": "WaningEffectBox",
                "Initial_Effect": initial_effect,
                "Box_Duration": box_duration,
            }),
            WaningEffect::Exponential {
                initial_effect,
                decay_time_constant,
            } => json!({
                "class": "WaningEffectExponential",
                "Initial_Effect": initial_effect,
                "Decay_Time_Constant": decay_time_constant,
            }),
            WaningEffect::BoxExponential {
                initial_effect,
                box_duration,
                decay_time_constant,
            } => json!({
                "class": "WaningEffectBoxExponential",
                "Initial_Effect": initial_effect,
                "Box_Duration": box_duration,
                "Decay_Time_Constant": decay_time_constant,
            }),
            WaningEffect::MapLinear {
                initial_effect,
                durability_map,
                expire_at_durability_map_end,
            } => json!({
                "class": "WaningEffectMapLinear",
                "Initial_Effect": initial_effect,
                "Durability_Map": durability_map.to_json(),
                "Expire_At_Durability_Map_End": u8::from(*expire_at_durability_map_end),
            }),
            WaningEffect::MapPiecewise {
                initial_effect,
                durability_map,
                expire_at_durability_map_end,
            } => json!({
                "class": "WaningEffectMapPiecewise",
                "Initial_Effect": initial_effect,
                "Durability_Map": durability_map.to_json(),
                "Expire_At_Durability_Map_End": u8::from(*expire_at_durability_map_end),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::WaningEffect;
    use crate::common::ValueMap;

    #[test]
    fn test_box_to_json() {
        let effect = WaningEffect::Box {
            initial_effect: 0.9,
            box_duration: 365.0,
        };
        effect.validate().unwrap();
        assert_eq!(
            effect.to_json(),
            json!({"class": "WaningEffectBox", "Initial_Effect": 0.9, "Box_Duration": 365.0})
        );
    }

    #[test]
    fn test_initial_effect_above_one() {
        let effect = WaningEffect::Constant {
            initial_effect: 1.2,
        };
        assert!(effect.validate().is_err());
    }

    #[test]
    fn test_map_values_checked() {
        let effect = WaningEffect::MapPiecewise {
            initial_effect: 1.0,
            durability_map: ValueMap::new(vec![0.0, 30.0], vec![1.0, 2.0]).unwrap(),
            expire_at_durability_map_end: true,
        };
        assert!(effect.validate().is_err());
    }
}
