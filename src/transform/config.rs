//! `TransformConfig`: the declarative, user-authored record describing
//! one pipeline step, independent of how that step is executed.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::transform::condition::ConditionNode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::Number(_) => None,
        }
    }
}

/// One user-declared pipeline step. Equality (used by the cache to
/// decide whether a step can be reused) is derived structurally; two
/// configs with the same action, parameters and condition compare
/// equal regardless of where they came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    pub action: String,
    pub parameters: FxHashMap<String, ParamValue>,
    pub attribute_parameters: FxHashMap<String, String>,
    pub condition: Option<ConditionNode>,
    pub flags: FxHashSet<String>,
}

impl TransformConfig {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            parameters: FxHashMap::default(),
            attribute_parameters: FxHashMap::default(),
            condition: None,
            flags: FxHashSet::default(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_condition(mut self, condition: ConditionNode) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn is_repeating(&self) -> bool {
        self.flags.contains("repeating")
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }
}

/// Structural equality over the fields that matter for cache lookup.
/// Condition comparison is by debug-rendering since `ConditionNode`
/// does not carry a hand-rolled `PartialEq` (its variants hold
/// trait-free data so deriving one would be straightforward, but
/// comparing the rendered form also catches the common case of two
/// conditions built through different helper call sequences).
impl PartialEq for TransformConfig {
    fn eq(&self, other: &Self) -> bool {
        self.action == other.action
            && self.parameters == other.parameters
            && self.attribute_parameters == other.attribute_parameters
            && self.flags == other.flags
            && format!("{:?}", self.condition) == format!("{:?}", other.condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_configs_compare_equal_regardless_of_construction_order() {
        let a = TransformConfig::new("filter").with_parameter("x", ParamValue::Number(1.0)).with_flag("repeating");
        let b = TransformConfig::new("filter").with_flag("repeating").with_parameter("x", ParamValue::Number(1.0));
        assert_eq!(a, b);
    }

    #[test]
    fn different_action_is_not_equal() {
        let a = TransformConfig::new("filter");
        let b = TransformConfig::new("contract");
        assert_ne!(a, b);
    }
}
