//! The condition AST used by filter/contract/synthesise-attribute
//! transforms: a tree of `(attribute OP literal)` leaves joined by
//! `AND`/`OR`/`NOT`, compiled against the attribute registry (plus a
//! handful of built-in pseudo-attributes such as `$degree`) into a
//! predicate function.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::attribute::{AttrValue, AttributeRegistry};
use crate::error::{GraphError, GraphResult};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    MatchesRegex,
    MatchesRegexCaseInsensitive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub attribute: String,
    pub op: CompareOp,
    pub literal: Literal,
}

/// A `(attribute OP literal)` leaf, or a boolean combination of other
/// nodes - mirrors the condition AST grammar directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConditionNode {
    Leaf(Comparison),
    And(Box<ConditionNode>, Box<ConditionNode>),
    Or(Box<ConditionNode>, Box<ConditionNode>),
    Not(Box<ConditionNode>),
}

impl ConditionNode {
    pub fn compare(attribute: impl Into<String>, op: CompareOp, literal: Literal) -> Self {
        ConditionNode::Leaf(Comparison { attribute: attribute.into(), op, literal })
    }

    pub fn and(self, other: ConditionNode) -> Self {
        ConditionNode::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: ConditionNode) -> Self {
        ConditionNode::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        ConditionNode::Not(Box::new(self))
    }
}

/// Resolves a named value (attribute or built-in) for a raw element id.
/// `TransformedGraph`/`MutableGraph` provide the built-ins ($degree,
/// $inDegree, $outDegree); the attribute registry provides everything
/// else. Kept as a trait so tests can supply a bare lookup table.
pub trait ConditionContext {
    fn value(&self, name: &str, raw_id: u32) -> Option<AttrValue>;
}

/// The common case: an attribute registry plus an optional degree
/// lookup for the node built-ins.
pub struct RegistryContext<'a, F: Fn(u32) -> usize> {
    pub registry: &'a AttributeRegistry,
    pub degree_of: Option<F>,
}

impl<'a, F: Fn(u32) -> usize> ConditionContext for RegistryContext<'a, F> {
    fn value(&self, name: &str, raw_id: u32) -> Option<AttrValue> {
        match name {
            "$degree" => self.degree_of.as_ref().map(|f| AttrValue::Int(f(raw_id) as i64)),
            _ => self.registry.get(name).ok().and_then(|attr| attr.value_fn_raw(raw_id)),
        }
    }
}

/// Compiles `node` once against `context`, returning an owned closure
/// callers can apply to every element id without re-walking the tree.
pub fn compile<'a>(node: &'a ConditionNode, context: &'a dyn ConditionContext) -> impl Fn(u32) -> bool + 'a {
    move |raw_id| evaluate(node, context, raw_id)
}

fn evaluate(node: &ConditionNode, context: &dyn ConditionContext, raw_id: u32) -> bool {
    match node {
        ConditionNode::Leaf(cmp) => evaluate_leaf(cmp, context, raw_id),
        ConditionNode::And(a, b) => evaluate(a, context, raw_id) && evaluate(b, context, raw_id),
        ConditionNode::Or(a, b) => evaluate(a, context, raw_id) || evaluate(b, context, raw_id),
        ConditionNode::Not(a) => !evaluate(a, context, raw_id),
    }
}

fn evaluate_leaf(cmp: &Comparison, context: &dyn ConditionContext, raw_id: u32) -> bool {
    let Some(value) = context.value(&cmp.attribute, raw_id) else {
        return false;
    };

    match (&cmp.op, &cmp.literal) {
        (CompareOp::MatchesRegex, Literal::Text(pattern)) => {
            Regex::new(pattern).is_ok_and(|re| re.is_match(&value.render()))
        }
        (CompareOp::MatchesRegexCaseInsensitive, Literal::Text(pattern)) => {
            Regex::new(&format!("(?i){pattern}")).is_ok_and(|re| re.is_match(&value.render()))
        }
        (op, Literal::Number(n)) => match value.as_f64() {
            Some(v) => compare_numbers(*op, v, *n),
            None => false,
        },
        (op, Literal::Text(s)) => compare_strings(*op, &value.render(), s),
    }
}

fn compare_numbers(op: CompareOp, lhs: f64, rhs: f64) -> bool {
    match op {
        CompareOp::Eq => (lhs - rhs).abs() < f64::EPSILON,
        CompareOp::Ne => (lhs - rhs).abs() >= f64::EPSILON,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
        CompareOp::MatchesRegex | CompareOp::MatchesRegexCaseInsensitive => false,
    }
}

fn compare_strings(op: CompareOp, lhs: &str, rhs: &str) -> bool {
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
        CompareOp::MatchesRegex | CompareOp::MatchesRegexCaseInsensitive => false,
    }
}

/// Validates that every attribute a condition references either exists
/// in the registry or is a recognised built-in, surfacing an `Invalid
/// condition` error for transform configs authored against a since-removed
/// attribute rather than silently matching nothing.
pub fn validate(node: &ConditionNode, registry: &AttributeRegistry) -> GraphResult<()> {
    match node {
        ConditionNode::Leaf(cmp) => {
            if cmp.attribute.starts_with('$') || registry.contains(&cmp.attribute) {
                Ok(())
            } else {
                Err(GraphError::InvalidCondition(format!("unknown attribute `{}`", cmp.attribute)))
            }
        }
        ConditionNode::And(a, b) | ConditionNode::Or(a, b) => {
            validate(a, registry)?;
            validate(b, registry)
        }
        ConditionNode::Not(a) => validate(a, registry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::ElementType;
    use rustc_hash::FxHashMap;

    #[test]
    fn degree_less_than_two_matches_path_ends() {
        let degrees: FxHashMap<u32, usize> = [(0, 1), (1, 2), (2, 2), (3, 2), (4, 1)].into_iter().collect();
        let registry = AttributeRegistry::new();
        let context = RegistryContext { registry: &registry, degree_of: Some(|id: u32| degrees[&id]) };

        let condition = ConditionNode::compare("$degree", CompareOp::Lt, Literal::Number(2.0));
        let predicate = compile(&condition, &context);

        assert!(predicate(0));
        assert!(!predicate(1));
        assert!(predicate(4));
    }

    #[test]
    fn and_or_not_compose() {
        let mut registry = AttributeRegistry::new();
        registry.register("Weight", ElementType::Edge, crate::attribute::AttributeFlags::empty(), |id| {
            Some(AttrValue::Float(id as f64 * 0.1))
        }).unwrap();
        let context = RegistryContext { registry: &registry, degree_of: None::<fn(u32) -> usize> };

        let low_weight = ConditionNode::compare("Weight", CompareOp::Lt, Literal::Number(0.5));
        let high_weight = ConditionNode::compare("Weight", CompareOp::Ge, Literal::Number(0.5));
        let never = low_weight.clone().and(high_weight.clone());
        let always = low_weight.or(high_weight);

        assert!(!compile(&never, &context)(1));
        assert!(compile(&always, &context)(1));
        assert!(compile(&ConditionNode::compare("Weight", CompareOp::Lt, Literal::Number(1.0)).negate(), &context)(200));
    }

    #[test]
    fn unknown_attribute_is_rejected_by_validate() {
        let registry = AttributeRegistry::new();
        let condition = ConditionNode::compare("Nope", CompareOp::Eq, Literal::Number(1.0));
        assert!(validate(&condition, &registry).is_err());
    }
}
