//! `attribute-from-condition` / numeric-expression synthesis: adds a
//! new attribute whose value is either a condition's boolean result or
//! a simple arithmetic combination of two existing numeric attributes.

use crate::attribute::{AttrValue, AttributeFlags, ElementType};
use crate::error::{AlertList, AlertLevel};
use crate::transform::condition::{self, RegistryContext};
use crate::transform::{StepOutcome, Transform, TransformContext};

pub struct SynthesiseAttributeTransform;

impl Transform for SynthesiseAttributeTransform {
    fn apply(&self, ctx: &mut TransformContext, alerts: &mut AlertList) -> StepOutcome {
        let Some(name) = ctx.config.parameter("name").and_then(|p| p.as_str()).map(str::to_owned) else {
            ctx.add_alert(alerts, AlertLevel::Error, "synthesise-attribute requires a `name` parameter");
            return StepOutcome::Aborted;
        };

        if let Some(condition) = ctx.config.condition.as_ref() {
            return self.synthesise_from_condition(ctx, alerts, &name, condition);
        }

        self.synthesise_from_expression(ctx, alerts, &name)
    }
}

impl SynthesiseAttributeTransform {
    fn synthesise_from_condition(
        &self,
        ctx: &mut TransformContext,
        alerts: &mut AlertList,
        name: &str,
        condition: &condition::ConditionNode,
    ) -> StepOutcome {
        // Keyed by raw id, not position: `node_ids()` is sparse once an
        // earlier pipeline step has removed nodes, so a position-indexed
        // `Vec` would be indexed out of bounds by a later step's raw ids.
        let degrees: rustc_hash::FxHashMap<u32, usize> =
            ctx.graph.node_ids().map(|n| (n.index() as u32, ctx.graph.degree(n))).collect();
        let values: std::collections::HashMap<u32, AttrValue> = {
            let context = RegistryContext { registry: ctx.registry, degree_of: Some(|raw: u32| degrees[&raw]) };
            let predicate = condition::compile(condition, &context);
            ctx.graph.node_ids().map(|n| (n.index() as u32, AttrValue::Int(predicate(n.index() as u32) as i64))).collect()
        };

        if ctx.is_cancelled() {
            return StepOutcome::Cancelled;
        }

        let result = ctx.registry.register(name, ElementType::Node, AttributeFlags::AUTO_RANGE, move |id| values.get(&id).cloned());
        if let Err(e) = result {
            ctx.add_alert(alerts, AlertLevel::Error, e.to_string());
            return StepOutcome::Aborted;
        }
        StepOutcome::Ok
    }

    fn synthesise_from_expression(&self, ctx: &mut TransformContext, alerts: &mut AlertList, name: &str) -> StepOutcome {
        let Some(op) = ctx.config.parameter("op").and_then(|p| p.as_str()).map(str::to_owned) else {
            ctx.add_alert(alerts, AlertLevel::Error, "numeric synthesis requires an `op` parameter when no condition is given");
            return StepOutcome::Aborted;
        };
        let Some(lhs_name) = ctx.config.attribute_parameters.get("lhs").cloned() else {
            ctx.add_alert(alerts, AlertLevel::Error, "numeric synthesis requires an `lhs` attribute parameter");
            return StepOutcome::Aborted;
        };

        let lhs_attr = match ctx.registry.get(&lhs_name) {
            Ok(a) => a,
            Err(e) => {
                ctx.add_alert(alerts, AlertLevel::Error, e.to_string());
                return StepOutcome::Aborted;
            }
        };

        let rhs_literal = ctx.config.parameter("rhsLiteral").and_then(|p| p.as_f64());
        let rhs_name = ctx.config.attribute_parameters.get("rhs").cloned();
        let rhs_attr = rhs_name.as_ref().and_then(|n| ctx.registry.get(n).ok());

        let mut values = std::collections::HashMap::new();
        for node in ctx.graph.node_ids() {
            let raw = node.index() as u32;
            let Some(lhs) = lhs_attr.value_fn_raw(raw).and_then(|v| v.as_f64()) else { continue };
            let rhs = match (rhs_attr, rhs_literal) {
                (Some(attr), _) => attr.value_fn_raw(raw).and_then(|v| v.as_f64()),
                (None, Some(literal)) => Some(literal),
                (None, None) => None,
            };
            let Some(rhs) = rhs else { continue };

            let result = match op.as_str() {
                "add" => lhs + rhs,
                "sub" => lhs - rhs,
                "mul" => lhs * rhs,
                "div" if rhs != 0.0 => lhs / rhs,
                _ => continue,
            };
            values.insert(raw, AttrValue::Float(result));
        }

        if ctx.is_cancelled() {
            return StepOutcome::Cancelled;
        }

        let result = ctx.registry.register(name, ElementType::Node, AttributeFlags::AUTO_RANGE, move |id| values.get(&id).cloned());
        if let Err(e) = result {
            ctx.add_alert(alerts, AlertLevel::Error, e.to_string());
            return StepOutcome::Aborted;
        }
        StepOutcome::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeRegistry;
    use crate::config::EngineConfig;
    use crate::error::AlertList;
    use crate::graph::mutable_graph::MutableGraph;
    use crate::transform::condition::{CompareOp, ConditionNode, Literal};
    use crate::transform::{ParamValue, TransformConfig};
    use std::sync::atomic::AtomicBool;

    #[test]
    fn adds_boolean_attribute_from_condition() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        graph.add_edge(a, b);

        let mut registry = AttributeRegistry::new();
        let config = TransformConfig::new("attribute-from-condition")
            .with_parameter("name", ParamValue::Text("IsLeaf".into()))
            .with_condition(ConditionNode::compare("$degree", CompareOp::Lt, Literal::Number(2.0)));
        let engine = EngineConfig::default();
        let cancel = AtomicBool::new(false);
        let mut alerts = AlertList::new();

        let mut ctx = TransformContext {
            graph: &mut graph,
            registry: &mut registry,
            config: &config,
            engine: &engine,
            cancel: &cancel,
            step_index: 0,
        };
        let outcome = SynthesiseAttributeTransform.apply(&mut ctx, &mut alerts);

        assert_eq!(outcome, StepOutcome::Ok);
        assert!(registry.contains("IsLeaf"));
        let attr = registry.get("IsLeaf").unwrap();
        assert_eq!(attr.value_for_node(a), Some(AttrValue::Int(1)));
    }
}
