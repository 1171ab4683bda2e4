//! `contract edges where <condition>`: calls `MutableGraph::contract_edges`
//! on every matching edge.

use crate::error::AlertList;
use crate::id::EdgeId;
use crate::transform::condition::{self, RegistryContext};
use crate::transform::{StepOutcome, Transform, TransformContext};

pub struct ContractTransform;

impl Transform for ContractTransform {
    fn apply(&self, ctx: &mut TransformContext, alerts: &mut AlertList) -> StepOutcome {
        let Some(condition) = ctx.config.condition.as_ref() else {
            ctx.add_alert(alerts, crate::error::AlertLevel::Error, "contract transform requires a condition");
            return StepOutcome::Aborted;
        };

        let context = RegistryContext { registry: ctx.registry, degree_of: None::<fn(u32) -> usize> };
        let predicate = condition::compile(condition, &context);

        let matching: Vec<EdgeId> = ctx.graph.edge_ids().filter(|e| predicate(e.index() as u32)).collect();

        if ctx.is_cancelled() {
            return StepOutcome::Cancelled;
        }

        ctx.graph.contract_edges(matching);
        StepOutcome::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeFlags, AttributeRegistry, ElementType};
    use crate::config::EngineConfig;
    use crate::error::AlertList;
    use crate::graph::mutable_graph::MutableGraph;
    use crate::transform::condition::{CompareOp, ConditionNode, Literal};
    use crate::transform::TransformConfig;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn contracts_low_weight_edges_and_preserves_the_rest() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        let ab = graph.add_edge(a, b);
        let bc = graph.add_edge(b, c);

        let mut registry = AttributeRegistry::new();
        let weights = std::collections::HashMap::from([(ab.index() as u32, 0.1f64), (bc.index() as u32, 5.0f64)]);
        registry
            .register("Weight", ElementType::Edge, AttributeFlags::empty(), move |id| {
                weights.get(&id).copied().map(crate::attribute::AttrValue::Float)
            })
            .unwrap();

        let config = TransformConfig::new("contract")
            .with_condition(ConditionNode::compare("Weight", CompareOp::Lt, Literal::Number(1.0)));
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
        let outcome = ContractTransform.apply(&mut ctx, &mut alerts);

        assert_eq!(outcome, StepOutcome::Ok);
        assert!(!graph.contains_edge(ab));
        assert_eq!(graph.head_of_node(b), a);
        assert_eq!(graph.out_edges(a).len(), 1);
        assert_eq!(graph.target(graph.out_edges(a)[0]), c);
    }
}
