//! `filter node|edge|component where <condition>`: removes every
//! element for which the condition holds.

use crate::error::{AlertList, AlertLevel};
use crate::id::{EdgeId, NodeId};
use crate::transform::condition::{self, RegistryContext};
use crate::transform::{connected_components, StepOutcome, Transform, TransformContext};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Target {
    Node,
    Edge,
    Component,
}

fn target_of(ctx: &TransformContext) -> Target {
    match ctx.config.parameter("element").and_then(|p| p.as_str()) {
        Some("edge") => Target::Edge,
        Some("component") => Target::Component,
        _ => Target::Node,
    }
}

pub struct FilterTransform;

impl Transform for FilterTransform {
    fn apply(&self, ctx: &mut TransformContext, alerts: &mut AlertList) -> StepOutcome {
        let Some(condition) = ctx.config.condition.as_ref() else {
            ctx.add_alert(alerts, AlertLevel::Error, "filter transform requires a condition");
            return StepOutcome::Aborted;
        };

        match target_of(ctx) {
            Target::Node => filter_nodes(ctx, condition, alerts),
            Target::Edge => filter_edges(ctx, condition, alerts),
            Target::Component => filter_components(ctx, condition, alerts),
        }
    }
}

fn filter_nodes(ctx: &mut TransformContext, condition: &condition::ConditionNode, _alerts: &mut AlertList) -> StepOutcome {
    // Keyed by raw id, not position: once an earlier step has removed
    // nodes, `node_ids()` is sparse and a position-indexed `Vec` would
    // be indexed out of bounds by a later step's raw ids.
    let degrees: rustc_hash::FxHashMap<u32, usize> =
        ctx.graph.node_ids().map(|n| (n.index() as u32, ctx.graph.degree(n))).collect();
    let context = RegistryContext {
        registry: ctx.registry,
        degree_of: Some(|raw: u32| degrees[&raw]),
    };
    let predicate = condition::compile(condition, &context);

    let to_remove: Vec<NodeId> = ctx
        .graph
        .node_ids()
        .filter(|n| predicate(n.index() as u32))
        .collect();

    if ctx.is_cancelled() {
        return StepOutcome::Cancelled;
    }

    ctx.graph.transaction(|graph| {
        for node in to_remove {
            if graph.contains_node(node) {
                graph.remove_node(node);
            }
        }
    });
    StepOutcome::Ok
}

fn filter_edges(ctx: &mut TransformContext, condition: &condition::ConditionNode, _alerts: &mut AlertList) -> StepOutcome {
    let context = RegistryContext { registry: ctx.registry, degree_of: None::<fn(u32) -> usize> };
    let predicate = condition::compile(condition, &context);

    let to_remove: Vec<EdgeId> = ctx
        .graph
        .edge_ids()
        .filter(|e| predicate(e.index() as u32))
        .collect();

    if ctx.is_cancelled() {
        return StepOutcome::Cancelled;
    }

    ctx.graph.transaction(|graph| {
        for edge in to_remove {
            if graph.contains_edge(edge) {
                graph.remove_edge(edge);
            }
        }
    });
    StepOutcome::Ok
}

fn filter_components(ctx: &mut TransformContext, condition: &condition::ConditionNode, _alerts: &mut AlertList) -> StepOutcome {
    let components = connected_components(ctx.graph);

    // Component-element attributes are addressed by the component's
    // representative (lowest-id member), matching how the attribute
    // registry's raw-id indexing works for every other element kind.
    let context = RegistryContext { registry: ctx.registry, degree_of: None::<fn(u32) -> usize> };
    let compiled = condition::compile(condition, &context);

    if ctx.is_cancelled() {
        return StepOutcome::Cancelled;
    }

    let doomed: Vec<NodeId> = components
        .into_iter()
        .filter(|members| compiled(members[0].index() as u32))
        .flatten()
        .collect();

    ctx.graph.transaction(|graph| {
        for node in doomed {
            if graph.contains_node(node) {
                graph.remove_node(node);
            }
        }
    });
    StepOutcome::Ok
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
    fn filters_degree_less_than_two_off_a_path() {
        let mut graph = MutableGraph::new();
        let nodes: Vec<_> = (0..5).map(|_| graph.add_node()).collect();
        for w in nodes.windows(2) {
            graph.add_edge(w[0], w[1]);
        }

        let mut registry = AttributeRegistry::new();
        let config = TransformConfig::new("filter")
            .with_parameter("element", ParamValue::Text("node".into()))
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
        let outcome = FilterTransform.apply(&mut ctx, &mut alerts);

        assert_eq!(outcome, StepOutcome::Ok);
        assert_eq!(graph.num_nodes(), 3);
        assert_eq!(graph.num_edges(), 2);
    }
}
