//! Structural transforms expressible as repeated filter-like passes:
//! `k-core`, `giant-component`, `remove-leaves`.

use crate::error::AlertList;
use crate::id::NodeId;
use crate::transform::{connected_components, StepOutcome, Transform, TransformContext};

/// Repeatedly removes nodes with degree `< k` until none remain (the
/// `k`-core of the graph). `k` comes from the `k` numeric parameter,
/// defaulting to 2.
pub struct KCoreTransform;

impl Transform for KCoreTransform {
    fn apply(&self, ctx: &mut TransformContext, _alerts: &mut AlertList) -> StepOutcome {
        let k = ctx.config.parameter("k").and_then(|p| p.as_f64()).unwrap_or(2.0) as usize;

        loop {
            if ctx.is_cancelled() {
                return StepOutcome::Cancelled;
            }

            let below_core: Vec<NodeId> = ctx.graph.node_ids().filter(|&n| ctx.graph.degree(n) < k).collect();
            if below_core.is_empty() {
                break;
            }

            ctx.graph.transaction(|graph| {
                for node in below_core {
                    if graph.contains_node(node) {
                        graph.remove_node(node);
                    }
                }
            });
        }
        StepOutcome::Ok
    }
}

/// Keeps only the largest connected component, discarding the rest.
/// Ties are broken by lowest representative id, matching
/// `ComponentManager`'s merge tie-break rule.
pub struct GiantComponentTransform;

impl Transform for GiantComponentTransform {
    fn apply(&self, ctx: &mut TransformContext, _alerts: &mut AlertList) -> StepOutcome {
        let components = connected_components(ctx.graph);
        if ctx.is_cancelled() {
            return StepOutcome::Cancelled;
        }

        let Some(giant) = components
            .iter()
            .max_by_key(|c| (c.len(), std::cmp::Reverse(c.first().map(|n| n.index()).unwrap_or(u32::MAX as usize))))
        else {
            return StepOutcome::Ok;
        };

        let keep: rustc_hash::FxHashSet<NodeId> = giant.iter().copied().collect();
        let doomed: Vec<NodeId> = ctx.graph.node_ids().filter(|n| !keep.contains(n)).collect();

        ctx.graph.transaction(|graph| {
            for node in doomed {
                if graph.contains_node(node) {
                    graph.remove_node(node);
                }
            }
        });
        StepOutcome::Ok
    }
}

/// Removes degree-`<=1` nodes once. Declaring the transform config
/// `repeating` (§4.3) peels successive leaf layers back to the 2-core.
pub struct RemoveLeavesTransform;

impl Transform for RemoveLeavesTransform {
    fn apply(&self, ctx: &mut TransformContext, _alerts: &mut AlertList) -> StepOutcome {
        let leaves: Vec<NodeId> = ctx.graph.node_ids().filter(|&n| ctx.graph.degree(n) <= 1).collect();

        if ctx.is_cancelled() {
            return StepOutcome::Cancelled;
        }

        ctx.graph.transaction(|graph| {
            for node in leaves {
                if graph.contains_node(node) {
                    graph.remove_node(node);
                }
            }
        });
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
    use crate::transform::TransformConfig;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn giant_component_keeps_only_the_larger_clique() {
        let mut graph = MutableGraph::new();
        let big: Vec<_> = (0..5).map(|_| graph.add_node()).collect();
        for i in 0..big.len() {
            for j in (i + 1)..big.len() {
                graph.add_edge(big[i], big[j]);
            }
        }
        let small_a = graph.add_node();
        let small_b = graph.add_node();
        graph.add_edge(small_a, small_b);

        let mut registry = AttributeRegistry::new();
        let config = TransformConfig::new("giant-component");
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

        assert_eq!(GiantComponentTransform.apply(&mut ctx, &mut alerts), StepOutcome::Ok);
        assert_eq!(graph.num_nodes(), 5);
    }

    #[test]
    fn remove_leaves_strips_degree_one_nodes() {
        let mut graph = MutableGraph::new();
        let nodes: Vec<_> = (0..4).map(|_| graph.add_node()).collect();
        for w in nodes.windows(2) {
            graph.add_edge(w[0], w[1]);
        }

        let mut registry = AttributeRegistry::new();
        let config = TransformConfig::new("remove-leaves");
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

        assert_eq!(RemoveLeavesTransform.apply(&mut ctx, &mut alerts), StepOutcome::Ok);
        assert_eq!(graph.num_nodes(), 2);
    }
}
