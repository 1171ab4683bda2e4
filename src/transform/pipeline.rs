//! Orchestrates an ordered list of [`TransformConfig`] steps over a
//! source graph, producing a [`TransformedGraph`](crate::transformed_graph::TransformedGraph)
//! plus whatever attributes the steps synthesised along the way.

use std::sync::atomic::AtomicBool;

use rustc_hash::FxHashSet;

use crate::attribute::AttributeRegistry;
use crate::config::EngineConfig;
use crate::error::{Alert, AlertList, AlertSource};
use crate::graph::mutable_graph::MutableGraph;
use crate::transform::condition;
use crate::transform::{lookup, StepOutcome, Transform, TransformCache, TransformConfig, TransformContext};
use crate::transformed_graph::TransformedGraph;

/// Runs a configured pipeline and remembers the last (source digest,
/// config list) it saw, so a caller that re-runs with unchanged inputs
/// doesn't have to pay for the transforms - particularly the
/// iterative ones (MCL, PageRank, community detection) - a second time.
pub struct TransformPipeline {
    cache: TransformCache,
    synthesised_attribute_names: Vec<String>,
    last_transformed: Option<TransformedGraph>,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self { cache: TransformCache::new(), synthesised_attribute_names: Vec::new(), last_transformed: None }
    }

    pub fn cache_hit_count(&self) -> u64 {
        self.cache.hit_count()
    }

    /// The view produced by the last `run`, if any has completed yet.
    pub fn last_transformed(&self) -> Option<&TransformedGraph> {
        self.last_transformed.as_ref()
    }

    /// Attribute names the last `run` synthesised (added or refreshed),
    /// so a caller can raise a targeted `attributeValuesChanged` rather
    /// than assume every attribute moved.
    pub fn synthesised_attribute_names(&self) -> &[String] {
        &self.synthesised_attribute_names
    }

    /// Runs `configs` against `source`, applying each in turn to a
    /// working copy of the graph and to `registry` (the document's
    /// attribute registry, which the steps may add new entries to).
    /// Returns the resulting view and any alerts raised along the way.
    pub fn run(
        &mut self,
        source: &MutableGraph,
        registry: &mut AttributeRegistry,
        configs: &[TransformConfig],
        engine: &EngineConfig,
        cancel: &AtomicBool,
    ) -> (&TransformedGraph, AlertList) {
        let mut alerts = AlertList::new();
        let source_view = TransformedGraph::from_source(source);
        let source_digest = source_view.digest();

        if let Some(cached_digest) = self.cache.lookup(source_digest, configs) {
            if self.last_transformed.as_ref().is_some_and(|t| t.digest() == cached_digest) {
                return (self.last_transformed.as_ref().unwrap(), alerts);
            }
        }

        for name in self.synthesised_attribute_names.drain(..) {
            registry.remove(&name);
        }
        let before_names: FxHashSet<String> = registry.names().map(str::to_owned).collect();

        let mut working = source_view;
        for (index, config) in configs.iter().enumerate() {
            if cancel.load(std::sync::atomic::Ordering::Relaxed) {
                break;
            }

            let Some(transform) = lookup(&config.action) else {
                alerts.push(Alert::error(
                    format!("unknown transform action `{}`", config.action),
                    AlertSource::Transform { action: config.action.clone(), index },
                ));
                continue;
            };

            if let Some(condition) = &config.condition {
                if let Err(e) = condition::validate(condition, registry) {
                    alerts.push(Alert::error(e.to_string(), AlertSource::Transform { action: config.action.clone(), index }));
                    continue;
                }
            }

            let mut ctx = TransformContext {
                graph: working.mutable_graph_mut(),
                registry,
                config,
                engine,
                cancel,
                step_index: index,
            };

            match run_step(transform, &mut ctx, &mut alerts, config.is_repeating()) {
                StepOutcome::Ok => {}
                StepOutcome::Cancelled => break,
                StepOutcome::Aborted => break,
            }
        }

        let after_names: FxHashSet<String> = registry.names().map(str::to_owned).collect();
        self.synthesised_attribute_names = after_names.difference(&before_names).cloned().collect();

        let output_digest = working.digest();
        self.cache.record(source_digest, configs.to_vec(), output_digest);
        self.last_transformed = Some(working);

        (self.last_transformed.as_ref().unwrap(), alerts)
    }
}

/// Applies `transform` once, or - for a step flagged `repeating` -
/// until a call leaves the node/edge counts unchanged (a fixed point),
/// which is how `k-core`/`remove-leaves` converge to their final shape.
fn run_step(transform: &dyn Transform, ctx: &mut TransformContext, alerts: &mut AlertList, repeating: bool) -> StepOutcome {
    if !repeating {
        return transform.apply(ctx, alerts);
    }

    loop {
        let before = (ctx.graph.num_nodes(), ctx.graph.num_edges());
        let outcome = transform.apply(ctx, alerts);
        if outcome != StepOutcome::Ok {
            return outcome;
        }
        if (ctx.graph.num_nodes(), ctx.graph.num_edges()) == before {
            return StepOutcome::Ok;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::condition::{CompareOp, ConditionNode, Literal};
    use crate::transform::ParamValue;
    use std::sync::atomic::AtomicBool;

    fn path_graph(n: usize) -> MutableGraph {
        let mut graph = MutableGraph::new();
        let nodes: Vec<_> = (0..n).map(|_| graph.add_node()).collect();
        for w in nodes.windows(2) {
            graph.add_edge(w[0], w[1]);
        }
        graph
    }

    #[test]
    fn filter_then_synthesise_runs_in_order() {
        let source = path_graph(5);
        let mut registry = AttributeRegistry::new();
        let engine = EngineConfig::default();
        let cancel = AtomicBool::new(false);
        let mut pipeline = TransformPipeline::new();

        let configs = vec![
            TransformConfig::new("filter")
                .with_parameter("element", ParamValue::Text("node".into()))
                .with_condition(ConditionNode::compare("$degree", CompareOp::Lt, Literal::Number(1.0))),
            TransformConfig::new("attribute-from-condition")
                .with_parameter("name", ParamValue::Text("IsEnd".into()))
                .with_condition(ConditionNode::compare("$degree", CompareOp::Eq, Literal::Number(1.0))),
        ];

        let (view, alerts) = pipeline.run(&source, &mut registry, &configs, &engine, &cancel);
        assert!(!alerts.has_errors());
        assert_eq!(view.mutable_graph().num_nodes(), 5);
        assert!(registry.contains("IsEnd"));
    }

    #[test]
    fn unknown_action_raises_an_alert_but_does_not_panic() {
        let source = path_graph(3);
        let mut registry = AttributeRegistry::new();
        let engine = EngineConfig::default();
        let cancel = AtomicBool::new(false);
        let mut pipeline = TransformPipeline::new();

        let configs = vec![TransformConfig::new("not-a-real-transform")];
        let (_, alerts) = pipeline.run(&source, &mut registry, &configs, &engine, &cancel);
        assert!(alerts.has_errors());
    }

    #[test]
    fn repeated_identical_run_is_a_cache_hit() {
        let source = path_graph(4);
        let mut registry = AttributeRegistry::new();
        let engine = EngineConfig::default();
        let cancel = AtomicBool::new(false);
        let mut pipeline = TransformPipeline::new();
        let configs: Vec<TransformConfig> = vec![];

        pipeline.run(&source, &mut registry, &configs, &engine, &cancel);
        pipeline.run(&source, &mut registry, &configs, &engine, &cancel);
        assert_eq!(pipeline.cache_hit_count(), 1);
    }

    #[test]
    fn repeating_remove_leaves_peels_down_to_a_cycle() {
        let mut graph = MutableGraph::new();
        let ring: Vec<_> = (0..4).map(|_| graph.add_node()).collect();
        for i in 0..ring.len() {
            graph.add_edge(ring[i], ring[(i + 1) % ring.len()]);
        }
        let tail = graph.add_node();
        graph.add_edge(ring[0], tail);

        let mut registry = AttributeRegistry::new();
        let engine = EngineConfig::default();
        let cancel = AtomicBool::new(false);
        let mut pipeline = TransformPipeline::new();
        let configs = vec![TransformConfig::new("remove-leaves").with_flag("repeating")];

        let (view, alerts) = pipeline.run(&graph, &mut registry, &configs, &engine, &cancel);
        assert!(!alerts.has_errors());
        assert_eq!(view.mutable_graph().num_nodes(), 4);
    }
}
