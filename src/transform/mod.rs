//! The pluggable, cancellable transform pipeline: an ordered list of
//! configured transforms that derive a [`TransformedGraph`](crate::transformed_graph::TransformedGraph)
//! plus attributes from a source graph, with whole-run caching keyed by
//! the source digest and the full config list (see [`cache`]).

pub mod cache;
pub mod condition;
pub mod config;
pub mod contract;
pub mod filter;
pub mod metrics;
pub mod pipeline;
pub mod structural;
pub mod synthesise;

use std::sync::atomic::AtomicBool;

use crate::attribute::AttributeRegistry;
use crate::config::EngineConfig;
use crate::error::{Alert, AlertList, AlertSource};
use crate::graph::mutable_graph::MutableGraph;
use crate::id::NodeId;
pub use cache::TransformCache;
pub use config::{ParamValue, TransformConfig};

/// What happened when a single transform step ran.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StepOutcome {
    Ok,
    Cancelled,
    /// An `Error`-level alert was raised; the pipeline stops here.
    Aborted,
}

/// Everything one transform step needs: the working graph it mutates
/// in place, read-only engine parameters, and its own position in the
/// pipeline (for alert attribution and progress reporting).
pub struct TransformContext<'a> {
    pub graph: &'a mut MutableGraph,
    pub registry: &'a mut AttributeRegistry,
    pub config: &'a TransformConfig,
    pub engine: &'a EngineConfig,
    pub cancel: &'a AtomicBool,
    pub step_index: usize,
}

impl TransformContext<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn add_alert(&self, alerts: &mut AlertList, level: crate::error::AlertLevel, message: impl Into<String>) {
        alerts.push(Alert::new(
            level,
            message,
            AlertSource::Transform { action: self.config.action.clone(), index: self.step_index },
        ));
    }
}

/// A pure, configurable function `TransformedGraph -> TransformedGraph`
/// (modelled here as in-place mutation of the working `MutableGraph`
/// plus the attribute registry, which is equivalent and cheaper).
pub trait Transform: Send + Sync {
    fn apply(&self, ctx: &mut TransformContext, alerts: &mut AlertList) -> StepOutcome;
}

/// Looks up the transform implementing `action`. Returns `None` for an
/// unrecognised action name, which the pipeline turns into an `Error`
/// alert rather than a panic (bad configs are user input, not bugs).
pub fn lookup(action: &str) -> Option<&'static dyn Transform> {
    match action {
        "filter" => Some(&filter::FilterTransform),
        "contract" => Some(&contract::ContractTransform),
        "attribute-from-condition" | "synthesise-attribute" => Some(&synthesise::SynthesiseAttributeTransform),
        "pagerank" => Some(&metrics::PageRankTransform),
        "eccentricity" => Some(&metrics::EccentricityTransform),
        "mcl" => Some(&metrics::MclTransform),
        "louvain" | "leiden" => Some(&metrics::CommunityDetectionTransform),
        "k-core" => Some(&structural::KCoreTransform),
        "giant-component" => Some(&structural::GiantComponentTransform),
        "remove-leaves" => Some(&structural::RemoveLeavesTransform),
        _ => None,
    }
}

/// Connected components of `graph`'s current node/edge set, each
/// sorted by raw id with its lowest-id member first (used as the
/// component's representative by the transforms that key attribute
/// lookups on a single raw id per element).
pub(crate) fn connected_components(graph: &MutableGraph) -> Vec<Vec<NodeId>> {
    use rustc_hash::FxHashSet;
    use std::collections::VecDeque;

    let mut visited = FxHashSet::default();
    let mut out = Vec::new();

    for start in graph.node_ids() {
        if visited.contains(&start) {
            continue;
        }
        let mut members = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);
        while let Some(node) = queue.pop_front() {
            members.push(node);
            for &edge in graph.out_edges(node).iter().chain(graph.in_edges(node).iter()) {
                let other = if graph.source(edge) == node { graph.target(edge) } else { graph.source(edge) };
                if visited.insert(other) {
                    queue.push_back(other);
                }
            }
        }
        members.sort_by_key(|n| n.index());
        out.push(members);
    }
    out
}
