pub mod component_manager;
pub mod mutable_graph;

pub use component_manager::{ComponentManager, ComponentSplit};
pub use mutable_graph::{GraphObserver, MutableGraph};

use crate::id::NodeId;

/// Expands a set of node ids to include every member of each id's merge
/// set (its head plus that head's tails), so that search and
/// zoom-to-selection can never drift apart on whether a hit on a tail
/// node should pull the rest of its merge set along (§9/§10 "one shared
/// helper" decision).
pub fn expand_to_merge_sets(graph: &MutableGraph, ids: impl IntoIterator<Item = NodeId>) -> rustc_hash::FxHashSet<NodeId> {
    let mut out = rustc_hash::FxHashSet::default();
    for id in ids {
        let head = graph.head_of_node(id);
        out.extend(graph.merge_set_of_node(head));
    }
    out
}
