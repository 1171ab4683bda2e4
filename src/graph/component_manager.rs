//! Incremental connected-component partitioning over a `MutableGraph`.
//!
//! Holds a borrowed reference to the graph it partitions rather than a
//! back-pointer pair (see the cyclic-ownership note this crate resolved
//! by introducing `Document` as the single owner of both).

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::graph::mutable_graph::MutableGraph;
use crate::id::{ComponentId, IdPool, NodeId};

/// Emitted by `on_edge_removed` when a bridge edge's removal splits a
/// component in two.
#[derive(Debug, Clone)]
pub struct ComponentSplit {
    pub old: ComponentId,
    pub new_ids: Vec<ComponentId>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum State {
    Idle,
    Repartitioning,
}

/// Maintains a `NodeId -> ComponentId` map incrementally as the owning
/// graph is mutated. `ComponentManager` never owns the graph; callers
/// drive it by calling `on_node_added`/`on_edge_added`/`on_edge_removed`/
/// `on_node_removed` from the same place the corresponding `MutableGraph`
/// mutation happens (typically `Document`'s command pump).
pub struct ComponentManager {
    pool: IdPool<ComponentId>,
    node_component: FxHashMap<NodeId, ComponentId>,
    members: FxHashMap<ComponentId, Vec<NodeId>>,
    order: Vec<ComponentId>,
    state: State,
}

impl Default for ComponentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentManager {
    pub fn new() -> Self {
        Self {
            pool: IdPool::new(),
            node_component: FxHashMap::default(),
            members: FxHashMap::default(),
            order: Vec::new(),
            state: State::Idle,
        }
    }

    /// Rebuilds the entire partitioning from scratch via BFS over the
    /// live graph. Used for initial population and to recover from a
    /// cancelled repartition, which must be re-run in full.
    pub fn rebuild(&mut self, graph: &MutableGraph) {
        self.state = State::Repartitioning;
        self.node_component.clear();
        self.members.clear();
        self.order.clear();

        let mut visited = rustc_hash::FxHashSet::default();
        for start in graph.node_ids() {
            // A tail has had every incident edge retargeted to its head by
            // contract/merge, so without this it would BFS to a phantom
            // singleton component of its own rather than being hidden.
            if visited.contains(&start) || graph.is_tail_node(start) {
                continue;
            }
            let component = self.pool.acquire();
            let nodes = bfs_component(graph, start);
            for &node in &nodes {
                visited.insert(node);
                self.node_component.insert(node, component);
            }
            self.members.insert(component, nodes);
            self.order.push(component);
        }

        self.state = State::Idle;
    }

    /// Abandons an in-progress repartition, leaving the table stale. The
    /// next non-cancelled edit must call `rebuild` before querying.
    pub fn cancel(&mut self) {
        self.state = State::Idle;
    }

    pub fn component_of(&self, node: NodeId) -> Option<ComponentId> {
        self.node_component.get(&node).copied()
    }

    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.order.iter().copied()
    }

    pub fn members(&self, component: ComponentId) -> &[NodeId] {
        self.members.get(&component).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn size(&self, component: ComponentId) -> usize {
        self.members(component).len()
    }

    pub fn num_components(&self) -> usize {
        self.order.len()
    }

    /// `addNode`: a new node always starts as its own singleton.
    pub fn on_node_added(&mut self, node: NodeId) {
        let component = self.pool.acquire();
        self.node_component.insert(node, component);
        self.members.insert(component, vec![node]);
        self.order.push(component);
    }

    pub fn on_node_removed(&mut self, node: NodeId) {
        if let Some(component) = self.node_component.remove(&node) {
            if let Some(members) = self.members.get_mut(&component) {
                members.retain(|&n| n != node);
                if members.is_empty() {
                    self.members.remove(&component);
                    self.order.retain(|&c| c != component);
                    self.pool.vacate(component);
                }
            }
        }
    }

    /// `addEdge(u, v)`. If already in the same component this is a
    /// no-op; otherwise merges the smaller component into the larger
    /// one (smaller `ComponentId` wins ties), per the documented
    /// size-based merge policy.
    pub fn on_edge_added(&mut self, u: NodeId, v: NodeId) {
        let cu = self.component_of(u);
        let cv = self.component_of(v);
        let (Some(cu), Some(cv)) = (cu, cv) else {
            return;
        };
        if cu == cv {
            return;
        }

        let (winner, loser) = match self.size(cu).cmp(&self.size(cv)) {
            std::cmp::Ordering::Greater => (cu, cv),
            std::cmp::Ordering::Less => (cv, cu),
            std::cmp::Ordering::Equal => {
                if cu.index() <= cv.index() {
                    (cu, cv)
                } else {
                    (cv, cu)
                }
            }
        };

        let losing_members = self.members.remove(&loser).unwrap_or_default();
        for &node in &losing_members {
            self.node_component.insert(node, winner);
        }
        self.members.entry(winner).or_default().extend(losing_members);
        self.order.retain(|&c| c != loser);
        self.pool.vacate(loser);
    }

    /// `removeEdge`. Runs a BFS bounded to the smaller side to check
    /// whether the endpoints are still connected; if not, the
    /// discovered side becomes a new component and a `ComponentSplit`
    /// is returned. `graph` must already reflect the edge's removal.
    pub fn on_edge_removed(&mut self, graph: &MutableGraph, u: NodeId, v: NodeId) -> Option<ComponentSplit> {
        let old = self.component_of(u)?;
        debug_assert_eq!(self.component_of(v), Some(old), "edge endpoints must share a component before removal");

        if still_connected(graph, u, v) {
            return None;
        }

        let all_members = self.members.remove(&old)?;
        self.order.retain(|&c| c != old);

        let reachable_from_u = bfs_component(graph, u);
        let reachable_set: rustc_hash::FxHashSet<NodeId> = reachable_from_u.iter().copied().collect();
        let (side_a, side_b): (Vec<NodeId>, Vec<NodeId>) =
            all_members.into_iter().partition(|n| reachable_set.contains(n));

        let component_a = self.pool.acquire();
        let component_b = self.pool.acquire();

        for &node in &side_a {
            self.node_component.insert(node, component_a);
        }
        for &node in &side_b {
            self.node_component.insert(node, component_b);
        }
        self.members.insert(component_a, side_a);
        self.members.insert(component_b, side_b);
        self.order.push(component_a);
        self.order.push(component_b);
        self.pool.vacate(old);

        tracing::debug!(?old, a = ?component_a, b = ?component_b, "component split on bridge removal");

        Some(ComponentSplit {
            old,
            new_ids: vec![component_a, component_b],
        })
    }
}

fn bfs_component(graph: &MutableGraph, start: NodeId) -> Vec<NodeId> {
    let mut visited = rustc_hash::FxHashSet::default();
    let mut queue = VecDeque::new();
    let mut order = Vec::new();

    visited.insert(start);
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &edge in graph.out_edges(node).iter().chain(graph.in_edges(node).iter()) {
            let other = if graph.source(edge) == node { graph.target(edge) } else { graph.source(edge) };
            if visited.insert(other) {
                queue.push_back(other);
            }
        }
    }

    order
}

fn still_connected(graph: &MutableGraph, u: NodeId, v: NodeId) -> bool {
    bfs_component(graph, u).contains(&v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_stays_one_component_until_fully_bridged() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        graph.add_edge(a, b);
        graph.add_edge(b, c);
        graph.add_edge(c, a);

        let mut components = ComponentManager::new();
        components.rebuild(&graph);
        assert_eq!(components.num_components(), 1);

        let bc = graph.out_edges(b)[0];
        graph.remove_edge(bc);
        let split = components.on_edge_removed(&graph, b, c);
        assert!(split.is_none(), "still connected via a");

        let remaining_edge_of_c = graph.in_edges(c)[0];
        let (src, _) = (graph.source(remaining_edge_of_c), graph.target(remaining_edge_of_c));
        graph.remove_edge(remaining_edge_of_c);
        let split = components.on_edge_removed(&graph, src, c);
        assert!(split.is_some());
        assert_eq!(components.num_components(), 2);
    }

    #[test]
    fn disconnected_n_nodes_gives_n_components() {
        let mut graph = MutableGraph::new();
        for _ in 0..5 {
            graph.add_node();
        }
        let mut components = ComponentManager::new();
        components.rebuild(&graph);
        assert_eq!(components.num_components(), 5);
    }

    #[test]
    fn barbell_split_preserves_total_membership() {
        let mut graph = MutableGraph::new();
        let left: Vec<_> = (0..10).map(|_| graph.add_node()).collect();
        let right: Vec<_> = (0..10).map(|_| graph.add_node()).collect();
        for i in 0..left.len() {
            for j in (i + 1)..left.len() {
                graph.add_edge(left[i], left[j]);
            }
        }
        for i in 0..right.len() {
            for j in (i + 1)..right.len() {
                graph.add_edge(right[i], right[j]);
            }
        }
        let bridge = graph.add_edge(left[0], right[0]);

        let mut components = ComponentManager::new();
        components.rebuild(&graph);
        assert_eq!(components.num_components(), 1);

        graph.remove_edge(bridge);
        let split = components.on_edge_removed(&graph, left[0], right[0]).expect("bridge removal splits");
        assert_eq!(split.new_ids.len(), 2);
        let total: usize = split.new_ids.iter().map(|&c| components.size(c)).sum();
        assert_eq!(total, 20);
        assert!(components.component_of(left[0]).is_some());
        assert!(!components.component_ids().any(|c| c == split.old), "old component id must be retired");
    }
}
