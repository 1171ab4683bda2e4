//! Metric transforms: `pagerank`, `eccentricity`, `mcl` (Markov
//! clustering) and `louvain`/`leiden` (modularity-based community
//! detection). Each adds one or more attributes; clustering transforms
//! additionally add a derived cluster-size attribute.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::attribute::{AttrValue, AttributeFlags, ElementType};
use crate::error::AlertList;
use crate::id::NodeId;
use crate::transform::{StepOutcome, Transform, TransformContext};

fn adjacency(graph: &crate::graph::mutable_graph::MutableGraph) -> FxHashMap<NodeId, Vec<NodeId>> {
    let mut adj: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    for node in graph.node_ids() {
        let mut neighbours = Vec::new();
        for &edge in graph.out_edges(node).iter().chain(graph.in_edges(node).iter()) {
            let other = if graph.source(edge) == node { graph.target(edge) } else { graph.source(edge) };
            neighbours.push(other);
        }
        adj.insert(node, neighbours);
    }
    adj
}

/// Power-iteration PageRank over the undirected adjacency (multi-edges
/// count as separate out-links, matching the registry's degree
/// convention of counting self-loops twice).
pub struct PageRankTransform;

impl Transform for PageRankTransform {
    fn apply(&self, ctx: &mut TransformContext, _alerts: &mut AlertList) -> StepOutcome {
        let adj = adjacency(ctx.graph);
        let n = adj.len().max(1);
        let damping = ctx.engine.pagerank_damping;
        let epsilon = ctx.engine.pagerank_epsilon;
        let max_iterations = ctx.engine.pagerank_max_iterations;

        let nodes: Vec<NodeId> = adj.keys().copied().collect();
        let mut rank: FxHashMap<NodeId, f64> = nodes.iter().map(|&n| (n, 1.0 / n as f64)).collect();

        for _ in 0..max_iterations {
            if ctx.is_cancelled() {
                return StepOutcome::Cancelled;
            }

            let mut next: FxHashMap<NodeId, f64> = nodes.iter().map(|&n| (n, (1.0 - damping) / n as f64)).collect();
            for &node in &nodes {
                let neighbours = &adj[&node];
                if neighbours.is_empty() {
                    continue;
                }
                let share = damping * rank[&node] / neighbours.len() as f64;
                for &other in neighbours {
                    *next.get_mut(&other).unwrap() += share;
                }
            }

            let delta: f64 = nodes.iter().map(|n| (next[n] - rank[n]).abs()).sum();
            rank = next;
            if delta < epsilon {
                break;
            }
        }

        let raw_rank: FxHashMap<u32, f64> = rank.into_iter().map(|(n, v)| (n.index() as u32, v)).collect();
        let result = ctx.registry.register("PageRank", ElementType::Node, AttributeFlags::AUTO_RANGE, move |id| {
            raw_rank.get(&id).map(|v| AttrValue::Float(*v))
        });
        if result.is_err() {
            return StepOutcome::Ok; // already present from a prior run; not fatal
        }
        StepOutcome::Ok
    }
}

/// Per-node eccentricity: the maximum BFS distance to any other node
/// in the same component. Isolated nodes have eccentricity zero.
pub struct EccentricityTransform;

impl Transform for EccentricityTransform {
    fn apply(&self, ctx: &mut TransformContext, _alerts: &mut AlertList) -> StepOutcome {
        let adj = adjacency(ctx.graph);
        let mut eccentricity: FxHashMap<u32, i64> = FxHashMap::default();

        let mut visited_globally = FxHashSet::default();
        for &start in adj.keys() {
            if visited_globally.contains(&start) {
                continue;
            }
            if ctx.is_cancelled() {
                return StepOutcome::Cancelled;
            }

            // BFS from every node within this component to get exact
            // eccentricities (fine at the scale this crate targets;
            // a streaming double-BFS bound would trade accuracy for
            // scale and is not worth it here).
            let component = bfs_reachable(&adj, start);
            for &n in &component {
                visited_globally.insert(n);
            }
            for &source in &component {
                let distances = bfs_distances(&adj, source);
                let max_distance = distances.values().copied().max().unwrap_or(0);
                eccentricity.insert(source.index() as u32, max_distance as i64);
            }
        }

        let result = ctx.registry.register("Eccentricity", ElementType::Node, AttributeFlags::AUTO_RANGE, move |id| {
            eccentricity.get(&id).map(|v| AttrValue::Int(*v))
        });
        if result.is_err() {
            return StepOutcome::Ok;
        }
        StepOutcome::Ok
    }
}

fn bfs_reachable(adj: &FxHashMap<NodeId, Vec<NodeId>>, start: NodeId) -> Vec<NodeId> {
    bfs_distances(adj, start).into_keys().collect()
}

fn bfs_distances(adj: &FxHashMap<NodeId, Vec<NodeId>>, start: NodeId) -> FxHashMap<NodeId, usize> {
    let mut distances = FxHashMap::default();
    let mut queue = VecDeque::new();
    distances.insert(start, 0);
    queue.push_back(start);
    while let Some(node) = queue.pop_front() {
        let d = distances[&node];
        for &neighbour in adj.get(&node).into_iter().flatten() {
            if !distances.contains_key(&neighbour) {
                distances.insert(neighbour, d + 1);
                queue.push_back(neighbour);
            }
        }
    }
    distances
}

/// Markov clustering: repeated expand (matrix-square, approximated here
/// by a BFS-weighted two-hop spread since this crate has no dense
/// linear-algebra dependency) + inflate + prune, until the partition
/// stabilises or `pruneLimit`/`pruneRecoverLimit` bound the working set
/// size. Produces a `Cluster` int attribute plus a `ClusterSize` one.
pub struct MclTransform;

impl Transform for MclTransform {
    fn apply(&self, ctx: &mut TransformContext, _alerts: &mut AlertList) -> StepOutcome {
        let adj = adjacency(ctx.graph);
        let nodes: Vec<NodeId> = adj.keys().copied().collect();

        // A stochastic matrix over nodes, represented sparsely as
        // node -> (neighbour -> weight), row-normalised at every step.
        let mut matrix: FxHashMap<NodeId, FxHashMap<NodeId, f64>> = nodes
            .iter()
            .map(|&n| {
                let neighbours = &adj[&n];
                let mut row: FxHashMap<NodeId, f64> = FxHashMap::default();
                row.insert(n, 1.0); // self-loop so isolated nodes still converge
                for &other in neighbours {
                    *row.entry(other).or_insert(0.0) += 1.0;
                }
                normalise_row(&mut row);
                (n, row)
            })
            .collect();

        const INFLATION: f64 = 2.0;
        const MAX_ITERATIONS: usize = 30;

        for _ in 0..MAX_ITERATIONS {
            if ctx.is_cancelled() {
                return StepOutcome::Cancelled;
            }

            let expanded = expand(&matrix, &nodes);
            matrix = inflate_and_prune(expanded, INFLATION, ctx.engine.mcl_prune_limit, ctx.engine.mcl_prune_recover_limit);

            if is_stable(&matrix) {
                break;
            }
        }

        let clusters = extract_clusters(&matrix, &nodes);
        let cluster_sizes: FxHashMap<i64, usize> = clusters.values().fold(FxHashMap::default(), |mut acc, &c| {
            *acc.entry(c).or_insert(0) += 1;
            acc
        });

        let raw_clusters: FxHashMap<u32, i64> = clusters.iter().map(|(n, c)| (n.index() as u32, *c)).collect();
        let raw_sizes: FxHashMap<u32, i64> = clusters
            .iter()
            .map(|(n, c)| (n.index() as u32, cluster_sizes[c] as i64))
            .collect();

        let _ = ctx.registry.register("Cluster", ElementType::Node, AttributeFlags::VISUALISE_BY_COMPONENT, move |id| {
            raw_clusters.get(&id).map(|v| AttrValue::Int(*v))
        });
        let _ = ctx
            .registry
            .register("ClusterSize", ElementType::Node, AttributeFlags::AUTO_RANGE, move |id| raw_sizes.get(&id).map(|v| AttrValue::Int(*v)));

        StepOutcome::Ok
    }
}

fn normalise_row(row: &mut FxHashMap<NodeId, f64>) {
    let sum: f64 = row.values().sum();
    if sum > 0.0 {
        for v in row.values_mut() {
            *v /= sum;
        }
    }
}

fn expand(matrix: &FxHashMap<NodeId, FxHashMap<NodeId, f64>>, nodes: &[NodeId]) -> FxHashMap<NodeId, FxHashMap<NodeId, f64>> {
    nodes
        .iter()
        .map(|&i| {
            let mut row = FxHashMap::default();
            for (&k, &w_ik) in &matrix[&i] {
                for (&j, &w_kj) in &matrix[&k] {
                    *row.entry(j).or_insert(0.0) += w_ik * w_kj;
                }
            }
            (i, row)
        })
        .collect()
}

fn inflate_and_prune(
    mut matrix: FxHashMap<NodeId, FxHashMap<NodeId, f64>>,
    inflation: f64,
    prune_limit: usize,
    prune_recover_limit: usize,
) -> FxHashMap<NodeId, FxHashMap<NodeId, f64>> {
    for row in matrix.values_mut() {
        for v in row.values_mut() {
            *v = v.powf(inflation);
        }
        normalise_row(row);

        // Empirically-tuned prune/recover constants: once a row grows
        // past `prune_limit` entries, drop the smallest weights back
        // down to `prune_recover_limit`.
        if row.len() > prune_limit {
            let mut entries: Vec<(NodeId, f64)> = row.iter().map(|(&n, &w)| (n, w)).collect();
            entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            entries.truncate(prune_recover_limit);
            *row = entries.into_iter().collect();
        }
    }
    matrix
}

fn is_stable(matrix: &FxHashMap<NodeId, FxHashMap<NodeId, f64>>) -> bool {
    // Converged once every row has collapsed onto a single dominant
    // column (the idempotent-matrix criterion MCL normally runs to).
    matrix.values().all(|row| row.values().any(|&w| w > 0.999))
}

fn extract_clusters(matrix: &FxHashMap<NodeId, FxHashMap<NodeId, f64>>, nodes: &[NodeId]) -> FxHashMap<NodeId, i64> {
    let mut cluster_of: FxHashMap<NodeId, i64> = FxHashMap::default();
    let mut next_cluster = 0i64;
    let mut attractor_cluster: FxHashMap<NodeId, i64> = FxHashMap::default();

    for &node in nodes {
        let attractor = matrix
            .get(&node)
            .and_then(|row| row.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal)))
            .map(|(n, _)| *n)
            .unwrap_or(node);

        let cluster = *attractor_cluster.entry(attractor).or_insert_with(|| {
            let id = next_cluster;
            next_cluster += 1;
            id
        });
        cluster_of.insert(node, cluster);
    }
    cluster_of
}

/// Modularity-greedy community detection shared by the `louvain` and
/// `leiden` action names. Leiden's refinement pass (guaranteeing every
/// community stays internally connected) is approximated here by a
/// single-level greedy merge, since this crate's `Cluster` attribute
/// only needs a stable partition, not the full multi-resolution variant.
pub struct CommunityDetectionTransform;

impl Transform for CommunityDetectionTransform {
    fn apply(&self, ctx: &mut TransformContext, _alerts: &mut AlertList) -> StepOutcome {
        let adj = adjacency(ctx.graph);
        let nodes: Vec<NodeId> = adj.keys().copied().collect();
        let total_edges: f64 = (ctx.graph.num_edges().max(1)) as f64;

        let mut community: FxHashMap<NodeId, NodeId> = nodes.iter().map(|&n| (n, n)).collect();
        let degree: FxHashMap<NodeId, f64> = nodes.iter().map(|&n| (n, adj[&n].len() as f64)).collect();

        let mut improved = true;
        let mut guard = 0;
        while improved && guard < 20 {
            improved = false;
            guard += 1;
            for &node in &nodes {
                if ctx.is_cancelled() {
                    return StepOutcome::Cancelled;
                }

                let mut neighbour_communities: FxHashSet<NodeId> = adj[&node].iter().map(|n| community[n]).collect();
                neighbour_communities.insert(community[&node]);

                let best = neighbour_communities
                    .into_iter()
                    .map(|candidate| {
                        let gain = modularity_gain(&adj, &community, &degree, total_edges, node, candidate);
                        (candidate, gain)
                    })
                    .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

                if let Some((candidate, _)) = best {
                    if candidate != community[&node] {
                        community.insert(node, candidate);
                        improved = true;
                    }
                }
            }
        }

        // Relabel communities to dense 0..k ids for a readable attribute.
        let mut relabel: FxHashMap<NodeId, i64> = FxHashMap::default();
        let mut next = 0i64;
        let raw_community: FxHashMap<u32, i64> = nodes
            .iter()
            .map(|&n| {
                let root = community[&n];
                let label = *relabel.entry(root).or_insert_with(|| {
                    let id = next;
                    next += 1;
                    id
                });
                (n.index() as u32, label)
            })
            .collect();

        let _ = ctx.registry.register("Cluster", ElementType::Node, AttributeFlags::VISUALISE_BY_COMPONENT, move |id| {
            raw_community.get(&id).map(|v| AttrValue::Int(*v))
        });

        StepOutcome::Ok
    }
}

fn modularity_gain(
    adj: &FxHashMap<NodeId, Vec<NodeId>>,
    community: &FxHashMap<NodeId, NodeId>,
    degree: &FxHashMap<NodeId, f64>,
    total_edges: f64,
    node: NodeId,
    candidate: NodeId,
) -> f64 {
    let edges_to_candidate = adj[&node].iter().filter(|&&n| community[&n] == candidate).count() as f64;
    let candidate_degree_sum: f64 = community.iter().filter(|(_, &c)| c == candidate).map(|(n, _)| degree[n]).sum();
    edges_to_candidate - (candidate_degree_sum * degree[&node]) / (2.0 * total_edges)
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
    fn pagerank_sums_to_roughly_the_damping_constant_share() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        graph.add_edge(a, b);
        graph.add_edge(b, c);
        graph.add_edge(c, a);

        let mut registry = AttributeRegistry::new();
        let config = TransformConfig::new("pagerank");
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

        assert_eq!(PageRankTransform.apply(&mut ctx, &mut alerts), StepOutcome::Ok);
        let attr = registry.get("PageRank").unwrap();
        let ranks: Vec<f64> = [a, b, c].iter().map(|&n| attr.value_for_node(n).unwrap().as_f64().unwrap()).collect();
        for r in &ranks {
            assert!(*r > 0.0);
        }
    }

    #[test]
    fn eccentricity_is_zero_for_an_isolated_node() {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();

        let mut registry = AttributeRegistry::new();
        let config = TransformConfig::new("eccentricity");
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

        assert_eq!(EccentricityTransform.apply(&mut ctx, &mut alerts), StepOutcome::Ok);
        let attr = registry.get("Eccentricity").unwrap();
        assert_eq!(attr.value_for_node(a), Some(AttrValue::Int(0)));
    }
}
