//! The single owning façade that replaces the source's cyclic
//! `Graph <-> ComponentManager` back-pointer pair: `Document` holds the
//! source `MutableGraph`, its `ComponentManager` (by borrowed reference,
//! never by raw pointer), the attribute registry, the transform
//! pipeline, the shared position storage, the layout thread handle,
//! selection and search, a per-(rendered-)component camera table, and
//! the document-level alert list.
//!
//! It drives the main-thread command pump: apply a command, run the
//! transform pipeline to completion or cancellation, then notify
//! observers in the fixed order `graphChanged`, `attributeValuesChanged`,
//! `selectionChanged`, `alertsChanged`. It is the only caller permitted
//! to `pause_and_wait()` the layout thread before touching anything the
//! layout thread reads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::attribute::{AttributeFlags, AttributeRegistry, ElementType};
use crate::camera::Camera;
use crate::component_layout::{self, Circle, ComponentLayoutPolicy};
use crate::config::EngineConfig;
use crate::error::{Alert, AlertList, AlertSource, GraphError, GraphResult};
use crate::graph::component_manager::ComponentManager;
use crate::graph::mutable_graph::MutableGraph;
use crate::graph::expand_to_merge_sets;
use crate::id::{ComponentId, EdgeId, IdPool, NodeId};
use crate::layout::force_directed::ForceDirectedLayout;
use crate::layout::{self, Dimensionality, Layout, LayoutThread};
use crate::positions::NodePositions;
use crate::search::{FindOptions, FindSelectStyle, SearchManager};
use crate::selection::Selection;
use crate::transform::pipeline::TransformPipeline;
use crate::transform::TransformConfig;
use crate::transformed_graph::{GraphView, TransformedGraph};

/// Fixed-order hooks a `Document` caller subscribes to; every method
/// has a no-op default, matching `GraphObserver`/`SelectionObserver`'s
/// convention of "implement only what you need".
pub trait DocumentObserver: Send + Sync {
    fn graph_changed(&self) {}
    fn attribute_values_changed(&self, _names: &[String]) {}
    fn selection_changed(&self) {}
    fn alerts_changed(&self) {}
}

#[derive(Default)]
struct Observers {
    list: Mutex<Vec<Weak<dyn DocumentObserver>>>,
}

impl Observers {
    fn subscribe(&self, observer: Arc<dyn DocumentObserver>) -> Arc<dyn DocumentObserver> {
        self.list.lock().unwrap().push(Arc::downgrade(&observer));
        observer
    }

    fn notify(&self, f: impl Fn(&dyn DocumentObserver)) {
        let mut list = self.list.lock().unwrap();
        list.retain(|weak| weak.strong_count() > 0);
        for weak in list.iter() {
            if let Some(observer) = weak.upgrade() {
                f(observer.as_ref());
            }
        }
    }
}

/// Plain atomic counters surfaced to a caller (the CLI demo binary) as
/// lightweight diagnostics - explicitly not a metrics-export surface.
#[derive(Default)]
pub struct Diagnostics {
    pipeline_runs: AtomicU64,
    alerts_raised: AtomicU64,
}

impl Diagnostics {
    pub fn pipeline_runs(&self) -> u64 {
        self.pipeline_runs.load(Ordering::Relaxed)
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised.load(Ordering::Relaxed)
    }
}

/// A half-extent for the bounding box new, position-less nodes are
/// scattered within; grows with the component they land in so a huge
/// existing layout doesn't dump new nodes on top of each other.
const DEFAULT_PLACEMENT_HALF_EXTENT: f32 = 50.0;

pub struct Document {
    graph: MutableGraph,
    components: ComponentManager,
    registry: AttributeRegistry,
    configs: Vec<TransformConfig>,
    pipeline: TransformPipeline,
    engine: EngineConfig,

    // The pipeline's output lives one layer down (`TransformPipeline`
    // owns the only `TransformedGraph`); this is the partition of that
    // output's topology, recomputed wholesale after every run since the
    // pipeline's internal mutations aren't individually observable from
    // here the way direct graph edits are. See DESIGN.md for why this
    // is a second, separate `ComponentManager` from `components` above.
    render_components: ComponentManager,
    seen_transformed_ids: FxHashSet<NodeId>,

    position_pool: IdPool<NodeId>,
    positions: Arc<NodePositions>,
    layouts: Arc<Mutex<HashMap<ComponentId, Box<dyn Layout>>>>,
    layout_thread: LayoutThread,
    dimensionality: Dimensionality,
    rng: ChaCha8Rng,

    selection: Selection,
    search: SearchManager,
    cameras: FxHashMap<ComponentId, Camera>,
    component_layout_policy: ComponentLayoutPolicy,
    component_centres: FxHashMap<ComponentId, Circle>,

    alerts: AlertList,
    worker_pool: rayon::ThreadPool,
    pipeline_cancel: AtomicBool,
    observers: Observers,
    diagnostics: Diagnostics,
}

impl Document {
    /// Builds a document with engine parameters read from the process
    /// environment (`LAYOUT_THREADS`, `DEBUG_LAYOUT`); see `EngineConfig::from_env`.
    pub fn new() -> GraphResult<Self> {
        Self::with_engine(EngineConfig::from_env())
    }

    pub fn with_engine(engine: EngineConfig) -> GraphResult<Self> {
        let worker_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(engine.worker_thread_count())
            .build()
            .map_err(|e| GraphError::ResourceExhausted {
                operation: "worker pool init".into(),
                detail: e.to_string(),
            })?;

        let position_pool = IdPool::new();
        let positions = Arc::new(NodePositions::new(&position_pool));
        positions.set_smoothing(engine.layout_smoothing);

        let layouts: Arc<Mutex<HashMap<ComponentId, Box<dyn Layout>>>> = Arc::new(Mutex::new(HashMap::new()));
        let dimensionality = Dimensionality::ThreeDee;
        let mut layout_thread = LayoutThread::new();
        layout_thread.start(layouts.clone(), dimensionality);

        Ok(Self {
            graph: MutableGraph::new(),
            components: ComponentManager::new(),
            registry: AttributeRegistry::new(),
            configs: Vec::new(),
            pipeline: TransformPipeline::new(),
            engine,
            render_components: ComponentManager::new(),
            seen_transformed_ids: FxHashSet::default(),
            position_pool,
            positions,
            layouts,
            layout_thread,
            dimensionality,
            rng: ChaCha8Rng::seed_from_u64(0),
            selection: Selection::new(),
            search: SearchManager::new(),
            cameras: FxHashMap::default(),
            component_layout_policy: ComponentLayoutPolicy::CirclePack,
            component_centres: FxHashMap::default(),
            alerts: AlertList::new(),
            worker_pool,
            pipeline_cancel: AtomicBool::new(false),
            observers: Observers::default(),
            diagnostics: Diagnostics::default(),
        })
    }

    pub fn subscribe(&self, observer: Arc<dyn DocumentObserver>) -> Arc<dyn DocumentObserver> {
        self.observers.subscribe(observer)
    }

    // -- read-only accessors ---------------------------------------------

    pub fn graph(&self) -> &MutableGraph {
        &self.graph
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    pub fn components(&self) -> &ComponentManager {
        &self.components
    }

    pub fn render_components(&self) -> &ComponentManager {
        &self.render_components
    }

    pub fn transformed(&self) -> Option<&TransformedGraph> {
        self.pipeline.last_transformed()
    }

    pub fn transform_configs(&self) -> &[TransformConfig] {
        &self.configs
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn search(&self) -> &SearchManager {
        &self.search
    }

    pub fn alerts(&self) -> &AlertList {
        &self.alerts
    }

    pub fn positions(&self) -> &Arc<NodePositions> {
        &self.positions
    }

    pub fn camera(&self, component: ComponentId) -> Option<&Camera> {
        self.cameras.get(&component)
    }

    pub fn camera_mut(&mut self, component: ComponentId) -> &mut Camera {
        self.cameras.entry(component).or_default()
    }

    pub fn cameras(&self) -> impl Iterator<Item = (ComponentId, &Camera)> {
        self.cameras.iter().map(|(&id, camera)| (id, camera))
    }

    /// Overwrites (or inserts) the camera for `component` wholesale -
    /// used by save/load, which restores a whole camera table rather
    /// than nudging one camera's fields.
    pub fn set_camera(&mut self, component: ComponentId, camera: Camera) {
        self.cameras.insert(component, camera);
    }

    /// Writes a position directly, bypassing the layout thread and the
    /// random-placement path `sync_render_state` otherwise uses for
    /// newly-seen nodes. Save/load is the only caller: it runs after
    /// the transform pipeline has already re-minted `node`'s id
    /// deterministically from a replayed source graph and config list,
    /// so `node` here is a `TransformedGraph`-space id, not a source one.
    pub fn restore_position(&self, node: NodeId, position: glam::Vec3) {
        let layout_positions = crate::positions::NodeLayoutPositions::new(&self.positions);
        layout_positions.set(node, position);
    }

    pub fn component_layout_policy(&self) -> ComponentLayoutPolicy {
        self.component_layout_policy
    }

    pub fn set_component_layout_policy(&mut self, policy: ComponentLayoutPolicy) {
        self.component_layout_policy = policy;
        self.recompute_component_layout();
    }

    pub fn component_circle(&self, component: ComponentId) -> Option<Circle> {
        self.component_centres.get(&component).copied()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn cache_hit_count(&self) -> u64 {
        self.pipeline.cache_hit_count()
    }

    // -- graph editing commands -------------------------------------------

    pub fn add_node(&mut self) -> NodeId {
        let id = self.graph.add_node();
        self.components.on_node_added(id);
        self.commit_graph_change();
        id
    }

    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> EdgeId {
        let id = self.graph.add_edge(source, target);
        self.components.on_edge_added(source, target);
        self.commit_graph_change();
        id
    }

    pub fn remove_edge(&mut self, id: EdgeId) {
        let source = self.graph.source(id);
        let target = self.graph.target(id);
        self.graph.remove_edge(id);
        self.components.on_edge_removed(&self.graph, source, target);
        self.commit_graph_change();
    }

    /// Removing a node may remove several incident edges in one batch;
    /// rather than try to replay `on_edge_removed` mid-removal (the
    /// BFS it relies on needs a graph view that's only valid between
    /// individual edge removals), this rebuilds `components` from
    /// scratch afterwards. Node removal is not a hot path the way a
    /// single edge add/remove is, so the O(n) rebuild is cheap enough.
    pub fn remove_node(&mut self, id: NodeId) {
        self.graph.remove_node(id);
        self.components.rebuild(&self.graph);
        self.commit_graph_change();
    }

    /// Contracting preserves component membership (the endpoints of a
    /// contracted edge were already in the same component), so no
    /// `ComponentManager` update is needed beyond the implicit no-op.
    pub fn contract_edges(&mut self, edges: impl IntoIterator<Item = EdgeId>) {
        self.graph.contract_edges(edges);
        self.commit_graph_change();
    }

    /// An explicit merge can join two previously disjoint components
    /// (unlike `contract_edges`, there is no edge requiring them to
    /// already share one), so `components` is rebuilt rather than
    /// reasoned through incrementally.
    pub fn merge_nodes(&mut self, nodes: impl IntoIterator<Item = NodeId>) -> NodeId {
        let head = self.graph.merge_nodes(nodes);
        self.components.rebuild(&self.graph);
        self.commit_graph_change();
        head
    }

    pub fn register_attribute(
        &mut self,
        name: impl Into<String>,
        element_type: ElementType,
        flags: AttributeFlags,
        value_fn: impl Fn(u32) -> Option<crate::attribute::AttrValue> + Send + Sync + 'static,
    ) -> GraphResult<()> {
        self.registry.register(name, element_type, flags, value_fn)?;
        self.commit_graph_change();
        Ok(())
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.registry.remove(name);
        self.commit_graph_change();
    }

    pub fn set_transform_configs(&mut self, configs: Vec<TransformConfig>) {
        self.configs = configs;
        self.commit_graph_change();
    }

    pub fn cancel_pipeline(&self) {
        self.pipeline_cancel.store(true, Ordering::Relaxed);
    }

    // -- selection & search -------------------------------------------------
    // Selection and search operate in the source graph's NodeId space,
    // independent of the transform pipeline's output.

    pub fn select(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.with_selection_diff(|s| s.select(ids));
    }

    pub fn deselect(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.with_selection_diff(|s| s.deselect(ids));
    }

    pub fn toggle_selection(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.with_selection_diff(|s| s.toggle(ids));
    }

    pub fn select_all(&mut self) {
        let all: Vec<NodeId> = self.graph.node_ids().collect();
        self.with_selection_diff(|s| s.select_all(all));
    }

    pub fn clear_selection(&mut self) {
        self.with_selection_diff(Selection::clear);
    }

    pub fn invert_selection(&mut self) {
        let all: Vec<NodeId> = self.graph.node_ids().collect();
        self.with_selection_diff(|s| s.invert(all));
    }

    fn with_selection_diff(&mut self, f: impl FnOnce(&mut Selection)) {
        let before: FxHashSet<NodeId> = self.selection.iter().collect();
        f(&mut self.selection);
        let after: FxHashSet<NodeId> = self.selection.iter().collect();
        if before != after {
            self.observers.notify(|o| o.selection_changed());
        }
    }

    pub fn find_nodes(
        &mut self,
        term: impl Into<String>,
        options: FindOptions,
        attribute_names: Vec<String>,
        select_style: FindSelectStyle,
    ) -> bool {
        let changed_found = self.search.find_nodes(&self.graph, &self.registry, term, options, attribute_names, select_style);
        let before: FxHashSet<NodeId> = self.selection.iter().collect();
        self.search.apply_to_selection(&mut self.selection);
        let after: FxHashSet<NodeId> = self.selection.iter().collect();
        if before != after {
            self.observers.notify(|o| o.selection_changed());
        }
        changed_found
    }

    /// Expands the current selection to full merge sets, the same
    /// helper `findNodes`'s `All` style routes through - the Open
    /// Question's "one shared helper" resolution applies here too, so
    /// zoom-to-selection and search can never disagree on whether a
    /// tail-node hit should pull its head's whole merge set along.
    /// Resolving this into actual camera parameters is left to the
    /// caller: `TransformedGraph` mints its own NodeIds independent of
    /// the source graph's, so Document has no source-id -> rendered-id
    /// mapping to drive a camera frame from directly (see DESIGN.md).
    pub fn zoom_to_selection(&self) -> FxHashSet<NodeId> {
        expand_to_merge_sets(&self.graph, self.selection.iter())
    }

    // -- layout thread control -----------------------------------------------

    pub fn dimensionality(&self) -> Dimensionality {
        self.dimensionality
    }

    pub fn set_dimensionality(&mut self, dimensionality: Dimensionality) {
        if self.dimensionality == dimensionality {
            return;
        }
        self.dimensionality = dimensionality;
        self.layout_thread.pause_and_wait();
        if dimensionality == Dimensionality::TwoDee {
            self.positions.flatten();
        }
        // Restarting from `FineTune` rather than `Initial` is handled
        // inside `ForceDirectedLayout::execute` itself on the 2D switch;
        // the 3D switch needs no special handling here.
        self.layout_thread.resume();
    }

    pub fn pause_layout(&self) {
        self.layout_thread.pause();
    }

    pub fn resume_layout(&self) {
        self.layout_thread.resume();
    }

    pub fn stop_layout(&mut self) {
        self.layout_thread.stop();
    }

    // -- the command pump ----------------------------------------------------

    /// Runs the transform pipeline to completion (or cancellation),
    /// rebuilds the render-side component partition and per-component
    /// layouts from its output, seeds positions for newly-appeared
    /// nodes, and notifies observers in the documented order.
    fn commit_graph_change(&mut self) {
        self.layout_thread.pause_and_wait();
        self.pipeline_cancel.store(false, Ordering::Relaxed);

        let run_alerts = {
            let Document { worker_pool, pipeline, graph, registry, configs, engine, pipeline_cancel, .. } = self;
            worker_pool
                .install(|| pipeline.run(&*graph, registry, configs.as_slice(), &*engine, &*pipeline_cancel))
                .1
        };

        let run = self.diagnostics.pipeline_runs.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            run,
            nodes = self.graph.num_nodes(),
            edges = self.graph.num_edges(),
            steps = self.configs.len(),
            "pipeline run complete"
        );
        self.observers.notify(|o| o.graph_changed());

        let synthesised: Vec<String> = self.pipeline.synthesised_attribute_names().to_vec();
        if !synthesised.is_empty() {
            self.observers.notify(|o| o.attribute_values_changed(&synthesised));
        }

        self.sync_render_state();

        if self.search.active() {
            self.search.refresh(&self.graph, &self.registry);
        }

        if !run_alerts.iter().next().is_none() {
            self.diagnostics.alerts_raised.fetch_add(run_alerts.iter().count() as u64, Ordering::Relaxed);
            for alert in run_alerts.iter() {
                self.alerts.push(alert.clone());
            }
            self.observers.notify(|o| o.alerts_changed());
        }

        self.layout_thread.resume();
    }

    /// Rebuilds `render_components`, seeds positions for nodes new to
    /// this pipeline output, and refreshes the per-component layout
    /// set and camera/component-circle tables to match.
    fn sync_render_state(&mut self) {
        let Some(transformed) = self.pipeline.last_transformed() else { return };

        self.render_components.rebuild(transformed.mutable_graph());

        let current_ids: FxHashSet<NodeId> = transformed.node_ids().collect();
        let max_index = current_ids.iter().map(|n| n.index()).max().map(|m| m + 1).unwrap_or(0);
        self.position_pool.ensure_capacity(max_index);

        let new_nodes: Vec<NodeId> = current_ids.difference(&self.seen_transformed_ids).copied().collect();
        if !new_nodes.is_empty() {
            layout::initialise_new_positions(&self.positions, new_nodes.into_iter(), &mut self.rng, DEFAULT_PLACEMENT_HALF_EXTENT);
        }
        self.seen_transformed_ids = current_ids;

        self.rebuild_layouts(transformed);
        self.recompute_component_layout();
    }

    fn rebuild_layouts(&mut self, transformed: &TransformedGraph) {
        let mut layouts = self.layouts.lock().unwrap();
        let live_components: FxHashSet<ComponentId> = self.render_components.component_ids().collect();
        layouts.retain(|id, _| live_components.contains(id));

        // Resolved here, not on the layout thread: `Document` is the only
        // place holding both a live `AttributeRegistry` and real `EdgeId`s,
        // per the single-writer-main-thread locking discipline.
        let weight_attr = self.registry.get("Weight").ok();

        for component in self.render_components.component_ids() {
            let members = self.render_components.members(component);
            let edges: Vec<(NodeId, NodeId, f32)> = transformed
                .edge_ids()
                .filter(|e| {
                    self.render_components.component_of(transformed.source(*e)) == Some(component)
                })
                .map(|e| {
                    let weight = weight_attr
                        .and_then(|attr| attr.value_for_edge(e))
                        .and_then(|v| v.as_f64())
                        .map(|v| v as f32)
                        .unwrap_or(1.0);
                    (transformed.source(e), transformed.target(e), weight)
                })
                .collect();

            match layouts.get_mut(&component) {
                Some(existing) => {
                    if let Some(force_directed) = existing.as_any_mut().downcast_mut::<ForceDirectedLayout>() {
                        force_directed.set_edges(edges);
                        force_directed.unfinish();
                    }
                }
                None => {
                    let mut layout = ForceDirectedLayout::new(
                        members.to_vec(),
                        self.positions.clone(),
                        self.engine.theta,
                        self.engine.layout_scaling,
                        self.engine.max_nodes_per_leaf,
                    );
                    layout.set_edges(edges);
                    layouts.insert(component, Box::new(layout));
                }
            }
        }
    }

    fn recompute_component_layout(&mut self) {
        let sizes: FxHashMap<ComponentId, usize> =
            self.render_components.component_ids().map(|c| (c, self.render_components.size(c))).collect();

        let circles = component_layout::compute(self.component_layout_policy, &sizes, 1.0);

        let previous_centres: FxHashMap<ComponentId, glam::Vec2> =
            self.component_centres.iter().map(|(&id, circle)| (id, circle.center)).collect();
        let current_ids: Vec<ComponentId> = circles.keys().copied().collect();
        let carried = component_layout::interpolate_positions(&previous_centres, &current_ids, &[]);

        self.component_centres = circles
            .into_iter()
            .map(|(id, mut circle)| {
                if let Some(&centre) = carried.get(&id) {
                    circle.center = centre;
                }
                (id, circle)
            })
            .collect();

        self.cameras.retain(|id, _| self.component_centres.contains_key(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::config::ParamValue;
    use crate::transform::condition::{CompareOp, ConditionNode, Literal};

    fn test_document() -> Document {
        Document::with_engine(EngineConfig::for_tests()).expect("worker pool should build in tests")
    }

    #[test]
    fn triangle_add_then_remove_edges_keeps_one_component() {
        let mut doc = test_document();
        let a = doc.add_node();
        let b = doc.add_node();
        let c = doc.add_node();
        let ab = doc.add_edge(a, b);
        doc.add_edge(b, c);
        doc.add_edge(c, a);

        assert_eq!(doc.components().num_components(), 1);
        assert_eq!(doc.transformed().unwrap().num_nodes(), 3);

        doc.remove_edge(ab);
        assert_eq!(doc.components().num_components(), 1, "still connected via b-c-a");
    }

    #[test]
    fn filter_by_degree_drops_leaves_from_the_rendered_view() {
        let mut doc = test_document();
        let a = doc.add_node();
        let b = doc.add_node();
        let c = doc.add_node();
        doc.add_edge(a, b);
        doc.add_edge(b, c);

        doc.set_transform_configs(vec![TransformConfig::new("filter")
            .with_parameter("element", ParamValue::Text("node".into()))
            .with_condition(ConditionNode::compare("$degree", CompareOp::Lt, Literal::Number(2.0)))]);

        let view = doc.transformed().unwrap();
        assert_eq!(view.num_nodes(), 1, "only the degree-2 middle node should survive");
    }

    #[test]
    fn contract_low_weight_edges_merges_endpoints() {
        let mut doc = test_document();
        let a = doc.add_node();
        let b = doc.add_node();
        doc.add_edge(a, b);

        doc.contract_edges(doc.graph().out_edges(a).to_vec());
        assert!(doc.graph().is_tail_node(b));
    }

    #[test]
    fn component_split_on_bridge_removal() {
        let mut doc = test_document();
        let left: Vec<NodeId> = (0..4).map(|_| doc.add_node()).collect();
        let right: Vec<NodeId> = (0..4).map(|_| doc.add_node()).collect();
        for i in 0..left.len() {
            for j in (i + 1)..left.len() {
                doc.add_edge(left[i], left[j]);
            }
        }
        for i in 0..right.len() {
            for j in (i + 1)..right.len() {
                doc.add_edge(right[i], right[j]);
            }
        }
        let bridge = doc.add_edge(left[0], right[0]);
        assert_eq!(doc.components().num_components(), 1);

        doc.remove_edge(bridge);
        assert_eq!(doc.components().num_components(), 2);
    }

    #[test]
    fn search_selects_matching_merge_sets() {
        let mut doc = test_document();
        let a = doc.add_node();
        let b = doc.add_node();
        doc.add_edge(a, b);
        doc.register_attribute("Label", ElementType::Node, AttributeFlags::SEARCHABLE, move |id| {
            if id == a.index() as u32 {
                Some(crate::attribute::AttrValue::String("apple".into()))
            } else if id == b.index() as u32 {
                Some(crate::attribute::AttrValue::String("banana".into()))
            } else {
                None
            }
        })
        .unwrap();

        doc.find_nodes("apple", FindOptions::empty(), vec![], FindSelectStyle::All);
        assert!(doc.selection().contains(a));
        assert!(!doc.selection().contains(b));
    }

    #[test]
    fn zoom_to_selection_expands_to_merge_set() {
        let mut doc = test_document();
        let a = doc.add_node();
        let b = doc.add_node();
        doc.add_edge(a, b);
        doc.contract_edges(doc.graph().out_edges(a).to_vec());

        doc.select([a]);
        let expanded = doc.zoom_to_selection();
        assert!(expanded.contains(&a));
        assert!(expanded.contains(&b));
    }

    #[test]
    fn pipeline_runs_counter_advances_per_command() {
        let mut doc = test_document();
        assert_eq!(doc.diagnostics().pipeline_runs(), 0);
        doc.add_node();
        assert_eq!(doc.diagnostics().pipeline_runs(), 1);
        doc.add_node();
        assert_eq!(doc.diagnostics().pipeline_runs(), 2);
    }
}
