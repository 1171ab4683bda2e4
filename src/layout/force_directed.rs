//! Per-component force-directed layout with Barnes-Hut repulsion and a
//! three-phase convergence detector (`Initial -> FineTune -> Oscillate
//! -> Finished`).

use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec3;
use rayon::prelude::*;

use crate::layout::{Dimensionality, Layout};
use crate::positions::NodeLayoutPositions;
use crate::spatial::SpatialTree;

const FINETUNE_DELTA_SAMPLE_SIZE: usize = 50;
const OSCILLATE_DELTA_SAMPLE_SIZE: usize = 500;
const OSCILLATION_GUARD_ITERATIONS: usize = 150;

const INITIAL_THRESHOLD: f32 = 1.0;
const FINETUNE_THRESHOLD: f32 = 0.08;
const OSCILLATE_THRESHOLD: f32 = 0.02;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ChangeDetectionPhase {
    Initial,
    FineTune,
    Oscillate,
    Finished,
}

/// A fixed-capacity ring buffer of recent samples plus a running
/// standard deviation, mirroring the source's `CircularBuffer<float,N>`.
struct SampleRing {
    samples: Vec<f32>,
    capacity: usize,
    cursor: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self { samples: Vec::with_capacity(capacity), capacity, cursor: 0 }
    }

    fn push(&mut self, value: f32) {
        if self.samples.len() < self.capacity {
            self.samples.push(value);
        } else {
            self.samples[self.cursor] = value;
            self.cursor = (self.cursor + 1) % self.capacity;
        }
    }

    fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    fn std_dev(&self) -> f32 {
        if self.samples.is_empty() {
            return f32::MAX;
        }
        let mean = self.samples.iter().sum::<f32>() / self.samples.len() as f32;
        let variance = self.samples.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / self.samples.len() as f32;
        variance.sqrt()
    }
}

pub struct ForceDirectedLayout {
    node_ids: Vec<crate::id::NodeId>,
    positions: std::sync::Arc<crate::positions::NodePositions>,
    theta: f32,
    scaling: f32,
    max_nodes_per_leaf: usize,

    prev_std_devs: SampleRing,
    prev_avg_forces: SampleRing,
    prev_capture_std_devs: SampleRing,
    phase: ChangeDetectionPhase,
    increasing_std_dev_iterations: usize,
    prev_unstable_std_dev: f32,
    has_been_flattened: bool,

    previous_displacement: rustc_hash::FxHashMap<crate::id::NodeId, Vec3>,

    /// This component's edges as of the last `set_edges` call, each with
    /// its spring weight already resolved from the `Weight` edge
    /// attribute (or defaulted to `1.0`) by `Document`, which is the only
    /// place with both a live `AttributeRegistry` and real `EdgeId`s -
    /// the layout thread itself never touches the registry. Document
    /// refreshes this whenever the transform pipeline produces a new
    /// topology, while the layout thread is paused, so `execute` never
    /// observes a torn graph.
    edges: Vec<(crate::id::NodeId, crate::id::NodeId, f32)>,
}

impl ForceDirectedLayout {
    pub fn new(
        node_ids: Vec<crate::id::NodeId>,
        positions: std::sync::Arc<crate::positions::NodePositions>,
        theta: f32,
        scaling: f32,
        max_nodes_per_leaf: usize,
    ) -> Self {
        Self {
            node_ids,
            positions,
            theta,
            scaling,
            max_nodes_per_leaf,
            prev_std_devs: SampleRing::new(FINETUNE_DELTA_SAMPLE_SIZE),
            prev_avg_forces: SampleRing::new(FINETUNE_DELTA_SAMPLE_SIZE),
            prev_capture_std_devs: SampleRing::new(OSCILLATE_DELTA_SAMPLE_SIZE),
            phase: ChangeDetectionPhase::Initial,
            increasing_std_dev_iterations: 0,
            prev_unstable_std_dev: 0.0,
            has_been_flattened: false,
            previous_displacement: rustc_hash::FxHashMap::default(),
            edges: Vec::new(),
        }
    }

    /// Replaces this component's edge set, e.g. after a transform run
    /// changes topology, each paired with its already-resolved spring
    /// weight (see `edges`' own doc comment). Does not reset convergence
    /// state on its own; callers that want re-convergence call `unfinish`
    /// separately.
    pub fn set_edges(&mut self, edges: Vec<(crate::id::NodeId, crate::id::NodeId, f32)>) {
        self.edges = edges;
    }

    fn run_iteration(&mut self, dimensionality: Dimensionality, cancel: &AtomicBool) -> Option<f32> {
        let dims = match dimensionality {
            Dimensionality::TwoDee => 2,
            _ => 3,
        };

        let layout_positions = NodeLayoutPositions::new(&self.positions);
        let positions_snapshot: Vec<(crate::id::NodeId, Vec3)> =
            self.node_ids.iter().map(|&n| (n, layout_positions.get(n))).collect();

        if cancel.load(Ordering::Relaxed) {
            return None;
        }

        let tree = SpatialTree::build(&positions_snapshot, dims, self.max_nodes_per_leaf);

        let repulsive: Vec<(crate::id::NodeId, Vec3)> = positions_snapshot
            .par_iter()
            .map(|&(node, pos)| {
                let mut force = Vec3::ZERO;
                let mut stack = vec![&tree.root];
                while let Some(volume) = stack.pop() {
                    if volume.mass == 0 {
                        continue;
                    }
                    if volume.is_leaf() || volume.is_far_enough(pos, self.theta) {
                        let delta = pos - volume.centre_of_mass;
                        let dist_sq = delta.length_squared().max(1e-4);
                        force += delta.normalize_or_zero() * (volume.mass as f32 / dist_sq);
                    } else {
                        stack.extend(volume.children().iter());
                    }
                }
                (node, force)
            })
            .collect();

        if cancel.load(Ordering::Relaxed) {
            return None;
        }

        let mut attractive: rustc_hash::FxHashMap<crate::id::NodeId, Vec3> = rustc_hash::FxHashMap::default();
        for &(s, t, weight) in &self.edges {
            let ps = layout_positions.get(s);
            let pt = layout_positions.get(t);
            let delta = pt - ps;
            let spring = delta * weight * 0.01;
            *attractive.entry(s).or_insert(Vec3::ZERO) += spring;
            *attractive.entry(t).or_insert(Vec3::ZERO) -= spring;
        }

        let mut total_displacement = 0.0f32;
        for &(node, repulsive_force) in &repulsive {
            let attractive_force = attractive.get(&node).copied().unwrap_or(Vec3::ZERO);
            let raw = repulsive_force + attractive_force;
            let previous = self.previous_displacement.get(&node).copied().unwrap_or(Vec3::ZERO);
            let blended = previous * 0.5 + raw * self.scaling;
            let clamped = if blended.length() > 1.0 { blended.normalize() } else { blended };

            let mut next_pos = layout_positions.get(node) + clamped;
            if dims == 2 {
                next_pos.z = 0.0;
            }
            layout_positions.set(node, next_pos);

            self.previous_displacement.insert(node, clamped);
            total_displacement += clamped.length();
        }

        Some(if self.node_ids.is_empty() { 0.0 } else { total_displacement / self.node_ids.len() as f32 })
    }

    fn initial_change_detection(&mut self, mean_force: f32) {
        if mean_force < INITIAL_THRESHOLD {
            self.phase = ChangeDetectionPhase::FineTune;
        }
    }

    fn fine_tune_change_detection(&mut self, mean_force: f32) {
        self.prev_avg_forces.push(mean_force);
        self.prev_std_devs.push(mean_force);
        if self.prev_std_devs.is_full() && self.prev_std_devs.std_dev() < FINETUNE_THRESHOLD {
            self.phase = ChangeDetectionPhase::Oscillate;
        }
    }

    fn oscillate_change_detection(&mut self, mean_force: f32) {
        self.prev_capture_std_devs.push(mean_force);
        if !self.prev_capture_std_devs.is_full() {
            return;
        }

        let std_dev = self.prev_capture_std_devs.std_dev();
        if std_dev < OSCILLATE_THRESHOLD {
            self.phase = ChangeDetectionPhase::Finished;
            return;
        }

        if std_dev > self.prev_unstable_std_dev {
            self.increasing_std_dev_iterations += 1;
        } else {
            self.increasing_std_dev_iterations = 0;
        }
        self.prev_unstable_std_dev = std_dev;

        if self.increasing_std_dev_iterations >= OSCILLATION_GUARD_ITERATIONS {
            self.phase = ChangeDetectionPhase::Finished;
        }
    }

    fn finish_change_detection(&mut self) {
        // Terminal: no further transitions. `unfinish` is the only way out.
    }
}

impl Layout for ForceDirectedLayout {
    fn finished(&self) -> bool {
        self.phase == ChangeDetectionPhase::Finished
    }

    fn unfinish(&mut self) {
        self.phase = ChangeDetectionPhase::Initial;
        self.prev_std_devs = SampleRing::new(FINETUNE_DELTA_SAMPLE_SIZE);
        self.prev_avg_forces = SampleRing::new(FINETUNE_DELTA_SAMPLE_SIZE);
        self.prev_capture_std_devs = SampleRing::new(OSCILLATE_DELTA_SAMPLE_SIZE);
        self.increasing_std_dev_iterations = 0;
    }

    fn execute(&mut self, _first_iteration: bool, dimensionality: Dimensionality, cancel: &AtomicBool) {
        if dimensionality == Dimensionality::TwoDee && !self.has_been_flattened {
            self.positions.flatten();
            self.has_been_flattened = true;
            if self.phase != ChangeDetectionPhase::Initial {
                // Flattening to 2D does not invalidate the rough layout;
                // resume from FineTune rather than restarting entirely.
                self.phase = ChangeDetectionPhase::FineTune;
            }
        }

        let Some(mean_force) = self.run_iteration(dimensionality, cancel) else {
            return;
        };

        match self.phase {
            ChangeDetectionPhase::Initial => self.initial_change_detection(mean_force),
            ChangeDetectionPhase::FineTune => self.fine_tune_change_detection(mean_force),
            ChangeDetectionPhase::Oscillate => self.oscillate_change_detection(mean_force),
            ChangeDetectionPhase::Finished => self.finish_change_detection(),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
