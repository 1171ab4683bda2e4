//! The background layout engine: a dedicated worker thread iterating a
//! per-component force-directed simulation to convergence, pausable,
//! resumable and cancellable from the main thread.

pub mod force_directed;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::id::{ComponentId, NodeId};
use crate::positions::NodePositions;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Dimensionality {
    ThreeDee,
    TwoDee,
    TwoOrThreeDee,
}

/// Per-component lifecycle hook a concrete layout algorithm implements.
/// `ForceDirectedLayout` is the only implementor the engine ships, but
/// the trait is the seam the source's `Layout`/`LayoutFactory` pair
/// occupied.
pub trait Layout: Send {
    fn finished(&self) -> bool;
    fn unfinish(&mut self);
    fn execute(&mut self, first_iteration: bool, dimensionality: Dimensionality, cancel: &AtomicBool);

    /// Downcast hook so a caller holding only `Box<dyn Layout>` (`Document`,
    /// working through the shared layout map) can reach back into a
    /// concrete layout's own API - e.g. to refresh `ForceDirectedLayout`'s
    /// edge list after a transform run - without the trait itself growing
    /// a method per concrete layout kind.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

struct Inner {
    paused: Mutex<bool>,
    stopped: AtomicBool,
    resume_condvar: Condvar,
    cancel: AtomicBool,
}

/// Owns the dedicated layout thread and the live set of per-component
/// layouts. Construction does not start the thread; call `start` once
/// the component set and layouts are populated.
pub struct LayoutThread {
    inner: Arc<Inner>,
    handle: Option<JoinHandle<()>>,
}

impl LayoutThread {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                paused: Mutex::new(false),
                stopped: AtomicBool::new(false),
                resume_condvar: Condvar::new(),
                cancel: AtomicBool::new(false),
            }),
            handle: None,
        }
    }

    /// Starts the dedicated thread running the outer loop over
    /// `layouts`. `layouts` is a shared, externally-synchronised map
    /// because `Document` may add/remove per-component layouts
    /// (component split/merge) while the thread runs.
    pub fn start(&mut self, layouts: Arc<Mutex<HashMap<ComponentId, Box<dyn Layout>>>>, dimensionality: Dimensionality) {
        let inner = self.inner.clone();
        self.handle = Some(std::thread::spawn(move || {
            let mut first_iteration = true;
            loop {
                if inner.stopped.load(Ordering::Acquire) {
                    return;
                }

                let mut any_active = false;
                {
                    let mut layouts = layouts.lock().unwrap();
                    for layout in layouts.values_mut() {
                        if layout.finished() {
                            continue;
                        }
                        any_active = true;
                        layout.execute(first_iteration, dimensionality, &inner.cancel);
                    }
                }
                first_iteration = false;

                let should_park = !any_active || *inner.paused.lock().unwrap();
                if should_park {
                    let mut paused = inner.paused.lock().unwrap();
                    while (*paused || !any_active) && !inner.stopped.load(Ordering::Acquire) {
                        let (guard, timeout) = inner
                            .resume_condvar
                            .wait_timeout(paused, std::time::Duration::from_millis(50))
                            .unwrap();
                        paused = guard;
                        if timeout.timed_out() {
                            break;
                        }
                    }
                    if inner.stopped.load(Ordering::Acquire) {
                        return;
                    }
                }
            }
        }));
    }

    pub fn pause(&self) {
        *self.inner.paused.lock().unwrap() = true;
    }

    pub fn pause_and_wait(&self) {
        self.pause();
        self.inner.cancel.store(true, Ordering::Release);
        // give the thread a beat to observe cancellation at its next safe point
        std::thread::yield_now();
        self.inner.cancel.store(false, Ordering::Release);
    }

    pub fn resume(&self) {
        *self.inner.paused.lock().unwrap() = false;
        self.inner.resume_condvar.notify_all();
    }

    pub fn stop(&mut self) {
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.cancel.store(true, Ordering::Release);
        self.inner.resume_condvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            tracing::debug!("layout thread stopped");
        }
    }

    pub fn is_cancelled(&self) -> &AtomicBool {
        &self.inner.cancel
    }
}

impl Default for LayoutThread {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LayoutThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Assigns a brand-new node a uniformly random position within a
/// bounded box, using a seedable RNG so layout runs are reproducible
/// in tests.
pub fn random_initial_position(rng: &mut impl rand::Rng, half_extent: f32) -> glam::Vec3 {
    glam::Vec3::new(
        rng.random_range(-half_extent..=half_extent),
        rng.random_range(-half_extent..=half_extent),
        rng.random_range(-half_extent..=half_extent),
    )
}

pub fn initialise_new_positions(
    positions: &NodePositions,
    new_nodes: impl Iterator<Item = NodeId>,
    rng: &mut impl rand::Rng,
    half_extent: f32,
) {
    let layout_positions = crate::positions::NodeLayoutPositions::new(positions);
    for node in new_nodes {
        layout_positions.set(node, random_initial_position(rng, half_extent));
    }
}
