//! Thread-safe per-node position storage with temporal smoothing.
//!
//! `NodePositions` is read by the renderer and other query callers
//! through a short-lived lock; `NodeLayoutPositions` is the unlocked
//! mirror exposed only to the layout thread, which is the sole writer.
//! The recursive lock exists because bulk operations (`update`) call
//! into helpers (`get`) that also lock; see the design note this crate
//! resolved on that exact point.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec3;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;

use crate::id::{GraphArray, IdPool, NodeId};

pub const MAX_SMOOTHING: usize = 8;

/// A small ring buffer of the last `MAX_SMOOTHING` positions written
/// for one node, used to compute a temporally smoothed mean on read.
#[derive(Clone)]
pub struct MeanPosition {
    entries: [Vec3; MAX_SMOOTHING],
    len: usize,
    cursor: usize,
}

impl Default for MeanPosition {
    fn default() -> Self {
        Self {
            entries: [Vec3::ZERO; MAX_SMOOTHING],
            len: 1,
            cursor: 0,
        }
    }
}

impl MeanPosition {
    fn push(&mut self, position: Vec3) {
        self.cursor = (self.cursor + 1) % MAX_SMOOTHING;
        self.entries[self.cursor] = position;
        self.len = (self.len + 1).min(MAX_SMOOTHING);
    }

    fn mean_of_latest(&self, k: usize) -> Vec3 {
        let k = k.clamp(1, self.len.max(1));
        let mut sum = Vec3::ZERO;
        for i in 0..k {
            let idx = (self.cursor + MAX_SMOOTHING - i) % MAX_SMOOTHING;
            sum += self.entries[idx];
        }
        sum / k as f32
    }

    fn newest(&self) -> Vec3 {
        self.entries[self.cursor]
    }

    fn flatten(&mut self) {
        for entry in &mut self.entries {
            entry.z = 0.0;
        }
    }
}

/// Thread-safety wrapper: a recursive mutex plus an atomic "currently
/// held by" marker used only for debug assertions in
/// `NodeLayoutPositions`, which must never be called while another
/// thread holds the lock.
struct LockState {
    mutex: ReentrantMutex<RefCell<()>>,
    holder: AtomicUsize,
}

impl Default for LockState {
    fn default() -> Self {
        Self {
            mutex: ReentrantMutex::new(RefCell::new(())),
            holder: AtomicUsize::new(0),
        }
    }
}

fn current_thread_tag() -> usize {
    // A cheap, stable-for-the-thread's-lifetime tag: the address of a
    // thread-local byte.
    thread_local! { static TAG: u8 = const { 0 }; }
    TAG.with(|t| t as *const u8 as usize)
}

pub struct NodePositions {
    raw: GraphArray<NodeId, MeanPosition>,
    lock: LockState,
    scale: std::sync::atomic::AtomicU32,
    smoothing: AtomicUsize,
}

impl NodePositions {
    pub fn new(pool: &IdPool<NodeId>) -> Self {
        Self {
            raw: GraphArray::new(pool),
            lock: LockState::default(),
            scale: std::sync::atomic::AtomicU32::new(1.0f32.to_bits()),
            smoothing: AtomicUsize::new(1),
        }
    }

    pub fn set_scale(&self, scale: f32) {
        self.scale.store(scale.to_bits(), Ordering::Relaxed);
    }

    pub fn scale(&self) -> f32 {
        f32::from_bits(self.scale.load(Ordering::Relaxed))
    }

    pub fn set_smoothing(&self, smoothing: usize) {
        debug_assert!(smoothing <= MAX_SMOOTHING);
        self.smoothing.store(smoothing.min(MAX_SMOOTHING), Ordering::Relaxed);
    }

    pub fn smoothing(&self) -> usize {
        self.smoothing.load(Ordering::Relaxed)
    }

    fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock.mutex.lock();
        self.lock.holder.store(current_thread_tag(), Ordering::Release);
        let result = f();
        self.lock.holder.store(0, Ordering::Release);
        result
    }

    /// The smoothed, scaled position for one node. Takes the lock for
    /// the duration of the read only.
    pub fn get(&self, node: NodeId) -> Vec3 {
        self.with_lock(|| self.get_no_locking(node))
    }

    fn get_no_locking(&self, node: NodeId) -> Vec3 {
        self.raw.get(node).mean_of_latest(self.smoothing()) * self.scale()
    }

    pub fn get_many(&self, nodes: &[NodeId]) -> Vec<Vec3> {
        self.with_lock(|| nodes.iter().map(|&n| self.get_no_locking(n)).collect())
    }

    pub fn centre_of_mass(&self, nodes: &[NodeId]) -> Vec3 {
        self.with_lock(|| {
            if nodes.is_empty() {
                return Vec3::ZERO;
            }
            let sum: Vec3 = nodes.iter().map(|&n| self.get_no_locking(n)).sum();
            sum / nodes.len() as f32
        })
    }

    /// Replaces the entire array atomically from `other` - used when
    /// the layout thread publishes a fully-computed iteration via its
    /// `NodeLayoutPositions` mirror instead of per-node.
    pub fn update(&self, other: &NodePositions) {
        self.with_lock(|| {
            let len = other.raw.len();
            for i in 0..len {
                let id = NodeId::new(i as u32);
                self.raw.set(id, other.raw.get(id));
            }
        })
    }

    pub fn flatten(&self) {
        self.with_lock(|| {
            let len = self.raw.len();
            for i in 0..len {
                let id = NodeId::new(i as u32);
                self.raw.with_mut(id, MeanPosition::flatten);
            }
        })
    }
}

/// Unlocked mirror exposed only to the layout thread, which is the
/// sole writer of node positions. Callers other than the layout thread
/// must not construct or use this type; the debug assertion below is
/// the enforcement mechanism since there is no separate static type
/// boundary for "the layout thread" in safe Rust.
pub struct NodeLayoutPositions<'a> {
    positions: &'a NodePositions,
}

impl<'a> NodeLayoutPositions<'a> {
    pub fn new(positions: &'a NodePositions) -> Self {
        Self { positions }
    }

    pub fn get(&self, node: NodeId) -> Vec3 {
        self.positions.raw.get(node).newest()
    }

    pub fn set(&self, node: NodeId, position: Vec3) {
        debug_assert!(
            self.positions.lock.holder.load(Ordering::Relaxed) != current_thread_tag(),
            "NodeLayoutPositions must not be used while this thread holds the NodePositions lock"
        );
        self.positions.raw.with_mut(node, |mean| mean.push(position));
    }

    pub fn set_many(&self, nodes: &[NodeId], exact: &[Vec3]) {
        debug_assert_eq!(nodes.len(), exact.len());
        for (&node, &position) in nodes.iter().zip(exact) {
            self.set(node, position);
        }
    }

    pub fn centre_of_mass(&self, nodes: &[NodeId]) -> Vec3 {
        if nodes.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = nodes.iter().map(|&n| self.get(n)).sum();
        sum / nodes.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_latest_averages_recent_writes() {
        let pool: IdPool<NodeId> = IdPool::new();
        let positions = NodePositions::new(&pool);
        let node = pool.acquire();
        positions.set_smoothing(2);

        let layout = NodeLayoutPositions::new(&positions);
        layout.set(node, Vec3::new(1.0, 0.0, 0.0));
        layout.set(node, Vec3::new(3.0, 0.0, 0.0));

        let got = positions.get(node);
        assert!((got.x - 2.0).abs() < 1e-6, "expected mean of last 2 writes, got {got:?}");
    }

    #[test]
    fn scale_applies_on_read() {
        let pool: IdPool<NodeId> = IdPool::new();
        let positions = NodePositions::new(&pool);
        let node = pool.acquire();
        positions.set_scale(2.0);

        let layout = NodeLayoutPositions::new(&positions);
        layout.set(node, Vec3::new(1.0, 0.0, 0.0));

        assert!((positions.get(node).x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn flatten_zeroes_z_across_the_ring() {
        let pool: IdPool<NodeId> = IdPool::new();
        let positions = NodePositions::new(&pool);
        let node = pool.acquire();

        let layout = NodeLayoutPositions::new(&positions);
        layout.set(node, Vec3::new(1.0, 2.0, 3.0));
        positions.flatten();

        assert_eq!(positions.get(node).z, 0.0);
    }
}
