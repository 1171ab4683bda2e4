//! The current node selection: a plain id set plus batched change
//! notification, mirroring `MutableGraph`'s own transaction/observer
//! machinery (see its module doc) since the two are edited from the
//! same command pump and want the same coalescing behaviour.

use std::sync::{Arc, Mutex, Weak};

use rustc_hash::FxHashSet;

use crate::id::NodeId;

pub trait SelectionObserver: Send + Sync {
    fn selection_changed(&self);
}

#[derive(Default)]
struct Observers {
    list: Mutex<Vec<Weak<dyn SelectionObserver>>>,
}

impl Observers {
    fn subscribe(&self, observer: Arc<dyn SelectionObserver>) -> Arc<dyn SelectionObserver> {
        self.list.lock().unwrap().push(Arc::downgrade(&observer));
        observer
    }

    fn notify(&self) {
        let mut list = self.list.lock().unwrap();
        list.retain(|weak| weak.strong_count() > 0);
        for weak in list.iter() {
            if let Some(observer) = weak.upgrade() {
                observer.selection_changed();
            }
        }
    }
}

/// The set of selected nodes. Every mutating method only notifies
/// observers once changes actually took effect, and only once per
/// `transaction` batch rather than once per call within it.
#[derive(Default)]
pub struct Selection {
    ids: FxHashSet<NodeId>,
    observers: Observers,
    batch_depth: usize,
    dirty: bool,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn SelectionObserver>) -> Arc<dyn SelectionObserver> {
        self.observers.subscribe(observer)
    }

    /// Batches the notifications of every mutating call made inside
    /// `f` into (at most) one `selection_changed`.
    pub fn transaction<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            self.flush();
        }
        result
    }

    fn flush(&mut self) {
        if self.dirty {
            self.dirty = false;
            self.observers.notify();
        }
    }

    fn mark_changed(&mut self) {
        self.dirty = true;
        if self.batch_depth == 0 {
            self.flush();
        }
    }

    pub fn select(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        let mut changed = false;
        for id in ids {
            changed |= self.ids.insert(id);
        }
        if changed {
            self.mark_changed();
        }
    }

    pub fn deselect(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        let mut changed = false;
        for id in ids {
            changed |= self.ids.remove(&id);
        }
        if changed {
            self.mark_changed();
        }
    }

    pub fn toggle(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        let mut changed = false;
        for id in ids {
            if !self.ids.remove(&id) {
                self.ids.insert(id);
            }
            changed = true;
        }
        if changed {
            self.mark_changed();
        }
    }

    pub fn select_all(&mut self, universe: impl IntoIterator<Item = NodeId>) {
        self.select(universe);
    }

    /// Replaces the whole selection with exactly `ids`, in a single
    /// batch: used by search's `First`/`All` select styles.
    pub fn select_only(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.transaction(|selection| {
            selection.clear();
            selection.select(ids);
        });
    }

    pub fn clear(&mut self) {
        if !self.ids.is_empty() {
            self.ids.clear();
            self.mark_changed();
        }
    }

    pub fn invert(&mut self, universe: impl IntoIterator<Item = NodeId>) {
        let mut next = FxHashSet::default();
        for id in universe {
            if !self.ids.contains(&id) {
                next.insert(id);
            }
        }
        self.ids = next;
        self.mark_changed();
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver(AtomicUsize);
    impl SelectionObserver for CountingObserver {
        fn selection_changed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn select_then_deselect_round_trips() {
        let mut selection = Selection::new();
        let a = NodeId::new(0);
        let b = NodeId::new(1);
        selection.select([a, b]);
        assert_eq!(selection.len(), 2);
        selection.deselect([a]);
        assert!(!selection.contains(a));
        assert!(selection.contains(b));
    }

    #[test]
    fn invert_flips_membership_over_a_universe() {
        let mut selection = Selection::new();
        let universe: Vec<NodeId> = (0..4).map(NodeId::new).collect();
        selection.select([universe[0], universe[1]]);
        selection.invert(universe.iter().copied());
        assert!(!selection.contains(universe[0]));
        assert!(!selection.contains(universe[1]));
        assert!(selection.contains(universe[2]));
        assert!(selection.contains(universe[3]));
    }

    #[test]
    fn batched_mutations_notify_once() {
        let mut selection = Selection::new();
        let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
        let kept = selection.subscribe(observer.clone());

        selection.transaction(|s| {
            s.select([NodeId::new(0)]);
            s.select([NodeId::new(1)]);
            s.deselect([NodeId::new(0)]);
        });

        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
        drop(kept);
    }

    #[test]
    fn select_only_replaces_the_whole_set_in_one_batch() {
        let mut selection = Selection::new();
        selection.select([NodeId::new(0), NodeId::new(1)]);
        selection.select_only([NodeId::new(2)]);
        assert_eq!(selection.len(), 1);
        assert!(selection.contains(NodeId::new(2)));
    }
}
