//! Tagged 32-bit handles for nodes, edges and components, plus the
//! dense, auto-resizing arrays indexed by them.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Sentinel used for "no id" across all three id kinds.
const NULL: u32 = u32::MAX;

pub trait IdKind: Copy + Clone + Eq + PartialEq + std::hash::Hash + Ord + PartialOrd + fmt::Debug {
    const KIND_NAME: &'static str;

    fn from_raw(raw: u32) -> Self;
    fn raw(self) -> u32;
    fn null() -> Self;
    fn is_null(self) -> bool;
}

macro_rules! define_element_id {
    ($name:ident, $kind_name:literal) => {
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(u32);

        impl $name {
            pub const NULL: Self = Self(NULL);

            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl IdKind for $name {
            const KIND_NAME: &'static str = $kind_name;

            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            fn raw(self) -> u32 {
                self.0
            }

            fn null() -> Self {
                Self::NULL
            }

            fn is_null(self) -> bool {
                self.0 == NULL
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    write!(f, "{}(Null)", $kind_name)
                } else {
                    write!(f, "{}({})", $kind_name, self.0)
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NULL
            }
        }
    };
}

define_element_id!(NodeId, "NodeId");
define_element_id!(EdgeId, "EdgeId");
define_element_id!(ComponentId, "ComponentId");

/// Shared bookkeeping an owning graph uses to hand out and recycle ids
/// of one kind, and to keep every registered [`GraphArray`] sized to
/// the highest id ever issued.
pub struct IdPool<I: IdKind> {
    next: AtomicUsize,
    vacated: Mutex<Vec<I>>,
    arrays: Mutex<Vec<Weak<dyn ResizableArray>>>,
}

/// Object-safe handle a [`GraphArray`] registers with its owning pool so
/// the pool can resize every array when a new id is issued.
pub trait ResizableArray: Send + Sync {
    fn resize_to(&self, len: usize);
}

impl<I: IdKind> IdPool<I> {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
            vacated: Mutex::new(Vec::new()),
            arrays: Mutex::new(Vec::new()),
        }
    }

    /// Issue a fresh id, preferring a vacated one (only legal from inside
    /// a [`MutableGraph`](crate::graph::mutable_graph::MutableGraph) transaction, per the id-reuse
    /// rule: ids are otherwise never reused for the lifetime of a document).
    pub fn acquire(&self) -> I {
        if let Some(id) = self.vacated.lock().unwrap().pop() {
            return id;
        }
        let raw = self.next.fetch_add(1, Ordering::SeqCst);
        let id = I::from_raw(raw as u32);
        self.grow_arrays(raw + 1);
        id
    }

    pub fn vacate(&self, id: I) {
        self.vacated.lock().unwrap().push(id);
    }

    pub fn capacity(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    /// Bumps this pool's capacity to at least `len`, resizing every
    /// registered array along the way, without handing out any of the
    /// newly-covered ids. Used by callers (`Document`) that key a
    /// `GraphArray` on ids minted by a different pool than the one they
    /// own, and just need enough room to index them.
    pub fn ensure_capacity(&self, len: usize) {
        let mut next = self.next.load(Ordering::SeqCst);
        while next < len {
            match self.next.compare_exchange(next, len, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => {
                    self.grow_arrays(len);
                    return;
                }
                Err(observed) => next = observed,
            }
        }
    }

    fn grow_arrays(&self, len: usize) {
        let mut arrays = self.arrays.lock().unwrap();
        arrays.retain(|weak| weak.strong_count() > 0);
        for array in arrays.iter() {
            if let Some(array) = array.upgrade() {
                array.resize_to(len);
            }
        }
    }

    fn register(&self, array: Weak<dyn ResizableArray>) {
        self.arrays.lock().unwrap().push(array);
    }
}

impl<I: IdKind> Default for IdPool<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// A densely indexed, automatically resized container keyed by ids of
/// kind `I`. Registers with the owning [`IdPool`] on construction so
/// the pool can keep it in step with the highest issued id.
pub struct GraphArray<I: IdKind, T: Clone + Default> {
    // Also kept alive as a `Weak<dyn ResizableArray>` in the owning pool's
    // registry, so the pool can resize us without us reaching back into it.
    handle: Arc<ArrayHandle<T>>,
    _kind: PhantomData<I>,
}

struct ArrayHandle<T: Clone + Default + Send + Sync + 'static>(Mutex<Vec<T>>);

impl<T: Clone + Default + Send + Sync + 'static> ResizableArray for ArrayHandle<T> {
    fn resize_to(&self, len: usize) {
        let mut inner = self.0.lock().unwrap();
        if inner.len() < len {
            inner.resize(len, T::default());
        }
    }
}

impl<I: IdKind, T: Clone + Default + Send + Sync + 'static> GraphArray<I, T> {
    pub fn new(pool: &IdPool<I>) -> Self {
        let handle = Arc::new(ArrayHandle(Mutex::new(vec![T::default(); pool.capacity()])));
        let weak: Weak<dyn ResizableArray> = Arc::downgrade(&handle);
        pool.register(weak);
        Self {
            handle,
            _kind: PhantomData,
        }
    }

    pub fn get(&self, id: I) -> T {
        self.handle.0.lock().unwrap()[id.index()].clone()
    }

    pub fn set(&self, id: I, value: T) {
        self.handle.0.lock().unwrap()[id.index()] = value;
    }

    pub fn with_mut<R>(&self, id: I, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.handle.0.lock().unwrap()[id.index()])
    }

    pub fn len(&self) -> usize {
        self.handle.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_not_reused_outside_vacate() {
        let pool: IdPool<NodeId> = IdPool::new();
        let a = pool.acquire();
        let b = pool.acquire();
        assert_ne!(a, b);
    }

    #[test]
    fn vacated_id_is_reissued() {
        let pool: IdPool<NodeId> = IdPool::new();
        let a = pool.acquire();
        pool.vacate(a);
        let b = pool.acquire();
        assert_eq!(a, b);
    }

    #[test]
    fn graph_array_grows_with_pool() {
        let pool: IdPool<NodeId> = IdPool::new();
        let array: GraphArray<NodeId, i32> = GraphArray::new(&pool);
        let id = pool.acquire();
        assert!(array.len() > id.index());
    }

    #[test]
    fn null_id_reports_is_null() {
        assert!(NodeId::NULL.is_null());
        assert!(!NodeId::new(0).is_null());
    }
}
