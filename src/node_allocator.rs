use std::{
    alloc::{Layout, alloc, dealloc, handle_alloc_error},
    cell::UnsafeCell,
    mem::ManuallyDrop,
    sync::atomic::{AtomicUsize, Ordering},
};

use thread_local::ThreadLocal;

use crate::{CACHE_LINE_SIZE, node::Node};

// Reclaimed nodes kept by one thread for reuse. Only the owning thread
// touches it, through the ThreadLocal slot.
struct Pool<K, V> {
    free: Vec<*mut Node<K, V>>,
}

unsafe impl<K, V> Send for Pool<K, V> {}

/// Memory manager for [`Node`] allocation.
///
/// Nodes are cache-line aligned. A reclaimed node is dropped in place, poisoned
/// and parked in the calling thread's pool; the next allocation on that thread
/// checks the poison pattern is intact before reusing the memory.
pub struct NodeAllocator<K, V> {
    layout: Layout,
    pools: ThreadLocal<UnsafeCell<Pool<K, V>>>,
    pool_capacity: usize,
    allocated: AtomicUsize,
    freed: AtomicUsize,
    recycled: AtomicUsize,
}

unsafe impl<K: Send, V: Send> Send for NodeAllocator<K, V> {}
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for NodeAllocator<K, V> {}

impl<K, V> NodeAllocator<K, V> {
    pub fn new(pool_capacity: usize) -> Self {
        let natural = Layout::new::<Node<K, V>>();
        // Round up to cache line size
        let layout = natural
            .align_to(*CACHE_LINE_SIZE)
            .unwrap_or(natural)
            .pad_to_align();

        NodeAllocator {
            layout,
            pools: ThreadLocal::new(),
            pool_capacity,
            allocated: AtomicUsize::new(0),
            freed: AtomicUsize::new(0),
            recycled: AtomicUsize::new(0),
        }
    }

    #[allow(clippy::mut_from_ref)]
    fn pool(&self) -> &mut Pool<K, V> {
        let cell = self.pools.get_or(|| {
            UnsafeCell::new(Pool {
                free: Vec::with_capacity(self.pool_capacity),
            })
        });
        // The slot belongs to the current thread and is never handed out twice
        unsafe { &mut *cell.get() }
    }

    /// Allocate an unlinked node holding `key` and `value`.
    pub(crate) fn allocate(&self, key: K, value: V) -> *mut Node<K, V> {
        let ptr = match self.pool().free.pop() {
            Some(recycled) => {
                assert!(
                    unsafe { (*recycled).poison_intact() },
                    "reclaimed node at {recycled:p} was written after it was freed"
                );
                self.recycled.fetch_add(1, Ordering::Relaxed);
                recycled
            }
            None => {
                let raw = unsafe { alloc(self.layout) as *mut Node<K, V> };
                if raw.is_null() {
                    handle_alloc_error(self.layout);
                }
                raw
            }
        };

        unsafe { ptr.write(Node::new(key, value)) };
        self.allocated.fetch_add(1, Ordering::Relaxed);
        ptr
    }

    /// Drop the node's contents, poison it and park or release its memory.
    ///
    /// # Safety
    ///
    /// `node` must come from this allocator, be unreachable from the chain and
    /// not be referenced by any thread.
    pub(crate) unsafe fn deallocate(&self, node: *mut Node<K, V>) {
        unsafe {
            ManuallyDrop::drop(&mut (*node).key);
            ManuallyDrop::drop(&mut (*node).value);
            (*node).poison();
        }
        self.freed.fetch_add(1, Ordering::Relaxed);

        let pool = self.pool();
        if pool.free.len() < self.pool_capacity {
            pool.free.push(node);
        } else {
            trace_log!(capacity = self.pool_capacity, "node pool full, releasing memory");
            unsafe { dealloc(node as *mut u8, self.layout) }
        }
    }

    /// Nodes handed out so far, recycled ones included.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Nodes reclaimed so far.
    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::Relaxed)
    }

    /// Allocations served from a pool instead of the global allocator.
    pub fn recycled(&self) -> usize {
        self.recycled.load(Ordering::Relaxed)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }
}

impl<K, V> Drop for NodeAllocator<K, V> {
    fn drop(&mut self) {
        for pool in self.pools.iter_mut() {
            for node in pool.get_mut().free.drain(..) {
                unsafe { dealloc(node as *mut u8, self.layout) }
            }
        }
    }
}
