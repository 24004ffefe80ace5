use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::marked_ptr::{AtomicMarkedPtr, MarkedPtr};

/// Written into `state` when a node is handed out by the allocator.
pub(crate) const LIVE: u64 = 0x0A11_7E00_0A11_7E00;
/// Written into `state` when a node is reclaimed.
pub(crate) const POISON: u64 = 0xDEAD_BEEF_DEAD_BEEF;
/// Written into the link of a reclaimed node. Odd, so it also reads as marked.
pub(crate) const POISON_LINK: usize = 0xDEAD_BEE1;

// Node layout: the link is read on every traversal step, keep it first
#[repr(C)]
pub struct Node<K, V> {
    pub(crate) next: AtomicMarkedPtr<Node<K, V>>,
    // LIVE while allocated, POISON once reclaimed
    pub(crate) state: AtomicU64,
    pub(crate) key: ManuallyDrop<K>,
    pub(crate) value: ManuallyDrop<V>,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(key: K, value: V) -> Self {
        Node {
            next: AtomicMarkedPtr::null(),
            state: AtomicU64::new(LIVE),
            key: ManuallyDrop::new(key),
            value: ManuallyDrop::new(value),
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub(crate) fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub(crate) fn load_next(&self) -> MarkedPtr<Node<K, V>> {
        self.next.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.state.load(Ordering::Relaxed) == LIVE
    }

    /// Trips in debug builds if a reclaimed node is ever dereferenced.
    #[inline]
    pub(crate) fn assert_live(&self) {
        debug_assert!(
            self.is_live(),
            "dereferenced a reclaimed node (state {:#x})",
            self.state.load(Ordering::Relaxed)
        );
    }

    /// Overwrite the bookkeeping words of a node whose contents were dropped.
    pub(crate) fn poison(&self) {
        self.state.store(POISON, Ordering::Relaxed);
        self.next
            .store(MarkedPtr::from_raw(POISON_LINK as *mut Self), Ordering::Release);
    }

    /// Whether a pooled node still carries exactly the pattern `poison` wrote.
    pub(crate) fn poison_intact(&self) -> bool {
        self.state.load(Ordering::Acquire) == POISON
            && self.next.load(Ordering::Acquire).as_raw() as usize == POISON_LINK
    }
}
