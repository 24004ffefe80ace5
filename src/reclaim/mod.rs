//! Safe memory reclamation for unlinked nodes.
//!
//! A [`Reclaimer`] decides when a node that has been physically unlinked from
//! the chain may be handed back to the [`NodeAllocator`]. Threads take part
//! through a registered participant record; every chain operation runs under
//! a guard pinned on that record, and every pointer it dereferences is read
//! through [`Protect::protect`].

pub mod epoch;
pub mod hazard;
pub mod registry;
pub(crate) mod retired;

use crate::config::SetConfig;
use crate::marked_ptr::{AtomicMarkedPtr, MarkedPtr};
use crate::node::Node;
use crate::node_allocator::NodeAllocator;

use registry::Registry;

/// Protection slots a traversal holds at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The last unmarked node whose link is being modified or validated.
    Pred = 0,
    /// The node under inspection.
    Curr = 1,
    /// The node read from `Curr`'s link.
    Succ = 2,
}

pub(crate) const SLOTS: usize = 3;

/// Scoped protection held by a guard, released when the guard is dropped.
pub trait Protect<K, V> {
    /// Whether a pointer returned by [`protect`](Protect::protect) can be
    /// invalidated by a concurrent unlink before it is dereferenced. Chain
    /// traversals re-check reachability after each step when this is set.
    const VALIDATES: bool;

    /// Read `link` and keep its target safe to dereference until `slot` is
    /// overwritten or the guard is dropped.
    fn protect(&self, slot: Slot, link: &AtomicMarkedPtr<Node<K, V>>) -> MarkedPtr<Node<K, V>>;

    /// Copy the protection held in `from` into `to`.
    fn transfer(&self, from: Slot, to: Slot);
}

/// A safe memory reclamation strategy.
///
/// # Safety
///
/// Implementations must never release a retired node to the allocator while a
/// guard that protected it (or was pinned before it was retired) is alive.
pub unsafe trait Reclaimer<K, V>: Send + Sync + Sized {
    /// Per-thread protection state, stored in a registry participant.
    type Local: Default + Send + Sync;

    type Guard<'g>: Protect<K, V>
    where
        Self: 'g;

    fn with_config(config: &SetConfig) -> Self;

    fn registry(&self) -> &Registry<Self::Local>;

    fn allocator(&self) -> &NodeAllocator<K, V>;

    /// Begin a protected region for the participant owning `local`.
    fn pin<'g>(&'g self, local: &'g Self::Local) -> Self::Guard<'g>;

    /// Hand off a node that has just been unlinked.
    ///
    /// # Safety
    ///
    /// `node` must be unreachable from the chain and retired at most once.
    unsafe fn retire(&self, local: &Self::Local, node: *mut Node<K, V>);

    /// Free whatever retired nodes are provably unobserved. Returns how many
    /// were freed; zero is the common, non-error case.
    fn try_reclaim(&self, local: &Self::Local) -> usize;

    /// Retired nodes not yet freed (approximate).
    fn pending(&self) -> usize;

    /// Called before a participant is returned to the registry.
    fn release(&self, _local: &Self::Local) {}
}
