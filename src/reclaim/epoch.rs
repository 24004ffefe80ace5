use std::sync::atomic::{AtomicUsize, Ordering, fence};

use crate::config::SetConfig;
use crate::marked_ptr::{AtomicMarkedPtr, MarkedPtr};
use crate::node::Node;
use crate::node_allocator::NodeAllocator;

use super::registry::Registry;
use super::retired::RetiredList;
use super::{Protect, Reclaimer, Slot};

const PINNED: usize = 1;

/// Number of generations a retired node waits through.
pub const GENERATIONS: usize = 3;

// Thread-local epoch tracker
#[derive(Debug, Default)]
pub struct LocalEpoch {
    // (epoch << 1) | PINNED
    state: AtomicUsize,
    // Nesting depth and retirements since the last collection, owner-only
    pins: AtomicUsize,
    retired: AtomicUsize,
}

impl LocalEpoch {
    pub fn is_pinned(&self) -> bool {
        self.state.load(Ordering::Relaxed) & PINNED != 0
    }

    /// Epoch observed at the last pin.
    pub fn epoch(&self) -> usize {
        self.state.load(Ordering::Relaxed) >> 1
    }
}

/// Epoch-based reclamation manager.
///
/// The global epoch only moves forward; its generation is `epoch % 3`. A node
/// retired while the global epoch was `e` is freed once the epoch reaches
/// `e + 2`, which cannot happen while any participant is still pinned at `e`
/// or earlier. A participant stuck in an old epoch stalls reclamation, never
/// the chain operations themselves.
pub struct EpochManager<K, V> {
    global: AtomicUsize,
    registry: Registry<LocalEpoch>,
    garbage: RetiredList<Node<K, V>>,
    node_allocator: NodeAllocator<K, V>,
    collect_threshold: usize,
}

impl<K, V> Default for EpochManager<K, V> {
    fn default() -> Self {
        EpochManager::new()
    }
}

impl<K, V> EpochManager<K, V> {
    pub fn new() -> Self {
        Self::from_config(&SetConfig::default())
    }

    fn from_config(config: &SetConfig) -> Self {
        EpochManager {
            global: AtomicUsize::new(0),
            registry: Registry::new(config.max_participants),
            garbage: RetiredList::new(),
            node_allocator: NodeAllocator::new(config.pool_capacity),
            collect_threshold: config.collect_threshold,
        }
    }

    pub fn epoch(&self) -> usize {
        self.global.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> usize {
        self.epoch() % GENERATIONS
    }

    // Enter a critical section
    pub(crate) fn enter(&self, local: &LocalEpoch) {
        let pins = local.pins.load(Ordering::Relaxed);
        local.pins.store(pins + 1, Ordering::Relaxed);

        if pins == 0 {
            let epoch = self.global.load(Ordering::Relaxed);
            local.state.store((epoch << 1) | PINNED, Ordering::Relaxed);
            // Publish the pin before any chain pointer is read
            fence(Ordering::SeqCst);
        }
    }

    // Exit a critical section
    pub(crate) fn exit(&self, local: &LocalEpoch) {
        let pins = local.pins.load(Ordering::Relaxed);
        debug_assert!(pins > 0, "exit without a matching enter");
        local.pins.store(pins - 1, Ordering::Relaxed);

        if pins == 1 {
            let state = local.state.load(Ordering::Relaxed);
            local.state.store(state & !PINNED, Ordering::Release);
        }
    }

    /// Advance the global epoch if every pinned participant has observed it.
    /// Best effort: returns false when someone lags behind.
    pub fn try_advance(&self) -> bool {
        let current_epoch = self.global.load(Ordering::Relaxed);
        fence(Ordering::SeqCst);

        for participant in self.registry.iter() {
            let state = participant.local().state.load(Ordering::Relaxed);
            if state & PINNED != 0 && state >> 1 != current_epoch {
                trace_log!(
                    epoch = current_epoch,
                    lagging = state >> 1,
                    "epoch advance blocked"
                );
                return false;
            }
        }

        fence(Ordering::Acquire);
        let advanced = self
            .global
            .compare_exchange(
                current_epoch,
                current_epoch + 1,
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_ok();

        if advanced {
            trace_log!(epoch = current_epoch + 1, "epoch advanced");
        }
        advanced
    }

    /// Free every retired node at least two epochs old.
    pub fn collect(&self) -> usize {
        let current_epoch = self.global.load(Ordering::Acquire);

        let batch = self.garbage.take_all();
        if batch.is_empty() {
            return 0;
        }

        let (freed, survivors) = batch.sweep(|entry| {
            if entry.epoch + 2 <= current_epoch {
                unsafe { self.node_allocator.deallocate(entry.node) };
                true
            } else {
                false
            }
        });

        debug_log!(
            epoch = current_epoch,
            freed,
            kept = survivors.len(),
            "epoch collection"
        );
        self.garbage.restore(survivors);
        freed
    }
}

unsafe impl<K: Send + Sync, V: Send + Sync> Reclaimer<K, V> for EpochManager<K, V> {
    type Local = LocalEpoch;
    type Guard<'g>
        = EpochGuard<'g, K, V>
    where
        Self: 'g;

    fn with_config(config: &SetConfig) -> Self {
        Self::from_config(config)
    }

    fn registry(&self) -> &Registry<LocalEpoch> {
        &self.registry
    }

    fn allocator(&self) -> &NodeAllocator<K, V> {
        &self.node_allocator
    }

    fn pin<'g>(&'g self, local: &'g LocalEpoch) -> EpochGuard<'g, K, V> {
        self.enter(local);
        EpochGuard {
            manager: self,
            local,
        }
    }

    unsafe fn retire(&self, local: &LocalEpoch, node: *mut Node<K, V>) {
        // Tag with the epoch observed after the unlink
        let epoch = self.global.load(Ordering::SeqCst);
        self.garbage.push(node, epoch);

        let retired = local.retired.load(Ordering::Relaxed) + 1;
        if retired >= self.collect_threshold {
            local.retired.store(0, Ordering::Relaxed);
            self.try_reclaim(local);
        } else {
            local.retired.store(retired, Ordering::Relaxed);
        }
    }

    fn try_reclaim(&self, _local: &LocalEpoch) -> usize {
        self.try_advance();
        self.collect()
    }

    fn pending(&self) -> usize {
        self.garbage.len()
    }
}

impl<K, V> Drop for EpochManager<K, V> {
    fn drop(&mut self) {
        let (_, survivors) = self.garbage.take_all().sweep(|entry| {
            unsafe { self.node_allocator.deallocate(entry.node) };
            true
        });
        debug_assert_eq!(survivors.len(), 0);
    }
}

/// Pinned region of one participant; unpins on drop.
pub struct EpochGuard<'g, K, V> {
    manager: &'g EpochManager<K, V>,
    local: &'g LocalEpoch,
}

impl<K, V> Protect<K, V> for EpochGuard<'_, K, V> {
    const VALIDATES: bool = false;

    #[inline]
    fn protect(&self, _slot: Slot, link: &AtomicMarkedPtr<Node<K, V>>) -> MarkedPtr<Node<K, V>> {
        link.load(Ordering::Acquire)
    }

    #[inline]
    fn transfer(&self, _from: Slot, _to: Slot) {}
}

impl<K, V> Drop for EpochGuard<'_, K, V> {
    fn drop(&mut self) {
        self.manager.exit(self.local);
    }
}
