use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering, fence};

use crate::config::SetConfig;
use crate::marked_ptr::{AtomicMarkedPtr, MarkedPtr};
use crate::node::Node;
use crate::node_allocator::NodeAllocator;

use super::registry::Registry;
use super::retired::RetiredList;
use super::{Protect, Reclaimer, SLOTS, Slot};

/// Hazard slots of one participant.
pub struct HazardRecord<K, V> {
    slots: [AtomicPtr<Node<K, V>>; SLOTS],
    guarded: AtomicBool,
}

impl<K, V> Default for HazardRecord<K, V> {
    fn default() -> Self {
        HazardRecord {
            slots: Default::default(),
            guarded: AtomicBool::new(false),
        }
    }
}

impl<K, V> HazardRecord<K, V> {
    /// Address currently published in `slot`, null if none.
    pub fn published(&self, slot: Slot) -> *mut Node<K, V> {
        self.slots[slot as usize].load(Ordering::Acquire)
    }

    fn clear(&self) {
        for slot in &self.slots {
            slot.store(std::ptr::null_mut(), Ordering::Release);
        }
    }
}

/// Hazard-pointer reclamation domain.
///
/// Retired nodes go to one global list. Once it outgrows
/// `scan_factor × participants`, the retiring thread detaches the list,
/// snapshots every participant's slots and frees the nodes nobody publishes.
pub struct HazardDomain<K, V> {
    registry: Registry<HazardRecord<K, V>>,
    retired: RetiredList<Node<K, V>>,
    node_allocator: NodeAllocator<K, V>,
    config: SetConfig,
}

impl<K, V> Default for HazardDomain<K, V> {
    fn default() -> Self {
        HazardDomain::new()
    }
}

impl<K, V> HazardDomain<K, V> {
    pub fn new() -> Self {
        Self::from_config(&SetConfig::default())
    }

    fn from_config(config: &SetConfig) -> Self {
        HazardDomain {
            registry: Registry::new(config.max_participants),
            retired: RetiredList::new(),
            node_allocator: NodeAllocator::new(config.pool_capacity),
            config: config.clone(),
        }
    }

    // Sorted snapshot of every published address, across all participants
    fn hazards(&self) -> Vec<*mut Node<K, V>> {
        fence(Ordering::SeqCst);

        let mut hazards = Vec::new();
        for participant in self.registry.iter() {
            // Transfers move protection toward lower slots; read from the top
            for slot in participant.local().slots.iter().rev() {
                let ptr = slot.load(Ordering::SeqCst);
                if !ptr.is_null() {
                    hazards.push(ptr);
                }
            }
        }
        hazards.sort_unstable();
        hazards
    }

    /// Whether any participant currently publishes `node`.
    pub fn is_protected(&self, node: *mut Node<K, V>) -> bool {
        self.hazards().binary_search(&node).is_ok()
    }

    /// Free every retired node no participant publishes.
    pub fn scan(&self) -> usize {
        let batch = self.retired.take_all();
        if batch.is_empty() {
            return 0;
        }

        let hazards = self.hazards();
        let (freed, survivors) = batch.sweep(|entry| {
            if hazards.binary_search(&entry.node).is_err() {
                unsafe { self.node_allocator.deallocate(entry.node) };
                true
            } else {
                false
            }
        });

        debug_log!(
            freed,
            kept = survivors.len(),
            hazards = hazards.len(),
            "hazard scan"
        );
        self.retired.restore(survivors);
        freed
    }
}

unsafe impl<K: Send + Sync, V: Send + Sync> Reclaimer<K, V> for HazardDomain<K, V> {
    type Local = HazardRecord<K, V>;
    type Guard<'g>
        = HazardGuard<'g, K, V>
    where
        Self: 'g;

    fn with_config(config: &SetConfig) -> Self {
        Self::from_config(config)
    }

    fn registry(&self) -> &Registry<HazardRecord<K, V>> {
        &self.registry
    }

    fn allocator(&self) -> &NodeAllocator<K, V> {
        &self.node_allocator
    }

    fn pin<'g>(&'g self, local: &'g HazardRecord<K, V>) -> HazardGuard<'g, K, V> {
        let nested = local.guarded.swap(true, Ordering::Relaxed);
        debug_assert!(!nested, "one hazard guard per participant at a time");
        HazardGuard { record: local }
    }

    unsafe fn retire(&self, _local: &HazardRecord<K, V>, node: *mut Node<K, V>) {
        let pending = self.retired.push(node, 0);
        if pending > self.config.scan_threshold(self.registry.active()) {
            self.scan();
        }
    }

    fn try_reclaim(&self, _local: &HazardRecord<K, V>) -> usize {
        self.scan()
    }

    fn pending(&self) -> usize {
        self.retired.len()
    }

    fn release(&self, local: &HazardRecord<K, V>) {
        local.clear();
    }
}

impl<K, V> Drop for HazardDomain<K, V> {
    fn drop(&mut self) {
        let (_, survivors) = self.retired.take_all().sweep(|entry| {
            unsafe { self.node_allocator.deallocate(entry.node) };
            true
        });
        debug_assert_eq!(survivors.len(), 0);
    }
}

/// Hazard slots in use by one operation; cleared on drop.
pub struct HazardGuard<'g, K, V> {
    record: &'g HazardRecord<K, V>,
}

impl<K, V> Protect<K, V> for HazardGuard<'_, K, V> {
    const VALIDATES: bool = true;

    fn protect(&self, slot: Slot, link: &AtomicMarkedPtr<Node<K, V>>) -> MarkedPtr<Node<K, V>> {
        let hazard = &self.record.slots[slot as usize];
        let mut value = link.load(Ordering::Acquire);
        loop {
            // Publish, then validate the source still points at it
            hazard.store(value.as_ptr(), Ordering::SeqCst);
            fence(Ordering::SeqCst);

            let current = link.load(Ordering::Acquire);
            if current.as_ptr() == value.as_ptr() {
                return current;
            }
            value = current;
        }
    }

    #[inline]
    fn transfer(&self, from: Slot, to: Slot) {
        let ptr = self.record.slots[from as usize].load(Ordering::Relaxed);
        self.record.slots[to as usize].store(ptr, Ordering::SeqCst);
    }
}

impl<K, V> Drop for HazardGuard<'_, K, V> {
    fn drop(&mut self) {
        self.record.clear();
        self.record.guarded.store(false, Ordering::Relaxed);
    }
}
