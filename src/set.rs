use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::Ordering;

use crate::backoff::Backoff;
use crate::config::SetConfig;
use crate::error::SetError;
use crate::handle::Handle;
use crate::marked_ptr::{AtomicMarkedPtr, MarkedPtr};
use crate::node::Node;
use crate::reclaim::epoch::EpochManager;
use crate::reclaim::{Protect, Reclaimer, Slot};

/// Result of [`LockFreeSet::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The key was already in the set; the existing payload is kept.
    AlreadyPresent,
}

/// Result of [`LockFreeSet::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Allocation and reclamation counters of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReclaimStats {
    /// Nodes handed out by the allocator, including rejected duplicates.
    pub allocated: usize,
    /// Nodes whose contents were dropped and memory released or pooled.
    pub freed: usize,
    /// Unlinked nodes waiting for the reclaimer.
    pub retired_pending: usize,
    /// Allocations served from a per-thread pool.
    pub recycled: usize,
}

// (predecessor link, current node) pair produced by a traversal
struct Window<K, V> {
    pred: *const AtomicMarkedPtr<Node<K, V>>,
    curr: *mut Node<K, V>,
}

// What a traversal reports to its visitor
enum Visit<'n, K, V> {
    /// The traversal went back to the head; discard partial results.
    Restart,
    Node { node: &'n Node<K, V>, marked: bool },
}

/// A lock-free sorted set of unique keys, each carrying an immutable payload.
///
/// Nodes form one chain in ascending key order behind a head link. Removal
/// marks the node's own link first (the linearization point) and unlinks it
/// second; any traversal that meets a marked node helps unlink it. Unlinked
/// nodes go to the reclaimer `R`, which frees them once no participant can
/// still observe them.
///
/// Every operation takes the caller's [`Handle`], obtained from
/// [`register`](LockFreeSet::register).
pub struct LockFreeSet<K, V = (), R: Reclaimer<K, V> = EpochManager<K, V>> {
    head: AtomicMarkedPtr<Node<K, V>>,
    reclaimer: R,
    _owns: PhantomData<Box<Node<K, V>>>,
}

impl<K: Ord, V, R: Reclaimer<K, V>> Default for LockFreeSet<K, V, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V, R: Reclaimer<K, V>> LockFreeSet<K, V, R> {
    pub fn new() -> Self {
        Self::with_config(SetConfig::default())
    }

    pub fn with_config(config: SetConfig) -> Self {
        LockFreeSet {
            head: AtomicMarkedPtr::null(),
            reclaimer: R::with_config(&config),
            _owns: PhantomData,
        }
    }

    /// Register the calling thread. The handle is released on drop.
    pub fn register(&self) -> Result<Handle<'_, K, V, R>, SetError> {
        let participant = self.reclaimer.registry().acquire()?;
        Ok(Handle::new(&self.reclaimer, participant))
    }

    pub fn reclaimer(&self) -> &R {
        &self.reclaimer
    }

    fn check(&self, handle: &Handle<'_, K, V, R>) -> Result<(), SetError> {
        let checked = handle.check(self.reclaimer.registry());
        if checked.is_err() {
            warn_log!("handle from another set rejected");
        }
        checked
    }

    /// Insert `key` unless it is already present.
    ///
    /// The first writer wins: on [`InsertOutcome::AlreadyPresent`] the stored
    /// payload is untouched and `value` is dropped.
    pub fn insert(
        &self,
        key: K,
        value: V,
        handle: &Handle<'_, K, V, R>,
    ) -> Result<InsertOutcome, SetError> {
        self.check(handle)?;
        let guard = self.reclaimer.pin(handle.local());
        let allocator = self.reclaimer.allocator();

        let node = allocator.allocate(key, value);
        let key = unsafe { (*node).key() };
        let mut backoff = Backoff::new();

        loop {
            let window = self.find_window(key, &guard, handle);

            if !window.curr.is_null() && unsafe { (*window.curr).key() } == key {
                // Never published, nobody else can hold it
                unsafe { allocator.deallocate(node) };
                return Ok(InsertOutcome::AlreadyPresent);
            }

            let expected = MarkedPtr::new(window.curr, false);
            unsafe { (*node).next.store(expected, Ordering::Relaxed) };

            let pred = unsafe { &*window.pred };
            match pred.compare_exchange(expected, MarkedPtr::new(node, false)) {
                Ok(_) => return Ok(InsertOutcome::Inserted),
                Err(_) => {
                    handle.note_retry();
                    backoff.snooze();
                }
            }
        }
    }

    /// Remove `key`. Logical deletion (marking the node) is the point at
    /// which the key leaves the set; unlinking may be finished by any thread.
    pub fn remove(&self, key: &K, handle: &Handle<'_, K, V, R>) -> Result<RemoveOutcome, SetError> {
        self.check(handle)?;
        let guard = self.reclaimer.pin(handle.local());
        let mut backoff = Backoff::new();

        loop {
            let window = self.find_window(key, &guard, handle);

            let Some(curr) = (unsafe { window.curr.as_ref() }) else {
                return Ok(RemoveOutcome::NotFound);
            };
            if curr.key() != key {
                return Ok(RemoveOutcome::NotFound);
            }

            let succ = curr.load_next();
            if succ.is_marked() {
                // Lost to a concurrent remover; the next pass helps it finish
                handle.note_retry();
                continue;
            }

            if curr.next.compare_exchange(succ, succ.with_mark(true)).is_err() {
                handle.note_retry();
                backoff.snooze();
                continue;
            }

            let pred = unsafe { &*window.pred };
            if pred
                .compare_exchange(MarkedPtr::new(window.curr, false), succ)
                .is_ok()
            {
                unsafe { self.reclaimer.retire(handle.local(), window.curr) };
            } else {
                // Someone changed pred first; a traversal past the key unlinks it
                handle.note_retry();
                self.find_window(key, &guard, handle);
            }
            return Ok(RemoveOutcome::Removed);
        }
    }

    /// Whether `key` is in the set.
    pub fn contains(&self, key: &K, handle: &Handle<'_, K, V, R>) -> Result<bool, SetError> {
        self.check(handle)?;
        let guard = self.reclaimer.pin(handle.local());

        let mut found = false;
        self.walk(&guard, handle, |visit| match visit {
            Visit::Restart => false,
            Visit::Node { node, marked } => {
                if node.key() < key {
                    return false;
                }
                found = node.key() == key && !marked;
                true
            }
        });
        Ok(found)
    }

    /// A clone of the payload stored under `key`.
    pub fn get(&self, key: &K, handle: &Handle<'_, K, V, R>) -> Result<Option<V>, SetError>
    where
        V: Clone,
    {
        self.check(handle)?;
        let guard = self.reclaimer.pin(handle.local());

        let mut value = None;
        self.walk(&guard, handle, |visit| match visit {
            Visit::Restart => false,
            Visit::Node { node, marked } => {
                if node.key() < key {
                    return false;
                }
                if node.key() == key && !marked {
                    value = Some(node.value().clone());
                }
                true
            }
        });
        Ok(value)
    }

    /// Number of unmarked nodes seen by one pass over the chain.
    ///
    /// Not a snapshot: under concurrent updates the count may match no single
    /// point in time.
    pub fn size(&self, handle: &Handle<'_, K, V, R>) -> Result<usize, SetError> {
        self.check(handle)?;
        let guard = self.reclaimer.pin(handle.local());

        let mut count = 0;
        self.walk(&guard, handle, |visit| {
            match visit {
                Visit::Restart => count = 0,
                Visit::Node { marked, .. } => {
                    if !marked {
                        count += 1;
                    }
                }
            }
            false
        });
        Ok(count)
    }

    /// Whether a pass over the chain finds no unmarked node.
    pub fn is_empty(&self, handle: &Handle<'_, K, V, R>) -> Result<bool, SetError> {
        self.check(handle)?;
        let guard = self.reclaimer.pin(handle.local());

        let mut empty = true;
        self.walk(&guard, handle, |visit| match visit {
            Visit::Restart => false,
            Visit::Node { marked, .. } => {
                empty = marked;
                !marked
            }
        });
        Ok(empty)
    }

    /// Keys of the unmarked nodes seen by one pass, in chain order.
    ///
    /// Approximate in the same way as [`size`](LockFreeSet::size); at a
    /// quiescent point it is exactly the set's contents, strictly ascending.
    pub fn keys(&self, handle: &Handle<'_, K, V, R>) -> Result<Vec<K>, SetError>
    where
        K: Clone,
    {
        self.check(handle)?;
        let guard = self.reclaimer.pin(handle.local());

        let mut keys = Vec::new();
        self.walk(&guard, handle, |visit| {
            match visit {
                Visit::Restart => keys.clear(),
                Visit::Node { node, marked } => {
                    if !marked {
                        keys.push(node.key().clone());
                    }
                }
            }
            false
        });
        Ok(keys)
    }

    /// Ask the reclaimer to free what it can. Returns the number of nodes freed.
    pub fn try_reclaim(&self, handle: &Handle<'_, K, V, R>) -> Result<usize, SetError> {
        self.check(handle)?;
        Ok(self.reclaimer.try_reclaim(handle.local()))
    }

    /// Search for `key` and return while still holding the search's
    /// protection, the way an operation suspended right after its traversal
    /// would. The flag reports whether `key` was found. Dropping the guard
    /// ends the operation.
    ///
    /// Useful for observing reclamation around a stalled thread.
    ///
    /// # Safety
    ///
    /// `handle` must not be passed to any other operation until the guard is
    /// dropped. A second guard on the same record would overwrite or clear
    /// the protection this one holds.
    pub unsafe fn suspend_at<'h>(
        &'h self,
        key: &K,
        handle: &'h Handle<'_, K, V, R>,
    ) -> Result<(R::Guard<'h>, bool), SetError> {
        self.check(handle)?;
        let guard = self.reclaimer.pin(handle.local());

        let window = self.find_window(key, &guard, handle);
        let found = unsafe { window.curr.as_ref() }.is_some_and(|node| node.key() == key);
        trace_log!(found, "operation suspended");
        Ok((guard, found))
    }

    pub fn stats(&self) -> ReclaimStats {
        let allocator = self.reclaimer.allocator();
        ReclaimStats {
            allocated: allocator.allocated(),
            freed: allocator.freed(),
            retired_pending: self.reclaimer.pending(),
            recycled: allocator.recycled(),
        }
    }

    fn find_window<'g>(
        &'g self,
        key: &K,
        guard: &R::Guard<'g>,
        handle: &Handle<'_, K, V, R>,
    ) -> Window<K, V> {
        self.find_window_by(guard, handle, |visit| {
            matches!(visit, Visit::Node { node, .. } if node.key() >= key)
        })
    }

    /// Walk from the head, unlinking every marked node on the way, until
    /// `stop` accepts an unmarked node or the chain ends.
    ///
    /// On return `curr` (if any) is protected in [`Slot::Curr`] and the node
    /// owning `pred` in [`Slot::Pred`].
    fn find_window_by<'g>(
        &'g self,
        guard: &R::Guard<'g>,
        handle: &Handle<'_, K, V, R>,
        mut stop: impl FnMut(Visit<'_, K, V>) -> bool,
    ) -> Window<K, V> {
        let validates = <R::Guard<'g> as Protect<K, V>>::VALIDATES;

        'retry: loop {
            let mut pred: *const AtomicMarkedPtr<Node<K, V>> = &self.head;
            // The head link is never marked
            let mut curr = guard.protect(Slot::Curr, &self.head);

            loop {
                let Some(curr_node) = (unsafe { curr.as_ptr().as_ref() }) else {
                    return Window {
                        pred,
                        curr: ptr::null_mut(),
                    };
                };
                curr_node.assert_live();

                let next = guard.protect(Slot::Succ, &curr_node.next);

                // `next` is only safe if curr was still linked after it was published
                if validates && unsafe { (*pred).load(Ordering::Acquire) } != curr {
                    handle.note_retry();
                    stop(Visit::Restart);
                    continue 'retry;
                }

                if next.is_marked() {
                    let unmarked = next.with_mark(false);
                    match unsafe { (*pred).compare_exchange(curr, unmarked) } {
                        Ok(_) => {
                            unsafe { self.reclaimer.retire(handle.local(), curr.as_ptr()) };
                            guard.transfer(Slot::Succ, Slot::Curr);
                            curr = unmarked;
                        }
                        Err(actual) => {
                            handle.note_retry();
                            if actual.is_marked() {
                                stop(Visit::Restart);
                                continue 'retry;
                            }
                            // Pred is still live, resume from it
                            curr = guard.protect(Slot::Curr, unsafe { &*pred });
                            if curr.is_marked() {
                                stop(Visit::Restart);
                                continue 'retry;
                            }
                        }
                    }
                    continue;
                }

                if stop(Visit::Node {
                    node: curr_node,
                    marked: false,
                }) {
                    return Window {
                        pred,
                        curr: curr.as_ptr(),
                    };
                }

                pred = ptr::from_ref(&curr_node.next);
                guard.transfer(Slot::Curr, Slot::Pred);
                guard.transfer(Slot::Succ, Slot::Curr);
                curr = next;
            }
        }
    }

    // Read-only pass for contains/get/size/keys
    fn walk<'g>(
        &'g self,
        guard: &R::Guard<'g>,
        handle: &Handle<'_, K, V, R>,
        mut visit: impl FnMut(Visit<'_, K, V>) -> bool,
    ) {
        if <R::Guard<'g> as Protect<K, V>>::VALIDATES {
            // A chain of marked nodes cannot be revalidated from slots alone,
            // so hazard readers unlink them as they go
            self.find_window_by(guard, handle, &mut visit);
            return;
        }

        // Pinned: every node reachable when read stays allocated, marked or not
        let mut curr = guard.protect(Slot::Curr, &self.head);
        while let Some(node) = unsafe { curr.as_ptr().as_ref() } {
            node.assert_live();
            let next = guard.protect(Slot::Succ, &node.next);
            if visit(Visit::Node {
                node,
                marked: next.is_marked(),
            }) {
                return;
            }
            curr = next;
        }
    }
}

impl<K, V, R: Reclaimer<K, V>> Drop for LockFreeSet<K, V, R> {
    fn drop(&mut self) {
        // No handles remain; every linked node, marked or not, is ours alone
        let allocator = self.reclaimer.allocator();
        let mut curr = self.head.load(Ordering::Acquire).as_ptr();
        while !curr.is_null() {
            let next = unsafe { (*curr).load_next() }.as_ptr();
            unsafe { allocator.deallocate(curr) };
            curr = next;
        }

        debug_log!(
            freed = allocator.freed(),
            pending = self.reclaimer.pending(),
            "set dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reclaim::hazard::HazardDomain;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn single_thread_scenario<R: Reclaimer<u64, ()>>() {
        let set = LockFreeSet::<u64, (), R>::new();
        let handle = set.register().unwrap();

        for key in [5, 1, 3] {
            assert_eq!(set.insert(key, (), &handle).unwrap(), InsertOutcome::Inserted);
        }
        assert!(set.contains(&5, &handle).unwrap());
        assert!(set.contains(&3, &handle).unwrap());
        assert_eq!(set.size(&handle).unwrap(), 3);
        assert_eq!(set.keys(&handle).unwrap(), vec![1, 3, 5]);

        assert_eq!(set.remove(&1, &handle).unwrap(), RemoveOutcome::Removed);
        assert!(!set.contains(&1, &handle).unwrap());
        assert_eq!(set.size(&handle).unwrap(), 2);
        assert_eq!(set.remove(&1, &handle).unwrap(), RemoveOutcome::NotFound);
    }

    #[test]
    fn single_thread_scenario_epoch() {
        single_thread_scenario::<EpochManager<u64, ()>>();
    }

    #[test]
    fn single_thread_scenario_hazard() {
        single_thread_scenario::<HazardDomain<u64, ()>>();
    }

    fn duplicate_insert_keeps_first_value<R: Reclaimer<u64, String>>() {
        let set = LockFreeSet::<u64, String, R>::new();
        let handle = set.register().unwrap();

        assert_eq!(
            set.insert(4, "first".to_string(), &handle).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            set.insert(4, "second".to_string(), &handle).unwrap(),
            InsertOutcome::AlreadyPresent
        );
        assert_eq!(set.get(&4, &handle).unwrap().as_deref(), Some("first"));
        assert_eq!(set.get(&5, &handle).unwrap(), None);
        assert_eq!(set.size(&handle).unwrap(), 1);

        // The rejected node was released at once
        let stats = set.stats();
        assert_eq!(stats.allocated, 2);
        assert_eq!(stats.freed, 1);
    }

    #[test]
    fn duplicate_insert_keeps_first_value_epoch() {
        duplicate_insert_keeps_first_value::<EpochManager<u64, String>>();
    }

    #[test]
    fn duplicate_insert_keeps_first_value_hazard() {
        duplicate_insert_keeps_first_value::<HazardDomain<u64, String>>();
    }

    #[test]
    fn empty_set_operations() {
        let set = LockFreeSet::<u64>::new();
        let handle = set.register().unwrap();

        assert!(set.is_empty(&handle).unwrap());
        assert_eq!(set.size(&handle).unwrap(), 0);
        assert!(!set.contains(&0, &handle).unwrap());
        assert_eq!(set.remove(&0, &handle).unwrap(), RemoveOutcome::NotFound);
        assert_eq!(set.remove(&0, &handle).unwrap(), RemoveOutcome::NotFound);

        set.insert(0, (), &handle).unwrap();
        assert!(!set.is_empty(&handle).unwrap());
        set.remove(&0, &handle).unwrap();
        assert!(set.is_empty(&handle).unwrap());
    }

    #[test]
    fn boundary_keys_keep_order() {
        let set = LockFreeSet::<i64, (), HazardDomain<i64, ()>>::new();
        let handle = set.register().unwrap();

        for key in [0, i64::MAX, i64::MIN, -1, 1] {
            set.insert(key, (), &handle).unwrap();
        }
        assert_eq!(
            set.keys(&handle).unwrap(),
            vec![i64::MIN, -1, 0, 1, i64::MAX]
        );

        set.remove(&i64::MIN, &handle).unwrap();
        set.remove(&i64::MAX, &handle).unwrap();
        assert_eq!(set.keys(&handle).unwrap(), vec![-1, 0, 1]);
    }

    #[test]
    fn marked_node_is_skipped_then_unlinked() {
        let set = LockFreeSet::<u64, u64>::new();
        let handle = set.register().unwrap();

        for key in 1..=3 {
            set.insert(key, key * 10, &handle).unwrap();
        }

        // Mark 2 by hand, leaving it linked as a stalled remover would
        let second = unsafe { &*(*set.head.load(Ordering::Acquire).as_ptr()).load_next().as_ptr() };
        assert_eq!(*second.key(), 2);
        let succ = second.load_next();
        second.next.compare_exchange(succ, succ.with_mark(true)).unwrap();

        assert!(!set.contains(&2, &handle).unwrap());
        assert_eq!(set.get(&2, &handle).unwrap(), None);
        assert_eq!(set.size(&handle).unwrap(), 2);
        assert_eq!(set.stats().retired_pending, 0);

        // An insert past it helps unlink and retire it
        set.insert(4, 40, &handle).unwrap();
        assert_eq!(set.stats().retired_pending, 1);
        assert_eq!(set.keys(&handle).unwrap(), vec![1, 3, 4]);
        assert_eq!(set.remove(&2, &handle).unwrap(), RemoveOutcome::NotFound);
    }

    #[test]
    fn foreign_handle_is_rejected() {
        let ours = LockFreeSet::<u64>::new();
        let theirs = LockFreeSet::<u64>::new();
        let handle = theirs.register().unwrap();

        assert_eq!(ours.insert(1, (), &handle), Err(SetError::ForeignHandle));
        assert_eq!(ours.contains(&1, &handle), Err(SetError::ForeignHandle));
        assert_eq!(ours.remove(&1, &handle), Err(SetError::ForeignHandle));
        assert_eq!(ours.try_reclaim(&handle), Err(SetError::ForeignHandle));
        assert!(theirs.insert(1, (), &handle).is_ok());
    }

    #[test]
    fn participant_limit_and_reuse() {
        let set = LockFreeSet::<u64>::with_config(SetConfig::default().with_max_participants(Some(1)));

        let first = set.register().unwrap();
        assert_eq!(
            set.register().err(),
            Some(SetError::TooManyParticipants { limit: 1 })
        );

        drop(first);
        let second = set.register().unwrap();
        assert!(set.insert(1, (), &second).unwrap() == InsertOutcome::Inserted);
        assert_eq!(set.reclaimer().registry().records(), 1);
    }

    #[test]
    fn live_handles_never_share_a_record() {
        let set = LockFreeSet::<u64, (), HazardDomain<u64, ()>>::new();
        let a = set.register().unwrap();
        let b = set.register().unwrap();
        assert!(!ptr::eq(a.local(), b.local()));
        assert_eq!(set.reclaimer().registry().active(), 2);

        drop(a);
        let c = set.register().unwrap();
        assert!(!ptr::eq(b.local(), c.local()));

        drop(b);
        drop(c);
        assert_eq!(set.reclaimer().registry().active(), 0);
        assert_eq!(set.reclaimer().registry().records(), 2);
    }

    #[test]
    fn suspended_search_keeps_epoch_pinned() {
        let set = LockFreeSet::<u64, u64>::new();
        let stalled = set.register().unwrap();
        let other = set.register().unwrap();
        set.insert(1, 10, &other).unwrap();

        let (guard, found) = unsafe { set.suspend_at(&1, &stalled) }.unwrap();
        assert!(found);
        assert!(stalled.local().is_pinned());

        assert_eq!(set.remove(&1, &other).unwrap(), RemoveOutcome::Removed);
        for _ in 0..4 {
            assert_eq!(set.try_reclaim(&other).unwrap(), 0);
        }
        assert_eq!(set.stats().retired_pending, 1);

        drop(guard);
        assert!(!stalled.local().is_pinned());
        let mut freed = 0;
        for _ in 0..3 {
            freed += set.try_reclaim(&other).unwrap();
        }
        assert_eq!(freed, 1);
    }

    #[test]
    fn suspended_search_keeps_hazard_slot() {
        let set = LockFreeSet::<u64, u64, HazardDomain<u64, u64>>::new();
        let stalled = set.register().unwrap();
        let other = set.register().unwrap();
        set.insert(1, 10, &other).unwrap();
        set.insert(2, 20, &other).unwrap();

        let (guard, found) = unsafe { set.suspend_at(&2, &stalled) }.unwrap();
        assert!(found);
        let held = stalled.local().published(Slot::Curr);
        assert!(!held.is_null());
        assert_eq!(unsafe { *(*held).key() }, 2);

        assert_eq!(set.remove(&2, &other).unwrap(), RemoveOutcome::Removed);
        assert_eq!(set.try_reclaim(&other).unwrap(), 0);
        assert_eq!(set.stats().retired_pending, 1);

        drop(guard);
        assert_eq!(set.try_reclaim(&other).unwrap(), 1);
        assert_eq!(set.keys(&other).unwrap(), vec![1]);
    }

    #[test]
    fn suspend_at_rejects_foreign_handle() {
        let ours = LockFreeSet::<u64>::new();
        let theirs = LockFreeSet::<u64>::new();
        let handle = theirs.register().unwrap();

        assert_eq!(
            unsafe { ours.suspend_at(&1, &handle) }.err(),
            Some(SetError::ForeignHandle)
        );
    }

    fn concurrent_same_key_insert<R: Reclaimer<u64, usize> + 'static>() {
        for _ in 0..50 {
            let set = Arc::new(LockFreeSet::<u64, usize, R>::new());
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|t| {
                    let set = Arc::clone(&set);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        let handle = set.register().unwrap();
                        barrier.wait();
                        set.insert(7, t, &handle).unwrap()
                    })
                })
                .collect();

            let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let inserted = outcomes
                .iter()
                .filter(|o| **o == InsertOutcome::Inserted)
                .count();
            assert_eq!(inserted, 1, "outcomes: {:?}", outcomes);

            let handle = set.register().unwrap();
            assert!(set.contains(&7, &handle).unwrap());
            assert_eq!(set.keys(&handle).unwrap(), vec![7]);
        }
    }

    #[test]
    fn concurrent_same_key_insert_epoch() {
        concurrent_same_key_insert::<EpochManager<u64, usize>>();
    }

    #[test]
    fn concurrent_same_key_insert_hazard() {
        concurrent_same_key_insert::<HazardDomain<u64, usize>>();
    }

    #[test]
    fn drop_releases_linked_and_retired_payloads() {
        let payload = Arc::new(());
        {
            let set = LockFreeSet::<u64, Arc<()>>::new();
            let handle = set.register().unwrap();
            for key in 0..100 {
                set.insert(key, Arc::clone(&payload), &handle).unwrap();
            }
            for key in (0..100).step_by(2) {
                set.remove(&key, &handle).unwrap();
            }
            assert_eq!(set.size(&handle).unwrap(), 50);
        }
        assert_eq!(Arc::strong_count(&payload), 1);
    }
}
