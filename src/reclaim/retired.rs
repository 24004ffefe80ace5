use std::ptr;
use std::sync::atomic::{AtomicIsize, AtomicPtr, Ordering};

// Garbage collection entry
pub(crate) struct Retired<T> {
    pub(crate) node: *mut T,
    /// Global epoch at retirement; unused by the hazard strategy.
    pub(crate) epoch: usize,
    next: *mut Retired<T>,
}

/// Global retirement list: a push-only Treiber stack drained with a single
/// swap, so a node sits in exactly one place (the list or one scanner's batch).
pub(crate) struct RetiredList<T> {
    head: AtomicPtr<Retired<T>>,
    // Updated after the CAS/swap, so it may briefly dip below zero
    len: AtomicIsize,
}

impl<T> RetiredList<T> {
    pub(crate) fn new() -> Self {
        RetiredList {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicIsize::new(0),
        }
    }

    /// Add an unlinked node. Returns the approximate list length afterwards.
    pub(crate) fn push(&self, node: *mut T, epoch: usize) -> usize {
        let entry = Box::into_raw(Box::new(Retired {
            node,
            epoch,
            next: ptr::null_mut(),
        }));
        unsafe { self.push_chain(entry, entry, 1) }
    }

    // `first..=last` must be a private, well-formed chain of `count` entries
    unsafe fn push_chain(&self, first: *mut Retired<T>, last: *mut Retired<T>, count: usize) -> usize {
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            unsafe { (*last).next = head };
            match self
                .head
                .compare_exchange_weak(head, first, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
        let count = count as isize;
        (self.len.fetch_add(count, Ordering::Relaxed) + count).max(0) as usize
    }

    /// Detach every entry; the caller owns the batch exclusively.
    pub(crate) fn take_all(&self) -> RetiredBatch<T> {
        let head = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        let mut count = 0;
        let mut current = head;
        while !current.is_null() {
            count += 1;
            current = unsafe { (*current).next };
        }
        self.len.fetch_sub(count as isize, Ordering::Relaxed);
        RetiredBatch { head, count }
    }

    /// Approximate number of retired nodes awaiting reclamation.
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    /// Push the entries a sweep kept back onto the list.
    pub(crate) fn restore(&self, survivors: Survivors<T>) {
        if let Some((first, last)) = survivors.ends {
            unsafe { self.push_chain(first, last, survivors.count) };
        }
    }
}

impl<T> Drop for RetiredList<T> {
    fn drop(&mut self) {
        // Entries own no nodes here; whoever drops the list frees nodes first
        let mut current = *self.head.get_mut();
        while !current.is_null() {
            let boxed = unsafe { Box::from_raw(current) };
            current = boxed.next;
        }
    }
}

/// A detached chain of retired entries.
pub(crate) struct RetiredBatch<T> {
    head: *mut Retired<T>,
    count: usize,
}

impl<T> RetiredBatch<T> {
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Walk the batch; entries for which `free` returns true are released,
    /// the rest are collected into [`Survivors`].
    pub(crate) fn sweep(mut self, mut free: impl FnMut(&Retired<T>) -> bool) -> (usize, Survivors<T>) {
        let mut freed = 0;
        let mut survivors = Survivors {
            ends: None,
            count: 0,
        };

        let mut current = std::mem::replace(&mut self.head, ptr::null_mut());
        while !current.is_null() {
            let next = unsafe { (*current).next };

            if free(unsafe { &*current }) {
                drop(unsafe { Box::from_raw(current) });
                freed += 1;
            } else {
                unsafe { (*current).next = ptr::null_mut() };
                survivors.push(current);
            }

            current = next;
        }

        debug_assert_eq!(freed + survivors.count, self.count);
        (freed, survivors)
    }
}

impl<T> Drop for RetiredBatch<T> {
    fn drop(&mut self) {
        debug_assert!(self.head.is_null(), "retired batch dropped without a sweep");
    }
}

/// Entries a sweep could not reclaim yet.
pub(crate) struct Survivors<T> {
    ends: Option<(*mut Retired<T>, *mut Retired<T>)>,
    count: usize,
}

impl<T> Survivors<T> {
    fn push(&mut self, entry: *mut Retired<T>) {
        self.ends = match self.ends {
            None => Some((entry, entry)),
            Some((first, last)) => {
                unsafe { (*entry).next = first };
                Some((entry, last))
            }
        };
        self.count += 1;
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }
}
