use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

use crate::error::SetError;

/// One thread's protection record, owned by at most one handle at a time.
///
/// Records are padded to a cache line so owners and scanners of neighbouring
/// records do not contend.
#[repr(align(64))]
pub struct Participant<T> {
    in_use: AtomicBool,
    // Immutable once the participant is published
    next: *mut Participant<T>,
    local: T,
}

unsafe impl<T: Send> Send for Participant<T> {}
unsafe impl<T: Sync> Sync for Participant<T> {}

impl<T> Participant<T> {
    pub(crate) fn local(&self) -> &T {
        &self.local
    }

    pub fn in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }
}

/// Lock-free, grow-only list of participants.
///
/// Released participants are reused by later registrations; memory is only
/// returned when the registry is dropped, so scanners may walk the list at
/// any time without protection.
pub struct Registry<T> {
    head: AtomicPtr<Participant<T>>,
    records: AtomicUsize,
    active: AtomicUsize,
    limit: Option<usize>,
}

unsafe impl<T: Send> Send for Registry<T> {}
unsafe impl<T: Send + Sync> Sync for Registry<T> {}

impl<T: Default> Registry<T> {
    pub fn new(limit: Option<usize>) -> Self {
        Registry {
            head: AtomicPtr::new(ptr::null_mut()),
            records: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            limit,
        }
    }

    /// Claim a released participant or publish a fresh one.
    pub(crate) fn acquire(&self) -> Result<&Participant<T>, SetError> {
        self.reserve()?;

        for participant in self.iter() {
            if !participant.in_use.load(Ordering::Relaxed)
                && participant
                    .in_use
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
            {
                trace_log!(participant = ?(participant as *const Participant<T>), "reusing participant record");
                return Ok(participant);
            }
        }

        let fresh = Box::into_raw(Box::new(Participant {
            in_use: AtomicBool::new(true),
            next: ptr::null_mut(),
            local: T::default(),
        }));

        let mut head = self.head.load(Ordering::Acquire);
        loop {
            // Still private, plain write is fine
            unsafe { (*fresh).next = head };
            match self
                .head
                .compare_exchange_weak(head, fresh, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }

        self.records.fetch_add(1, Ordering::Relaxed);
        debug_log!(records = self.records(), "registered new participant record");

        Ok(unsafe { &*fresh })
    }

    fn reserve(&self) -> Result<(), SetError> {
        let Some(limit) = self.limit else {
            self.active.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };

        let mut active = self.active.load(Ordering::Relaxed);
        loop {
            if active >= limit {
                warn_log!(limit, "participant limit reached");
                return Err(SetError::TooManyParticipants { limit });
            }
            match self.active.compare_exchange_weak(
                active,
                active + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => active = actual,
            }
        }
    }
}

impl<T> Registry<T> {
    /// Give a participant back. Its `local` state must already be quiescent.
    pub(crate) fn release(&self, participant: &Participant<T>) {
        debug_assert!(participant.in_use());
        participant.in_use.store(false, Ordering::Release);
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Every participant ever published, in use or not.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.load(Ordering::Acquire),
            _registry: self,
        }
    }

    /// Handles currently registered.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Participant records allocated so far.
    pub fn records(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }
}

impl<T> Drop for Registry<T> {
    fn drop(&mut self) {
        let mut current = *self.head.get_mut();
        while !current.is_null() {
            let boxed = unsafe { Box::from_raw(current) };
            current = boxed.next;
        }
    }
}

pub(crate) struct Iter<'a, T> {
    next: *mut Participant<T>,
    _registry: &'a Registry<T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a Participant<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next.is_null() {
            return None;
        }
        let participant = unsafe { &*self.next };
        self.next = participant.next;
        Some(participant)
    }
}
