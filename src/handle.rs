use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use crate::error::SetError;
use crate::reclaim::Reclaimer;
use crate::reclaim::registry::{Participant, Registry};

/// A thread's registration with one set.
///
/// Every set operation takes the handle explicitly; it carries the
/// participant record the reclaimer reads when deciding what may be freed.
/// A handle is `Send` but not `Sync`: one thread uses it at a time.
/// Dropping it returns the record to the set for reuse.
///
/// The record itself stays private to the handle:
///
/// ```compile_fail
/// use lfset::reclaim::Reclaimer;
///
/// let set = lfset::EpochSet::<u64>::new();
/// let handle = set.register().unwrap();
/// set.reclaimer().registry().release(handle.participant());
/// ```
pub struct Handle<'s, K, V, R: Reclaimer<K, V>> {
    reclaimer: &'s R,
    participant: &'s Participant<R::Local>,
    retries: Cell<u64>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<'s, K, V, R: Reclaimer<K, V>> Handle<'s, K, V, R> {
    pub(crate) fn new(reclaimer: &'s R, participant: &'s Participant<R::Local>) -> Self {
        Handle {
            reclaimer,
            participant,
            retries: Cell::new(0),
            _marker: PhantomData,
        }
    }

    /// Failed CAS attempts seen by operations on this handle.
    ///
    /// Purely diagnostic, it grows with contention and never bounds a retry loop.
    pub fn retries(&self) -> u64 {
        self.retries.get()
    }

    #[inline]
    pub(crate) fn note_retry(&self) {
        self.retries.set(self.retries.get().wrapping_add(1));
    }

    #[inline]
    pub(crate) fn local(&self) -> &'s R::Local {
        self.participant.local()
    }

    pub(crate) fn check(&self, registry: &Registry<R::Local>) -> Result<(), SetError> {
        if ptr::eq(self.reclaimer.registry(), registry) {
            Ok(())
        } else {
            Err(SetError::ForeignHandle)
        }
    }
}

impl<K, V, R: Reclaimer<K, V>> fmt::Debug for Handle<'_, K, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("participant", &(self.participant as *const Participant<R::Local>))
            .field("retries", &self.retries.get())
            .finish()
    }
}

impl<K, V, R: Reclaimer<K, V>> Drop for Handle<'_, K, V, R> {
    fn drop(&mut self) {
        self.reclaimer.release(self.participant.local());
        self.reclaimer.registry().release(self.participant);
        trace_log!(retries = self.retries.get(), "handle released");
    }
}
