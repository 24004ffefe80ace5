// Marked pointer: a node reference with its "logically deleted" flag packed
// into the least significant bit.
//
//   Bit 0: DELETE_MARK - the node owning this link is logically deleted
//
// Nodes are cache-line aligned, so bit 0 of a real address is always zero.
// Once a link carries the mark, its reference component never changes again.

use std::fmt;
use std::sync::atomic::{AtomicPtr, Ordering};

const DELETE_MARK: usize = 0b1;

/// A (reference, deleted-bit) pair held in one pointer-sized word.
pub struct MarkedPtr<T> {
    ptr: *mut T,
}

impl<T> Clone for MarkedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MarkedPtr<T> {}

impl<T> PartialEq for MarkedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for MarkedPtr<T> {}

impl<T> fmt::Debug for MarkedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkedPtr")
            .field("ptr", &self.as_ptr())
            .field("marked", &self.is_marked())
            .finish()
    }
}

impl<T> MarkedPtr<T> {
    /// The unmarked null reference.
    #[inline]
    pub fn null() -> Self {
        MarkedPtr {
            ptr: std::ptr::null_mut(),
        }
    }

    /// Pack `ptr` and `marked` into one word.
    #[inline]
    pub fn new(ptr: *mut T, marked: bool) -> Self {
        debug_assert_eq!(ptr as usize & DELETE_MARK, 0, "pointer is not aligned");
        let bits = if marked {
            ptr as usize | DELETE_MARK
        } else {
            ptr as usize
        };
        MarkedPtr {
            ptr: bits as *mut T,
        }
    }

    /// Reinterpret a raw word, mark bit included.
    #[inline]
    pub(crate) fn from_raw(ptr: *mut T) -> Self {
        MarkedPtr { ptr }
    }

    /// The reference component, mark stripped (the one you dereference).
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        (self.ptr as usize & !DELETE_MARK) as *mut T
    }

    /// The raw word with the mark bit intact (for CAS operations).
    #[inline]
    pub fn as_raw(&self) -> *mut T {
        self.ptr
    }

    #[inline]
    pub fn is_marked(&self) -> bool {
        (self.ptr as usize & DELETE_MARK) != 0
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.as_ptr().is_null()
    }

    /// Same reference, mark set to `marked`.
    #[inline]
    pub fn with_mark(&self, marked: bool) -> Self {
        MarkedPtr::new(self.as_ptr(), marked)
    }
}

/// Atomic cell holding a [`MarkedPtr`]; every conditional update compares
/// the reference and the mark together.
pub struct AtomicMarkedPtr<T> {
    inner: AtomicPtr<T>,
}

impl<T> AtomicMarkedPtr<T> {
    pub fn new(value: MarkedPtr<T>) -> Self {
        AtomicMarkedPtr {
            inner: AtomicPtr::new(value.as_raw()),
        }
    }

    pub fn null() -> Self {
        Self::new(MarkedPtr::null())
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> MarkedPtr<T> {
        MarkedPtr::from_raw(self.inner.load(order))
    }

    /// Plain store; only valid while the owning node is private to one thread.
    #[inline]
    pub fn store(&self, value: MarkedPtr<T>, order: Ordering) {
        self.inner.store(value.as_raw(), order)
    }

    /// CAS on the whole (reference, mark) word. `Err` carries the value seen.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: MarkedPtr<T>,
        new: MarkedPtr<T>,
    ) -> Result<MarkedPtr<T>, MarkedPtr<T>> {
        self.inner
            .compare_exchange(
                current.as_raw(),
                new.as_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(MarkedPtr::from_raw)
            .map_err(MarkedPtr::from_raw)
    }
}

impl<T> fmt::Debug for AtomicMarkedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.load(Ordering::Relaxed).fmt(f)
    }
}
