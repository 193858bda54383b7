//! Cache-line aligned, exclusively owned element buffer backing [`crate::Dense`].

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Alignment of every dense buffer, in bytes.
pub const ALIGN_CACHE_LINE: usize = 128;

/// A heap slice whose first element sits on an [`ALIGN_CACHE_LINE`] boundary.
///
/// All `len` elements are initialized at all times.
pub(crate) struct AlignedBuf<T> {
    ptr: NonNull<T>,
    len: usize,
}

// SAFETY: `AlignedBuf` owns its elements exactly like `Box<[T]>` does.
unsafe impl<T: Send> Send for AlignedBuf<T> {}
// SAFETY: shared access only hands out `&[T]`.
unsafe impl<T: Sync> Sync for AlignedBuf<T> {}

impl<T> AlignedBuf<T> {
    /// An empty buffer that owns no allocation.
    #[inline]
    pub(crate) const fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }
}

impl<T: Copy> AlignedBuf<T> {
    #[inline]
    pub(crate) fn layout(len: usize) -> Option<Layout> {
        let bytes = len.checked_mul(size_of::<T>())?;
        Layout::from_size_align(bytes, ALIGN_CACHE_LINE.max(align_of::<T>())).ok()
    }

    /// Allocate `len` elements, each set to `fill`.
    pub(crate) fn filled(len: usize, fill: T) -> Result<Self> {
        let Some(layout) = Self::layout(len) else {
            return Err(Error::Allocation {
                bytes: len.saturating_mul(size_of::<T>()),
                align: ALIGN_CACHE_LINE,
            });
        };
        if layout.size() == 0 {
            return Ok(Self::empty());
        }
        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc::alloc(layout) }.cast::<T>();
        let Some(ptr) = NonNull::new(raw) else {
            return Err(Error::Allocation {
                bytes: layout.size(),
                align: layout.align(),
            });
        };
        for i in 0..len {
            // SAFETY: `i < len` and the allocation holds `len` elements of `T`.
            unsafe { ptr.as_ptr().add(i).write(fill) };
        }
        Ok(Self { ptr, len })
    }
}

impl<T> Deref for AlignedBuf<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        // SAFETY: `ptr` is valid for `len` initialized elements (or dangling with len 0).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> DerefMut for AlignedBuf<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> Drop for AlignedBuf<T> {
    fn drop(&mut self) {
        let bytes = self.len * size_of::<T>();
        if bytes == 0 {
            return;
        }
        // The same size/alignment pair was accepted by `Layout::from_size_align`
        // when the buffer was allocated.
        let align = ALIGN_CACHE_LINE.max(align_of::<T>());
        // SAFETY: see above; `T: Copy` elements need no per-element drop.
        unsafe {
            let layout = Layout::from_size_align_unchecked(bytes, align);
            alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), layout);
        }
    }
}

impl<T> fmt::Debug for AlignedBuf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
