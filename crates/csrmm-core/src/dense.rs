//! Row-major dense matrix store with cache-line aligned rows

use std::alloc::{handle_alloc_error, Layout};
use std::fmt;
use std::ops::{Index, IndexMut};

use rayon::prelude::*;

use crate::aligned::{AlignedBuf, ALIGN_CACHE_LINE};
use crate::error::{Error, Result};

/// Number of elements reserved per row for a row of `ncols` elements of `T`.
///
/// Rows of at most one cache line are padded to the next power of two in
/// bytes; longer rows are padded to a multiple of [`ALIGN_CACHE_LINE`], so
/// every row of a long matrix starts on a cache-line boundary.
/// Returns `None` if the row byte width overflows.
#[must_use]
pub fn row_stride<T>(ncols: usize) -> Option<usize> {
    let elem = size_of::<T>().max(1);
    let bytes = ncols.checked_mul(elem)?;
    let stride_bytes = if bytes <= ALIGN_CACHE_LINE {
        bytes.next_power_of_two().max(elem)
    } else {
        bytes.checked_next_multiple_of(ALIGN_CACHE_LINE)?
    };
    Some(stride_bytes.div_ceil(elem))
}

/// Dense `nrows x ncols` matrix.
///
/// Row `i` occupies `stride` elements starting at `i * stride` of a single
/// aligned buffer. Elements past `ncols` in a row are padding: they are never
/// exposed by the accessors and their contents are unspecified.
pub struct Dense<T = f64> {
    nrows: usize,
    ncols: usize,
    stride: usize,
    buf: AlignedBuf<T>,
}

impl<T: Copy> Dense<T> {
    /// Allocate an `nrows x ncols` matrix with every element set to `fill`.
    ///
    /// # Errors
    ///
    /// [`Error::Allocation`] if the footprint overflows or cannot be allocated.
    pub fn new(nrows: usize, ncols: usize, fill: T) -> Result<Self> {
        let (stride, len) = Self::footprint(nrows, ncols)?;
        let buf = AlignedBuf::filled(len, fill)?;
        Ok(Self {
            nrows,
            ncols,
            stride,
            buf,
        })
    }

    fn footprint(nrows: usize, ncols: usize) -> Result<(usize, usize)> {
        let overflow = || Error::Allocation {
            bytes: usize::MAX,
            align: ALIGN_CACHE_LINE,
        };
        let stride = row_stride::<T>(ncols).ok_or_else(overflow)?;
        let len = nrows.checked_mul(stride).ok_or_else(overflow)?;
        Ok((stride, len))
    }

    /// Build a matrix from `nrows * ncols` values in row-major order.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `data` has the wrong length, or an
    /// allocation error.
    pub fn from_row_major(nrows: usize, ncols: usize, data: &[T]) -> Result<Self>
    where
        T: Default,
    {
        if Some(data.len()) != nrows.checked_mul(ncols) {
            return Err(Error::invalid_argument(
                "data",
                format!(
                    "expected {nrows} x {ncols} values, got {}",
                    data.len()
                ),
            ));
        }
        let mut out = Self::new(nrows, ncols, T::default())?;
        if ncols > 0 {
            for (dst, src) in out.rows_mut().zip(data.chunks_exact(ncols)) {
                dst.copy_from_slice(src);
            }
        }
        Ok(out)
    }

    /// Change the logical shape.
    ///
    /// The buffer is reallocated only when the new footprint exceeds the
    /// current capacity. Contents after a resize are unspecified: callers
    /// must overwrite them before reading.
    ///
    /// # Errors
    ///
    /// [`Error::Allocation`]; the matrix is left unchanged on failure.
    pub fn resize(&mut self, nrows: usize, ncols: usize) -> Result<()>
    where
        T: Default,
    {
        let (stride, len) = Self::footprint(nrows, ncols)?;
        if len > self.buf.len() {
            tracing::debug!(
                old_capacity = self.buf.len(),
                new_capacity = len,
                "reallocating dense buffer"
            );
            self.buf = AlignedBuf::filled(len, T::default())?;
        }
        self.nrows = nrows;
        self.ncols = ncols;
        self.stride = stride;
        Ok(())
    }

    /// Fallible deep copy.
    ///
    /// # Errors
    ///
    /// [`Error::Allocation`].
    pub fn try_clone(&self) -> Result<Self>
    where
        T: Default,
    {
        let mut out = Self::new(self.nrows, self.ncols, T::default())?;
        for (dst, src) in out.rows_mut().zip(self.rows()) {
            dst.copy_from_slice(src);
        }
        Ok(out)
    }

    /// Element at (`row`, `col`).
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] outside the logical shape.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        let r = self.row(row)?;
        r.get(col)
            .copied()
            .ok_or_else(|| Error::column(col, self.ncols))
    }

    /// Overwrite the element at (`row`, `col`).
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] outside the logical shape.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let ncols = self.ncols;
        let r = self.row_mut(row)?;
        let slot = r.get_mut(col).ok_or_else(|| Error::column(col, ncols))?;
        *slot = value;
        Ok(())
    }

    /// Set every logical element to `value`.
    pub fn fill(&mut self, value: T) {
        for r in self.rows_mut() {
            r.fill(value);
        }
    }

    /// Copy the logical contents out in row-major order without padding.
    #[must_use]
    pub fn to_row_major(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.nrows * self.ncols);
        for r in self.rows() {
            out.extend_from_slice(r);
        }
        out
    }
}

impl Dense<f64> {
    /// Zero-filled `nrows x ncols` matrix.
    ///
    /// # Errors
    ///
    /// [`Error::Allocation`].
    #[inline]
    pub fn zeros(nrows: usize, ncols: usize) -> Result<Self> {
        Self::new(nrows, ncols, 0.0)
    }

    /// `n x n` identity matrix.
    ///
    /// # Errors
    ///
    /// [`Error::Allocation`].
    pub fn identity(n: usize) -> Result<Self> {
        let mut out = Self::zeros(n, n)?;
        for (i, r) in out.rows_mut().enumerate() {
            r[i] = 1.0;
        }
        Ok(out)
    }
}

impl<T> Dense<T> {
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    #[inline]
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    /// Elements reserved per row, `>= ncols`.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Elements held by the buffer; resizes within this footprint do not reallocate.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    fn span(&self) -> usize {
        self.nrows * self.stride
    }

    /// Borrow row `row` (logical columns only).
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `row >= nrows`.
    #[inline]
    pub fn row(&self, row: usize) -> Result<&[T]> {
        if row >= self.nrows {
            return Err(Error::row(row, self.nrows));
        }
        let start = row * self.stride;
        Ok(&self.buf[start..start + self.ncols])
    }

    /// Mutably borrow row `row` (logical columns only).
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `row >= nrows`.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> Result<&mut [T]> {
        if row >= self.nrows {
            return Err(Error::row(row, self.nrows));
        }
        let start = row * self.stride;
        let ncols = self.ncols;
        Ok(&mut self.buf[start..start + ncols])
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        let ncols = self.ncols;
        self.buf[..self.span()]
            .chunks_exact(self.stride)
            .map(move |r| &r[..ncols])
    }

    /// Iterate mutably over rows in order.
    pub fn rows_mut(&mut self) -> impl ExactSizeIterator<Item = &mut [T]> + '_ {
        let ncols = self.ncols;
        let span = self.span();
        self.buf[..span]
            .chunks_exact_mut(self.stride)
            .map(move |r| &mut r[..ncols])
    }

    /// Parallel iterator over disjoint mutable rows.
    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = &mut [T]> + '_
    where
        T: Send,
    {
        let ncols = self.ncols;
        let span = self.span();
        self.buf[..span]
            .par_chunks_exact_mut(self.stride)
            .map(move |r| &mut r[..ncols])
    }
}

impl<T> Index<usize> for Dense<T> {
    type Output = [T];

    /// Row `row`; panics when out of range, like slice indexing.
    #[inline]
    fn index(&self, row: usize) -> &[T] {
        assert!(row < self.nrows, "row {row} out of range for {} rows", self.nrows);
        let start = row * self.stride;
        &self.buf[start..start + self.ncols]
    }
}

impl<T> IndexMut<usize> for Dense<T> {
    #[inline]
    fn index_mut(&mut self, row: usize) -> &mut [T] {
        assert!(row < self.nrows, "row {row} out of range for {} rows", self.nrows);
        let start = row * self.stride;
        let ncols = self.ncols;
        &mut self.buf[start..start + ncols]
    }
}

impl<T: Copy + Default> Default for Dense<T> {
    fn default() -> Self {
        Self {
            nrows: 0,
            ncols: 0,
            stride: row_stride::<T>(0).unwrap_or(1),
            buf: AlignedBuf::empty(),
        }
    }
}

impl<T: Copy + Default> Clone for Dense<T> {
    /// Aborts through [`handle_alloc_error`] if the copy cannot be allocated,
    /// like `Vec::clone`. Use [`Dense::try_clone`] to recover instead.
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|_| {
            let layout = AlignedBuf::<T>::layout(self.span()).unwrap_or_else(Layout::new::<T>);
            handle_alloc_error(layout)
        })
    }
}

impl<T: PartialEq> PartialEq for Dense<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.rows().zip(other.rows()).all(|(a, b)| a == b)
    }
}

impl<T: fmt::Debug> fmt::Debug for Dense<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dense")
            .field("nrows", &self.nrows)
            .field("ncols", &self.ncols)
            .field("stride", &self.stride)
            .field("rows", &self.rows().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Dense<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in self.rows() {
            for v in r {
                write!(f, "{v:>7} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
