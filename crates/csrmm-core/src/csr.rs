//! CSR format definitions and constructors

use std::fmt;
use std::ops::Range;

use crate::coo::Coo;
use crate::dense::Dense;
use crate::error::{Error, Result};

/// Compressed sparse row matrix built by row-ordered appends.
///
/// `indptr` only covers the rows opened so far: it holds `populated + 1`
/// offsets, where `populated` is one past the highest row that has received
/// an entry. Rows after that are empty. [`Csr::row_pointers`] reports the
/// full `nrows + 1` pointer array.
#[derive(Debug, Clone)]
pub struct Csr<T = f64> {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<T>,
}

impl<T> Csr<T> {
    /// Empty `nrows x ncols` matrix, ready for [`Csr::append`].
    #[inline]
    #[must_use]
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            indptr: vec![0],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

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

    #[inline]
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Values in storage order.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Column indices, parallel to [`Csr::data`].
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Row of the most recently appended entry, if any.
    #[inline]
    #[must_use]
    pub fn last_row(&self) -> Option<usize> {
        self.indptr.len().checked_sub(2)
    }

    /// Row pointers for all `nrows + 1` row boundaries.
    #[must_use]
    pub fn row_pointers(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nrows + 1);
        out.extend_from_slice(&self.indptr);
        out.resize(self.nrows + 1, self.nnz());
        out
    }

    /// Append one coordinate entry.
    ///
    /// Rows must arrive in non-decreasing order; repeats are allowed.
    /// A rejected entry leaves the matrix unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::Sequence`] if `row` precedes the last appended row.
    /// - [`Error::OutOfRange`] if `row >= nrows` or `col >= ncols`.
    pub fn append(&mut self, value: T, row: usize, col: usize) -> Result<()> {
        if let Some(last_row) = self.last_row() {
            if row < last_row {
                return Err(Error::Sequence { row, last_row });
            }
        }
        if row >= self.nrows {
            return Err(Error::row(row, self.nrows));
        }
        if col >= self.ncols {
            return Err(Error::column(col, self.ncols));
        }
        let nnz = self.data.len();
        // open every skipped row as empty, then the target row
        self.indptr.resize(row + 2, nnz);
        self.data.push(value);
        self.indices.push(col);
        if let Some(end) = self.indptr.last_mut() {
            *end += 1;
        }
        Ok(())
    }

    /// Drop every entry and take a new shape.
    pub fn clear_and_reshape(&mut self, nrows: usize, ncols: usize) {
        self.nrows = nrows;
        self.ncols = ncols;
        self.indptr.clear();
        self.indptr.push(0);
        self.indices.clear();
        self.data.clear();
    }

    #[inline]
    fn span(&self, row: usize) -> Range<usize> {
        match (self.indptr.get(row), self.indptr.get(row + 1)) {
            (Some(&s), Some(&e)) => s..e,
            _ => self.nnz()..self.nnz(),
        }
    }

    /// Offsets of `row`'s entries in [`Csr::data`] / [`Csr::indices`].
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `row >= nrows`.
    #[inline]
    pub fn row_range(&self, row: usize) -> Result<Range<usize>> {
        if row >= self.nrows {
            return Err(Error::row(row, self.nrows));
        }
        Ok(self.span(row))
    }

    /// Read-only view of `row`'s entries; empty for rows not yet populated.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `row >= nrows`.
    #[inline]
    pub fn row_view(&self, row: usize) -> Result<RowView<'_, T>> {
        let span = self.row_range(row)?;
        Ok(self.view(span))
    }

    /// Infallible variant of [`Csr::row_view`] for hot loops.
    ///
    /// # Panics
    ///
    /// If `row >= nrows`.
    #[inline]
    #[must_use]
    pub fn row(&self, row: usize) -> RowView<'_, T> {
        assert!(row < self.nrows, "row {row} out of range for {} rows", self.nrows);
        self.view(self.span(row))
    }

    #[inline]
    fn view(&self, span: Range<usize>) -> RowView<'_, T> {
        RowView {
            values: &self.data[span.clone()],
            columns: &self.indices[span],
            ncols: self.ncols,
        }
    }

    /// Every entry as `(value, row, col)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, usize, usize)> + '_ {
        self.indptr.windows(2).enumerate().flat_map(move |(i, w)| {
            self.data[w[0]..w[1]]
                .iter()
                .zip(&self.indices[w[0]..w[1]])
                .map(move |(v, &j)| (v, i, j))
        })
    }
}

impl<T: Copy + Default> Csr<T> {
    /// Value at (`row`, `col`): the first stored entry of `row` with that
    /// column, or zero when there is none. Linear in the row's entry count.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] outside the shape.
    #[inline]
    pub fn lookup(&self, row: usize, col: usize) -> Result<T> {
        self.row_view(row)?.get(col)
    }

    /// Scatter into a dense matrix; for repeated columns the first entry wins,
    /// matching [`Csr::lookup`].
    ///
    /// # Errors
    ///
    /// [`Error::Allocation`].
    pub fn to_dense(&self) -> Result<Dense<T>> {
        let mut out = Dense::new(self.nrows, self.ncols, T::default())?;
        for (i, w) in self.indptr.windows(2).enumerate() {
            let dst = &mut out[i];
            for p in (w[0]..w[1]).rev() {
                dst[self.indices[p]] = self.data[p];
            }
        }
        Ok(out)
    }

    /// Build from coordinate triples; entries are stably sorted by row first,
    /// so entries sharing a row keep their relative order.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] for any entry outside the shape.
    pub fn from_coo(coo: &Coo<T>) -> Result<Self> {
        let (nrows, ncols) = coo.shape();
        let mut order: Vec<usize> = (0..coo.nnz()).collect();
        order.sort_by_key(|&k| coo.row[k]);
        let mut out = Self::new(nrows, ncols);
        out.data.reserve(order.len());
        out.indices.reserve(order.len());
        for k in order {
            out.append(coo.data[k], coo.row[k], coo.col[k])?;
        }
        Ok(out)
    }
}

impl<T> Csr<T> {
    /// Assemble from raw CSR arrays.
    ///
    /// Column indices within a row need not be sorted or unique.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] describing the first violated invariant.
    pub fn from_parts(
        nrows: usize,
        ncols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<T>,
    ) -> Result<Self> {
        let invalid = |reason: &str| Err(Error::invalid_argument("indptr", reason));
        if indptr.len() != nrows + 1 {
            return invalid("indptr length must be nrows + 1");
        }
        if indices.len() != data.len() {
            return Err(Error::invalid_argument(
                "indices",
                "indices and data must have equal length",
            ));
        }
        let nnz = indices.len();
        if indptr.first().copied().unwrap_or(0) != 0 {
            return invalid("indptr first element must be 0");
        }
        if indptr.last().copied().unwrap_or(0) != nnz {
            return invalid("indptr last element must equal nnz");
        }
        if indptr.windows(2).any(|w| w[0] > w[1]) {
            return invalid("indptr must be non-decreasing");
        }
        if let Some(&j) = indices.iter().find(|&&j| j >= ncols) {
            return Err(Error::column(j, ncols));
        }
        let mut indptr = indptr;
        // keep only the rows up to the last non-empty one open
        while indptr.len() >= 2 && indptr[indptr.len() - 2] == nnz {
            indptr.pop();
        }
        Ok(Self {
            nrows,
            ncols,
            indptr,
            indices,
            data,
        })
    }
}

impl<T: PartialEq> PartialEq for Csr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape()
            && self.row_pointers() == other.row_pointers()
            && self.indices == other.indices
            && self.data == other.data
    }
}

impl<T: Copy + Default + fmt::Display> fmt::Display for Csr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.nrows {
            let r = self.row(i);
            for j in 0..self.ncols {
                write!(f, "{:>7} ", r.get(j).unwrap_or_default())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Borrowed `(value, column)` pairs of one CSR row, in append order.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a, T> {
    values: &'a [T],
    columns: &'a [usize],
    ncols: usize,
}

impl<'a, T> RowView<'a, T> {
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn values(&self) -> &'a [T] {
        self.values
    }

    #[inline]
    #[must_use]
    pub const fn columns(&self) -> &'a [usize] {
        self.columns
    }

    /// `(value, column)` pairs in append order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&'a T, usize)> + 'a {
        self.values.iter().zip(self.columns.iter().copied())
    }
}

impl<T: Copy + Default> RowView<'_, T> {
    /// First value stored for `col`, zero when absent.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `col >= ncols`.
    #[inline]
    pub fn get(&self, col: usize) -> Result<T> {
        if col >= self.ncols {
            return Err(Error::column(col, self.ncols));
        }
        Ok(self
            .columns
            .iter()
            .position(|&j| j == col)
            .map_or_else(T::default, |p| self.values[p]))
    }
}
