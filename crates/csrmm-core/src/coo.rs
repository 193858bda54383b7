//! COO staging format; converted to CSR with [`crate::Csr::from_coo`]

use crate::error::{Error, Result};

/// Unordered coordinate triples with a fixed shape.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Coo<T = f64> {
    pub data: Vec<T>,
    pub row: Vec<usize>, // length nnz
    pub col: Vec<usize>, // length nnz
    pub nrows: usize,
    pub ncols: usize,
}

impl<T> Coo<T> {
    /// Empty `nrows x ncols` triple list.
    #[inline]
    #[must_use]
    pub const fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            data: Vec::new(),
            row: Vec::new(),
            col: Vec::new(),
            nrows,
            ncols,
        }
    }

    #[inline]
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Add a triple in any order.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] outside the shape.
    pub fn push(&mut self, value: T, row: usize, col: usize) -> Result<()> {
        if row >= self.nrows {
            return Err(Error::row(row, self.nrows));
        }
        if col >= self.ncols {
            return Err(Error::column(col, self.ncols));
        }
        self.data.push(value);
        self.row.push(row);
        self.col.push(col);
        Ok(())
    }

    /// Assemble from parallel arrays.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] on length mismatch, [`Error::OutOfRange`]
    /// for an index outside the shape.
    pub fn from_parts(
        nrows: usize,
        ncols: usize,
        row: Vec<usize>,
        col: Vec<usize>,
        data: Vec<T>,
    ) -> Result<Self> {
        if row.len() != data.len() || col.len() != data.len() {
            return Err(Error::invalid_argument(
                "data",
                "row/col/data must have equal length",
            ));
        }
        if let Some(&i) = row.iter().find(|&&i| i >= nrows) {
            return Err(Error::row(i, nrows));
        }
        if let Some(&j) = col.iter().find(|&&j| j >= ncols) {
            return Err(Error::column(j, ncols));
        }
        Ok(Self {
            data,
            row,
            col,
            nrows,
            ncols,
        })
    }
}
