//! Error types for csrmm

use thiserror::Error;

/// Result type alias using csrmm's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the matrix stores, the codec and the kernels.
///
/// Every error is reported synchronously by the call that detects it; nothing
/// is retried internally.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A row or column index exceeds the logical shape of a matrix
    #[error("{axis} index {index} out of range for {axis} count {bound}")]
    OutOfRange {
        /// Which axis the index refers to ("row" or "column")
        axis: &'static str,
        /// The offending index
        index: usize,
        /// Number of valid positions along that axis
        bound: usize,
    },

    /// A sparse entry was appended to a row before the last appended row
    #[error("entry for row {row} appended after row {last_row}; rows must be non-decreasing")]
    Sequence {
        /// Row of the rejected entry
        row: usize,
        /// Row of the most recently appended entry
        last_row: usize,
    },

    /// Operand shapes are incompatible
    #[error("dimension mismatch in {op}: {lhs:?} vs {rhs:?}")]
    DimensionMismatch {
        /// Operation that rejected the operands
        op: &'static str,
        /// Shape of the left-hand (or expected) operand
        lhs: (usize, usize),
        /// Shape of the right-hand (or actual) operand
        rhs: (usize, usize),
    },

    /// A byte stream is truncated or malformed
    #[error("malformed matrix stream: {reason}")]
    Format {
        /// What was wrong with the stream
        reason: String,
    },

    /// The aligned buffer for a dense store could not be allocated
    #[error("failed to allocate {bytes} bytes aligned to {align}")]
    Allocation {
        /// Requested size in bytes (saturated on overflow)
        bytes: usize,
        /// Requested alignment in bytes
        align: usize,
    },

    /// Invalid argument provided to a constructor or configuration
    #[error("invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The worker pool could not be created
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),

    /// Underlying I/O failure other than a truncated stream
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[inline]
    pub(crate) const fn row(index: usize, bound: usize) -> Self {
        Self::OutOfRange {
            axis: "row",
            index,
            bound,
        }
    }

    #[inline]
    pub(crate) const fn column(index: usize, bound: usize) -> Self {
        Self::OutOfRange {
            axis: "column",
            index,
            bound,
        }
    }

    /// Create a [`Error::Format`] from anything printable.
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }

    /// Create a [`Error::InvalidArgument`].
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }
}
