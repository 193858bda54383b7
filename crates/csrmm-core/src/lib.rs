//! Core matrix stores for csrmm: a cache-line aligned dense matrix and a
//! compressed sparse row matrix built by row-ordered appends.

pub mod aligned;
pub mod coo;
pub mod csr;
pub mod dense;
pub mod error;

pub use aligned::ALIGN_CACHE_LINE;
pub use coo::Coo;
pub use csr::{Csr, RowView};
pub use dense::{row_stride, Dense};
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
