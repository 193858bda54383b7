//! Sparse x dense multiplication kernels for csrmm (pure Rust, SIMD/parallel)

pub mod config;
pub mod executor;
pub mod spmm;

pub use config::{KernelConfig, WorkerPool, DEFAULT_ROWS_PER_CHUNK};
pub use executor::Spmm;
pub use spmm::{
    spmm_f64, spmm_f64_chunked, spmm_product_f64, spmm_resized_f64, SCALE_TOLERANCE,
};

/// C = alpha * A @ B + beta * C on the current rayon pool; see [`spmm_f64`].
pub use spmm::spmm_f64 as multiply;
