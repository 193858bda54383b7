//! SpMM bound to a dedicated, explicitly sized worker pool

use csrmm_core::{Csr, Dense, Result};

use crate::config::{KernelConfig, WorkerPool};
use crate::spmm::{check_operands, spmm_f64_chunked};

/// Runs the SpMM kernel on its own pool of `config.num_threads` workers.
#[derive(Debug)]
pub struct Spmm {
    config: KernelConfig,
    pool: WorkerPool,
}

impl Spmm {
    /// # Errors
    ///
    /// [`csrmm_core::Error::InvalidArgument`] for an invalid config,
    /// [`csrmm_core::Error::ThreadPool`] if the pool cannot be built.
    pub fn new(config: KernelConfig) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.num_threads)?;
        Ok(Self { config, pool })
    }

    /// [`Spmm::new`] with [`KernelConfig::from_env`].
    ///
    /// # Errors
    ///
    /// See [`KernelConfig::from_env`] and [`Spmm::new`].
    pub fn from_env() -> Result<Self> {
        Self::new(KernelConfig::from_env()?)
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// C = alpha * A @ B + beta * C.
    ///
    /// # Errors
    ///
    /// [`csrmm_core::Error::DimensionMismatch`]; C is untouched in that case.
    pub fn multiply(
        &self,
        a: &Csr<f64>,
        b: &Dense<f64>,
        c: &mut Dense<f64>,
        alpha: f64,
        beta: f64,
    ) -> Result<()> {
        let chunk = self.config.rows_per_chunk;
        self.pool
            .install(|| spmm_f64_chunked(a, b, c, alpha, beta, chunk))
    }

    /// A @ B into a new matrix.
    ///
    /// # Errors
    ///
    /// [`csrmm_core::Error::DimensionMismatch`] or allocation failure.
    pub fn product(&self, a: &Csr<f64>, b: &Dense<f64>) -> Result<Dense<f64>> {
        check_operands(a, b)?;
        let mut c = Dense::zeros(a.nrows(), b.ncols())?;
        self.multiply(a, b, &mut c, 1.0, 0.0)?;
        Ok(c)
    }

    /// Resize C to fit, then multiply.
    ///
    /// # Errors
    ///
    /// [`csrmm_core::Error::DimensionMismatch`] or allocation failure.
    pub fn multiply_resized(
        &self,
        a: &Csr<f64>,
        b: &Dense<f64>,
        c: &mut Dense<f64>,
        alpha: f64,
        beta: f64,
    ) -> Result<()> {
        check_operands(a, b)?;
        c.resize(a.nrows(), b.ncols())?;
        self.multiply(a, b, c, alpha, beta)
    }
}
