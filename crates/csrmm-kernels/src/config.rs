//! Kernel configuration and the worker pool it drives

use std::env;

use csrmm_core::{Error, Result};

/// Environment variable overriding [`KernelConfig::num_threads`].
pub const THREADS_ENV: &str = "CSRMM_NUM_THREADS";
/// Environment variable overriding [`KernelConfig::rows_per_chunk`].
pub const ROWS_PER_CHUNK_ENV: &str = "CSRMM_ROWS_PER_CHUNK";

/// Default upper bound on rows handed to a worker at once.
pub const DEFAULT_ROWS_PER_CHUNK: usize = 2;

/// Settings for [`Spmm`]. The thread count is always explicit; it is never
/// derived from the host's CPU count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Number of worker threads in the pool.
    pub num_threads: usize,
    /// Maximum rows per scheduled task. Small values let work stealing even
    /// out rows with very different nonzero counts.
    pub rows_per_chunk: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            rows_per_chunk: DEFAULT_ROWS_PER_CHUNK,
        }
    }
}

impl KernelConfig {
    #[must_use]
    pub const fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    #[must_use]
    pub const fn with_rows_per_chunk(mut self, rows_per_chunk: usize) -> Self {
        self.rows_per_chunk = rows_per_chunk;
        self
    }

    /// Defaults overridden by [`THREADS_ENV`] and [`ROWS_PER_CHUNK_ENV`] when set.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when a variable is set but is not a
    /// positive integer.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(
            read_env(THREADS_ENV, "num_threads")?.as_deref(),
            read_env(ROWS_PER_CHUNK_ENV, "rows_per_chunk")?.as_deref(),
        )
    }

    /// [`KernelConfig::from_env`] on already-read variable values.
    fn from_vars(threads: Option<&str>, rows_per_chunk: Option<&str>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(n) = parse_count(THREADS_ENV, "num_threads", threads)? {
            config.num_threads = n;
        }
        if let Some(n) = parse_count(ROWS_PER_CHUNK_ENV, "rows_per_chunk", rows_per_chunk)? {
            config.rows_per_chunk = n;
        }
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if either field is zero.
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::invalid_argument("num_threads", "must be at least 1"));
        }
        if self.rows_per_chunk == 0 {
            return Err(Error::invalid_argument("rows_per_chunk", "must be at least 1"));
        }
        Ok(())
    }
}

fn read_env(var: &str, arg: &'static str) -> Result<Option<String>> {
    match env::var(var) {
        Ok(raw) => Ok(Some(raw)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::invalid_argument(arg, format!("{var}: {e}"))),
    }
}

fn parse_count(var: &str, arg: &'static str, raw: Option<&str>) -> Result<Option<usize>> {
    raw.map(|raw| {
        raw.trim().parse::<usize>().map_err(|e| {
            Error::invalid_argument(arg, format!("{var}={raw:?} is not a valid count: {e}"))
        })
    })
    .transpose()
}

/// A dedicated rayon pool of exactly `num_threads` workers.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    num_threads: usize,
}

impl WorkerPool {
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for zero threads, [`Error::ThreadPool`] if
    /// the threads cannot be spawned.
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(Error::invalid_argument("num_threads", "must be at least 1"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("csrmm-worker-{i}"))
            .build()
            .map_err(|err| Error::ThreadPool(err.to_string()))?;
        tracing::info!(num_threads, "built kernel worker pool");
        Ok(Self { pool, num_threads })
    }

    #[inline]
    #[must_use]
    pub const fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Run `op` with this pool as the current rayon pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}
