#![allow(
    clippy::many_single_char_names,
    reason = "Math kernels conventionally use i/j/p for indices"
)]
use csrmm_core::{Csr, Dense, Error, Result};
use rayon::prelude::*;
use wide::f64x4;

use crate::config::DEFAULT_ROWS_PER_CHUNK;

/// `|beta| <` this is treated as zero, `|alpha - 1| <` this as one.
pub const SCALE_TOLERANCE: f64 = 1e-6;

/// A must have as many columns as B has rows.
pub(crate) fn check_operands(a: &Csr<f64>, b: &Dense<f64>) -> Result<()> {
    if a.ncols() != b.nrows() {
        return Err(Error::DimensionMismatch {
            op: "spmm",
            lhs: a.shape(),
            rhs: b.shape(),
        });
    }
    Ok(())
}

fn check_shapes(a: &Csr<f64>, b: &Dense<f64>, c: &Dense<f64>) -> Result<()> {
    check_operands(a, b)?;
    let expected = (a.nrows(), b.ncols());
    if c.shape() != expected {
        return Err(Error::DimensionMismatch {
            op: "spmm output",
            lhs: expected,
            rhs: c.shape(),
        });
    }
    Ok(())
}

/// C = alpha * A @ B + beta * C on the current rayon pool.
///
/// A is `m x n` CSR, B is `n x p` dense and C must already be `m x p`.
/// Shapes are checked before anything is written.
///
/// # Errors
///
/// [`Error::DimensionMismatch`] if `A.ncols != B.nrows` or C is not `m x p`.
pub fn spmm_f64(
    a: &Csr<f64>,
    b: &Dense<f64>,
    c: &mut Dense<f64>,
    alpha: f64,
    beta: f64,
) -> Result<()> {
    spmm_f64_chunked(a, b, c, alpha, beta, DEFAULT_ROWS_PER_CHUNK)
}

/// [`spmm_f64`] with an explicit upper bound on rows per scheduled task.
///
/// # Errors
///
/// See [`spmm_f64`].
pub fn spmm_f64_chunked(
    a: &Csr<f64>,
    b: &Dense<f64>,
    c: &mut Dense<f64>,
    alpha: f64,
    beta: f64,
    rows_per_chunk: usize,
) -> Result<()> {
    check_shapes(a, b, c)?;
    let zero_beta = beta.abs() < SCALE_TOLERANCE;
    let unit_alpha = (alpha - 1.0).abs() < SCALE_TOLERANCE;
    tracing::debug!(
        m = a.nrows(),
        n = a.ncols(),
        p = b.ncols(),
        nnz = a.nnz(),
        threads = rayon::current_num_threads(),
        rows_per_chunk,
        zero_beta,
        unit_alpha,
        "spmm dispatch"
    );

    // Each task owns whole rows of C, so no two workers ever touch the same
    // element and the per-row summation order is the append order of A.
    c.par_rows_mut()
        .enumerate()
        .with_max_len(rows_per_chunk.max(1))
        .for_each(|(i, ci)| {
            if zero_beta {
                ci.fill(0.0);
            } else {
                for v in ci.iter_mut() {
                    *v *= beta;
                }
            }
            let row = a.row(i);
            for (&aij, j) in row.iter() {
                let s = if unit_alpha { aij } else { alpha * aij };
                axpy(ci, s, &b[j]);
            }
        });
    Ok(())
}

/// y += s * x over `y.len()` elements, four lanes at a time.
#[inline]
fn axpy(y: &mut [f64], s: f64, x: &[f64]) {
    debug_assert_eq!(y.len(), x.len());
    let sv = f64x4::splat(s);
    let mut yc = y.chunks_exact_mut(4);
    let mut xc = x.chunks_exact(4);
    for (yq, xq) in (&mut yc).zip(&mut xc) {
        let vy = f64x4::new([yq[0], yq[1], yq[2], yq[3]]);
        let vx = f64x4::new([xq[0], xq[1], xq[2], xq[3]]);
        let r = vy + vx * sv;
        yq.copy_from_slice(&r.to_array());
    }
    for (yv, &xv) in yc.into_remainder().iter_mut().zip(xc.remainder()) {
        *yv += xv * s;
    }
}

/// A @ B into a freshly allocated `m x p` matrix.
///
/// # Errors
///
/// [`Error::DimensionMismatch`] or [`Error::Allocation`].
pub fn spmm_product_f64(a: &Csr<f64>, b: &Dense<f64>) -> Result<Dense<f64>> {
    check_operands(a, b)?;
    let mut c = Dense::zeros(a.nrows(), b.ncols())?;
    spmm_f64(a, b, &mut c, 1.0, 0.0)?;
    Ok(c)
}

/// Resize C to `m x p`, then run [`spmm_f64`].
///
/// Contents of a resized C are unspecified, so `beta` should be zero unless
/// C already had the right shape.
///
/// # Errors
///
/// [`Error::DimensionMismatch`] (C untouched) or [`Error::Allocation`].
pub fn spmm_resized_f64(
    a: &Csr<f64>,
    b: &Dense<f64>,
    c: &mut Dense<f64>,
    alpha: f64,
    beta: f64,
) -> Result<()> {
    check_operands(a, b)?;
    c.resize(a.nrows(), b.ncols())?;
    spmm_f64(a, b, c, alpha, beta)
}
