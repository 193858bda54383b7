use approx::assert_relative_eq;
use csrmm_core::{Csr, Dense, Error};
use csrmm_kernels::*;
use proptest::prelude::*;
use rstest::rstest;

fn simple_csr() -> Csr<f64> {
    // A = [[1,0,0],[3,2,0],[4,0,0]], entries appended as (1,0,0) (2,1,1) (3,1,0) (4,2,0)
    let mut a = Csr::new(3, 3);
    a.append(1.0, 0, 0).unwrap();
    a.append(2.0, 1, 1).unwrap();
    a.append(3.0, 1, 0).unwrap();
    a.append(4.0, 2, 0).unwrap();
    a
}

fn rhs() -> Dense<f64> {
    // B (3x5): row-major 1..=15
    let data: Vec<f64> = (1..=15).map(f64::from).collect();
    Dense::from_row_major(3, 5, &data).unwrap()
}

/// Straightforward triple loop used as the reference result.
fn reference(a: &Csr<f64>, b: &Dense<f64>, c: &Dense<f64>, alpha: f64, beta: f64) -> Vec<f64> {
    let (m, p) = (a.nrows(), b.ncols());
    let mut out = vec![0.0; m * p];
    for i in 0..m {
        for j in 0..p {
            let mut acc = 0.0;
            for (v, k) in a.row_view(i).unwrap().iter() {
                acc += v * b.get(k, j).unwrap();
            }
            let prev = if beta.abs() < SCALE_TOLERANCE { 0.0 } else { beta * c.get(i, j).unwrap() };
            out[i * p + j] = alpha * acc + prev;
        }
    }
    out
}

#[test]
fn identity_rhs_reproduces_sparse_matrix() {
    let a = simple_csr();
    let b = Dense::identity(3).unwrap();
    let mut c = Dense::zeros(3, 3).unwrap();
    spmm_f64(&a, &b, &mut c, 1.0, 0.0).unwrap();
    assert_eq!(c, a.to_dense().unwrap());
    assert_eq!(
        c.to_row_major(),
        vec![1.0, 0.0, 0.0, 3.0, 2.0, 0.0, 4.0, 0.0, 0.0]
    );
}

#[test]
fn product_matches_reference() {
    let a = simple_csr();
    let b = rhs();
    let c = spmm_product_f64(&a, &b).unwrap();
    let zeros = Dense::zeros(3, 5).unwrap();
    assert_eq!(c.to_row_major(), reference(&a, &b, &zeros, 1.0, 0.0));
    // row 1 = 3 * B[0] + 2 * B[1]
    assert_eq!(c.row(1).unwrap(), &[15.0, 20.0, 25.0, 30.0, 35.0]);
}

#[test]
fn accumulate_twice_doubles_result() {
    let a = simple_csr();
    let b = rhs();
    let mut c = Dense::zeros(3, 5).unwrap();
    spmm_f64(&a, &b, &mut c, 1.0, 0.0).unwrap();
    let first = c.to_row_major();
    spmm_f64(&a, &b, &mut c, 1.0, 1.0).unwrap();
    let doubled: Vec<f64> = first.iter().map(|v| v * 2.0).collect();
    assert_eq!(c.to_row_major(), doubled);
}

#[test]
fn zero_beta_ignores_previous_contents() {
    let a = simple_csr();
    let b = rhs();
    let mut clean = Dense::zeros(3, 5).unwrap();
    let mut dirty = Dense::new(3, 5, 1.0e300).unwrap();
    dirty.set(2, 4, f64::NAN).unwrap();
    spmm_f64(&a, &b, &mut clean, 2.5, 0.0).unwrap();
    spmm_f64(&a, &b, &mut dirty, 2.5, 0.0).unwrap();
    assert_eq!(clean, dirty);
    // beta inside the tolerance counts as zero
    let mut near = Dense::new(3, 5, f64::NAN).unwrap();
    spmm_f64(&a, &b, &mut near, 2.5, 1e-7).unwrap();
    assert_eq!(clean, near);
}

#[test]
fn alpha_and_beta_scale() {
    let a = simple_csr();
    let b = rhs();
    let init: Vec<f64> = (0..15).map(|v| f64::from(v) * 0.5 - 3.0).collect();
    let mut c = Dense::from_row_major(3, 5, &init).unwrap();
    let expected = reference(&a, &b, &c, -0.75, 3.0);
    spmm_f64(&a, &b, &mut c, -0.75, 3.0).unwrap();
    for (got, want) in c.to_row_major().iter().zip(&expected) {
        assert_relative_eq!(*got, *want, max_relative = 1e-12);
    }
}

#[test]
fn alpha_near_one_is_unscaled() {
    let a = simple_csr();
    let b = rhs();
    let mut exact = Dense::zeros(3, 5).unwrap();
    let mut near = Dense::zeros(3, 5).unwrap();
    spmm_f64(&a, &b, &mut exact, 1.0, 0.0).unwrap();
    spmm_f64(&a, &b, &mut near, 1.0 + 1e-7, 0.0).unwrap();
    assert_eq!(exact, near);
}

#[test]
fn inner_dimension_mismatch_is_rejected() {
    let a = simple_csr();
    let b = Dense::zeros(4, 2).unwrap();
    let mut c = Dense::new(3, 2, 9.0).unwrap();
    let err = spmm_f64(&a, &b, &mut c, 1.0, 0.0).unwrap_err();
    assert!(matches!(
        err,
        Error::DimensionMismatch { op: "spmm", lhs: (3, 3), rhs: (4, 2) }
    ));
    assert!(c.to_row_major().iter().all(|&v| v == 9.0));
    assert!(spmm_product_f64(&a, &b).is_err());
}

#[test]
fn wrong_output_shape_is_rejected() {
    let a = simple_csr();
    let b = rhs();
    let mut c = Dense::new(3, 4, 9.0).unwrap();
    let err = spmm_f64(&a, &b, &mut c, 1.0, 0.0).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { op: "spmm output", .. }));
    assert!(c.to_row_major().iter().all(|&v| v == 9.0));
}

#[test]
fn resized_output_fits_product() {
    let a = simple_csr();
    let b = rhs();
    let mut c = Dense::default();
    spmm_resized_f64(&a, &b, &mut c, 1.0, 0.0).unwrap();
    assert_eq!(c.shape(), (3, 5));
    assert_eq!(c, spmm_product_f64(&a, &b).unwrap());
}

#[test]
fn unpopulated_rows_are_scaled_only() {
    let mut a = Csr::new(4, 3);
    a.append(2.0, 1, 2).unwrap();
    let b = rhs();
    let mut c = Dense::new(4, 5, 1.0).unwrap();
    spmm_f64(&a, &b, &mut c, 1.0, 0.5).unwrap();
    assert_eq!(c.row(0).unwrap(), &[0.5; 5]);
    assert_eq!(c.row(1).unwrap(), &[22.5, 24.5, 26.5, 28.5, 30.5]);
    assert_eq!(c.row(3).unwrap(), &[0.5; 5]);
}

#[test]
fn empty_shapes() {
    let a = Csr::new(0, 3);
    let b = rhs();
    assert_eq!(spmm_product_f64(&a, &b).unwrap().shape(), (0, 5));

    let a = simple_csr();
    let b = Dense::zeros(3, 0).unwrap();
    assert_eq!(spmm_product_f64(&a, &b).unwrap().shape(), (3, 0));
}

#[test]
fn multiply_alias_is_spmm() {
    let a = simple_csr();
    let b = rhs();
    let mut c = Dense::zeros(3, 5).unwrap();
    multiply(&a, &b, &mut c, 1.0, 0.0).unwrap();
    assert_eq!(c, spmm_product_f64(&a, &b).unwrap());
}

/// Skewed pattern: a few very dense rows among mostly empty ones.
fn skewed(m: usize, n: usize) -> Csr<f64> {
    let mut a = Csr::new(m, n);
    for i in 0..m {
        let count = if i % 17 == 0 { n } else { i % 3 };
        for k in 0..count {
            let j = (i * 7 + k * 13) % n;
            a.append(((i * 31 + k) % 11) as f64 * 0.37 - 1.3, i, j).unwrap();
        }
    }
    a
}

fn dense_rhs(n: usize, p: usize) -> Dense<f64> {
    let data: Vec<f64> = (0..n * p).map(|v| ((v * 7919) % 101) as f64 / 13.0 - 3.0).collect();
    Dense::from_row_major(n, p, &data).unwrap()
}

#[rstest]
fn results_are_identical_across_thread_counts(
    #[values(2, 3, 8)] threads: usize,
    #[values(1, 2, 4)] rows_per_chunk: usize,
) {
    let a = skewed(97, 45);
    let b = dense_rhs(45, 37);
    let init = Dense::new(97, 37, 0.25).unwrap();

    let single = Spmm::new(KernelConfig::default()).unwrap();
    let mut expected = init.clone();
    single.multiply(&a, &b, &mut expected, 0.8, 1.5).unwrap();

    let config = KernelConfig::default()
        .with_threads(threads)
        .with_rows_per_chunk(rows_per_chunk);
    let multi = Spmm::new(config).unwrap();
    let mut got = init.clone();
    multi.multiply(&a, &b, &mut got, 0.8, 1.5).unwrap();

    assert_eq!(got.to_row_major(), expected.to_row_major());
}

#[test]
fn executor_product_and_resize() {
    let spmm = Spmm::new(KernelConfig::default().with_threads(2)).unwrap();
    assert_eq!(spmm.config().num_threads, 2);
    let a = simple_csr();
    let b = rhs();
    let p = spmm.product(&a, &b).unwrap();
    let mut c = Dense::zeros(1, 1).unwrap();
    spmm.multiply_resized(&a, &b, &mut c, 1.0, 0.0).unwrap();
    assert_eq!(p, c);
    assert_eq!(p, spmm_product_f64(&a, &b).unwrap());
}

#[test]
fn executor_rejects_invalid_config() {
    assert!(matches!(
        Spmm::new(KernelConfig::default().with_threads(0)),
        Err(Error::InvalidArgument { .. })
    ));
}

fn sparse_strategy() -> impl Strategy<Value = (Csr<f64>, Dense<f64>)> {
    (1usize..24, 1usize..24, 0usize..24).prop_flat_map(|(m, n, p)| {
        let entries = prop::collection::vec((0..m, 0..n, -8i32..8), 0..(m * n).min(96));
        let values = prop::collection::vec(-100i32..100, n * p);
        (entries, values).prop_map(move |(mut entries, values)| {
            entries.sort_by_key(|e| e.0);
            let mut a = Csr::new(m, n);
            for (i, j, v) in entries {
                a.append(f64::from(v) * 0.125, i, j).unwrap();
            }
            let data: Vec<f64> = values.into_iter().map(|v| f64::from(v) / 7.0).collect();
            let b = Dense::from_row_major(n, p, &data).unwrap();
            (a, b)
        })
    })
}

#[test]
fn executor_from_env_runs_with_env_config() {
    let unset = std::env::var_os(config::THREADS_ENV).is_none()
        && std::env::var_os(config::ROWS_PER_CHUNK_ENV).is_none();
    match Spmm::from_env() {
        Ok(spmm) => {
            if unset {
                assert_eq!(*spmm.config(), KernelConfig::default());
            }
            let c = spmm.product(&simple_csr(), &rhs()).unwrap();
            assert_eq!(c, spmm_product_f64(&simple_csr(), &rhs()).unwrap());
        }
        Err(err) => {
            assert!(!unset, "defaults must always build: {err}");
            assert!(matches!(err, Error::InvalidArgument { .. }));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn thread_count_never_changes_bits((a, b) in sparse_strategy(), threads in 2usize..6) {
        let one = Spmm::new(KernelConfig::default()).unwrap();
        let many = Spmm::new(KernelConfig::default().with_threads(threads).with_rows_per_chunk(1)).unwrap();
        let lhs = one.product(&a, &b).unwrap();
        let rhs = many.product(&a, &b).unwrap();
        prop_assert_eq!(lhs.to_row_major(), rhs.to_row_major());
    }

    #[test]
    fn product_agrees_with_reference((a, b) in sparse_strategy()) {
        let c = spmm_product_f64(&a, &b).unwrap();
        let zeros = Dense::zeros(a.nrows(), b.ncols()).unwrap();
        let want = reference(&a, &b, &zeros, 1.0, 0.0);
        for (got, want) in c.to_row_major().iter().zip(&want) {
            prop_assert!((got - want).abs() <= 1e-9 * want.abs().max(1.0));
        }
    }
}
