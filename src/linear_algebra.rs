//! Linear algebra operations for Markov chain analysis
//!
//! Thin wrappers over `nalgebra` for the three numerical kernels the analyzers
//! need: a left eigenvector for the eigenvalue nearest a target, a null-space
//! vector, and a guarded direct linear solve that reports singularity instead of
//! returning garbage.

use crate::errors::{MarkovAnalysisError, MarkovResult};
use nalgebra::{DMatrix, DVector};

/// Maximum QR sweeps for Schur and SVD iterations.
const MAX_DECOMPOSITION_ITERATIONS: usize = 10_000;

/// Relative pivot size below which an LU factorization is treated as singular.
const SINGULAR_PIVOT_TOLERANCE: f64 = 1e-12;

/// Validates that input contains no NaN or Inf values
fn ensure_finite_matrix(a: &DMatrix<f64>, operation: &str) -> MarkovResult<()> {
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            let val = a[(i, j)];
            if !val.is_finite() {
                return Err(MarkovAnalysisError::NumericalError {
                    reason: format!("Non-finite value ({}) at position [{},{}]", val, i, j),
                    operation: Some(operation.to_string()),
                });
            }
        }
    }
    Ok(())
}

/// Validates that a matrix is square and non-empty, returning its order
fn ensure_square_matrix(a: &DMatrix<f64>, operation: &str) -> MarkovResult<usize> {
    if a.nrows() == 0 {
        return Err(MarkovAnalysisError::NumericalError {
            reason: "Empty matrix provided".to_string(),
            operation: Some(operation.to_string()),
        });
    }
    if a.nrows() != a.ncols() {
        return Err(MarkovAnalysisError::DimensionMismatch {
            expected: a.nrows(),
            actual: a.ncols(),
            context: operation.to_string(),
        });
    }
    Ok(a.nrows())
}

/// Builds a dense matrix from row vectors, rejecting ragged input.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> MarkovResult<DMatrix<f64>> {
    let n = rows.len();
    let m = rows.first().map_or(0, |r| r.len());
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != m) {
        return Err(MarkovAnalysisError::DimensionMismatch {
            expected: m,
            actual: row.len(),
            context: format!("row {} of matrix", i),
        });
    }
    Ok(DMatrix::from_fn(n, m, |i, j| rows[i][j]))
}

/// Converts a dense matrix back into row vectors.
pub fn matrix_to_rows(a: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..a.nrows())
        .map(|i| a.row(i).iter().copied().collect())
        .collect()
}

/// A real eigenpair selected from a possibly complex spectrum.
#[derive(Debug, Clone)]
pub struct SelectedEigenpair {
    /// Real part of the selected eigenvalue
    pub eigenvalue: f64,
    /// Imaginary part of the selected eigenvalue (zero for real eigenvalues)
    pub eigenvalue_imag: f64,
    /// Unit-norm real eigenvector
    pub eigenvector: DVector<f64>,
}

/// Right eigenvector of `a` for the eigenvalue closest to `target`.
///
/// The spectrum comes from a real Schur decomposition; the eigenvector is the
/// right singular vector of `a - λI` for its smallest singular value, with
/// `λ` the real part of the selected eigenvalue. For a complex pair only the
/// real direction is recovered.
pub fn eigenvector_nearest(a: &DMatrix<f64>, target: f64) -> MarkovResult<SelectedEigenpair> {
    let n = ensure_square_matrix(a, "eigenvector_nearest")?;
    ensure_finite_matrix(a, "eigenvector_nearest")?;

    let schur = a
        .clone()
        .try_schur(f64::EPSILON, MAX_DECOMPOSITION_ITERATIONS)
        .ok_or_else(|| {
            MarkovAnalysisError::numerical("Schur decomposition did not converge", "eigenvector_nearest")
        })?;
    let spectrum = schur.complex_eigenvalues();

    let mut best: Option<(f64, f64, f64)> = None;
    for lambda in spectrum.iter() {
        let distance = ((lambda.re - target).powi(2) + lambda.im.powi(2)).sqrt();
        match best {
            Some((d, _, _)) if distance >= d => {}
            _ => best = Some((distance, lambda.re, lambda.im)),
        }
    }
    let (_, re, im) = best.ok_or_else(|| {
        MarkovAnalysisError::numerical("Matrix has an empty spectrum", "eigenvector_nearest")
    })?;

    let shifted = a - DMatrix::<f64>::identity(n, n) * re;
    let eigenvector = null_space_vector(&shifted)?;

    Ok(SelectedEigenpair {
        eigenvalue: re,
        eigenvalue_imag: im,
        eigenvector,
    })
}

/// Unit vector spanning the (numerical) null space of `a`.
///
/// Returns the right singular vector associated with the smallest singular value.
pub fn null_space_vector(a: &DMatrix<f64>) -> MarkovResult<DVector<f64>> {
    ensure_square_matrix(a, "null_space_vector")?;

    let svd = a
        .clone()
        .try_svd(false, true, f64::EPSILON, MAX_DECOMPOSITION_ITERATIONS)
        .ok_or_else(|| MarkovAnalysisError::numerical("SVD did not converge", "null_space_vector"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| MarkovAnalysisError::numerical("SVD returned no V^T", "null_space_vector"))?;

    let smallest = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|(_, x), (_, y)| x.total_cmp(y))
        .map(|(i, _)| i)
        .ok_or_else(|| MarkovAnalysisError::numerical("Empty singular spectrum", "null_space_vector"))?;

    Ok(v_t.row(smallest).transpose())
}

/// Solves `a x = b` by LU decomposition with partial pivoting.
///
/// Returns `Ok(None)` when the system is singular or the solution is not finite.
/// A pivot smaller than `1e-12` times the largest pivot counts as singular.
pub fn solve_linear_system(a: &DMatrix<f64>, b: &DVector<f64>) -> MarkovResult<Option<DVector<f64>>> {
    let n = ensure_square_matrix(a, "solve_linear_system")?;
    ensure_finite_matrix(a, "solve_linear_system")?;
    if b.len() != n {
        return Err(MarkovAnalysisError::DimensionMismatch {
            expected: n,
            actual: b.len(),
            context: "solve_linear_system right-hand side".to_string(),
        });
    }

    let lu = a.clone().lu();
    let pivots = lu.u().diagonal();
    let largest = pivots.iter().fold(0.0_f64, |m, p| m.max(p.abs()));
    let smallest = pivots.iter().fold(f64::INFINITY, |m, p| m.min(p.abs()));
    if largest == 0.0 || smallest <= SINGULAR_PIVOT_TOLERANCE * largest {
        return Ok(None);
    }

    Ok(lu.solve(b).filter(|x| x.iter().all(|v| v.is_finite())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_matrix_round_trip_and_ragged() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let m = matrix_from_rows(&rows).unwrap();
        assert_eq!(m[(1, 0)], 3.0);
        assert_eq!(matrix_to_rows(&m), rows);

        let ragged = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            matrix_from_rows(&ragged),
            Err(MarkovAnalysisError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_eigenvector_of_transposed_stochastic_matrix() {
        // Transpose of [[0.9, 0.1], [0.4, 0.6]]
        let pt = DMatrix::from_row_slice(2, 2, &[0.9, 0.4, 0.1, 0.6]);
        let pair = eigenvector_nearest(&pt, 1.0).unwrap();
        assert_approx_eq!(pair.eigenvalue, 1.0, 1e-10);

        let v = pair.eigenvector.map(|x| x.abs());
        let total = v.sum();
        assert_approx_eq!(v[0] / total, 0.8, 1e-10);
        assert_approx_eq!(v[1] / total, 0.2, 1e-10);
    }

    #[test]
    fn test_solve_regular_system() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![3.0, 5.0]);
        let x = solve_linear_system(&a, &b).unwrap().unwrap();
        assert_approx_eq!(x[0], 0.8, 1e-12);
        assert_approx_eq!(x[1], 1.4, 1e-12);
    }

    #[test]
    fn test_solve_singular_system_returns_none() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, 0.0, 0.0]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert!(solve_linear_system(&a, &b).unwrap().is_none());
    }

    #[test]
    fn test_rejects_non_square_and_non_finite() {
        let rect = DMatrix::<f64>::zeros(2, 3);
        assert!(null_space_vector(&rect).is_err());

        let bad = DMatrix::from_row_slice(1, 1, &[f64::NAN]);
        assert!(eigenvector_nearest(&bad, 1.0).is_err());
    }
}
