//! Mathematical utilities for the ridge models
//!
//! The per-arm estimators keep a symmetric positive-definite design matrix
//! `A` (identity plus rank-one updates), so `theta = A^-1 * b` is computed
//! with a Cholesky factorization followed by two triangular solves. No
//! inverse is ever materialized.

use crate::error::ReverieError;
use ndarray::{Array1, Array2};

/// Dot product of two equal-length slices
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Solve `A * x = b` for a symmetric positive-definite `A`
///
/// Returns a `Computation` error if `A` is not square, does not match `b`,
/// or loses positive-definiteness (a non-positive pivot), so callers can
/// degrade to their neutral fallback instead of producing NaNs.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ReverieError> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(ReverieError::computation(format!(
            "dimension mismatch: A is {}x{}, b has {} elements",
            a.nrows(),
            a.ncols(),
            n
        )));
    }

    // Factor A = L * L^T, lower triangle only.
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !sum.is_finite() || sum <= 0.0 {
                    return Err(ReverieError::computation(format!(
                        "matrix is not positive definite (pivot {} at row {})",
                        sum, i
                    )));
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }

    // Back substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dot() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(dot(&[], &[]), 0.0);
    }

    #[test]
    fn test_cholesky_solve_identity() {
        let a = Array2::<f64>::eye(3);
        let b = array![1.0, 2.0, 3.0];
        let x = cholesky_solve(&a, &b).unwrap();
        for (got, want) in x.iter().zip(b.iter()) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cholesky_solve_spd() {
        // A = [[4, 2], [2, 3]], b = [2, 1] -> x = [0.5, 0]
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&a, &b).unwrap();
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_solve_rank_one_update() {
        // Identity plus an observed context, the exact shape the models build.
        let ctx = array![0.5, 0.3, 0.0, 1.0];
        let mut a = Array2::<f64>::eye(4);
        for i in 0..4 {
            for j in 0..4 {
                a[[i, j]] += ctx[i] * ctx[j];
            }
        }
        let b = &ctx * 0.8;
        let theta = cholesky_solve(&a, &b).unwrap();
        // Verify A * theta == b
        let recon = a.dot(&theta);
        for (got, want) in recon.iter().zip(b.iter()) {
            assert!((got - want).abs() < 1e-10);
        }
    }

    #[test]
    fn test_cholesky_solve_rejects_indefinite() {
        let a = array![[0.0, 0.0], [0.0, 0.0]];
        let b = array![1.0, 1.0];
        assert!(cholesky_solve(&a, &b).is_err());
    }

    #[test]
    fn test_cholesky_solve_rejects_dimension_mismatch() {
        let a = Array2::<f64>::eye(3);
        let b = array![1.0, 2.0];
        assert!(cholesky_solve(&a, &b).is_err());
    }
}
