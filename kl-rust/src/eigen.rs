//! Symmetric eigenvalue solvers using nalgebra
//!
//! The decomposition engines consume eigensolvers through the [`EigenSolver`]
//! trait. The default [`SymmetricEigenSolver`] wraps
//! `nalgebra::SymmetricEigen` and reduces generalized problems
//! `A x = λ B x` with B symmetric positive definite to standard form through
//! the Cholesky factorization B = L L^T:
//!
//! 1. C = L^{-1} A L^{-T}
//! 2. C y = λ y
//! 3. x = L^{-T} y
//!
//! so that the returned vectors are B-orthonormal.

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2};
use std::fmt::Debug;
use tracing::{debug, warn};

use crate::error::{KLError, KLResult};

/// Eigenpairs as returned by a solver, in unspecified order
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// Eigenvalues
    pub values: Array1<f64>,
    /// Eigenvectors stored as columns
    pub vectors: Array2<f64>,
}

/// Solver for symmetric standard and generalized eigenproblems
pub trait EigenSolver: Debug + Send + Sync {
    /// Solve A x = λ x for symmetric A
    fn solve(&self, a: &Array2<f64>) -> KLResult<EigenDecomposition>;

    /// Solve A x = λ B x for symmetric A and symmetric positive definite B
    fn solve_generalized(&self, a: &Array2<f64>, b: &Array2<f64>)
        -> KLResult<EigenDecomposition>;
}

/// Default solver backed by `nalgebra::SymmetricEigen`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricEigenSolver {
    /// Convergence tolerance of the implicit QR iteration
    pub epsilon: f64,
    /// Maximum number of QR sweeps, 0 for no limit
    pub max_iterations: usize,
}

impl Default for SymmetricEigenSolver {
    fn default() -> Self {
        Self {
            epsilon: f64::EPSILON,
            max_iterations: 10_000,
        }
    }
}

impl SymmetricEigenSolver {
    pub fn new(epsilon: f64, max_iterations: usize) -> Self {
        Self {
            epsilon,
            max_iterations,
        }
    }

    fn decompose(&self, matrix: DMatrix<f64>) -> KLResult<SymmetricEigen<f64, nalgebra::Dyn>> {
        let n = matrix.nrows();
        SymmetricEigen::try_new(matrix, self.epsilon, self.max_iterations).ok_or_else(|| {
            warn!(n, max_iterations = self.max_iterations, "eigensolver did not converge");
            KLError::numerical(format!(
                "Symmetric eigensolver did not converge within {} iterations",
                self.max_iterations
            ))
        })
    }
}

impl EigenSolver for SymmetricEigenSolver {
    fn solve(&self, a: &Array2<f64>) -> KLResult<EigenDecomposition> {
        check_square(a, "A")?;
        debug!(n = a.nrows(), "solving symmetric eigenproblem");

        let eigen = self.decompose(to_dmatrix(a))?;
        Ok(EigenDecomposition {
            values: Array1::from_iter(eigen.eigenvalues.iter().copied()),
            vectors: to_array2(&eigen.eigenvectors),
        })
    }

    fn solve_generalized(
        &self,
        a: &Array2<f64>,
        b: &Array2<f64>,
    ) -> KLResult<EigenDecomposition> {
        check_square(a, "A")?;
        check_square(b, "B")?;
        if a.dim() != b.dim() {
            return Err(KLError::config(format!(
                "A and B must have the same shape, got {:?} and {:?}",
                a.dim(),
                b.dim()
            )));
        }
        debug!(n = a.nrows(), "solving generalized symmetric eigenproblem");

        let l = Cholesky::new(to_dmatrix(b))
            .ok_or_else(|| KLError::numerical("B is not positive definite"))?
            .l();

        let singular = || KLError::numerical("Cholesky factor of B is singular");
        let l_inv_a = l.solve_lower_triangular(&to_dmatrix(a)).ok_or_else(singular)?;
        let reduced = l
            .solve_lower_triangular(&l_inv_a.transpose())
            .ok_or_else(singular)?;
        let reduced = (&reduced + reduced.transpose()) * 0.5;

        let eigen = self.decompose(reduced)?;
        let vectors = l
            .tr_solve_lower_triangular(&eigen.eigenvectors)
            .ok_or_else(singular)?;

        Ok(EigenDecomposition {
            values: Array1::from_iter(eigen.eigenvalues.iter().copied()),
            vectors: to_array2(&vectors),
        })
    }
}

fn check_square(m: &Array2<f64>, name: &str) -> KLResult<()> {
    if m.nrows() != m.ncols() {
        return Err(KLError::config(format!(
            "{} must be square, got {:?}",
            name,
            m.dim()
        )));
    }
    if m.iter().any(|v| !v.is_finite()) {
        return Err(KLError::numerical(format!("{} has non-finite entries", name)));
    }
    Ok(())
}

pub(crate) fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub(crate) fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}
