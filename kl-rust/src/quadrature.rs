//! Quadrature (Nyström) Karhunen-Loeve engine
//!
//! The integral operator (T φ)(s) = ∫ C(s, t) φ(t) dt is discretized on the
//! nodes x_i and weights w_i of a [`QuadratureMesh`]. Symmetrizing with the
//! square roots of the weights gives the standard symmetric problem
//!
//! W^{1/2} C W^{1/2} y = λ y,   φ(x_i) = y_i / sqrt(w_i)
//!
//! whose eigenvectors are orthonormal for the quadrature inner product once
//! mapped back to eigenfunction samples.

use ndarray::Array2;
use std::fmt;
use tracing::debug;

use crate::algorithm::{AlgorithmState, DiscreteSpectrum, KarhunenLoeveAlgorithm, postprocess};
use crate::config::KarhunenLoeveConfig;
use crate::covariance::CovarianceKernel;
use crate::eigen::{EigenSolver, SymmetricEigenSolver};
use crate::error::KLResult;
use crate::kernelmatrix::matrix_from_nodes;
use crate::mesh::{Discretization, QuadratureMesh};

/// Karhunen-Loeve engine based on a quadrature rule
#[derive(Debug, Clone)]
pub struct KarhunenLoeveQuadrature<K, S = SymmetricEigenSolver> {
    state: AlgorithmState<K>,
    mesh: QuadratureMesh,
    solver: S,
}

impl<K: CovarianceKernel> KarhunenLoeveQuadrature<K> {
    pub fn new(kernel: K, mesh: QuadratureMesh, threshold: f64) -> KLResult<Self> {
        Ok(Self {
            state: AlgorithmState::new(kernel, threshold)?,
            mesh,
            solver: SymmetricEigenSolver::default(),
        })
    }
}

impl<K: CovarianceKernel, S: EigenSolver> KarhunenLoeveQuadrature<K, S> {
    pub fn with_solver(
        kernel: K,
        mesh: QuadratureMesh,
        config: KarhunenLoeveConfig,
        solver: S,
    ) -> KLResult<Self> {
        Ok(Self {
            state: AlgorithmState::with_config(kernel, config)?,
            mesh,
            solver,
        })
    }

    pub(crate) fn from_parts(state: AlgorithmState<K>, mesh: QuadratureMesh, solver: S) -> Self {
        Self {
            state,
            mesh,
            solver,
        }
    }

    pub fn mesh(&self) -> &QuadratureMesh {
        &self.mesh
    }

    /// Replace the discretization. The stored result is not recomputed.
    pub fn set_mesh(&mut self, mesh: QuadratureMesh) {
        self.mesh = mesh;
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    fn discretize(&self) -> KLResult<DiscreteSpectrum> {
        let config = self.state.config();
        let mut discretized = matrix_from_nodes(self.state.kernel(), self.mesh.nodes())?;
        discretized.check_symmetry(config.symmetry_tolerance)?;
        discretized.symmetrize();

        let p = discretized.output_dimension;
        let sqrt_w: Vec<f64> = self
            .mesh
            .weights()
            .iter()
            .flat_map(|&w| std::iter::repeat(w.sqrt()).take(p))
            .collect();

        let size = sqrt_w.len();
        let weighted = Array2::from_shape_fn((size, size), |(r, s)| {
            sqrt_w[r] * discretized.matrix[[r, s]] * sqrt_w[s]
        });
        let total_trace = weighted.diag().sum();
        debug!(size, total_trace, "assembled Nystrom matrix");

        let eigen = self.solver.solve(&weighted)?;
        let mut samples = eigen.vectors;
        for (mut row, &sw) in samples.rows_mut().into_iter().zip(sqrt_w.iter()) {
            row /= sw;
        }

        Ok(DiscreteSpectrum {
            nodes: self.mesh.nodes().to_owned(),
            measure: self.mesh.measure(),
            output_dimension: p,
            values: eigen.values,
            samples,
            total_trace,
        })
    }
}

impl<K: CovarianceKernel, S: EigenSolver> KarhunenLoeveAlgorithm for KarhunenLoeveQuadrature<K, S> {
    type Kernel = K;

    fn state(&self) -> &AlgorithmState<K> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AlgorithmState<K> {
        &mut self.state
    }

    fn run(&mut self) -> KLResult<()> {
        let spectrum = self.discretize()?;
        let result = postprocess(spectrum, self.state.config())?;
        self.state.store_result(result);
        Ok(())
    }
}

impl<K: CovarianceKernel, S> fmt::Display for KarhunenLoeveQuadrature<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KarhunenLoeveQuadrature(covariance model={:?}, nodes={}, threshold={}, result={})",
            self.state.kernel(),
            self.mesh.len(),
            self.state.config().threshold,
            self.state.result()
        )
    }
}
