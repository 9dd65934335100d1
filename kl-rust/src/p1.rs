//! P1 finite-element Karhunen-Loeve engine
//!
//! Eigenfunctions are sought in the span of the piecewise-linear hat
//! functions of a [`P1Mesh`], φ = Σ_i x_i ψ_i. Interpolating the kernel in
//! the same basis, C(s, t) ≈ Σ_ij C(v_i, v_j) ψ_i(s) ψ_j(t), the Galerkin
//! condition becomes the generalized symmetric problem
//!
//! M C M x = λ M x
//!
//! with the mass matrix M (Kronecker-expanded over the p output components).
//! The generalized eigenvectors are M-orthonormal and are directly the
//! nodal values of the eigenfunctions.

use ndarray::Array2;
use std::fmt;
use tracing::debug;

use crate::algorithm::{AlgorithmState, DiscreteSpectrum, KarhunenLoeveAlgorithm, postprocess};
use crate::config::KarhunenLoeveConfig;
use crate::covariance::CovarianceKernel;
use crate::eigen::{EigenSolver, SymmetricEigenSolver};
use crate::error::KLResult;
use crate::kernelmatrix::matrix_from_nodes;
use crate::mesh::{Discretization, Measure, P1Mesh};

/// Karhunen-Loeve engine based on P1 Lagrange finite elements
#[derive(Debug, Clone)]
pub struct KarhunenLoeveP1<K, S = SymmetricEigenSolver> {
    state: AlgorithmState<K>,
    mesh: P1Mesh,
    solver: S,
}

impl<K: CovarianceKernel> KarhunenLoeveP1<K> {
    pub fn new(kernel: K, mesh: P1Mesh, threshold: f64) -> KLResult<Self> {
        Ok(Self {
            state: AlgorithmState::new(kernel, threshold)?,
            mesh,
            solver: SymmetricEigenSolver::default(),
        })
    }
}

impl<K: CovarianceKernel, S: EigenSolver> KarhunenLoeveP1<K, S> {
    pub fn with_solver(
        kernel: K,
        mesh: P1Mesh,
        config: KarhunenLoeveConfig,
        solver: S,
    ) -> KLResult<Self> {
        Ok(Self {
            state: AlgorithmState::with_config(kernel, config)?,
            mesh,
            solver,
        })
    }

    pub(crate) fn from_parts(state: AlgorithmState<K>, mesh: P1Mesh, solver: S) -> Self {
        Self {
            state,
            mesh,
            solver,
        }
    }

    pub fn mesh(&self) -> &P1Mesh {
        &self.mesh
    }

    /// Replace the discretization. The stored result is not recomputed.
    pub fn set_mesh(&mut self, mesh: P1Mesh) {
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
        let mass = self.mesh.mass_matrix();
        let n = mass.nrows();
        let mass_p = Array2::from_shape_fn((n * p, n * p), |(r, s)| {
            if r % p == s % p {
                mass[[r / p, s / p]]
            } else {
                0.0
            }
        });

        let galerkin = mass_p.dot(&discretized.matrix).dot(&mass_p);
        // tr(M^{-1} · M C M) = tr(C M)
        let total_trace = (&discretized.matrix * &mass_p.t()).sum();
        debug!(size = n * p, total_trace, "assembled P1 Galerkin matrices");

        let eigen = self.solver.solve_generalized(&galerkin, &mass_p)?;

        Ok(DiscreteSpectrum {
            nodes: self.mesh.nodes().to_owned(),
            measure: Measure::Mass(mass),
            output_dimension: p,
            values: eigen.values,
            samples: eigen.vectors,
            total_trace,
        })
    }
}

impl<K: CovarianceKernel, S: EigenSolver> KarhunenLoeveAlgorithm for KarhunenLoeveP1<K, S> {
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

impl<K: CovarianceKernel, S> fmt::Display for KarhunenLoeveP1<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KarhunenLoeveP1(covariance model={:?}, vertices={}, simplices={}, threshold={}, result={})",
            self.state.kernel(),
            self.mesh.len(),
            self.mesh.simplices().len(),
            self.state.config().threshold,
            self.state.result()
        )
    }
}
