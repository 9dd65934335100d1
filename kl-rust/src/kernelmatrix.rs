//! Kernel matrix discretization
//!
//! Evaluates a covariance kernel on every pair of discretization nodes and
//! stores the result as a block matrix of size `(N·p) × (N·p)`, node-major
//! and component-minor: entry `(i·p + a, j·p + b)` holds `C(x_i, x_j)[a, b]`.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use tracing::debug;

use crate::covariance::CovarianceKernel;
use crate::error::{KLError, KLResult};

/// Kernel matrix together with the node set it was evaluated on
#[derive(Debug, Clone)]
pub struct DiscretizedKernel {
    /// Block kernel matrix
    pub matrix: Array2<f64>,
    /// Output dimension p of the kernel
    pub output_dimension: usize,
}

impl DiscretizedKernel {
    /// Number of nodes N
    pub fn n_nodes(&self) -> usize {
        self.matrix.nrows() / self.output_dimension.max(1)
    }

    /// Largest |C_ij - C_ji| relative to the largest |C_ij|
    pub fn asymmetry(&self) -> f64 {
        let scale = self.matrix.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        if scale == 0.0 {
            return 0.0;
        }
        let n = self.matrix.nrows();
        let mut worst = 0.0f64;
        for i in 0..n {
            for j in 0..i {
                worst = worst.max((self.matrix[[i, j]] - self.matrix[[j, i]]).abs());
            }
        }
        worst / scale
    }

    /// Fail with a numerical error when the matrix is asymmetric beyond `tolerance`
    pub fn check_symmetry(&self, tolerance: f64) -> KLResult<()> {
        let asymmetry = self.asymmetry();
        if asymmetry > tolerance {
            return Err(KLError::numerical(format!(
                "Kernel matrix is not symmetric: relative asymmetry {:.3e} exceeds {:.3e}",
                asymmetry, tolerance
            )));
        }
        Ok(())
    }

    /// Replace the matrix by its symmetric part (C + C^T) / 2
    pub fn symmetrize(&mut self) {
        let transposed = self.matrix.t().to_owned();
        self.matrix = (&self.matrix + &transposed) * 0.5;
    }
}

/// Check that the kernel dimensions are usable on nodes of dimension `d`
pub fn check_kernel_dimensions<K: CovarianceKernel + ?Sized>(
    kernel: &K,
    domain_dimension: usize,
) -> KLResult<()> {
    if kernel.input_dimension() == 0 || kernel.output_dimension() == 0 {
        return Err(KLError::config(format!(
            "Kernel dimensions must be positive, got input {} and output {}",
            kernel.input_dimension(),
            kernel.output_dimension()
        )));
    }
    if kernel.input_dimension() != domain_dimension {
        return Err(KLError::config(format!(
            "Kernel input dimension {} does not match domain dimension {}",
            kernel.input_dimension(),
            domain_dimension
        )));
    }
    Ok(())
}

/// Evaluate the kernel on all pairs of nodes.
///
/// Rows of the block matrix are computed in parallel with rayon. Every
/// returned block is checked for shape and finiteness.
pub fn matrix_from_nodes<K: CovarianceKernel + ?Sized>(
    kernel: &K,
    nodes: ArrayView2<f64>,
) -> KLResult<DiscretizedKernel> {
    check_kernel_dimensions(kernel, nodes.ncols())?;

    let n = nodes.nrows();
    let p = kernel.output_dimension();
    debug!(n_nodes = n, output_dimension = p, "assembling kernel matrix");

    let rows: Vec<Vec<Array2<f64>>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    let block = kernel.evaluate(nodes.row(i), nodes.row(j));
                    if block.dim() != (p, p) {
                        return Err(KLError::config(format!(
                            "Kernel returned a {:?} block, expected ({}, {})",
                            block.dim(),
                            p,
                            p
                        )));
                    }
                    if block.iter().any(|v| !v.is_finite()) {
                        return Err(KLError::numerical(format!(
                            "Kernel value is not finite at node pair ({}, {})",
                            i, j
                        )));
                    }
                    Ok(block)
                })
                .collect::<KLResult<Vec<_>>>()
        })
        .collect::<KLResult<Vec<_>>>()?;

    let mut matrix = Array2::zeros((n * p, n * p));
    for (i, row) in rows.iter().enumerate() {
        for (j, block) in row.iter().enumerate() {
            for a in 0..p {
                for b in 0..p {
                    matrix[[i * p + a, j * p + b]] = block[[a, b]];
                }
            }
        }
    }

    Ok(DiscretizedKernel {
        matrix,
        output_dimension: p,
    })
}
