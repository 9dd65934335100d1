//! Result of a Karhunen-Loeve decomposition
//!
//! A [`KarhunenLoeveResult`] stores the truncated expansion
//!
//! ```text
//! C(s, t) ≈ sum(E[k] * φ[k](s) ⊗ φ[k](t) for k in 0..K)
//! ```
//!
//! with eigenvalues `E` sorted non-increasing and eigenfunctions `φ`
//! represented by their values at the discretization nodes. The
//! eigenfunctions are orthonormal for the inner product of the
//! discretization, which also defines projection and lifting.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::validate_threshold;
use crate::error::{KLError, KLResult};
use crate::mesh::Measure;

/// Immutable truncated eigen-expansion of a covariance kernel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KarhunenLoeveResult {
    /// Threshold used for truncation
    threshold: f64,
    /// Node coordinates, N × d
    nodes: Array2<f64>,
    /// Inner product on nodal fields
    measure: Measure,
    /// Output dimension p of the kernel
    output_dimension: usize,
    /// Retained eigenvalues, non-increasing
    eigenvalues: Array1<f64>,
    /// Eigenfunction samples, (N·p) × K, node-major and component-minor
    modes: Array2<f64>,
    /// Trace of the discretized covariance operator before truncation
    total_trace: f64,
    /// Rank-K covariance on all nodes, built on first request
    #[serde(skip)]
    covariance_cache: OnceCell<Array2<f64>>,
}

impl PartialEq for KarhunenLoeveResult {
    fn eq(&self, other: &Self) -> bool {
        self.threshold == other.threshold
            && self.nodes == other.nodes
            && self.measure == other.measure
            && self.output_dimension == other.output_dimension
            && self.eigenvalues == other.eigenvalues
            && self.modes == other.modes
            && self.total_trace == other.total_trace
    }
}

impl KarhunenLoeveResult {
    /// Assemble a result, checking shapes and eigenvalue ordering.
    pub fn new(
        threshold: f64,
        nodes: Array2<f64>,
        measure: Measure,
        output_dimension: usize,
        eigenvalues: Array1<f64>,
        modes: Array2<f64>,
        total_trace: f64,
    ) -> KLResult<Self> {
        let result = Self {
            threshold,
            nodes,
            measure,
            output_dimension,
            eigenvalues,
            modes,
            total_trace,
            covariance_cache: OnceCell::new(),
        };
        result.validate()?;
        Ok(result)
    }

    /// Check the structural invariants of the result
    pub fn validate(&self) -> KLResult<()> {
        validate_threshold(self.threshold)?;
        let n = self.nodes.nrows();
        if self.measure.len() != n {
            return Err(KLError::config(format!(
                "Measure has {} nodes, expected {}",
                self.measure.len(),
                n
            )));
        }
        if let Measure::Mass(m) = &self.measure {
            if m.ncols() != n {
                return Err(KLError::config("Mass matrix must be square"));
            }
        }
        if self.modes.dim() != (n * self.output_dimension, self.eigenvalues.len()) {
            return Err(KLError::config(format!(
                "Eigenfunction samples have shape {:?}, expected ({}, {})",
                self.modes.dim(),
                n * self.output_dimension,
                self.eigenvalues.len()
            )));
        }
        if self.eigenvalues.iter().any(|&e| !(e.is_finite() && e >= 0.0)) {
            return Err(KLError::config("Eigenvalues must be finite and non-negative"));
        }
        if self
            .eigenvalues
            .windows(2)
            .into_iter()
            .any(|pair| pair[1] > pair[0])
        {
            return Err(KLError::config("Eigenvalues must be sorted non-increasing"));
        }
        if !self.total_trace.is_finite() {
            return Err(KLError::config("Total trace must be finite"));
        }
        Ok(())
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Number K of retained modes
    pub fn size(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    /// Number N of discretization nodes
    pub fn n_nodes(&self) -> usize {
        self.nodes.nrows()
    }

    pub fn output_dimension(&self) -> usize {
        self.output_dimension
    }

    pub fn nodes(&self) -> ArrayView2<'_, f64> {
        self.nodes.view()
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    pub fn eigenvalues(&self) -> ArrayView1<'_, f64> {
        self.eigenvalues.view()
    }

    /// Eigenfunction samples as a (N·p) × K matrix
    pub fn modes(&self) -> ArrayView2<'_, f64> {
        self.modes.view()
    }

    /// Mode k as an N × p nodal field
    pub fn eigenfunction(&self, k: usize) -> KLResult<Array2<f64>> {
        if k >= self.size() {
            return Err(KLError::config(format!(
                "Mode index {} out of range for {} modes",
                k,
                self.size()
            )));
        }
        Ok(self.unflatten(self.modes.column(k)))
    }

    /// All retained eigenfunctions as N × p nodal fields
    pub fn eigenfunctions(&self) -> Vec<Array2<f64>> {
        self.modes
            .axis_iter(Axis(1))
            .map(|column| self.unflatten(column))
            .collect()
    }

    pub fn total_trace(&self) -> f64 {
        self.total_trace
    }

    /// Total trace minus the sum of retained eigenvalues
    pub fn residual_energy(&self) -> f64 {
        self.total_trace - self.eigenvalues.sum()
    }

    /// Fraction of the total trace captured by the retained modes
    pub fn explained_variance_ratio(&self) -> f64 {
        if self.total_trace > 0.0 {
            self.eigenvalues.sum() / self.total_trace
        } else {
            0.0
        }
    }

    /// ⟨f, g⟩ under the discretization measure
    pub fn inner_product(&self, f: ArrayView2<f64>, g: ArrayView2<f64>) -> KLResult<f64> {
        self.check_field(f)?;
        self.check_field(g)?;
        Ok(self.measure.inner_product(f, g))
    }

    pub fn norm(&self, f: ArrayView2<f64>) -> KLResult<f64> {
        Ok(self.inner_product(f, f)?.max(0.0).sqrt())
    }

    /// Coefficients c_k = ⟨field, φ_k⟩ of an N × p nodal field.
    ///
    /// Returns an empty vector when no mode is retained.
    pub fn project(&self, field: ArrayView2<f64>) -> KLResult<Array1<f64>> {
        if self.is_empty() {
            return Ok(Array1::zeros(0));
        }
        self.check_field(field)?;
        let weighted = self.measure.apply(field);
        let flat = Array1::from_iter(weighted.iter().copied());
        Ok(self.modes.t().dot(&flat))
    }

    /// Project several fields; row i holds the coefficients of `fields[i]`
    pub fn project_sample(&self, fields: &[Array2<f64>]) -> KLResult<Array2<f64>> {
        let mut coefficients = Array2::zeros((fields.len(), self.size()));
        for (mut row, field) in coefficients.axis_iter_mut(Axis(0)).zip(fields) {
            row.assign(&self.project(field.view())?);
        }
        Ok(coefficients)
    }

    /// Field Σ_k c_k φ_k as an N × p nodal array.
    ///
    /// Returns the zero field when no mode is retained, whatever the input.
    pub fn lift(&self, coefficients: ArrayView1<f64>) -> KLResult<Array2<f64>> {
        if self.is_empty() {
            return Ok(Array2::zeros((self.n_nodes(), self.output_dimension)));
        }
        if coefficients.len() != self.size() {
            return Err(KLError::config(format!(
                "Expected {} coefficients, got {}",
                self.size(),
                coefficients.len()
            )));
        }
        Ok(self.unflatten(self.modes.dot(&coefficients).view()))
    }

    /// Lift each row of `coefficients`
    pub fn lift_sample(&self, coefficients: ArrayView2<f64>) -> KLResult<Vec<Array2<f64>>> {
        coefficients
            .axis_iter(Axis(0))
            .map(|row| self.lift(row))
            .collect()
    }

    /// Rank-K covariance Σ_k E_k φ_k(s) φ_k(t)^T between the given nodes.
    ///
    /// The result is an (m·p) × (m·p) block matrix for m node indices.
    pub fn covariance(&self, indices: &[usize]) -> KLResult<Array2<f64>> {
        let p = self.output_dimension;
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_nodes()) {
            return Err(KLError::config(format!(
                "Node index {} out of range for {} nodes",
                bad,
                self.n_nodes()
            )));
        }
        let rows: Vec<usize> = indices
            .iter()
            .flat_map(|&i| (0..p).map(move |a| i * p + a))
            .collect();
        let sub = self.modes.select(Axis(0), &rows);
        let scaled = &sub * &self.eigenvalues;
        Ok(scaled.dot(&sub.t()))
    }

    /// Rank-K covariance on every node, computed once and cached
    pub fn covariance_matrix(&self) -> &Array2<f64> {
        self.covariance_cache.get_or_init(|| {
            let scaled = &self.modes * &self.eigenvalues;
            scaled.dot(&self.modes.t())
        })
    }

    /// Measure-weighted trace of the rank-K covariance, ∫ tr Ĉ(s, s) ds.
    ///
    /// Equals the sum of the retained eigenvalues up to rounding.
    pub fn covariance_trace(&self) -> f64 {
        let cov = self.covariance_matrix();
        let p = self.output_dimension;
        let n = self.n_nodes();
        let mut trace = 0.0;
        match &self.measure {
            Measure::Weights(w) => {
                for i in 0..n {
                    for a in 0..p {
                        trace += w[i] * cov[[i * p + a, i * p + a]];
                    }
                }
            }
            Measure::Mass(m) => {
                for i in 0..n {
                    for j in 0..n {
                        for a in 0..p {
                            trace += m[[i, j]] * cov[[j * p + a, i * p + a]];
                        }
                    }
                }
            }
        }
        trace
    }

    fn check_field(&self, field: ArrayView2<f64>) -> KLResult<()> {
        let expected = (self.n_nodes(), self.output_dimension);
        if field.dim() != expected {
            return Err(KLError::config(format!(
                "Field has shape {:?}, expected {:?}",
                field.dim(),
                expected
            )));
        }
        Ok(())
    }

    fn unflatten(&self, flat: ArrayView1<f64>) -> Array2<f64> {
        let p = self.output_dimension;
        Array2::from_shape_fn((self.n_nodes(), p), |(i, a)| flat[i * p + a])
    }
}

impl fmt::Display for KarhunenLoeveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KarhunenLoeveResult(threshold={}, nodes={}, output_dimension={}, modes={}, eigenvalues={}, residual_energy={:.6e})",
            self.threshold,
            self.n_nodes(),
            self.output_dimension,
            self.size(),
            self.eigenvalues,
            self.residual_energy()
        )
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod result_tests;
