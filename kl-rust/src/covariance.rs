//! Covariance kernels
//!
//! A covariance kernel is a symmetric matrix-valued function
//!
//! C(s, t) = C(t, s)^T,   s, t ∈ D ⊂ R^d,   C(s, t) ∈ R^{p×p}
//!
//! defining the second-order statistics of a p-variate random field over a
//! d-dimensional domain. The decomposition engines only need pointwise
//! evaluation and the two dimensions; the stationary models below are the
//! serializable kernels used by persistence.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{KLError, KLResult};

/// Trait for covariance kernels consumed by the decomposition engines
pub trait CovarianceKernel: Debug + Send + Sync {
    /// Dimension d of the domain points
    fn input_dimension(&self) -> usize;

    /// Dimension p of the field values; `evaluate` returns a p×p block
    fn output_dimension(&self) -> usize;

    /// Evaluate C(s, t)
    fn evaluate(&self, s: ArrayView1<f64>, t: ArrayView1<f64>) -> Array2<f64>;
}

impl<K: CovarianceKernel + ?Sized> CovarianceKernel for Arc<K> {
    fn input_dimension(&self) -> usize {
        (**self).input_dimension()
    }

    fn output_dimension(&self) -> usize {
        (**self).output_dimension()
    }

    fn evaluate(&self, s: ArrayView1<f64>, t: ArrayView1<f64>) -> Array2<f64> {
        (**self).evaluate(s, t)
    }
}

/// Parameters of a stationary kernel C(s, t) = ρ(|s - t|_θ) · diag(σ) R diag(σ)
///
/// Deserialization runs the same checks as the constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredParameters")]
pub struct StationaryParameters {
    /// Correlation lengths θ, one per input dimension
    scale: Vec<f64>,
    /// Marginal standard deviations σ, one per output dimension
    amplitude: Vec<f64>,
    /// Output correlation matrix R (identity when absent)
    correlation: Option<Array2<f64>>,
}

/// Unchecked serialized form of [`StationaryParameters`]
#[derive(Deserialize)]
struct StoredParameters {
    scale: Vec<f64>,
    amplitude: Vec<f64>,
    #[serde(default)]
    correlation: Option<Array2<f64>>,
}

impl TryFrom<StoredParameters> for StationaryParameters {
    type Error = KLError;

    fn try_from(stored: StoredParameters) -> KLResult<Self> {
        let params = Self {
            scale: stored.scale,
            amplitude: stored.amplitude,
            correlation: stored.correlation,
        };
        params.validate()?;
        Ok(params)
    }
}

impl StationaryParameters {
    pub fn new(scale: Vec<f64>, amplitude: Vec<f64>) -> KLResult<Self> {
        let params = Self {
            scale,
            amplitude,
            correlation: None,
        };
        params.validate()?;
        Ok(params)
    }

    /// Attach an output correlation matrix (p×p, symmetric, unit diagonal)
    pub fn with_correlation(mut self, correlation: Array2<f64>) -> KLResult<Self> {
        self.correlation = Some(correlation);
        self.validate()?;
        Ok(self)
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn amplitude(&self) -> &[f64] {
        &self.amplitude
    }

    pub fn correlation(&self) -> Option<&Array2<f64>> {
        self.correlation.as_ref()
    }

    fn validate(&self) -> KLResult<()> {
        if self.scale.is_empty() {
            return Err(KLError::config("Kernel input dimension must be positive"));
        }
        if self.amplitude.is_empty() {
            return Err(KLError::config("Kernel output dimension must be positive"));
        }
        if let Some(&theta) = self.scale.iter().find(|&&v| !(v.is_finite() && v > 0.0)) {
            return Err(KLError::config(format!(
                "Scale parameters must be positive, got {}",
                theta
            )));
        }
        if let Some(&sigma) = self.amplitude.iter().find(|&&v| !(v.is_finite() && v > 0.0)) {
            return Err(KLError::config(format!(
                "Amplitude parameters must be positive, got {}",
                sigma
            )));
        }
        if let Some(r) = &self.correlation {
            let p = self.amplitude.len();
            if r.dim() != (p, p) {
                return Err(KLError::config(format!(
                    "Correlation matrix must be {}x{}, got {:?}",
                    p,
                    p,
                    r.dim()
                )));
            }
            for i in 0..p {
                if !r[[i, i]].is_finite() || (r[[i, i]] - 1.0).abs() > 1e-12 {
                    return Err(KLError::config("Correlation matrix must have a unit diagonal"));
                }
                for j in 0..i {
                    if !r[[i, j]].is_finite() || (r[[i, j]] - r[[j, i]]).abs() > 1e-12 {
                        return Err(KLError::config("Correlation matrix must be symmetric"));
                    }
                }
            }
        }
        Ok(())
    }

    fn scaled_distance(&self, s: ArrayView1<f64>, t: ArrayView1<f64>) -> f64 {
        s.iter()
            .zip(t.iter())
            .zip(self.scale.iter())
            .map(|((&si, &ti), &theta)| {
                let d = (si - ti) / theta;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    /// diag(σ) R diag(σ) multiplied by the scalar correlation value
    fn block(&self, rho: f64) -> Array2<f64> {
        let p = self.amplitude.len();
        Array2::from_shape_fn((p, p), |(i, j)| {
            let r_ij = match &self.correlation {
                Some(r) => r[[i, j]],
                None if i == j => 1.0,
                None => 0.0,
            };
            rho * self.amplitude[i] * r_ij * self.amplitude[j]
        })
    }
}

/// Absolute exponential (Ornstein-Uhlenbeck) kernel
///
/// ρ(s, t) = exp(-|s - t|_θ)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteExponential {
    params: StationaryParameters,
}

impl AbsoluteExponential {
    pub fn new(scale: Vec<f64>, amplitude: Vec<f64>) -> KLResult<Self> {
        Ok(Self {
            params: StationaryParameters::new(scale, amplitude)?,
        })
    }

    pub fn from_parameters(params: StationaryParameters) -> Self {
        Self { params }
    }

    pub fn parameters(&self) -> &StationaryParameters {
        &self.params
    }
}

impl CovarianceKernel for AbsoluteExponential {
    fn input_dimension(&self) -> usize {
        self.params.scale.len()
    }

    fn output_dimension(&self) -> usize {
        self.params.amplitude.len()
    }

    fn evaluate(&self, s: ArrayView1<f64>, t: ArrayView1<f64>) -> Array2<f64> {
        let r = self.params.scaled_distance(s, t);
        self.params.block((-r).exp())
    }
}

/// Squared exponential (Gaussian) kernel
///
/// ρ(s, t) = exp(-|s - t|_θ² / 2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquaredExponential {
    params: StationaryParameters,
}

impl SquaredExponential {
    pub fn new(scale: Vec<f64>, amplitude: Vec<f64>) -> KLResult<Self> {
        Ok(Self {
            params: StationaryParameters::new(scale, amplitude)?,
        })
    }

    pub fn from_parameters(params: StationaryParameters) -> Self {
        Self { params }
    }

    pub fn parameters(&self) -> &StationaryParameters {
        &self.params
    }
}

impl CovarianceKernel for SquaredExponential {
    fn input_dimension(&self) -> usize {
        self.params.scale.len()
    }

    fn output_dimension(&self) -> usize {
        self.params.amplitude.len()
    }

    fn evaluate(&self, s: ArrayView1<f64>, t: ArrayView1<f64>) -> Array2<f64> {
        let r = self.params.scaled_distance(s, t);
        self.params.block((-0.5 * r * r).exp())
    }
}

/// Closed set of serializable kernels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CovarianceModel {
    AbsoluteExponential(AbsoluteExponential),
    SquaredExponential(SquaredExponential),
}

impl From<AbsoluteExponential> for CovarianceModel {
    fn from(kernel: AbsoluteExponential) -> Self {
        CovarianceModel::AbsoluteExponential(kernel)
    }
}

impl From<SquaredExponential> for CovarianceModel {
    fn from(kernel: SquaredExponential) -> Self {
        CovarianceModel::SquaredExponential(kernel)
    }
}

impl CovarianceKernel for CovarianceModel {
    fn input_dimension(&self) -> usize {
        match self {
            CovarianceModel::AbsoluteExponential(k) => k.input_dimension(),
            CovarianceModel::SquaredExponential(k) => k.input_dimension(),
        }
    }

    fn output_dimension(&self) -> usize {
        match self {
            CovarianceModel::AbsoluteExponential(k) => k.output_dimension(),
            CovarianceModel::SquaredExponential(k) => k.output_dimension(),
        }
    }

    fn evaluate(&self, s: ArrayView1<f64>, t: ArrayView1<f64>) -> Array2<f64> {
        match self {
            CovarianceModel::AbsoluteExponential(k) => k.evaluate(s, t),
            CovarianceModel::SquaredExponential(k) => k.evaluate(s, t),
        }
    }
}

#[cfg(test)]
#[path = "covariance_tests.rs"]
mod covariance_tests;
