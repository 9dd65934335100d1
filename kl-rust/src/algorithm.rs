//! Karhunen-Loeve decomposition engines
//!
//! The [`KarhunenLoeveAlgorithm`] trait defines the contract shared by all
//! engines: threshold and covariance model accessors, the last result, and
//! a one-shot `run()`. Engines keep their configuration in an
//! [`AlgorithmState`]; concrete variants add a discretization and override
//! `run()`. The bare [`KarhunenLoeveBase`] carries the state only and its
//! `run()` fails with [`KLError::NotImplemented`].
//!
//! Every variant ends its `run()` with [`postprocess`], which sorts the
//! discrete spectrum, checks positivity, applies the truncation policy and
//! normalizes the retained eigenfunctions.

use ndarray::{Array1, Array2, ArrayView1};
use std::fmt;
use tracing::{debug, info};

use crate::config::{KarhunenLoeveConfig, validate_threshold};
use crate::covariance::CovarianceKernel;
use crate::error::{KLError, KLResult};
use crate::mesh::Measure;
use crate::result::KarhunenLoeveResult;
use crate::truncation::truncate;

/// Configuration, kernel and last result of an engine
#[derive(Debug, Clone)]
pub struct AlgorithmState<K> {
    kernel: K,
    config: KarhunenLoeveConfig,
    result: KarhunenLoeveResult,
}

impl<K: CovarianceKernel> AlgorithmState<K> {
    pub fn new(kernel: K, threshold: f64) -> KLResult<Self> {
        Self::with_config(kernel, KarhunenLoeveConfig::default().with_threshold(threshold))
    }

    pub fn with_config(kernel: K, config: KarhunenLoeveConfig) -> KLResult<Self> {
        config.validate()?;
        Ok(Self {
            kernel,
            config,
            result: KarhunenLoeveResult::default(),
        })
    }

    pub(crate) fn from_parts(
        kernel: K,
        config: KarhunenLoeveConfig,
        result: KarhunenLoeveResult,
    ) -> Self {
        Self {
            kernel,
            config,
            result,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn config(&self) -> &KarhunenLoeveConfig {
        &self.config
    }

    pub fn result(&self) -> &KarhunenLoeveResult {
        &self.result
    }

    pub(crate) fn store_result(&mut self, result: KarhunenLoeveResult) {
        self.result = result;
    }
}

/// Contract of a Karhunen-Loeve decomposition engine
pub trait KarhunenLoeveAlgorithm {
    /// Covariance kernel type
    type Kernel: CovarianceKernel;

    fn state(&self) -> &AlgorithmState<Self::Kernel>;

    fn state_mut(&mut self) -> &mut AlgorithmState<Self::Kernel>;

    /// Truncation threshold τ
    fn threshold(&self) -> f64 {
        self.state().config.threshold
    }

    /// Set τ, which must lie in [0, 1). The stored result is not recomputed.
    fn set_threshold(&mut self, threshold: f64) -> KLResult<()> {
        validate_threshold(threshold)?;
        self.state_mut().config.threshold = threshold;
        Ok(())
    }

    fn max_modes(&self) -> Option<usize> {
        self.state().config.max_modes
    }

    fn set_max_modes(&mut self, max_modes: Option<usize>) -> KLResult<()> {
        let config = self.state().config.with_max_modes(max_modes);
        self.set_config(config)
    }

    fn config(&self) -> &KarhunenLoeveConfig {
        &self.state().config
    }

    fn set_config(&mut self, config: KarhunenLoeveConfig) -> KLResult<()> {
        config.validate()?;
        self.state_mut().config = config;
        Ok(())
    }

    fn covariance_model(&self) -> &Self::Kernel {
        &self.state().kernel
    }

    /// Replace the kernel. Dimensions are checked by the next `run()`.
    fn set_covariance_model(&mut self, kernel: Self::Kernel) {
        self.state_mut().kernel = kernel;
    }

    /// Last computed result, empty before the first successful `run()`
    fn result(&self) -> &KarhunenLoeveResult {
        &self.state().result
    }

    /// Compute the decomposition and store the result.
    ///
    /// On error the previously stored result is kept.
    fn run(&mut self) -> KLResult<()> {
        Err(KLError::NotImplemented(
            "run() requires a discretization strategy".to_string(),
        ))
    }
}

/// Engine without a discretization strategy
#[derive(Debug, Clone)]
pub struct KarhunenLoeveBase<K> {
    state: AlgorithmState<K>,
}

impl<K: CovarianceKernel> KarhunenLoeveBase<K> {
    pub fn new(kernel: K, threshold: f64) -> KLResult<Self> {
        Ok(Self {
            state: AlgorithmState::new(kernel, threshold)?,
        })
    }

    pub(crate) fn from_state(state: AlgorithmState<K>) -> Self {
        Self { state }
    }
}

impl<K: CovarianceKernel> KarhunenLoeveAlgorithm for KarhunenLoeveBase<K> {
    type Kernel = K;

    fn state(&self) -> &AlgorithmState<K> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AlgorithmState<K> {
        &mut self.state
    }
}

impl<K: CovarianceKernel> fmt::Display for KarhunenLoeveBase<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KarhunenLoeveBase(covariance model={:?}, threshold={}, result={})",
            self.state.kernel, self.state.config.threshold, self.state.result
        )
    }
}

/// Discrete spectrum produced by a discretization strategy
#[derive(Debug, Clone)]
pub(crate) struct DiscreteSpectrum {
    /// Node coordinates, N × d
    pub nodes: Array2<f64>,
    /// Inner product on nodal fields
    pub measure: Measure,
    /// Output dimension p
    pub output_dimension: usize,
    /// Eigenvalues in solver order
    pub values: Array1<f64>,
    /// Eigenfunction samples as columns, (N·p) × n, in solver order
    pub samples: Array2<f64>,
    /// Trace of the discretized covariance operator
    pub total_trace: f64,
}

/// Sort, check, truncate and normalize a discrete spectrum.
pub(crate) fn postprocess(
    spectrum: DiscreteSpectrum,
    config: &KarhunenLoeveConfig,
) -> KLResult<KarhunenLoeveResult> {
    let DiscreteSpectrum {
        nodes,
        measure,
        output_dimension,
        values,
        samples,
        total_trace,
    } = spectrum;

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[j].total_cmp(&values[i]));
    let sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();

    if let (Some(&largest), Some(&smallest)) = (sorted.first(), sorted.last()) {
        if largest >= f64::MIN_POSITIVE && smallest < -config.psd_tolerance * largest {
            return Err(KLError::numerical(format!(
                "Kernel is not positive semi-definite: eigenvalue {:.6e} against largest {:.6e}",
                smallest, largest
            )));
        }
    }

    let k = truncate(
        &sorted,
        config.threshold,
        config.zero_tolerance,
        config.max_modes,
    );
    debug!(
        n_eigenvalues = sorted.len(),
        retained = k,
        threshold = config.threshold,
        "truncated spectrum"
    );

    let n = nodes.nrows();
    let p = output_dimension;
    let mut modes = Array2::zeros((n * p, k));
    for (col, &source) in order.iter().take(k).enumerate() {
        let mode = normalize_mode(samples.column(source), &measure, n, p)?;
        modes.column_mut(col).assign(&mode);
    }
    let eigenvalues = Array1::from_iter(sorted.into_iter().take(k));

    info!(
        retained = k,
        total_trace,
        captured = eigenvalues.sum(),
        "Karhunen-Loeve decomposition complete"
    );

    KarhunenLoeveResult::new(
        config.threshold,
        nodes,
        measure,
        output_dimension,
        eigenvalues,
        modes,
        total_trace,
    )
}

/// Unit norm under the measure, with ⟨φ, 1⟩ ≥ 0 as sign convention.
///
/// When ⟨φ, 1⟩ vanishes the largest sample is made positive instead.
fn normalize_mode(
    column: ArrayView1<f64>,
    measure: &Measure,
    n: usize,
    p: usize,
) -> KLResult<Array1<f64>> {
    let field = Array2::from_shape_fn((n, p), |(i, a)| column[i * p + a]);
    let weighted = measure.apply(field.view());
    let norm_sq = (&field * &weighted).sum();
    if !(norm_sq.is_finite() && norm_sq > 0.0) {
        return Err(KLError::numerical(format!(
            "Eigenvector has non-positive norm {:.6e} under the domain measure",
            norm_sq
        )));
    }
    let norm = norm_sq.sqrt();

    let mass = weighted.sum();
    let spread: f64 = weighted.iter().map(|v| v.abs()).sum();
    let sign = if mass.abs() > 1e-10 * spread {
        mass.signum()
    } else {
        let pivot = column
            .iter()
            .copied()
            .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if pivot < 0.0 {
            -1.0
        } else {
            1.0
        }
    };

    Ok(column.mapv(|v| sign * v / norm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance::AbsoluteExponential;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};

    fn kernel() -> AbsoluteExponential {
        AbsoluteExponential::new(vec![1.0], vec![1.0]).unwrap()
    }

    #[test]
    fn test_base_run_not_implemented() {
        let mut base = KarhunenLoeveBase::new(kernel(), 0.0).unwrap();
        assert!(matches!(base.run(), Err(KLError::NotImplemented(_))));
        assert_eq!(base.result().size(), 0);
    }

    #[test]
    fn test_threshold_accessors() {
        let mut base = KarhunenLoeveBase::new(kernel(), 0.1).unwrap();
        assert_eq!(base.threshold(), 0.1);
        base.set_threshold(0.25).unwrap();
        assert_eq!(base.threshold(), 0.25);

        assert!(matches!(base.set_threshold(1.0), Err(KLError::Configuration(_))));
        assert!(matches!(base.set_threshold(-0.5), Err(KLError::Configuration(_))));
        assert_eq!(base.threshold(), 0.25);

        assert!(KarhunenLoeveBase::new(kernel(), 2.0).is_err());
    }

    #[test]
    fn test_covariance_model_accessors() {
        let mut base = KarhunenLoeveBase::new(kernel(), 0.0).unwrap();
        let replacement = AbsoluteExponential::new(vec![0.5], vec![2.0]).unwrap();
        base.set_covariance_model(replacement.clone());
        assert_eq!(base.covariance_model(), &replacement);
    }

    #[test]
    fn test_max_modes_accessors() {
        let mut base = KarhunenLoeveBase::new(kernel(), 0.0).unwrap();
        assert_eq!(base.max_modes(), None);
        base.set_max_modes(Some(4)).unwrap();
        assert_eq!(base.max_modes(), Some(4));
        assert!(base.set_max_modes(Some(0)).is_err());
        assert_eq!(base.max_modes(), Some(4));
    }

    fn spectrum(values: Vec<f64>, samples: Array2<f64>) -> DiscreteSpectrum {
        DiscreteSpectrum {
            nodes: arr2(&[[0.0], [1.0]]),
            measure: Measure::Weights(arr1(&[0.5, 0.5])),
            output_dimension: 1,
            values: Array1::from(values),
            samples,
            total_trace: 3.0,
        }
    }

    #[test]
    fn test_postprocess_sorts_and_normalizes() {
        // Columns in ascending eigenvalue order with arbitrary scale and sign
        let samples = arr2(&[[3.0, -2.0], [-3.0, -2.0]]);
        let result = postprocess(
            spectrum(vec![1.0, 2.0], samples),
            &KarhunenLoeveConfig::default(),
        )
        .unwrap();

        assert_eq!(result.size(), 2);
        assert_abs_diff_eq!(result.eigenvalues()[0], 2.0, epsilon = 1e-15);
        assert_abs_diff_eq!(result.eigenvalues()[1], 1.0, epsilon = 1e-15);

        // Constant mode flipped to positive and scaled to unit norm
        let phi0 = result.eigenfunction(0).unwrap();
        assert_abs_diff_eq!(phi0[[0, 0]], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(phi0[[1, 0]], 1.0, epsilon = 1e-15);

        // Zero-mean mode: largest sample made positive
        let phi1 = result.eigenfunction(1).unwrap();
        assert_abs_diff_eq!(phi1[[0, 0]], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(phi1[[1, 0]], -1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_postprocess_rejects_indefinite() {
        let samples = arr2(&[[1.0, 1.0], [1.0, -1.0]]);
        let outcome = postprocess(
            spectrum(vec![1.0, -0.5], samples),
            &KarhunenLoeveConfig::default(),
        );
        assert!(matches!(outcome, Err(KLError::Numerical(_))));
    }

    #[test]
    fn test_postprocess_zero_spectrum() {
        let samples = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let result = postprocess(
            spectrum(vec![0.0, 0.0], samples),
            &KarhunenLoeveConfig::default(),
        )
        .unwrap();
        assert_eq!(result.size(), 0);
        assert_eq!(result.n_nodes(), 2);
    }
}
