//! Common test utilities
#![allow(dead_code)]

use kl_rust::*;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a test subscriber honoring RUST_LOG; later calls are no-ops
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_test_writer())
        .try_init();
}

/// Kernel that vanishes everywhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroKernel {
    pub dimension: usize,
}

impl CovarianceKernel for ZeroKernel {
    fn input_dimension(&self) -> usize {
        self.dimension
    }

    fn output_dimension(&self) -> usize {
        1
    }

    fn evaluate(&self, _s: ArrayView1<f64>, _t: ArrayView1<f64>) -> Array2<f64> {
        Array2::zeros((1, 1))
    }
}

/// C(s, t) = exp(-(s - t)), not symmetric
#[derive(Debug, Clone)]
pub struct SkewKernel;

impl CovarianceKernel for SkewKernel {
    fn input_dimension(&self) -> usize {
        1
    }

    fn output_dimension(&self) -> usize {
        1
    }

    fn evaluate(&self, s: ArrayView1<f64>, t: ArrayView1<f64>) -> Array2<f64> {
        Array2::from_elem((1, 1), (-(s[0] - t[0])).exp())
    }
}

/// C(s, t) = cos(π (s + t)): symmetric with eigenvalues ±1/2 on [0, 1]
#[derive(Debug, Clone)]
pub struct IndefiniteKernel;

impl CovarianceKernel for IndefiniteKernel {
    fn input_dimension(&self) -> usize {
        1
    }

    fn output_dimension(&self) -> usize {
        1
    }

    fn evaluate(&self, s: ArrayView1<f64>, t: ArrayView1<f64>) -> Array2<f64> {
        Array2::from_elem((1, 1), (PI * (s[0] + t[0])).cos())
    }
}

/// exp(-|s - t|) with unit amplitude and correlation length
pub fn unit_exponential() -> AbsoluteExponential {
    AbsoluteExponential::new(vec![1.0], vec![1.0]).unwrap()
}

/// Leading eigenvalues of exp(-|s - t|) on [0, 1].
///
/// λ_k = 2 / (1 + ω_k²) where ω_k is the k-th positive root of
/// (1 - ω²) sin ω - 2 ω cos ω, one root per interval (kπ, (k+1)π).
pub fn exponential_kernel_eigenvalues(count: usize) -> Vec<f64> {
    let f = |w: f64| (1.0 - w * w) * w.sin() - 2.0 * w * w.cos();
    (0..count)
        .map(|k| {
            let mut lo = if k == 0 { 1e-6 } else { k as f64 * PI };
            let mut hi = (k + 1) as f64 * PI;
            let f_lo = f(lo);
            for _ in 0..200 {
                let mid = 0.5 * (lo + hi);
                if f(mid) * f_lo > 0.0 {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            let omega = 0.5 * (lo + hi);
            2.0 / (1.0 + omega * omega)
        })
        .collect()
}

/// Largest deviation of the Gram matrix of the retained modes from identity
pub fn orthonormality_defect(result: &KarhunenLoeveResult) -> f64 {
    let phis = result.eigenfunctions();
    let mut defect = 0.0f64;
    for (i, phi_i) in phis.iter().enumerate() {
        for (j, phi_j) in phis.iter().enumerate() {
            let expected = if i == j { 1.0 } else { 0.0 };
            let ip = result.inner_product(phi_i.view(), phi_j.view()).unwrap();
            defect = defect.max((ip - expected).abs());
        }
    }
    defect
}

/// Structured triangulation of the unit square with n × n cells
pub fn unit_square_p1(n: usize) -> P1Mesh {
    let h = 1.0 / n as f64;
    let side = n + 1;
    let vertices = Array2::from_shape_fn((side * side, 2), |(v, axis)| {
        let (i, j) = (v / side, v % side);
        if axis == 0 {
            i as f64 * h
        } else {
            j as f64 * h
        }
    });
    let mut simplices = Vec::with_capacity(2 * n * n);
    for i in 0..n {
        for j in 0..n {
            let v00 = i * side + j;
            let v10 = (i + 1) * side + j;
            let v01 = i * side + j + 1;
            let v11 = (i + 1) * side + j + 1;
            simplices.push(vec![v00, v10, v11]);
            simplices.push(vec![v00, v11, v01]);
        }
    }
    P1Mesh::new(vertices, simplices).unwrap()
}
