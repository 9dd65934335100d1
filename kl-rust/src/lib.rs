//! # kl-rust: Karhunen-Loeve decomposition of covariance kernels
//!
//! Computes the truncated spectral expansion of a (possibly vector-valued)
//! covariance kernel over a discretized domain, and uses it to project random
//! fields onto the dominant modes and to lift mode coefficients back to
//! nodal fields.

pub mod algorithm; // Engine contract and shared post-processing
pub mod config;
pub mod covariance;
pub mod eigen; // Symmetric (generalized) eigensolver seam
pub mod error;
pub mod gauss;
pub mod kernelmatrix;
pub mod mesh;
pub mod p1; // Finite-element (Galerkin) engine
pub mod persistence;
pub mod quadrature; // Nyström engine
pub mod result;
pub mod truncation;

// Re-export commonly used types and traits
pub use algorithm::{AlgorithmState, KarhunenLoeveAlgorithm, KarhunenLoeveBase};
pub use config::KarhunenLoeveConfig;
pub use covariance::{
    AbsoluteExponential, CovarianceKernel, CovarianceModel, SquaredExponential,
    StationaryParameters,
};
pub use eigen::{EigenDecomposition, EigenSolver, SymmetricEigenSolver};
pub use error::{KLError, KLResult};
pub use gauss::{Rule, legendre};
pub use kernelmatrix::{DiscretizedKernel, matrix_from_nodes};
pub use mesh::{Discretization, Measure, P1Mesh, QuadratureMesh};
pub use p1::KarhunenLoeveP1;
pub use persistence::{FORMAT_VERSION, JsonStorage, Persistent, Storage};
pub use quadrature::KarhunenLoeveQuadrature;
pub use result::KarhunenLoeveResult;
pub use truncation::truncate;
