//! Error types for Karhunen-Loeve computations

/// Errors raised by decomposition engines, results and persistence
#[derive(Debug, thiserror::Error)]
pub enum KLError {
    /// Invalid threshold, zero or mismatched dimensions, malformed mesh
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Solver failure or a kernel that fails a symmetry/positivity check
    #[error("Numerical error: {0}")]
    Numerical(String),
    /// `run()` called on an engine that has no discretization strategy
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    /// Missing or inconsistent stored fields
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate
pub type KLResult<T> = Result<T, KLError>;

impl KLError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        KLError::Configuration(msg.into())
    }

    pub(crate) fn numerical(msg: impl Into<String>) -> Self {
        KLError::Numerical(msg.into())
    }
}
