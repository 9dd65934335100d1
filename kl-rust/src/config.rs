//! Engine configuration
//!
//! Mirrors the plain configuration structs used by the truncated SVD code
//! (`TSVDConfig`): a small value type with defaults, builder methods and an
//! explicit `validate()`.

use serde::{Deserialize, Serialize};

use crate::error::{KLError, KLResult};

/// Default relative tolerance below which eigenvalues count as zero
pub const DEFAULT_ZERO_TOLERANCE: f64 = 1e-12;

/// Default relative tolerance for the kernel-matrix symmetry check
pub const DEFAULT_SYMMETRY_TOLERANCE: f64 = 1e-8;

/// Default relative tolerance for negative eigenvalues
pub const DEFAULT_PSD_TOLERANCE: f64 = 1e-8;

/// Configuration shared by every decomposition engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KarhunenLoeveConfig {
    /// Truncation threshold τ in [0, 1)
    pub threshold: f64,
    /// Optional hard cap on the number of retained modes
    pub max_modes: Option<usize>,
    /// Eigenvalues `E_k <= zero_tolerance * E_0` are discarded
    pub zero_tolerance: f64,
    /// Allowed `max|C - C^T| / max|C|` of the assembled kernel matrix
    pub symmetry_tolerance: f64,
    /// Allowed `-E_min / E_0` before the kernel is rejected as indefinite
    pub psd_tolerance: f64,
}

impl Default for KarhunenLoeveConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            max_modes: None,
            zero_tolerance: DEFAULT_ZERO_TOLERANCE,
            symmetry_tolerance: DEFAULT_SYMMETRY_TOLERANCE,
            psd_tolerance: DEFAULT_PSD_TOLERANCE,
        }
    }
}

impl KarhunenLoeveConfig {
    pub fn new(threshold: f64) -> KLResult<Self> {
        let config = Self {
            threshold,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_modes(mut self, max_modes: Option<usize>) -> Self {
        self.max_modes = max_modes;
        self
    }

    pub fn with_zero_tolerance(mut self, zero_tolerance: f64) -> Self {
        self.zero_tolerance = zero_tolerance;
        self
    }

    pub fn with_symmetry_tolerance(mut self, symmetry_tolerance: f64) -> Self {
        self.symmetry_tolerance = symmetry_tolerance;
        self
    }

    pub fn with_psd_tolerance(mut self, psd_tolerance: f64) -> Self {
        self.psd_tolerance = psd_tolerance;
        self
    }

    /// Check every field, returning the first violation
    pub fn validate(&self) -> KLResult<()> {
        validate_threshold(self.threshold)?;
        for (name, value) in [
            ("zero_tolerance", self.zero_tolerance),
            ("symmetry_tolerance", self.symmetry_tolerance),
            ("psd_tolerance", self.psd_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(KLError::config(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.max_modes == Some(0) {
            return Err(KLError::config("max_modes must be positive when set"));
        }
        Ok(())
    }
}

/// The threshold must lie in [0, 1)
pub fn validate_threshold(threshold: f64) -> KLResult<()> {
    if threshold.is_finite() && (0.0..1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(KLError::config(format!(
            "Threshold must be in [0, 1), got {}",
            threshold
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = KarhunenLoeveConfig::default();
        assert_eq!(config.threshold, 0.0);
        assert!(config.max_modes.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(0.999).is_ok());
        assert!(matches!(validate_threshold(1.0), Err(KLError::Configuration(_))));
        assert!(matches!(validate_threshold(-1e-3), Err(KLError::Configuration(_))));
        assert!(matches!(validate_threshold(f64::NAN), Err(KLError::Configuration(_))));
    }

    #[test]
    fn test_invalid_fields_rejected() {
        let config = KarhunenLoeveConfig::default().with_zero_tolerance(-1.0);
        assert!(config.validate().is_err());

        let config = KarhunenLoeveConfig::default().with_max_modes(Some(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: KarhunenLoeveConfig =
            serde_json::from_str(r#"{ "threshold": 0.05, "max_modes": 8 }"#).unwrap();
        assert_eq!(config.threshold, 0.05);
        assert_eq!(config.max_modes, Some(8));
        assert_eq!(config.zero_tolerance, DEFAULT_ZERO_TOLERANCE);
    }
}
