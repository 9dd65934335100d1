//! Truncation policy
//!
//! Given eigenvalues E_0 ≥ E_1 ≥ … ≥ 0 and a threshold τ ∈ [0, 1), the
//! retained count K is the length of the longest prefix satisfying both
//!
//! - E_k > ε · E_0 (numerical zero filter), and
//! - E_k / E_0 ≥ τ (ratio to the dominant eigenvalue),
//!
//! optionally capped by `max_modes`. When E_0 is not a positive normal
//! number the kernel is numerically zero and K = 0. K is non-increasing in τ.

/// Select the number of retained modes from eigenvalues sorted non-increasing
pub fn truncate(
    eigenvalues: &[f64],
    threshold: f64,
    zero_tolerance: f64,
    max_modes: Option<usize>,
) -> usize {
    let e0 = match eigenvalues.first() {
        Some(&e0) if e0 >= f64::MIN_POSITIVE => e0,
        _ => return 0,
    };

    let floor = zero_tolerance * e0;
    let mut cut = 0;
    for &val in eigenvalues {
        if val > floor && val / e0 >= threshold {
            cut += 1;
        } else {
            break;
        }
    }

    if let Some(max) = max_modes {
        cut = cut.min(max);
    }
    cut
}
