//! Gauss quadrature rules for numerical integration
//!
//! The integral of f(x) over [a, b] is approximated by a weighted sum:
//!
//! sum(f(xi) * wi for (xi, wi) in zip(x, w))
//!
//! which converges superexponentially for smooth f(x) with the number of
//! quadrature points. These rules are the nodes and weights of the Nyström
//! discretization of covariance operators.

use crate::error::{KLError, KLResult};

/// Quadrature rule for numerical integration.
///
/// Represents an approximation of an integral by a weighted sum over
/// discrete points `x` with weights `w` on the interval `[a, b]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Quadrature points, non-decreasing
    pub x: Vec<f64>,
    /// Quadrature weights
    pub w: Vec<f64>,
    /// Left endpoint of integration interval
    pub a: f64,
    /// Right endpoint of integration interval
    pub b: f64,
}

impl Rule {
    /// Create a new quadrature rule from points and weights.
    pub fn new(x: Vec<f64>, w: Vec<f64>, a: f64, b: f64) -> KLResult<Self> {
        if x.len() != w.len() {
            return Err(KLError::config(format!(
                "x and w must have the same length, got {} and {}",
                x.len(),
                w.len()
            )));
        }
        Ok(Self { x, w, a, b })
    }

    /// A rule with no points on [-1, 1].
    pub fn empty() -> Self {
        Self {
            x: vec![],
            w: vec![],
            a: -1.0,
            b: 1.0,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Reseat the rule to a new interval [a, b].
    ///
    /// Scales and translates the quadrature points and weights.
    pub fn reseat(&self, a: f64, b: f64) -> Self {
        let scaling = (b - a) / (self.b - self.a);
        let midpoint_old = 0.5 * (self.b + self.a);
        let midpoint_new = 0.5 * (b + a);

        Self {
            x: self
                .x
                .iter()
                .map(|&xi| scaling * (xi - midpoint_old) + midpoint_new)
                .collect(),
            w: self.w.iter().map(|&wi| wi * scaling).collect(),
            a,
            b,
        }
    }

    /// Create a piecewise rule over multiple segments.
    ///
    /// `edges` are the segment boundaries and must be strictly increasing.
    pub fn piecewise(&self, edges: &[f64]) -> KLResult<Self> {
        if edges.len() < 2 {
            return Err(KLError::config("edges must have at least 2 elements"));
        }
        if edges.windows(2).any(|pair| !(pair[1] > pair[0])) {
            return Err(KLError::config("edges must be sorted in ascending order"));
        }

        let rules: Vec<Self> = edges
            .windows(2)
            .map(|pair| self.reseat(pair[0], pair[1]))
            .collect();
        Self::join(&rules)
    }

    /// Join contiguous rules into a single rule.
    pub fn join(rules: &[Self]) -> KLResult<Self> {
        let (first, last) = match (rules.first(), rules.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Ok(Self::empty()),
        };

        for pair in rules.windows(2) {
            let gap = (pair[1].a - pair[0].b).abs();
            if gap > f64::EPSILON * pair[0].b.abs().max(1.0) {
                return Err(KLError::config("rules must be contiguous"));
            }
        }

        let mut points: Vec<(f64, f64)> = rules
            .iter()
            .flat_map(|rule| rule.x.iter().copied().zip(rule.w.iter().copied()))
            .collect();
        points.sort_by(|p, q| p.0.total_cmp(&q.0));

        let (x, w) = points.into_iter().unzip();
        Ok(Self {
            x,
            w,
            a: first.a,
            b: last.b,
        })
    }

    /// Check interval, lengths, containment and ordering.
    pub fn validate(&self) -> bool {
        if !(self.a < self.b) {
            return false;
        }
        if self.x.len() != self.w.len() {
            return false;
        }
        if self.x.iter().any(|&xi| xi < self.a || xi > self.b) {
            return false;
        }
        self.x.windows(2).all(|pair| pair[1] > pair[0])
    }
}

/// Compute Legendre polynomial P_n(x) and its derivative using the
/// three-term recurrence.
pub(crate) fn legendre_polynomial_and_derivative(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }

    let mut p0 = 1.0;
    let mut p1 = x;
    let mut dp0 = 0.0;
    let mut dp1 = 1.0;

    for k in 2..=n {
        let k_f = k as f64;
        let k1_f = (k - 1) as f64;

        let p2 = ((2.0 * k1_f + 1.0) * x * p1 - k1_f * p0) / k_f;
        let dp2 = ((2.0 * k1_f + 1.0) * (p1 + x * dp1) - k1_f * dp0) / k_f;

        p0 = p1;
        p1 = p2;
        dp0 = dp1;
        dp1 = dp2;
    }

    (p1, dp1)
}

/// Gauss-Legendre nodes and weights on [-1, 1], ascending.
fn gauss_legendre_nodes_weights(n: usize) -> (Vec<f64>, Vec<f64>) {
    if n == 1 {
        return (vec![0.0], vec![2.0]);
    }

    let mut points = Vec::with_capacity(n);
    let pi = std::f64::consts::PI;

    // Roots are symmetric, so only the first half is refined
    for i in 0..n.div_ceil(2) {
        // Chebyshev-like initial guess
        let mut z = (pi * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();

        for _ in 0..100 {
            let (p, dp) = legendre_polynomial_and_derivative(n, z);
            let step = p / dp;
            z -= step;
            if step.abs() <= f64::EPSILON * z.abs().max(1.0) {
                break;
            }
        }

        let (_, dp) = legendre_polynomial_and_derivative(n, z);
        let weight = 2.0 / ((1.0 - z * z) * dp * dp);

        points.push((-z, weight));
        if i != n - 1 - i {
            points.push((z, weight));
        }
    }

    points.sort_by(|p, q| p.0.total_cmp(&q.0));
    points.into_iter().unzip()
}

/// Create a Gauss-Legendre quadrature rule with n points on [-1, 1].
pub fn legendre(n: usize) -> Rule {
    if n == 0 {
        return Rule::empty();
    }
    let (x, w) = gauss_legendre_nodes_weights(n);
    Rule { x, w, a: -1.0, b: 1.0 }
}

#[cfg(test)]
#[path = "gauss_tests.rs"]
mod gauss_tests;
