//! Domain discretizations
//!
//! Two discretizations turn the continuous eigenproblem into a finite one:
//!
//! - [`QuadratureMesh`]: nodes x_i with positive weights w_i, so that
//!   ∫ f ≈ Σ_i w_i f(x_i) (Nyström method).
//! - [`P1Mesh`]: vertices and simplices carrying piecewise-linear hat
//!   functions, with the consistent mass matrix M_ij = ∫ φ_i φ_j.
//!
//! Both expose the inner product they induce on nodal fields as a
//! [`Measure`].

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{KLError, KLResult};
use crate::gauss::{Rule, legendre};

/// Inner product induced by a discretization on nodal fields
///
/// Fields are `N × p` arrays (one row per node). The inner product is
/// `⟨f, g⟩ = Σ_ij G_ij f_i · g_j` where `G` is diagonal for quadrature
/// meshes and the mass matrix for P1 meshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Measure {
    /// Diagonal quadrature weights
    Weights(Array1<f64>),
    /// Symmetric positive definite mass matrix
    Mass(Array2<f64>),
}

impl Default for Measure {
    fn default() -> Self {
        Measure::Weights(Array1::zeros(0))
    }
}

impl Measure {
    /// Number of nodes
    pub fn len(&self) -> usize {
        match self {
            Measure::Weights(w) => w.len(),
            Measure::Mass(m) => m.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply the Gram operator G to a nodal field
    pub fn apply(&self, field: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Measure::Weights(w) => {
                let mut out = field.to_owned();
                for (mut row, &wi) in out.axis_iter_mut(Axis(0)).zip(w.iter()) {
                    row *= wi;
                }
                out
            }
            Measure::Mass(m) => m.dot(&field),
        }
    }

    /// ⟨f, g⟩ for nodal fields of identical shape
    pub fn inner_product(&self, f: ArrayView2<f64>, g: ArrayView2<f64>) -> f64 {
        (&f * &self.apply(g)).sum()
    }

    /// Measure of the whole domain, ⟨1, 1⟩
    pub fn total(&self) -> f64 {
        match self {
            Measure::Weights(w) => w.sum(),
            Measure::Mass(m) => m.sum(),
        }
    }
}

/// Trait implemented by every domain discretization
pub trait Discretization {
    /// Dimension d of the domain
    fn dimension(&self) -> usize;

    /// Number of nodes N
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Node coordinates, `N × d`
    fn nodes(&self) -> ArrayView2<'_, f64>;

    /// Inner product on nodal fields
    fn measure(&self) -> Measure;
}

/// Weighted point set used by the Nyström discretization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadratureMesh {
    nodes: Array2<f64>,
    weights: Array1<f64>,
}

impl QuadratureMesh {
    /// Create a mesh from `N × d` nodes and N positive weights.
    pub fn new(nodes: Array2<f64>, weights: Array1<f64>) -> KLResult<Self> {
        let (n, d) = nodes.dim();
        if n == 0 || d == 0 {
            return Err(KLError::config(format!(
                "Quadrature mesh must have at least one node of positive dimension, got {}x{}",
                n, d
            )));
        }
        if weights.len() != n {
            return Err(KLError::config(format!(
                "Expected {} weights, got {}",
                n,
                weights.len()
            )));
        }
        if nodes.iter().any(|v| !v.is_finite()) {
            return Err(KLError::config("Quadrature nodes must be finite"));
        }
        if let Some(&w) = weights.iter().find(|&&w| !(w.is_finite() && w > 0.0)) {
            return Err(KLError::config(format!(
                "Quadrature weights must be positive, got {}",
                w
            )));
        }
        Ok(Self { nodes, weights })
    }

    /// One-dimensional mesh from a quadrature rule.
    pub fn from_rule(rule: &Rule) -> KLResult<Self> {
        check_rule(rule)?;
        let nodes = Array2::from_shape_vec((rule.len(), 1), rule.x.clone())
            .map_err(|e| KLError::config(e.to_string()))?;
        Self::new(nodes, Array1::from(rule.w.clone()))
    }

    /// n-point Gauss-Legendre mesh on [a, b].
    pub fn gauss_legendre(a: f64, b: f64, n: usize) -> KLResult<Self> {
        if !(a < b) {
            return Err(KLError::config(format!("Invalid interval [{}, {}]", a, b)));
        }
        Self::from_rule(&legendre(n).reseat(a, b))
    }

    /// Gauss-Legendre rule with `n_per_segment` points on each segment.
    pub fn piecewise_gauss_legendre(edges: &[f64], n_per_segment: usize) -> KLResult<Self> {
        Self::from_rule(&legendre(n_per_segment).piecewise(edges)?)
    }

    /// Tensor product of one-dimensional rules, one per input dimension.
    ///
    /// Nodes are ordered with the last dimension varying fastest.
    pub fn tensor_product(rules: &[Rule]) -> KLResult<Self> {
        if rules.is_empty() {
            return Err(KLError::config("Tensor product needs at least one rule"));
        }
        for rule in rules {
            check_rule(rule)?;
        }
        let d = rules.len();
        let n: usize = rules.iter().map(Rule::len).product();

        let mut nodes = Array2::zeros((n, d));
        let mut weights = Array1::ones(n);
        for flat in 0..n {
            let mut rem = flat;
            for dim in (0..d).rev() {
                let len = rules[dim].len();
                let idx = rem % len;
                rem /= len;
                nodes[[flat, dim]] = rules[dim].x[idx];
                weights[flat] *= rules[dim].w[idx];
            }
        }
        Self::new(nodes, weights)
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }
}

impl Discretization for QuadratureMesh {
    fn dimension(&self) -> usize {
        self.nodes.ncols()
    }

    fn len(&self) -> usize {
        self.nodes.nrows()
    }

    fn nodes(&self) -> ArrayView2<'_, f64> {
        self.nodes.view()
    }

    fn measure(&self) -> Measure {
        Measure::Weights(self.weights.clone())
    }
}

fn check_rule(rule: &Rule) -> KLResult<()> {
    if !rule.validate() {
        return Err(KLError::config(format!(
            "Invalid quadrature rule on [{}, {}] with {} points and {} weights",
            rule.a,
            rule.b,
            rule.x.len(),
            rule.w.len()
        )));
    }
    Ok(())
}

/// Simplicial mesh carrying P1 (piecewise-linear) finite elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P1Mesh {
    vertices: Array2<f64>,
    simplices: Vec<Vec<usize>>,
}

impl P1Mesh {
    /// Create a mesh from `N × d` vertices and simplices of d + 1 vertex
    /// indices each. Every vertex must belong to a non-degenerate simplex.
    pub fn new(vertices: Array2<f64>, simplices: Vec<Vec<usize>>) -> KLResult<Self> {
        let (n, d) = vertices.dim();
        if n == 0 || d == 0 {
            return Err(KLError::config(format!(
                "P1 mesh must have at least one vertex of positive dimension, got {}x{}",
                n, d
            )));
        }
        if simplices.is_empty() {
            return Err(KLError::config("P1 mesh must have at least one simplex"));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(KLError::config("Mesh vertices must be finite"));
        }

        let mut used = vec![false; n];
        for (s, simplex) in simplices.iter().enumerate() {
            if simplex.len() != d + 1 {
                return Err(KLError::config(format!(
                    "Simplex {} has {} vertices, expected {}",
                    s,
                    simplex.len(),
                    d + 1
                )));
            }
            for &v in simplex {
                if v >= n {
                    return Err(KLError::config(format!(
                        "Simplex {} references vertex {} out of {}",
                        s, v, n
                    )));
                }
                used[v] = true;
            }
        }
        if let Some(v) = used.iter().position(|&u| !u) {
            return Err(KLError::config(format!(
                "Vertex {} does not belong to any simplex",
                v
            )));
        }

        let mesh = Self {
            vertices,
            simplices,
        };
        for s in 0..mesh.simplices.len() {
            if mesh.simplex_volume(s) <= 0.0 {
                return Err(KLError::config(format!("Simplex {} is degenerate", s)));
            }
        }
        Ok(mesh)
    }

    /// One-dimensional mesh whose elements join consecutive vertices.
    pub fn from_interval_vertices(vertices: &[f64]) -> KLResult<Self> {
        if vertices.len() < 2 {
            return Err(KLError::config("Interval mesh needs at least 2 vertices"));
        }
        if vertices.windows(2).any(|pair| !(pair[1] > pair[0])) {
            return Err(KLError::config("Interval vertices must be strictly increasing"));
        }
        let coords = Array2::from_shape_vec((vertices.len(), 1), vertices.to_vec())
            .map_err(|e| KLError::config(e.to_string()))?;
        let simplices = (0..vertices.len() - 1).map(|i| vec![i, i + 1]).collect();
        Self::new(coords, simplices)
    }

    pub fn vertices(&self) -> &Array2<f64> {
        &self.vertices
    }

    pub fn simplices(&self) -> &[Vec<usize>] {
        &self.simplices
    }

    /// Volume of simplex `s`: |det(v1 - v0, …, vd - v0)| / d!
    pub fn simplex_volume(&self, s: usize) -> f64 {
        let simplex = &self.simplices[s];
        let d = self.vertices.ncols();
        let v0 = self.vertices.row(simplex[0]);
        let edges = DMatrix::from_fn(d, d, |i, j| self.vertices[[simplex[j + 1], i]] - v0[i]);
        let factorial: f64 = (1..=d).map(|k| k as f64).product();
        edges.determinant().abs() / factorial
    }

    /// Consistent P1 mass matrix
    ///
    /// On a d-simplex of volume V, ∫ φ_i φ_j = V (1 + δ_ij) / ((d + 1)(d + 2)).
    pub fn mass_matrix(&self) -> Array2<f64> {
        let n = self.vertices.nrows();
        let d = self.vertices.ncols() as f64;
        let mut mass = Array2::zeros((n, n));
        for (s, simplex) in self.simplices.iter().enumerate() {
            let factor = self.simplex_volume(s) / ((d + 1.0) * (d + 2.0));
            for &i in simplex {
                for &j in simplex {
                    mass[[i, j]] += if i == j { 2.0 * factor } else { factor };
                }
            }
        }
        mass
    }
}

impl Discretization for P1Mesh {
    fn dimension(&self) -> usize {
        self.vertices.ncols()
    }

    fn len(&self) -> usize {
        self.vertices.nrows()
    }

    fn nodes(&self) -> ArrayView2<'_, f64> {
        self.vertices.view()
    }

    fn measure(&self) -> Measure {
        Measure::Mass(self.mass_matrix())
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod mesh_tests;
