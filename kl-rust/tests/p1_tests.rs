//! Tests for the P1 finite-element engine

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use kl_rust::*;

fn uniform_interval(n_cells: usize) -> P1Mesh {
    let vertices: Vec<f64> = (0..=n_cells).map(|i| i as f64 / n_cells as f64).collect();
    P1Mesh::from_interval_vertices(&vertices).unwrap()
}

#[test]
fn test_p1_agrees_with_quadrature() {
    init_tracing();
    let mut fem = KarhunenLoeveP1::new(unit_exponential(), uniform_interval(100), 0.01).unwrap();
    fem.run().unwrap();

    let mesh = QuadratureMesh::gauss_legendre(0.0, 1.0, 50).unwrap();
    let mut nystrom = KarhunenLoeveQuadrature::new(unit_exponential(), mesh, 0.01).unwrap();
    nystrom.run().unwrap();

    let exact = exponential_kernel_eigenvalues(3);
    for k in 0..3 {
        let a = fem.result().eigenvalues()[k];
        let b = nystrom.result().eigenvalues()[k];
        assert!((a - b).abs() / b < 1e-2, "mode {}: P1 {} vs quadrature {}", k, a, b);
        assert!((a - exact[k]).abs() / exact[k] < 1e-2);
    }
}

#[test]
fn test_p1_modes_orthonormal_under_mass() {
    let mut fem = KarhunenLoeveP1::new(unit_exponential(), uniform_interval(40), 0.001).unwrap();
    fem.run().unwrap();
    let result = fem.result();

    assert!(matches!(result.measure(), Measure::Mass(_)));
    assert_eq!(result.n_nodes(), 41);
    assert!(orthonormality_defect(result) < 1e-6);

    let e = result.eigenvalues();
    for pair in e.windows(2) {
        assert!(pair[0] >= pair[1]);
    }

    let phi0 = result.eigenfunction(0).unwrap();
    assert!(phi0.iter().all(|&v| v > 0.0));
}

#[test]
fn test_p1_full_spectrum_trace() {
    let mut fem = KarhunenLoeveP1::new(unit_exponential(), uniform_interval(20), 0.0).unwrap();
    fem.run().unwrap();
    let result = fem.result();

    assert_eq!(result.size(), 21);
    assert_abs_diff_eq!(
        result.eigenvalues().sum(),
        result.total_trace(),
        epsilon = 1e-10
    );
    // Interpolating the kernel lowers tr(C M) below ∫ C(s, s) ds = 1 by O(h)
    assert_abs_diff_eq!(result.total_trace(), 1.0, epsilon = 5e-2);
    assert_abs_diff_eq!(
        result.covariance_trace(),
        result.eigenvalues().sum(),
        epsilon = 1e-10
    );
}

#[test]
fn test_p1_project_lift_idempotent() {
    let mut fem = KarhunenLoeveP1::new(unit_exponential(), uniform_interval(30), 0.01).unwrap();
    fem.run().unwrap();
    let result = fem.result();

    let field = ndarray::Array2::from_shape_fn((31, 1), |(i, _)| (i as f64 / 30.0).powi(2));
    let lifted = result.lift(result.project(field.view()).unwrap().view()).unwrap();
    let again = result.lift(result.project(lifted.view()).unwrap().view()).unwrap();
    for (a, b) in again.iter().zip(lifted.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-10);
    }
}

#[test]
fn test_p1_unit_square() {
    let kernel = SquaredExponential::new(vec![0.5, 0.5], vec![1.0]).unwrap();
    let mut fem = KarhunenLoeveP1::new(kernel.clone(), unit_square_p1(20), 0.01).unwrap();
    fem.run().unwrap();

    let rule = legendre(12).reseat(0.0, 1.0);
    let square = QuadratureMesh::tensor_product(&[rule.clone(), rule]).unwrap();
    let mut nystrom = KarhunenLoeveQuadrature::new(kernel, square, 0.01).unwrap();
    nystrom.run().unwrap();

    let a = fem.result().eigenvalues()[0];
    let b = nystrom.result().eigenvalues()[0];
    assert!((a - b).abs() / b < 1e-2, "P1 {} vs quadrature {}", a, b);
    assert!(orthonormality_defect(fem.result()) < 1e-6);
}

#[test]
fn test_p1_zero_kernel() {
    let mut fem = KarhunenLoeveP1::new(ZeroKernel { dimension: 1 }, uniform_interval(5), 0.0).unwrap();
    fem.run().unwrap();
    assert!(fem.result().is_empty());
    assert_eq!(fem.result().n_nodes(), 6);
}

#[test]
fn test_p1_dimension_mismatch() {
    let kernel = AbsoluteExponential::new(vec![1.0, 1.0], vec![1.0]).unwrap();
    let mut fem = KarhunenLoeveP1::new(kernel, uniform_interval(5), 0.0).unwrap();
    assert!(matches!(fem.run(), Err(KLError::Configuration(_))));
}

#[test]
fn test_display() {
    let fem = KarhunenLoeveP1::new(unit_exponential(), uniform_interval(4), 0.1).unwrap();
    let text = fem.to_string();
    assert!(text.contains("vertices=5"));
    assert!(text.contains("simplices=4"));
}
