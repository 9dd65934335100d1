use super::*;
use approx::assert_abs_diff_eq;
use ndarray::{arr1, arr2};

#[test]
fn test_gauss_legendre_mesh() {
    let mesh = QuadratureMesh::gauss_legendre(0.0, 1.0, 50).unwrap();
    assert_eq!(mesh.len(), 50);
    assert_eq!(mesh.dimension(), 1);
    assert_abs_diff_eq!(mesh.measure().total(), 1.0, epsilon = 1e-13);
    assert!(mesh.nodes().iter().all(|&x| x > 0.0 && x < 1.0));
}

#[test]
fn test_quadrature_mesh_validation() {
    let nodes = arr2(&[[0.0], [1.0]]);
    assert!(QuadratureMesh::new(nodes.clone(), arr1(&[0.5])).is_err());
    assert!(QuadratureMesh::new(nodes.clone(), arr1(&[0.5, -0.5])).is_err());
    assert!(QuadratureMesh::new(Array2::zeros((0, 1)), arr1(&[])).is_err());
    assert!(QuadratureMesh::new(nodes, arr1(&[0.5, 0.5])).is_ok());
    assert!(QuadratureMesh::gauss_legendre(1.0, 0.0, 4).is_err());
}

#[test]
fn test_tensor_product_mesh() {
    let rule_x = legendre(3).reseat(0.0, 2.0);
    let rule_y = legendre(4).reseat(0.0, 1.0);
    let mesh = QuadratureMesh::tensor_product(&[rule_x.clone(), rule_y.clone()]).unwrap();

    assert_eq!(mesh.len(), 12);
    assert_eq!(mesh.dimension(), 2);
    assert_abs_diff_eq!(mesh.measure().total(), 2.0, epsilon = 1e-13);

    // Last dimension varies fastest
    assert_abs_diff_eq!(mesh.nodes()[[0, 0]], rule_x.x[0], epsilon = 1e-15);
    assert_abs_diff_eq!(mesh.nodes()[[1, 0]], rule_x.x[0], epsilon = 1e-15);
    assert_abs_diff_eq!(mesh.nodes()[[1, 1]], rule_y.x[1], epsilon = 1e-15);

    // ∫∫ x y dx dy over [0,2]x[0,1] = 2 * 0.5
    let integral: f64 = mesh
        .nodes()
        .outer_iter()
        .zip(mesh.weights().iter())
        .map(|(p, &w)| w * p[0] * p[1])
        .sum();
    assert_abs_diff_eq!(integral, 1.0, epsilon = 1e-13);
}

#[test]
fn test_invalid_rule_rejected() {
    let unordered = Rule {
        x: vec![0.7, 0.2],
        w: vec![0.5, 0.5],
        a: 0.0,
        b: 1.0,
    };
    assert!(matches!(
        QuadratureMesh::from_rule(&unordered),
        Err(KLError::Configuration(_))
    ));

    // Points and weights of different lengths
    let ragged = Rule {
        x: vec![0.2, 0.7],
        w: vec![1.0],
        a: 0.0,
        b: 1.0,
    };
    let good = legendre(2).reseat(0.0, 1.0);
    assert!(matches!(
        QuadratureMesh::tensor_product(&[good, ragged]),
        Err(KLError::Configuration(_))
    ));
}

#[test]
fn test_weights_measure_inner_product() {
    let measure = Measure::Weights(arr1(&[0.25, 0.5, 0.25]));
    let f = arr2(&[[1.0], [2.0], [3.0]]);
    let g = arr2(&[[1.0], [1.0], [1.0]]);
    assert_abs_diff_eq!(measure.inner_product(f.view(), g.view()), 2.0, epsilon = 1e-15);
    assert_abs_diff_eq!(measure.total(), 1.0, epsilon = 1e-15);
}

#[test]
fn test_interval_mass_matrix() {
    let mesh = P1Mesh::from_interval_vertices(&[0.0, 0.5, 1.0]).unwrap();
    let mass = mesh.mass_matrix();

    // Element of length h contributes h/3 on the diagonal and h/6 off it
    assert_abs_diff_eq!(mass[[0, 0]], 0.5 / 3.0, epsilon = 1e-15);
    assert_abs_diff_eq!(mass[[1, 1]], 1.0 / 3.0, epsilon = 1e-15);
    assert_abs_diff_eq!(mass[[0, 1]], 0.5 / 6.0, epsilon = 1e-15);
    assert_abs_diff_eq!(mass[[0, 2]], 0.0, epsilon = 1e-15);
    assert_abs_diff_eq!(mass.sum(), 1.0, epsilon = 1e-15);
}

#[test]
fn test_triangle_mass_matrix() {
    // Unit square split into two triangles
    let vertices = arr2(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
    let mesh = P1Mesh::new(vertices, vec![vec![0, 1, 2], vec![0, 2, 3]]).unwrap();

    assert_abs_diff_eq!(mesh.simplex_volume(0), 0.5, epsilon = 1e-15);
    let mass = mesh.mass_matrix();
    assert_abs_diff_eq!(mass.sum(), 1.0, epsilon = 1e-14);
    assert_abs_diff_eq!(mass[[1, 1]], 0.5 / 6.0, epsilon = 1e-15);
    assert_abs_diff_eq!(mass[[0, 2]], 2.0 * 0.5 / 12.0, epsilon = 1e-15);
}

#[test]
fn test_p1_mesh_validation() {
    assert!(P1Mesh::from_interval_vertices(&[0.0]).is_err());
    assert!(P1Mesh::from_interval_vertices(&[0.0, 0.0, 1.0]).is_err());

    let vertices = arr2(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
    // Collinear triangle
    assert!(P1Mesh::new(vertices.clone(), vec![vec![0, 1, 2]]).is_err());
    // Wrong arity
    assert!(P1Mesh::new(vertices.clone(), vec![vec![0, 1]]).is_err());
    // Out of range index
    assert!(P1Mesh::new(vertices, vec![vec![0, 1, 5]]).is_err());

    // Orphan vertex
    let vertices = arr2(&[[0.0], [1.0], [2.0]]);
    assert!(P1Mesh::new(vertices, vec![vec![0, 1]]).is_err());
}
