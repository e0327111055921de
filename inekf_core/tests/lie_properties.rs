// inekf_core/tests/lie_properties.rs

use approx::assert_abs_diff_eq;
use inekf_core::prelude::*;
use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SAMPLES: usize = 25;

fn layouts() -> Vec<GroupLayout> {
    vec![
        GroupLayout::so2(0),
        GroupLayout::so3(1),
        GroupLayout::se2(1, 0),
        GroupLayout::se2(3, 2),
        GroupLayout::se3(1, 0),
        GroupLayout::se3(2, 3),
    ]
}

/// Uniform entries in `[-scale, scale)`. Rotation norms stay below `√3·scale`.
fn random_tangent(rng: &mut ChaCha8Rng, layout: &GroupLayout, scale: f64) -> TangentVector {
    DVector::from_fn(layout.dim(), |_, _| rng.gen_range(-scale..scale))
}

/// Group matrices only; augmentations do not take part in conjugation.
fn conjugate(g: &GroupState, x: &GroupState) -> DMatrix<f64> {
    g.mat() * x.mat() * g.inverse().mat()
}

#[test]
fn exp_log_round_trip_closed_form_branch() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for layout in layouts() {
        for _ in 0..SAMPLES {
            let xi = random_tangent(&mut rng, &layout, 1.0);
            let x = GroupState::exp(layout, &xi).unwrap();
            assert_abs_diff_eq!(x.log(), xi, epsilon = 1e-6);
        }
    }
}

#[test]
fn exp_log_round_trip_small_angle_branch() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for layout in layouts() {
        assert_abs_diff_eq!(
            GroupState::exp(layout, &DVector::zeros(layout.dim())).unwrap().log(),
            DVector::zeros(layout.dim()),
            epsilon = 1e-12
        );
        for _ in 0..SAMPLES {
            let xi = random_tangent(&mut rng, &layout, 1e-5);
            let x = GroupState::exp(layout, &xi).unwrap();
            assert_abs_diff_eq!(x.log(), xi, epsilon = 1e-6);
        }
    }
}

#[test]
fn adjoint_matches_conjugation() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for layout in layouts() {
        for _ in 0..SAMPLES {
            let g = GroupState::exp(layout, &random_tangent(&mut rng, &layout, 1.0)).unwrap();
            let delta = random_tangent(&mut rng, &layout, 1e-3);

            // g · Exp(δ) · g⁻¹ == Exp(Ad(g) δ)
            let lhs = conjugate(&g, &GroupState::exp(layout, &delta).unwrap());
            let rhs = GroupState::exp(layout, &(g.adjoint() * &delta)).unwrap();
            assert_abs_diff_eq!(&lhs, rhs.mat(), epsilon = 1e-9);
        }
    }
}

#[test]
fn adjoint_of_inverse_is_inverse_of_adjoint() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    for layout in layouts() {
        let g = GroupState::exp(layout, &random_tangent(&mut rng, &layout, 1.0)).unwrap();
        let product = g.adjoint() * g.inverse().adjoint();
        let n = layout.dim();
        assert_abs_diff_eq!(product, DMatrix::identity(n, n), epsilon = 1e-9);
    }
}

#[test]
fn inverse_composes_to_identity() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    for layout in layouts() {
        let g = GroupState::exp(layout, &random_tangent(&mut rng, &layout, 1.0)).unwrap();
        let id = g.compose(&g.inverse()).unwrap();
        let m = layout.mat_size();
        assert_abs_diff_eq!(id.mat(), &DMatrix::identity(m, m), epsilon = 1e-9);
    }
}

#[test]
fn illegal_composition() {
    let layout = GroupLayout::se3(1, 0);
    let a = GroupState::identity(layout)
        .with_covariance(DMatrix::identity(6, 6))
        .unwrap();
    let b = GroupState::se3(&nalgebra::Vector3::new(0.1, 0.2, 0.3), &nalgebra::Vector3::zeros())
        .with_covariance(DMatrix::identity(6, 6) * 2.0)
        .unwrap();
    assert!(matches!(a.compose(&b), Err(InekfError::InvalidComposition)));

    let certain = b.inverse();
    let ab = a.compose(&certain).unwrap();
    assert_eq!(ab.cov(), a.cov());
}
