// inekf_core/src/lie/so2.rs

//! Closed forms for planar rotations, SO(2).

use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

use super::{RotationAlgebra, SMALL_ANGLE};

/// Marker for the 2x2 rotation block of SO(2) / SE(2).
#[derive(Debug, Clone, Copy)]
pub struct So2;

/// `[[0, -θ], [θ, 0]]`
pub fn wedge(theta: f64) -> Matrix2<f64> {
    Matrix2::new(0.0, -theta, theta, 0.0)
}

/// Rotation matrix for angle `theta` (radians).
pub fn exp(theta: f64) -> Matrix2<f64> {
    let (s, c) = theta.sin_cos();
    Matrix2::new(c, -s, s, c)
}

/// Angle of a rotation matrix, in `(-π, π]`.
pub fn log(r: &Matrix2<f64>) -> f64 {
    r[(1, 0)].atan2(r[(0, 0)])
}

/// The matrix `V(θ)` mapping translational tangent components to group columns.
pub fn left_jacobian(theta: f64) -> Matrix2<f64> {
    if theta.abs() < SMALL_ANGLE {
        let a = 1.0 - theta * theta / 6.0;
        let b = theta / 2.0;
        Matrix2::new(a, -b, b, a)
    } else {
        let (s, c) = theta.sin_cos();
        let a = s / theta;
        let b = (1.0 - c) / theta;
        Matrix2::new(a, -b, b, a)
    }
}

/// Inverse of [`left_jacobian`].
pub fn left_jacobian_inv(theta: f64) -> Matrix2<f64> {
    let half = theta / 2.0;
    let a = if theta.abs() < SMALL_ANGLE {
        1.0 - theta * theta / 12.0
    } else {
        let (s, c) = theta.sin_cos();
        half * s / (1.0 - c)
    };
    Matrix2::new(a, half, -half, a)
}

fn as_matrix2(r: &DMatrix<f64>) -> Matrix2<f64> {
    Matrix2::new(r[(0, 0)], r[(0, 1)], r[(1, 0)], r[(1, 1)])
}

impl RotationAlgebra for So2 {
    const SIZE: usize = 2;
    const DIM: usize = 1;

    fn wedge(phi: &[f64]) -> DMatrix<f64> {
        DMatrix::from_column_slice(2, 2, wedge(phi[0]).as_slice())
    }

    fn exp(phi: &[f64]) -> DMatrix<f64> {
        DMatrix::from_column_slice(2, 2, exp(phi[0]).as_slice())
    }

    fn log(r: &DMatrix<f64>) -> DVector<f64> {
        DVector::from_element(1, log(&as_matrix2(r)))
    }

    fn left_jacobian(phi: &[f64]) -> DMatrix<f64> {
        DMatrix::from_column_slice(2, 2, left_jacobian(phi[0]).as_slice())
    }

    fn left_jacobian_inv(phi: &[f64]) -> DMatrix<f64> {
        DMatrix::from_column_slice(2, 2, left_jacobian_inv(phi[0]).as_slice())
    }

    fn adjoint(_r: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::identity(1, 1)
    }

    // -J t, with J the 90 degree rotation generator.
    fn coupling(_r: &DMatrix<f64>, t: &[f64]) -> DMatrix<f64> {
        let t = Vector2::new(t[0], t[1]);
        DMatrix::from_column_slice(2, 1, &[t.y, -t.x])
    }
}
