// inekf_core/src/lie/so3.rs

//! Closed forms for spatial rotations, SO(3). Rodrigues' formula with
//! series fallbacks near the identity.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use std::f64::consts::PI;

use super::{RotationAlgebra, SMALL_ANGLE};

/// Marker for the 3x3 rotation block of SO(3) / SE(3).
#[derive(Debug, Clone, Copy)]
pub struct So3;

/// Skew-symmetric matrix such that `wedge(w) * v == w.cross(v)`.
pub fn wedge(w: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -w.z, w.y, w.z, 0.0, -w.x, -w.y, w.x, 0.0)
}

/// Inverse of [`wedge`] for a skew-symmetric matrix.
pub fn vee(k: &Matrix3<f64>) -> Vector3<f64> {
    Vector3::new(k[(2, 1)], k[(0, 2)], k[(1, 0)])
}

/// Rotation matrix for the axis-angle vector `w`.
pub fn exp(w: &Vector3<f64>) -> Matrix3<f64> {
    let theta = w.norm();
    let k = wedge(w);
    let k2 = k * k;
    if theta < SMALL_ANGLE {
        Matrix3::identity() + k + k2 * 0.5
    } else {
        let (s, c) = theta.sin_cos();
        Matrix3::identity() + k * (s / theta) + k2 * ((1.0 - c) / (theta * theta))
    }
}

/// Axis-angle vector of a rotation matrix.
pub fn log(r: &Matrix3<f64>) -> Vector3<f64> {
    let cos_theta = ((r.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    let skew = vee(&(r - r.transpose()));

    if theta < SMALL_ANGLE {
        return skew * 0.5;
    }

    if PI - theta < SMALL_ANGLE {
        // sin(θ) vanishes, recover the axis from the symmetric part instead.
        let b = (r + Matrix3::identity()) * 0.5;
        let i = (0..3)
            .max_by(|&a, &c| b[(a, a)].total_cmp(&b[(c, c)]))
            .unwrap_or(0);
        let mut axis: Vector3<f64> = b.column(i).into_owned() / b[(i, i)].max(0.0).sqrt();
        if axis.dot(&skew) < 0.0 {
            axis = -axis;
        }
        return axis.normalize() * theta;
    }

    skew * (theta / (2.0 * theta.sin()))
}

/// `V(w)`, the left Jacobian of SO(3).
pub fn left_jacobian(w: &Vector3<f64>) -> Matrix3<f64> {
    let theta = w.norm();
    let k = wedge(w);
    let k2 = k * k;
    if theta < SMALL_ANGLE {
        Matrix3::identity() + k * 0.5 + k2 / 6.0
    } else {
        let (s, c) = theta.sin_cos();
        let theta2 = theta * theta;
        Matrix3::identity() + k * ((1.0 - c) / theta2) + k2 * ((theta - s) / (theta2 * theta))
    }
}

/// Inverse of [`left_jacobian`].
pub fn left_jacobian_inv(w: &Vector3<f64>) -> Matrix3<f64> {
    let theta = w.norm();
    let k = wedge(w);
    let k2 = k * k;
    if theta < SMALL_ANGLE {
        Matrix3::identity() - k * 0.5 + k2 / 12.0
    } else {
        let (s, c) = theta.sin_cos();
        let coeff = (1.0 - theta * s / (2.0 * (1.0 - c))) / (theta * theta);
        Matrix3::identity() - k * 0.5 + k2 * coeff
    }
}

fn as_vector3(phi: &[f64]) -> Vector3<f64> {
    Vector3::new(phi[0], phi[1], phi[2])
}

fn as_matrix3(r: &DMatrix<f64>) -> Matrix3<f64> {
    r.fixed_view::<3, 3>(0, 0).into_owned()
}

fn to_dynamic(m: &Matrix3<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(3, 3, m.as_slice())
}

impl RotationAlgebra for So3 {
    const SIZE: usize = 3;
    const DIM: usize = 3;

    fn wedge(phi: &[f64]) -> DMatrix<f64> {
        to_dynamic(&wedge(&as_vector3(phi)))
    }

    fn exp(phi: &[f64]) -> DMatrix<f64> {
        to_dynamic(&exp(&as_vector3(phi)))
    }

    fn log(r: &DMatrix<f64>) -> DVector<f64> {
        let w = log(&as_matrix3(r));
        DVector::from_column_slice(w.as_slice())
    }

    fn left_jacobian(phi: &[f64]) -> DMatrix<f64> {
        to_dynamic(&left_jacobian(&as_vector3(phi)))
    }

    fn left_jacobian_inv(phi: &[f64]) -> DMatrix<f64> {
        to_dynamic(&left_jacobian_inv(&as_vector3(phi)))
    }

    fn adjoint(r: &DMatrix<f64>) -> DMatrix<f64> {
        r.clone()
    }

    fn coupling(r: &DMatrix<f64>, t: &[f64]) -> DMatrix<f64> {
        to_dynamic(&(wedge(&as_vector3(t)) * as_matrix3(r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_wedge_matches_cross_product() {
        let w = Vector3::new(1.0, 2.0, 3.0);
        let v = Vector3::new(-0.5, 0.25, 4.0);
        assert_abs_diff_eq!(wedge(&w) * v, w.cross(&v), epsilon = 1e-12);
        assert_abs_diff_eq!(vee(&wedge(&w)), w, epsilon = 1e-12);
    }

    #[test]
    fn test_exp_is_a_rotation() {
        let r = exp(&Vector3::new(0.3, -1.2, 0.7));
        assert_abs_diff_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-12);
        assert_abs_diff_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exp_log_round_trip_both_branches() {
        for w in [
            Vector3::zeros(),
            Vector3::new(1e-5, -2e-5, 3e-5),
            Vector3::new(0.1, 0.2, 0.3),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(-1.0, 1.5, 0.5),
        ] {
            assert_abs_diff_eq!(log(&exp(&w)), w, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_log_near_pi() {
        let w = Vector3::new(0.0, PI - 1e-6, 0.0);
        let recovered = log(&exp(&w));
        assert_abs_diff_eq!(exp(&recovered), exp(&w), epsilon = 1e-6);
    }

    #[test]
    fn test_left_jacobian_inverse() {
        for w in [Vector3::new(1e-5, 0.0, 0.0), Vector3::new(0.4, -0.2, 1.1)] {
            let product = left_jacobian(&w) * left_jacobian_inv(&w);
            assert_abs_diff_eq!(product, Matrix3::identity(), epsilon = 1e-8);
        }
    }
}
