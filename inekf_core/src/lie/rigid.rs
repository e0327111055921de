// inekf_core/src/lie/rigid.rs

//! The algebra shared by every supported group.
//!
//! SO(n) is treated as SE(n) with zero translational columns, so a single
//! implementation generic over the rotation block covers all four kinds. The
//! augmentation block never takes part in the group structure: it is copied
//! through `exp`/`log` and gets an identity block in the adjoint.

use nalgebra::{DMatrix, DVector};

use super::{GroupLayout, RotationAlgebra};

/// Embeds the group part of `xi` into the M x M Lie algebra.
pub(crate) fn wedge<G: RotationAlgebra>(layout: &GroupLayout, xi: &DVector<f64>) -> DMatrix<f64> {
    let m = layout.mat_size();
    let mut algebra = DMatrix::zeros(m, m);
    algebra
        .view_mut((0, 0), (G::SIZE, G::SIZE))
        .copy_from(&G::wedge(&xi.as_slice()[..G::DIM]));

    for i in 0..layout.columns {
        let start = G::DIM + G::SIZE * i;
        algebra
            .view_mut((0, G::SIZE + i), (G::SIZE, 1))
            .copy_from(&xi.rows(start, G::SIZE));
    }
    algebra
}

/// Group matrix of `Exp(xi)`. The augmentation tail is handled by the caller.
pub(crate) fn exp<G: RotationAlgebra>(layout: &GroupLayout, xi: &DVector<f64>) -> DMatrix<f64> {
    let phi = &xi.as_slice()[..G::DIM];
    let rotation = G::exp(phi);
    let v = G::left_jacobian(phi);

    let mut mat = DMatrix::identity(layout.mat_size(), layout.mat_size());
    mat.view_mut((0, 0), (G::SIZE, G::SIZE)).copy_from(&rotation);
    for i in 0..layout.columns {
        let start = G::DIM + G::SIZE * i;
        let column = &v * xi.rows(start, G::SIZE);
        mat.view_mut((0, G::SIZE + i), (G::SIZE, 1)).copy_from(&column);
    }
    mat
}

/// Group part of `Log(mat)`, i.e. the first `N - A` tangent entries.
pub(crate) fn log<G: RotationAlgebra>(layout: &GroupLayout, mat: &DMatrix<f64>) -> DVector<f64> {
    let rotation = mat.view((0, 0), (G::SIZE, G::SIZE)).into_owned();
    let phi = G::log(&rotation);
    let v_inv = G::left_jacobian_inv(phi.as_slice());

    let mut xi = DVector::zeros(layout.group_dim());
    xi.rows_mut(0, G::DIM).copy_from(&phi);
    for i in 0..layout.columns {
        let start = G::DIM + G::SIZE * i;
        let rho = &v_inv * mat.view((0, G::SIZE + i), (G::SIZE, 1));
        xi.rows_mut(start, G::SIZE).copy_from(&rho);
    }
    xi
}

/// Closed-form inverse of a group matrix: `[Rᵀ | -Rᵀ t_i]`.
pub(crate) fn inverse<G: RotationAlgebra>(layout: &GroupLayout, mat: &DMatrix<f64>) -> DMatrix<f64> {
    let rt = mat.view((0, 0), (G::SIZE, G::SIZE)).transpose();

    let mut inv = DMatrix::identity(layout.mat_size(), layout.mat_size());
    for i in 0..layout.columns {
        let t = mat.view((0, G::SIZE + i), (G::SIZE, 1));
        let column = -(&rt * t);
        inv.view_mut((0, G::SIZE + i), (G::SIZE, 1)).copy_from(&column);
    }
    inv.view_mut((0, 0), (G::SIZE, G::SIZE)).copy_from(&rt);
    inv
}

/// The N x N adjoint. Rotation block first, then each column block gets `R`
/// on the diagonal and a coupling block into the rotation component.
pub(crate) fn adjoint<G: RotationAlgebra>(layout: &GroupLayout, mat: &DMatrix<f64>) -> DMatrix<f64> {
    let n = layout.dim();
    let rotation = mat.view((0, 0), (G::SIZE, G::SIZE)).into_owned();

    let mut ad = DMatrix::zeros(n, n);
    ad.view_mut((0, 0), (G::DIM, G::DIM))
        .copy_from(&G::adjoint(&rotation));

    for i in 0..layout.columns {
        let start = G::DIM + G::SIZE * i;
        let t: Vec<f64> = mat.view((0, G::SIZE + i), (G::SIZE, 1)).iter().copied().collect();
        ad.view_mut((start, 0), (G::SIZE, G::DIM))
            .copy_from(&G::coupling(&rotation, &t));
        ad.view_mut((start, start), (G::SIZE, G::SIZE))
            .copy_from(&rotation);
    }

    let g = layout.group_dim();
    ad.view_mut((g, g), (layout.aug, layout.aug))
        .fill_with_identity();
    ad
}
