// inekf_core/src/lie.rs

//! Matrix Lie groups used as filter states: SO(2), SO(3), SE(2) and SE(3),
//! each with any number of extra translational columns and an optional
//! Euclidean augmentation (biases, calibration terms...) that is tracked in
//! the covariance but does not take part in the group structure.

use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{InekfError, Result};
use crate::types::{MatrixCov, MatrixState, TangentVector};

pub mod rigid;
pub mod so2;
pub mod so3;

use so2::So2;
use so3::So3;

/// Below this rotation angle (radians) the closed forms switch to their Taylor series.
pub const SMALL_ANGLE: f64 = 1e-4;

/// Tolerance used when checking that a rotation block is orthonormal.
const ROTATION_TOLERANCE: f64 = 1e-6;

/// The per-rotation primitives that [`rigid`] builds every group operation from.
pub trait RotationAlgebra {
    /// Matrix size of the rotation block.
    const SIZE: usize;
    /// Dimension of the rotation algebra, `SIZE * (SIZE - 1) / 2`.
    const DIM: usize;

    fn wedge(phi: &[f64]) -> DMatrix<f64>;
    fn exp(phi: &[f64]) -> DMatrix<f64>;
    fn log(r: &DMatrix<f64>) -> DVector<f64>;
    fn left_jacobian(phi: &[f64]) -> DMatrix<f64>;
    fn left_jacobian_inv(phi: &[f64]) -> DMatrix<f64>;
    /// Adjoint of the rotation acting on the rotation algebra.
    fn adjoint(r: &DMatrix<f64>) -> DMatrix<f64>;
    /// Block coupling a translational column `t` into the rotation component.
    fn coupling(r: &DMatrix<f64>, t: &[f64]) -> DMatrix<f64>;
}

// Calls `rigid::$f::<So2 | So3>` depending on the rotation block of the layout.
macro_rules! dispatch {
    ($layout:expr, $f:ident, $($arg:expr),*) => {
        match $layout.kind.rot_size() {
            2 => rigid::$f::<So2>($layout, $($arg),*),
            _ => rigid::$f::<So3>($layout, $($arg),*),
        }
    };
}

// =========================================================================
// == Group Layout ==
// =========================================================================

/// The four families of groups a filter can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupKind {
    SO2,
    SO3,
    SE2,
    SE3,
}

impl GroupKind {
    /// Matrix size of the rotation block.
    pub fn rot_size(self) -> usize {
        match self {
            GroupKind::SO2 | GroupKind::SE2 => 2,
            GroupKind::SO3 | GroupKind::SE3 => 3,
        }
    }

    /// Dimension of the rotation part of the tangent space.
    pub fn rot_dim(self) -> usize {
        let r = self.rot_size();
        r * (r - 1) / 2
    }

    /// Whether the group carries translational columns.
    pub fn is_rigid(self) -> bool {
        matches!(self, GroupKind::SE2 | GroupKind::SE3)
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupKind::SO2 => "SO2",
            GroupKind::SO3 => "SO3",
            GroupKind::SE2 => "SE2",
            GroupKind::SE3 => "SE3",
        };
        f.write_str(name)
    }
}

/// Shape of a group element: its kind, the number of translational columns
/// and the size of the Euclidean augmentation.
///
/// Tangent vectors are ordered `[rotation | column 0 | ... | column C-1 | aug]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupLayout {
    pub kind: GroupKind,
    #[serde(default)]
    pub columns: usize,
    #[serde(default)]
    pub aug: usize,
}

impl GroupLayout {
    /// Every group kind the crate implements.
    pub const SUPPORTED_KINDS: [GroupKind; 4] =
        [GroupKind::SO2, GroupKind::SO3, GroupKind::SE2, GroupKind::SE3];

    /// Builds a layout, rejecting translational columns on a pure rotation group.
    pub fn new(kind: GroupKind, columns: usize, aug: usize) -> Result<Self> {
        let layout = Self { kind, columns, aug };
        layout.validate()?;
        Ok(layout)
    }

    pub fn so2(aug: usize) -> Self {
        Self { kind: GroupKind::SO2, columns: 0, aug }
    }

    pub fn so3(aug: usize) -> Self {
        Self { kind: GroupKind::SO3, columns: 0, aug }
    }

    pub fn se2(columns: usize, aug: usize) -> Self {
        Self { kind: GroupKind::SE2, columns, aug }
    }

    pub fn se3(columns: usize, aug: usize) -> Self {
        Self { kind: GroupKind::SE3, columns, aug }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.kind.is_rigid() && self.columns != 0 {
            return Err(InekfError::InvalidConstruction(format!(
                "{} cannot carry translational columns (got {})",
                self.kind, self.columns
            )));
        }
        Ok(())
    }

    pub fn rot_size(&self) -> usize {
        self.kind.rot_size()
    }

    pub fn rot_dim(&self) -> usize {
        self.kind.rot_dim()
    }

    /// Tangent dimension without the augmentation.
    pub fn group_dim(&self) -> usize {
        self.rot_dim() + self.rot_size() * self.columns
    }

    /// Full tangent dimension N, the size of the covariance.
    pub fn dim(&self) -> usize {
        self.group_dim() + self.aug
    }

    /// Group matrix size M.
    pub fn mat_size(&self) -> usize {
        self.rot_size() + self.columns
    }
}

impl fmt::Display for GroupLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{},{}>", self.kind, self.columns, self.aug)
    }
}

// =========================================================================
// == Group Element ==
// =========================================================================

/// A group element together with its (optional) covariance and augmentation.
///
/// A state without covariance is "certain". The filter itself always works on
/// uncertain states; certain ones show up as controls and correction terms.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupState {
    layout: GroupLayout,
    mat: MatrixState,
    cov: Option<MatrixCov>,
    aug: DVector<f64>,
}

impl GroupState {
    // --- Constructors ---

    /// The identity element, certain, with a zero augmentation.
    pub fn identity(layout: GroupLayout) -> Self {
        Self {
            layout,
            mat: DMatrix::identity(layout.mat_size(), layout.mat_size()),
            cov: None,
            aug: DVector::zeros(layout.aug),
        }
    }

    /// Wraps an existing group matrix, checking its shape and rotation block.
    pub fn from_matrix(layout: GroupLayout, mat: MatrixState) -> Result<Self> {
        layout.validate()?;
        check_group_matrix(&layout, &mat)?;
        Ok(Self {
            layout,
            mat,
            cov: None,
            aug: DVector::zeros(layout.aug),
        })
    }

    /// Assembles `[R | c_1 .. c_k]` from a rotation block and one translational
    /// column per matrix column of `columns`.
    pub fn from_rotation_and_columns(
        layout: GroupLayout,
        rotation: &DMatrix<f64>,
        columns: &DMatrix<f64>,
    ) -> Result<Self> {
        layout.validate()?;
        let r = layout.rot_size();
        if rotation.shape() != (r, r) {
            return Err(InekfError::shape("rotation block", (r, r), rotation.shape()));
        }
        if columns.shape() != (r, layout.columns) {
            return Err(InekfError::shape(
                "translational columns",
                (r, layout.columns),
                columns.shape(),
            ));
        }

        let mut mat = DMatrix::identity(layout.mat_size(), layout.mat_size());
        mat.view_mut((0, 0), (r, r)).copy_from(rotation);
        mat.view_mut((0, r), (r, layout.columns)).copy_from(columns);
        Self::from_matrix(layout, mat)
    }

    /// `Exp(xi)` for the given layout.
    pub fn from_tangent(layout: GroupLayout, xi: &TangentVector) -> Result<Self> {
        Self::exp(layout, xi)
    }

    /// Planar rotation by `theta` radians.
    pub fn so2(theta: f64) -> Self {
        let layout = GroupLayout::so2(0);
        let mut state = Self::identity(layout);
        state
            .mat
            .copy_from(&DMatrix::from_column_slice(2, 2, so2::exp(theta).as_slice()));
        state
    }

    /// Spatial rotation from the axis-angle vector `(w1, w2, w3)`.
    pub fn so3(w1: f64, w2: f64, w3: f64) -> Self {
        let layout = GroupLayout::so3(0);
        let mut state = Self::identity(layout);
        let r = so3::exp(&Vector3::new(w1, w2, w3));
        state.mat.copy_from(&DMatrix::from_column_slice(3, 3, r.as_slice()));
        state
    }

    /// Planar pose: rotation by `theta`, then translation `(x, y)` placed directly.
    pub fn se2(theta: f64, x: f64, y: f64) -> Self {
        let layout = GroupLayout::se2(1, 0);
        let mut state = Self::identity(layout);
        state
            .mat
            .view_mut((0, 0), (2, 2))
            .copy_from(&DMatrix::from_column_slice(2, 2, so2::exp(theta).as_slice()));
        state.mat[(0, 2)] = x;
        state.mat[(1, 2)] = y;
        state
    }

    /// Spatial pose: rotation `Exp(w)`, translation `p` placed directly.
    pub fn se3(w: &Vector3<f64>, p: &Vector3<f64>) -> Self {
        let layout = GroupLayout::se3(1, 0);
        let mut state = Self::identity(layout);
        let r = so3::exp(w);
        state
            .mat
            .view_mut((0, 0), (3, 3))
            .copy_from(&DMatrix::from_column_slice(3, 3, r.as_slice()));
        state
            .mat
            .view_mut((0, 3), (3, 1))
            .copy_from(&DMatrix::from_column_slice(3, 1, p.as_slice()));
        state
    }

    /// Attaches a covariance. An all-zero covariance leaves the state certain.
    pub fn with_covariance(mut self, cov: MatrixCov) -> Result<Self> {
        self.set_cov(cov)?;
        Ok(self)
    }

    /// Replaces the augmentation vector.
    pub fn with_aug(mut self, aug: DVector<f64>) -> Result<Self> {
        self.set_aug(aug)?;
        Ok(self)
    }

    // --- Getters ---

    pub fn layout(&self) -> &GroupLayout {
        &self.layout
    }

    pub fn mat(&self) -> &MatrixState {
        &self.mat
    }

    pub fn cov(&self) -> Option<&MatrixCov> {
        self.cov.as_ref()
    }

    pub fn aug(&self) -> &DVector<f64> {
        &self.aug
    }

    pub fn is_uncertain(&self) -> bool {
        self.cov.is_some()
    }

    /// The rotation block of the group matrix.
    pub fn rotation(&self) -> DMatrix<f64> {
        let r = self.layout.rot_size();
        self.mat.view((0, 0), (r, r)).into_owned()
    }

    /// The `idx`-th translational column.
    pub fn column(&self, idx: usize) -> Result<DVector<f64>> {
        if idx >= self.layout.columns {
            return Err(InekfError::dim("column index", self.layout.columns, idx));
        }
        let r = self.layout.rot_size();
        Ok(self.mat.view((0, r + idx), (r, 1)).column(0).into_owned())
    }

    // --- Setters ---

    pub fn set_cov(&mut self, cov: MatrixCov) -> Result<()> {
        let n = self.layout.dim();
        if cov.shape() != (n, n) {
            return Err(InekfError::shape("covariance", (n, n), cov.shape()));
        }
        self.cov = if cov.iter().all(|v| *v == 0.0) {
            None
        } else {
            Some(cov)
        };
        Ok(())
    }

    /// Drops the covariance, making the state certain.
    pub fn clear_cov(&mut self) {
        self.cov = None;
    }

    pub fn set_aug(&mut self, aug: DVector<f64>) -> Result<()> {
        if aug.len() != self.layout.aug {
            return Err(InekfError::dim("augmentation", self.layout.aug, aug.len()));
        }
        self.aug = aug;
        Ok(())
    }

    pub fn set_mat(&mut self, mat: MatrixState) -> Result<()> {
        check_group_matrix(&self.layout, &mat)?;
        self.mat = mat;
        Ok(())
    }

    // --- Growing the state ---

    /// Appends a translational column (e.g. a newly seen landmark). When the
    /// state is uncertain, `sigma` becomes the new diagonal covariance block.
    pub fn add_column(&mut self, x: &DVector<f64>, sigma: &DMatrix<f64>) -> Result<()> {
        if !self.layout.kind.is_rigid() {
            return Err(InekfError::InvalidConstruction(format!(
                "cannot add a column to {}",
                self.layout.kind
            )));
        }
        let r = self.layout.rot_size();
        if x.len() != r {
            return Err(InekfError::dim("new column", r, x.len()));
        }
        if sigma.shape() != (r, r) {
            return Err(InekfError::shape("new column covariance", (r, r), sigma.shape()));
        }

        let old = self.layout;
        let mut layout = old;
        layout.columns += 1;

        // The new column goes right after the existing ones in both the matrix
        // and the tangent space, ahead of the augmentation block.
        let m = old.mat_size();
        let mut mat = DMatrix::identity(m + 1, m + 1);
        mat.view_mut((0, 0), (m, m)).copy_from(&self.mat);
        mat.view_mut((0, m), (r, 1)).copy_from(x);

        if let Some(cov) = &self.cov {
            let g = old.group_dim();
            let a = old.aug;
            let mut grown = DMatrix::zeros(layout.dim(), layout.dim());
            grown.view_mut((0, 0), (g, g)).copy_from(&cov.view((0, 0), (g, g)));
            grown.view_mut((g, g), (r, r)).copy_from(sigma);
            grown
                .view_mut((g + r, g + r), (a, a))
                .copy_from(&cov.view((g, g), (a, a)));
            grown
                .view_mut((0, g + r), (g, a))
                .copy_from(&cov.view((0, g), (g, a)));
            grown
                .view_mut((g + r, 0), (a, g))
                .copy_from(&cov.view((g, 0), (a, g)));
            self.cov = Some(grown);
        }

        self.layout = layout;
        self.mat = mat;
        Ok(())
    }

    /// Appends one augmentation entry with variance `sigma` (used only when uncertain).
    pub fn add_aug(&mut self, x: f64, sigma: f64) {
        let n = self.layout.dim();
        let a = self.layout.aug;
        let mut aug = DVector::zeros(a + 1);
        aug.rows_mut(0, a).copy_from(&self.aug);
        aug[a] = x;
        self.layout.aug += 1;
        self.aug = aug;
        if let Some(cov) = &self.cov {
            let mut grown = DMatrix::zeros(n + 1, n + 1);
            grown.view_mut((0, 0), (n, n)).copy_from(cov);
            grown[(n, n)] = sigma;
            self.cov = Some(grown);
        }
    }

    // --- Group operations ---

    /// Group inverse. Covariance and augmentation have no meaningful inverse
    /// and are dropped; the result is certain with a zero augmentation.
    pub fn inverse(&self) -> Self {
        Self {
            layout: self.layout,
            mat: dispatch!(&self.layout, inverse, &self.mat),
            cov: None,
            aug: DVector::zeros(self.layout.aug),
        }
    }

    /// `self * rhs`. Augmentations add. At most one operand may be uncertain,
    /// and its covariance is carried over.
    pub fn compose(&self, rhs: &GroupState) -> Result<Self> {
        if self.layout != rhs.layout {
            return Err(InekfError::InvalidConstruction(format!(
                "cannot compose {} with {}",
                self.layout, rhs.layout
            )));
        }
        let cov = match (&self.cov, &rhs.cov) {
            (Some(_), Some(_)) => return Err(InekfError::InvalidComposition),
            (Some(c), None) | (None, Some(c)) => Some(c.clone()),
            (None, None) => None,
        };
        Ok(Self {
            layout: self.layout,
            mat: &self.mat * &rhs.mat,
            cov,
            aug: &self.aug + &rhs.aug,
        })
    }

    /// Tangent vector of this element, augmentation included.
    pub fn log(&self) -> TangentVector {
        let group_part = dispatch!(&self.layout, log, &self.mat);
        let mut xi = DVector::zeros(self.layout.dim());
        xi.rows_mut(0, self.layout.group_dim()).copy_from(&group_part);
        xi.rows_mut(self.layout.group_dim(), self.layout.aug)
            .copy_from(&self.aug);
        xi
    }

    /// The N x N adjoint of this element.
    pub fn adjoint(&self) -> MatrixCov {
        dispatch!(&self.layout, adjoint, &self.mat)
    }

    // --- Static operators ---

    /// Embeds a tangent vector into the M x M Lie algebra (augmentation ignored).
    pub fn wedge(layout: GroupLayout, xi: &TangentVector) -> Result<MatrixState> {
        layout.validate()?;
        check_tangent(&layout, xi)?;
        Ok(dispatch!(&layout, wedge, xi))
    }

    /// Maps a tangent vector onto the group. The augmentation tail of `xi`
    /// becomes the augmentation of the result.
    pub fn exp(layout: GroupLayout, xi: &TangentVector) -> Result<Self> {
        layout.validate()?;
        check_tangent(&layout, xi)?;
        Ok(Self {
            layout,
            mat: dispatch!(&layout, exp, xi),
            cov: None,
            aug: xi.rows(layout.group_dim(), layout.aug).into_owned(),
        })
    }
}

fn check_tangent(layout: &GroupLayout, xi: &TangentVector) -> Result<()> {
    if xi.len() != layout.dim() {
        return Err(InekfError::dim("tangent vector", layout.dim(), xi.len()));
    }
    Ok(())
}

fn check_group_matrix(layout: &GroupLayout, mat: &MatrixState) -> Result<()> {
    let m = layout.mat_size();
    if mat.shape() != (m, m) {
        return Err(InekfError::shape("group matrix", (m, m), mat.shape()));
    }

    let r = layout.rot_size();
    let rotation = mat.view((0, 0), (r, r));
    let orthogonality = (rotation.transpose() * rotation - DMatrix::identity(r, r)).amax();
    if orthogonality > ROTATION_TOLERANCE || rotation.determinant() <= 0.0 {
        return Err(InekfError::InvalidConstruction(
            "rotation block is not a proper rotation matrix".to_string(),
        ));
    }

    let bottom = mat.view((r, 0), (m - r, m));
    let mut expected = DMatrix::zeros(m - r, m);
    expected.view_mut((0, r), (m - r, m - r)).fill_with_identity();
    if (bottom - expected).amax() > ROTATION_TOLERANCE {
        return Err(InekfError::InvalidConstruction(
            "group matrix must end with [0 | I] rows".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix{}", self.mat)?;
        if let Some(cov) = &self.cov {
            write!(f, "Sigma{}", cov)?;
        }
        if self.layout.aug != 0 {
            write!(f, "Aug{}", self.aug)?;
        }
        Ok(())
    }
}
