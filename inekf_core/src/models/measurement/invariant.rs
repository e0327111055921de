// inekf_core/src/models/measurement/invariant.rs

use nalgebra::{DMatrix, DVector, Vector3};

use super::MeasurementModel;
use crate::error::{InekfError, Result};
use crate::lie::{so3, GroupLayout, GroupState};
use crate::types::{InvariantError, MatrixCov};

/// The generic invariant observation model.
///
/// A left model observes `z = X b`, a right model `z = X⁻¹ b`, where `b` is a
/// constant M-vector (e.g. `[0, 0, 1]` for a planar position fix). Only the
/// first `rot_size` rows of the product are compared, so the innovation,
/// the observation matrix `H` and the noise `M` are all `rot_size` high.
#[derive(Debug, Clone)]
pub struct InvariantMeasurement {
    layout: GroupLayout,
    error: InvariantError,
    h: DMatrix<f64>,
    b: DVector<f64>,
    noise: MatrixCov,
}

impl InvariantMeasurement {
    /// Builds the model from the structural vector `b`, deriving `H` from it.
    pub fn from_b(
        layout: GroupLayout,
        b: DVector<f64>,
        noise: MatrixCov,
        error: InvariantError,
    ) -> Result<Self> {
        layout.validate()?;
        check_b(&layout, &b)?;
        check_noise(&layout, &noise)?;
        let h = derive_h(&layout, &b, error);
        Ok(Self {
            layout,
            error,
            h,
            b,
            noise,
        })
    }

    /// Builds the model from an explicit `H`. Without `b`, a zero vector is
    /// used to pad rotation-sized measurements.
    pub fn from_h(
        layout: GroupLayout,
        h: DMatrix<f64>,
        b: Option<DVector<f64>>,
        noise: MatrixCov,
        error: InvariantError,
    ) -> Result<Self> {
        layout.validate()?;
        let expected = (layout.rot_size(), layout.dim());
        if h.shape() != expected {
            return Err(InekfError::shape("observation matrix", expected, h.shape()));
        }
        let b = b.unwrap_or_else(|| DVector::zeros(layout.mat_size()));
        check_b(&layout, &b)?;
        check_noise(&layout, &noise)?;
        Ok(Self {
            layout,
            error,
            h,
            b,
            noise,
        })
    }

    /// Replaces `b` and re-derives `H`, for observations whose structure changes
    /// between updates.
    pub fn set_b(&mut self, b: DVector<f64>) -> Result<()> {
        check_b(&self.layout, &b)?;
        self.h = derive_h(&self.layout, &b, self.error);
        self.b = b;
        Ok(())
    }

    pub fn set_noise(&mut self, noise: MatrixCov) -> Result<()> {
        check_noise(&self.layout, &noise)?;
        self.noise = noise;
        Ok(())
    }

    pub fn layout(&self) -> &GroupLayout {
        &self.layout
    }

    pub fn h(&self) -> &DMatrix<f64> {
        &self.h
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn noise(&self) -> &MatrixCov {
        &self.noise
    }

    fn check_state(&self, state: &GroupState) -> Result<()> {
        if !self.supports(state.layout()) {
            return Err(InekfError::InvalidConstruction(format!(
                "measurement model built for {} used on {}",
                self.layout,
                state.layout()
            )));
        }
        Ok(())
    }
}

fn check_b(layout: &GroupLayout, b: &DVector<f64>) -> Result<()> {
    if b.len() != layout.mat_size() {
        return Err(InekfError::dim("structural vector b", layout.mat_size(), b.len()));
    }
    Ok(())
}

fn check_noise(layout: &GroupLayout, noise: &MatrixCov) -> Result<()> {
    let r = layout.rot_size();
    if noise.shape() != (r, r) {
        return Err(InekfError::shape("measurement noise", (r, r), noise.shape()));
    }
    Ok(())
}

/// `H` such that `H ξ` equals the first `rot_size` rows of `ξ^ b`, negated for
/// a right-invariant model.
fn derive_h(layout: &GroupLayout, b: &DVector<f64>, error: InvariantError) -> DMatrix<f64> {
    let r = layout.rot_size();
    let mut h = DMatrix::zeros(r, layout.dim());

    if r == 2 {
        h[(0, 0)] = -b[1];
        h[(1, 0)] = b[0];
    } else {
        let skew = -so3::wedge(&Vector3::new(b[0], b[1], b[2]));
        h.view_mut((0, 0), (3, 3))
            .copy_from(&DMatrix::from_column_slice(3, 3, skew.as_slice()));
    }

    for i in 0..layout.columns {
        let start = layout.rot_dim() + r * i;
        h.view_mut((0, start), (r, r))
            .copy_from(&(DMatrix::identity(r, r) * b[r + i]));
    }

    match error {
        InvariantError::Left => h,
        InvariantError::Right => -h,
    }
}

impl MeasurementModel for InvariantMeasurement {
    fn error(&self) -> InvariantError {
        self.error
    }

    fn supports(&self, layout: &GroupLayout) -> bool {
        *layout == self.layout
    }

    fn preprocess(&self, z: &DVector<f64>, state: &GroupState) -> Result<DVector<f64>> {
        self.check_state(state)?;
        let r = self.layout.rot_size();
        let m = self.layout.mat_size();

        if z.len() == m {
            return Ok(z.clone());
        }
        if z.len() != r {
            return Err(InekfError::dim("measurement", m, z.len()));
        }
        let mut full = self.b.clone();
        full.rows_mut(0, r).copy_from(z);
        Ok(full)
    }

    fn linearize(&self, state: &GroupState, filter_error: InvariantError) -> Result<DMatrix<f64>> {
        self.check_state(state)?;
        if filter_error == self.error {
            return Ok(self.h.clone());
        }
        Ok(match filter_error {
            InvariantError::Right => &self.h * state.inverse().adjoint(),
            InvariantError::Left => &self.h * state.adjoint(),
        })
    }

    fn innovation(&self, z: &DVector<f64>, state: &GroupState) -> Result<DVector<f64>> {
        self.check_state(state)?;
        let m = self.layout.mat_size();
        if z.len() != m {
            return Err(InekfError::dim("processed measurement", m, z.len()));
        }

        let r = self.layout.rot_size();
        let predicted = match self.error {
            InvariantError::Right => state.mat().rows(0, r) * z,
            InvariantError::Left => state.inverse().mat().rows(0, r) * z,
        };
        Ok(predicted - self.b.rows(0, r))
    }

    fn inverse_innovation_cov(&self, h_error: &DMatrix<f64>, state: &GroupState) -> Result<MatrixCov> {
        self.check_state(state)?;
        let cov = state.cov().ok_or_else(|| {
            InekfError::InvalidConstruction("cannot update a state without covariance".to_string())
        })?;
        let expected = (self.layout.rot_size(), self.layout.dim());
        if h_error.shape() != expected {
            return Err(InekfError::shape("observation matrix", expected, h_error.shape()));
        }

        let rotation = state.rotation();
        let rotated_noise = match self.error {
            InvariantError::Right => &rotation * &self.noise * rotation.transpose(),
            InvariantError::Left => rotation.transpose() * &self.noise * &rotation,
        };
        let s = h_error * cov * h_error.transpose() + rotated_noise;
        s.try_inverse()
            .ok_or(InekfError::SingularMatrix("innovation covariance"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn layout() -> GroupLayout {
        GroupLayout::se2(2, 1)
    }

    fn b() -> DVector<f64> {
        DVector::from_vec(vec![0.0, 0.0, 0.0, 1.0])
    }

    fn expected_h() -> DMatrix<f64> {
        let mut h = DMatrix::zeros(2, 6);
        h.view_mut((0, 3), (2, 2)).fill_with_identity();
        h
    }

    #[test]
    fn test_h_from_b() {
        let noise = DMatrix::identity(2, 2);
        let left = InvariantMeasurement::from_b(layout(), b(), noise.clone(), InvariantError::Left).unwrap();
        assert_abs_diff_eq!(left.h(), &expected_h(), epsilon = 1e-12);

        let right = InvariantMeasurement::from_b(layout(), b(), noise.clone(), InvariantError::Right).unwrap();
        assert_abs_diff_eq!(right.h(), &(-expected_h()), epsilon = 1e-12);

        let mut top = b();
        top[0] = 1.0;
        top[1] = 2.0;
        let mut h = expected_h();
        h[(0, 0)] = -2.0;
        h[(1, 0)] = 1.0;
        let with_b = InvariantMeasurement::from_b(layout(), top, noise, InvariantError::Left).unwrap();
        assert_abs_diff_eq!(with_b.h(), &h, epsilon = 1e-12);
    }

    #[test]
    fn test_h_from_b_so3() {
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let model = InvariantMeasurement::from_b(
            GroupLayout::so3(0),
            b,
            DMatrix::identity(3, 3),
            InvariantError::Left,
        )
        .unwrap();
        let skew = -so3::wedge(&Vector3::new(1.0, 2.0, 3.0));
        assert_abs_diff_eq!(
            model.h().clone(),
            DMatrix::from_column_slice(3, 3, skew.as_slice()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_h_matches_algebra_action() {
        // H ξ must reproduce the top rows of wedge(ξ) b.
        let layout = GroupLayout::se3(2, 0);
        let b = DVector::from_vec(vec![0.3, -1.0, 2.0, 1.0, 0.5]);
        let model = InvariantMeasurement::from_b(layout, b.clone(), DMatrix::identity(3, 3), InvariantError::Left)
            .unwrap();
        let xi = DVector::from_vec(vec![0.1, 0.2, -0.3, 1.0, 2.0, 3.0, -1.0, 0.0, 1.0]);
        let action = GroupState::wedge(layout, &xi).unwrap() * &b;
        assert_abs_diff_eq!(model.h() * &xi, action.rows(0, 3).into_owned(), epsilon = 1e-12);
    }

    #[test]
    fn test_preprocess_pads_with_b() {
        let model =
            InvariantMeasurement::from_b(layout(), b(), DMatrix::identity(2, 2), InvariantError::Left).unwrap();
        let state = GroupState::identity(layout());

        let z = DVector::from_vec(vec![2.0, 2.0]);
        let expected = DVector::from_vec(vec![2.0, 2.0, 0.0, 1.0]);
        assert_eq!(model.preprocess(&z, &state).unwrap(), expected);

        let full = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(model.preprocess(&full, &state).unwrap(), full);

        let wrong = DVector::zeros(5);
        assert!(matches!(
            model.preprocess(&wrong, &state),
            Err(InekfError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_innovation_is_zero_for_a_perfect_measurement() {
        let layout = GroupLayout::se2(1, 0);
        let b = DVector::from_vec(vec![0.0, 0.0, 1.0]);
        let state = GroupState::se2(0.7, 3.0, -2.0);
        let model =
            InvariantMeasurement::from_b(layout, b.clone(), DMatrix::identity(2, 2), InvariantError::Left).unwrap();

        // X [0, 0, 1] is the position of the state.
        let z = model
            .preprocess(&DVector::from_vec(vec![3.0, -2.0]), &state)
            .unwrap();
        let v = model.innovation(&z, &state).unwrap();
        assert_abs_diff_eq!(v, DVector::zeros(2), epsilon = 1e-12);
    }

    #[test]
    fn test_linearize_converts_between_conventions() {
        let layout = GroupLayout::se2(1, 0);
        let b = DVector::from_vec(vec![0.0, 0.0, 1.0]);
        let state = GroupState::se2(0.7, 3.0, -2.0);
        let model =
            InvariantMeasurement::from_b(layout, b, DMatrix::identity(2, 2), InvariantError::Left).unwrap();

        let same = model.linearize(&state, InvariantError::Left).unwrap();
        assert_eq!(&same, model.h());

        let converted = model.linearize(&state, InvariantError::Right).unwrap();
        let expected = model.h() * state.inverse().adjoint();
        assert_abs_diff_eq!(converted, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_innovation_cov() {
        let layout = GroupLayout::se2(1, 0);
        let b = DVector::from_vec(vec![0.0, 0.0, 1.0]);
        let model =
            InvariantMeasurement::from_b(layout, b, DMatrix::identity(2, 2) * 0.5, InvariantError::Left).unwrap();
        let state = GroupState::se2(0.3, 1.0, 1.0)
            .with_covariance(DMatrix::identity(3, 3))
            .unwrap();

        let h = model.linearize(&state, InvariantError::Left).unwrap();
        let s_inv = model.inverse_innovation_cov(&h, &state).unwrap();
        // H = [0 | I], so S = I + Rᵀ (0.5 I) R = 1.5 I.
        assert_abs_diff_eq!(s_inv, DMatrix::identity(2, 2) / 1.5, epsilon = 1e-12);

        let certain = GroupState::se2(0.3, 1.0, 1.0);
        assert!(model.inverse_innovation_cov(&h, &certain).is_err());
    }

    #[test]
    fn test_singular_innovation_covariance() {
        let layout = GroupLayout::se2(1, 0);
        let b = DVector::from_vec(vec![0.0, 0.0, 1.0]);
        let model =
            InvariantMeasurement::from_b(layout, b, DMatrix::zeros(2, 2), InvariantError::Left).unwrap();
        let mut cov = DMatrix::zeros(3, 3);
        cov[(0, 0)] = 1.0;
        let state = GroupState::se2(0.0, 0.0, 0.0).with_covariance(cov).unwrap();

        let err = model.evaluate(&DVector::zeros(2), &state, InvariantError::Left).unwrap_err();
        assert!(err.is_numerical());
    }

    #[test]
    fn test_set_b_rederives_h() {
        let mut model =
            InvariantMeasurement::from_b(layout(), b(), DMatrix::identity(2, 2), InvariantError::Right).unwrap();
        model.set_b(DVector::from_vec(vec![0.0, 0.0, 1.0, 0.0])).unwrap();
        let mut h = DMatrix::zeros(2, 6);
        h.view_mut((0, 1), (2, 2)).fill_with_identity();
        assert_abs_diff_eq!(model.h(), &(-h), epsilon = 1e-12);

        assert!(model.set_b(DVector::zeros(3)).is_err());
    }

    #[test]
    fn test_from_h_validates_shapes() {
        let ok = InvariantMeasurement::from_h(
            layout(),
            expected_h(),
            None,
            DMatrix::identity(2, 2),
            InvariantError::Left,
        )
        .unwrap();
        assert_eq!(ok.b(), &DVector::zeros(4));

        let bad = InvariantMeasurement::from_h(
            layout(),
            DMatrix::zeros(2, 5),
            None,
            DMatrix::identity(2, 2),
            InvariantError::Left,
        );
        assert!(matches!(bad, Err(InekfError::ShapeMismatch { .. })));
    }
}
