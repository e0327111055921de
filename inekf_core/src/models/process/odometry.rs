// inekf_core/src/models/process/odometry.rs

use nalgebra::{DMatrix, DVector};

use super::ProcessModel;
use crate::error::{InekfError, Result};
use crate::lie::{GroupLayout, GroupState};
use crate::types::{InvariantError, MatrixCov};

/// Planar odometry on SE(2): the control is the body-frame motion `U` measured
/// since the last step, so `X ← X · U`.
///
/// With a right-invariant error the transition is the identity; with a
/// left-invariant error it is `Ad(U⁻¹)`.
#[derive(Debug, Clone)]
pub struct OdometryProcess {
    q: MatrixCov,
}

impl Default for OdometryProcess {
    fn default() -> Self {
        Self {
            q: DMatrix::zeros(3, 3),
        }
    }
}

impl OdometryProcess {
    /// Diagonal process noise on (θ, x, y).
    pub fn new(theta_cov: f64, x_cov: f64, y_cov: f64) -> Self {
        Self {
            q: DMatrix::from_diagonal(&DVector::from_vec(vec![theta_cov, x_cov, y_cov])),
        }
    }

    pub fn from_diagonal(q: &DVector<f64>) -> Result<Self> {
        let mut model = Self::default();
        model.set_q_diagonal(q)?;
        Ok(model)
    }

    pub fn set_q_diagonal(&mut self, q: &DVector<f64>) -> Result<()> {
        if q.len() != 3 {
            return Err(InekfError::dim("odometry noise diagonal", 3, q.len()));
        }
        self.q = DMatrix::from_diagonal(q);
        Ok(())
    }

    /// Same variance on every axis.
    pub fn set_q_scalar(&mut self, q: f64) {
        self.q = DMatrix::identity(3, 3) * q;
    }

    fn layout() -> GroupLayout {
        GroupLayout::se2(1, 0)
    }

    fn check(&self, u: &GroupState, state: &GroupState) -> Result<()> {
        for (what, layout) in [("control", u.layout()), ("state", state.layout())] {
            if !self.supports(layout) {
                return Err(InekfError::InvalidConstruction(format!(
                    "odometry {} must be {}, got {}",
                    what,
                    Self::layout(),
                    layout
                )));
            }
        }
        Ok(())
    }
}

impl ProcessModel for OdometryProcess {
    type Control = GroupState;

    fn propagate(&self, u: &GroupState, _dt: f64, state: &GroupState) -> Result<GroupState> {
        self.check(u, state)?;
        state.compose(u)
    }

    fn transition(
        &self,
        u: &GroupState,
        _dt: f64,
        state: &GroupState,
        error: InvariantError,
    ) -> Result<MatrixCov> {
        self.check(u, state)?;
        Ok(match error {
            InvariantError::Right => DMatrix::identity(3, 3),
            InvariantError::Left => u.inverse().adjoint(),
        })
    }

    fn q(&self) -> &MatrixCov {
        &self.q
    }

    fn set_q(&mut self, q: MatrixCov) -> Result<()> {
        if q.shape() != (3, 3) {
            return Err(InekfError::shape("odometry noise", (3, 3), q.shape()));
        }
        self.q = q;
        Ok(())
    }

    fn supports(&self, layout: &GroupLayout) -> bool {
        *layout == Self::layout()
    }
}
