// inekf_core/src/models/process/mod.rs

use crate::error::Result;
use crate::lie::{GroupLayout, GroupState};
use crate::types::{InvariantError, MatrixCov};
use std::fmt::Debug;

/// A process model drives the mean forward and linearizes the error dynamics.
///
/// Implementations are pure: neither method touches the covariance of the state
/// it is handed. The engine combines them as
/// `Σ ← Φ · (Σ + Q·dt) · Φᵀ`, converting `Q` through the adjoint of the mean
/// first when it runs a right-invariant filter.
pub trait ProcessModel: Debug + Send + Sync {
    /// The input that drives the model (odometry, IMU sample, ...).
    type Control;

    /// Returns the propagated mean `f(u, dt, X)`. Covariance and augmentation
    /// handling is up to the model; the engine only reads the group matrix and
    /// augmentation of the result.
    fn propagate(&self, u: &Self::Control, dt: f64, state: &GroupState) -> Result<GroupState>;

    /// Returns the N x N discrete transition `Φ` with `δ_{k+1} ≈ Φ · δ_k` for
    /// the given error convention.
    fn transition(
        &self,
        u: &Self::Control,
        dt: f64,
        state: &GroupState,
        error: InvariantError,
    ) -> Result<MatrixCov>;

    /// Continuous process-noise covariance `Q`, expressed in the left-invariant frame.
    fn q(&self) -> &MatrixCov;

    fn set_q(&mut self, q: MatrixCov) -> Result<()>;

    /// Whether this model can run on states of the given layout.
    fn supports(&self, layout: &GroupLayout) -> bool;
}

pub mod odometry;
