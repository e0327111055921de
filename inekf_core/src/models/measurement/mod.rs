// inekf_core/src/models/measurement/mod.rs

use crate::error::Result;
use crate::lie::{GroupLayout, GroupState};
use crate::types::{InvariantError, MatrixCov};
use dyn_clone::DynClone;
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;

/// Everything the engine needs from one measurement to form a Kalman gain.
#[derive(Debug, Clone, PartialEq)]
pub struct Innovation {
    /// Innovation vector `V`.
    pub v: DVector<f64>,
    /// Observation matrix expressed in the filter's error convention.
    pub h_error: DMatrix<f64>,
    /// Inverse innovation covariance `S⁻¹`.
    pub s_inv: MatrixCov,
}

// --- MEASUREMENT MODEL TRAIT ---
// An invariant observation `z = X b` (left) or `z = X⁻¹ b` (right), linearized
// around the current mean. Implementations hold no per-call state, so one
// instance can be shared between filters.
pub trait MeasurementModel: DynClone + Debug + Send + Sync {
    /// The convention the model's observation matrix is written in.
    fn error(&self) -> InvariantError;

    /// Whether this model can observe states of the given layout.
    fn supports(&self, layout: &GroupLayout) -> bool;

    /// Turns a raw measurement into the full-size vector the model expects,
    /// e.g. by appending the homogeneous tail. Fails on any other size.
    fn preprocess(&self, z: &DVector<f64>, state: &GroupState) -> Result<DVector<f64>>;

    /// Observation matrix in the filter's convention `filter_error`.
    fn linearize(&self, state: &GroupState, filter_error: InvariantError) -> Result<DMatrix<f64>>;

    /// Innovation for an already preprocessed measurement.
    fn innovation(&self, z: &DVector<f64>, state: &GroupState) -> Result<DVector<f64>>;

    /// `S⁻¹` for the observation matrix returned by [`MeasurementModel::linearize`].
    fn inverse_innovation_cov(&self, h_error: &DMatrix<f64>, state: &GroupState) -> Result<MatrixCov>;

    /// Runs the four steps in order and bundles their results.
    fn evaluate(
        &self,
        z: &DVector<f64>,
        state: &GroupState,
        filter_error: InvariantError,
    ) -> Result<Innovation> {
        let z = self.preprocess(z, state)?;
        let h_error = self.linearize(state, filter_error)?;
        let v = self.innovation(&z, state)?;
        let s_inv = self.inverse_innovation_cov(&h_error, state)?;
        Ok(Innovation { v, h_error, s_inv })
    }
}

// This macro automatically generates the implementation of `Clone` for `Box<dyn MeasurementModel>`.
dyn_clone::clone_trait_object!(MeasurementModel);

pub mod invariant;
