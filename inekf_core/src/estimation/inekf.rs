// inekf_core/src/estimation/inekf.rs

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace, warn};

use crate::config::FilterConfig;
use crate::error::{InekfError, Result};
use crate::lie::GroupState;
use crate::models::measurement::{Innovation, MeasurementModel};
use crate::models::process::ProcessModel;
use crate::types::{InvariantError, MatrixCov};

/// An Invariant Extended Kalman Filter.
///
/// The filter owns one uncertain group state, one process model and a registry
/// of named measurement models. Every `predict`/`update` either succeeds and
/// replaces the state, or fails and leaves it exactly as it was.
#[derive(Debug, Clone)]
pub struct InEKF<P: ProcessModel> {
    /// The current estimate (mean, covariance and augmentation).
    state: GroupState,
    /// Convention fixed for the lifetime of the filter.
    error: InvariantError,

    process: P,

    // Measurement models, keyed by the name passed to `update`.
    measurements: HashMap<String, Box<dyn MeasurementModel>>,
}

impl<P: ProcessModel> InEKF<P> {
    /// Creates a new filter. The initial state must carry a covariance.
    pub fn new(process: P, state: GroupState, error: InvariantError) -> Result<Self> {
        check_state(&process, &state)?;
        debug!(layout = %state.layout(), ?error, "InEKF created");
        Ok(Self {
            state,
            error,
            process,
            measurements: HashMap::new(),
        })
    }

    /// Builds the initial state and every measurement model described by `config`.
    pub fn from_config(process: P, config: &FilterConfig) -> Result<Self> {
        let mut filter = Self::new(process, config.build_state()?, config.error)?;
        filter.register_measurement_models(config.build_measurement_models()?)?;
        Ok(filter)
    }

    // --- Accessors ---

    pub fn state(&self) -> &GroupState {
        &self.state
    }

    /// Replaces the current estimate, e.g. after growing it with new columns.
    pub fn set_state(&mut self, state: GroupState) -> Result<()> {
        check_state(&self.process, &state)?;
        self.state = state;
        Ok(())
    }

    pub fn error(&self) -> InvariantError {
        self.error
    }

    pub fn process_model(&self) -> &P {
        &self.process
    }

    pub fn process_model_mut(&mut self) -> &mut P {
        &mut self.process
    }

    pub fn measurement_model(&self, name: &str) -> Option<&dyn MeasurementModel> {
        self.measurements.get(name).map(|m| m.as_ref())
    }

    // --- Registration ---

    /// Adds a measurement model under `name`, replacing any previous one.
    pub fn register_measurement_model(
        &mut self,
        name: impl Into<String>,
        model: Box<dyn MeasurementModel>,
    ) -> Result<()> {
        let name = name.into();
        if !model.supports(self.state.layout()) {
            return Err(InekfError::InvalidConstruction(format!(
                "measurement model '{}' does not support {}",
                name,
                self.state.layout()
            )));
        }
        debug!(%name, error = ?model.error(), "Registered measurement model");
        if self.measurements.insert(name.clone(), model).is_some() {
            debug!(%name, "Replaced an existing measurement model");
        }
        Ok(())
    }

    pub fn register_measurement_models<I, S>(&mut self, models: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Box<dyn MeasurementModel>)>,
        S: Into<String>,
    {
        for (name, model) in models {
            self.register_measurement_model(name, model)?;
        }
        Ok(())
    }

    // --- The InEKF Algorithm ---

    /// Propagates the estimate by `dt` with control `u`:
    /// `X ← f(u, dt, X)`, `Σ ← Φ · (Σ + Q·dt) · Φᵀ`.
    pub fn predict(&mut self, u: &P::Control, dt: f64) -> Result<&GroupState> {
        let prior = &self.state;
        let cov = uncertain_cov(prior)?;
        let n = prior.layout().dim();

        // 1. Propagate the mean.
        let mut propagated = self.process.propagate(u, dt, prior)?;
        if propagated.layout() != prior.layout() {
            return Err(InekfError::InvalidConstruction(format!(
                "process model changed the layout from {} to {}",
                prior.layout(),
                propagated.layout()
            )));
        }

        // 2. Linearize the error dynamics around the new mean.
        let phi = self.process.transition(u, dt, &propagated, self.error)?;
        if phi.shape() != (n, n) {
            return Err(InekfError::shape("transition matrix", (n, n), phi.shape()));
        }

        // 3. Noise is modelled in the body frame; a right-invariant error sees
        //    it through the adjoint of the propagated mean.
        let q = self.process.q();
        if q.shape() != (n, n) {
            return Err(InekfError::shape("process noise", (n, n), q.shape()));
        }
        let q = match self.error {
            InvariantError::Right => {
                let ad = propagated.adjoint();
                &ad * q * ad.transpose()
            }
            InvariantError::Left => q.clone(),
        };

        // 4. Propagate the covariance.
        let p = &phi * (cov + q * dt) * phi.transpose();
        propagated.set_cov(symmetrize(p))?;

        trace!(
            dt,
            trace = propagated.cov().map_or(0.0, |c| c.trace()),
            "InEKF predict"
        );
        self.state = propagated;
        Ok(&self.state)
    }

    /// Fuses the measurement `z` through the model registered as `name`.
    pub fn update(&mut self, name: &str, z: &DVector<f64>) -> Result<&GroupState> {
        let model = self.measurements.get(name).ok_or_else(|| {
            warn!(%name, "Update rejected: no such measurement model");
            InekfError::UnknownMeasurement(name.to_string())
        })?;

        let Innovation { v, h_error, s_inv } = model
            .evaluate(z, &self.state, self.error)
            .inspect_err(|e| warn!(%name, error = %e, "Update rejected"))?;

        let cov = uncertain_cov(&self.state)?;
        let layout = *self.state.layout();
        let n = layout.dim();
        check_innovation(&v, &h_error, &s_inv, n)
            .inspect_err(|e| warn!(%name, error = %e, "Update rejected"))?;

        // Kalman gain and correction in the tangent space.
        let k = cov * h_error.transpose() * s_inv;
        let delta = &k * &v;
        let correction = GroupState::exp(layout, &delta)?;

        // The correction multiplies onto the side the error lives on. Its
        // augmentation tail adds onto the state's augmentation.
        let mut updated = match self.error {
            InvariantError::Right => correction.compose(&self.state)?,
            InvariantError::Left => self.state.compose(&correction)?,
        };

        let p = (DMatrix::identity(n, n) - &k * &h_error) * cov;
        updated.set_cov(symmetrize(p))?;

        trace!(
            %name,
            innovation = v.norm(),
            trace = updated.cov().map_or(0.0, |c| c.trace()),
            "InEKF update"
        );
        self.state = updated;
        Ok(&self.state)
    }
}

fn check_state<P: ProcessModel>(process: &P, state: &GroupState) -> Result<()> {
    if !state.is_uncertain() {
        return Err(InekfError::InvalidConstruction(
            "filter state must carry a covariance".to_string(),
        ));
    }
    if !process.supports(state.layout()) {
        return Err(InekfError::InvalidConstruction(format!(
            "process model does not support {}",
            state.layout()
        )));
    }
    Ok(())
}

// A model's output has to line up with the state before it enters the gain.
fn check_innovation(
    v: &DVector<f64>,
    h_error: &DMatrix<f64>,
    s_inv: &DMatrix<f64>,
    n: usize,
) -> Result<()> {
    let k = h_error.nrows();
    if h_error.ncols() != n {
        return Err(InekfError::shape("linearized observation", (k, n), h_error.shape()));
    }
    if s_inv.shape() != (k, k) {
        return Err(InekfError::shape("inverse innovation covariance", (k, k), s_inv.shape()));
    }
    if v.len() != k {
        return Err(InekfError::dim("innovation", k, v.len()));
    }
    Ok(())
}

fn uncertain_cov(state: &GroupState) -> Result<&MatrixCov> {
    state.cov().ok_or_else(|| {
        InekfError::InvalidConstruction("filter state lost its covariance".to_string())
    })
}

// Tiny numerical errors can make P slightly non-symmetric. This forces it.
fn symmetrize(p: MatrixCov) -> MatrixCov {
    (&p + p.transpose()) * 0.5
}
