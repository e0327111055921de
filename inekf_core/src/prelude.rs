// inekf_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::models::measurement::{Innovation, MeasurementModel};
pub use crate::models::process::ProcessModel;

// --- Core Data Structures ---
pub use crate::error::{InekfError, Result};
pub use crate::lie::{GroupKind, GroupLayout, GroupState};
pub use crate::types::{InvariantError, MatrixCov, MatrixState, TangentVector};

// --- Estimation ---
pub use crate::config::{FilterConfig, InitialStateConfig, MeasurementConfig};
pub use crate::estimation::InEKF;

// --- Concrete Model Implementations ---
pub use crate::models::measurement::invariant::InvariantMeasurement;
pub use crate::models::process::odometry::OdometryProcess;
