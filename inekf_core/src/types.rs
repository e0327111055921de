// inekf_core/src/types.rs

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

// --- Core Type Aliases ---
/// A vector in the Lie algebra, ordered rotation, then one block per column, then augmentation.
pub type TangentVector = DVector<f64>;
/// An N x N matrix over the tangent space (covariances, adjoints, transition matrices).
pub type MatrixCov = DMatrix<f64>;
/// An M x M group (or algebra) matrix.
pub type MatrixState = DMatrix<f64>;

// --- Invariant Error Convention ---
/// Which side the estimation error lives on.
///
/// * `Right`: the true state is `Exp(ξ) · X̂`, so corrections multiply onto the
///   mean from the left: `X̂ ← Exp(δ) · X̂`.
/// * `Left`: the true state is `X̂ · Exp(ξ)`, so corrections multiply from the
///   right: `X̂ ← X̂ · Exp(δ)`.
///
/// A filter instance fixes one convention for its whole life; measurement models
/// carry their own and are converted through the adjoint when the two differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvariantError {
    Left,
    #[default]
    Right,
}

impl InvariantError {
    /// The other convention.
    pub fn flipped(self) -> Self {
        match self {
            InvariantError::Left => InvariantError::Right,
            InvariantError::Right => InvariantError::Left,
        }
    }
}
