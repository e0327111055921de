// inekf_core/src/error.rs

use thiserror::Error;

/// Every failure the filter core can report to its caller.
///
/// The variants split into configuration errors (a bug or a bad setup on the
/// caller's side) and numerical failures (a degenerate covariance at runtime).
/// Use [`InekfError::is_numerical`] to tell the two apart.
#[derive(Debug, Error)]
pub enum InekfError {
    /// A vector had an unexpected length.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A matrix had an unexpected shape.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Both operands of a composition carry a covariance.
    #[error("cannot compose two uncertain group elements")]
    InvalidComposition,

    /// A state, model or filter was built in a way that can never work.
    #[error("invalid construction: {0}")]
    InvalidConstruction(String),

    /// `update` was called with a name that has no registered model.
    #[error("no measurement model registered under '{0}'")]
    UnknownMeasurement(String),

    /// A matrix that must be inverted was singular.
    #[error("numerical failure: {0} is singular")]
    SingularMatrix(&'static str),

    /// The filter configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The filter configuration could not be written out as TOML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl InekfError {
    /// True for failures caused by degenerate numbers rather than by a wrong setup.
    pub fn is_numerical(&self) -> bool {
        matches!(self, InekfError::SingularMatrix(_))
    }

    pub(crate) fn dim(context: &'static str, expected: usize, actual: usize) -> Self {
        InekfError::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }

    pub(crate) fn shape(
        context: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        InekfError::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }
}

impl From<figment::Error> for InekfError {
    fn from(e: figment::Error) -> Self {
        InekfError::Config(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, InekfError>;
