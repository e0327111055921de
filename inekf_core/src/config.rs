// inekf_core/src/config.rs

//! Declarative filter setup, loaded from TOML through `figment`.
//!
//! ```toml
//! error = "right"
//!
//! [group]
//! kind = "SE2"
//! columns = 1
//!
//! [initial]
//! tangent = [0.0, 0.0, 0.0]
//! diagonal = [0.1, 0.1, 0.1]
//!
//! [[measurements]]
//! name = "gps"
//! b = [0.0, 0.0, 1.0]
//! noise = [0.01, 0.01]
//! error = "left"
//! ```

use figment::{
    providers::{Format, Toml},
    Figment,
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{InekfError, Result};
use crate::lie::{GroupLayout, GroupState};
use crate::models::measurement::invariant::InvariantMeasurement;
use crate::models::measurement::MeasurementModel;
use crate::types::InvariantError;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// Everything needed to build an [`InEKF`](crate::estimation::InEKF) apart
/// from its process model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default)]
    pub error: InvariantError,

    pub group: GroupLayout,

    #[serde(default)]
    pub initial: InitialStateConfig,

    // The TOML has `[[measurements]]`, which becomes a Vec of MeasurementConfig.
    #[serde(default)]
    pub measurements: Vec<MeasurementConfig>,
}

// =========================================================================
// == Sub-Sections ==
// =========================================================================

/// The initial estimate. The mean is `Exp([tangent | aug])`, identity by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitialStateConfig {
    /// Group part of the initial tangent vector.
    #[serde(default)]
    pub tangent: Option<Vec<f64>>,
    /// Initial augmentation.
    #[serde(default)]
    pub aug: Option<Vec<f64>>,
    /// Diagonal of the initial covariance.
    #[serde(default)]
    pub diagonal: Option<Vec<f64>>,
    /// Standard deviation applied to every tangent axis (`Σ = σ²·I`).
    #[serde(default)]
    pub sigma: Option<f64>,
}

/// An invariant measurement model built from its structural vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeasurementConfig {
    pub name: String,
    pub b: Vec<f64>,
    /// Diagonal of the measurement noise, one entry per rotation axis.
    pub noise: Vec<f64>,
    #[serde(default)]
    pub error: InvariantError,
}

impl FilterConfig {
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Ok(Figment::new().merge(Toml::string(toml)).extract()?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Figment::new().merge(Toml::file(path.as_ref())).extract()?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The initial state, validated against the group layout.
    pub fn build_state(&self) -> Result<GroupState> {
        let layout = self.group;
        layout.validate()?;
        let g = layout.group_dim();

        let mut xi = DVector::zeros(layout.dim());
        if let Some(tangent) = &self.initial.tangent {
            if tangent.len() != g {
                return Err(InekfError::dim("initial tangent", g, tangent.len()));
            }
            xi.rows_mut(0, g).copy_from_slice(tangent);
        }
        if let Some(aug) = &self.initial.aug {
            if aug.len() != layout.aug {
                return Err(InekfError::dim("initial augmentation", layout.aug, aug.len()));
            }
            xi.rows_mut(g, layout.aug).copy_from_slice(aug);
        }

        let n = layout.dim();
        let cov = match (&self.initial.diagonal, self.initial.sigma) {
            (Some(_), Some(_)) => {
                return Err(InekfError::InvalidConstruction(
                    "initial covariance: set either `diagonal` or `sigma`, not both".to_string(),
                ))
            }
            (Some(diagonal), None) => {
                if diagonal.len() != n {
                    return Err(InekfError::dim("initial covariance diagonal", n, diagonal.len()));
                }
                DMatrix::from_diagonal(&DVector::from_column_slice(diagonal))
            }
            (None, Some(sigma)) => DMatrix::identity(n, n) * (sigma * sigma),
            (None, None) => DMatrix::zeros(n, n),
        };

        GroupState::exp(layout, &xi)?.with_covariance(cov)
    }

    /// Every configured measurement model, paired with its name.
    pub fn build_measurement_models(&self) -> Result<Vec<(String, Box<dyn MeasurementModel>)>> {
        self.measurements
            .iter()
            .map(|m| {
                let model = InvariantMeasurement::from_b(
                    self.group,
                    DVector::from_column_slice(&m.b),
                    DMatrix::from_diagonal(&DVector::from_column_slice(&m.noise)),
                    m.error,
                )?;
                Ok((m.name.clone(), Box::new(model) as Box<dyn MeasurementModel>))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lie::GroupKind;
    use approx::assert_abs_diff_eq;

    const SE2_GPS: &str = r#"
        error = "left"

        [group]
        kind = "SE2"
        columns = 1

        [initial]
        tangent = [0.5, 1.0, 2.0]
        sigma = 0.5

        [[measurements]]
        name = "gps"
        b = [0.0, 0.0, 1.0]
        noise = [0.01, 0.01]
        error = "left"
    "#;

    #[test]
    fn test_parse_filter_config() {
        let config = FilterConfig::from_toml_str(SE2_GPS).unwrap();
        assert_eq!(config.group, GroupLayout::se2(1, 0));
        assert_eq!(config.group.kind, GroupKind::SE2);
        assert_eq!(config.error, InvariantError::Left);
        assert_eq!(config.measurements.len(), 1);
        assert_eq!(config.measurements[0].name, "gps");
    }

    #[test]
    fn test_build_state() {
        let config = FilterConfig::from_toml_str(SE2_GPS).unwrap();
        let state = config.build_state().unwrap();

        let xi = DVector::from_vec(vec![0.5, 1.0, 2.0]);
        assert_abs_diff_eq!(state.log(), xi, epsilon = 1e-12);
        assert_abs_diff_eq!(
            state.cov().unwrap().clone(),
            DMatrix::identity(3, 3) * 0.25,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_build_measurement_models() {
        let config = FilterConfig::from_toml_str(SE2_GPS).unwrap();
        let models = config.build_measurement_models().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].0, "gps");
        assert_eq!(models[0].1.error(), InvariantError::Left);
        assert!(models[0].1.supports(&config.group));
    }

    #[test]
    fn test_defaults_and_validation() {
        let config = FilterConfig::from_toml_str(
            r#"
            [group]
            kind = "SO3"
            aug = 2

            [initial]
            aug = [1.0, 2.0]
            diagonal = [1.0, 1.0, 1.0, 0.1, 0.1]
            "#,
        )
        .unwrap();
        assert_eq!(config.error, InvariantError::Right);
        let state = config.build_state().unwrap();
        assert_eq!(state.aug(), &DVector::from_vec(vec![1.0, 2.0]));
        assert_eq!(state.cov().unwrap()[(4, 4)], 0.1);

        let bad = FilterConfig::from_toml_str(
            r#"
            [group]
            kind = "SO3"
            columns = 1
            "#,
        )
        .unwrap();
        assert!(matches!(bad.build_state(), Err(InekfError::InvalidConstruction(_))));
    }

    #[test]
    fn test_write_and_reload() {
        let config = FilterConfig::from_toml_str(SE2_GPS).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(FilterConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_unknown_fields_are_config_errors() {
        let err = FilterConfig::from_toml_str(
            r#"
            [group]
            kind = "SE2"
            colums = 1
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, InekfError::Config(_)));
        assert!(!err.is_numerical());
    }
}
