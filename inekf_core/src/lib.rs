// inekf_core/src/lib.rs

//! An Invariant Extended Kalman Filter on matrix Lie groups.

pub mod config;
pub mod error;
pub mod estimation;
pub mod lie;
pub mod models;
pub mod prelude;
pub mod types;
