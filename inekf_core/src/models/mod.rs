// inekf_core/src/models/mod.rs

pub mod measurement;
pub mod process;
