// inekf_core/src/estimation/mod.rs

pub mod inekf;

pub use inekf::InEKF;
