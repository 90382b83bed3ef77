//! Robustness wrapper.
mod base;
mod config;
pub use base::{PerturbableEnv, RobustEnv, RobustEnvConfig, RobustInput};
pub use config::{NoiseConfig, RobustConfig, RobustType};
