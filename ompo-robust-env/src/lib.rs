#![warn(missing_docs)]
//! Simulators with a robustness wrapper.
//!
//! [`RobustEnv`] wraps a [`PerturbableEnv`] and implements
//! [`ompo_core::Env`]. On each step it can corrupt the action, the observation
//! or the reward with configured noise, and on each reset it can override
//! physical parameters such as gravity, wind or segment lengths.
//!
//! Two simulators are provided: [`Pendulum`] and a continuous-action
//! [`CartPole`]. [`transfer`] builds the real/sim configuration pairs used for
//! domain-transfer training.
mod obs_act;
mod robust;
mod sim;
pub mod transfer;

pub use obs_act::{SimAct, SimObs};
pub use robust::{
    NoiseConfig, PerturbableEnv, RobustConfig, RobustEnv, RobustEnvConfig, RobustInput,
    RobustType,
};
pub use sim::{CartPole, CartPoleConfig, Pendulum, PendulumConfig, PhysicsParams};
