#![warn(missing_docs)]
//! Core of the OMPO training stack.
//!
//! This crate holds the backend-independent parts: environment, policy, agent and
//! discriminator interfaces, the ring replay buffer shared by all of them, records
//! and recorders, an evaluator and the phase-driven [`Trainer`] that alternates
//! between a perturbed "real" environment and a nominal "sim" environment.
//!
//! Neural networks live in downstream crates, which implement [`Agent`] and
//! [`Discriminator`] for a concrete deep-learning backend.
pub mod dummy;
pub mod error;
pub mod evaluator;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Act, Agent, Configurable, Discriminator, Env, Info, Obs, Policy, Step, UpdateInfo,
};

mod trainer;
pub use trainer::{continuation_mask, Buffers, Phase, Trainer, TrainerConfig, TrainerState};
