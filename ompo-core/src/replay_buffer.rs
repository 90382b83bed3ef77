//! Ring replay buffer of transitions.
//!
//! The trainer owns four instances of [`SimpleReplayBuffer`]: a global buffer
//! of every collected transition, a buffer of initial states, a local buffer of
//! recent real-environment transitions and a temporary buffer resampled from
//! the global one. All of them are plain values lent to the agent and the
//! discriminator by mutable reference.
mod base;
mod batch;
mod config;
pub use base::SimpleReplayBuffer;
pub use batch::{Transition, TransitionBatch};
pub use config::SimpleReplayBufferConfig;
