//! Discriminator.
use crate::replay_buffer::{SimpleReplayBuffer, TransitionBatch};
use anyhow::Result;
use std::path::Path;

/// Binary classifier over `(state, action, next_state)` triples.
///
/// Transitions of the expert buffer are labeled 1 and those of the policy
/// buffer 0. The trained classifier gives the agent an estimate of the log
/// density ratio between the two distributions.
pub trait Discriminator {
    /// Samples `batch_size` transitions from each buffer and performs one
    /// gradient step on the classification loss, which is returned.
    ///
    /// Fails with [`OmpoError::InsufficientTransitions`] if a buffer holds
    /// fewer than `batch_size` transitions.
    ///
    /// [`OmpoError::InsufficientTransitions`]: crate::error::OmpoError::InsufficientTransitions
    fn update(
        &mut self,
        expert: &mut SimpleReplayBuffer,
        policy: &mut SimpleReplayBuffer,
        batch_size: usize,
    ) -> Result<f32>;

    /// Returns `log(D / (1 - D))` for each transition of the batch.
    fn log_ratio(&self, batch: &TransitionBatch) -> Result<Vec<f32>>;

    /// Save the parameters in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
