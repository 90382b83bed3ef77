//! Agent.
use super::{Discriminator, Env, Policy};
use crate::{
    record::{Record, RecordValue},
    replay_buffer::SimpleReplayBuffer,
};
use anyhow::Result;
use std::path::Path;

/// Losses and temperature reported by one call of [`Agent::update_parameters`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateInfo {
    /// Loss of the critics, averaged over critics.
    pub critic_loss: f32,

    /// Loss of the policy.
    pub policy_loss: f32,

    /// Loss of the entropy coefficient. Zero when the coefficient is fixed.
    pub entropy_loss: f32,

    /// Entropy coefficient after the update.
    pub alpha: f32,
}

impl UpdateInfo {
    /// Converts the values into a [`Record`] with the given step counter.
    pub fn to_record(&self, step: usize) -> Record {
        Record::from_slice(&[
            ("step", RecordValue::Step(step)),
            ("loss/critic", RecordValue::Scalar(self.critic_loss)),
            ("loss/policy", RecordValue::Scalar(self.policy_loss)),
            ("loss/entropy_loss", RecordValue::Scalar(self.entropy_loss)),
            ("entropy_temprature/alpha", RecordValue::Scalar(self.alpha)),
        ])
    }
}

/// Represents a trainable policy on an environment.
///
/// In training mode [`Policy::sample`] draws from the stochastic policy; in
/// evaluation mode it returns the deterministic (mean) action.
pub trait Agent<E: Env>: Policy<E> {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Performs one gradient step on each network.
    ///
    /// `initial` holds initial states of episodes, `global` holds all collected
    /// transitions. `discriminator` supplies the log density ratio used to
    /// correct rewards. `updates` is the number of updates done so far.
    fn update_parameters(
        &mut self,
        initial: &mut SimpleReplayBuffer,
        global: &mut SimpleReplayBuffer,
        discriminator: &dyn Discriminator,
        batch_size: usize,
        updates: usize,
    ) -> Result<UpdateInfo>;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
