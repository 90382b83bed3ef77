//! Environment.
use super::{Act, Info, Obs, Step};
use crate::record::Record;
use anyhow::Result;

/// Represents an environment, typically an MDP with continuous observations
/// and actions.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Act;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Performs an environment step.
    ///
    /// The environment sets [`Step::is_truncated`] when the episode reaches
    /// [`Env::max_episode_steps`]. It is not reset automatically.
    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Resets the environment with a given index.
    ///
    /// The index is used to derive the random state of the episode, so that
    /// evaluation runs with the same indices start from the same states.
    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs>;

    /// Samples an action uniformly from the action space.
    fn sample_act(&mut self) -> Self::Act;

    /// Dimension of observations.
    fn obs_dim(&self) -> usize;

    /// Dimension of actions.
    fn act_dim(&self) -> usize;

    /// The step limit of an episode.
    fn max_episode_steps(&self) -> usize;
}
