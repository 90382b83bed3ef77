//! Configuration of [`Trainer`](super::Trainer).
use crate::error::OmpoError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Training stops after the first episode that ends past this many real
    /// environment steps.
    pub num_steps: usize,

    /// Number of real environment steps taken with random actions.
    pub start_steps: usize,

    /// Batch size of agent updates. Also the number of initial states
    /// collected before training.
    pub batch_size: usize,

    /// Batch size of discriminator updates.
    pub gail_batch: usize,

    /// Capacity of the global and initial state buffers.
    pub replay_size: usize,

    /// Capacity of the local and temp buffers.
    pub local_replay_size: usize,

    /// Agent updates per real environment step are `updates_per_step * update_repeat`.
    pub updates_per_step: usize,

    /// See `updates_per_step`.
    pub update_repeat: usize,

    /// Number of temp buffer refills in a discriminator refresh.
    pub n_refresh_rounds: usize,

    /// Number of discriminator updates per temp buffer refill.
    pub n_disc_updates: usize,

    /// Number of sim environment episodes after each real episode.
    pub sim_episodes_per_real: usize,

    /// Whether to evaluate the agent.
    pub eval: bool,

    /// Evaluation interval in episodes, also the number of episodes of an evaluation.
    pub eval_episodes: usize,

    /// Whether to save the best model.
    pub save: bool,

    /// Constant added to every reward before it is stored.
    pub reward_offset: f32,

    /// Random seed of environments and buffers.
    pub seed: u64,

    /// Where to save the trained model.
    pub model_dir: Option<String>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_steps: 1_000_000,
            start_steps: 1000,
            batch_size: 256,
            gail_batch: 256,
            replay_size: 1_000_000,
            local_replay_size: 1000,
            updates_per_step: 1,
            update_repeat: 10,
            n_refresh_rounds: 10,
            n_disc_updates: 20,
            sim_episodes_per_real: 10,
            eval: true,
            eval_episodes: 10,
            save: true,
            reward_offset: 0.0,
            seed: 42,
            model_dir: None,
        }
    }
}

impl TrainerConfig {
    /// Sets the step budget.
    pub fn num_steps(mut self, v: usize) -> Self {
        self.num_steps = v;
        self
    }

    /// Sets the number of warmup steps.
    pub fn start_steps(mut self, v: usize) -> Self {
        self.start_steps = v;
        self
    }

    /// Sets the batch size of agent updates.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the batch size of discriminator updates.
    pub fn gail_batch(mut self, v: usize) -> Self {
        self.gail_batch = v;
        self
    }

    /// Sets the capacity of the global and initial state buffers.
    pub fn replay_size(mut self, v: usize) -> Self {
        self.replay_size = v;
        self
    }

    /// Sets the capacity of the local and temp buffers.
    pub fn local_replay_size(mut self, v: usize) -> Self {
        self.local_replay_size = v;
        self
    }

    /// Sets the number of agent updates per step, before `update_repeat`.
    pub fn updates_per_step(mut self, v: usize) -> Self {
        self.updates_per_step = v;
        self
    }

    /// Sets the multiplier of `updates_per_step`.
    pub fn update_repeat(mut self, v: usize) -> Self {
        self.update_repeat = v;
        self
    }

    /// Sets the number of temp buffer refills in a discriminator refresh.
    pub fn n_refresh_rounds(mut self, v: usize) -> Self {
        self.n_refresh_rounds = v;
        self
    }

    /// Sets the number of discriminator updates per refill.
    pub fn n_disc_updates(mut self, v: usize) -> Self {
        self.n_disc_updates = v;
        self
    }

    /// Sets the number of sim episodes per real episode.
    pub fn sim_episodes_per_real(mut self, v: usize) -> Self {
        self.sim_episodes_per_real = v;
        self
    }

    /// Enables or disables evaluation.
    pub fn eval(mut self, v: bool) -> Self {
        self.eval = v;
        self
    }

    /// Sets the evaluation interval in episodes.
    pub fn eval_episodes(mut self, v: usize) -> Self {
        self.eval_episodes = v;
        self
    }

    /// Enables or disables saving the best model.
    pub fn save(mut self, v: bool) -> Self {
        self.save = v;
        self
    }

    /// Sets the reward offset.
    pub fn reward_offset(mut self, v: f32) -> Self {
        self.reward_offset = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the directory where the best model is saved.
    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    /// Checks the relations between buffer capacities and batch sizes.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(OmpoError::InvalidConfig(msg).into()) };

        if self.replay_size == 0 || self.local_replay_size == 0 {
            return invalid("buffer capacities must be positive".to_string());
        }
        if self.batch_size > self.replay_size {
            return invalid(format!(
                "batch_size ({}) exceeds replay_size ({})",
                self.batch_size, self.replay_size
            ));
        }
        if self.local_replay_size > self.replay_size {
            return invalid(format!(
                "local_replay_size ({}) exceeds replay_size ({})",
                self.local_replay_size, self.replay_size
            ));
        }
        if self.gail_batch > self.local_replay_size {
            return invalid(format!(
                "gail_batch ({}) exceeds local_replay_size ({})",
                self.gail_batch, self.local_replay_size
            ));
        }
        if self.eval && self.eval_episodes == 0 {
            return invalid("eval_episodes must be positive when eval is enabled".to_string());
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .num_steps(5000)
            .start_steps(100)
            .reward_offset(1.5)
            .model_dir("some/directory");

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save_yaml(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(TrainerConfig::default().validate().is_ok());
        assert!(TrainerConfig::default()
            .local_replay_size(100)
            .gail_batch(256)
            .validate()
            .is_err());
        assert!(TrainerConfig::default()
            .replay_size(10)
            .validate()
            .is_err());
        assert!(TrainerConfig::default()
            .eval_episodes(0)
            .validate()
            .is_err());
    }
}
