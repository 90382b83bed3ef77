//! Flat configuration of a run.
//!
//! Values are merged in this order: defaults, an optional YAML file, then
//! command line flags.
use anyhow::{Context, Result};
use chrono::Local;
use ompo_core::TrainerConfig;
use ompo_tch_agent::{ompo::PolicyType, Device};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

const ALGO: &str = "OMPO";

/// Configuration of a training run.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct RunConfig {
    /// Name of the environment, e.g. `PendulumTransfer-v0`.
    pub env_name: String,

    /// Device of the networks.
    pub device: Device,

    /// Policy type.
    pub policy: PolicyType,

    /// Tag of the experiment.
    pub tag: String,

    /// Random seed.
    pub seed: u64,

    /// Real environment steps taken with random actions.
    pub start_steps: usize,

    /// Tunes the entropy coefficient automatically.
    pub automatic_entropy_tuning: bool,

    /// Real environment steps of the run.
    pub num_steps: usize,

    /// Entropy coefficient when it is not tuned.
    pub alpha: f64,

    /// Discount factor.
    pub gamma: f64,

    /// Soft update coefficient of the target critics.
    pub tau: f64,

    /// Learning rate of the actor, the critics, the entropy coefficient and
    /// the discriminator.
    pub lr: f64,

    /// Hidden units of the actor and the critics.
    pub hidden_size: i64,

    /// Hidden units of the discriminator.
    pub disc_hidden_size: i64,

    /// Batch size of agent updates.
    pub batch_size: usize,

    /// Batch size of discriminator updates.
    pub gail_batch: usize,

    /// Capacity of the global buffer.
    pub replay_size: usize,

    /// Capacity of the local buffer.
    pub local_replay_size: usize,

    /// Agent updates per real step are `updates_per_step * update_repeat`.
    pub updates_per_step: usize,

    /// See `updates_per_step`.
    pub update_repeat: usize,

    /// Sim episodes after each real episode.
    pub sim_episodes_per_real: usize,

    /// Whether to evaluate the agent.
    pub eval: bool,

    /// Evaluation interval in episodes.
    pub eval_episodes: usize,

    /// Whether to save the best model.
    pub save: bool,

    /// Constant added to every reward before it is stored.
    pub reward_offset: f32,

    /// Step limit of both environments. The simulator's own limit when not set.
    pub max_steps: Option<usize>,

    /// Root of result directories.
    pub results_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            env_name: "PendulumTransfer-v0".to_string(),
            device: Device::Cpu,
            policy: PolicyType::Gaussian,
            tag: "default".to_string(),
            seed: 0,
            start_steps: 1000,
            automatic_entropy_tuning: true,
            num_steps: 1_000_000,
            alpha: 0.2,
            gamma: 0.99,
            tau: 0.005,
            lr: 3e-4,
            hidden_size: 256,
            disc_hidden_size: 100,
            batch_size: 256,
            gail_batch: 256,
            replay_size: 1_000_000,
            local_replay_size: 1000,
            updates_per_step: 1,
            update_repeat: 10,
            sim_episodes_per_real: 10,
            eval: true,
            eval_episodes: 10,
            save: true,
            reward_offset: 0.0,
            max_steps: None,
            results_dir: "./results".to_string(),
        }
    }
}

impl RunConfig {
    /// Loads from a YAML file. Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
        let rdr = BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)
            .with_context(|| format!("failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Saves as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Configuration of the trainer, saving checkpoints under `model_dir`.
    pub fn trainer_config(&self, model_dir: impl Into<String>) -> TrainerConfig {
        TrainerConfig::default()
            .num_steps(self.num_steps)
            .start_steps(self.start_steps)
            .batch_size(self.batch_size)
            .gail_batch(self.gail_batch)
            .replay_size(self.replay_size)
            .local_replay_size(self.local_replay_size)
            .updates_per_step(self.updates_per_step)
            .update_repeat(self.update_repeat)
            .sim_episodes_per_real(self.sim_episodes_per_real)
            .eval(self.eval)
            .eval_episodes(self.eval_episodes)
            .save(self.save)
            .reward_offset(self.reward_offset)
            .seed(self.seed)
            .model_dir(model_dir)
    }

    /// Name of the run directory, `<timestamp>_OMPO_<seed>_<autotune>`.
    pub fn run_name(&self, timestamp: &str) -> String {
        let autotune = if self.automatic_entropy_tuning {
            "autotune"
        } else {
            ""
        };
        format!("{}_{}_{}_{}", timestamp, ALGO, self.seed, autotune)
    }

    /// `<results_dir>/<env_name>/OMPO/<tag>/<run_name>`.
    pub fn result_dir(&self, timestamp: &str) -> PathBuf {
        Path::new(&self.results_dir)
            .join(&self.env_name)
            .join(ALGO)
            .join(&self.tag)
            .join(self.run_name(timestamp))
    }

    /// Creates the result directory of a new run and writes `config.log` in it.
    pub fn create_result_dir(&self) -> Result<PathBuf> {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let dir = self.result_dir(&timestamp);
        fs::create_dir_all(dir.join("checkpoint"))
            .with_context(|| format!("failed to create {:?}", dir))?;
        self.save(dir.join("config.log"))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_partial_yaml_keeps_defaults() -> Result<()> {
        let dir = TempDir::new("run_config")?;
        let path = dir.path().join("run.yaml");
        fs::write(&path, "env_name: CartPoleTransfer-v0\nseed: 3\npolicy: Deterministic\n")?;

        let config = RunConfig::load(&path)?;
        assert_eq!(config.env_name, "CartPoleTransfer-v0");
        assert_eq!(config.seed, 3);
        assert_eq!(config.policy, PolicyType::Deterministic);
        assert_eq!(config.batch_size, RunConfig::default().batch_size);
        Ok(())
    }

    #[test]
    fn test_trainer_config() {
        let config = RunConfig {
            reward_offset: 5.0,
            eval: false,
            save: false,
            seed: 11,
            ..RunConfig::default()
        };
        let trainer_config = config.trainer_config("model");
        assert_eq!(trainer_config.reward_offset, 5.0);
        assert!(!trainer_config.eval);
        assert!(!trainer_config.save);
        assert_eq!(trainer_config.seed, 11);
        assert_eq!(trainer_config.model_dir, Some("model".to_string()));
    }

    #[test]
    fn test_result_dir() -> Result<()> {
        let dir = TempDir::new("run_config")?;
        let mut config = RunConfig::default();
        config.results_dir = dir.path().to_string_lossy().to_string();
        config.seed = 5;

        assert_eq!(
            config.result_dir("2024-01-02_03-04-05"),
            dir.path()
                .join("PendulumTransfer-v0/OMPO/default/2024-01-02_03-04-05_OMPO_5_autotune")
        );

        let run_dir = config.create_result_dir()?;
        assert!(run_dir.join("checkpoint").is_dir());
        assert_eq!(RunConfig::load(run_dir.join("config.log"))?, config);

        config.automatic_entropy_tuning = false;
        assert!(config.run_name("t").ends_with("_OMPO_5_"));
        Ok(())
    }
}
