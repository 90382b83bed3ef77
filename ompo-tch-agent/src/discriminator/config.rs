use crate::{mlp::MlpConfig, opt::OptimizerConfig, Device};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`SasDiscriminator`](super::SasDiscriminator).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DiscriminatorConfig {
    /// Network. Its input dimension is `2 * obs_dim + act_dim` and its output
    /// dimension is 1.
    pub net_config: MlpConfig,

    /// Optimizer.
    pub opt_config: OptimizerConfig,

    /// Log density ratios are clipped to `[-clip, clip]`.
    pub clip: f32,

    /// Coefficient of the gradient penalty. Zero disables it.
    pub grad_penalty: f64,

    /// Random seed.
    pub seed: Option<i64>,

    /// Device.
    pub device: Option<Device>,
}

impl DiscriminatorConfig {
    /// Configuration for the given dimensions with hidden layers `units`.
    pub fn new(obs_dim: usize, act_dim: usize, units: Vec<i64>) -> Self {
        Self {
            net_config: MlpConfig::new((2 * obs_dim + act_dim) as i64, units, 1),
            opt_config: OptimizerConfig::Adam { lr: 3e-4 },
            clip: 10.0,
            grad_penalty: 0.0,
            seed: None,
            device: None,
        }
    }

    /// Sets the optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the clipping bound of log density ratios.
    pub fn clip(mut self, v: f32) -> Self {
        self.clip = v;
        self
    }

    /// Sets the coefficient of the gradient penalty.
    pub fn grad_penalty(mut self, v: f64) -> Self {
        self.grad_penalty = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = Some(v);
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: tch::Device) -> Self {
        self.device = Some(v.into());
        self
    }

    /// Constructs [`DiscriminatorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DiscriminatorConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
