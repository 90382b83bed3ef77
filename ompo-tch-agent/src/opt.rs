//! Optimizers.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};
use tch::{
    nn::{Adam, AdamW, Optimizer as Optimizer_, OptimizerConfig as OptimizerConfig_, VarStore},
    Tensor,
};

/// Configures an optimizer of a network.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
    },

    /// Adam with decoupled weight decay.
    AdamW {
        /// Learning rate.
        lr: f64,
        /// Weight decay.
        wd: f64,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 3e-4 }
    }
}

impl OptimizerConfig {
    /// Constructs an optimizer.
    pub fn build(&self, vs: &VarStore) -> Result<Optimizer> {
        let opt = match self {
            Self::Adam { lr } => Adam::default().build(vs, *lr)?,
            Self::AdamW { lr, wd } => AdamW {
                wd: *wd,
                ..AdamW::default()
            }
            .build(vs, *lr)?,
        };
        Ok(Optimizer(opt))
    }

    /// Returns the learning rate.
    pub fn lr(&self) -> f64 {
        match self {
            Self::Adam { lr } | Self::AdamW { lr, .. } => *lr,
        }
    }

    /// Loads [`OptimizerConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`OptimizerConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Thin wrapper of [tch::nn::Optimizer].
///
/// [tch::nn::Optimizer]: https://docs.rs/tch/0.16.0/tch/nn/struct.Optimizer.html
pub struct Optimizer(Optimizer_);

impl Optimizer {
    /// Applies a backward step pass.
    pub fn backward_step(&mut self, loss: &Tensor) {
        self.0.backward_step(loss);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_optimizer_config() -> Result<()> {
        let config = OptimizerConfig::AdamW { lr: 1e-3, wd: 0.01 };
        let s = serde_yaml::to_string(&config)?;
        assert_eq!(serde_yaml::from_str::<OptimizerConfig>(&s)?, config);
        assert_eq!(config.lr(), 1e-3);
        Ok(())
    }

    #[test]
    fn test_optimizer_config_file() -> Result<()> {
        let dir = TempDir::new("optimizer_config")?;
        let path = dir.path().join("opt.yaml");
        let config = OptimizerConfig::Adam { lr: 5e-4 };

        config.save(&path)?;
        assert_eq!(OptimizerConfig::load(&path)?, config);
        Ok(())
    }
}
