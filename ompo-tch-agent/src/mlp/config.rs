use crate::util::OutDim;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Mlp`](super::Mlp) and [`Mlp2`](super::Mlp2).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct MlpConfig {
    /// Input dimension.
    pub in_dim: i64,

    /// Units of the hidden layers.
    pub units: Vec<i64>,

    /// Output dimension.
    pub out_dim: i64,

    /// Applies ReLU to the output.
    #[serde(default)]
    pub activation_out: bool,
}

impl MlpConfig {
    /// Creates a configuration without output activation.
    pub fn new(in_dim: i64, units: Vec<i64>, out_dim: i64) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation_out: false,
        }
    }

    /// Sets the output activation.
    pub fn activation_out(mut self, v: bool) -> Self {
        self.activation_out = v;
        self
    }

    /// Sets the input dimension.
    pub fn in_dim(mut self, v: i64) -> Self {
        self.in_dim = v;
        self
    }

    /// Loads [`MlpConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`MlpConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Width of the last hidden layer, or the input if there is none.
    pub(super) fn last_hidden_dim(&self) -> i64 {
        *self.units.last().unwrap_or(&self.in_dim)
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> i64 {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: i64) {
        self.out_dim = out_dim;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_mlp_config_file() -> Result<()> {
        let dir = TempDir::new("mlp_config")?;
        let path = dir.path().join("mlp.yaml");
        let config = MlpConfig::new(3, vec![64, 64], 2).activation_out(true);

        config.save(&path)?;
        let loaded = MlpConfig::load(&path)?;
        assert_eq!(loaded, config);
        assert_eq!(loaded.last_hidden_dim(), 64);
        Ok(())
    }

    #[test]
    fn test_activation_out_defaults_to_false() -> Result<()> {
        let dir = TempDir::new("mlp_config")?;
        let path = dir.path().join("mlp.yaml");
        std::fs::write(&path, "in_dim: 4\nunits: []\nout_dim: 1\n")?;

        let config = MlpConfig::load(&path)?;
        assert!(!config.activation_out);
        assert_eq!(config.last_hidden_dim(), 4);
        Ok(())
    }
}
