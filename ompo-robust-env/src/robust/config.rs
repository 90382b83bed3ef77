//! Description of a perturbation.
use crate::PhysicsParams;
use anyhow::Result;
use ompo_core::error::OmpoError;
use rand::{rngs::StdRng, Rng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// What a perturbation corrupts.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum RobustType {
    /// No corruption.
    None,

    /// Noise added to observations.
    State,

    /// Noise added to actions before they reach the simulator.
    Action,

    /// Noise added to rewards.
    Reward,

    /// Physical parameters overridden on every reset, with gravity scaled by noise.
    Dynamics,
}

/// Noise distribution.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(rename_all = "snake_case")]
pub enum NoiseConfig {
    /// Normal distribution.
    Gauss {
        /// Mean.
        mu: f32,
        /// Standard deviation.
        sigma: f32,
    },

    /// A constant.
    Shift {
        /// Value.
        shift: f32,
    },

    /// Uniform distribution on `[low, high)`.
    Uniform {
        /// Lower bound.
        low: f32,
        /// Upper bound.
        high: f32,
    },
}

impl NoiseConfig {
    /// Checks the parameters of the distribution.
    pub fn validate(&self) -> Result<()> {
        match self {
            NoiseConfig::Gauss { sigma, .. } if !(*sigma >= 0.0) => Err(
                OmpoError::InvalidConfig(format!("negative sigma: {}", sigma)).into(),
            ),
            NoiseConfig::Uniform { low, high } if !(low < high) => Err(OmpoError::InvalidConfig(
                format!("empty uniform range: [{}, {})", low, high),
            )
            .into()),
            _ => Ok(()),
        }
    }

    /// Draws one value.
    pub fn sample(&self, rng: &mut StdRng) -> f32 {
        match self {
            NoiseConfig::Gauss { mu, sigma } => match Normal::new(*mu, *sigma) {
                Ok(normal) => normal.sample(rng),
                Err(_) => *mu,
            },
            NoiseConfig::Shift { shift } => *shift,
            NoiseConfig::Uniform { low, high } => rng.gen_range(*low..*high),
        }
    }
}

/// Configuration of a perturbation.
///
/// At each step the perturbation is applied with probability `probability`.
/// Noise values are multiplied by `noise_factor`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct RobustConfig {
    /// What is corrupted.
    pub robust_type: RobustType,

    /// Noise distribution.
    pub noise: NoiseConfig,

    /// Scale of the noise.
    pub noise_factor: f32,

    /// Probability of applying the perturbation at a step.
    pub probability: f32,

    /// Physical parameters applied for [`RobustType::Dynamics`].
    pub dynamics: PhysicsParams,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self {
            robust_type: RobustType::None,
            noise: NoiseConfig::Gauss {
                mu: 0.0,
                sigma: 1.0,
            },
            noise_factor: 0.1,
            probability: 1.0,
            dynamics: PhysicsParams::default(),
        }
    }
}

impl RobustConfig {
    /// Sets the target of the perturbation.
    pub fn robust_type(mut self, v: RobustType) -> Self {
        self.robust_type = v;
        self
    }

    /// Sets the noise distribution.
    pub fn noise(mut self, v: NoiseConfig) -> Self {
        self.noise = v;
        self
    }

    /// Sets the noise scale.
    pub fn noise_factor(mut self, v: f32) -> Self {
        self.noise_factor = v;
        self
    }

    /// Sets the probability of applying the perturbation.
    pub fn probability(mut self, v: f32) -> Self {
        self.probability = v;
        self
    }

    /// Sets the physical parameters of [`RobustType::Dynamics`].
    pub fn dynamics(mut self, v: PhysicsParams) -> Self {
        self.dynamics = v;
        self
    }

    /// Checks the values.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(OmpoError::InvalidConfig(format!(
                "probability out of [0, 1]: {}",
                self.probability
            ))
            .into());
        }
        self.noise.validate()
    }

    /// Draws a scaled noise value, or `None` if the perturbation is skipped at this step.
    pub(crate) fn draw(&self, rng: &mut StdRng) -> Option<f32> {
        if self.probability < 1.0 && rng.gen::<f32>() >= self.probability {
            None
        } else {
            Some(self.noise_factor * self.noise.sample(rng))
        }
    }

    /// Constructs [`RobustConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RobustConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tempdir::TempDir;

    #[test]
    fn test_serde_robust_config() -> Result<()> {
        let config = RobustConfig::default()
            .robust_type(RobustType::Action)
            .noise(NoiseConfig::Uniform {
                low: -0.5,
                high: 0.5,
            })
            .dynamics(PhysicsParams::default().gravity(19.62));

        let dir = TempDir::new("robust_config")?;
        let path = dir.path().join("robust.yaml");
        config.save(&path)?;
        assert_eq!(RobustConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_noise_ranges() {
        let mut rng = StdRng::seed_from_u64(0);
        let uniform = NoiseConfig::Uniform {
            low: -0.5,
            high: 0.5,
        };
        assert!((0..1000)
            .map(|_| uniform.sample(&mut rng))
            .all(|x| (-0.5..0.5).contains(&x)));
        assert_eq!(NoiseConfig::Shift { shift: 0.3 }.sample(&mut rng), 0.3);
    }

    #[test]
    fn test_zero_probability_never_draws() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = RobustConfig::default().probability(0.0);
        assert!((0..100).all(|_| config.draw(&mut rng).is_none()));
    }

    #[test]
    fn test_validate() {
        assert!(RobustConfig::default().validate().is_ok());
        assert!(RobustConfig::default().probability(1.5).validate().is_err());
        assert!(RobustConfig::default()
            .noise(NoiseConfig::Uniform { low: 1.0, high: 1.0 })
            .validate()
            .is_err());
    }
}
