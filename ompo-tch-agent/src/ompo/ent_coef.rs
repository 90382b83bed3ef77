//! Entropy coefficient.
use anyhow::Result;
use log::{info, trace};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tch::{nn, nn::OptimizerConfig, Tensor};

/// Mode of the entropy coefficient.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum EntCoefMode {
    /// Use a constant as alpha.
    Fix(f64),
    /// Automatic tuning given `(target_entropy, learning_rate)`.
    Auto(f64, f64),
}

/// The entropy coefficient `alpha = exp(log_alpha)`.
pub struct EntCoef {
    var_store: nn::VarStore,
    log_alpha: Tensor,
    target_entropy: Option<f64>,
    opt: Option<nn::Optimizer>,
}

impl EntCoef {
    /// Constructs an instance of `EntCoef`.
    pub fn new(mode: EntCoefMode, device: tch::Device) -> Result<Self> {
        let var_store = nn::VarStore::new(device);
        let path = &var_store.root();
        let (log_alpha, target_entropy, opt) = match mode {
            EntCoefMode::Fix(alpha) => {
                let log_alpha = path.var("log_alpha", &[1], nn::Init::Const(alpha.ln()));
                (log_alpha, None, None)
            }
            EntCoefMode::Auto(target_entropy, learning_rate) => {
                let log_alpha = path.var("log_alpha", &[1], nn::Init::Const(0.0));
                let opt = nn::Adam::default().build(&var_store, learning_rate)?;
                (log_alpha, Some(target_entropy), Some(opt))
            }
        };

        Ok(Self {
            var_store,
            log_alpha,
            opt,
            target_entropy,
        })
    }

    /// Returns the entropy coefficient.
    pub fn alpha(&self) -> Tensor {
        self.log_alpha.detach().exp()
    }

    /// Returns `true` if the coefficient is tuned.
    pub fn is_auto(&self) -> bool {
        self.opt.is_some()
    }

    /// Updates `log_alpha` given log probabilities of sampled actions.
    ///
    /// Returns the loss, which is zero for a fixed coefficient.
    pub fn update(&mut self, logp: &Tensor) -> f32 {
        match (&self.target_entropy, &mut self.opt) {
            (Some(target_entropy), Some(opt)) => {
                let loss = -(&self.log_alpha * (logp + *target_entropy).detach())
                    .mean(tch::Kind::Float);
                opt.backward_step(&loss);
                loss.double_value(&[]) as f32
            }
            _ => 0.0,
        }
    }

    /// Save the parameter into a file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.var_store.save(&path)?;
        info!("Save entropy coefficient to {:?}", path.as_ref());
        for (name, _) in self.var_store.variables().iter() {
            trace!("Save variable {}", name);
        }
        Ok(())
    }

    /// Load the parameter from a file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.var_store.load(&path)?;
        info!("Load entropy coefficient from {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_alpha() -> Result<()> {
        let mut ent_coef = EntCoef::new(EntCoefMode::Fix(0.2), tch::Device::Cpu)?;
        let logp = Tensor::from_slice(&[-1f32, -2.0]);
        assert_eq!(ent_coef.update(&logp), 0.0);
        assert!((ent_coef.alpha().double_value(&[0]) - 0.2).abs() < 1e-6);
        assert!(!ent_coef.is_auto());
        Ok(())
    }

    #[test]
    fn test_auto_alpha_decreases_when_entropy_is_high() -> Result<()> {
        let mut ent_coef = EntCoef::new(EntCoefMode::Auto(-1.0, 0.01), tch::Device::Cpu)?;
        // log pi well below -target_entropy means entropy above target.
        let logp = Tensor::from_slice(&[-5f32, -5.0]);
        for _ in 0..10 {
            ent_coef.update(&logp);
        }
        assert!(ent_coef.alpha().double_value(&[0]) < 1.0);
        Ok(())
    }
}
