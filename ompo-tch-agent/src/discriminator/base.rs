use super::DiscriminatorConfig;
use crate::{
    mlp::Mlp,
    model::SubModel,
    opt::Optimizer,
    util::{rows_to_tensor, tensor_to_vec},
};
use anyhow::Result;
use log::{info, trace};
use ompo_core::{
    error::OmpoError,
    replay_buffer::{SimpleReplayBuffer, TransitionBatch},
    Configurable, Discriminator,
};
use std::{fs, path::Path};
use tch::{nn, no_grad, Device, Kind, Tensor};

/// Discriminator `D(s, a, s') = sigmoid(f(s, a, s'))`.
///
/// Trained to output 1 on expert transitions and 0 on policy transitions.
/// The log density ratio `log(D / (1 - D))` is the logit `f(s, a, s')`.
pub struct SasDiscriminator {
    config: DiscriminatorConfig,
    device: Device,
    var_store: nn::VarStore,
    net: Mlp,
    opt: Optimizer,
}

impl SasDiscriminator {
    fn input(&self, batch: &TransitionBatch) -> Result<Tensor> {
        let in_dim = (2 * batch.obs_dim + batch.act_dim) as i64;
        if in_dim != self.config.net_config.in_dim {
            return Err(OmpoError::ShapeMismatch {
                what: "discriminator input".to_string(),
                expected: self.config.net_config.in_dim as usize,
                actual: in_dim as usize,
            }
            .into());
        }

        let obs = rows_to_tensor(&batch.obs, batch.obs_dim, self.device);
        let act = rows_to_tensor(&batch.act, batch.act_dim, self.device);
        let next_obs = rows_to_tensor(&batch.next_obs, batch.obs_dim, self.device);
        Ok(Tensor::cat(&[obs, act, next_obs], -1))
    }

    fn logits(&self, x: &Tensor) -> Tensor {
        self.net.forward(x).squeeze_dim(-1)
    }

    fn grad_penalty(&self, x_expert: &Tensor, x_policy: &Tensor) -> Tensor {
        let n = x_expert.size()[0];
        let eps = Tensor::rand(&[n, 1], (Kind::Float, self.device));
        let x = (&eps * x_expert + (-&eps + 1.0) * x_policy)
            .detach()
            .set_requires_grad(true);
        let out = self.logits(&x).sum(Kind::Float);
        let grad = Tensor::run_backward(&[out], &[&x], true, true)
            .pop()
            .unwrap_or_else(|| x.zeros_like());
        (grad.norm_scalaropt_dim(2, &[-1i64][..], false) - 1.0)
            .pow_tensor_scalar(2)
            .mean(Kind::Float)
    }
}

impl Configurable for SasDiscriminator {
    type Config = DiscriminatorConfig;

    fn build(config: Self::Config) -> Result<Self> {
        let device: Device = config.device.unwrap_or(crate::Device::Cpu).into();
        if let Some(seed) = config.seed {
            tch::manual_seed(seed);
        }

        let var_store = nn::VarStore::new(device);
        let net = <Mlp as SubModel>::build(&var_store, config.net_config.clone());
        let opt = config.opt_config.build(&var_store)?;

        Ok(Self {
            config,
            device,
            var_store,
            net,
            opt,
        })
    }
}

impl Discriminator for SasDiscriminator {
    fn update(
        &mut self,
        expert: &mut SimpleReplayBuffer,
        policy: &mut SimpleReplayBuffer,
        batch_size: usize,
    ) -> Result<f32> {
        let x_expert = self.input(&expert.batch(batch_size)?)?;
        let x_policy = self.input(&policy.batch(batch_size)?)?;

        let logits = Tensor::cat(&[self.logits(&x_expert), self.logits(&x_policy)], 0);
        let labels = Tensor::cat(
            &[
                Tensor::ones(&[batch_size as i64], (Kind::Float, self.device)),
                Tensor::zeros(&[batch_size as i64], (Kind::Float, self.device)),
            ],
            0,
        );
        let mut loss = logits.binary_cross_entropy_with_logits::<Tensor>(
            &labels,
            None,
            None,
            tch::Reduction::Mean,
        );
        if self.config.grad_penalty > 0.0 {
            loss = loss + self.config.grad_penalty * self.grad_penalty(&x_expert, &x_policy);
        }

        self.opt.backward_step(&loss);
        let loss = loss.double_value(&[]) as f32;
        trace!("discriminator loss {}", loss);
        Ok(loss)
    }

    fn log_ratio(&self, batch: &TransitionBatch) -> Result<Vec<f32>> {
        let x = self.input(batch)?;
        let clip = self.config.clip as f64;
        let ratio = no_grad(|| self.logits(&x).clamp(-clip, clip));
        tensor_to_vec(&ratio)
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let path = path.join("discriminator.pt.tch");
        self.var_store.save(&path)?;
        info!("Save discriminator to {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let path = path.join("discriminator.pt.tch");
        self.var_store.load(&path)?;
        info!("Load discriminator from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::OptimizerConfig;
    use ompo_core::replay_buffer::{SimpleReplayBufferConfig, Transition};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tempdir::TempDir;

    const OBS_DIM: usize = 2;
    const ACT_DIM: usize = 1;

    fn buffer(center: f32, seed: u64) -> Result<SimpleReplayBuffer> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut buffer = SimpleReplayBuffer::build(
            &SimpleReplayBufferConfig::default().capacity(256).seed(seed),
        );
        let mut x = || center + rng.gen_range(-0.5f32..0.5);
        for _ in 0..256 {
            buffer.push(Transition::new(
                vec![x(), x()],
                vec![x()],
                0.0,
                vec![x(), x()],
                1.0,
            ))?;
        }
        Ok(buffer)
    }

    fn discriminator(grad_penalty: f64) -> Result<SasDiscriminator> {
        let config = DiscriminatorConfig::new(OBS_DIM, ACT_DIM, vec![32, 32])
            .opt_config(OptimizerConfig::Adam { lr: 1e-3 })
            .grad_penalty(grad_penalty)
            .clip(5.0)
            .seed(42);
        SasDiscriminator::build(config)
    }

    #[test]
    fn test_loss_decreases_on_separable_data() -> Result<()> {
        let mut expert = buffer(1.0, 0)?;
        let mut policy = buffer(-1.0, 1)?;
        let mut disc = discriminator(0.0)?;

        let first = disc.update(&mut expert, &mut policy, 64)?;
        let mut last = first;
        for _ in 0..200 {
            last = disc.update(&mut expert, &mut policy, 64)?;
        }
        assert!(last < first);

        let ratio = disc.log_ratio(&expert.batch(16)?)?;
        assert!(ratio.iter().all(|r| *r > 0.0 && *r <= 5.0));
        let ratio = disc.log_ratio(&policy.batch(16)?)?;
        assert!(ratio.iter().all(|r| *r < 0.0 && *r >= -5.0));
        Ok(())
    }

    #[test]
    fn test_grad_penalty() -> Result<()> {
        let mut expert = buffer(1.0, 0)?;
        let mut policy = buffer(-1.0, 1)?;
        let mut disc = discriminator(10.0)?;
        let loss = disc.update(&mut expert, &mut policy, 32)?;
        assert!(loss.is_finite());
        Ok(())
    }

    #[test]
    fn test_insufficient_transitions() -> Result<()> {
        let mut expert = buffer(1.0, 0)?;
        let mut policy = buffer(-1.0, 1)?;
        let mut disc = discriminator(0.0)?;
        assert!(disc.update(&mut expert, &mut policy, 512).is_err());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let mut expert = buffer(1.0, 0)?;
        let mut policy = buffer(-1.0, 1)?;
        let mut disc = discriminator(0.0)?;
        for _ in 0..10 {
            disc.update(&mut expert, &mut policy, 32)?;
        }

        let dir = TempDir::new("discriminator")?;
        disc.save_params(dir.path())?;
        assert!(dir.path().join("discriminator.pt.tch").exists());

        let mut loaded = SasDiscriminator::build(
            DiscriminatorConfig::new(OBS_DIM, ACT_DIM, vec![32, 32]).seed(7),
        )?;
        loaded.load_params(dir.path())?;

        let batch = expert.batch(8)?;
        assert_eq!(disc.log_ratio(&batch)?, loaded.log_ratio(&batch)?);
        Ok(())
    }
}
