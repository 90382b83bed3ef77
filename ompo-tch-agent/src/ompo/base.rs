use super::{Actor, Critic, EntCoef, OmpoConfig, PolicyType};
use crate::{
    model::{ModelBase, SubModel, SubModel2},
    util::{rows_to_tensor, track, vec_to_tensor, CriticLoss, OutDim},
};
use anyhow::Result;
use log::trace;
use ompo_core::{
    replay_buffer::{SimpleReplayBuffer, TransitionBatch},
    Agent, Configurable, Discriminator, Env, Obs, Policy, UpdateInfo,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, fs, marker::PhantomData, path::Path};
use tch::{no_grad, Kind, Tensor};

type ActionValue = Tensor;
type ActMean = Tensor;
type ActLstd = Tensor;

fn normal_logp(x: &Tensor) -> Tensor {
    let tmp: Tensor = Tensor::from(-0.5 * (2.0 * std::f32::consts::PI).ln() as f32)
        - 0.5 * x.pow_tensor_scalar(2);
    tmp.sum_dim_intlist(Some([-1].as_slice()), false, Kind::Float)
}

/// OMPO agent.
///
/// Critics are trained on rewards corrected by the log density ratio of a
/// [`Discriminator`]. With [`CriticLoss::PearsonChi2`] the critic objective
/// is the dual of a chi-square occupancy matching problem:
///
/// ```text
/// y    = r' + mask * gamma * (min_k Q'_k(s', a') - alpha * log pi(a'|s'))
/// L_Q  = (1 - gamma) E[Q(s0, a0)] + E[f*(y - Q(s, a))]
/// w    = clamp(f*'(y - min_k Q_k(s, a)), 0, w_max)
/// L_pi = E[w * (alpha * log pi(a|s) - min_k Q_k(s, a))]
/// ```
///
/// where `r' = reward_scale * r + ratio_coef * log_ratio` and `s0` is drawn from
/// the initial state buffer.
pub struct Ompo<E, Q, P>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    P: SubModel<Input = Tensor, Output = (ActMean, ActLstd)>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    qnets: Vec<Critic<Q>>,
    qnets_tgt: Vec<Critic<Q>>,
    pi: Actor<P>,
    ent_coef: EntCoef,
    gamma: f64,
    tau: f64,
    epsilon: f64,
    min_lstd: f64,
    max_lstd: f64,
    reward_scale: f64,
    ratio_coef: f64,
    w_max: f64,
    critic_loss: CriticLoss,
    policy_type: PolicyType,
    target_update_interval: usize,
    act_dim: usize,
    act_scale: Tensor,
    act_bias: Tensor,
    act_low: Tensor,
    act_high: Tensor,
    train: bool,
    device: tch::Device,
    phantom: PhantomData<E>,
}

impl<E, Q, P> Ompo<E, Q, P>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    P: SubModel<Input = Tensor, Output = (ActMean, ActLstd)>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn alpha(&self) -> Tensor {
        match self.policy_type {
            PolicyType::Gaussian => self.ent_coef.alpha(),
            PolicyType::Deterministic => Tensor::zeros(&[1], (Kind::Float, self.device)),
        }
    }

    fn squash(&self, x: &Tensor) -> Tensor {
        x.tanh() * &self.act_scale + &self.act_bias
    }

    /// Samples actions with reparameterization and returns them with their log probabilities.
    fn action_logp(&self, obs: &Tensor) -> (Tensor, Tensor) {
        let (mean, lstd) = self.pi.forward(obs);
        match self.policy_type {
            PolicyType::Gaussian => {
                let lstd = lstd.clip(self.min_lstd, self.max_lstd);
                let z = Tensor::randn(mean.size().as_slice(), (Kind::Float, self.device));
                let y = (lstd.exp() * &z + &mean).tanh();
                let a = &y * &self.act_scale + &self.act_bias;
                let log_p = normal_logp(&z)
                    - lstd.sum_dim_intlist(Some([-1].as_slice()), false, Kind::Float)
                    - (&self.act_scale * (1f64 - y.pow_tensor_scalar(2.0)) + self.epsilon)
                        .log()
                        .sum_dim_intlist(Some([-1].as_slice()), false, Kind::Float);
                (a, log_p)
            }
            PolicyType::Deterministic => {
                let n = mean.size()[0];
                (self.squash(&mean), Tensor::zeros(&[n], (Kind::Float, self.device)))
            }
        }
    }

    fn qvals(&self, qnets: &[Critic<Q>], obs: &Tensor, act: &Tensor) -> Vec<Tensor> {
        qnets
            .iter()
            .map(|qnet| qnet.forward(obs, act).squeeze_dim(-1))
            .collect()
    }

    /// Returns the minimum values of q values over critics.
    fn qvals_min(&self, qnets: &[Critic<Q>], obs: &Tensor, act: &Tensor) -> Tensor {
        let qvals = self.qvals(qnets, obs, act);
        Tensor::vstack(&qvals).min_dim(0, false).0
    }

    /// Updates the critics. Returns the averaged loss and the detached
    /// occupancy weights of the batch.
    fn update_critic(
        &mut self,
        batch: &TransitionBatch,
        init: &TransitionBatch,
        log_ratio: &[f32],
    ) -> (f32, Tensor) {
        let device = self.device;
        let obs = rows_to_tensor(&batch.obs, batch.obs_dim, device);
        let act = rows_to_tensor(&batch.act, batch.act_dim, device);
        let next_obs = rows_to_tensor(&batch.next_obs, batch.obs_dim, device);
        let reward = vec_to_tensor(&batch.reward, device);
        let mask = vec_to_tensor(&batch.mask, device);
        let log_ratio = vec_to_tensor(log_ratio, device);

        let (tgt, weights) = no_grad(|| {
            let reward = self.reward_scale * reward + self.ratio_coef * log_ratio;
            let (next_a, next_log_p) = self.action_logp(&next_obs);
            let next_q = self.qvals_min(&self.qnets_tgt, &next_obs, &next_a)
                - self.alpha() * next_log_p;
            let tgt = reward + mask * self.gamma * next_q;

            let weights = match self.critic_loss {
                CriticLoss::PearsonChi2 => {
                    let residual = &tgt - self.qvals_min(&self.qnets, &obs, &act);
                    CriticLoss::conjugate_grad(&residual).clamp(0.0, self.w_max)
                }
                CriticLoss::Mse => Tensor::ones_like(&tgt),
            };
            (tgt, weights)
        });
        debug_assert_eq!(tgt.size().as_slice(), [batch.len() as i64]);

        let losses: Vec<Tensor> = match self.critic_loss {
            CriticLoss::Mse => self
                .qvals(&self.qnets, &obs, &act)
                .iter()
                .map(|pred| pred.mse_loss(&tgt, tch::Reduction::Mean))
                .collect(),
            CriticLoss::PearsonChi2 => {
                let init_obs = rows_to_tensor(&init.obs, init.obs_dim, device);
                let init_act = no_grad(|| self.action_logp(&init_obs).0);
                let preds = self.qvals(&self.qnets, &obs, &act);
                let preds_init = self.qvals(&self.qnets, &init_obs, &init_act);
                preds
                    .iter()
                    .zip(preds_init.iter())
                    .map(|(pred, pred_init)| {
                        (1.0 - self.gamma) * pred_init.mean(Kind::Float)
                            + CriticLoss::conjugate(&(&tgt - pred)).mean(Kind::Float)
                    })
                    .collect()
            }
        };

        for (qnet, loss) in self.qnets.iter_mut().zip(&losses) {
            qnet.backward_step(loss);
        }

        let loss = losses.iter().map(|l| l.double_value(&[]) as f32).sum::<f32>()
            / (self.qnets.len() as f32);
        (loss, weights)
    }

    /// Updates the policy and the entropy coefficient. Returns both losses.
    fn update_actor(&mut self, batch: &TransitionBatch, weights: &Tensor) -> (f32, f32) {
        let obs = rows_to_tensor(&batch.obs, batch.obs_dim, self.device);
        let (a, log_p) = self.action_logp(&obs);
        let qval = self.qvals_min(&self.qnets, &obs, &a);
        let loss = (weights * (self.alpha() * &log_p - &qval)).mean(Kind::Float);
        self.pi.backward_step(&loss);

        let entropy_loss = match self.policy_type {
            PolicyType::Gaussian => self.ent_coef.update(&log_p.detach()),
            PolicyType::Deterministic => 0.0,
        };

        (loss.double_value(&[]) as f32, entropy_loss)
    }

    fn soft_update(&mut self) -> Result<()> {
        for (qnet_tgt, qnet) in self.qnets_tgt.iter_mut().zip(&self.qnets) {
            track(qnet_tgt, qnet, self.tau)?;
        }
        Ok(())
    }

    fn obs_to_tensor(&self, obs: &E::Obs) -> Tensor {
        let obs = obs.to_vec();
        let dim = obs.len();
        rows_to_tensor(&obs, dim, self.device)
    }

    fn tensor_to_act(&self, act: &Tensor) -> Vec<f32> {
        (0..self.act_dim)
            .map(|i| act.double_value(&[0, i as i64]) as f32)
            .collect()
    }
}

impl<E, Q, P> Configurable for Ompo<E, Q, P>
where
    E: Env,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    P: SubModel<Input = Tensor, Output = (ActMean, ActLstd)>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    type Config = OmpoConfig<Q, P>;

    /// Constructs [`Ompo`] agent.
    fn build(config: Self::Config) -> Result<Self> {
        let device: tch::Device = config.device.unwrap_or(crate::Device::Cpu).into();
        if let Some(seed) = config.seed.as_ref() {
            tch::manual_seed(*seed);
        }

        let act_dim = config
            .actor_config
            .pi_config
            .as_ref()
            .map(|c| c.get_out_dim() as usize)
            .unwrap_or(0);
        let (act_low, act_high) = match config.act_low.is_empty() {
            true => (vec![-1f32; act_dim], vec![1f32; act_dim]),
            false => (config.act_low.clone(), config.act_high.clone()),
        };
        let act_low = Tensor::from_slice(&act_low).to(device);
        let act_high = Tensor::from_slice(&act_high).to(device);

        let pi = Actor::build(config.actor_config, device)?;
        let mut qnets = vec![];
        let mut qnets_tgt = vec![];
        for _ in 0..config.n_critics {
            let critic = Critic::build(config.critic_config.clone(), device)?;
            qnets_tgt.push(critic.try_clone()?);
            qnets.push(critic);
        }

        Ok(Ompo {
            qnets,
            qnets_tgt,
            pi,
            ent_coef: EntCoef::new(config.ent_coef_mode, device)?,
            gamma: config.gamma,
            tau: config.tau,
            epsilon: config.epsilon,
            min_lstd: config.min_lstd,
            max_lstd: config.max_lstd,
            reward_scale: config.reward_scale,
            ratio_coef: config.ratio_coef,
            w_max: config.w_max,
            critic_loss: config.critic_loss,
            policy_type: config.policy_type,
            target_update_interval: config.target_update_interval.max(1),
            act_dim,
            act_scale: (&act_high - &act_low) / 2.0,
            act_bias: (&act_high + &act_low) / 2.0,
            act_low,
            act_high,
            train: true,
            device,
            phantom: PhantomData,
        })
    }
}

impl<E, Q, P> Policy<E> for Ompo<E, Q, P>
where
    E: Env,
    E::Act: From<Vec<f32>>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    P: SubModel<Input = Tensor, Output = (ActMean, ActLstd)>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn sample(&mut self, obs: &E::Obs) -> E::Act {
        let obs = self.obs_to_tensor(obs);
        let act = no_grad(|| {
            let (mean, _) = self.pi.forward(&obs);
            match (self.train, self.policy_type) {
                (false, _) => self.squash(&mean),
                (true, PolicyType::Gaussian) => self.action_logp(&obs).0,
                (true, PolicyType::Deterministic) => {
                    let noise = (Tensor::randn(mean.size().as_slice(), (Kind::Float, self.device))
                        * 0.1)
                        .clamp(-0.25, 0.25);
                    (self.squash(&mean) + noise * &self.act_scale)
                        .clamp_tensor(Some(&self.act_low), Some(&self.act_high))
                }
            }
        });
        self.tensor_to_act(&act).into()
    }
}

impl<E, Q, P> Agent<E> for Ompo<E, Q, P>
where
    E: Env,
    E::Act: From<Vec<f32>>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    P: SubModel<Input = Tensor, Output = (ActMean, ActLstd)>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn update_parameters(
        &mut self,
        initial: &mut SimpleReplayBuffer,
        global: &mut SimpleReplayBuffer,
        discriminator: &dyn Discriminator,
        batch_size: usize,
        updates: usize,
    ) -> Result<UpdateInfo> {
        let batch = global.batch(batch_size)?;
        let init = initial.batch(batch_size)?;
        let log_ratio = discriminator.log_ratio(&batch)?;

        let (critic_loss, weights) = self.update_critic(&batch, &init, &log_ratio);
        let (policy_loss, entropy_loss) = self.update_actor(&batch, &weights);

        if updates % self.target_update_interval == 0 {
            self.soft_update()?;
        }
        trace!("update {}: critic {}, policy {}", updates, critic_loss, policy_loss);

        Ok(UpdateInfo {
            critic_loss,
            policy_loss,
            entropy_loss,
            alpha: self.alpha().double_value(&[0]) as f32,
        })
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        for (i, (qnet, qnet_tgt)) in self.qnets.iter().zip(&self.qnets_tgt).enumerate() {
            qnet.save(path.join(format!("qnet_{}.pt.tch", i)))?;
            qnet_tgt.save(path.join(format!("qnet_tgt_{}.pt.tch", i)))?;
        }
        self.pi.save(path.join("pi.pt.tch"))?;
        self.ent_coef.save(path.join("ent_coef.pt.tch"))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        for (i, (qnet, qnet_tgt)) in self.qnets.iter_mut().zip(&mut self.qnets_tgt).enumerate() {
            qnet.load(path.join(format!("qnet_{}.pt.tch", i)))?;
            qnet_tgt.load(path.join(format!("qnet_tgt_{}.pt.tch", i)))?;
        }
        self.pi.load(path.join("pi.pt.tch"))?;
        self.ent_coef.load(path.join("ent_coef.pt.tch"))?;
        Ok(())
    }
}
