//! Configuration of OMPO agent.
use super::{ActorConfig, CriticConfig, EntCoefMode};
use crate::{
    model::{SubModel, SubModel2},
    util::{CriticLoss, OutDim},
    Device,
};
use anyhow::Result;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};
use tch::Tensor;

/// How actions are drawn in training mode.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum PolicyType {
    /// Tanh-squashed Gaussian with entropy regularization.
    Gaussian,

    /// The mean action plus small clipped Gaussian exploration noise. The
    /// entropy term is not used.
    Deterministic,
}

impl std::str::FromStr for PolicyType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Gaussian" => Ok(Self::Gaussian),
            "Deterministic" => Ok(Self::Deterministic),
            _ => Err(anyhow::anyhow!("unknown policy type: {}", s)),
        }
    }
}

/// Constructs [`Ompo`](super::Ompo).
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct OmpoConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    pub(super) actor_config: ActorConfig<P::Config>,
    pub(super) critic_config: CriticConfig<Q::Config>,
    pub(super) gamma: f64,
    pub(super) tau: f64,
    pub(super) ent_coef_mode: EntCoefMode,
    pub(super) epsilon: f64,
    pub(super) min_lstd: f64,
    pub(super) max_lstd: f64,
    pub(super) reward_scale: f64,
    pub(super) ratio_coef: f64,
    pub(super) w_max: f64,
    pub(super) critic_loss: CriticLoss,
    pub(super) policy_type: PolicyType,
    pub(super) n_critics: usize,
    pub(super) target_update_interval: usize,
    pub(super) act_low: Vec<f32>,
    pub(super) act_high: Vec<f32>,
    pub(super) seed: Option<i64>,
    pub device: Option<Device>,
}

impl<Q, P> Clone for OmpoConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            actor_config: self.actor_config.clone(),
            critic_config: self.critic_config.clone(),
            gamma: self.gamma,
            tau: self.tau,
            ent_coef_mode: self.ent_coef_mode.clone(),
            epsilon: self.epsilon,
            min_lstd: self.min_lstd,
            max_lstd: self.max_lstd,
            reward_scale: self.reward_scale,
            ratio_coef: self.ratio_coef,
            w_max: self.w_max,
            critic_loss: self.critic_loss,
            policy_type: self.policy_type,
            n_critics: self.n_critics,
            target_update_interval: self.target_update_interval,
            act_low: self.act_low.clone(),
            act_high: self.act_high.clone(),
            seed: self.seed,
            device: self.device,
        }
    }
}

impl<Q, P> Default for OmpoConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.99,
            tau: 0.005,
            ent_coef_mode: EntCoefMode::Fix(0.2),
            epsilon: 1e-6,
            min_lstd: -20.0,
            max_lstd: 2.0,
            reward_scale: 1.0,
            ratio_coef: 1.0,
            w_max: 10.0,
            critic_loss: CriticLoss::PearsonChi2,
            policy_type: PolicyType::Gaussian,
            n_critics: 2,
            target_update_interval: 1,
            act_low: vec![],
            act_high: vec![],
            seed: None,
            device: None,
        }
    }
}

impl<Q, P> OmpoConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Entropy coefficient.
    pub fn ent_coef_mode(mut self, v: EntCoefMode) -> Self {
        self.ent_coef_mode = v;
        self
    }

    /// Reward scale.
    ///
    /// It works for obtaining target values, not the values in logs.
    pub fn reward_scale(mut self, v: f64) -> Self {
        self.reward_scale = v;
        self
    }

    /// Coefficient of the log density ratio added to rewards.
    pub fn ratio_coef(mut self, v: f64) -> Self {
        self.ratio_coef = v;
        self
    }

    /// Upper bound of the occupancy weights of the policy loss.
    pub fn w_max(mut self, v: f64) -> Self {
        self.w_max = v;
        self
    }

    /// Critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Policy type.
    pub fn policy_type(mut self, v: PolicyType) -> Self {
        self.policy_type = v;
        self
    }

    /// Configuration of actor.
    pub fn actor_config(mut self, actor_config: ActorConfig<P::Config>) -> Self {
        self.actor_config = actor_config;
        self
    }

    /// Configuration of critic.
    pub fn critic_config(mut self, critic_config: CriticConfig<Q::Config>) -> Self {
        self.critic_config = critic_config;
        self
    }

    /// The number of critics.
    pub fn n_critics(mut self, n_critics: usize) -> Self {
        self.n_critics = n_critics;
        self
    }

    /// Interval of soft updates of the target critics, in updates.
    pub fn target_update_interval(mut self, v: usize) -> Self {
        self.target_update_interval = v;
        self
    }

    /// Bounds of actions. Outputs of the policy in `[-1, 1]` are mapped onto them.
    pub fn action_bounds(mut self, low: Vec<f32>, high: Vec<f32>) -> Self {
        self.act_low = low;
        self.act_high = high;
        self
    }

    /// Random seed.
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Device.
    pub fn device(mut self, device: tch::Device) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Constructs [`OmpoConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of OMPO agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`OmpoConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of OMPO agent into {:?}", path_);
        Ok(())
    }
}
