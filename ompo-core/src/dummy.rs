//! Test doubles of the environment, agent and discriminator.
//!
//! [`DummyEnv`] is a one-dimensional random walk. The first element of each
//! observation is the number of steps the environment instance has taken, so
//! tests can tell at which step an action was requested.
use crate::{
    record::Record,
    replay_buffer::{SimpleReplayBuffer, Transition, TransitionBatch},
    Act, Agent, Discriminator, Env, Obs, Policy, Step, UpdateInfo,
};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Dummy observation.
#[derive(Clone, Debug, PartialEq)]
pub struct DummyObs(pub Vec<f32>);

impl Obs for DummyObs {
    fn to_vec(&self) -> Vec<f32> {
        self.0.clone()
    }
}

/// Dummy action.
#[derive(Clone, Debug, PartialEq)]
pub struct DummyAct(pub Vec<f32>);

impl Act for DummyAct {
    fn to_vec(&self) -> Vec<f32> {
        self.0.clone()
    }
}

impl From<Vec<f32>> for DummyAct {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}

/// Configuration of [`DummyEnv`].
#[derive(Clone, Debug)]
pub struct DummyEnvConfig {
    /// Step limit of an episode.
    pub max_steps: usize,

    /// The episode terminates when the position leaves `[-bound, bound]`.
    pub bound: Option<f32>,

    /// Added to every action before it moves the position.
    pub drift: f32,
}

impl Default for DummyEnvConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            bound: None,
            drift: 0.0,
        }
    }
}

/// One-dimensional random walk.
///
/// Observation is `[total_steps, position]`, reward is `-position^2`.
pub struct DummyEnv {
    config: DummyEnvConfig,
    rng: StdRng,
    total_steps: usize,
    episode_steps: usize,
    position: f32,
}

impl DummyEnv {
    fn obs(&self) -> DummyObs {
        DummyObs(vec![self.total_steps as f32, self.position])
    }
}

impl Env for DummyEnv {
    type Config = DummyEnvConfig;
    type Obs = DummyObs;
    type Act = DummyAct;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed as u64),
            total_steps: 0,
            episode_steps: 0,
            position: 0.0,
        })
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        self.total_steps += 1;
        self.episode_steps += 1;
        self.position += a.0[0] + self.config.drift;

        let reward = -self.position * self.position;
        let is_terminated = self
            .config
            .bound
            .map_or(false, |b| self.position.abs() > b);
        let is_truncated = self.episode_steps >= self.config.max_steps;
        let step = Step::new(self.obs(), a.clone(), reward, is_terminated, is_truncated, ());
        Ok((step, Record::empty()))
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.episode_steps = 0;
        self.position = self.rng.gen_range(-0.5..0.5);
        Ok(self.obs())
    }

    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs> {
        self.episode_steps = 0;
        self.position = StdRng::seed_from_u64(ix as u64).gen_range(-0.5..0.5);
        Ok(self.obs())
    }

    fn sample_act(&mut self) -> Self::Act {
        DummyAct(vec![self.rng.gen_range(-1.0..1.0)])
    }

    fn obs_dim(&self) -> usize {
        2
    }

    fn act_dim(&self) -> usize {
        1
    }

    fn max_episode_steps(&self) -> usize {
        self.config.max_steps
    }
}

/// Counters saved by [`DummyAgent::save_params`].
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DummyAgentParams {
    /// Number of updates when saved.
    pub n_updates: usize,
}

/// Agent that pushes the position back towards zero.
///
/// It remembers every observation it was asked to act on.
#[derive(Default)]
pub struct DummyAgent {
    /// Observations passed to [`Policy::sample`] in training mode.
    pub sampled_obs: Vec<Vec<f32>>,

    /// Number of calls of [`Agent::update_parameters`].
    pub n_updates: usize,

    /// Value of `n_updates` at each call of [`Policy::sample`] in training mode.
    pub updates_at_sample: Vec<usize>,

    /// Gain of the feedback `a = -gain * position`.
    pub gain: f32,

    /// Contents of the global buffer at the last update, oldest first.
    pub global_snapshot: Vec<Transition>,

    train: bool,
}

impl DummyAgent {
    /// Constructs an agent with the given feedback gain.
    pub fn new(gain: f32) -> Self {
        Self {
            gain,
            ..Self::default()
        }
    }
}

impl Policy<DummyEnv> for DummyAgent {
    fn sample(&mut self, obs: &DummyObs) -> DummyAct {
        let a = (-self.gain * obs.0[1]).clamp(-1.0, 1.0);
        if self.train {
            self.sampled_obs.push(obs.0.clone());
            self.updates_at_sample.push(self.n_updates);
        }
        DummyAct(vec![a])
    }
}

impl Agent<DummyEnv> for DummyAgent {
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
        _updates: usize,
    ) -> Result<UpdateInfo> {
        let _ = initial.batch(batch_size)?;
        let batch = global.batch(batch_size)?;
        let ratio = discriminator.log_ratio(&batch)?;
        self.global_snapshot = global.transitions();
        self.n_updates += 1;

        Ok(UpdateInfo {
            critic_loss: batch.reward.iter().sum::<f32>() / batch_size as f32,
            policy_loss: ratio.iter().sum::<f32>(),
            entropy_loss: 0.0,
            alpha: 0.2,
        })
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let params = DummyAgentParams {
            n_updates: self.n_updates,
        };
        fs::write(path.join("agent.yaml"), serde_yaml::to_string(&params)?)?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let params: DummyAgentParams =
            serde_yaml::from_str(&fs::read_to_string(path.join("agent.yaml"))?)?;
        self.n_updates = params.n_updates;
        Ok(())
    }
}

/// Discriminator whose loss decays with the number of updates.
#[derive(Default)]
pub struct DummyDiscriminator {
    /// Number of calls of [`Discriminator::update`].
    pub n_updates: usize,

    /// Lengths of the expert buffer seen by each update.
    pub expert_lens: Vec<usize>,
}

impl Discriminator for DummyDiscriminator {
    fn update(
        &mut self,
        expert: &mut SimpleReplayBuffer,
        policy: &mut SimpleReplayBuffer,
        batch_size: usize,
    ) -> Result<f32> {
        let _ = expert.sample(batch_size)?;
        let _ = policy.sample(batch_size)?;
        self.expert_lens.push(expert.len());
        self.n_updates += 1;
        Ok(1.0 / self.n_updates as f32)
    }

    fn log_ratio(&self, batch: &TransitionBatch) -> Result<Vec<f32>> {
        Ok(vec![0.0; batch.len()])
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        fs::write(path.join("discriminator.txt"), self.n_updates.to_string())?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.n_updates = fs::read_to_string(path.join("discriminator.txt"))?
            .trim()
            .parse()?;
        Ok(())
    }
}
