//! Robustness wrapper around a simulator.
use super::{RobustConfig, RobustType};
use crate::{PhysicsParams, SimAct, SimObs};
use anyhow::Result;
use log::{debug, trace};
use ompo_core::{
    error::OmpoError,
    record::{Record, RecordValue},
    Env, Step,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// A simulator whose physical parameters can be changed between episodes.
pub trait PerturbableEnv {
    /// Configuration of the simulator.
    type Config: Clone + Debug + PartialEq + Serialize + DeserializeOwned;

    /// Name of the simulator.
    fn name() -> &'static str;

    /// Builds the simulator.
    fn build(config: &Self::Config) -> Self
    where
        Self: Sized;

    /// Resets the state, drawing it from `rng`, and returns the observation.
    fn reset(&mut self, rng: &mut StdRng) -> Vec<f32>;

    /// Advances the state. Returns the observation, the reward and whether the
    /// episode terminated.
    fn step(&mut self, act: &[f32]) -> (Vec<f32>, f32, bool);

    /// Dimension of observations.
    fn obs_dim(&self) -> usize;

    /// Lower and upper bounds of actions.
    fn act_bounds(&self) -> (Vec<f32>, Vec<f32>);

    /// The step limit of an episode.
    fn max_episode_steps(&self) -> usize;

    /// Current physical parameters.
    fn physics(&self) -> PhysicsParams;

    /// Overrides the physical parameters that are set in `params`.
    fn set_physics(&mut self, params: &PhysicsParams);
}

/// Configuration of [`RobustEnv`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RobustEnvConfig<C> {
    /// Configuration of the simulator.
    pub sim: C,

    /// Physical parameters fixed for the lifetime of the environment.
    #[serde(default)]
    pub physics: PhysicsParams,

    /// Default perturbation of [`Env::step`].
    #[serde(default)]
    pub robust: RobustConfig,

    /// Overrides the step limit of the simulator.
    #[serde(default)]
    pub max_steps: Option<usize>,
}

impl<C> RobustEnvConfig<C>
where
    C: Serialize + DeserializeOwned,
{
    /// Wraps the configuration of a simulator without any perturbation.
    pub fn new(sim: C) -> Self {
        Self {
            sim,
            physics: PhysicsParams::default(),
            robust: RobustConfig::default(),
            max_steps: None,
        }
    }

    /// Sets the fixed physical parameters.
    pub fn physics(mut self, v: PhysicsParams) -> Self {
        self.physics = v;
        self
    }

    /// Sets the default perturbation.
    pub fn robust(mut self, v: RobustConfig) -> Self {
        self.robust = v;
        self
    }

    /// Sets the step limit.
    pub fn max_steps(mut self, v: Option<usize>) -> Self {
        self.max_steps = v;
        self
    }

    /// Constructs [`RobustEnvConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RobustEnvConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Input of [`RobustEnv::step_robust`].
///
/// `robust_config` replaces the configured perturbation for this step when given.
#[derive(Debug, Clone)]
pub struct RobustInput {
    /// Action.
    pub act: SimAct,

    /// What is corrupted at this step.
    pub robust_type: RobustType,

    /// Perturbation parameters.
    pub robust_config: Option<RobustConfig>,
}

impl RobustInput {
    /// Input with the configured perturbation parameters.
    pub fn new(act: SimAct, robust_type: RobustType) -> Self {
        Self {
            act,
            robust_type,
            robust_config: None,
        }
    }

    /// Sets perturbation parameters for this step.
    pub fn robust_config(mut self, v: RobustConfig) -> Self {
        self.robust_config = Some(v);
        self
    }
}

/// A simulator wrapped with a perturbation.
///
/// [`Env::step`] applies the configured [`RobustConfig`]; [`RobustEnv::step_robust`]
/// takes the perturbation with the action. Actions are clipped to the action
/// bounds after corruption. Episodes are truncated at the step limit.
pub struct RobustEnv<S: PerturbableEnv> {
    sim: S,
    config: RobustEnvConfig<S::Config>,

    /// Physical parameters after the fixed overrides.
    nominal: PhysicsParams,

    /// Draws initial states and noise.
    rng: StdRng,

    /// Draws random actions.
    act_rng: StdRng,

    act_low: Vec<f32>,
    act_high: Vec<f32>,
    episode_steps: usize,
}

impl<S: PerturbableEnv> RobustEnv<S> {
    /// Returns the wrapped simulator.
    pub fn sim(&self) -> &S {
        &self.sim
    }

    /// Steps the simulator with the perturbation given in `input`.
    ///
    /// A [`RobustType::Dynamics`] input overrides the physics before the step.
    pub fn step_robust(&mut self, input: &RobustInput) -> Result<(Step<Self>, Record)> {
        let act = &input.act.0;
        if act.len() != self.act_low.len() {
            return Err(OmpoError::ShapeMismatch {
                what: "action".to_string(),
                expected: self.act_low.len(),
                actual: act.len(),
            }
            .into());
        }

        let robust = input
            .robust_config
            .clone()
            .unwrap_or_else(|| self.config.robust.clone());
        let robust_type = input.robust_type;
        if robust_type == RobustType::Dynamics {
            self.apply_dynamics(&robust);
        }

        let mut applied = act.clone();
        if robust_type == RobustType::Action {
            for a in applied.iter_mut() {
                if let Some(noise) = robust.draw(&mut self.rng) {
                    *a += noise;
                }
            }
        }
        for ((a, lo), hi) in applied.iter_mut().zip(&self.act_low).zip(&self.act_high) {
            *a = a.clamp(*lo, *hi);
        }

        let (mut obs, mut reward, is_terminated) = self.sim.step(&applied);
        self.episode_steps += 1;
        let is_truncated = self.episode_steps >= self.max_episode_steps();

        match robust_type {
            RobustType::State => {
                for o in obs.iter_mut() {
                    if let Some(noise) = robust.draw(&mut self.rng) {
                        *o += noise;
                    }
                }
            }
            RobustType::Reward => {
                if let Some(noise) = robust.draw(&mut self.rng) {
                    reward += noise;
                }
            }
            _ => {}
        }
        trace!("{:?} step {}: reward {}", robust_type, self.episode_steps, reward);

        let record = Record::from_slice(&[("act_applied", RecordValue::Array1(applied))]);
        let step = Step::new(
            SimObs(obs),
            input.act.clone(),
            reward,
            is_terminated,
            is_truncated,
            (),
        );
        Ok((step, record))
    }

    /// Overrides the nominal physics with `robust.dynamics`, gravity scaled by noise.
    fn apply_dynamics(&mut self, robust: &RobustConfig) {
        let mut params = self.nominal.overridden_by(&robust.dynamics);
        if let Some(noise) = robust.draw(&mut self.rng) {
            params.gravity = params.gravity.map(|g| g * (1.0 + noise));
        }
        debug!("Dynamics of {}: {:?}", S::name(), params);
        self.sim.set_physics(&params);
    }

    fn reset_sim(&mut self) -> SimObs {
        if self.config.robust.robust_type == RobustType::Dynamics {
            let robust = self.config.robust.clone();
            self.apply_dynamics(&robust);
        }
        self.episode_steps = 0;
        let mut obs = self.sim.reset(&mut self.rng);
        if self.config.robust.robust_type == RobustType::State {
            for o in obs.iter_mut() {
                if let Some(noise) = self.config.robust.draw(&mut self.rng) {
                    *o += noise;
                }
            }
        }
        SimObs(obs)
    }
}

impl<S: PerturbableEnv> Env for RobustEnv<S> {
    type Config = RobustEnvConfig<S::Config>;
    type Obs = SimObs;
    type Act = SimAct;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        config.robust.validate()?;

        let mut sim = S::build(&config.sim);
        sim.set_physics(&config.physics);
        let nominal = sim.physics();
        let (act_low, act_high) = sim.act_bounds();
        debug!("Built {} with {:?}", S::name(), nominal);

        Ok(Self {
            sim,
            config: config.clone(),
            nominal,
            rng: StdRng::seed_from_u64(seed as u64),
            act_rng: StdRng::seed_from_u64(seed as u64),
            act_low,
            act_high,
            episode_steps: 0,
        })
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        let input = RobustInput::new(a.clone(), self.config.robust.robust_type);
        self.step_robust(&input)
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        Ok(self.reset_sim())
    }

    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs> {
        self.rng = StdRng::seed_from_u64(ix as u64);
        Ok(self.reset_sim())
    }

    fn sample_act(&mut self) -> Self::Act {
        let rng = &mut self.act_rng;
        SimAct(
            self.act_low
                .iter()
                .zip(&self.act_high)
                .map(|(lo, hi)| rng.gen_range(*lo..*hi))
                .collect(),
        )
    }

    fn obs_dim(&self) -> usize {
        self.sim.obs_dim()
    }

    fn act_dim(&self) -> usize {
        self.act_low.len()
    }

    fn max_episode_steps(&self) -> usize {
        self.config
            .max_steps
            .unwrap_or_else(|| self.sim.max_episode_steps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoiseConfig, Pendulum, PendulumConfig};

    type PendulumEnv = RobustEnv<Pendulum>;

    fn config(robust: RobustConfig) -> RobustEnvConfig<PendulumConfig> {
        RobustEnvConfig::new(PendulumConfig::default().max_steps(5)).robust(robust)
    }

    fn shift(robust_type: RobustType, v: f32) -> RobustConfig {
        RobustConfig::default()
            .robust_type(robust_type)
            .noise(NoiseConfig::Shift { shift: v })
            .noise_factor(1.0)
    }

    #[test]
    fn test_truncated_at_step_limit() -> Result<()> {
        let mut env = PendulumEnv::build(&config(RobustConfig::default()), 0)?;
        env.reset()?;
        for i in 1..=5 {
            let (step, _) = env.step(&SimAct(vec![0.0]))?;
            assert_eq!(step.is_truncated, i == 5);
            assert!(!step.is_terminated);
        }
        Ok(())
    }

    #[test]
    fn test_action_is_clipped_after_noise() -> Result<()> {
        let mut env = PendulumEnv::build(&config(shift(RobustType::Action, 5.0)), 0)?;
        env.reset()?;
        let (step, record) = env.step(&SimAct(vec![0.5]))?;
        assert_eq!(record.get_array1("act_applied")?, vec![2.0]);
        assert_eq!(step.act, SimAct(vec![0.5]));
        Ok(())
    }

    #[test]
    fn test_reward_shift() -> Result<()> {
        let mut clean = PendulumEnv::build(&config(RobustConfig::default()), 3)?;
        let mut noisy = PendulumEnv::build(&config(shift(RobustType::Reward, 1.0)), 3)?;
        clean.reset()?;
        noisy.reset()?;
        let (s1, _) = clean.step(&SimAct(vec![0.0]))?;
        let (s2, _) = noisy.step(&SimAct(vec![0.0]))?;
        assert!((s2.reward - s1.reward - 1.0).abs() < 1e-4);
        assert_eq!(s1.obs, s2.obs);
        Ok(())
    }

    #[test]
    fn test_step_robust_overrides_default() -> Result<()> {
        let mut clean = PendulumEnv::build(&config(RobustConfig::default()), 3)?;
        let mut noisy = PendulumEnv::build(&config(RobustConfig::default()), 3)?;
        let o1 = clean.reset()?;
        let o2 = noisy.reset()?;
        assert_eq!(o1, o2);

        let (s1, _) = clean.step(&SimAct(vec![0.0]))?;
        let input = RobustInput::new(SimAct(vec![0.0]), RobustType::State)
            .robust_config(shift(RobustType::State, 0.5));
        let (s2, _) = noisy.step_robust(&input)?;
        for (a, b) in s1.obs.0.iter().zip(s2.obs.0.iter()) {
            assert!((b - a - 0.5).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_dynamics_applied_on_reset() -> Result<()> {
        let robust = shift(RobustType::Dynamics, 0.5)
            .dynamics(PhysicsParams::default().gravity(20.0).wind(1.0));
        let mut env = PendulumEnv::build(&config(robust), 0)?;
        assert_eq!(env.sim().physics().gravity, Some(10.0));
        env.reset()?;
        let physics = env.sim().physics();
        assert_eq!(physics.gravity, Some(30.0));
        assert_eq!(physics.wind, Some(1.0));

        // Noise scales the nominal gravity, not the last applied one.
        env.reset()?;
        assert_eq!(env.sim().physics().gravity, Some(30.0));
        Ok(())
    }

    #[test]
    fn test_step_robust_applies_dynamics() -> Result<()> {
        let mut clean = PendulumEnv::build(&config(RobustConfig::default()), 3)?;
        let mut shifted = PendulumEnv::build(&config(RobustConfig::default()), 3)?;
        clean.reset()?;
        shifted.reset()?;

        let (s1, _) = clean.step(&SimAct(vec![0.0]))?;
        let robust = shift(RobustType::Dynamics, 0.0)
            .dynamics(PhysicsParams::default().gravity(100.0).wind(5.0));
        let input =
            RobustInput::new(SimAct(vec![0.0]), RobustType::Dynamics).robust_config(robust);
        let (s2, _) = shifted.step_robust(&input)?;

        assert_ne!(s1.obs, s2.obs);
        assert_eq!(shifted.sim().physics().gravity, Some(100.0));
        assert_eq!(shifted.sim().physics().wind, Some(5.0));
        assert_eq!(clean.sim().physics().gravity, Some(10.0));
        Ok(())
    }

    #[test]
    fn test_fixed_physics() -> Result<()> {
        let config = config(RobustConfig::default())
            .physics(PhysicsParams::default().gravity(19.62));
        let env = PendulumEnv::build(&config, 0)?;
        assert_eq!(env.sim().physics().gravity, Some(19.62));
        Ok(())
    }

    #[test]
    fn test_reset_with_index_is_deterministic() -> Result<()> {
        let robust = RobustConfig::default().robust_type(RobustType::State);
        let mut env1 = PendulumEnv::build(&config(robust.clone()), 1)?;
        let mut env2 = PendulumEnv::build(&config(robust), 2)?;
        env1.reset()?;
        assert_eq!(env1.reset_with_index(7)?, env2.reset_with_index(7)?);
        Ok(())
    }

    #[test]
    fn test_sample_act_within_bounds() -> Result<()> {
        let mut env = PendulumEnv::build(&config(RobustConfig::default()), 0)?;
        assert_eq!(env.act_dim(), 1);
        assert_eq!(env.obs_dim(), 3);
        for _ in 0..100 {
            let a = env.sample_act();
            assert!((-2.0..2.0).contains(&a.0[0]));
        }
        Ok(())
    }

    #[test]
    fn test_wrong_action_width() -> Result<()> {
        let mut env = PendulumEnv::build(&config(RobustConfig::default()), 0)?;
        env.reset()?;
        assert!(env.step(&SimAct(vec![0.0, 0.0])).is_err());
        Ok(())
    }
}
