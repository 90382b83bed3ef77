//! Cart-pole balancing with a continuous force.
use super::PhysicsParams;
use crate::robust::PerturbableEnv;
use anyhow::Result;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`CartPole`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CartPoleConfig {
    /// Gravitational acceleration.
    pub gravity: f32,

    /// Horizontal wind force on the cart.
    pub wind: f32,

    /// Half length of the pole.
    pub length: f32,

    /// Mass of the pole.
    pub mass: f32,

    /// Mass of the cart.
    pub mass_cart: f32,

    /// Force applied for an action of 1.
    pub force_mag: f32,

    /// Integration time step.
    pub tau: f32,

    /// Episode terminates when `|x|` exceeds this.
    pub x_threshold: f32,

    /// Episode terminates when `|theta|` exceeds this, in radians.
    pub theta_threshold: f32,

    /// Step limit of an episode.
    pub max_steps: usize,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            wind: 0.0,
            length: 0.5,
            mass: 0.1,
            mass_cart: 1.0,
            force_mag: 10.0,
            tau: 0.02,
            x_threshold: 2.4,
            theta_threshold: 12.0 * 2.0 * std::f32::consts::PI / 360.0,
            max_steps: 500,
        }
    }
}

impl CartPoleConfig {
    /// Sets the step limit.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Loads [`CartPoleConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CartPoleConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Cart-pole with an action in `[-1, 1]` scaled to a horizontal force.
///
/// Observation is `[x, x_dot, theta, theta_dot]`. Reward is 1 per step. The
/// episode terminates when the cart leaves the track or the pole falls.
pub struct CartPole {
    config: CartPoleConfig,
    state: [f32; 4],
}

impl PerturbableEnv for CartPole {
    type Config = CartPoleConfig;

    fn name() -> &'static str {
        "CartPole"
    }

    fn build(config: &Self::Config) -> Self {
        Self {
            config: config.clone(),
            state: [0.0; 4],
        }
    }

    fn reset(&mut self, rng: &mut StdRng) -> Vec<f32> {
        for s in self.state.iter_mut() {
            *s = rng.gen_range(-0.05..0.05);
        }
        self.state.to_vec()
    }

    fn step(&mut self, act: &[f32]) -> (Vec<f32>, f32, bool) {
        let c = &self.config;
        let [x, x_dot, theta, theta_dot] = self.state;
        let force = c.force_mag * act[0].clamp(-1.0, 1.0) + c.wind;

        let total_mass = c.mass + c.mass_cart;
        let pole_mass_length = c.mass * c.length;
        let (sin, cos) = theta.sin_cos();

        let temp = (force + pole_mass_length * theta_dot * theta_dot * sin) / total_mass;
        let theta_acc = (c.gravity * sin - cos * temp)
            / (c.length * (4.0 / 3.0 - c.mass * cos * cos / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos / total_mass;

        self.state = [
            x + c.tau * x_dot,
            x_dot + c.tau * x_acc,
            theta + c.tau * theta_dot,
            theta_dot + c.tau * theta_acc,
        ];

        let terminated =
            self.state[0].abs() > c.x_threshold || self.state[2].abs() > c.theta_threshold;
        (self.state.to_vec(), 1.0, terminated)
    }

    fn obs_dim(&self) -> usize {
        4
    }

    fn act_bounds(&self) -> (Vec<f32>, Vec<f32>) {
        (vec![-1.0], vec![1.0])
    }

    fn max_episode_steps(&self) -> usize {
        self.config.max_steps
    }

    fn physics(&self) -> PhysicsParams {
        PhysicsParams::default()
            .gravity(self.config.gravity)
            .wind(self.config.wind)
            .length(self.config.length)
            .mass(self.config.mass)
    }

    fn set_physics(&mut self, params: &PhysicsParams) {
        params.warn_legged(Self::name());
        let c = &mut self.config;
        c.gravity = params.gravity.unwrap_or(c.gravity);
        c.wind = params.wind.unwrap_or(c.wind);
        c.length = params.length.unwrap_or(c.length);
        c.mass = params.mass.unwrap_or(c.mass);
    }
}
