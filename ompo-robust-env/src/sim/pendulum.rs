//! Inverted pendulum swing-up.
use super::PhysicsParams;
use crate::robust::PerturbableEnv;
use anyhow::Result;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::{
    f32::consts::PI,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Pendulum`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PendulumConfig {
    /// Gravitational acceleration.
    pub gravity: f32,

    /// Horizontal wind force on the bob.
    pub wind: f32,

    /// Length of the pole.
    pub length: f32,

    /// Mass of the bob.
    pub mass: f32,

    /// Maximum torque.
    pub max_torque: f32,

    /// Maximum angular speed.
    pub max_speed: f32,

    /// Integration time step.
    pub dt: f32,

    /// Step limit of an episode.
    pub max_steps: usize,
}

impl Default for PendulumConfig {
    fn default() -> Self {
        Self {
            gravity: 10.0,
            wind: 0.0,
            length: 1.0,
            mass: 1.0,
            max_torque: 2.0,
            max_speed: 8.0,
            dt: 0.05,
            max_steps: 200,
        }
    }
}

impl PendulumConfig {
    /// Sets the step limit.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Loads [`PendulumConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`PendulumConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Pendulum swing-up with torque control.
///
/// Observation is `[cos(th), sin(th), th_dot]` with `th = 0` upright. Reward is
/// `-(th^2 + 0.1 th_dot^2 + 0.001 u^2)`. Episodes never terminate; they are
/// truncated at the step limit.
pub struct Pendulum {
    config: PendulumConfig,
    th: f32,
    th_dot: f32,
}

fn angle_normalize(x: f32) -> f32 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Pendulum {
    fn obs(&self) -> Vec<f32> {
        vec![self.th.cos(), self.th.sin(), self.th_dot]
    }
}

impl PerturbableEnv for Pendulum {
    type Config = PendulumConfig;

    fn name() -> &'static str {
        "Pendulum"
    }

    fn build(config: &Self::Config) -> Self {
        Self {
            config: config.clone(),
            th: 0.0,
            th_dot: 0.0,
        }
    }

    fn reset(&mut self, rng: &mut StdRng) -> Vec<f32> {
        self.th = rng.gen_range(-PI..PI);
        self.th_dot = rng.gen_range(-1.0..1.0);
        self.obs()
    }

    fn step(&mut self, act: &[f32]) -> (Vec<f32>, f32, bool) {
        let c = &self.config;
        let u = act[0].clamp(-c.max_torque, c.max_torque);
        let (g, m, l, dt) = (c.gravity, c.mass, c.length, c.dt);

        let cost = angle_normalize(self.th).powi(2) + 0.1 * self.th_dot.powi(2) + 0.001 * u * u;

        let th_acc = 3.0 * g / (2.0 * l) * self.th.sin()
            + 3.0 / (m * l * l) * u
            + 3.0 * c.wind / (m * l) * self.th.cos();
        self.th_dot = (self.th_dot + th_acc * dt).clamp(-c.max_speed, c.max_speed);
        self.th += self.th_dot * dt;

        (self.obs(), -cost, false)
    }

    fn obs_dim(&self) -> usize {
        3
    }

    fn act_bounds(&self) -> (Vec<f32>, Vec<f32>) {
        (vec![-self.config.max_torque], vec![self.config.max_torque])
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;
    use rand::SeedableRng;

    #[test]
    fn test_angle_normalize() {
        assert!((angle_normalize(2.0 * PI + 0.1) - 0.1).abs() < 1e-5);
        assert!((angle_normalize(-0.1) + 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_upright_is_best() {
        let mut env = Pendulum::build(&PendulumConfig::default());
        let _ = env.reset(&mut StdRng::seed_from_u64(0));
        env.th = 0.0;
        env.th_dot = 0.0;
        let (obs, r, done) = env.step(&[0.0]);
        assert_eq!(r, 0.0);
        assert!(!done);
        assert_eq!(obs.len(), 3);
    }

    #[test]
    fn test_stronger_gravity_falls_faster() {
        let mut weak = Pendulum::build(&PendulumConfig::default());
        let mut strong = Pendulum::build(&PendulumConfig::default());
        strong.set_physics(&PhysicsParams::default().gravity(19.62));
        for env in [&mut weak, &mut strong].iter_mut() {
            env.th = 0.1;
            env.th_dot = 0.0;
            env.step(&[0.0]);
        }
        assert!(strong.th_dot > weak.th_dot);
    }

    #[test]
    fn test_pendulum_config_file() -> Result<()> {
        let dir = TempDir::new("sim_config")?;
        let path = dir.path().join("sim.yaml");
        let config = PendulumConfig {
            gravity: 12.0,
            wind: 0.5,
            ..PendulumConfig::default()
        }
        .max_steps(100);

        config.save(&path)?;
        assert_eq!(PendulumConfig::load(&path)?, config);
        Ok(())
    }
}
