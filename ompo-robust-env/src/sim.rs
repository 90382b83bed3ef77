//! Native simulators.
mod cartpole;
mod pendulum;
pub use cartpole::{CartPole, CartPoleConfig};
pub use pendulum::{Pendulum, PendulumConfig};
use serde::{Deserialize, Serialize};

/// Overrides of physical parameters.
///
/// `None` keeps the simulator's current value. Simulators ignore parameters
/// they do not model, with a warning.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct PhysicsParams {
    /// Gravitational acceleration.
    pub gravity: Option<f32>,

    /// Horizontal wind force.
    pub wind: Option<f32>,

    /// Length of the pole.
    pub length: Option<f32>,

    /// Mass of the pole.
    pub mass: Option<f32>,

    /// Torso length of a legged body.
    pub torso_len: Option<f32>,

    /// Foot length of a legged body.
    pub foot_len: Option<f32>,
}

impl PhysicsParams {
    /// Sets gravity.
    pub fn gravity(mut self, v: f32) -> Self {
        self.gravity = Some(v);
        self
    }

    /// Sets wind.
    pub fn wind(mut self, v: f32) -> Self {
        self.wind = Some(v);
        self
    }

    /// Sets the pole length.
    pub fn length(mut self, v: f32) -> Self {
        self.length = Some(v);
        self
    }

    /// Sets the pole mass.
    pub fn mass(mut self, v: f32) -> Self {
        self.mass = Some(v);
        self
    }

    /// Sets the torso length.
    pub fn torso_len(mut self, v: f32) -> Self {
        self.torso_len = Some(v);
        self
    }

    /// Sets the foot length.
    pub fn foot_len(mut self, v: f32) -> Self {
        self.foot_len = Some(v);
        self
    }

    /// Returns `self` with the values set in `other` taking precedence.
    pub fn overridden_by(&self, other: &PhysicsParams) -> Self {
        Self {
            gravity: other.gravity.or(self.gravity),
            wind: other.wind.or(self.wind),
            length: other.length.or(self.length),
            mass: other.mass.or(self.mass),
            torso_len: other.torso_len.or(self.torso_len),
            foot_len: other.foot_len.or(self.foot_len),
        }
    }

    /// Returns `true` if no parameter is overridden.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn warn_legged(&self, sim: &str) {
        if self.torso_len.is_some() || self.foot_len.is_some() {
            log::warn!("{} has no legs, torso_len and foot_len are ignored", sim);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overridden_by() {
        let base = PhysicsParams::default().gravity(9.8).wind(0.0);
        let p = base.overridden_by(&PhysicsParams::default().wind(1.0).length(2.0));
        assert_eq!(p.gravity, Some(9.8));
        assert_eq!(p.wind, Some(1.0));
        assert_eq!(p.length, Some(2.0));
        assert_eq!(p.mass, None);
    }

    #[test]
    fn test_serde_partial() {
        let p: PhysicsParams = serde_yaml::from_str("gravity: 19.62\nwind: 1.0\n").unwrap();
        assert_eq!(p, PhysicsParams::default().gravity(19.62).wind(1.0));
    }
}
