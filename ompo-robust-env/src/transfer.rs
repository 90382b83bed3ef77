//! Real/sim environment pairs for domain-transfer training.
//!
//! The sim environment runs the nominal simulator. The real environment runs
//! the same simulator with physical parameters changed according to the
//! family of the environment name:
//!
//! | family              | real-environment overrides         |
//! |---------------------|------------------------------------|
//! | `Hopper`            | `torso_len: 0.4`, `foot_len: 0.39` |
//! | `Walker`            | `torso_len: 0.4`, `foot_len: 0.2`  |
//! | `Ant`, `Humanoid`   | `gravity: 19.62`, `wind: 1`        |
//! | `Pendulum`          | `gravity: 19.62`, `wind: 1`        |
//! | `CartPole`          | `length: 1.0`                      |
//!
//! Only `Pendulum` and `CartPole` have native simulators, see [`SimKind`].
use crate::{PerturbableEnv, PhysicsParams, RobustEnvConfig};
use anyhow::Result;
use log::info;
use ompo_core::error::OmpoError;

/// Physical parameters of the real environment for `env_name`.
///
/// The family is found by a substring match on the name, e.g. `AntTransfer-v0`.
pub fn real_physics(env_name: &str) -> Result<PhysicsParams> {
    let p = PhysicsParams::default();
    let params = if env_name.contains("Hopper") {
        p.torso_len(0.4).foot_len(0.39)
    } else if env_name.contains("Walker") {
        p.torso_len(0.4).foot_len(0.2)
    } else if env_name.contains("Ant")
        || env_name.contains("Humanoid")
        || env_name.contains("Pendulum")
    {
        p.gravity(19.62).wind(1.0)
    } else if env_name.contains("CartPole") {
        p.length(1.0)
    } else {
        return Err(OmpoError::UnknownEnv(env_name.to_string()).into());
    };
    Ok(params)
}

/// Native simulator selected by an environment name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimKind {
    /// [`crate::Pendulum`].
    Pendulum,

    /// [`crate::CartPole`].
    CartPole,
}

impl SimKind {
    /// Selects the simulator for `env_name`.
    pub fn from_env_name(env_name: &str) -> Result<Self> {
        if env_name.contains("Pendulum") {
            Ok(Self::Pendulum)
        } else if env_name.contains("CartPole") {
            Ok(Self::CartPole)
        } else {
            Err(OmpoError::UnknownEnv(format!("{} has no native simulator", env_name)).into())
        }
    }
}

/// Returns the `(real, sim)` configurations for `env_name`.
///
/// `max_steps` overrides the step limit of both environments.
pub fn transfer_pair<S>(
    env_name: &str,
    sim: S::Config,
    max_steps: Option<usize>,
) -> Result<(RobustEnvConfig<S::Config>, RobustEnvConfig<S::Config>)>
where
    S: PerturbableEnv,
{
    let physics = real_physics(env_name)?;
    info!("Real {} ({}) with {:?}", S::name(), env_name, physics);

    let real = RobustEnvConfig::new(sim.clone())
        .physics(physics)
        .max_steps(max_steps);
    let sim = RobustEnvConfig::new(sim).max_steps(max_steps);
    Ok((real, sim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CartPole, CartPoleConfig, Pendulum, PendulumConfig};

    #[test]
    fn test_real_physics_by_family() -> Result<()> {
        assert_eq!(
            real_physics("HopperTransfer-v0")?,
            PhysicsParams::default().torso_len(0.4).foot_len(0.39)
        );
        assert_eq!(
            real_physics("Walker2dTransfer-v0")?,
            PhysicsParams::default().torso_len(0.4).foot_len(0.2)
        );
        assert_eq!(
            real_physics("HumanoidTransfer-v0")?,
            real_physics("AntTransfer-v0")?
        );
        assert!(real_physics("Breakout-v4").is_err());
        Ok(())
    }

    #[test]
    fn test_sim_kind() -> Result<()> {
        assert_eq!(SimKind::from_env_name("PendulumTransfer-v0")?, SimKind::Pendulum);
        assert_eq!(SimKind::from_env_name("CartPoleTransfer-v0")?, SimKind::CartPole);
        let err = SimKind::from_env_name("AntTransfer-v0").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OmpoError>(),
            Some(OmpoError::UnknownEnv(_))
        ));
        Ok(())
    }

    #[test]
    fn test_transfer_pair() -> Result<()> {
        let (real, sim) =
            transfer_pair::<Pendulum>("PendulumTransfer-v0", PendulumConfig::default(), Some(50))?;
        assert_eq!(real.physics.gravity, Some(19.62));
        assert!(sim.physics.is_empty());
        assert_eq!(real.sim, sim.sim);
        assert_eq!(real.max_steps, Some(50));

        let (real, _) =
            transfer_pair::<CartPole>("CartPoleTransfer-v0", CartPoleConfig::default(), None)?;
        assert_eq!(real.physics.length, Some(1.0));
        Ok(())
    }
}
