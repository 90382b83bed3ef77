use anyhow::Result;
use ompo_core::Env;
use ompo_robust_env::{
    transfer::transfer_pair, CartPole, CartPoleConfig, NoiseConfig, Pendulum, PendulumConfig,
    RobustConfig, RobustEnv, RobustEnvConfig, RobustInput, RobustType,
};
use tempdir::TempDir;

fn rollout<E: Env>(env: &mut E, n_steps: usize) -> Result<(usize, f32)> {
    let mut episodes = 0;
    let mut total_reward = 0.0;
    env.reset_with_index(0)?;
    for _ in 0..n_steps {
        let act = env.sample_act();
        let (step, _) = env.step(&act)?;
        total_reward += step.reward;
        if step.is_done() {
            episodes += 1;
            env.reset()?;
        }
    }
    Ok((episodes, total_reward))
}

#[test]
fn test_real_and_sim_differ() -> Result<()> {
    let (real, sim) =
        transfer_pair::<Pendulum>("PendulumTransfer-v0", PendulumConfig::default(), Some(20))?;
    let mut real = RobustEnv::<Pendulum>::build(&real, 0)?;
    let mut sim = RobustEnv::<Pendulum>::build(&sim, 0)?;

    let (o_real, o_sim) = (real.reset_with_index(3)?, sim.reset_with_index(3)?);
    assert_eq!(o_real, o_sim);

    let act = real.sample_act();
    let (s_real, _) = real.step(&act)?;
    let (s_sim, _) = sim.step(&act)?;
    assert_ne!(s_real.obs, s_sim.obs);
    Ok(())
}

#[test]
fn test_episodes_end_and_restart() -> Result<()> {
    let (real, _) =
        transfer_pair::<Pendulum>("PendulumTransfer-v0", PendulumConfig::default(), Some(20))?;
    let mut env = RobustEnv::<Pendulum>::build(&real, 0)?;
    let (episodes, _) = rollout(&mut env, 100)?;
    assert_eq!(episodes, 5);

    // The cart-pole under random forces falls well before 500 steps.
    let (real, _) = transfer_pair::<CartPole>("CartPoleTransfer-v0", CartPoleConfig::default(), None)?;
    let mut env = RobustEnv::<CartPole>::build(&real, 0)?;
    let (episodes, reward) = rollout(&mut env, 1000)?;
    assert!(episodes >= 2);
    assert_eq!(reward, 1000.0);
    Ok(())
}

#[test]
fn test_random_action_perturbation_loop() -> Result<()> {
    let robust = RobustConfig::default()
        .robust_type(RobustType::Action)
        .noise(NoiseConfig::Gauss {
            mu: 0.0,
            sigma: 1.0,
        })
        .noise_factor(0.5)
        .probability(0.5);
    let config = RobustEnvConfig::new(CartPoleConfig::default()).robust(robust.clone());
    let mut env = RobustEnv::<CartPole>::build(&config, 11)?;
    env.reset()?;

    for _ in 0..200 {
        let input = RobustInput::new(env.sample_act(), RobustType::Action).robust_config(robust.clone());
        let (step, record) = env.step_robust(&input)?;
        let applied = record.get_array1("act_applied")?;
        assert!((-1.0..=1.0).contains(&applied[0]));
        if step.is_done() {
            env.reset()?;
        }
    }
    Ok(())
}

#[test]
fn test_config_file() -> Result<()> {
    let (real, _) =
        transfer_pair::<Pendulum>("PendulumTransfer-v0", PendulumConfig::default(), Some(20))?;
    let dir = TempDir::new("robust_env_config")?;
    let path = dir.path().join("real.yaml");
    real.save(&path)?;
    assert_eq!(RobustEnvConfig::<PendulumConfig>::load(&path)?, real);
    Ok(())
}
