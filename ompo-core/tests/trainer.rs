use anyhow::Result;
use ompo_core::{
    dummy::{DummyAgent, DummyDiscriminator, DummyEnv, DummyEnvConfig},
    evaluator::{DefaultEvaluator, Evaluator},
    record::{BufferedRecorder, NullRecorder},
    replay_buffer::Transition,
    Agent, Phase, Trainer, TrainerConfig,
};
use std::path::Path;
use tempdir::TempDir;

fn config() -> TrainerConfig {
    TrainerConfig::default()
        .num_steps(150)
        .start_steps(100)
        .batch_size(8)
        .gail_batch(4)
        .replay_size(1000)
        .local_replay_size(16)
        .sim_episodes_per_real(0)
        .eval(false)
        .seed(1)
}

fn trainer(config: TrainerConfig) -> Result<Trainer<DummyEnv>> {
    let env_config = DummyEnvConfig::default();
    Trainer::build(config, env_config.clone(), env_config)
}

fn evaluator(n_episodes: usize) -> Result<DefaultEvaluator<DummyEnv>> {
    DefaultEvaluator::new(&DummyEnvConfig::default(), 0, n_episodes)
}

#[test]
fn test_warmup_never_calls_policy() -> Result<()> {
    let mut agent = DummyAgent::new(0.5);
    let mut disc = DummyDiscriminator::default();
    let mut recorder = NullRecorder::new();

    let state = trainer(config())?.train(&mut agent, &mut disc, &mut evaluator(1)?, &mut recorder)?;

    // Episodes have 10 steps; the loop stops after the first episode past 150 steps.
    assert_eq!(state.total_steps, 160);
    assert_eq!(state.episode, 16);
    assert_eq!(state.phase, Phase::Done);

    // The first observation given to the policy is the one after 100 random steps,
    // and every later real step asks the policy.
    let steps: Vec<usize> = agent.sampled_obs.iter().map(|o| o[0] as usize).collect();
    assert_eq!(steps, (100..160).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_real_action_precedes_updates() -> Result<()> {
    let mut agent = DummyAgent::new(0.5);
    let mut disc = DummyDiscriminator::default();
    let mut recorder = NullRecorder::new();

    trainer(config())?.train(&mut agent, &mut disc, &mut evaluator(1)?, &mut recorder)?;

    // Each of the 60 real steps past warmup picks its action before its 10 updates.
    let expected: Vec<usize> = (0..60).map(|i| i * 10).collect();
    assert_eq!(agent.updates_at_sample, expected);
    Ok(())
}

#[test]
fn test_update_schedule() -> Result<()> {
    let mut agent = DummyAgent::new(0.5);
    let mut disc = DummyDiscriminator::default();
    let mut recorder = NullRecorder::new();

    let state = trainer(config())?.train(&mut agent, &mut disc, &mut evaluator(1)?, &mut recorder)?;

    // 60 real steps past warmup, 1 * 10 agent updates each
    assert_eq!(state.updates_agent, 600);
    assert_eq!(agent.n_updates, 600);

    // The local buffer is full before the steps at 100, 116, 132 and 148,
    // each refresh running 10 * 20 discriminator updates on a full local buffer.
    assert_eq!(state.updates_discriminator, 800);
    assert_eq!(disc.n_updates, 800);
    assert!(disc.expert_lens.iter().all(|&n| n == 16));
    Ok(())
}

#[test]
fn test_sim_episodes_use_policy_after_warmup() -> Result<()> {
    let mut agent = DummyAgent::new(0.5);
    let mut disc = DummyDiscriminator::default();
    let mut recorder = NullRecorder::new();
    let config = config().sim_episodes_per_real(2);

    let state = trainer(config)?.train(&mut agent, &mut disc, &mut evaluator(1)?, &mut recorder)?;

    // Real episodes ending at 100, 110, ..., 160 are followed by 2 policy driven
    // sim episodes of 10 steps each.
    let real_past_warmup = state.total_steps - 100;
    let sim_past_warmup = 7 * 2 * 10;
    assert_eq!(agent.sampled_obs.len(), real_past_warmup + sim_past_warmup);
    Ok(())
}

#[test]
fn test_metrics_are_recorded() -> Result<()> {
    let mut agent = DummyAgent::new(0.5);
    let mut disc = DummyDiscriminator::default();
    let mut recorder = BufferedRecorder::new();
    let config = config().eval(true).eval_episodes(4);

    let _ = trainer(config)?.train(&mut agent, &mut disc, &mut evaluator(2)?, &mut recorder)?;

    assert_eq!(recorder.with_key("loss/discriminator_loss").count(), 800);
    assert_eq!(recorder.with_key("loss/critic").count(), 600);
    assert_eq!(recorder.with_key("entropy_temprature/alpha").count(), 600);
    // train/reward is written for every episode except the last one
    assert_eq!(recorder.with_key("train/reward").count(), 15);
    // episodes 4, 8 and 12
    assert_eq!(recorder.with_key("test/avg_reward").count(), 3);
    assert!(recorder.iter().all(|r| r.get_step("step").is_ok()));

    let steps = |key: &str| -> Result<Vec<usize>> {
        Ok(recorder
            .with_key(key)
            .map(|r| r.get_step("step"))
            .collect::<Result<_, _>>()?)
    };
    assert_eq!(steps("train/reward")?, (1..16).map(|i| i * 10).collect::<Vec<_>>());
    assert_eq!(steps("loss/critic")?, (0..600).collect::<Vec<_>>());
    assert_eq!(steps("loss/discriminator_loss")?, (0..800).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_best_model_is_saved() -> Result<()> {
    let dir = TempDir::new("ompo_trainer")?;
    let model_dir = dir.path().to_str().unwrap();
    let mut agent = DummyAgent::new(0.5);
    let mut disc = DummyDiscriminator::default();
    let mut recorder = NullRecorder::new();
    let config = config().eval(true).eval_episodes(4).model_dir(model_dir);

    let state = trainer(config)?.train(&mut agent, &mut disc, &mut evaluator(2)?, &mut recorder)?;

    let best = Path::new(model_dir).join("best");
    assert!(state.best_eval.is_some());
    assert!(best.join("agent.yaml").exists());
    assert!(best.join("discriminator.txt").exists());

    let mut loaded = DummyAgent::new(0.5);
    loaded.load_params(&best)?;
    assert!(loaded.n_updates <= agent.n_updates);
    Ok(())
}

#[test]
fn test_evaluation_is_deterministic() -> Result<()> {
    let mut agent = DummyAgent::new(0.3);
    agent.eval();

    let r1 = evaluator(5)?.evaluate(&mut agent)?.get_scalar("test/avg_reward")?;
    let r2 = evaluator(5)?.evaluate(&mut agent)?.get_scalar("test/avg_reward")?;
    let mut same_evaluator = evaluator(5)?;
    let r3 = same_evaluator.evaluate(&mut agent)?.get_scalar("test/avg_reward")?;
    let r4 = same_evaluator.evaluate(&mut agent)?.get_scalar("test/avg_reward")?;

    assert_eq!(r1, r2);
    assert_eq!(r3, r4);
    assert_eq!(r1, r3);
    assert!(agent.sampled_obs.is_empty());
    Ok(())
}

/// Splits transitions into episodes where the next state does not continue.
fn split_episodes(transitions: &[Transition]) -> Vec<&[Transition]> {
    let mut episodes = vec![];
    let mut start = 0;
    for i in 1..transitions.len() {
        if transitions[i].state != transitions[i - 1].next_state {
            episodes.push(&transitions[start..i]);
            start = i;
        }
    }
    episodes.push(&transitions[start..]);
    episodes
}

#[test]
fn test_stored_masks_and_rewards() -> Result<()> {
    let env_config = DummyEnvConfig {
        max_steps: 10,
        bound: Some(1.5),
        drift: 0.0,
    };
    let config = config().reward_offset(2.0);
    let mut trainer = Trainer::<DummyEnv>::build(config, env_config.clone(), env_config)?;
    let mut agent = DummyAgent::new(0.5);
    let mut disc = DummyDiscriminator::default();
    let mut recorder = NullRecorder::new();
    let _ = trainer.train(&mut agent, &mut disc, &mut evaluator(1)?, &mut recorder)?;

    let transitions = &agent.global_snapshot;
    assert!(transitions.len() > 100);
    for tr in transitions.iter() {
        let p = tr.next_state[1];
        assert_eq!(tr.reward, -p * p + 2.0);
    }

    // The last episode of the snapshot may be unfinished.
    let episodes = split_episodes(transitions);
    let (mut terminated, mut truncated) = (0, 0);
    for episode in &episodes[..episodes.len() - 1] {
        let (last, rest) = episode.split_last().unwrap();
        assert!(rest.iter().all(|tr| tr.mask == 1.0 && tr.next_state[1].abs() <= 1.5));
        if episode.len() < 10 {
            assert!(last.next_state[1].abs() > 1.5);
            assert_eq!(last.mask, 0.0);
            terminated += 1;
        } else {
            assert_eq!(episode.len(), 10);
            assert_eq!(last.mask, 1.0);
            truncated += 1;
        }
    }
    assert!(terminated > 0);
    assert!(truncated > 0);
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = config().gail_batch(32);
    assert!(trainer(config).is_err());
}
