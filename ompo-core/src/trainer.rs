//! Train [`Agent`] with a [`Discriminator`] on a real and a sim environment.
mod config;
mod phase;
use crate::{
    error::OmpoError,
    evaluator::Evaluator,
    record::{Record, RecordValue, Recorder},
    replay_buffer::{SimpleReplayBuffer, SimpleReplayBufferConfig, Transition},
    Act, Agent, Discriminator, Env, Obs, Policy,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{debug, info};
pub use phase::{continuation_mask, Phase};
use std::path::Path;

/// Counters of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainerState {
    /// Current phase.
    pub phase: Phase,

    /// Real environment steps so far.
    pub total_steps: usize,

    /// Index of the current real episode, starting from 1.
    pub episode: usize,

    /// Steps in the current real episode.
    pub episode_steps: usize,

    /// Return of the current real episode, without the reward offset.
    pub episode_reward: f32,

    /// Discriminator updates so far.
    pub updates_discriminator: usize,

    /// Agent updates so far.
    pub updates_agent: usize,

    /// Best average evaluation return so far.
    pub best_eval: Option<f32>,
}

/// The four buffers of a training run.
pub struct Buffers {
    /// Every real and sim transition.
    pub global: SimpleReplayBuffer,

    /// Initial states of real episodes.
    pub initial: SimpleReplayBuffer,

    /// Recent real transitions, used as expert data of the discriminator.
    pub local: SimpleReplayBuffer,

    /// Resample of the global buffer, used as policy data of the discriminator.
    pub temp: SimpleReplayBuffer,
}

impl Buffers {
    /// Builds empty buffers.
    pub fn new(config: &TrainerConfig) -> Self {
        let global = SimpleReplayBufferConfig::default()
            .capacity(config.replay_size)
            .seed(config.seed);
        let local = global.clone().capacity(config.local_replay_size);
        Self {
            global: SimpleReplayBuffer::build(&global),
            initial: SimpleReplayBuffer::build(&global),
            local: SimpleReplayBuffer::build(&local),
            temp: SimpleReplayBuffer::build(&local),
        }
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop.
///
/// # Training loop
///
/// 0. Build the real and sim environments with the configured seed and push
///    `batch_size` reset states of the real environment into the initial
///    state buffer.
/// 1. Start a real episode: reset the real environment and push its initial
///    state into the initial state buffer.
/// 2. Before each real step, choose the phase:
///     * [`Phase::Warmup`] while `total_steps < start_steps`: step with a random
///       action.
///     * [`Phase::DiscriminatorRefresh`] if the local buffer is full:
///       `n_refresh_rounds` times, fill the temp buffer with
///       `local_replay_size` transitions sampled from the global buffer, run
///       `n_disc_updates` discriminator updates and clear the temp buffer.
///       Then clear the local buffer and continue with [`Phase::AgentUpdate`].
///     * [`Phase::AgentUpdate`]: `updates_per_step * update_repeat` agent
///       updates, then [`Phase::CollectReal`]: step with the agent's action.
///
///    Past warmup, the action of a real step is sampled from the policy before
///    that step's discriminator refresh and agent updates.
/// 3. Every real transition is pushed to the global and the local buffers with
///    its reward shifted by `reward_offset`.
/// 4. After a real episode, [`Phase::CollectSim`] runs
///    `sim_episodes_per_real` sim episodes, pushing to the global buffer only.
/// 5. If `total_steps > num_steps`, finish ([`Phase::Done`]). Otherwise, every
///    `eval_episodes` episodes, run [`Phase::Eval`] and save the model in
///    `(model_dir)/best` when the average return is not below the best so far.
/// 6. Back to 1.
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Warmup
///     Warmup --> Warmup
///     Warmup --> AgentUpdate: total_steps >= start_steps
///     Warmup --> DiscriminatorRefresh: local buffer full
///     Warmup --> CollectSim: episode done
///     AgentUpdate --> CollectReal
///     CollectReal --> DiscriminatorRefresh: local buffer full
///     CollectReal --> AgentUpdate
///     DiscriminatorRefresh --> AgentUpdate
///     CollectReal --> CollectSim: episode done
///     CollectSim --> Done: total_steps > num_steps
///     CollectSim --> Eval: episode % eval_episodes == 0
///     CollectSim --> AgentUpdate
///     Eval --> AgentUpdate
///     Done --> [*]
/// ```
pub struct Trainer<E: Env> {
    config: TrainerConfig,

    /// Configuration of the perturbed environment.
    env_config_real: E::Config,

    /// Configuration of the nominal environment.
    env_config_sim: E::Config,
}

impl<E: Env> Trainer<E> {
    /// Constructs a trainer.
    pub fn build(
        config: TrainerConfig,
        env_config_real: E::Config,
        env_config_sim: E::Config,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            env_config_real,
            env_config_sim,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn push_initial_state(
        &self,
        obs: &E::Obs,
        act_dim: usize,
        buffers: &mut Buffers,
    ) -> Result<()> {
        buffers
            .initial
            .push(Transition::initial_state(obs.to_vec(), act_dim))
    }

    fn begin_episode(
        &self,
        env: &mut E,
        buffers: &mut Buffers,
        state: &mut TrainerState,
    ) -> Result<E::Obs> {
        let obs = env.reset()?;
        self.push_initial_state(&obs, env.act_dim(), buffers)?;
        state.episode += 1;
        state.episode_steps = 0;
        state.episode_reward = 0.0;
        Ok(obs)
    }

    fn next_before_step(&self, state: &TrainerState, buffers: &Buffers) -> Phase {
        Phase::before_real_step(
            state.total_steps,
            self.config.start_steps,
            buffers.local.is_full(),
        )
    }

    /// Steps the real environment and pushes the transition.
    fn real_step(
        &self,
        env: &mut E,
        act: E::Act,
        obs: &mut E::Obs,
        buffers: &mut Buffers,
        state: &mut TrainerState,
    ) -> Result<Phase> {
        let act_vec = act.to_vec();
        if act_vec.len() != env.act_dim() {
            return Err(OmpoError::ShapeMismatch {
                what: "action".to_string(),
                expected: env.act_dim(),
                actual: act_vec.len(),
            }
            .into());
        }

        let (step, _) = env.step(&act)?;
        state.episode_steps += 1;
        state.total_steps += 1;
        state.episode_reward += step.reward;

        let mask = continuation_mask(
            state.episode_steps,
            env.max_episode_steps(),
            step.is_terminated,
        );
        let tr = Transition::new(
            obs.to_vec(),
            act_vec,
            step.reward + self.config.reward_offset,
            step.obs.to_vec(),
            mask,
        );
        buffers.global.push(tr.clone())?;
        buffers.local.push(tr)?;

        let done = step.is_done();
        *obs = step.obs;

        if done {
            Ok(Phase::CollectSim)
        } else {
            Ok(self.next_before_step(state, buffers))
        }
    }

    fn refresh_discriminator<D: Discriminator>(
        &self,
        discriminator: &mut D,
        buffers: &mut Buffers,
        state: &mut TrainerState,
        recorder: &mut dyn Recorder,
    ) -> Result<()> {
        let n = self.config.local_replay_size;
        for _ in 0..self.config.n_refresh_rounds {
            for tr in buffers.global.sample(n)? {
                buffers.temp.push(tr)?;
            }
            for _ in 0..self.config.n_disc_updates {
                let loss =
                    discriminator.update(&mut buffers.local, &mut buffers.temp, self.config.gail_batch)?;
                recorder.write(Record::from_slice(&[
                    ("step", RecordValue::Step(state.updates_discriminator)),
                    ("loss/discriminator_loss", RecordValue::Scalar(loss)),
                ]));
                state.updates_discriminator += 1;
            }
            buffers.temp.clear();
        }
        buffers.local.clear();
        debug!(
            "Discriminator refreshed, {} updates so far",
            state.updates_discriminator
        );
        Ok(())
    }

    fn update_agent<A: Agent<E>, D: Discriminator>(
        &self,
        agent: &mut A,
        discriminator: &D,
        buffers: &mut Buffers,
        state: &mut TrainerState,
        recorder: &mut dyn Recorder,
    ) -> Result<()> {
        if buffers.global.len() < self.config.batch_size {
            debug!(
                "Skip agent update: {} transitions in the global buffer",
                buffers.global.len()
            );
            return Ok(());
        }

        for _ in 0..self.config.updates_per_step * self.config.update_repeat {
            let info = agent.update_parameters(
                &mut buffers.initial,
                &mut buffers.global,
                discriminator,
                self.config.batch_size,
                state.updates_agent,
            )?;
            recorder.write(info.to_record(state.updates_agent));
            state.updates_agent += 1;
        }
        Ok(())
    }

    /// Runs sim episodes and pushes their transitions to the global buffer.
    ///
    /// Actions are random while the real environment is in warmup.
    fn collect_sim<A: Agent<E>>(
        &self,
        env: &mut E,
        agent: &mut A,
        buffers: &mut Buffers,
        state: &TrainerState,
    ) -> Result<()> {
        let warmup = state.total_steps < self.config.start_steps;

        for _ in 0..self.config.sim_episodes_per_real {
            let mut obs = env.reset()?;
            let mut episode_steps = 0;
            loop {
                let act = if warmup {
                    env.sample_act()
                } else {
                    agent.sample(&obs)
                };
                let (step, _) = env.step(&act)?;
                episode_steps += 1;

                let mask =
                    continuation_mask(episode_steps, env.max_episode_steps(), step.is_terminated);
                buffers.global.push(Transition::new(
                    obs.to_vec(),
                    act.to_vec(),
                    step.reward + self.config.reward_offset,
                    step.obs.to_vec(),
                    mask,
                ))?;

                let done = step.is_done();
                obs = step.obs;
                if done {
                    break;
                }
            }
        }
        Ok(())
    }

    fn evaluate<A: Agent<E>, D: Discriminator, V: Evaluator<E>>(
        &self,
        agent: &mut A,
        discriminator: &D,
        evaluator: &mut V,
        state: &mut TrainerState,
        recorder: &mut dyn Recorder,
    ) -> Result<()> {
        agent.eval();
        let record = evaluator.evaluate(agent);
        agent.train();
        let record = record?;
        let avg = record.get_scalar("test/avg_reward")?;

        if state.best_eval.map_or(true, |best| avg >= best) {
            state.best_eval = Some(avg);
            if self.config.save {
                if let Some(model_dir) = &self.config.model_dir {
                    Self::save_best_model(agent, discriminator, model_dir);
                }
            }
        }

        recorder.write(record.merge(Record::from_step("step", state.total_steps)));

        info!("----------------------------------------");
        info!(
            "Test Episodes: {}, Avg. Reward: {:.2}",
            self.config.eval_episodes, avg
        );
        info!("----------------------------------------");
        Ok(())
    }

    fn save_best_model<A: Agent<E>, D: Discriminator>(agent: &A, discriminator: &D, model_dir: &str) {
        let path = Path::new(model_dir).join("best");
        let result = agent
            .save_params(&path)
            .and_then(|_| discriminator.save_params(&path));
        match result {
            Ok(()) => info!("Saved the model in {:?}.", &path),
            Err(e) => info!("Failed to save model in {:?}: {}", &path, e),
        }
    }

    /// Train the agent.
    ///
    /// Returns the counters at the end of the run.
    pub fn train<A, D, V>(
        &mut self,
        agent: &mut A,
        discriminator: &mut D,
        evaluator: &mut V,
        recorder: &mut dyn Recorder,
    ) -> Result<TrainerState>
    where
        A: Agent<E>,
        D: Discriminator,
        V: Evaluator<E>,
    {
        let seed = self.config.seed as i64;
        let mut real = E::build(&self.env_config_real, seed)?;
        let mut sim = E::build(&self.env_config_sim, seed)?;
        let mut buffers = Buffers::new(&self.config);
        let mut state = TrainerState::default();

        for _ in 0..self.config.batch_size {
            let obs = real.reset()?;
            self.push_initial_state(&obs, real.act_dim(), &mut buffers)?;
        }

        agent.train();
        let mut obs = self.begin_episode(&mut real, &mut buffers, &mut state)?;
        state.phase = self.next_before_step(&state, &buffers);

        // Action of the next real step, sampled before the updates preceding it.
        let mut pending_act: Option<E::Act> = None;

        loop {
            state.phase = match state.phase {
                Phase::Warmup => {
                    let act = real.sample_act();
                    self.real_step(&mut real, act, &mut obs, &mut buffers, &mut state)?
                }
                Phase::CollectReal => {
                    let act = match pending_act.take() {
                        Some(act) => act,
                        None => agent.sample(&obs),
                    };
                    self.real_step(&mut real, act, &mut obs, &mut buffers, &mut state)?
                }
                Phase::DiscriminatorRefresh => {
                    if pending_act.is_none() {
                        pending_act = Some(agent.sample(&obs));
                    }
                    self.refresh_discriminator(discriminator, &mut buffers, &mut state, recorder)?;
                    Phase::AgentUpdate
                }
                Phase::AgentUpdate => {
                    if pending_act.is_none() {
                        pending_act = Some(agent.sample(&obs));
                    }
                    self.update_agent(agent, discriminator, &mut buffers, &mut state, recorder)?;
                    Phase::CollectReal
                }
                Phase::CollectSim => {
                    self.collect_sim(&mut sim, agent, &mut buffers, &state)?;
                    let next = Phase::after_sim(
                        state.total_steps,
                        self.config.num_steps,
                        state.episode,
                        self.config.eval,
                        self.config.eval_episodes,
                    );
                    if next != Phase::Done {
                        recorder.write(Record::from_slice(&[
                            ("step", RecordValue::Step(state.total_steps)),
                            ("train/reward", RecordValue::Scalar(state.episode_reward)),
                        ]));
                        info!(
                            "Episode: {}, total numsteps: {}, episode steps: {}, reward: {:.2}",
                            state.episode, state.total_steps, state.episode_steps, state.episode_reward
                        );
                    }
                    match next {
                        Phase::Done | Phase::Eval => next,
                        _ => {
                            obs = self.begin_episode(&mut real, &mut buffers, &mut state)?;
                            self.next_before_step(&state, &buffers)
                        }
                    }
                }
                Phase::Eval => {
                    self.evaluate(agent, discriminator, evaluator, &mut state, recorder)?;
                    obs = self.begin_episode(&mut real, &mut buffers, &mut state)?;
                    self.next_before_step(&state, &buffers)
                }
                Phase::Done => break,
            };
        }

        recorder.flush();
        info!(
            "Training finished: {} episodes, {} steps",
            state.episode, state.total_steps
        );
        Ok(state)
    }
}
