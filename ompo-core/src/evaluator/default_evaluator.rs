//! Default implementation of the [`Evaluator`] trait.
use super::Evaluator;
use crate::{record::Record, Env, Policy};
use anyhow::Result;
use log::debug;

/// Runs a fixed number of episodes and returns the average return.
///
/// Episode `ix` starts from [`Env::reset_with_index`]`(ix)`, so two evaluations
/// of the same frozen policy produce the same average.
pub struct DefaultEvaluator<E: Env> {
    /// The number of episodes to run during evaluation.
    n_episodes: usize,

    /// The environment instance used for evaluation.
    env: E,
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<Record> {
        let mut r_total = 0f32;

        for ix in 0..self.n_episodes {
            let mut prev_obs = self.env.reset_with_index(ix)?;
            let mut r_episode = 0f32;

            loop {
                let act = policy.sample(&prev_obs);
                let (step, _) = self.env.step(&act)?;
                r_episode += step.reward;
                if step.is_done() {
                    break;
                }
                prev_obs = step.obs;
            }

            debug!("Evaluation episode {}: return {}", ix, r_episode);
            r_total += r_episode;
        }

        let avg = if self.n_episodes == 0 {
            0.0
        } else {
            r_total / self.n_episodes as f32
        };
        Ok(Record::from_scalar("test/avg_reward", avg))
    }
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs a new [`DefaultEvaluator`].
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize) -> Result<Self> {
        Ok(Self {
            n_episodes,
            env: E::build(config, seed)?,
        })
    }

    /// The number of episodes per evaluation.
    pub fn n_episodes(&self) -> usize {
        self.n_episodes
    }
}
