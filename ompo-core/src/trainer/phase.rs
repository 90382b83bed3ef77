//! Phases of the training loop.
use serde::{Deserialize, Serialize};

/// Phase of [`Trainer`](super::Trainer).
///
/// Each phase is one unit of work; its handler returns the next phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// A real environment step with a random action.
    Warmup,

    /// A real environment step with the action the agent chose before the
    /// preceding updates.
    CollectReal,

    /// Discriminator training on the full local buffer against resamples of the
    /// global buffer, followed by clearing the local buffer.
    DiscriminatorRefresh,

    /// A fixed number of agent updates.
    AgentUpdate,

    /// Nominal environment episodes, pushed to the global buffer only.
    CollectSim,

    /// Deterministic evaluation episodes on the real environment configuration.
    Eval,

    /// The step budget is exhausted.
    Done,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Warmup
    }
}

impl Phase {
    /// The phase entered before each real environment step.
    pub fn before_real_step(total_steps: usize, start_steps: usize, local_full: bool) -> Self {
        if total_steps < start_steps {
            Phase::Warmup
        } else if local_full {
            Phase::DiscriminatorRefresh
        } else {
            Phase::AgentUpdate
        }
    }

    /// The phase entered after the sim episodes that follow a real episode.
    pub fn after_sim(
        total_steps: usize,
        num_steps: usize,
        episode: usize,
        eval: bool,
        eval_episodes: usize,
    ) -> Self {
        if total_steps > num_steps {
            Phase::Done
        } else if eval && eval_episodes > 0 && episode % eval_episodes == 0 {
            Phase::Eval
        } else {
            // Caller resets the real environment and asks `before_real_step`.
            Phase::CollectReal
        }
    }
}

/// Continuation mask of a real or sim transition.
///
/// The mask is 1 at the step limit even if the environment reports termination
/// there, and `1 - terminated` before it.
pub fn continuation_mask(episode_steps: usize, max_episode_steps: usize, terminated: bool) -> f32 {
    if episode_steps == max_episode_steps || !terminated {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_before_real_step() {
        assert_eq!(Phase::before_real_step(0, 100, false), Phase::Warmup);
        assert_eq!(Phase::before_real_step(99, 100, true), Phase::Warmup);
        assert_eq!(Phase::before_real_step(100, 100, false), Phase::AgentUpdate);
        assert_eq!(
            Phase::before_real_step(100, 100, true),
            Phase::DiscriminatorRefresh
        );
    }

    #[test]
    fn test_after_sim() {
        assert_eq!(Phase::after_sim(101, 100, 3, true, 3), Phase::Done);
        assert_eq!(Phase::after_sim(50, 100, 3, true, 3), Phase::Eval);
        assert_eq!(Phase::after_sim(50, 100, 4, true, 3), Phase::CollectReal);
        assert_eq!(Phase::after_sim(50, 100, 3, false, 3), Phase::CollectReal);
    }

    #[test]
    fn test_continuation_mask() {
        // terminated before the limit
        assert_eq!(continuation_mask(10, 200, true), 0.0);
        // running
        assert_eq!(continuation_mask(10, 200, false), 1.0);
        // truncated at the limit
        assert_eq!(continuation_mask(200, 200, false), 1.0);
        // terminated exactly at the limit is treated as truncation
        assert_eq!(continuation_mask(200, 200, true), 1.0);
    }
}
