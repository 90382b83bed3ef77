//! Transitions and batches of transitions.

/// A transition `(s_t, a_t, r_t, s_t+1, mask_t)`.
///
/// `mask` is 0 if the episode terminated at `s_t+1` and 1 otherwise, so that
/// bootstrapping continues through time-limit truncations.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State.
    pub state: Vec<f32>,

    /// Action.
    pub action: Vec<f32>,

    /// Reward.
    pub reward: f32,

    /// Next state.
    pub next_state: Vec<f32>,

    /// Continuation mask.
    pub mask: f32,
}

impl Transition {
    /// Constructs a transition.
    pub fn new(
        state: Vec<f32>,
        action: Vec<f32>,
        reward: f32,
        next_state: Vec<f32>,
        mask: f32,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            mask,
        }
    }

    /// Constructs an entry of the initial state buffer.
    ///
    /// Only `state` is meaningful; the other fields are zero-filled.
    pub fn initial_state(state: Vec<f32>, act_dim: usize) -> Self {
        let next_state = vec![0f32; state.len()];
        Self {
            state,
            action: vec![0f32; act_dim],
            reward: 0.0,
            next_state,
            mask: 0.0,
        }
    }
}

/// A batch of transitions in column layout.
///
/// `obs`, `act` and `next_obs` are row-major matrices of shapes
/// `[len, obs_dim]`, `[len, act_dim]` and `[len, obs_dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch {
    /// States.
    pub obs: Vec<f32>,

    /// Actions.
    pub act: Vec<f32>,

    /// Next states.
    pub next_obs: Vec<f32>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Continuation masks.
    pub mask: Vec<f32>,

    /// Width of a state.
    pub obs_dim: usize,

    /// Width of an action.
    pub act_dim: usize,
}

impl TransitionBatch {
    /// Stacks transitions into a batch.
    ///
    /// Widths are taken from the first transition; the buffer guarantees that
    /// all transitions it returns agree with it.
    pub fn from_transitions<'a>(transitions: impl IntoIterator<Item = &'a Transition>) -> Self {
        let mut batch = Self {
            obs: Vec::new(),
            act: Vec::new(),
            next_obs: Vec::new(),
            reward: Vec::new(),
            mask: Vec::new(),
            obs_dim: 0,
            act_dim: 0,
        };

        for t in transitions {
            if batch.reward.is_empty() {
                batch.obs_dim = t.state.len();
                batch.act_dim = t.action.len();
            }
            batch.obs.extend_from_slice(&t.state);
            batch.act.extend_from_slice(&t.action);
            batch.next_obs.extend_from_slice(&t.next_state);
            batch.reward.push(t.reward);
            batch.mask.push(t.mask);
        }

        batch
    }

    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch has no transition.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Returns the `ix`-th transition.
    pub fn get(&self, ix: usize) -> Option<Transition> {
        if ix >= self.len() {
            return None;
        }
        let (o, a) = (self.obs_dim, self.act_dim);
        Some(Transition {
            state: self.obs[ix * o..(ix + 1) * o].to_vec(),
            action: self.act[ix * a..(ix + 1) * a].to_vec(),
            reward: self.reward[ix],
            next_state: self.next_obs[ix * o..(ix + 1) * o].to_vec(),
            mask: self.mask[ix],
        })
    }
}
