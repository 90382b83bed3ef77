//! Fixed-capacity ring buffer with uniform sampling.
use super::{SimpleReplayBufferConfig, Transition, TransitionBatch};
use crate::error::OmpoError;
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, seq::index, SeedableRng};

/// A fixed-capacity ring buffer of [`Transition`]s.
///
/// Pushing into a full buffer overwrites the oldest transition. Sampling is
/// uniform over the occupied slots, without replacement within a call and
/// independent across calls. The random number generator is owned by the
/// buffer and seeded from its configuration.
///
/// ```
/// use ompo_core::replay_buffer::{SimpleReplayBuffer, SimpleReplayBufferConfig, Transition};
///
/// let config = SimpleReplayBufferConfig::default().capacity(2).seed(0);
/// let mut buffer = SimpleReplayBuffer::build(&config);
/// for i in 0..3 {
///     let t = Transition::new(vec![i as f32], vec![0.0], 0.0, vec![0.0], 1.0);
///     buffer.push(t).unwrap();
/// }
/// assert_eq!(buffer.len(), 2);
/// assert_eq!(buffer.sample(2).unwrap().len(), 2);
/// ```
pub struct SimpleReplayBuffer {
    /// Maximum number of transitions that can be stored.
    capacity: usize,

    /// Current insertion index.
    i: usize,

    /// Current number of stored transitions.
    size: usize,

    /// Storage, grows up to `capacity`.
    data: Vec<Transition>,

    /// Widths `(state, action)` fixed by the first pushed transition.
    dims: Option<(usize, usize)>,

    /// Seed of `rng`, used again when the buffer is cleared.
    seed: u64,

    /// Random number generator for sampling.
    rng: StdRng,
}

impl SimpleReplayBuffer {
    /// Builds an empty buffer.
    pub fn build(config: &SimpleReplayBufferConfig) -> Self {
        Self {
            capacity: config.capacity,
            i: 0,
            size: 0,
            data: Vec::with_capacity(config.capacity.min(1 << 16)),
            dims: None,
            seed: config.seed,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Pushes a transition, overwriting the oldest one if the buffer is full.
    pub fn push(&mut self, tr: Transition) -> Result<()> {
        if self.capacity == 0 {
            return Err(
                OmpoError::InvalidConfig("replay buffer capacity is zero".to_string()).into(),
            );
        }
        self.check_dims(&tr)?;

        if self.data.len() < self.capacity {
            self.data.push(tr);
        } else {
            self.data[self.i] = tr;
        }
        self.i = (self.i + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);

        Ok(())
    }

    fn check_dims(&mut self, tr: &Transition) -> Result<()> {
        if tr.state.len() != tr.next_state.len() {
            return Err(OmpoError::ShapeMismatch {
                what: "next_state".to_string(),
                expected: tr.state.len(),
                actual: tr.next_state.len(),
            }
            .into());
        }

        match self.dims {
            None => {
                self.dims = Some((tr.state.len(), tr.action.len()));
                Ok(())
            }
            Some((o, _)) if o != tr.state.len() => Err(OmpoError::ShapeMismatch {
                what: "state".to_string(),
                expected: o,
                actual: tr.state.len(),
            }
            .into()),
            Some((_, a)) if a != tr.action.len() => Err(OmpoError::ShapeMismatch {
                what: "action".to_string(),
                expected: a,
                actual: tr.action.len(),
            }
            .into()),
            Some(_) => Ok(()),
        }
    }

    fn sample_indices(&mut self, n: usize) -> Result<Vec<usize>> {
        if n > self.size {
            return Err(OmpoError::InsufficientTransitions {
                requested: n,
                available: self.size,
            }
            .into());
        }
        Ok(index::sample(&mut self.rng, self.size, n).into_vec())
    }

    /// Samples `n` distinct transitions uniformly.
    pub fn sample(&mut self, n: usize) -> Result<Vec<Transition>> {
        let ixs = self.sample_indices(n)?;
        trace!("sample {} of {} transitions", n, self.size);
        Ok(ixs.into_iter().map(|ix| self.data[ix].clone()).collect())
    }

    /// Samples `n` distinct transitions uniformly and stacks them into a batch.
    pub fn batch(&mut self, n: usize) -> Result<TransitionBatch> {
        let ixs = self.sample_indices(n)?;
        let data = &self.data;
        Ok(TransitionBatch::from_transitions(
            ixs.into_iter().map(|ix| &data[ix]),
        ))
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Maximum number of stored transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if no transition is stored.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns `true` if the number of stored transitions reached the capacity.
    pub fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Removes all transitions and reseeds the random number generator.
    ///
    /// The buffer behaves as if it was freshly built from the same configuration.
    pub fn clear(&mut self) {
        self.i = 0;
        self.size = 0;
        self.data.clear();
        self.dims = None;
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    /// Iterates over the stored transitions from the oldest to the newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        let (newer, older) = if self.size < self.capacity {
            (&self.data[..], &self.data[..0])
        } else {
            let (newer, older) = self.data.split_at(self.i);
            (newer, older)
        };
        older.iter().chain(newer.iter())
    }

    /// Copies the stored transitions, oldest first.
    pub fn transitions(&self) -> Vec<Transition> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(i: usize) -> Transition {
        let x = i as f32;
        Transition::new(vec![x, -x], vec![x], x, vec![x + 1.0, -x - 1.0], 1.0)
    }

    fn buffer(capacity: usize) -> SimpleReplayBuffer {
        SimpleReplayBuffer::build(&SimpleReplayBufferConfig::default().capacity(capacity))
    }

    #[test]
    fn test_ring_overwrites_oldest() -> Result<()> {
        let mut buffer = buffer(5);
        for i in 0..7 {
            buffer.push(transition(i))?;
        }

        assert_eq!(buffer.len(), 5);
        let rewards: Vec<_> = buffer.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn test_size_saturates() -> Result<()> {
        let mut buffer = buffer(3);
        for i in 0..100 {
            buffer.push(transition(i))?;
            assert_eq!(buffer.len(), (i + 1).min(3));
        }
        assert!(buffer.is_full());
        Ok(())
    }

    #[test]
    fn test_sample_distinct_and_present() -> Result<()> {
        let mut buffer = buffer(20);
        for i in 0..50 {
            buffer.push(transition(i))?;
        }

        for n in [0, 1, 7, 20] {
            let samples = buffer.sample(n)?;
            assert_eq!(samples.len(), n);
            let mut rewards: Vec<_> = samples.iter().map(|t| t.reward as usize).collect();
            assert!(rewards.iter().all(|r| (30..50).contains(r)));
            rewards.sort_unstable();
            rewards.dedup();
            assert_eq!(rewards.len(), n);
        }
        Ok(())
    }

    #[test]
    fn test_sample_more_than_stored() -> Result<()> {
        let mut buffer = buffer(10);
        for i in 0..4 {
            buffer.push(transition(i))?;
        }

        let err = buffer.sample(5).unwrap_err();
        assert_eq!(
            err.downcast_ref::<OmpoError>(),
            Some(&OmpoError::InsufficientTransitions {
                requested: 5,
                available: 4
            })
        );
        Ok(())
    }

    #[test]
    fn test_same_seed_same_samples() -> Result<()> {
        let mut b1 = buffer(10);
        let mut b2 = buffer(10);
        for i in 0..10 {
            b1.push(transition(i))?;
            b2.push(transition(i))?;
        }
        assert_eq!(b1.sample(4)?, b2.sample(4)?);
        Ok(())
    }

    #[test]
    fn test_shape_mismatch() -> Result<()> {
        let mut buffer = buffer(4);
        buffer.push(transition(0))?;
        let bad = Transition::new(vec![0.0], vec![0.0], 0.0, vec![0.0], 1.0);
        assert!(buffer.push(bad).is_err());
        Ok(())
    }

    #[test]
    fn test_clear() -> Result<()> {
        let mut buffer = buffer(4);
        for i in 0..6 {
            buffer.push(transition(i))?;
        }
        buffer.clear();
        assert!(buffer.is_empty());
        buffer.push(transition(9))?;
        assert_eq!(buffer.iter().count(), 1);
        Ok(())
    }

    #[test]
    fn test_batch_widths() -> Result<()> {
        let mut buffer = buffer(8);
        for i in 0..8 {
            buffer.push(transition(i))?;
        }
        let batch = buffer.batch(3)?;
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.obs.len(), 6);
        assert_eq!(batch.act.len(), 3);
        assert_eq!((batch.obs_dim, batch.act_dim), (2, 1));
        Ok(())
    }
}
