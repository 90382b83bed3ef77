//! Core functionalities.
mod agent;
mod discriminator;
mod env;
mod policy;
mod step;
pub use agent::{Agent, UpdateInfo};
pub use discriminator::Discriminator;
pub use env::Env;
pub use policy::{Configurable, Policy};
use std::fmt::Debug;
pub use step::{Info, Step};

/// An observation of an environment.
///
/// Observations are flat vectors of `f32` from the point of view of the
/// replay buffer, which stores them as [`Transition`] states.
///
/// [`Transition`]: crate::replay_buffer::Transition
pub trait Obs: Clone + Debug {
    /// Returns the observation as a flat vector.
    fn to_vec(&self) -> Vec<f32>;

    /// Returns the number of elements in the observation.
    fn dim(&self) -> usize {
        self.to_vec().len()
    }
}

/// An action of an environment.
pub trait Act: Clone + Debug {
    /// Returns the action as a flat vector.
    fn to_vec(&self) -> Vec<f32>;

    /// Returns the number of elements in the action.
    fn dim(&self) -> usize {
        self.to_vec().len()
    }
}
