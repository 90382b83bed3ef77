//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum OmpoError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// A batch larger than the occupied part of a replay buffer was requested.
    #[error("Requested {requested} transitions, but the buffer holds {available}")]
    InsufficientTransitions {
        /// Number of transitions requested.
        requested: usize,
        /// Number of transitions stored in the buffer.
        available: usize,
    },

    /// A vector had a width different from the one the receiver expects.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// The field that was checked.
        what: String,
        /// Expected width.
        expected: usize,
        /// Given width.
        actual: usize,
    },

    /// The environment name is not known to the environment factory.
    #[error("Unknown environment: {0}")]
    UnknownEnv(String),

    /// A configuration value is outside of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
