//! Types and traits for recording training metrics.
//!
//! A [`Record`] is a set of named values produced by the trainer, the
//! discriminator refresh or an evaluation run. A [`Recorder`] writes records to
//! an output such as a tensorboard event file.
//!
//! Metric records carry their own step counter under the key `"step"`, as a
//! [`RecordValue::Step`], since
//! discriminator updates, agent updates and environment steps advance at
//! different rates.
//!
//! ```rust
//! use ompo_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_step("step", 10);
//! record.insert("loss/critic", RecordValue::Scalar(0.25));
//! assert_eq!(record.get_scalar("loss/critic").unwrap(), 0.25);
//! assert_eq!(record.get_step("step").unwrap(), 10);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
