//! [`Recorder`] writing scalar records to TFRecord event files.
use log::warn;
use ompo_core::record::{Record, RecordValue, Recorder};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Each record carries its own step counter under the step key, `"step"` by
/// default, so metrics of the discriminator, the agent and the evaluation are
/// plotted against their own counters.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "step".to_string(),
        }
    }

    /// Sets the key of the step counter.
    pub fn step_key(mut self, v: impl Into<String>) -> Self {
        self.step_key = v.into();
        self
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [`Record`] into a TFRecord.
    ///
    /// Only [`RecordValue::Scalar`] values are written. Records without a
    /// [`RecordValue::Step`] counter are dropped with a warning.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Step(v)) => *v,
            _ => {
                warn!("Record without step {:?} is dropped", self.step_key);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            if let RecordValue::Scalar(v) = v {
                self.writer.add_scalar(k, *v, step);
            }
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_event_file() -> std::io::Result<()> {
        let dir = TempDir::new("tensorboard")?;
        {
            let mut recorder = TensorboardRecorder::new(dir.path());
            recorder.write(Record::from_slice(&[
                ("step", RecordValue::Step(3)),
                ("loss/critic", RecordValue::Scalar(0.5)),
                ("act", RecordValue::Array1(vec![0.1, -0.1])),
            ]));
            recorder.write(Record::from_scalar("train/reward", 1.0));
            recorder.flush();
        }

        let n_files = std::fs::read_dir(dir.path())?.count();
        assert!(n_files > 0);
        Ok(())
    }
}
