use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::encoding::domain::image_encoder::{EncodeError, ImageEncoder};
use crate::pipeline::shared_state::PipelineShared;
use crate::shared::error_event::ErrorKind;
use crate::shared::frame_record::FrameRecord;
use crate::storage::frame_file_name::{FrameFileName, TimestampZone};
use crate::storage::frame_file_writer::{FrameFileWriter, PersistError, StoredFrame};

#[derive(Error, Debug)]
enum WriteFailure {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// One consumer: takes records off the queue, encodes them and moves the
/// result into place under a name that carries the encode latency.
pub(crate) struct WriterLoop {
    pub worker_id: usize,
    pub shared: Arc<PipelineShared>,
    pub encoder: Arc<dyn ImageEncoder>,
    pub files: Arc<FrameFileWriter>,
    pub quality: u8,
    pub zone: TimestampZone,
    pub poll_interval: Duration,
}

impl WriterLoop {
    /// Runs until a stop is requested. Returns how many frames this worker
    /// persisted.
    pub fn run(self) -> u64 {
        let mut written = 0u64;

        while self.shared.run_state.should_continue() {
            let Some(record) = self.shared.queue.take(self.poll_interval) else {
                continue;
            };
            let sequence = record.sequence;

            match self.persist(record) {
                Ok(stored) => {
                    written += 1;
                    self.shared.stats.record_written();
                    if stored.replaced {
                        log::warn!(
                            "Writer {} overwrote {}: frame {sequence} shares its receive time, timestamp and latency",
                            self.worker_id,
                            stored.path.display()
                        );
                    } else {
                        log::trace!("Writer {} stored {}", self.worker_id, stored.path.display());
                    }
                }
                Err(e) => {
                    log::warn!("Writer {} dropped frame {sequence}: {e}", self.worker_id);
                    self.shared.errors.report(
                        ErrorKind::PersistenceFailure,
                        format!("frame {sequence}: {e}"),
                        false,
                    );
                }
            }
        }

        log::info!("Writer {} exiting (wrote {written} frames)", self.worker_id);
        written
    }

    fn persist(&self, record: FrameRecord) -> Result<StoredFrame, WriteFailure> {
        let name = FrameFileName::new(
            record.receive_time_ms,
            record.hardware_time,
            self.zone,
            self.encoder.extension(),
        );

        let started = Instant::now();
        let bytes = self.encoder.encode(&record.frame, self.quality)?;
        drop(record.frame);
        let pending = self.files.write_pending(&name, record.sequence, &bytes)?;
        let latency_ms = started.elapsed().as_millis() as u64;

        Ok(self.files.finalize(pending, &name.final_name(latency_ms))?)
    }
}
