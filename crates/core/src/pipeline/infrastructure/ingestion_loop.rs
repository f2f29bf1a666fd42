use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::Receiver;

use crate::capture::domain::frame_source::{FrameSource, SourceError, SourceFrame};
use crate::pipeline::shared_state::{lock, PipelineShared};
use crate::pipeline::statistics::ThroughputWindow;
use crate::shared::error_event::ErrorKind;
use crate::shared::frame_record::FrameRecord;
use crate::shared::hardware_time::HardwareTime;

/// Slot the session parks its frame source in between runs.
pub(crate) type SourceSlot = Arc<Mutex<Option<Box<dyn FrameSource>>>>;

/// The single producer: pulls frames from the source, stamps them and
/// offers them to the queue without ever waiting for space.
pub(crate) struct IngestionLoop {
    pub shared: Arc<PipelineShared>,
    pub source_slot: SourceSlot,
    pub retry_backoff: Duration,
    pub fps_window: Duration,
    /// Disconnected by the session once every pipeline thread is spawned.
    pub start_gate: Receiver<()>,
}

impl IngestionLoop {
    pub fn run(self) {
        let _ = self.start_gate.recv();
        if !self.shared.run_state.should_continue() {
            log::debug!("Ingestion cancelled before the source was opened");
            return;
        }

        let Some(mut source) = lock(&self.source_slot).take() else {
            self.shared.errors.report(
                ErrorKind::ConcurrencyFailure,
                "Frame source is already in use",
                true,
            );
            return;
        };

        self.drive(source.as_mut());
        source.close();
        *lock(&self.source_slot) = Some(source);

        log::info!("Ingestion thread exiting");
    }

    fn drive(&self, source: &mut dyn FrameSource) {
        let info = match source.open() {
            Ok(info) => info,
            Err(e) => {
                self.report(&e);
                return;
            }
        };
        log::info!(
            "Connected to {} ({}x{}, {})",
            info.description,
            info.width,
            info.height,
            info.codec
        );

        let mut window = ThroughputWindow::new(self.fps_window, Instant::now());
        while self.shared.run_state.should_continue() {
            match source.next_frame() {
                Ok(decoded) => self.ingest(decoded),
                Err(e) if e.is_fatal() => {
                    self.report(&e);
                    return;
                }
                Err(e) => {
                    self.report(&e);
                    thread::sleep(self.retry_backoff);
                    continue;
                }
            }

            if let Some(fps) = window.observe(Instant::now()) {
                self.shared.stats.set_fps(fps);
            }
        }
    }

    fn ingest(&self, decoded: SourceFrame) {
        let receive_time_ms = epoch_millis();
        let sequence = self.shared.next_sequence();
        let hardware_time = HardwareTime::resolve(decoded.native_time_ns, receive_time_ms);
        let record = FrameRecord::new(decoded.frame, sequence, receive_time_ms, hardware_time);

        if self.shared.queue.offer(record) {
            self.shared.stats.record_captured();
        } else {
            self.shared.stats.record_dropped();
            log::debug!("Queue full, dropped frame {sequence}");
        }
    }

    fn report(&self, error: &SourceError) {
        if error.is_fatal() {
            log::error!("Frame source failed: {error}");
        } else {
            log::warn!("Frame source hiccup: {error}");
        }
        self.shared
            .errors
            .report(error.kind(), error.to_string(), error.is_fatal());
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
