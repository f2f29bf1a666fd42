use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::capture::domain::frame_source::{FrameSource, SourceError};
use crate::capture::infrastructure::source_factory::create_source;
use crate::encoding::domain::image_encoder::ImageEncoder;
use crate::encoding::infrastructure::jpeg_encoder::JpegEncoder;
use crate::shared::error_event::{ErrorEvent, ErrorKind};
use crate::storage::frame_file_writer::FrameFileWriter;

use super::capture_config::{CaptureConfig, CaptureConfigError};
use super::infrastructure::ingestion_loop::{IngestionLoop, SourceSlot};
use super::infrastructure::writer_loop::WriterLoop;
use super::run_state::LifecycleState;
use super::shared_state::{lock, mark_pipeline_thread, on_pipeline_thread, PipelineShared};
use super::statistics::FrameStats;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] CaptureConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

struct ActiveTasks {
    ingestion: Option<JoinHandle<()>>,
    writers: Vec<JoinHandle<u64>>,
}

/// A restartable capture pipeline: one ingestion thread feeding a bounded
/// queue drained by `worker_count` writer threads.
///
/// Faults never surface as `Err` from `start`/`stop`. They are delivered to
/// the error callback, and fatal ones take the session out of the running
/// state on their own. Dropping the session stops it.
pub struct CaptureSession {
    config: CaptureConfig,
    shared: Arc<PipelineShared>,
    source: SourceSlot,
    encoder: Arc<dyn ImageEncoder>,
    files: Arc<FrameFileWriter>,
    tasks: Mutex<Option<ActiveTasks>>,
    #[cfg(test)]
    spawn_budget: std::sync::atomic::AtomicUsize,
}

impl CaptureSession {
    pub fn new(
        config: CaptureConfig,
        source: Box<dyn FrameSource>,
        encoder: Arc<dyn ImageEncoder>,
    ) -> Result<Self, CaptureConfigError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(PipelineShared::new(config.queue_capacity)),
            source: Arc::new(Mutex::new(Some(source))),
            encoder,
            files: Arc::new(FrameFileWriter::new(config.output_dir.clone())),
            tasks: Mutex::new(None),
            config,
            #[cfg(test)]
            spawn_budget: std::sync::atomic::AtomicUsize::new(usize::MAX),
        })
    }

    /// Builds a session around the source `config.source_uri` names and the
    /// JPEG encoder.
    pub fn from_config(config: CaptureConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let source = create_source(&config.source_uri)?;
        Ok(Self::new(config, source, Arc::new(JpegEncoder::new()))?)
    }

    /// Starts ingestion and the writer pool. Returns false when already
    /// running or when startup failed; failures are reported through the
    /// error callback as fatal events.
    pub fn start(&self) -> bool {
        if on_pipeline_thread() {
            log::warn!("start() called from a pipeline thread; ignoring");
            return false;
        }

        let mut tasks = lock(&self.tasks);
        if self.shared.run_state.is_running() {
            log::warn!("Capture already running");
            return false;
        }

        // A fatal error ended the previous run without a stop().
        if let Some(stale) = tasks.take() {
            self.join_tasks(stale, None);
            self.shared.run_state.set_phase(LifecycleState::Stopped);
        }

        if lock(&self.source).is_none() {
            self.shared.errors.report(
                ErrorKind::ConcurrencyFailure,
                "Frame source was lost by a previous run",
                true,
            );
            return false;
        }

        if let Err(e) = self.files.prepare() {
            log::error!("{e}");
            self.shared
                .errors
                .report(ErrorKind::PersistenceFailure, e.to_string(), true);
            return false;
        }

        if !self.shared.run_state.try_begin_start() {
            return false;
        }

        let abandoned = self.shared.queue.clear();
        if abandoned > 0 {
            log::info!("Discarded {abandoned} frames left over from the previous run");
        }

        match self.spawn_tasks() {
            Ok(active) => {
                *tasks = Some(active);
                self.shared.run_state.finish_start();
                log::info!(
                    "Capture started: {} -> {} ({} writers, queue {})",
                    self.config.source_uri,
                    self.config.output_dir.display(),
                    self.config.worker_count,
                    self.config.queue_capacity
                );
                true
            }
            Err(e) => {
                log::error!("Failed to start threads: {e}");
                self.shared.errors.report(
                    ErrorKind::ConcurrencyFailure,
                    format!("Failed to start threads: {e}"),
                    true,
                );
                self.shared.run_state.set_phase(LifecycleState::Stopped);
                false
            }
        }
    }

    /// Requests shutdown and waits for every pipeline thread to finish its
    /// current frame. Safe to call repeatedly. From inside the error callback
    /// this only requests the stop; the owner's next `stop()` joins, as does
    /// dropping the last handle to the session.
    pub fn stop(&self) {
        if on_pipeline_thread() {
            self.shared.run_state.request_stop();
            return;
        }

        let mut tasks = lock(&self.tasks);
        let Some(active) = tasks.take() else {
            return;
        };

        log::info!("Stopping capture");
        self.shared.run_state.request_stop();
        self.join_tasks(active, None);
        self.shared.run_state.set_phase(LifecycleState::Stopped);

        log::info!(
            "Capture stopped: {} ({} frames abandoned in queue)",
            self.stats(),
            self.shared.queue.size()
        );
    }

    pub fn is_running(&self) -> bool {
        self.shared.run_state.is_running()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.run_state.phase()
    }

    pub fn stats(&self) -> FrameStats {
        self.shared.stats.snapshot()
    }

    /// Registers the fault observer. It runs on whichever pipeline thread
    /// reports, possibly on several at once.
    pub fn set_error_callback<F>(&self, callback: F)
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        self.shared.errors.set_callback(callback);
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.size()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn spawn_tasks(&self) -> io::Result<ActiveTasks> {
        let mut active = ActiveTasks {
            ingestion: None,
            writers: Vec::with_capacity(self.config.worker_count),
        };

        // Ingestion holds off until every thread exists, so a failed start
        // never opens the source.
        let (gate, start_gate) = crossbeam_channel::bounded::<()>(0);
        let spawned = self.spawn_into(&mut active, start_gate);
        if spawned.is_err() {
            self.shared.run_state.request_stop();
        }
        drop(gate);

        match spawned {
            Ok(()) => Ok(active),
            Err(e) => {
                self.join_tasks(active, None);
                Err(e)
            }
        }
    }

    fn spawn_into(&self, active: &mut ActiveTasks, start_gate: Receiver<()>) -> io::Result<()> {
        let ingestion = IngestionLoop {
            shared: Arc::clone(&self.shared),
            source_slot: Arc::clone(&self.source),
            retry_backoff: self.config.retry_backoff,
            fps_window: self.config.fps_window,
            start_gate,
        };
        active.ingestion = Some(self.spawn("framegrab-ingest".to_string(), move || ingestion.run())?);

        for worker_id in 0..self.config.worker_count {
            let writer = WriterLoop {
                worker_id,
                shared: Arc::clone(&self.shared),
                encoder: Arc::clone(&self.encoder),
                files: Arc::clone(&self.files),
                quality: self.config.quality,
                zone: self.config.timestamp_zone,
                poll_interval: self.config.poll_interval,
            };
            let handle = self.spawn(format!("framegrab-writer-{worker_id}"), move || writer.run())?;
            active.writers.push(handle);
        }
        Ok(())
    }

    fn spawn<F, T>(&self, name: String, body: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        #[cfg(test)]
        {
            use std::sync::atomic::Ordering;
            if self
                .spawn_budget
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_err()
            {
                return Err(io::Error::other("thread budget exhausted"));
            }
        }

        thread::Builder::new().name(name).spawn(move || {
            mark_pipeline_thread();
            body()
        })
    }

    /// Joins every pipeline thread except `skip`, which is left detached.
    fn join_tasks(&self, active: ActiveTasks, skip: Option<ThreadId>) {
        if let Some(ingestion) = active.ingestion {
            self.join_one(ingestion, "ingestion thread", skip);
        }
        for (worker_id, writer) in active.writers.into_iter().enumerate() {
            self.join_one(writer, &format!("writer {worker_id}"), skip);
        }
    }

    fn join_one<T>(&self, handle: JoinHandle<T>, who: &str, skip: Option<ThreadId>) {
        if Some(handle.thread().id()) == skip {
            return;
        }
        if handle.join().is_err() {
            self.report_panic(who);
        }
    }

    fn report_panic(&self, who: &str) {
        log::error!("{who} panicked");
        self.shared
            .errors
            .report(ErrorKind::ConcurrencyFailure, format!("{who} panicked"), false);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if !on_pipeline_thread() {
            self.stop();
            return;
        }

        // The last handle went away inside a callback on one of our own
        // threads. Nobody else can reach `tasks` now, so join everything but
        // the current thread, which exits on its next stop check.
        self.shared.run_state.request_stop();
        let active = self
            .tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(active) = active {
            self.join_tasks(active, Some(thread::current().id()));
        }
        self.shared.run_state.set_phase(LifecycleState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::infrastructure::synthetic_source::SyntheticFrameSource;
    use crate::encoding::domain::image_encoder::EncodeError;
    use crate::shared::frame::Frame;
    use crate::storage::frame_file_name;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    struct SleepingEncoder {
        delay: Duration,
    }

    impl ImageEncoder for SleepingEncoder {
        fn encode(&self, _frame: &Frame, _quality: u8) -> Result<Vec<u8>, EncodeError> {
            thread::sleep(self.delay);
            Ok(vec![0xff, 0xd8, 0xff, 0xd9])
        }

        fn extension(&self) -> &str {
            "jpg"
        }
    }

    struct FailingEncoder;

    impl ImageEncoder for FailingEncoder {
        fn encode(&self, _frame: &Frame, _quality: u8) -> Result<Vec<u8>, EncodeError> {
            Err(EncodeError::Codec("unsupported".into()))
        }

        fn extension(&self) -> &str {
            "jpg"
        }
    }

    fn session_with(
        uri: &str,
        dir: &Path,
        workers: usize,
        encoder: Arc<dyn ImageEncoder>,
    ) -> CaptureSession {
        let config = CaptureConfig::new(uri, dir)
            .with_worker_count(workers)
            .with_poll_interval(Duration::from_millis(10))
            .with_retry_backoff(Duration::from_millis(1));
        let source = Box::new(SyntheticFrameSource::from_uri(uri).unwrap());
        CaptureSession::new(config, source, encoder).unwrap()
    }

    fn session(uri: &str, dir: &Path) -> CaptureSession {
        session_with(uri, dir, 2, Arc::new(JpegEncoder::new()))
    }

    fn collect_events(session: &CaptureSession) -> Arc<Mutex<Vec<ErrorEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        session.set_error_callback(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    fn output_names(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let session = session("stub://cam?width=8&height=8&fps=100", dir.path());
        assert_eq!(session.state(), LifecycleState::Stopped);
        assert!(!session.is_running());

        assert!(session.start());
        assert!(session.is_running());
        assert_eq!(session.state(), LifecycleState::Running);
        assert!(!session.start(), "second start must be rejected");

        session.stop();
        assert!(!session.is_running());
        assert_eq!(session.state(), LifecycleState::Stopped);

        session.stop();
        assert_eq!(session.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let session = session("stub://cam", dir.path());
        session.stop();
        assert_eq!(session.state(), LifecycleState::Stopped);
        assert_eq!(session.stats(), FrameStats::default());
    }

    #[test]
    fn test_counters_account_for_every_yielded_frame() {
        let dir = tempfile::tempdir().unwrap();
        let session = session("stub://cam?width=8&height=8&fps=0&frames=200", dir.path());
        let events = collect_events(&session);

        assert!(session.start());
        // Running out of frames is a fatal disconnect.
        assert!(wait_until(Duration::from_secs(5), || !session.is_running()));
        let stats = session.stats();
        assert_eq!(stats.captured + stats.dropped, 200);

        session.stop();
        let stats = session.stats();
        assert!(stats.written <= stats.captured);
        assert_eq!(stats.written + session.queue_len() as u64, stats.captured);

        let events = events.lock().unwrap();
        let fatal: Vec<_> = events.iter().filter(|e| e.fatal).collect();
        assert_eq!(fatal.len(), 1);
        assert_eq!(fatal[0].kind, ErrorKind::SourceConnectionFailure);
    }

    #[test]
    fn test_files_appear_only_under_final_names() {
        let dir = tempfile::tempdir().unwrap();
        let session = session("stub://cam?width=16&height=16&fps=50", dir.path());
        assert!(session.start());
        assert!(wait_until(Duration::from_secs(5), || session.stats().written >= 5));
        session.stop();

        let names = output_names(dir.path());
        assert_eq!(names.len() as u64, session.stats().written);
        for name in &names {
            assert!(!name.ends_with(".tmp"), "leftover temporary file {name}");
            let parsed = frame_file_name::parse(name).unwrap();
            assert_eq!(parsed.extension, "jpg");
            assert!(parsed.hardware_time.is_native());
        }
    }

    #[test]
    fn test_output_directory_is_created_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let session = session("stub://cam?width=8&height=8&fps=50", &nested);
        assert!(session.start());
        assert!(nested.is_dir());
        session.stop();
    }

    #[test]
    fn test_unusable_output_directory_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let session = session("stub://cam", &blocker.join("sub"));
        let events = collect_events(&session);

        assert!(!session.start());
        assert!(!session.is_running());
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ErrorKind::PersistenceFailure);
        assert!(events[0].fatal);
    }

    #[test]
    fn test_refused_connection_stops_session_by_itself() {
        let dir = tempfile::tempdir().unwrap();
        let session = session("stub://cam?refuse=1", dir.path());
        let events = collect_events(&session);

        assert!(session.start());
        assert!(wait_until(Duration::from_secs(5), || !session.is_running()));
        session.stop();
        assert_eq!(session.state(), LifecycleState::Stopped);

        let events = events.lock().unwrap();
        assert_eq!(events[0].kind, ErrorKind::SourceConnectionFailure);
        assert!(events[0].fatal);
        assert_eq!(session.stats().captured, 0);
    }

    #[test]
    fn test_slow_encoder_sheds_load() {
        let dir = tempfile::tempdir().unwrap();
        let sleep = Duration::from_millis(50);
        let session = session_with(
            "stub://cam?width=8&height=8&fps=200",
            dir.path(),
            1,
            Arc::new(SleepingEncoder { delay: sleep }),
        );

        let started = Instant::now();
        assert!(session.start());
        thread::sleep(Duration::from_millis(600));
        session.stop();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let stats = session.stats();
        let ceiling = elapsed_ms / sleep.as_millis() as u64 + 1;
        assert!(stats.written <= ceiling, "{} written, ceiling {ceiling}", stats.written);
        assert!(stats.dropped > 0);
    }

    #[test]
    fn test_encode_failures_keep_pipeline_running() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            "stub://cam?width=8&height=8&fps=100",
            dir.path(),
            2,
            Arc::new(FailingEncoder),
        );
        let events = collect_events(&session);

        assert!(session.start());
        assert!(wait_until(Duration::from_secs(5), || events.lock().unwrap().len() >= 3));
        assert!(session.is_running());
        session.stop();

        assert_eq!(session.stats().written, 0);
        assert!(events
            .lock()
            .unwrap()
            .iter()
            .all(|e| e.kind == ErrorKind::PersistenceFailure && !e.fatal));
        assert!(output_names(dir.path()).is_empty());
    }

    #[test]
    fn test_restart_keeps_sequences_unique() {
        let dir = tempfile::tempdir().unwrap();
        let session = session("stub://cam?width=8&height=8&fps=100", dir.path());

        for _ in 0..2 {
            let before = session.stats().captured;
            assert!(session.start());
            assert!(wait_until(Duration::from_secs(5), || session.stats().captured > before));
            session.stop();
        }

        let stats = session.stats();
        assert_eq!(session.shared.next_sequence(), stats.captured + stats.dropped);
    }

    #[test]
    fn test_restart_after_fatal_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = session("stub://cam?width=8&height=8&fps=0&frames=5", dir.path());
        assert!(session.start());
        assert!(wait_until(Duration::from_secs(5), || !session.is_running()));

        // Reopening rewinds the synthetic stream, which runs out again.
        assert!(session.start());
        assert!(wait_until(Duration::from_secs(5), || !session.is_running()));
        session.stop();
        assert_eq!(session.state(), LifecycleState::Stopped);
    }

    #[rstest::rstest]
    #[case(0, "stub://cam?width=8&height=8&fps=100")]
    #[case(1, "stub://cam?width=8&height=8&fps=100")]
    #[case(3, "stub://cam?width=8&height=8&fps=100")]
    #[case(0, "stub://cam?refuse=1")]
    #[case(2, "stub://cam?refuse=1")]
    #[case(4, "stub://cam?refuse=1")]
    fn test_partial_spawn_failure(#[case] budget: usize, #[case] uri: &str) {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            uri,
            dir.path(),
            4,
            Arc::new(JpegEncoder::new()),
        );
        session
            .spawn_budget
            .store(budget, std::sync::atomic::Ordering::Release);
        let events = collect_events(&session);

        assert!(!session.start());
        assert!(!session.is_running());
        assert_eq!(session.state(), LifecycleState::Stopped);
        assert!(lock(&session.tasks).is_none());

        {
            // Exactly one event: the source was never opened.
            let events = events.lock().unwrap();
            assert_eq!(events.len(), 1, "{events:?}");
            assert_eq!(events[0].kind, ErrorKind::ConcurrencyFailure);
            assert!(events[0].fatal);
            assert!(events[0].message.starts_with("Failed to start threads"));
        }

        // The source came back, so a later start can succeed.
        session
            .spawn_budget
            .store(usize::MAX, std::sync::atomic::Ordering::Release);
        assert!(session.start());
        session.stop();
    }

    #[test]
    fn test_stop_from_error_callback_does_not_deadlock() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(session_with(
            "stub://cam?width=8&height=8&fps=100",
            dir.path(),
            1,
            Arc::new(FailingEncoder),
        ));
        let weak = Arc::downgrade(&session);
        session.set_error_callback(move |_| {
            if let Some(session) = weak.upgrade() {
                session.stop();
            }
        });

        assert!(session.start());
        assert!(wait_until(Duration::from_secs(5), || !session.is_running()));
        session.stop();
        assert_eq!(session.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_last_handle_dropped_in_callback_joins_other_threads() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(session_with(
            "stub://cam?width=8&height=8&fps=100",
            dir.path(),
            2,
            Arc::new(FailingEncoder),
        ));
        let shared = Arc::clone(&session.shared);
        let weak_shared = Arc::downgrade(&shared);

        // The callback takes the only strong handle and drops it, so the
        // session is torn down on a writer thread.
        let holder: Arc<Mutex<Option<Arc<CaptureSession>>>> = Arc::new(Mutex::new(None));
        let survivors = Arc::new(AtomicUsize::new(usize::MAX));
        let (slot, seen) = (Arc::clone(&holder), Arc::clone(&survivors));
        session.set_error_callback(move |_| {
            let taken = slot.lock().unwrap().take();
            if let Some(last) = taken {
                drop(last);
                if let Some(shared) = weak_shared.upgrade() {
                    // The test's clone, this writer's, and the upgrade itself.
                    seen.store(Arc::strong_count(&shared) - 1, Ordering::SeqCst);
                }
            }
        });

        assert!(session.start());
        *holder.lock().unwrap() = Some(session);

        assert!(wait_until(Duration::from_secs(5), || {
            survivors.load(Ordering::SeqCst) != usize::MAX
        }));
        // Ingestion and the other writer were joined before the drop returned.
        assert_eq!(survivors.load(Ordering::SeqCst), 2);
        assert_eq!(shared.run_state.phase(), LifecycleState::Stopped);
        assert!(wait_until(Duration::from_secs(5), || Arc::strong_count(&shared) == 1));
    }

    #[test]
    fn test_from_config_rejects_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureConfig::new("stub://cam", dir.path()).with_worker_count(0);
        assert!(matches!(
            CaptureSession::from_config(config),
            Err(SessionError::Config(CaptureConfigError::NoWorkers))
        ));
    }

    #[test]
    fn test_drop_joins_threads() {
        let dir = tempfile::tempdir().unwrap();
        let session = session("stub://cam?width=8&height=8&fps=100", dir.path());
        assert!(session.start());
        let shared = Arc::clone(&session.shared);
        drop(session);
        assert!(!shared.run_state.is_running());
        assert_eq!(shared.run_state.phase(), LifecycleState::Stopped);
        // Only our clone remains once every thread has been joined.
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
