use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_FPS_WINDOW, DEFAULT_POLL_INTERVAL, DEFAULT_QUALITY, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_RETRY_BACKOFF, DEFAULT_WORKER_COUNT,
};
use crate::storage::frame_file_name::TimestampZone;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CaptureConfigError {
    #[error("source URI must not be empty")]
    EmptySource,
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("quality must be between 0 and 100, got {0}")]
    Quality(u8),
    #[error("queue capacity must be at least 1")]
    NoQueueCapacity,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Everything a capture session needs to know up front.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    pub source_uri: String,
    pub output_dir: PathBuf,
    pub worker_count: usize,
    /// Encoder quality, 0-100.
    pub quality: u8,
    pub queue_capacity: usize,
    /// Longest a writer waits on an empty queue before re-checking for stop.
    pub poll_interval: Duration,
    /// Pause after a recoverable source failure.
    pub retry_backoff: Duration,
    pub fps_window: Duration,
    pub timestamp_zone: TimestampZone,
}

impl CaptureConfig {
    pub fn new(source_uri: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_uri: source_uri.into(),
            output_dir: output_dir.into(),
            worker_count: DEFAULT_WORKER_COUNT,
            quality: DEFAULT_QUALITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            fps_window: DEFAULT_FPS_WINDOW,
            timestamp_zone: TimestampZone::default(),
        }
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn with_fps_window(mut self, fps_window: Duration) -> Self {
        self.fps_window = fps_window;
        self
    }

    pub fn with_timestamp_zone(mut self, zone: TimestampZone) -> Self {
        self.timestamp_zone = zone;
        self
    }

    pub fn validate(&self) -> Result<(), CaptureConfigError> {
        if self.source_uri.trim().is_empty() {
            return Err(CaptureConfigError::EmptySource);
        }
        if self.worker_count == 0 {
            return Err(CaptureConfigError::NoWorkers);
        }
        if self.quality > 100 {
            return Err(CaptureConfigError::Quality(self.quality));
        }
        if self.queue_capacity == 0 {
            return Err(CaptureConfigError::NoQueueCapacity);
        }
        if self.poll_interval.is_zero() {
            return Err(CaptureConfigError::ZeroDuration("poll interval"));
        }
        if self.fps_window.is_zero() {
            return Err(CaptureConfigError::ZeroDuration("fps window"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn base() -> CaptureConfig {
        CaptureConfig::new("stub://cam", "/tmp/out")
    }

    #[test]
    fn test_defaults() {
        let config = base();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.quality, 85);
        assert_eq!(config.queue_capacity, 15);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.retry_backoff, Duration::from_millis(10));
        assert_eq!(config.fps_window, Duration::from_millis(1000));
        assert_eq!(config.timestamp_zone, TimestampZone::Local);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_builders() {
        let config = base()
            .with_worker_count(2)
            .with_quality(70)
            .with_queue_capacity(3)
            .with_poll_interval(Duration::from_millis(5))
            .with_retry_backoff(Duration::ZERO)
            .with_fps_window(Duration::from_millis(250))
            .with_timestamp_zone(TimestampZone::Utc);
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.quality, 70);
        assert_eq!(config.queue_capacity, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.retry_backoff, Duration::ZERO);
        assert_eq!(config.fps_window, Duration::from_millis(250));
        assert_eq!(config.timestamp_zone, TimestampZone::Utc);
        assert_eq!(config.validate(), Ok(()));
    }

    #[rstest]
    #[case::empty_source(CaptureConfig::new("  ", "/tmp"), CaptureConfigError::EmptySource)]
    #[case::no_workers(base().with_worker_count(0), CaptureConfigError::NoWorkers)]
    #[case::quality(base().with_quality(101), CaptureConfigError::Quality(101))]
    #[case::capacity(base().with_queue_capacity(0), CaptureConfigError::NoQueueCapacity)]
    #[case::poll(base().with_poll_interval(Duration::ZERO), CaptureConfigError::ZeroDuration("poll interval"))]
    #[case::window(base().with_fps_window(Duration::ZERO), CaptureConfigError::ZeroDuration("fps window"))]
    fn test_validate_rejects(#[case] config: CaptureConfig, #[case] expected: CaptureConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }
}
