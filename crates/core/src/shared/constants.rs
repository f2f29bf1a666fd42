use std::time::Duration;

/// Frames held between ingestion and the writers before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 15;

pub const DEFAULT_WORKER_COUNT: usize = 4;

pub const DEFAULT_QUALITY: u8 = 85;

/// Upper bound on how long an idle writer waits before re-checking for stop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pause after a recoverable source failure before reading again.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Rolling window for the throughput gauge.
pub const DEFAULT_FPS_WINDOW: Duration = Duration::from_millis(1000);

/// Strftime pattern for the receive-time part of output file names.
pub const RECEIVE_TIME_FORMAT: &str = "%Y.%m.%d_%H.%M.%S%.3f";

pub const TEMP_FILE_SUFFIX: &str = "tmp";

/// URI schemes served by the built-in synthetic source.
pub const SYNTHETIC_SCHEMES: &[&str] = &["stub", "synthetic"];

pub const DEFAULT_CAMERA_IP: &str = "169.254.50.183";
pub const CAMERA_RTSP_PORT: u16 = 8554;
