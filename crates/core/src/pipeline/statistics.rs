use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time view of the pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub captured: u64,
    pub written: u64,
    pub dropped: u64,
    pub fps: f32,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "captured={} written={} dropped={} fps={:.1}",
            self.captured, self.written, self.dropped, self.fps
        )
    }
}

/// Lock-free counters shared by the ingestion thread and the writers.
///
/// Every update is one atomic operation. A snapshot reads the fields one by
/// one, so it is not a consistent cut across all four values.
#[derive(Default)]
pub struct StatisticsRegistry {
    captured: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    fps_bits: AtomicU32,
}

impl StatisticsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Overwrites the throughput gauge.
    pub fn set_fps(&self, fps: f32) {
        self.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FrameStats {
        FrameStats {
            captured: self.captured.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            fps: f32::from_bits(self.fps_bits.load(Ordering::Relaxed)),
        }
    }
}

/// Rolling frame-rate measurement owned by the ingestion thread.
///
/// Counts every frame the source yields, accepted or dropped, and produces a
/// new rate once `window` has elapsed. Between windows the last published
/// value stays in place, so a stalled source shows up as a frozen gauge.
pub struct ThroughputWindow {
    window: Duration,
    started: Instant,
    frames: u64,
}

impl ThroughputWindow {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            started: now,
            frames: 0,
        }
    }

    /// Counts one frame observed at `now`; returns the rate when a window closes.
    pub fn observe(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.window || elapsed.is_zero() {
            return None;
        }
        let elapsed_ms = elapsed.as_millis().max(1) as f32;
        let fps = self.frames as f32 * 1000.0 / elapsed_ms;
        self.frames = 0;
        self.started = now;
        Some(fps)
    }
}
