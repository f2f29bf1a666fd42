//! Synthetic frame source for `stub://` and `synthetic://` URIs.
//!
//! Produces a moving RGB gradient so the full pipeline can run without a
//! camera. Pacing, frame limits, missing timestamps and recoverable glitches
//! are configurable for testing the pipeline's failure handling.

use std::thread;
use std::time::{Duration, Instant};

use crate::capture::domain::frame_source::{FrameSource, SourceError, SourceFrame, SourceInfo};
use crate::shared::frame::Frame;

/// Frame period used for native timestamps when pacing is disabled.
const UNPACED_PERIOD_NS: u64 = 33_333_333;

#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    /// Target frame rate; `0.0` yields frames as fast as they are requested.
    pub fps: f64,
    /// After this many frames the source reports `EndOfStream`.
    pub frame_limit: Option<u64>,
    /// When false, frames carry no native timestamp.
    pub native_timestamps: bool,
    /// Every Nth read fails with a recoverable decode error.
    pub glitch_every: Option<u64>,
    /// `open` fails with a connection error.
    pub refuse_connection: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30.0,
            frame_limit: None,
            native_timestamps: true,
            glitch_every: None,
            refuse_connection: false,
        }
    }
}

impl SyntheticConfig {
    /// Parses `scheme://name?width=W&height=H&fps=F&frames=N&native=B&glitch=N&refuse=B`.
    ///
    /// Unknown keys are ignored; malformed values are rejected.
    pub fn from_uri(uri: &str) -> Result<Self, SourceError> {
        let mut config = Self::default();
        let Some((_, query)) = uri.split_once('?') else {
            return Ok(config);
        };

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, "true"));
            let invalid = || SourceError::connection(uri, format!("invalid value for {key}: {value}"));
            match key {
                "width" => config.width = value.parse().map_err(|_| invalid())?,
                "height" => config.height = value.parse().map_err(|_| invalid())?,
                "fps" => config.fps = value.parse().map_err(|_| invalid())?,
                "frames" => config.frame_limit = Some(value.parse().map_err(|_| invalid())?),
                "native" => config.native_timestamps = parse_bool(value).ok_or_else(invalid)?,
                "glitch" => config.glitch_every = Some(value.parse().map_err(|_| invalid())?),
                "refuse" => config.refuse_connection = parse_bool(value).ok_or_else(invalid)?,
                _ => log::debug!("Ignoring unknown synthetic source option '{key}'"),
            }
        }

        if config.width == 0 || config.height == 0 {
            return Err(SourceError::connection(uri, "frame dimensions must be non-zero"));
        }
        if !config.fps.is_finite() || config.fps < 0.0 {
            return Err(SourceError::connection(uri, "fps must be a non-negative number"));
        }
        Ok(config)
    }

    fn period(&self) -> Option<Duration> {
        (self.fps > 0.0).then(|| Duration::from_secs_f64(1.0 / self.fps))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

pub struct SyntheticFrameSource {
    uri: String,
    config: SyntheticConfig,
    opened_at: Option<Instant>,
    reads: u64,
    frames_emitted: u64,
}

impl SyntheticFrameSource {
    pub fn new(uri: impl Into<String>, config: SyntheticConfig) -> Self {
        Self {
            uri: uri.into(),
            config,
            opened_at: None,
            reads: 0,
            frames_emitted: 0,
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, SourceError> {
        Ok(Self::new(uri, SyntheticConfig::from_uri(uri)?))
    }

    fn pace(&self, opened_at: Instant) {
        if let Some(period) = self.config.period() {
            let due = opened_at + period.mul_f64(self.frames_emitted as f64);
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
    }

    fn paint(&self) -> Frame {
        let (w, h) = (self.config.width, self.config.height);
        let mut frame = Frame::new(
            vec![0u8; (w as usize) * (h as usize) * 3],
            w,
            h,
            3,
            self.frames_emitted,
        );
        let shift = (self.frames_emitted % 256) as usize;
        let mut pixels = frame.pixels_mut();
        for ((row, col, channel), value) in pixels.indexed_iter_mut() {
            *value = match channel {
                0 => ((col * 255 / w as usize) + shift) as u8,
                1 => ((row * 255 / h as usize) + shift) as u8,
                _ => shift as u8,
            };
        }
        frame
    }

    fn native_time(&self) -> Option<u64> {
        if !self.config.native_timestamps {
            return None;
        }
        let period_ns = self
            .config
            .period()
            .map(|p| p.as_nanos() as u64)
            .unwrap_or(UNPACED_PERIOD_NS);
        Some(self.frames_emitted * period_ns)
    }
}

impl FrameSource for SyntheticFrameSource {
    fn open(&mut self) -> Result<SourceInfo, SourceError> {
        if self.config.refuse_connection {
            return Err(SourceError::connection(&self.uri, "connection refused"));
        }
        self.opened_at = Some(Instant::now());
        self.reads = 0;
        self.frames_emitted = 0;
        Ok(SourceInfo {
            width: self.config.width,
            height: self.config.height,
            codec: "rawvideo".to_string(),
            description: self.uri.clone(),
        })
    }

    fn next_frame(&mut self) -> Result<SourceFrame, SourceError> {
        let Some(opened_at) = self.opened_at else {
            return Err(SourceError::connection(&self.uri, "source not opened"));
        };
        if self
            .config
            .frame_limit
            .is_some_and(|limit| self.frames_emitted >= limit)
        {
            return Err(SourceError::EndOfStream);
        }

        self.reads += 1;
        if let Some(every) = self.config.glitch_every.filter(|&n| n > 0) {
            if self.reads % every == 0 {
                return Err(SourceError::Decode(format!("synthetic glitch at read {}", self.reads)));
            }
        }

        self.pace(opened_at);
        let frame = self.paint();
        let native_time_ns = self.native_time();
        self.frames_emitted += 1;
        Ok(SourceFrame {
            frame,
            native_time_ns,
        })
    }

    fn close(&mut self) {
        self.opened_at = None;
    }
}
