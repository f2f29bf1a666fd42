use thiserror::Error;

use crate::shared::error_event::ErrorKind;
use crate::shared::frame::Frame;

/// Failure modes of a frame source, split by whether capture can continue.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open {uri}: {reason}")]
    Connection { uri: String, reason: String },
    #[error("stream ended")]
    EndOfStream,
    #[error("decoder setup failed: {0}")]
    DecoderSetup(String),
    #[error("failed to read frame: {0}")]
    Read(String),
    #[error("decoding error: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn connection(uri: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connection {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    /// Fatal errors end the ingestion loop; the rest are retried after a backoff.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::EndOfStream | Self::DecoderSetup(_)
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } | Self::EndOfStream => ErrorKind::SourceConnectionFailure,
            Self::DecoderSetup(_) | Self::Read(_) | Self::Decode(_) => ErrorKind::DecodeFailure,
        }
    }
}

/// Stream properties known once a source is open.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub description: String,
}

/// One decoded frame plus the source-clock timestamp, if the stream had one.
#[derive(Debug)]
pub struct SourceFrame {
    pub frame: Frame,
    pub native_time_ns: Option<u64>,
}

/// Produces decoded RGB frames from a live transport.
///
/// Driven from a single ingestion thread: `open` once, `next_frame` until a
/// fatal error or stop, then `close`. A source may be reopened after `close`.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<SourceInfo, SourceError>;

    /// Blocks until the next frame is decoded or the source fails.
    fn next_frame(&mut self) -> Result<SourceFrame, SourceError>;

    fn close(&mut self);
}
