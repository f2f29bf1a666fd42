use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Classification of a reported pipeline fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceConnectionFailure,
    DecodeFailure,
    PersistenceFailure,
    ConcurrencyFailure,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceConnectionFailure => "CONNECTION_FAILED",
            Self::DecodeFailure => "FRAME_DECODE_ERROR",
            Self::PersistenceFailure => "WRITE_ERROR",
            Self::ConcurrencyFailure => "THREAD_ERROR",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fault notification delivered to the error callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    /// Nanoseconds since the Unix epoch at the moment of reporting.
    pub timestamp_ns: u64,
    pub fatal: bool,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, message: impl Into<String>, fatal: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp_ns: now_nanos(),
            fatal,
        }
    }

    pub fn severity(&self) -> &'static str {
        if self.fatal {
            "FATAL"
        } else {
            "WARNING"
        }
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.kind, self.message)
    }
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
