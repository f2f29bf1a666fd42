use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(u8),
    #[error("encoding failed: {0}")]
    Codec(String),
}

/// Compresses one raw frame into a storable byte stream.
///
/// Called concurrently from every writer thread, so implementations must not
/// rely on per-call mutable state.
pub trait ImageEncoder: Send + Sync {
    /// `quality` is 0-100; implementations clamp to what their codec accepts.
    fn encode(&self, frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError>;

    /// File extension for encoded output, without the leading dot.
    fn extension(&self) -> &str;
}
