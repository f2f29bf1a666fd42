use crate::capture::domain::frame_source::{FrameSource, SourceError};
use crate::shared::constants::SYNTHETIC_SCHEMES;

use super::synthetic_source::SyntheticFrameSource;

/// Creates the frame source that serves `uri`.
///
/// `stub://` and `synthetic://` URIs get the built-in synthetic source; any
/// other URI is handed to ffmpeg when the `ffmpeg` feature is enabled.
pub fn create_source(uri: &str) -> Result<Box<dyn FrameSource>, SourceError> {
    if is_synthetic(uri) {
        log::info!("Using synthetic frame source for {uri}");
        return Ok(Box::new(SyntheticFrameSource::from_uri(uri)?));
    }

    #[cfg(feature = "ffmpeg")]
    {
        log::info!("Using ffmpeg frame source for {uri}");
        Ok(Box::new(super::ffmpeg_rtsp_source::FfmpegRtspSource::new(uri)))
    }
    #[cfg(not(feature = "ffmpeg"))]
    {
        Err(SourceError::connection(
            uri,
            "live streams require the `ffmpeg` feature",
        ))
    }
}

pub fn is_synthetic(uri: &str) -> bool {
    uri.split_once("://")
        .map(|(scheme, _)| SYNTHETIC_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
