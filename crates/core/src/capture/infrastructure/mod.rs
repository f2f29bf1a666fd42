#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_rtsp_source;
pub mod source_factory;
pub mod synthetic_source;
