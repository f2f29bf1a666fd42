//! Bounded-memory frame capture.
//!
//! A [`CaptureSession`](pipeline::capture_session::CaptureSession) pulls
//! decoded frames from a [`FrameSource`](capture::domain::frame_source::FrameSource),
//! parks them in a fixed-capacity queue that drops on overflow, and lets a
//! pool of writer threads encode each frame and store it under a name that
//! carries its receive time, hardware timestamp and encode latency.

pub mod capture;
pub mod encoding;
pub mod pipeline;
pub mod shared;
pub mod storage;
