use super::frame::Frame;
use super::hardware_time::HardwareTime;

/// A captured frame in flight between ingestion and a writer.
#[derive(Debug)]
pub struct FrameRecord {
    pub frame: Frame,
    /// Per-session capture index; drops consume a value, so gaps mark losses.
    pub sequence: u64,
    /// Wall-clock milliseconds since the Unix epoch when decoding finished.
    pub receive_time_ms: u64,
    pub hardware_time: HardwareTime,
}

impl FrameRecord {
    pub fn new(
        frame: Frame,
        sequence: u64,
        receive_time_ms: u64,
        hardware_time: HardwareTime,
    ) -> Self {
        Self {
            frame,
            sequence,
            receive_time_ms,
            hardware_time,
        }
    }
}
