//! Output file naming.
//!
//! Final names have the form
//! `YYYY.MM.DD_HH.MM.SS.mmm_<HW|ERR>_<hardwareTimeNs>_<latencyMs>ms.<ext>`.
//! Downstream tooling parses these names, so the layout is fixed.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

use crate::shared::constants::{RECEIVE_TIME_FORMAT, TEMP_FILE_SUFFIX};
use crate::shared::hardware_time::HardwareTime;

/// Clock zone used to render the receive time in file names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimestampZone {
    #[default]
    Local,
    Utc,
}

/// Renders epoch milliseconds as `YYYY.MM.DD_HH.MM.SS.mmm`.
pub fn format_receive_time(receive_time_ms: u64, zone: TimestampZone) -> String {
    let secs = (receive_time_ms / 1000) as i64;
    let nanos = ((receive_time_ms % 1000) * 1_000_000) as u32;
    let utc = DateTime::<Utc>::from_timestamp(secs, nanos).unwrap_or_default();
    match zone {
        TimestampZone::Utc => utc.format(RECEIVE_TIME_FORMAT).to_string(),
        TimestampZone::Local => utc
            .with_timezone(&Local)
            .format(RECEIVE_TIME_FORMAT)
            .to_string(),
    }
}

/// Name of one frame's output file, before the encode latency is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameFileName {
    stamp: String,
    hardware_time: HardwareTime,
    extension: String,
}

impl FrameFileName {
    pub fn new(
        receive_time_ms: u64,
        hardware_time: HardwareTime,
        zone: TimestampZone,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            stamp: format_receive_time(receive_time_ms, zone),
            hardware_time,
            extension: extension.into(),
        }
    }

    pub fn stem(&self) -> String {
        format!(
            "{}_{}_{}",
            self.stamp,
            self.hardware_time.tag(),
            self.hardware_time.nanos()
        )
    }

    /// Scratch name used while encoding. The sequence keeps concurrent
    /// writers apart when two frames share a receive millisecond.
    pub fn temp_name(&self, sequence: u64) -> String {
        format!("{}.{sequence}.{TEMP_FILE_SUFFIX}", self.stem())
    }

    pub fn final_name(&self, latency_ms: u64) -> String {
        format!("{}_{latency_ms}ms.{}", self.stem(), self.extension)
    }
}

/// Fields recovered from a final output file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedFrameFileName {
    pub stamp: String,
    pub receive_time: NaiveDateTime,
    pub hardware_time: HardwareTime,
    pub latency_ms: u64,
    pub extension: String,
}

/// Parses a final output name; temporary and foreign files yield `None`.
pub fn parse(name: &str) -> Option<ParsedFrameFileName> {
    let (body, extension) = name.rsplit_once('.')?;
    if extension.is_empty() || extension == TEMP_FILE_SUFFIX {
        return None;
    }

    let mut parts = body.rsplitn(4, '_');
    let latency_ms = parts.next()?.strip_suffix("ms")?.parse().ok()?;
    let nanos = parts.next()?.parse().ok()?;
    let hardware_time = HardwareTime::from_tag(parts.next()?, nanos)?;
    let stamp = parts.next()?;
    let receive_time = NaiveDateTime::parse_from_str(stamp, RECEIVE_TIME_FORMAT).ok()?;

    Some(ParsedFrameFileName {
        stamp: stamp.to_string(),
        receive_time,
        hardware_time,
        latency_ms,
        extension: extension.to_string(),
    })
}
