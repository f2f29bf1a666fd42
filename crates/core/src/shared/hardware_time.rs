/// Nanosecond timestamp attached to a captured frame.
///
/// `Native` values come from the source's own clock (stream PTS scaled by the
/// stream time base). `Synthesized` values are derived from the receive wall
/// clock when the decoded frame carried no usable timestamp. The on-disk tag
/// for a synthesized value is `ERR`, kept for compatibility with existing
/// tooling even though nothing went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HardwareTime {
    Native(u64),
    Synthesized(u64),
}

pub const NATIVE_TAG: &str = "HW";
pub const SYNTHESIZED_TAG: &str = "ERR";

impl HardwareTime {
    /// Uses the native timestamp when present, else `receive_time_ms` scaled to ns.
    pub fn resolve(native_ns: Option<u64>, receive_time_ms: u64) -> Self {
        match native_ns {
            Some(ns) => Self::Native(ns),
            None => Self::Synthesized(receive_time_ms.saturating_mul(1_000_000)),
        }
    }

    pub fn nanos(&self) -> u64 {
        match *self {
            Self::Native(ns) | Self::Synthesized(ns) => ns,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }

    pub fn tag(&self) -> &'static str {
        if self.is_native() {
            NATIVE_TAG
        } else {
            SYNTHESIZED_TAG
        }
    }

    pub fn from_tag(tag: &str, nanos: u64) -> Option<Self> {
        match tag {
            NATIVE_TAG => Some(Self::Native(nanos)),
            SYNTHESIZED_TAG => Some(Self::Synthesized(nanos)),
            _ => None,
        }
    }
}
