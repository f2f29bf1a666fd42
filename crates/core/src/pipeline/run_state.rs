use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Lifecycle phase of a capture session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Flags shared between the session owner and its pipeline threads.
///
/// `running` answers `is_running()`; `stop_requested` is the cooperative
/// cancellation signal the loops poll. A fatal error clears the former and
/// raises the latter.
pub struct RunState {
    running: AtomicBool,
    stop_requested: AtomicBool,
    phase: AtomicU8,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            phase: AtomicU8::new(LifecycleState::Stopped as u8),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Loop-head check for pipeline threads.
    pub fn should_continue(&self) -> bool {
        self.is_running() && !self.is_stop_requested()
    }

    pub fn phase(&self) -> LifecycleState {
        LifecycleState::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Claims the running flag. Returns false if it was already held.
    pub(crate) fn try_begin_start(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.stop_requested.store(false, Ordering::Release);
        self.set_phase(LifecycleState::Starting);
        true
    }

    /// Moves `Starting` to `Running` unless a fatal error got there first.
    pub(crate) fn finish_start(&self) {
        let _ = self.phase.compare_exchange(
            LifecycleState::Starting as u8,
            LifecycleState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Requests cooperative shutdown and leaves the running state.
    pub(crate) fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.running.store(false, Ordering::Release);
        if self.phase() != LifecycleState::Stopped {
            self.set_phase(LifecycleState::Stopping);
        }
    }

    pub(crate) fn set_phase(&self, phase: LifecycleState) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}
