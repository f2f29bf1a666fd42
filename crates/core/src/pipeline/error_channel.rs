use std::sync::{Arc, PoisonError, RwLock};

use crate::shared::error_event::{ErrorEvent, ErrorKind};

use super::run_state::RunState;

/// Observer invoked for every reported fault. May run on any pipeline
/// thread, possibly several at once.
pub type ErrorCallback = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

/// Synchronous fault reporting shared by all pipeline threads.
///
/// Every `report` produces exactly one callback invocation (none when no
/// callback is registered). Fatal reports also take the session out of the
/// running state, which is how an internal failure shuts the pipeline down.
pub struct ErrorChannel {
    callback: RwLock<Option<ErrorCallback>>,
    run_state: Arc<RunState>,
}

impl ErrorChannel {
    pub fn new(run_state: Arc<RunState>) -> Self {
        Self {
            callback: RwLock::new(None),
            run_state,
        }
    }

    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    pub fn report(&self, kind: ErrorKind, message: impl Into<String>, fatal: bool) {
        let event = ErrorEvent::new(kind, message, fatal);
        log::debug!("Reporting {event}");

        // Clone out of the lock so a slow callback never blocks registration.
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(&event);
        }

        if fatal {
            self.run_state.request_stop();
        }
    }
}
