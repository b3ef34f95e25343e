//! Single-slot session gate.
//!
//! At most one attempt may be matching or settling at a time. A second stable
//! detection arriving while the slot is held is ignored, never queued.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

/// Guard that releases the slot when dropped
#[derive(Debug)]
pub struct SessionGuard {
    gate: SessionGate,
    attempt_id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.gate.release(self.attempt_id);
        debug!(attempt_id = %self.attempt_id, "session slot released");
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionGate {
    holder: Arc<Mutex<Option<Uuid>>>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the slot for `attempt_id`, or `None` if another attempt holds it
    pub fn try_acquire(&self, attempt_id: Uuid) -> Option<SessionGuard> {
        let mut holder = self.lock();
        match *holder {
            Some(current) => {
                debug!(%attempt_id, holder = %current, "session slot busy");
                None
            }
            None => {
                *holder = Some(attempt_id);
                Some(SessionGuard {
                    gate: self.clone(),
                    attempt_id,
                })
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_some()
    }

    /// Attempt currently holding the slot
    pub fn holder(&self) -> Option<Uuid> {
        *self.lock()
    }

    fn release(&self, attempt_id: Uuid) {
        let mut holder = self.lock();
        if *holder == Some(attempt_id) {
            *holder = None;
        }
    }

    // A poisoned lock still holds a valid slot
    fn lock(&self) -> MutexGuard<'_, Option<Uuid>> {
        self.holder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
