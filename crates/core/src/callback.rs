// Session event fan-out for observers (diagnostics, host notifications)

use crate::state::SessionState;
use std::path::PathBuf;
use std::sync::Arc;

/// Session event types
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Lifecycle state changed
    StateChanged {
        old_state: SessionState,
        new_state: SessionState,
    },

    /// Effective (clamped) volume applied to the engine
    VolumeChanged { volume: f32 },

    /// Media finished loading and is prepared
    MediaLoaded {
        path: PathBuf,
        duration_ms: Option<u64>,
    },

    /// Loaded media was stopped and cleared ahead of a switch
    MediaCleared,

    /// A teardown step failed; teardown continued
    ReleaseFailed { step: &'static str, message: String },
}

/// Session observer trait
///
/// Called on the confined context. Implementations must return quickly and
/// must not call back into the dispatcher synchronously.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

/// Observer list owned by the session
#[derive(Default, Clone)]
pub struct EventHub {
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn dispatch(&self, event: SessionEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}
