//! Pack lifecycle events for client code.
//!
//! Loading screens and progress bars subscribe to an [`EventDispatcher`]
//! and receive [`PackEvent`]s synchronously on the thread that drives the
//! pack manager.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::index::PackState;

/// Something observable happened to a pack or request.
#[derive(Debug, Clone, PartialEq)]
pub enum PackEvent {
    /// A pack moved to a new lifecycle state.
    StateChanged { pack: String, state: PackState },

    /// Aggregate progress of the request for `pack` changed.
    Progress {
        pack: String,
        downloaded: u64,
        total: u64,
    },

    /// Every pack of the request for `pack` is mounted.
    RequestCompleted { pack: String },

    /// The request for `pack` failed while processing `error_pack`.
    RequestFailed {
        pack: String,
        error_pack: String,
        message: String,
    },
}

impl PackEvent {
    /// Name of the pack the event is about.
    pub fn pack(&self) -> &str {
        match self {
            Self::StateChanged { pack, .. }
            | Self::Progress { pack, .. }
            | Self::RequestCompleted { pack }
            | Self::RequestFailed { pack, .. } => pack,
        }
    }
}

/// Callback invoked for every event.
pub type EventListener = Arc<dyn Fn(&PackEvent) + Send + Sync>;

/// Fan-out of events to registered listeners.
///
/// Cloning yields a handle to the same listener list.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<RwLock<Vec<EventListener>>>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners stay registered for the dispatcher's lifetime.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&PackEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    pub fn emit(&self, event: PackEvent) {
        tracing::trace!(pack = event.pack(), ?event, "Pack event");
        // Snapshot so listeners may subscribe from inside a callback.
        let listeners: Vec<EventListener> = self.listeners.read().clone();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            dispatcher.subscribe(move |event| seen.lock().push(event.clone()));
        }
        dispatcher.emit(PackEvent::RequestCompleted {
            pack: "core".to_string(),
        });

        assert_eq!(dispatcher.listener_count(), 2);
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(seen.lock()[0].pack(), "core");
    }

    #[test]
    fn test_clones_share_listeners() {
        let dispatcher = EventDispatcher::new();
        let clone = dispatcher.clone();
        clone.subscribe(|_| {});

        assert_eq!(dispatcher.listener_count(), 1);
    }

    #[test]
    fn test_subscribe_from_listener() {
        let dispatcher = EventDispatcher::new();
        let inner = dispatcher.clone();
        dispatcher.subscribe(move |_| inner.subscribe(|_| {}));

        dispatcher.emit(PackEvent::StateChanged {
            pack: "a".to_string(),
            state: PackState::Mounted,
        });

        assert_eq!(dispatcher.listener_count(), 2);
    }
}
