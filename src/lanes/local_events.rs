use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::SyncMessage;

/// Handler installed on a [`LocalEventBus`].
pub type EventHandler = Arc<dyn Fn(&SyncMessage) + Send + Sync>;

/// Same-context event lane (lane c).
///
/// Dispatch is synchronous: every handler has run by the time
/// [`LocalEventBus::dispatch`] returns. Handlers are snapshotted first, so a
/// handler may add or remove handlers while being called.
#[derive(Clone, Default)]
pub struct LocalEventBus {
    handlers: Arc<Mutex<Vec<(u64, EventHandler)>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for LocalEventBus {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LocalEventBus")
            .field("handlers", &self.handlers.lock().len())
            .finish()
    }
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(
        &self,
        handler: EventHandler,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().push((id, handler));
        id
    }

    /// Returns whether a handler with `id` was installed.
    pub fn remove_listener(
        &self,
        id: u64,
    ) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        handlers.len() != before
    }

    pub fn dispatch(
        &self,
        message: &SyncMessage,
    ) {
        let handlers: Vec<EventHandler> = self.handlers.lock().iter().map(|(_, h)| h.clone()).collect();
        trace!(kind = ?message.kind, key = ?message.key, handlers = handlers.len(), "Local event");
        for handler in handlers {
            handler(message);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.handlers.lock().len()
    }
}
