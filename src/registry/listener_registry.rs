use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::WatchKey;
use crate::WILDCARD;

/// Zero-argument change callback.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Unique id of one registration.
pub type ListenerId = u64;

struct Listener {
    id: ListenerId,
    callback: Callback,
}

/// Mapping from watch key to the callbacks registered under it.
pub struct ListenerRegistry {
    listeners: DashMap<WatchKey, Vec<Listener>>,

    /// Next listener id (monotonically increasing, never reused)
    next_id: AtomicU64,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("watched_keys", &self.listeners.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` under `key`, after every callback already there.
    pub fn add(
        &self,
        key: &str,
        callback: Callback,
    ) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.entry(key.to_string()).or_default().push(Listener { id, callback });

        trace!(listener_id = id, key = %key, "Listener registered");
        id
    }

    /// Remove one registration. Returns whether it was present.
    ///
    /// The bucket is dropped in the same atomic step when it becomes empty.
    pub fn remove(
        &self,
        key: &str,
        id: ListenerId,
    ) -> bool {
        let mut removed = false;
        self.listeners.remove_if_mut(key, |_key, listeners| {
            let before = listeners.len();
            listeners.retain(|l| l.id != id);
            removed = listeners.len() != before;
            listeners.is_empty()
        });

        if removed {
            trace!(listener_id = id, key = %key, "Listener removed");
        }
        removed
    }

    /// Callbacks under `key` in registration order.
    ///
    /// The returned vector is detached from the registry; later changes are
    /// not reflected in it.
    pub fn snapshot(
        &self,
        key: &str,
    ) -> Vec<Callback> {
        self.listeners
            .get(key)
            .map(|listeners| listeners.iter().map(|l| l.callback.clone()).collect())
            .unwrap_or_default()
    }

    /// Notify the listeners of `target` and of the wildcard.
    ///
    /// `None` or the wildcard itself notifies wildcard listeners only, so a
    /// wildcard listener runs exactly once per call. Returns how many
    /// callbacks were invoked.
    pub fn dispatch(
        &self,
        target: Option<&str>,
    ) -> usize {
        let mut callbacks = match target {
            Some(key) if key != WILDCARD => self.snapshot(key),
            _ => Vec::new(),
        };
        callbacks.extend(self.snapshot(WILDCARD));

        for callback in &callbacks {
            callback();
        }

        trace!(target = ?target, invoked = callbacks.len(), "Dispatched");
        callbacks.len()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.listeners.clear();
    }

    /// Number of registrations under `key`
    pub fn listener_count(
        &self,
        key: &str,
    ) -> usize {
        self.listeners.get(key).map(|l| l.len()).unwrap_or(0)
    }

    /// Number of keys with at least one registration
    pub fn watched_key_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// State needed to undo one registration.
struct SubscriptionCleanup {
    id: ListenerId,
    key: WatchKey,
    registry: Weak<ListenerRegistry>,
}

/// Revocation handle returned by `subscribe`.
///
/// The registration is removed when [`Subscription::unsubscribe`] is called
/// or when the handle is dropped, whichever comes first. Revoking more than
/// once is a no-op.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cleanup: Mutex<Option<SubscriptionCleanup>>,
}

impl Subscription {
    pub(crate) fn new(
        registry: &Arc<ListenerRegistry>,
        key: &str,
        callback: Callback,
    ) -> Self {
        let id = registry.add(key, callback);
        Self {
            cleanup: Mutex::new(Some(SubscriptionCleanup {
                id,
                key: key.to_string(),
                registry: Arc::downgrade(registry),
            })),
        }
    }

    /// Id of the registration, `None` once revoked or detached
    pub fn id(&self) -> Option<ListenerId> {
        self.cleanup.lock().as_ref().map(|c| c.id)
    }

    /// Watched key, `None` once revoked or detached
    pub fn key(&self) -> Option<WatchKey> {
        self.cleanup.lock().as_ref().map(|c| c.key.clone())
    }

    pub fn is_active(&self) -> bool {
        self.cleanup.lock().is_some()
    }

    /// Remove the registration. Safe to call repeatedly and from inside a
    /// callback.
    pub fn unsubscribe(&self) {
        // Take first so the registry is never touched while our lock is held
        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            if let Some(registry) = cleanup.registry.upgrade() {
                registry.remove(&cleanup.key, cleanup.id);
            }
        }
    }

    /// Keep the registration for as long as the registry lives.
    pub fn detach(self) {
        self.cleanup.lock().take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let cleanup = self.cleanup.lock();
        f.debug_struct("Subscription")
            .field("id", &cleanup.as_ref().map(|c| c.id))
            .field("key", &cleanup.as_ref().map(|c| c.key.as_str()))
            .finish()
    }
}
