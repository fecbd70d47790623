//! Shared key-value store and its mutation feed (lane b)
//!
//! The store stands in for the persistence layer that every context shares.
//! It keeps values in memory only; what matters here is the feed: each
//! successful mutation emits a [`StoreMutation`] naming the key and the
//! context that wrote it. Contexts ignore their own mutations, mirroring how
//! a storage-change event only fires in the other contexts.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::ContextId;

/// One mutation observed on the shared store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMutation {
    /// Mutated key; `None` when the whole store was cleared
    pub key: Option<String>,
    /// Context that performed the write
    pub origin: ContextId,
}

struct StoreInner {
    entries: DashMap<String, String>,
    mutations: broadcast::Sender<StoreMutation>,
}

/// Key-value store shared by every context in the process.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for SharedStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SharedStore").field("entries", &self.inner.entries.len()).finish()
    }
}

impl SharedStore {
    /// `event_capacity` bounds how far a slow mutation listener may fall
    /// behind before it starts losing events.
    pub fn new(event_capacity: usize) -> Self {
        let (mutations, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                mutations,
            }),
        }
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<String> {
        self.inner.entries.get(key).map(|v| v.clone())
    }

    pub fn set(
        &self,
        origin: ContextId,
        key: &str,
        value: impl Into<String>,
    ) {
        self.inner.entries.insert(key.to_string(), value.into());
        self.emit(origin, Some(key));
    }

    /// Returns the removed value. Removing a missing key emits nothing.
    pub fn remove(
        &self,
        origin: ContextId,
        key: &str,
    ) -> Option<String> {
        let removed = self.inner.entries.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.emit(origin, Some(key));
        }
        removed
    }

    pub fn clear(
        &self,
        origin: ContextId,
    ) {
        self.inner.entries.clear();
        self.emit(origin, None);
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Receive every mutation made from now on, by any context.
    pub fn subscribe_mutations(&self) -> broadcast::Receiver<StoreMutation> {
        self.inner.mutations.subscribe()
    }

    fn emit(
        &self,
        origin: ContextId,
        key: Option<&str>,
    ) {
        let mutation = StoreMutation {
            key: key.map(str::to_string),
            origin,
        };
        // No receivers simply means no context is listening yet
        let receivers = self.inner.mutations.send(mutation).unwrap_or(0);
        trace!(origin = origin, key = ?key, receivers = receivers, "Store mutated");
    }
}

/// A [`SharedStore`] seen from one context: writes are stamped with that
/// context's id.
#[derive(Debug, Clone)]
pub struct ContextStore {
    store: SharedStore,
    context_id: ContextId,
}

impl ContextStore {
    pub fn new(
        store: SharedStore,
        context_id: ContextId,
    ) -> Self {
        Self { store, context_id }
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<String> {
        self.store.get(key)
    }

    pub fn set(
        &self,
        key: &str,
        value: impl Into<String>,
    ) {
        self.store.set(self.context_id, key, value);
    }

    pub fn remove(
        &self,
        key: &str,
    ) -> Option<String> {
        self.store.remove(self.context_id, key)
    }

    pub fn clear(&self) {
        self.store.clear(self.context_id);
    }

    pub fn shared(&self) -> &SharedStore {
        &self.store
    }
}
