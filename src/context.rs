//! Execution contexts and the composition root that builds them
//!
//! A [`SyncDomain`] owns what all contexts of a process share: the
//! inter-context channel hub, the shared store and the stamp clock. Each
//! [`SyncContext`] adds what is private to one context: its id and its
//! same-context event bus.
//!
//! ```ignore
//! let domain = SyncDomain::new(&config);
//! let tab_a = domain.context();
//! let tab_b = domain.context();
//!
//! let transport_a = SyncTransport::new(tab_a.clone(), config.clone());
//! ```

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::utils::time::SyncClock;
use crate::ChannelHub;
use crate::ContextStore;
use crate::InterContextChannel;
use crate::LocalEventBus;
use crate::SharedStore;
use crate::SyncConfig;

/// Unique id of an execution context.
pub type ContextId = u64;

/// Everything the contexts of one process share.
#[derive(Clone)]
pub struct SyncDomain {
    hub: ChannelHub,
    store: SharedStore,
    clock: Arc<SyncClock>,
    next_context_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for SyncDomain {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SyncDomain")
            .field("hub", &self.hub)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SyncDomain {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            hub: ChannelHub::new(config.channel_capacity),
            store: SharedStore::new(config.store_event_capacity),
            clock: Arc::new(SyncClock::new()),
            next_context_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// A new, isolated execution context.
    pub fn context(&self) -> SyncContext {
        let id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        SyncContext::with_parts(
            id,
            Arc::new(self.hub.clone()),
            self.store.clone(),
            self.clock.clone(),
        )
    }

    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn clock(&self) -> &Arc<SyncClock> {
        &self.clock
    }
}

/// One isolated execution context.
///
/// Cloning yields another handle to the same context (same id, same event
/// bus).
#[derive(Clone)]
pub struct SyncContext {
    id: ContextId,
    channel: Arc<dyn InterContextChannel>,
    store: SharedStore,
    events: LocalEventBus,
    clock: Arc<SyncClock>,
}

impl std::fmt::Debug for SyncContext {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("id", &self.id)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl SyncContext {
    /// Assemble a context from explicit parts; mostly useful to plug in a
    /// different inter-context channel.
    pub fn with_parts(
        id: ContextId,
        channel: Arc<dyn InterContextChannel>,
        store: SharedStore,
        clock: Arc<SyncClock>,
    ) -> Self {
        Self {
            id,
            channel,
            store,
            events: LocalEventBus::new(),
            clock,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn channel(&self) -> &Arc<dyn InterContextChannel> {
        &self.channel
    }

    pub fn shared_store(&self) -> &SharedStore {
        &self.store
    }

    /// The shared store, with writes attributed to this context
    pub fn store(&self) -> ContextStore {
        ContextStore::new(self.store.clone(), self.id)
    }

    pub fn events(&self) -> &LocalEventBus {
        &self.events
    }

    pub fn clock(&self) -> &Arc<SyncClock> {
        &self.clock
    }
}
