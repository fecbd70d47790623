use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::utils::time::SyncClock;
use crate::ChannelPort;
use crate::ContextId;
use crate::Inbound;
use crate::ListenerRegistry;
use crate::LocalEventBus;
use crate::PortReceiver;
use crate::StoreMutation;
use crate::Subscription;
use crate::SyncConfig;
use crate::SyncContext;
use crate::SyncKind;
use crate::SyncMessage;
use crate::WatchKey;

/// Which lane a message arrived on; only used for logging.
#[derive(Debug, Clone, Copy)]
enum Lane {
    Channel,
    Store,
    Local,
}

/// Last-sync timestamp plus the presentation signal that follows it.
///
/// Every processed message signals, even when two messages share a
/// millisecond stamp; the value itself never decreases.
struct LastSync {
    tx: watch::Sender<u64>,
}

impl LastSync {
    fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    fn record(
        &self,
        stamp: u64,
    ) {
        self.tx.send_modify(|current| *current = (*current).max(stamp));
    }

    fn get(&self) -> u64 {
        *self.tx.borrow()
    }
}

/// Receiving side shared by the three lanes.
#[derive(Clone)]
struct Inbox {
    context_id: ContextId,
    registry: Arc<ListenerRegistry>,
    last_sync: Arc<LastSync>,
    clock: Arc<SyncClock>,
}

impl Inbox {
    fn deliver(
        &self,
        target: Option<&str>,
        stamp: u64,
        lane: Lane,
    ) {
        let invoked = self.registry.dispatch(target);
        self.last_sync.record(stamp);
        trace!(
            context_id = self.context_id,
            lane = ?lane,
            target = ?target,
            invoked = invoked,
            "Delivered"
        );
    }
}

/// Sending side: everything `broadcast()` touches.
#[derive(Clone)]
struct Outbound {
    context_id: ContextId,
    port: Option<Arc<dyn ChannelPort>>,
    events: LocalEventBus,
    clock: Arc<SyncClock>,
    last_sync: Arc<LastSync>,
}

impl Outbound {
    fn broadcast(
        &self,
        kind: SyncKind,
        key: Option<WatchKey>,
    ) -> SyncMessage {
        let message = SyncMessage::new(kind, key, self.clock.stamp());

        if let Some(port) = &self.port {
            if let Err(e) = port.post(&message) {
                warn!(
                    context_id = self.context_id,
                    kind = ?message.kind,
                    error = %e,
                    "Failed to post on inter-context channel"
                );
            }
        }

        self.events.dispatch(&message);
        self.last_sync.record(message.timestamp);

        debug!(
            context_id = self.context_id,
            kind = ?message.kind,
            key = ?message.key,
            timestamp = message.timestamp,
            "Broadcast"
        );
        message
    }
}

/// Resources acquired by `start()` and released by `stop()`.
struct Session {
    port: Option<Arc<dyn ChannelPort>>,
    local_listener: u64,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    fn teardown(
        self,
        events: &LocalEventBus,
    ) {
        self.shutdown.cancel();
        for task in &self.tasks {
            task.abort();
        }
        if let Some(port) = &self.port {
            port.close();
        }
        events.remove_listener(self.local_listener);
    }
}

struct TransportInner {
    context: SyncContext,
    config: SyncConfig,
    registry: Arc<ListenerRegistry>,
    last_sync: Arc<LastSync>,
    /// `Some` while started
    session: Mutex<Option<Session>>,
}

impl TransportInner {
    fn inbox(&self) -> Inbox {
        Inbox {
            context_id: self.context.id(),
            registry: self.registry.clone(),
            last_sync: self.last_sync.clone(),
            clock: self.context.clock().clone(),
        }
    }

    fn outbound(&self) -> Outbound {
        let port = self.session.lock().as_ref().and_then(|s| s.port.clone());
        self.outbound_with(port)
    }

    fn outbound_with(
        &self,
        port: Option<Arc<dyn ChannelPort>>,
    ) -> Outbound {
        Outbound {
            context_id: self.context.id(),
            port,
            events: self.context.events().clone(),
            clock: self.context.clock().clone(),
            last_sync: self.last_sync.clone(),
        }
    }
}

impl Drop for TransportInner {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.teardown(self.context.events());
            debug!(context_id = self.context.id(), "Sync transport dropped while started");
        }
    }
}

/// Cross-context change notification transport.
///
/// Cloning is cheap; every clone drives the same transport. The transport is
/// stopped when the last clone is dropped.
///
/// # Example
///
/// ```ignore
/// let config = SyncConfig::default();
/// let domain = SyncDomain::new(&config);
/// let transport = SyncTransport::new(domain.context(), config);
/// transport.start();
///
/// let _sub = transport.subscribe("teamA", || println!("teamA changed"));
/// transport.notify_update("teamA");
///
/// transport.stop();
/// ```
#[derive(Clone)]
pub struct SyncTransport {
    inner: Arc<TransportInner>,
}

impl std::fmt::Debug for SyncTransport {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SyncTransport")
            .field("context_id", &self.inner.context.id())
            .field("started", &self.is_started())
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl SyncTransport {
    pub fn new(
        context: SyncContext,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                context,
                config,
                registry: Arc::new(ListenerRegistry::new()),
                last_sync: Arc::new(LastSync::new()),
                session: Mutex::new(None),
            }),
        }
    }

    /// Acquire every lane and start the refresh ticker.
    ///
    /// Calling `start()` on a started transport logs a warning and does
    /// nothing else. The inter-context channel is best effort: if it cannot
    /// be opened the transport runs on the remaining lanes for the whole
    /// session. Without a tokio runtime only the same-context lane works.
    pub fn start(&self) {
        let inner = &self.inner;
        let context_id = inner.context.id();
        let mut session = inner.session.lock();

        if session.is_some() {
            warn!(context_id = context_id, "Sync transport already started");
            return;
        }

        let inbox = inner.inbox();

        // Lane (a)
        let port: Option<Arc<dyn ChannelPort>> =
            match inner.context.channel().open(&inner.config.channel_name) {
                Ok(port) => Some(Arc::from(port)),
                Err(e) => {
                    warn!(
                        context_id = context_id,
                        channel = %inner.config.channel_name,
                        error = %e,
                        "Inter-context channel unavailable, continuing without it"
                    );
                    None
                }
            };

        // Lane (c)
        let local_listener = {
            let inbox = inbox.clone();
            inner.context.events().add_listener(Arc::new(move |message: &SyncMessage| {
                inbox.deliver(message.target(), message.timestamp, Lane::Local);
            }))
        };

        let shutdown = CancellationToken::new();
        let mut tasks = Vec::new();

        match Handle::try_current() {
            Ok(handle) => {
                if let Some(rx) = port.as_ref().and_then(|p| p.receiver()) {
                    tasks.push(handle.spawn(run_channel_lane(rx, inbox.clone(), shutdown.clone())));
                }

                // Lane (b)
                let mutations = inner.context.shared_store().subscribe_mutations();
                tasks.push(handle.spawn(run_store_lane(mutations, inbox, shutdown.clone())));

                let period = inner.config.refresh_interval();
                if period.is_zero() {
                    error!(
                        context_id = context_id,
                        "refresh_interval_ms is 0; periodic refresh is disabled"
                    );
                } else {
                    tasks.push(handle.spawn(run_ticker(
                        inner.outbound_with(port.clone()),
                        period,
                        shutdown.clone(),
                    )));
                }
            }
            Err(e) => {
                error!(
                    context_id = context_id,
                    error = %e,
                    "No async runtime; channel, store and ticker lanes are disabled"
                );
            }
        }

        info!(
            context_id = context_id,
            channel = port.is_some(),
            tasks = tasks.len(),
            refresh_interval_ms = inner.config.refresh_interval_ms,
            "Sync transport started"
        );

        *session = Some(Session {
            port,
            local_listener,
            shutdown,
            tasks,
        });
    }

    /// Release everything `start()` acquired and drop all subscriptions.
    ///
    /// No-op when already stopped.
    pub fn stop(&self) {
        let session = self.inner.session.lock().take();
        let Some(session) = session else {
            return;
        };

        session.teardown(self.inner.context.events());
        self.inner.registry.clear();

        info!(context_id = self.inner.context.id(), "Sync transport stopped");
    }

    pub fn is_started(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// Lane and ticker tasks owned by the current session
    #[cfg(test)]
    pub(crate) fn session_task_count(&self) -> usize {
        self.inner.session.lock().as_ref().map(|s| s.tasks.len()).unwrap_or(0)
    }

    /// Announce that `key` changed.
    ///
    /// The persistence layer calls this after every successful mutation.
    pub fn notify_update(
        &self,
        key: &str,
    ) {
        self.inner.outbound().broadcast(SyncKind::StorageUpdate, Some(key.to_string()));
    }

    /// Ask every subscriber of `key` (or, with `None`, every wildcard
    /// subscriber) to refresh.
    pub fn force_sync(
        &self,
        key: Option<&str>,
    ) {
        self.inner.outbound().broadcast(SyncKind::ForceSync, key.map(str::to_string));
    }

    /// Run `callback` whenever `key` (or anything, for the wildcard) changes.
    ///
    /// The callback may run on any lane's task and may be invoked more than
    /// once for the same logical change.
    pub fn subscribe<F>(
        &self,
        key: &str,
        callback: F,
    ) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        Subscription::new(&self.inner.registry, key, Arc::new(callback))
    }

    /// Millisecond timestamp of the last processed message, 0 if none.
    pub fn last_sync_time(&self) -> u64 {
        self.inner.last_sync.get()
    }

    /// Presentation signal: changes whenever the last-sync timestamp moves.
    pub fn subscribe_sync_time(&self) -> watch::Receiver<u64> {
        self.inner.last_sync.tx.subscribe()
    }

    /// Whether `self` and `other` drive the same transport
    pub fn same_instance(
        &self,
        other: &SyncTransport,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn context(&self) -> &SyncContext {
        &self.inner.context
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Number of subscriptions under `key`
    pub fn listener_count(
        &self,
        key: &str,
    ) -> usize {
        self.inner.registry.listener_count(key)
    }

    /// Number of keys with at least one subscription
    pub fn watched_key_count(&self) -> usize {
        self.inner.registry.watched_key_count()
    }
}

async fn run_channel_lane(
    mut rx: PortReceiver,
    inbox: Inbox,
    shutdown: CancellationToken,
) {
    debug!(context_id = inbox.context_id, "Channel lane started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            inbound = rx.recv() => match inbound {
                Some(Inbound::Message(message)) => {
                    inbox.deliver(message.target(), inbox.clock.stamp(), Lane::Channel);
                }
                // Frames were lost; refresh everything instead
                Some(Inbound::Lagged(_)) => inbox.deliver(None, inbox.clock.stamp(), Lane::Channel),
                None => {
                    warn!(context_id = inbox.context_id, "Inter-context channel closed");
                    break;
                }
            }
        }
    }

    debug!(context_id = inbox.context_id, "Channel lane stopped");
}

async fn run_store_lane(
    mut mutations: broadcast::Receiver<StoreMutation>,
    inbox: Inbox,
    shutdown: CancellationToken,
) {
    debug!(context_id = inbox.context_id, "Store lane started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            mutation = mutations.recv() => match mutation {
                // Our own writes are announced through notify_update
                Ok(mutation) if mutation.origin == inbox.context_id => continue,
                Ok(mutation) => {
                    inbox.deliver(mutation.key.as_deref(), inbox.clock.stamp(), Lane::Store);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(context_id = inbox.context_id, skipped = skipped, "Store lane lagged");
                    inbox.deliver(None, inbox.clock.stamp(), Lane::Store);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    debug!(context_id = inbox.context_id, "Store lane stopped");
}

async fn run_ticker(
    outbound: Outbound,
    period: Duration,
    shutdown: CancellationToken,
) {
    // First refresh one full period after start
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                outbound.broadcast(SyncKind::DataRefresh, None);
            }
        }
    }

    debug!(context_id = outbound.context_id, "Refresh ticker stopped");
}
