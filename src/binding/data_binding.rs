use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use futures::TryFutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::Subscription;
use crate::SyncTransport;
use crate::WatchKey;

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, String>> + Send + Sync>;

/// Observable state of a [`DataBinding`].
#[derive(Debug, Clone, PartialEq)]
pub struct BindingState<T> {
    /// Result of the most recent successful fetch
    pub data: Option<T>,
    pub loading: bool,
    /// Message of the most recent failed fetch, cleared by the next success
    pub last_error: Option<String>,
}

impl<T> Default for BindingState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            last_error: None,
        }
    }
}

/// Part of the binding that fetch tasks and subscription callbacks reach
/// through a `Weak`.
struct BindingShared<T> {
    fetcher: Fetcher<T>,
    state: watch::Sender<BindingState<T>>,
    /// Checked under the lock before any result is applied
    active: Mutex<bool>,
    runtime: Option<Handle>,
}

impl<T> BindingShared<T>
where
    T: Send + Sync + 'static,
{
    fn refetch(self: &Arc<Self>) {
        if !*self.active.lock() {
            return;
        }

        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            warn!("No async runtime; skipping fetch");
            return;
        };

        self.state.send_modify(|s| s.loading = true);

        let fetch = (self.fetcher)();
        let shared = Arc::downgrade(self);
        runtime.spawn(async move {
            let result = fetch.await;
            if let Some(shared) = shared.upgrade() {
                shared.complete(result);
            }
        });
    }

    fn complete(
        &self,
        result: Result<T, String>,
    ) {
        let active = self.active.lock();
        if !*active {
            trace!("Binding deactivated, discarding fetch result");
            return;
        }

        match result {
            Ok(data) => self.state.send_modify(|s| {
                s.data = Some(data);
                s.loading = false;
                s.last_error = None;
            }),
            Err(e) => {
                warn!(error = %e, "Fetch failed, keeping previous data");
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.last_error = Some(e);
                });
            }
        }
    }
}

/// What the binding is currently subscribed to.
struct Binding {
    transport: SyncTransport,
    keys: Vec<WatchKey>,
    subscriptions: Vec<Subscription>,
}

/// A value kept fresh by re-running `fetch` whenever one of its watch keys
/// changes in any context.
///
/// Fetches are not serialized: when several are in flight, the one that
/// resolves last wins. Errors never propagate; they are logged and recorded
/// in [`BindingState::last_error`] while the previous data stays in place.
///
/// Deactivation (explicit or on drop) is final. Results that resolve after it
/// are discarded.
pub struct DataBinding<T> {
    shared: Arc<BindingShared<T>>,
    binding: Mutex<Binding>,
}

impl<T> std::fmt::Debug for DataBinding<T>
where
    T: std::fmt::Debug,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DataBinding")
            .field("keys", &self.binding.lock().keys)
            .field("active", &*self.shared.active.lock())
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl<T> DataBinding<T>
where
    T: Send + Sync + 'static,
{
    /// Subscribe to `keys` on `transport` and run the first fetch.
    ///
    /// Duplicate keys are subscribed once. The wildcard key `*` makes the
    /// binding refresh on every change.
    pub fn activate<I, K, F, Fut, E>(
        transport: SyncTransport,
        keys: I,
        fetch: F,
    ) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<WatchKey>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move || fetch().map_err(|e| e.to_string()).boxed());
        let (state, _) = watch::channel(BindingState::default());

        let shared = Arc::new(BindingShared {
            fetcher,
            state,
            active: Mutex::new(true),
            runtime: Handle::try_current().ok(),
        });

        let keys = dedup(keys);
        let subscriptions = subscribe_all(&shared, &transport, &keys);
        debug!(context_id = transport.context().id(), keys = ?keys, "Data binding activated");

        let this = Self {
            shared,
            binding: Mutex::new(Binding {
                transport,
                keys,
                subscriptions,
            }),
        };
        this.shared.refetch();
        this
    }

    /// Fetch again now, regardless of notifications.
    pub fn refetch(&self) {
        self.shared.refetch();
    }

    /// Replace the watched keys, then fetch again.
    ///
    /// Every call re-subscribes, even when the keys are unchanged.
    pub fn set_watch_keys<I, K>(
        &self,
        keys: I,
    ) where
        I: IntoIterator<Item = K>,
        K: Into<WatchKey>,
    {
        let keys = dedup(keys);
        {
            let mut binding = self.binding.lock();
            binding.keys = keys;
            self.rebind(&mut binding);
        }
        self.shared.refetch();
    }

    /// Move the subscriptions to another transport, then fetch again.
    pub fn set_transport(
        &self,
        transport: SyncTransport,
    ) {
        {
            let mut binding = self.binding.lock();
            binding.transport = transport;
            self.rebind(&mut binding);
        }
        self.shared.refetch();
    }

    fn rebind(
        &self,
        binding: &mut Binding,
    ) {
        binding.subscriptions.clear();
        if !self.is_active() {
            return;
        }
        binding.subscriptions = subscribe_all(&self.shared, &binding.transport, &binding.keys);
        debug!(
            context_id = binding.transport.context().id(),
            keys = ?binding.keys,
            "Data binding re-subscribed"
        );
    }

    /// Stop reacting to changes and discard in-flight results.
    pub fn deactivate(&self) {
        let was_active = std::mem::replace(&mut *self.shared.active.lock(), false);
        self.binding.lock().subscriptions.clear();
        if was_active {
            debug!("Data binding deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        *self.shared.active.lock()
    }

    /// Whether a fetch is in flight.
    ///
    /// State is frozen at deactivation, so a binding deactivated while a
    /// fetch was running keeps reporting `true`.
    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.state.borrow().last_error.clone()
    }

    pub fn watch_keys(&self) -> Vec<WatchKey> {
        self.binding.lock().keys.clone()
    }

    pub fn transport(&self) -> SyncTransport {
        self.binding.lock().transport.clone()
    }

    /// Receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<BindingState<T>> {
        self.shared.state.subscribe()
    }
}

impl<T> DataBinding<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn data(&self) -> Option<T> {
        self.shared.state.borrow().data.clone()
    }

    pub fn state(&self) -> BindingState<T> {
        self.shared.state.borrow().clone()
    }
}

impl<T> Drop for DataBinding<T> {
    fn drop(&mut self) {
        *self.shared.active.lock() = false;
        self.binding.get_mut().subscriptions.clear();
    }
}

fn dedup<I, K>(keys: I) -> Vec<WatchKey>
where
    I: IntoIterator<Item = K>,
    K: Into<WatchKey>,
{
    let mut unique: Vec<WatchKey> = Vec::new();
    for key in keys {
        let key = key.into();
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    unique
}

fn subscribe_all<T>(
    shared: &Arc<BindingShared<T>>,
    transport: &SyncTransport,
    keys: &[WatchKey],
) -> Vec<Subscription>
where
    T: Send + Sync + 'static,
{
    keys.iter()
        .map(|key| {
            let shared = Arc::downgrade(shared);
            transport.subscribe(key, move || {
                if let Some(shared) = shared.upgrade() {
                    shared.refetch();
                }
            })
        })
        .collect()
}
