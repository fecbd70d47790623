use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::SyncTransport;

/// What presentation code shows about synchronisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Millisecond timestamp of the last processed message, 0 if none
    pub last_sync: u64,
    /// A sync happened less than one syncing window ago
    pub in_progress: bool,
}

/// Scoped owner of a started transport.
pub struct SyncFacade {
    transport: SyncTransport,
    status: watch::Receiver<SyncStatus>,
    shutdown: CancellationToken,
    exited: AtomicBool,
}

impl std::fmt::Debug for SyncFacade {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SyncFacade")
            .field("transport", &self.transport)
            .field("status", &*self.status.borrow())
            .field("exited", &self.exited.load(Ordering::Acquire))
            .finish()
    }
}

impl SyncFacade {
    /// Start `transport` and begin tracking its status.
    ///
    /// The syncing window comes from the transport's own configuration.
    /// Without a tokio runtime the transport still starts, but the status
    /// never reports a sync in progress.
    pub fn enter(transport: SyncTransport) -> Self {
        transport.start();

        let (status_tx, status_rx) = watch::channel(SyncStatus {
            last_sync: transport.last_sync_time(),
            in_progress: false,
        });
        let shutdown = CancellationToken::new();

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(track_status(
                    transport.subscribe_sync_time(),
                    status_tx,
                    transport.config().syncing_window(),
                    shutdown.clone(),
                ));
            }
            Err(e) => {
                warn!(
                    context_id = transport.context().id(),
                    error = %e,
                    "No async runtime; sync status will not be tracked"
                );
            }
        }

        Self {
            transport,
            status: status_rx,
            shutdown,
            exited: AtomicBool::new(false),
        }
    }

    pub fn last_sync_time(&self) -> u64 {
        self.transport.last_sync_time()
    }

    pub fn is_syncing(&self) -> bool {
        self.status.borrow().in_progress
    }

    /// Ask every wildcard subscriber in every context to refresh.
    pub fn force_sync(&self) {
        self.transport.force_sync(None);
    }

    pub fn transport(&self) -> &SyncTransport {
        &self.transport
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Stop status tracking and the transport. Safe to call more than once.
    pub fn exit(&self) {
        if self.exited.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        self.transport.stop();
        debug!(context_id = self.transport.context().id(), "Sync facade exited");
    }
}

impl Drop for SyncFacade {
    fn drop(&mut self) {
        self.exit();
    }
}

/// Mirror the transport's timestamp signal into a [`SyncStatus`].
///
/// Each signal sets `in_progress` and pushes the deadline out to one window
/// after that signal.
async fn track_status(
    mut sync_time: watch::Receiver<u64>,
    status: watch::Sender<SyncStatus>,
    window: Duration,
    shutdown: CancellationToken,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            changed = sync_time.changed() => {
                if changed.is_err() {
                    break;
                }
                let last_sync = *sync_time.borrow_and_update();
                deadline = Some(Instant::now() + window);
                status.send_replace(SyncStatus {
                    last_sync,
                    in_progress: true,
                });
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                status.send_modify(|s| s.in_progress = false);
            }
        }
    }

    status.send_if_modified(|s| std::mem::replace(&mut s.in_progress, false));
}
