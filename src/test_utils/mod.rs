//! Helpers shared by the unit tests of every module
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::SyncConfig;
use crate::SyncDomain;
use crate::SyncTransport;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Callback counting its invocations.
pub fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    (count, move || {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

pub fn count_of(count: &Arc<AtomicUsize>) -> usize {
    count.load(Ordering::SeqCst)
}

/// Poll `condition` every few milliseconds until it holds or `limit` passes.
pub async fn wait_until<F>(
    limit: Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn test_config() -> SyncConfig {
    SyncConfig {
        channel_name: "test-sync".into(),
        ..SyncConfig::default()
    }
}

/// One domain and one (not yet started) transport per requested context.
pub fn transports(n: usize) -> (SyncDomain, Vec<SyncTransport>) {
    let config = test_config();
    let domain = SyncDomain::new(&config);
    let transports = (0..n).map(|_| SyncTransport::new(domain.context(), config.clone())).collect();
    (domain, transports)
}
