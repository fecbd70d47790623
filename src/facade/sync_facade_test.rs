use std::time::Duration;

use super::*;
use crate::test_utils::count_of;
use crate::test_utils::counter;
use crate::test_utils::enable_logger;
use crate::test_utils::test_config;
use crate::test_utils::transports;
use crate::test_utils::wait_until;
use crate::SyncConfig;
use crate::SyncDomain;
use crate::SyncTransport;
use crate::WILDCARD;

#[tokio::test]
async fn test_enter_starts_and_drop_stops_transport() {
    enable_logger();
    let (_domain, mut transports) = transports(1);
    let transport = transports.remove(0);

    let facade = SyncFacade::enter(transport.clone());
    assert!(transport.is_started());
    assert!(facade.transport().same_instance(&transport));

    drop(facade);
    assert!(!transport.is_started());
}

#[tokio::test]
async fn test_exit_is_idempotent() {
    let (_domain, mut transports) = transports(1);
    let transport = transports.remove(0);
    let facade = SyncFacade::enter(transport.clone());

    facade.exit();
    facade.exit();
    assert!(!transport.is_started());

    // Restarting behind the facade's back is not undone by the drop
    transport.start();
    drop(facade);
    assert!(transport.is_started());
    transport.stop();
}

#[tokio::test]
async fn test_force_sync_reaches_wildcard_subscribers_of_other_contexts() {
    enable_logger();
    let (_domain, mut transports) = transports(2);
    let b = SyncFacade::enter(transports.pop().unwrap());
    let a = SyncFacade::enter(transports.pop().unwrap());

    let (all_b, on_all_b) = counter();
    let (keyed_b, on_keyed_b) = counter();
    let _s1 = b.transport().subscribe(WILDCARD, on_all_b);
    let _s2 = b.transport().subscribe("teamA", on_keyed_b);

    a.force_sync();

    assert!(wait_until(Duration::from_secs(1), || count_of(&all_b) >= 1).await);
    assert_eq!(count_of(&keyed_b), 0);
    assert!(a.last_sync_time() > 0);
    assert!(wait_until(Duration::from_secs(1), || b.last_sync_time() > 0).await);
}

#[tokio::test(start_paused = true)]
async fn test_in_progress_clears_one_window_after_signal() {
    let (_domain, mut transports) = transports(1);
    let facade = SyncFacade::enter(transports.remove(0));
    let mut status = facade.status();
    assert_eq!(*status.borrow(), SyncStatus::default());
    assert!(!facade.is_syncing());

    facade.force_sync();
    status.changed().await.unwrap();
    let current = *status.borrow_and_update();
    assert!(current.in_progress);
    assert_eq!(current.last_sync, facade.last_sync_time());

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(facade.is_syncing());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!facade.is_syncing());
    assert_eq!(status.borrow().last_sync, facade.last_sync_time());
}

#[tokio::test(start_paused = true)]
async fn test_in_progress_window_extends_from_latest_signal() {
    let (_domain, mut transports) = transports(1);
    let facade = SyncFacade::enter(transports.remove(0));

    facade.force_sync();
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(facade.is_syncing());

    facade.transport().notify_update("teamA");
    tokio::time::sleep(Duration::from_millis(500)).await;
    // 1.3 s after the first signal, 0.5 s after the second
    assert!(facade.is_syncing());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!facade.is_syncing());
}

#[tokio::test(start_paused = true)]
async fn test_custom_syncing_window() {
    let config = SyncConfig {
        syncing_window_ms: 200,
        ..test_config()
    };
    let domain = SyncDomain::new(&config);
    let facade = SyncFacade::enter(SyncTransport::new(domain.context(), config));

    facade.force_sync();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(facade.is_syncing());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!facade.is_syncing());
}

#[tokio::test(start_paused = true)]
async fn test_exit_clears_in_progress() {
    let (_domain, mut transports) = transports(1);
    let facade = SyncFacade::enter(transports.remove(0));
    let mut status = facade.status();

    facade.force_sync();
    status.changed().await.unwrap();
    assert!(status.borrow_and_update().in_progress);

    facade.exit();
    status.changed().await.unwrap();
    assert!(!status.borrow().in_progress);
}

#[test]
fn test_enter_without_runtime() {
    let (_domain, mut transports) = transports(1);
    let facade = SyncFacade::enter(transports.remove(0));
    assert!(facade.transport().is_started());

    facade.force_sync();
    assert!(facade.last_sync_time() > 0);
    assert!(!facade.is_syncing());

    facade.exit();
    assert!(!facade.transport().is_started());
}
