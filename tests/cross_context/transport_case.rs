use std::time::Duration;

use data_sync::SyncTransport;
use data_sync::WILDCARD;

use crate::commons::count_of;
use crate::commons::counter;
use crate::commons::two_tabs;
use crate::commons::wait_until;
use crate::commons::DELIVERY_LIMIT;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_keyed_subscriber_in_same_context() {
    crate::enable_logger();
    let (_domain, a, _b) = two_tabs();
    let (hits, on_hit) = counter();
    let _sub = a.subscribe("teamA", on_hit);

    a.notify_update("teamA");
    assert_eq!(count_of(&hits), 1);

    a.notify_update("teamB");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count_of(&hits), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_notify_reaches_other_context_once() {
    crate::enable_logger();
    let (_domain, a, b) = two_tabs();
    let (keyed, on_keyed) = counter();
    let (all, on_all) = counter();
    let _s1 = b.subscribe("teamA", on_keyed);
    let _s2 = b.subscribe(WILDCARD, on_all);

    a.notify_update("teamA");

    assert!(wait_until(DELIVERY_LIMIT, || count_of(&keyed) == 1 && count_of(&all) == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count_of(&keyed), 1);
    assert_eq!(count_of(&all), 1);
    assert!(b.last_sync_time() > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_store_write_reaches_other_context_only() {
    let (_domain, a, b) = two_tabs();
    let (on_a, cb_a) = counter();
    let (on_b, cb_b) = counter();
    let _s1 = a.subscribe("teamA", cb_a);
    let _s2 = b.subscribe("teamA", cb_b);

    a.context().store().set("teamA", "v1");

    assert!(wait_until(DELIVERY_LIMIT, || count_of(&on_b) == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count_of(&on_a), 0);
    assert_eq!(b.context().store().get("teamA").as_deref(), Some("v1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_last_sync_time_never_decreases() {
    let (_domain, a, b) = two_tabs();
    let mut previous = (a.last_sync_time(), b.last_sync_time());

    for i in 0..20 {
        match i % 3 {
            0 => a.notify_update(&format!("key-{i}")),
            1 => b.force_sync(None),
            _ => a.force_sync(Some("teamA")),
        }
        tokio::time::sleep(Duration::from_millis(1)).await;

        let current = (a.last_sync_time(), b.last_sync_time());
        assert!(current.0 >= previous.0);
        assert!(current.1 >= previous.1);
        previous = current;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_start_yields_clean_working_transport() {
    let (_domain, a, b) = two_tabs();
    let (old, on_old) = counter();
    let _old_sub = b.subscribe("teamA", on_old);

    b.stop();
    assert_eq!(b.watched_key_count(), 0);

    b.start();
    let (fresh, on_fresh) = counter();
    let _sub = b.subscribe("teamA", on_fresh);

    a.notify_update("teamA");
    assert!(wait_until(DELIVERY_LIMIT, || count_of(&fresh) == 1).await);
    assert_eq!(count_of(&old), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_transports_share_the_channel() {
    let (domain, a, _b) = two_tabs();
    let config = crate::commons::config();
    let late = SyncTransport::new(domain.context(), config);
    late.start();

    let (hits, on_hit) = counter();
    let _sub = late.subscribe("teamA", on_hit);
    a.notify_update("teamA");

    assert!(wait_until(DELIVERY_LIMIT, || count_of(&hits) == 1).await);
    assert!(!late.same_instance(&a));
}
