use std::sync::Arc;
use std::time::Duration;

use data_sync::DataBinding;
use data_sync::SyncFacade;
use data_sync::WILDCARD;
use tokio::sync::Notify;

use crate::commons::two_tabs;
use crate::commons::wait_until;
use crate::commons::DELIVERY_LIMIT;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_binding_follows_writes_from_other_context() {
    crate::enable_logger();
    let (_domain, a, b) = two_tabs();
    let reader = SyncFacade::enter(b.clone());

    let store = b.context().store();
    let team = DataBinding::activate(b.clone(), ["teamA"], move || {
        let value = store.get("teamA");
        async move { value.ok_or("missing") }
    });
    assert!(wait_until(DELIVERY_LIMIT, || team.last_error().is_some()).await);
    assert_eq!(team.data(), None);

    a.context().store().set("teamA", "v1");
    a.notify_update("teamA");

    assert!(wait_until(DELIVERY_LIMIT, || team.data().as_deref() == Some("v1")).await);
    assert_eq!(team.last_error(), None);
    assert!(reader.last_sync_time() > 0);
    assert!(wait_until(DELIVERY_LIMIT, || reader.is_syncing()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wildcard_binding_refetches_after_any_key() {
    let (_domain, a, b) = two_tabs();
    let fetches = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let f = fetches.clone();
    let everything = DataBinding::activate(b.clone(), [WILDCARD], move || {
        let n = f.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        async move { Ok::<_, String>(n) }
    });
    assert!(wait_until(DELIVERY_LIMIT, || everything.data() == Some(1)).await);

    a.notify_update("anyKey");
    assert!(wait_until(DELIVERY_LIMIT, || everything.data() >= Some(2)).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deactivated_binding_ignores_late_result() {
    let (_domain, _a, b) = two_tabs();
    let gate = Arc::new(Notify::new());
    let g = gate.clone();
    let binding = DataBinding::activate(b.clone(), ["teamA"], move || {
        let gate = g.clone();
        async move {
            gate.notified().await;
            Ok::<_, String>(42)
        }
    });
    let mut state = binding.watch();
    state.borrow_and_update();

    binding.deactivate();
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!state.has_changed().unwrap());
    assert_eq!(binding.data(), None);
}
