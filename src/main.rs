use std::time::Duration;

use data_sync::DataBinding;
use data_sync::Result;
use data_sync::SyncConfig;
use data_sync::SyncDomain;
use data_sync::SyncFacade;
use data_sync::SyncTransport;
use tracing::info;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

const TEAM_KEY: &str = "teamA";

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let config = SyncConfig::new()?.validated()?;
    let domain = SyncDomain::new(&config);

    // Two isolated contexts sharing one hub and one store
    let writer = SyncFacade::enter(SyncTransport::new(domain.context(), config.clone()));
    let reader = SyncFacade::enter(SyncTransport::new(domain.context(), config.clone()));

    let store = reader.transport().context().store();
    let team = DataBinding::activate(reader.transport().clone(), [TEAM_KEY], move || {
        let value = store.get(TEAM_KEY);
        async move { value.ok_or("no team yet") }
    });

    tokio::select! {
        _ = run_demo(&writer, &reader, &team) => {
            info!("Demo completed.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        }
    }

    team.deactivate();
    writer.exit();
    reader.exit();
    println!("Exiting program.");
    Ok(())
}

async fn run_demo(
    writer: &SyncFacade,
    reader: &SyncFacade,
    team: &DataBinding<String>,
) {
    let mut state = team.watch();
    let store = writer.transport().context().store();

    for round in 1..=3 {
        let value = format!("{TEAM_KEY} v{round}");
        store.set(TEAM_KEY, value.as_str());
        writer.transport().notify_update(TEAM_KEY);
        info!(round = round, value = %value, "Wrote from the first context");

        // Wait until the second context shows the new value
        let seen = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if state.borrow_and_update().data.as_deref() == Some(value.as_str()) {
                    return true;
                }
                if state.changed().await.is_err() {
                    return false;
                }
            }
        })
        .await
        .unwrap_or(false);

        if !seen {
            warn!(round = round, "Second context did not refresh in time");
        }

        let status = *reader.status().borrow();
        println!(
            "round {round}: data={:?} last_sync={} syncing={}",
            team.data(),
            status.last_sync,
            status.in_progress,
        );
    }

    reader.force_sync();
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!(
        "after force_sync: last_sync={} syncing={}",
        reader.last_sync_time(),
        reader.is_syncing(),
    );
}

fn init_observability() {
    let base_subscriber = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();
}
