use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use broadcast_server::{notification_channel, BroadcastServer};
use exchange_client::RestCandleSource;
use series_store::SeriesStore;
use signal_monitor::{build_strategies, Monitor};
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("Starting trading signal monitor");

    // 2. Load configuration (validated, never fatal on bad values)
    let system_config = config::load_config();
    tracing::info!("  trigger: every {} min at :{:02}s",
        system_config.monitoring.trigger_minutes,
        system_config.monitoring.trigger_second
    );
    tracing::info!("  fetch limit: {} candles, tail window: {}",
        system_config.monitoring.fetch_limit,
        system_config.monitoring.tail_calc
    );
    tracing::info!("  retries: {} with {}s delay",
        system_config.monitoring.max_retries,
        system_config.monitoring.retry_delay_secs
    );
    tracing::info!("  targets: {} configured, {} exchanges",
        system_config.targets.len(),
        system_config.exchanges.len()
    );

    if system_config.targets.is_empty() {
        anyhow::bail!(
            "no monitoring targets configured (set MONITOR_TARGETS or provide a config file)"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 3. Broadcast server (the event loop that owns all subscriber sockets)
    let server = BroadcastServer::new();
    let ws_host = std::env::var("WS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let ws_port: u16 = std::env::var("WS_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10000);
    let addr: SocketAddr = format!("{ws_host}:{ws_port}")
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid WS_HOST/WS_PORT: {e}"))?;

    let mut server_shutdown = shutdown_rx.clone();
    let server_task = tokio::spawn(server.clone().serve(addr, async move {
        let _ = server_shutdown.changed().await;
    }));

    // 4. Notification bridge: workers push, a single consumer drains into
    // the broadcast channel
    let (notifier, queue) = notification_channel();
    let consumer_task = tokio::spawn(queue.run(server.broadcast_sender()));

    // 5. Candle source, series store, strategies
    let source = Arc::new(RestCandleSource::new(&system_config.exchanges));
    let store = Arc::new(SeriesStore::new());
    let strategies = build_strategies(&system_config);
    tracing::info!("strategies: {}", strategies.len());

    let monitor = Monitor::new(
        system_config.monitoring.clone(),
        system_config.targets.clone(),
        source,
        store,
        strategies,
        notifier.clone(),
    );

    // 6. Initial data sync, then the scheduler loop
    let sync = monitor.sync_once().await;
    if sync.error_count > 0 {
        notifier.notify_warning(format!(
            "initial data sync: {} of {} targets failed",
            sync.error_count,
            sync.error_count + sync.success_count
        ));
    }

    let monitor_task = tokio::spawn(Arc::clone(&monitor).run(shutdown_rx));

    // 7. Graceful shutdown on SIGINT/SIGTERM
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down: stopping scheduler");
    let _ = shutdown_tx.send(true);

    // Scheduler stops only between batches, so this waits out any batch
    // still in flight.
    if let Err(e) = monitor_task.await {
        tracing::error!("monitor task failed: {e}");
    }

    // Drop every sender so the bridge consumer drains the queue and stops;
    // queued events are still delivered.
    drop(monitor);
    drop(notifier);
    if let Err(e) = consumer_task.await {
        tracing::error!("notification consumer failed: {e}");
    }

    // Broadcast server last, once nothing can produce messages
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("broadcast server error: {e}"),
        Err(e) => tracing::error!("broadcast server task failed: {e}"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
