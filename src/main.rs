//! Dash Observer - Main entry point
//!
//! This binary runs the session observer as a daemon. Snapshot sources
//! connect through the pipeline handles; standalone it idles and logs
//! status until interrupted.

use dash_observer::{Config, EventStore, LogNoticeSurface, NullTreeSource, SessionPipeline};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first so it can set the default log level
    let config = Config::load();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.general.log_level.clone())),
        )
        .with_target(false)
        .init();

    info!("Starting Dash Observer");
    info!(
        "Configuration loaded from {:?}",
        Config::default_config_path()
    );

    if !config.general.enabled {
        info!("Observer is disabled in configuration, exiting");
        return Ok(());
    }

    let event_store = EventStore::open(config.persistence.db_path())?;
    info!("Event store at {:?}", config.persistence.db_path());

    let (pipeline, handles) = SessionPipeline::new(
        &config,
        event_store,
        Arc::new(NullTreeSource),
        Arc::new(LogNoticeSurface),
    );
    let pipeline_handle = tokio::spawn(pipeline.run());

    // Periodic status logging
    let control = handles.control.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(30));
        tick.tick().await;
        loop {
            tick.tick().await;
            let status = control.status();
            info!(
                "Status: phase={} snapshots={} events={} paused={}",
                status.phase,
                status.snapshots_classified,
                status.events_dispatched,
                status.paused
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Dropping the ingress channels lets the pipeline drain and stop
    drop(handles);
    let _ = pipeline_handle.await;

    info!("Dash Observer stopped");
    Ok(())
}
