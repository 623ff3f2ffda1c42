//! Zenoh bridge for Prometheus exposition endpoints.
//!
//! Periodically scrapes the configured URLs and publishes one event per
//! decoded sample to Zenoh.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use prometheus_pull::MemorySink;
use zenoh_bridge_prometheus::{
    BridgeArgs, Event, PrometheusBridgeConfig, ZenohSink, connect, init_tracing,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse();

    let config = PrometheusBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    init_tracing(
        &config
            .logging
            .with_level_override(args.log_level.as_deref()),
    )?;

    tracing::info!(config = %args.config.display(), "Starting Prometheus bridge");

    if args.dry_run {
        return dry_run(&config).await;
    }

    let session = Arc::new(
        connect(&config.zenoh)
            .await
            .context("Failed to open Zenoh session")?,
    );
    let sink = ZenohSink::new(
        session.clone(),
        config.prometheus.key_prefix.clone(),
        config.serialization,
    );
    let poller = config.prometheus.build_poller(sink)?;

    if args.once {
        let stats = poller.poll_once().await;
        tracing::info!(
            targets = stats.targets,
            targets_failed = stats.targets_failed,
            records = stats.records_emitted,
            success_rate = stats.success_rate(),
            "Single poll cycle complete"
        );
    } else {
        let task = tokio::spawn(poller.run(config.prometheus.interval()));

        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }

        tracing::info!("Received shutdown signal");
        task.abort();
    }

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Error closing Zenoh session");
    }

    tracing::info!("Goodbye!");
    Ok(())
}

/// Run one cycle and print every event as a JSON line.
async fn dry_run(config: &PrometheusBridgeConfig) -> Result<()> {
    let poller = config.prometheus.build_poller(MemorySink::new())?;
    let stats = poller.poll_once().await;

    for captured in poller.sink().take() {
        let event = Event {
            tag: &captured.tag,
            time: captured.time,
            record: &captured.record,
        };
        println!("{}", serde_json::to_string(&event)?);
    }

    tracing::info!(
        targets = stats.targets,
        targets_failed = stats.targets_failed,
        records = stats.records_emitted,
        "Dry run complete"
    );
    Ok(())
}
