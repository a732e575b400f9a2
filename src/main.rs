//! sitewatch - website status monitor with alerting.
//!
//! Periodically probes configured websites, tracks their up/down state,
//! notifies configured channels on transitions and sends a daily digest.

mod config;
mod db;
mod monitor;
mod notify;
mod probe;
mod report;
mod scheduler;
mod web;

#[cfg(test)]
mod testing;

use config::{MonitorConfig, ServerConfig};
use db::Store;
use monitor::MonitorEngine;
use notify::{AlertDispatcher, Channel};
use probe::HttpProber;
use scheduler::{Scheduler, SchedulerSettings};
use web::Server;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    let monitor_cfg = match MonitorConfig::load(&cfg.config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!(
        "Loaded {} targets and {} channels from {}",
        monitor_cfg.targets.len(),
        monitor_cfg.channels.len(),
        cfg.config_path.display()
    );

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Using database at {}", cfg.db_path);

    let shutdown = CancellationToken::new();

    let engine = Arc::new(MonitorEngine::new(
        monitor_cfg.targets(),
        monitor_cfg.alert_on_baseline_down,
    ));

    let client = reqwest::Client::builder()
        .user_agent(probe::USER_AGENT)
        .build()?;
    let channels: Vec<Channel> = monitor_cfg
        .channels
        .iter()
        .map(|c| Channel::from_config(c, &client))
        .collect();
    let dispatcher = Arc::new(AlertDispatcher::new(
        channels,
        Duration::from_secs(monitor_cfg.notify_timeout_secs),
        shutdown.clone(),
    ));
    if dispatcher.channel_count() == 0 {
        tracing::warn!("No notification channels configured; alerts will only be logged");
    }

    let settings = SchedulerSettings {
        probe_interval: Duration::from_secs(monitor_cfg.probe_interval_secs),
        digest_time: monitor_cfg.digest_time()?,
        max_concurrent_probes: monitor_cfg.max_concurrent_probes,
        history_retention: match monitor_cfg.history_retention_days {
            0 => None,
            days => Some(Duration::from_secs(u64::from(days) * 24 * 3600)),
        },
    };

    let scheduler = Arc::new(Scheduler::new(
        engine.clone(),
        Arc::new(HttpProber::new()?),
        dispatcher,
        store.clone(),
        settings,
    ));
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

    // Stop everything on Ctrl-C
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutdown requested");
        signal_token.cancel();
    });

    // Start web server
    let server = Server::new(cfg.http_port, engine, store);
    if let Err(e) = server.start(shutdown.clone()).await {
        tracing::error!("Web server failed: {}", e);
        shutdown.cancel();
    }

    scheduler_task.await?;
    tracing::info!("Monitor stopped");

    Ok(())
}
