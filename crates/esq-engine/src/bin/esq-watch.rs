//! Terminal watcher for the escalation queue.
//!
//! Wires the REST client, the push channel, and the sync engine
//! together, then logs the queue every time the published view
//! changes. Ctrl-C tears everything down cleanly.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use esq_api::ApiClient;
use esq_core::{SortSpec, SystemClock};
use esq_engine::{EngineConfig, QueueView, SyncEngine};
use esq_stream::EventChannel;

#[derive(Debug, Parser)]
#[command(name = "esq-watch", about = "Watch the live escalation queue")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "esq.toml")]
    config: PathBuf,

    /// Override the REST base URL from the config file.
    #[arg(long)]
    base_url: Option<String>,

    /// Override the push-channel URL from the config file.
    #[arg(long)]
    ws_url: Option<String>,

    /// Override the poll interval, in seconds.
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = EngineConfig::from_path(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(ws_url) = args.ws_url {
        config.ws_url = ws_url;
    }
    if let Some(secs) = args.poll_interval_secs {
        config.poll_interval_secs = secs;
    }

    let backend = Arc::new(ApiClient::new(&config.api()).context("building API client")?);
    let channel = EventChannel::new(config.channel()).spawn();
    let clock = Arc::new(SystemClock);

    let handle = SyncEngine::new(config, backend, channel, clock).spawn();
    let mut queue = handle.queue.clone();
    let mut connection = handle.connection.clone();

    info!("watching escalation queue, press Ctrl-C to stop");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("listening for Ctrl-C")?;
                break;
            }
            changed = queue.changed() => {
                if changed.is_err() {
                    break;
                }
                log_queue(&queue.borrow_and_update());
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connection.borrow_and_update();
                info!(state = ?state, "connection state changed");
            }
        }
    }

    info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

fn log_queue(view: &QueueView) {
    let SortSpec { field, direction } = view.sort;
    info!(
        rows = view.len(),
        overdue = view.overdue_count(),
        sort = ?field,
        direction = ?direction,
        "queue updated"
    );
    for item in &view.items {
        info!(
            id = %item.record.id,
            sla = ?item.sla,
            priority = ?item.record.priority,
            status = ?item.record.status,
            due = %item.record.sla_due_at,
            subject = %item.record.subject,
            "  escalation"
        );
    }
}
