//! Transaction radar daemon
//!
//! Pushes raw transactions to the broadcast fan-out service and measures how
//! much of the network echoes them back. Runs the echo and infrastructure
//! listeners in the background, sweeps stale monitor entries, and exposes a
//! small HTTP surface for status queries and transaction submission.

use anyhow::Result;
use clap::Parser;
use radar_core::{RadarConfig, RadarContext, RatioUpdate};
use radar_net::{BroadcastSender, Broadcaster, EchoListener, InfraListener, NetConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod http;

/// Interval between monitor-table eviction sweeps
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Transaction propagation radar
#[derive(Parser, Debug)]
#[command(name = "txradard")]
#[command(about = "Measures network propagation of broadcast transactions", long_about = None)]
struct Args {
    /// Broadcast push endpoint
    #[arg(long, default_value = "127.0.0.1:9109")]
    broadcast_addr: String,

    /// Feedback subscribe endpoint
    #[arg(long, default_value = "127.0.0.1:9110")]
    feedback_addr: String,

    /// Echo subscribe endpoint
    #[arg(long, default_value = "127.0.0.1:9111")]
    echo_addr: String,

    /// Status subscribe endpoint
    #[arg(long, default_value = "127.0.0.1:9112")]
    status_addr: String,

    /// HTTP bind address for status queries and transaction submission
    #[arg(long, default_value = "127.0.0.1:8810")]
    http_addr: String,

    /// Monitoring peers expected to echo a fully propagated transaction
    #[arg(long, default_value = "20")]
    radar_hosts: u64,

    /// Seconds before an unanswered monitor entry is evicted
    #[arg(long, default_value = "600")]
    monitor_ttl_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let net = NetConfig {
        broadcast_addr: args.broadcast_addr,
        feedback_addr: args.feedback_addr,
        echo_addr: args.echo_addr,
        status_addr: args.status_addr,
    };

    tracing::info!("Starting transaction radar");
    tracing::info!("  Broadcast push: {}", net.broadcast_addr);
    tracing::info!("  Echo subscribe: {}", net.echo_addr);
    tracing::info!("  Feedback subscribe: {}", net.feedback_addr);
    tracing::info!("  Status subscribe: {}", net.status_addr);
    tracing::info!("  HTTP: {}", args.http_addr);
    tracing::info!("  Radar hosts: {}", args.radar_hosts);
    tracing::info!("  Monitor TTL: {}s", args.monitor_ttl_secs);

    let ctx = Arc::new(RadarContext::new(RadarConfig {
        radar_hosts: args.radar_hosts,
        monitor_ttl: Duration::from_secs(args.monitor_ttl_secs),
    }));

    // The push channel is opened once and shared for the process lifetime
    let sender = BroadcastSender::connect(&net.broadcast_addr).await?;
    let broadcaster = Arc::new(Broadcaster::new(sender, ctx.clone()));

    let echo = Arc::new(EchoListener::new(ctx.clone(), &net.echo_addr));
    let infra = Arc::new(InfraListener::new(
        ctx.clone(),
        &net.feedback_addr,
        &net.status_addr,
    ));

    let echo_task = tokio::spawn({
        let echo = echo.clone();
        async move {
            if let Err(e) = echo.run().await {
                tracing::error!("Echo listener stopped: {}", e);
            }
        }
    });
    let infra_task = tokio::spawn({
        let infra = infra.clone();
        async move {
            if let Err(e) = infra.run().await {
                tracing::error!("Infrastructure listener stopped: {}", e);
            }
        }
    });

    // Ratio updates from radar sinks drain here, off the listener loops
    let (ratio_queue, mut ratio_updates) = tokio::sync::mpsc::channel::<RatioUpdate>(1024);
    let ratio_task = tokio::spawn(async move {
        while let Some(update) = ratio_updates.recv().await {
            tracing::info!(
                "Propagation {} at {:.0}%",
                update.fingerprint,
                update.ratio * 100.0
            );
        }
    });

    // Periodic eviction keeps the monitor table bounded on a long-running
    // process
    let sweep_ctx = ctx.clone();
    let sweep_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = sweep_ctx.monitors.evict_expired();
            if evicted > 0 {
                tracing::debug!("Evicted {} stale monitor entries", evicted);
            }
        }
    });

    let state = http::HttpState {
        ctx: ctx.clone(),
        broadcaster,
        echo,
        infra,
        ratio_queue,
    };
    let http_addr = args.http_addr.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http::serve(state, &http_addr).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!("Radar running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    echo_task.abort();
    infra_task.abort();
    ratio_task.abort();
    sweep_task.abort();
    http_task.abort();
    tracing::info!("Radar stopped");

    Ok(())
}
