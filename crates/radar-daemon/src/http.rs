//! HTTP surface
//!
//! Two routes: `GET /status` reports the node count and radar counters,
//! `POST /tx` accepts a hex-encoded raw transaction and broadcasts it.
//! Ratio updates for submitted transactions flow through a bounded queue to
//! the log worker; feedback from the fan-out layer is logged per broadcast.

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use radar_core::{ChannelRatioSink, FeedbackSink, RadarContext, RatioUpdate, TxFingerprint};
use radar_net::{Broadcaster, EchoListener, InfraListener};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

/// Shared state behind the HTTP routes
#[derive(Clone)]
pub struct HttpState {
    pub ctx: Arc<RadarContext>,
    pub broadcaster: Arc<Broadcaster>,
    pub echo: Arc<EchoListener>,
    pub infra: Arc<InfraListener>,
    pub ratio_queue: mpsc::Sender<RatioUpdate>,
}

/// Logs the fan-out layer's verdict on one broadcast
struct LogFeedbackSink {
    fingerprint: TxFingerprint,
}

impl FeedbackSink for LogFeedbackSink {
    fn notify(&self, echo_total: u64, error: Option<&str>) {
        match error {
            Some(err) => tracing::warn!(
                "Broadcast {} reported error after {} echoes: {}",
                self.fingerprint,
                echo_total,
                err
            ),
            None => tracing::info!(
                "Broadcast {} acknowledged by fan-out layer, {} echoes",
                self.fingerprint,
                echo_total
            ),
        }
    }
}

pub async fn serve(state: HttpState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/status", get(handle_status))
        .route("/tx", post(handle_broadcast))
        .layer(cors)
        .with_state(state)
}

async fn handle_status(State(state): State<HttpState>) -> Json<Value> {
    Json(json!({
        "nodes": state.ctx.nodes.get(),
        "monitored": state.ctx.monitors.len(),
        "radar_hosts": state.ctx.monitors.radar_hosts(),
        "broadcasts": state.broadcaster.broadcasts_sent(),
        "echo": state.echo.stats(),
        "infra": state.infra.stats(),
    }))
}

async fn handle_broadcast(
    State(state): State<HttpState>,
    body: String,
) -> (StatusCode, Json<Value>) {
    // Boundary input: a hex-encoded raw transaction
    let raw_tx = match hex::decode(body.trim()) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!("Rejected broadcast request: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("invalid hex: {}", e)})),
            );
        }
    };

    let fingerprint = TxFingerprint::of_transaction(&raw_tx);
    let sink = Arc::new(ChannelRatioSink::new(fingerprint, state.ratio_queue.clone()));

    match state.broadcaster.broadcast(&raw_tx, sink) {
        Ok(fingerprint) => {
            state
                .broadcaster
                .watch_feedback(fingerprint, Arc::new(LogFeedbackSink { fingerprint }));
            (
                StatusCode::OK,
                Json(json!({"fingerprint": fingerprint.to_string()})),
            )
        }
        Err(e) => {
            tracing::error!("Broadcast failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}
