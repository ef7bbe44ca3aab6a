//! Feedback and status subscribe channels
//!
//! The broadcast infrastructure reports on two endpoints: per-transaction
//! feedback (its own echo total plus an optional error) and a periodic
//! connected-node count. One reader task per socket decodes frames and fans
//! them into a single queue; one forever-running loop routes the events.
//! A malformed frame costs exactly that frame, nothing else.

use crate::wire::{self, FeedbackRecord, WireError};
use crate::{MAX_RECONNECTS, RECONNECT_DELAY};
use futures_util::StreamExt;
use parking_lot::RwLock;
use radar_core::RadarContext;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Out-of-band event from the broadcast infrastructure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfraEvent {
    /// Connected node count reported by the fan-out layer
    Status(u64),
    /// Per-transaction echo total and optional error
    Feedback(FeedbackRecord),
}

/// Counters for the infrastructure loop
#[derive(Debug, Clone, Default, Serialize)]
pub struct InfraStats {
    pub feedback_delivered: u64,
    pub feedback_unclaimed: u64,
    pub status_updates: u64,
    pub malformed_dropped: u64,
}

/// Listener for the feedback and status subscribe channels
pub struct InfraListener {
    ctx: Arc<RadarContext>,
    feedback_addr: String,
    status_addr: String,
    stats: Arc<RwLock<InfraStats>>,
}

impl InfraListener {
    pub fn new(ctx: Arc<RadarContext>, feedback_addr: &str, status_addr: &str) -> Self {
        Self {
            ctx,
            feedback_addr: feedback_addr.to_string(),
            status_addr: status_addr.to_string(),
            stats: Arc::new(RwLock::new(InfraStats::default())),
        }
    }

    pub fn stats(&self) -> InfraStats {
        self.stats.read().clone()
    }

    /// Run the listener: spawn one reader per socket, route events until
    /// both readers have given up.
    pub async fn run(&self) -> anyhow::Result<()> {
        let (queue, mut events) = mpsc::channel::<InfraEvent>(1024);

        let feedback_task = tokio::spawn(pump_socket(
            self.feedback_addr.clone(),
            "Feedback",
            queue.clone(),
            self.stats.clone(),
            feedback_event,
        ));
        let status_task = tokio::spawn(pump_socket(
            self.status_addr.clone(),
            "Status",
            queue,
            self.stats.clone(),
            status_event,
        ));

        while let Some(event) = events.recv().await {
            self.on_event(event);
        }

        feedback_task.abort();
        status_task.abort();
        Err(anyhow::anyhow!("infrastructure channels closed"))
    }

    /// Route one event into the radar context
    fn on_event(&self, event: InfraEvent) {
        match event {
            InfraEvent::Status(count) => {
                self.stats.write().status_updates += 1;
                if self.ctx.nodes.update(count) {
                    tracing::info!("Broadcast network now {} nodes", count);
                }
            }
            InfraEvent::Feedback(record) => {
                let notified = self.ctx.feedback.dispatch(
                    &record.fingerprint,
                    record.echo_total,
                    record.error.as_deref(),
                );
                let mut stats = self.stats.write();
                if notified == 0 {
                    stats.feedback_unclaimed += 1;
                    tracing::trace!("Feedback for unwatched tx {}", record.fingerprint);
                } else {
                    stats.feedback_delivered += notified as u64;
                    tracing::debug!(
                        "Feedback for {}: {} echoes, {} subscribers notified",
                        record.fingerprint,
                        record.echo_total,
                        notified
                    );
                }
            }
        }
    }
}

fn feedback_event(frame: &[u8]) -> Result<InfraEvent, WireError> {
    wire::parse_feedback(frame).map(InfraEvent::Feedback)
}

fn status_event(frame: &[u8]) -> Result<InfraEvent, WireError> {
    wire::parse_status(frame).map(InfraEvent::Status)
}

/// Subscribe to one socket and pump decoded events into the shared queue.
/// Reconnects on loss; exits when the consumer is gone or too many
/// consecutive reconnects failed.
async fn pump_socket(
    addr: String,
    kind: &'static str,
    queue: mpsc::Sender<InfraEvent>,
    stats: Arc<RwLock<InfraStats>>,
    parse: fn(&[u8]) -> Result<InfraEvent, WireError>,
) {
    let mut reconnects = 0u32;
    loop {
        match pump_session(&addr, kind, &queue, &stats, parse).await {
            Ok(true) => {
                reconnects = 0;
                tracing::warn!("{} channel closed, reconnecting", kind);
            }
            Ok(false) => return, // consumer gone
            Err(e) => {
                reconnects += 1;
                if reconnects > MAX_RECONNECTS {
                    tracing::error!(
                        "{} channel: {} reconnects exhausted, giving up",
                        kind,
                        MAX_RECONNECTS
                    );
                    return;
                }
                tracing::warn!(
                    "{} channel error (reconnect {}/{}): {}",
                    kind,
                    reconnects,
                    MAX_RECONNECTS,
                    e
                );
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// One subscribe session. Ok(true) asks for a reconnect, Ok(false) means the
/// event consumer disappeared.
async fn pump_session(
    addr: &str,
    kind: &'static str,
    queue: &mpsc::Sender<InfraEvent>,
    stats: &Arc<RwLock<InfraStats>>,
    parse: fn(&[u8]) -> Result<InfraEvent, WireError>,
) -> anyhow::Result<bool> {
    let url = format!("ws://{}", addr);
    let (ws_stream, _) = connect_async(&url).await?;
    tracing::info!("{} channel subscribed at {}", kind, addr);

    let (_ws_sender, mut ws_receiver) = ws_stream.split();
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Binary(frame)) => match parse(&frame) {
                Ok(event) => {
                    if queue.send(event).await.is_err() {
                        return Ok(false);
                    }
                }
                Err(e) => {
                    stats.write().malformed_dropped += 1;
                    tracing::warn!("Malformed {} frame dropped: {}", kind, e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use radar_core::{FeedbackSink, RadarConfig, TxFingerprint};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_tungstenite::accept_async;

    #[derive(Default)]
    struct RecordingFeedback(Mutex<Vec<(u64, Option<String>)>>);

    impl FeedbackSink for RecordingFeedback {
        fn notify(&self, echo_total: u64, error: Option<&str>) {
            self.0
                .lock()
                .unwrap()
                .push((echo_total, error.map(String::from)));
        }
    }

    fn test_listener() -> (Arc<RadarContext>, InfraListener) {
        let ctx = Arc::new(RadarContext::new(RadarConfig::default()));
        let listener = InfraListener::new(ctx.clone(), "127.0.0.1:0", "127.0.0.1:0");
        (ctx, listener)
    }

    #[test]
    fn test_status_events_update_on_change_only() {
        let (ctx, listener) = test_listener();

        listener.on_event(InfraEvent::Status(40));
        listener.on_event(InfraEvent::Status(40));
        listener.on_event(InfraEvent::Status(41));

        assert_eq!(ctx.nodes.get(), 41);
        assert_eq!(listener.stats().status_updates, 3);
    }

    #[test]
    fn test_feedback_events_drain_subscribers() {
        let (ctx, listener) = test_listener();
        let fp = TxFingerprint::of_transaction(b"tx");

        let sink = Arc::new(RecordingFeedback::default());
        ctx.feedback.subscribe(fp, sink.clone());

        let record = FeedbackRecord {
            fingerprint: fp,
            echo_total: 9,
            error: Some("rejected".to_string()),
        };
        listener.on_event(InfraEvent::Feedback(record.clone()));
        // Second report for the same fingerprint reaches nobody
        listener.on_event(InfraEvent::Feedback(record));

        assert_eq!(
            *sink.0.lock().unwrap(),
            vec![(9, Some("rejected".to_string()))]
        );
        let stats = listener.stats();
        assert_eq!(stats.feedback_delivered, 1);
        assert_eq!(stats.feedback_unclaimed, 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_kill_the_loop() {
        let status_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let status_addr = status_listener.local_addr().unwrap().to_string();
        let feedback_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let feedback_addr = feedback_listener.local_addr().unwrap().to_string();

        // Status socket sends garbage first, then a valid count
        tokio::spawn(async move {
            let (stream, _) = status_listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Binary(vec![0xde, 0xad])).await.unwrap();
            ws.send(Message::Binary(wire::encode_status(42))).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        // Feedback socket connects but stays quiet
        tokio::spawn(async move {
            let (stream, _) = feedback_listener.accept().await.unwrap();
            let _ws = accept_async(stream).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let ctx = Arc::new(RadarContext::new(RadarConfig::default()));
        let listener = Arc::new(InfraListener::new(ctx.clone(), &feedback_addr, &status_addr));
        let run_listener = listener.clone();
        let task = tokio::spawn(async move {
            let _ = run_listener.run().await;
        });

        for _ in 0..50 {
            if ctx.nodes.get() == 42 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        task.abort();

        assert_eq!(ctx.nodes.get(), 42);
        assert_eq!(listener.stats().malformed_dropped, 1);
    }
}
