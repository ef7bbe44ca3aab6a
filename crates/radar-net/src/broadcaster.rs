//! Caller-facing broadcast entry point
//!
//! Sends a raw transaction and registers its propagation monitoring as one
//! call. The sink hears 0.0 synchronously as the "accepted" signal, then one
//! update per peer echo until the entry is removed or evicted.

use crate::error::TransportError;
use crate::sender::BroadcastSender;
use radar_core::{FeedbackSink, RadarContext, RatioSink, TxFingerprint};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct Broadcaster {
    sender: BroadcastSender,
    ctx: Arc<RadarContext>,
    broadcasts: AtomicU64,
}

impl Broadcaster {
    pub fn new(sender: BroadcastSender, ctx: Arc<RadarContext>) -> Self {
        Self {
            sender,
            ctx,
            broadcasts: AtomicU64::new(0),
        }
    }

    /// Broadcast a raw transaction and monitor its propagation.
    ///
    /// Push failures surface here untouched; the monitor entry is only
    /// created for transactions that actually left the process.
    pub fn broadcast(
        &self,
        raw_tx: &[u8],
        sink: Arc<dyn RatioSink>,
    ) -> Result<TxFingerprint, TransportError> {
        self.sender.send(raw_tx)?;

        let fingerprint = TxFingerprint::of_transaction(raw_tx);
        self.ctx.monitors.monitor(fingerprint, sink.clone());
        // Accepted: the radar has not heard anything yet
        sink.notify(0.0);

        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Broadcast tx {}", fingerprint);
        Ok(fingerprint)
    }

    /// Register a single-shot subscriber for the infrastructure's feedback
    /// on a fingerprint
    pub fn watch_feedback(&self, fingerprint: TxFingerprint, sink: Arc<dyn FeedbackSink>) {
        self.ctx.feedback.subscribe(fingerprint, sink);
    }

    pub fn broadcasts_sent(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use radar_core::RadarConfig;
    use std::sync::Mutex;
    use tokio_tungstenite::{accept_async, tungstenite::Message};

    #[tokio::test]
    async fn test_broadcast_sends_monitors_and_signals_accepted() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            let (_, mut rx) = ws.split();
            loop {
                match rx.next().await {
                    Some(Ok(Message::Binary(frame))) => return frame,
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected message: {:?}", other),
                }
            }
        });

        let ctx = Arc::new(RadarContext::new(RadarConfig {
            radar_hosts: 20,
            ..Default::default()
        }));
        let sender = BroadcastSender::connect(&addr).await.unwrap();
        let broadcaster = Broadcaster::new(sender, ctx.clone());

        let raw_tx = b"raw signed tx";
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let fingerprint = broadcaster
            .broadcast(
                raw_tx,
                Arc::new(move |ratio: f64| sink_seen.lock().unwrap().push(ratio)),
            )
            .unwrap();

        assert_eq!(fingerprint, TxFingerprint::of_transaction(raw_tx));
        assert!(ctx.monitors.contains(&fingerprint));
        assert_eq!(broadcaster.broadcasts_sent(), 1);
        // The accepted signal arrives before any echo
        assert_eq!(*seen.lock().unwrap(), vec![0.0]);

        // Echoes now flow through the same sink
        for _ in 0..5 {
            ctx.monitors.record_echo(&fingerprint);
        }
        let values = seen.lock().unwrap().clone();
        assert_eq!(values.last().copied(), Some(0.25));
        assert_eq!(values.len(), 6);

        // The fan-out service received the raw bytes untouched
        let frame = server.await.unwrap();
        let parts = crate::wire::decode_parts(&frame).unwrap();
        assert_eq!(parts, vec![raw_tx.to_vec()]);
    }

    #[tokio::test]
    async fn test_watch_feedback_registers_single_shot() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ws = accept_async(stream).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });

        let ctx = Arc::new(RadarContext::new(RadarConfig::default()));
        let sender = BroadcastSender::connect(&addr).await.unwrap();
        let broadcaster = Broadcaster::new(sender, ctx.clone());

        struct CountingFeedback(AtomicU64);
        impl FeedbackSink for CountingFeedback {
            fn notify(&self, _echo_total: u64, _error: Option<&str>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let fp = TxFingerprint::of_transaction(b"tx");
        let sink = Arc::new(CountingFeedback(AtomicU64::new(0)));
        broadcaster.watch_feedback(fp, sink.clone());

        assert_eq!(ctx.feedback.dispatch(&fp, 4, None), 1);
        assert_eq!(ctx.feedback.dispatch(&fp, 4, None), 0);
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }
}
