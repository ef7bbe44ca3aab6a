//! Echo subscribe channel
//!
//! Forever-running receiver loop for peer echoes. Each frame carries the
//! fingerprint of a transaction some monitoring peer just saw; the loop
//! feeds it to the monitor table, which notifies the registered sink. Frames
//! for transactions this process never broadcast are discarded without
//! ceremony; malformed frames are logged and dropped. Nothing that happens
//! to a single message can take the loop down.

use crate::{wire, MAX_RECONNECTS, RECONNECT_DELAY};
use futures_util::StreamExt;
use parking_lot::RwLock;
use radar_core::RadarContext;
use serde::Serialize;
use std::sync::Arc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Counters for the echo loop
#[derive(Debug, Clone, Default, Serialize)]
pub struct EchoStats {
    pub echoes_received: u64,
    pub unknown_dropped: u64,
    pub malformed_dropped: u64,
}

/// Listener for the echo subscribe channel
pub struct EchoListener {
    ctx: Arc<RadarContext>,
    addr: String,
    stats: Arc<RwLock<EchoStats>>,
}

impl EchoListener {
    pub fn new(ctx: Arc<RadarContext>, addr: &str) -> Self {
        Self {
            ctx,
            addr: addr.to_string(),
            stats: Arc::new(RwLock::new(EchoStats::default())),
        }
    }

    pub fn stats(&self) -> EchoStats {
        self.stats.read().clone()
    }

    /// Run the listener. Reconnects on connection loss and gives up only
    /// after too many consecutive failures.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut reconnects = 0u32;
        loop {
            match self.run_session().await {
                Ok(()) => {
                    reconnects = 0;
                    tracing::warn!("Echo channel closed, reconnecting");
                }
                Err(e) => {
                    reconnects += 1;
                    if reconnects > MAX_RECONNECTS {
                        tracing::error!(
                            "Echo channel: {} reconnects exhausted, giving up",
                            MAX_RECONNECTS
                        );
                        return Err(e);
                    }
                    tracing::warn!(
                        "Echo channel error (reconnect {}/{}): {}",
                        reconnects,
                        MAX_RECONNECTS,
                        e
                    );
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// One subscribe session. Returns Err on connection failure, Ok when the
    /// remote closed cleanly; the caller reconnects either way.
    async fn run_session(&self) -> anyhow::Result<()> {
        let url = format!("ws://{}", self.addr);
        let (ws_stream, _) = connect_async(&url).await?;
        tracing::info!("Echo channel subscribed at {}", self.addr);

        let (_ws_sender, mut ws_receiver) = ws_stream.split();
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Binary(frame)) => self.on_frame(&frame),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Handle one echo frame
    fn on_frame(&self, frame: &[u8]) {
        match wire::parse_echo(frame) {
            Ok(fingerprint) => {
                self.stats.write().echoes_received += 1;
                match self.ctx.monitors.record_echo(&fingerprint) {
                    Some(ratio) => {
                        tracing::debug!("Echo for {}: ratio {:.2}", fingerprint, ratio);
                    }
                    None => {
                        // Not a transaction we broadcast, or already evicted
                        self.stats.write().unknown_dropped += 1;
                        tracing::trace!("Echo for unmonitored tx {}", fingerprint);
                    }
                }
            }
            Err(e) => {
                self.stats.write().malformed_dropped += 1;
                tracing::warn!("Malformed echo frame dropped: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use radar_core::{RadarConfig, TxFingerprint};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_tungstenite::accept_async;

    fn test_ctx() -> Arc<RadarContext> {
        Arc::new(RadarContext::new(RadarConfig {
            radar_hosts: 20,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_echoes_drive_registered_sink() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let fingerprint = TxFingerprint::of_transaction(b"echo test tx");
        let frame = wire::encode_echo(&fingerprint);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Binary(frame.clone())).await.unwrap();
            ws.send(Message::Binary(frame)).await.unwrap();
            // Stay connected so the listener does not enter its reconnect path
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let ctx = test_ctx();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        ctx.monitors.monitor(
            fingerprint,
            Arc::new(move |ratio: f64| sink_seen.lock().unwrap().push(ratio)),
        );

        let echo = EchoListener::new(ctx, &addr);
        let task = tokio::spawn(async move {
            let _ = echo.run().await;
        });

        for _ in 0..50 {
            if seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        task.abort();

        assert_eq!(*seen.lock().unwrap(), vec![1.0 / 20.0, 2.0 / 20.0]);
    }

    #[test]
    fn test_malformed_and_unknown_frames_are_counted_not_fatal() {
        let ctx = test_ctx();
        let echo = EchoListener::new(ctx, "127.0.0.1:0");

        // Garbage frame
        echo.on_frame(&[0xff, 0x01]);
        // Well-formed frame for a transaction nobody broadcast
        let fp = TxFingerprint::of_transaction(b"somebody else's tx");
        echo.on_frame(&wire::encode_echo(&fp));

        let stats = echo.stats();
        assert_eq!(stats.malformed_dropped, 1);
        assert_eq!(stats.echoes_received, 1);
        assert_eq!(stats.unknown_dropped, 1);
    }
}
