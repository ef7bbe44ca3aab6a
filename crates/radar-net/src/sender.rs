//! Broadcast push channel
//!
//! One outbound connection to the fan-out service, opened at startup and
//! reused for the process lifetime. Pushes are best-effort: no acknowledgement
//! comes back and nothing is retried.

use crate::error::TransportError;
use crate::wire;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Outbound queue depth; a full queue surfaces as a fatal send error
const SEND_QUEUE: usize = 256;

/// Fire-and-forget sender for raw transactions.
///
/// Concurrent `send` calls from any task are serialized by a single writer
/// task draining the queue, so the connection itself is never contended.
pub struct BroadcastSender {
    queue: mpsc::Sender<Vec<u8>>,
}

impl BroadcastSender {
    /// Connect to the broadcast fan-out service
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let url = format!("ws://{}", addr);
        let (ws_stream, _) = connect_async(&url).await?;
        tracing::info!("Broadcast channel connected to {}", addr);

        let (queue, mut rx) = mpsc::channel::<Vec<u8>>(SEND_QUEUE);
        let (mut ws_sender, _ws_receiver) = ws_stream.split();

        tokio::spawn(async move {
            while let Some(raw_tx) = rx.recv().await {
                let frame = wire::encode_push(&raw_tx);
                if let Err(e) = ws_sender.send(Message::Binary(frame)).await {
                    tracing::error!("Broadcast channel write failed: {}", e);
                    break;
                }
            }
        });

        Ok(Self { queue })
    }

    /// Queue a raw transaction for broadcast. Does not block and gives no
    /// delivery guarantee.
    pub fn send(&self, raw_tx: &[u8]) -> Result<(), TransportError> {
        self.queue.try_send(raw_tx.to_vec()).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}
