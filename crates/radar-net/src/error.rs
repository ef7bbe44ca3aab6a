//! Transport errors

use thiserror::Error;

/// Failures on the broadcast push channel.
///
/// The push is fire-and-forget: none of these are retried internally, they
/// surface straight to the `send` caller.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("broadcast channel connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("broadcast channel closed")]
    Closed,

    #[error("broadcast queue full")]
    QueueFull,
}
