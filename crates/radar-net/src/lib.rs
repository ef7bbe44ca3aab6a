//! Radar network plumbing
//!
//! Four channels connect the radar to the outside world:
//! - a push channel carrying raw transactions to the broadcast fan-out
//!   service (`BroadcastSender`);
//! - an echo subscribe channel where monitoring peers report transactions
//!   they have seen (`EchoListener`);
//! - feedback and status subscribe channels from the fan-out infrastructure
//!   itself (`InfraListener`).
//!
//! `Broadcaster` is the caller-facing entry point tying the push channel and
//! the monitor table together.

pub mod broadcaster;
pub mod echo;
pub mod error;
pub mod infra;
pub mod sender;
pub mod wire;

pub use broadcaster::Broadcaster;
pub use echo::{EchoListener, EchoStats};
pub use error::TransportError;
pub use infra::{InfraEvent, InfraListener, InfraStats};
pub use sender::BroadcastSender;
pub use wire::{FeedbackRecord, WireError};

use std::time::Duration;

/// Consecutive connect failures a subscribe loop tolerates before giving up
pub(crate) const MAX_RECONNECTS: u32 = 10;

/// Pause between subscribe sessions
pub(crate) const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Endpoint configuration for the radar channels
#[derive(Clone, Debug)]
pub struct NetConfig {
    /// Broadcast push endpoint
    pub broadcast_addr: String,
    /// Feedback subscribe endpoint
    pub feedback_addr: String,
    /// Echo subscribe endpoint
    pub echo_addr: String,
    /// Status subscribe endpoint
    pub status_addr: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: "127.0.0.1:9109".to_string(),
            feedback_addr: "127.0.0.1:9110".to_string(),
            echo_addr: "127.0.0.1:9111".to_string(),
            status_addr: "127.0.0.1:9112".to_string(),
        }
    }
}
