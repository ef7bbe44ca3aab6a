//! Notification sinks
//!
//! Callbacks registered with the radar cross thread boundaries: they are
//! handed over at registration and invoked later from a listener loop.
//! Both sink traits are synchronous and must stay cheap; anything slow
//! (a network write, a disconnected client) goes behind `ChannelRatioSink`,
//! which hands the update to a bounded queue and never blocks the caller.

use crate::fingerprint::TxFingerprint;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Notification target for propagation ratio updates.
///
/// Invoked once with 0.0 when a broadcast is accepted, then once per
/// observed peer echo.
pub trait RatioSink: Send + Sync {
    fn notify(&self, ratio: f64);
}

impl<F> RatioSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn notify(&self, ratio: f64) {
        self(ratio)
    }
}

/// Notification target for out-of-band feedback from the broadcast
/// infrastructure: the fan-out layer's own echo total plus an optional
/// error report. Invoked at most once per registration.
pub trait FeedbackSink: Send + Sync {
    fn notify(&self, echo_total: u64, error: Option<&str>);
}

/// A ratio update queued for delivery off the listener loop
#[derive(Clone, Debug, PartialEq)]
pub struct RatioUpdate {
    pub fingerprint: TxFingerprint,
    pub ratio: f64,
}

/// `RatioSink` backed by a bounded queue.
///
/// The listener loop only ever pays for a `try_send`; when the consumer is
/// slow the update is dropped with a warning, and when the consumer is gone
/// the notification becomes a no-op. Either way the loop keeps running.
pub struct ChannelRatioSink {
    fingerprint: TxFingerprint,
    queue: mpsc::Sender<RatioUpdate>,
}

impl ChannelRatioSink {
    pub fn new(fingerprint: TxFingerprint, queue: mpsc::Sender<RatioUpdate>) -> Self {
        Self { fingerprint, queue }
    }
}

impl RatioSink for ChannelRatioSink {
    fn notify(&self, ratio: f64) {
        let update = RatioUpdate {
            fingerprint: self.fingerprint,
            ratio,
        };
        match self.queue.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => {
                tracing::warn!(
                    "Ratio queue full, dropping update for {} ({:.2})",
                    update.fingerprint,
                    update.ratio
                );
            }
            Err(TrySendError::Closed(update)) => {
                tracing::debug!("Ratio consumer gone for {}", update.fingerprint);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: Arc<dyn RatioSink> =
            Arc::new(move |ratio: f64| sink_seen.lock().unwrap().push(ratio));

        sink.notify(0.0);
        sink.notify(0.5);
        assert_eq!(*seen.lock().unwrap(), vec![0.0, 0.5]);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let fp = TxFingerprint::of_transaction(b"tx");
        let (tx, mut rx) = mpsc::channel(8);
        let sink = ChannelRatioSink::new(fp, tx);

        sink.notify(0.25);
        let update = rx.recv().await.unwrap();
        assert_eq!(update.fingerprint, fp);
        assert_eq!(update.ratio, 0.25);
    }

    #[tokio::test]
    async fn test_channel_sink_drops_on_overflow() {
        let fp = TxFingerprint::of_transaction(b"tx");
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChannelRatioSink::new(fp, tx);

        // Second update overflows the queue and is dropped, not blocked on
        sink.notify(0.1);
        sink.notify(0.2);

        assert_eq!(rx.recv().await.unwrap().ratio, 0.1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_channel_sink_survives_closed_consumer() {
        let fp = TxFingerprint::of_transaction(b"tx");
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let sink = ChannelRatioSink::new(fp, tx);
        // Must not panic or block
        sink.notify(1.0);
    }
}
