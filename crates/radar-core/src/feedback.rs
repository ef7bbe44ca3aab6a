//! Feedback subscriber registry
//!
//! Distinct from the monitor table: the broadcast infrastructure reports its
//! own echo total (and any error) for a fingerprint at most once, and every
//! subscriber waiting on that fingerprint hears about it exactly once. The
//! whole subscriber list is dropped on delivery; the channel is single-shot
//! per fingerprint.

use crate::fingerprint::TxFingerprint;
use crate::sink::FeedbackSink;
use dashmap::DashMap;
use std::sync::Arc;

/// Per-fingerprint lists of pending feedback subscribers
pub struct FeedbackRegistry {
    subscribers: DashMap<TxFingerprint, Vec<Arc<dyn FeedbackSink>>>,
}

impl FeedbackRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Register a subscriber for a fingerprint. Any number of subscribers
    /// may wait on the same fingerprint.
    pub fn subscribe(&self, fingerprint: TxFingerprint, sink: Arc<dyn FeedbackSink>) {
        self.subscribers.entry(fingerprint).or_default().push(sink);
    }

    /// Deliver a feedback report.
    ///
    /// Every pending subscriber for the fingerprint is invoked exactly once,
    /// then the list is forgotten; a later report for the same fingerprint
    /// reaches nobody unless new subscribers registered in between. Returns
    /// how many subscribers were notified.
    pub fn dispatch(&self, fingerprint: &TxFingerprint, echo_total: u64, error: Option<&str>) -> usize {
        // Removing before invoking keeps a racing second report from ever
        // seeing the same subscriber list
        let Some((_, sinks)) = self.subscribers.remove(fingerprint) else {
            return 0;
        };
        for sink in &sinks {
            sink.notify(echo_total, error);
        }
        sinks.len()
    }

    /// Number of fingerprints with pending subscribers
    pub fn pending(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for FeedbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
