//! Monitor table - in-flight broadcasts awaiting peer echoes
//!
//! Maps a transaction fingerprint to its monitoring state. The echo listener
//! drives `record_echo` while caller tasks register new broadcasts; the
//! increment, the post-increment read, and the sink grab happen as one unit
//! under the key's shard lock so near-simultaneous echoes can never observe
//! a stale count.

use crate::fingerprint::TxFingerprint;
use crate::sink::RatioSink;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monitoring state for one broadcast transaction
struct MonitorEntry {
    /// Number of peer echoes observed so far. Only ever incremented.
    echoes: u64,
    /// Notification target, owned by the entry since registration
    sink: Arc<dyn RatioSink>,
    /// When the entry was registered, for eviction
    registered_at: Instant,
}

/// Thread-safe table of in-flight broadcasts
pub struct MonitorTable {
    entries: DashMap<TxFingerprint, MonitorEntry>,
    /// Monitoring peers expected to echo a fully propagated transaction
    radar_hosts: u64,
    /// Age after which an entry is dropped by `evict_expired`
    ttl: Duration,
}

impl MonitorTable {
    pub fn new(radar_hosts: u64, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            // A target of zero would make every ratio meaningless
            radar_hosts: radar_hosts.max(1),
            ttl,
        }
    }

    /// Register interest in a fingerprint.
    ///
    /// The echo count starts at zero. Registering a fingerprint that is
    /// already present replaces the old entry wholesale: last registration
    /// wins, stale already-notified state is discarded.
    pub fn monitor(&self, fingerprint: TxFingerprint, sink: Arc<dyn RatioSink>) {
        self.entries.insert(
            fingerprint,
            MonitorEntry {
                echoes: 0,
                sink,
                registered_at: Instant::now(),
            },
        );
    }

    /// Drop a fingerprint from the table. Returns whether it was present.
    pub fn unmonitor(&self, fingerprint: &TxFingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    /// Record one peer echo and notify the registered sink.
    ///
    /// Returns the delivered ratio, or None when the fingerprint is not
    /// monitored (a transaction this process did not broadcast, or one
    /// already removed). Duplicate echoes beyond the radar host target are
    /// clamped to 1.0, never an error.
    pub fn record_echo(&self, fingerprint: &TxFingerprint) -> Option<f64> {
        let (ratio, sink) = {
            let mut entry = self.entries.get_mut(fingerprint)?;
            entry.echoes += 1;
            let ratio = (entry.echoes as f64 / self.radar_hosts as f64).min(1.0);
            (ratio, entry.sink.clone())
        };
        // Invoked after the shard lock is released so a slow sink cannot
        // stall echoes for other fingerprints in the same shard
        sink.notify(ratio);
        Some(ratio)
    }

    /// Drop entries older than the TTL. Returns how many were evicted.
    pub fn evict_expired(&self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.registered_at.elapsed() < ttl);
        before - self.entries.len()
    }

    pub fn contains(&self, fingerprint: &TxFingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn radar_hosts(&self) -> u64 {
        self.radar_hosts
    }
}
