//! Radar core - correlates broadcasts with the network events they cause
//!
//! A caller broadcasts a transaction and registers it here; monitoring peers
//! echo the transaction back and the table turns each echo into a propagation
//! ratio delivered to the caller's sink. A separate registry carries
//! single-shot feedback reports from the broadcast infrastructure itself, and
//! an atomic holds the infrastructure's last reported node count.
//!
//! This crate does no I/O; the listeners in `radar-net` drive it.

pub mod feedback;
pub mod fingerprint;
pub mod monitor;
pub mod sink;
pub mod status;

pub use feedback::FeedbackRegistry;
pub use fingerprint::{TxFingerprint, FINGERPRINT_LEN};
pub use monitor::MonitorTable;
pub use sink::{ChannelRatioSink, FeedbackSink, RatioSink, RatioUpdate};
pub use status::NodeStatus;

use std::time::Duration;

/// Monitoring peers expected to echo a fully propagated transaction
pub const DEFAULT_RADAR_HOSTS: u64 = 20;

/// How long an unanswered monitor entry lives before eviction
pub const DEFAULT_MONITOR_TTL: Duration = Duration::from_secs(600);

/// Radar configuration
#[derive(Clone, Debug)]
pub struct RadarConfig {
    /// Echo count at which a transaction counts as fully propagated
    pub radar_hosts: u64,
    /// Age after which a monitor entry is evicted
    pub monitor_ttl: Duration,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            radar_hosts: DEFAULT_RADAR_HOSTS,
            monitor_ttl: DEFAULT_MONITOR_TTL,
        }
    }
}

/// Shared state of one radar instance.
///
/// Everything the listeners and the public API touch lives here; separate
/// instances are fully isolated, which is what the tests rely on.
pub struct RadarContext {
    /// In-flight broadcasts awaiting peer echoes
    pub monitors: MonitorTable,
    /// Pending single-shot feedback subscribers
    pub feedback: FeedbackRegistry,
    /// Last reported broadcast-network node count
    pub nodes: NodeStatus,
}

impl RadarContext {
    pub fn new(config: RadarConfig) -> Self {
        Self {
            monitors: MonitorTable::new(config.radar_hosts, config.monitor_ttl),
            feedback: FeedbackRegistry::new(),
            nodes: NodeStatus::new(),
        }
    }
}

impl Default for RadarContext {
    fn default() -> Self {
        Self::new(RadarConfig::default())
    }
}
