//! Last known broadcast-network node count
//!
//! Written by the infrastructure listener, read lock-free by status queries.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide count of connected broadcast fan-out nodes
pub struct NodeStatus {
    nodes: AtomicU64,
}

impl NodeStatus {
    pub fn new() -> Self {
        Self {
            nodes: AtomicU64::new(0),
        }
    }

    /// Record a node count report. Returns true when the value changed;
    /// repeated identical reports are no-ops for the caller to skip.
    pub fn update(&self, count: u64) -> bool {
        self.nodes.swap(count, Ordering::SeqCst) != count
    }

    pub fn get(&self) -> u64 {
        self.nodes.load(Ordering::SeqCst)
    }
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_detection() {
        let status = NodeStatus::new();
        assert_eq!(status.get(), 0);

        assert!(status.update(5));
        assert_eq!(status.get(), 5);

        // Same value again: not a change
        assert!(!status.update(5));

        assert!(status.update(7));
        assert_eq!(status.get(), 7);
    }
}
