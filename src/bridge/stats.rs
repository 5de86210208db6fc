//! Counters kept by the bridge.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic accept/suppress counters.
#[derive(Debug, Default)]
pub struct BridgeStats {
    accepted: AtomicU64,
    suppressed: AtomicU64,
}

impl BridgeStats {
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of the bridge counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Events that passed the rate policy.
    pub accepted: u64,
    /// Events dropped as duplicates or too frequent.
    pub suppressed: u64,
    /// Accepted messages the transport took.
    pub delivered: u64,
    /// Accepted messages the transport refused.
    pub transport_failures: u64,
}
