//! Refresh and on-demand fetch counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Refresher metrics.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    /// Completed full refresh passes.
    pub passes_completed: AtomicU64,
    /// Pairs written by full refreshes.
    pub pairs_refreshed: AtomicU64,
    /// Pairs that failed in full refreshes.
    pub pairs_failed: AtomicU64,
    /// On-demand fetches that reached the source.
    pub on_demand_fetches: AtomicU64,
    /// On-demand fetches that failed.
    pub on_demand_failures: AtomicU64,
    /// Duration of the last completed pass, in milliseconds.
    pub last_pass_ms: AtomicU64,
}

impl RefreshMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished full refresh pass.
    pub fn pass_completed(&self, succeeded: usize, failed: usize, elapsed: Duration) {
        self.passes_completed.fetch_add(1, Ordering::Relaxed);
        self.pairs_refreshed
            .fetch_add(succeeded as u64, Ordering::Relaxed);
        self.pairs_failed.fetch_add(failed as u64, Ordering::Relaxed);
        self.last_pass_ms
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record an on-demand fetch outcome.
    pub fn on_demand(&self, ok: bool) {
        self.on_demand_fetches.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.on_demand_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> RefreshMetricsSnapshot {
        RefreshMetricsSnapshot {
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            pairs_refreshed: self.pairs_refreshed.load(Ordering::Relaxed),
            pairs_failed: self.pairs_failed.load(Ordering::Relaxed),
            on_demand_fetches: self.on_demand_fetches.load(Ordering::Relaxed),
            on_demand_failures: self.on_demand_failures.load(Ordering::Relaxed),
            last_pass_ms: self.last_pass_ms.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RefreshMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshMetricsSnapshot {
    pub passes_completed: u64,
    pub pairs_refreshed: u64,
    pub pairs_failed: u64,
    pub on_demand_fetches: u64,
    pub on_demand_failures: u64,
    pub last_pass_ms: u64,
}
