//! Time utilities and timing defaults for Ratekeeper.

use chrono::{DateTime, NaiveDate, Utc};

/// Timing defaults.
pub mod constants {
    use std::time::Duration;

    /// Cached rate lifetime (1 hour).
    pub const fn cache_ttl() -> Duration {
        Duration::from_secs(60 * 60)
    }

    /// Interval between expired-entry sweeps (5 minutes).
    pub const fn sweep_interval() -> Duration {
        Duration::from_secs(5 * 60)
    }

    /// Interval between full-matrix refreshes (1 hour).
    pub const fn fetch_interval() -> Duration {
        Duration::from_secs(60 * 60)
    }

    /// Upstream request timeout (10 seconds).
    pub const fn request_timeout() -> Duration {
        Duration::from_secs(10)
    }

    /// Longest accepted TTL or interval (365 days).
    pub const fn max_interval() -> Duration {
        Duration::from_secs(365 * 24 * 60 * 60)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Today's date in UTC.
pub fn today() -> NaiveDate {
    now().date_naive()
}
