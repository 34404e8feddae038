//! Ratekeeper FX Core
//!
//! Pull-through, time-bounded cache of currency-pair exchange rates.
//!
//! # Features
//!
//! - Rate cache with TTL expiry and a stoppable background sweep
//! - Periodic full-matrix refresh with per-base failure isolation
//! - Synchronous on-demand fetch for cache misses
//! - HTTP rate source for exchangerate-api.com
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratekeeper_common::{CurrencyPair, CurrencySet};
//! use ratekeeper_fx::{RateCache, RateCacheConfig, RateRefresher, RefresherConfig, RateService};
//!
//! let (cache, sweeper) = RateCache::spawn(RateCacheConfig::default());
//! let refresher = Arc::new(RateRefresher::new(source, cache, CurrencySet::default(), RefresherConfig::default()));
//! refresher.start();
//!
//! let service = RateService::new(refresher.clone());
//! let rate = service.latest_rate(&CurrencyPair::new("USD", "INR")).await?;
//!
//! refresher.stop().await;
//! sweeper.shutdown().await;
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod metrics;
pub mod refresher;
pub mod service;
pub mod source;

pub use cache::{CacheStats, RateCache, RateCacheConfig, SweeperHandle};
pub use client::{ApiClientConfig, ExchangeRateApiClient};
pub use error::{FxError, FxResult};
pub use metrics::RefreshMetricsSnapshot;
pub use refresher::{RateRefresher, RefreshReport, RefresherConfig, RefresherState};
pub use service::{ConversionRequest, ConversionResult, RateService, ServiceHealth};
pub use source::{RateSource, RateTable};
