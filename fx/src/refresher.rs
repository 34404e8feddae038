//! Background refresh of the full currency matrix and on-demand fetches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use parking_lot::Mutex;
use ratekeeper_common::{constants, Currency, CurrencyPair, CurrencySet};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{CacheStats, RateCache};
use crate::error::{FxError, FxResult};
use crate::metrics::{RefreshMetrics, RefreshMetricsSnapshot};
use crate::source::{RateSource, RateTable};

/// Configuration for the refresher.
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Time between full refresh passes.
    pub fetch_interval: Duration,
    /// Cap on concurrent source calls within one pass. `None` is unbounded.
    pub max_concurrent_fetches: Option<usize>,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            fetch_interval: constants::fetch_interval(),
            max_concurrent_fetches: None,
        }
    }
}

impl RefresherConfig {
    /// Validate configuration.
    pub fn validate(&self) -> FxResult<()> {
        if self.fetch_interval.is_zero() {
            return Err(FxError::InvalidConfig(
                "Fetch interval cannot be 0".to_string(),
            ));
        }

        if self.fetch_interval > constants::max_interval() {
            return Err(FxError::InvalidConfig(format!(
                "Fetch interval cannot exceed {}s",
                constants::max_interval().as_secs()
            )));
        }

        match self.max_concurrent_fetches {
            Some(0) => {
                return Err(FxError::InvalidConfig(
                    "Max concurrent fetches cannot be 0".to_string(),
                ));
            }
            Some(n) if n > Semaphore::MAX_PERMITS => {
                return Err(FxError::InvalidConfig(format!(
                    "Max concurrent fetches cannot exceed {}",
                    Semaphore::MAX_PERMITS
                )));
            }
            _ => {}
        }

        Ok(())
    }
}

/// Refresher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    Stopped,
    Running,
}

/// Outcome of one full refresh pass.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    /// Identifies the pass in logs.
    pub pass_id: Uuid,
    /// Pairs written to the cache, self-rates included.
    pub succeeded: usize,
    /// Pairs lost to failed source calls.
    pub failed_pairs: Vec<CurrencyPair>,
    pub elapsed: Duration,
}

impl RefreshReport {
    pub fn failed(&self) -> usize {
        self.failed_pairs.len()
    }
}

/// State shared with spawned tasks.
struct Shared {
    source: Arc<dyn RateSource>,
    cache: Arc<RateCache>,
    currencies: CurrencySet,
    config: RefresherConfig,
    metrics: RefreshMetrics,
}

impl Shared {
    /// Fetch every base in the currency set concurrently and write the results.
    ///
    /// A failing base loses only its own row; siblings are unaffected and
    /// nothing is retried until the next pass.
    async fn refresh_all(&self) -> RefreshReport {
        let pass_id = Uuid::now_v7();
        let start = Instant::now();
        info!(
            %pass_id,
            source = self.source.name(),
            bases = self.currencies.len(),
            "Fetching latest exchange rates"
        );

        let limiter = self
            .config
            .max_concurrent_fetches
            .map(|n| Arc::new(Semaphore::new(n)));

        let mut tasks = JoinSet::new();
        for base in self.currencies.iter().cloned() {
            let source = self.source.clone();
            let limiter = limiter.clone();

            tasks.spawn(async move {
                // Held for the duration of the call.
                let _permit = match limiter {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let result = source.latest_rates(&base).await;
                (base, result)
            });
        }

        let mut succeeded = 0;
        let mut failed_pairs = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((base, Ok(table))) => {
                    succeeded += self.store_base(&base, &table);
                }
                Ok((base, Err(e))) => {
                    let lost = self.pairs_for_failed_base(&base);
                    warn!(
                        %pass_id,
                        base = %base,
                        failed_pairs = lost.len(),
                        code = e.error_code(),
                        error = %e,
                        "Failed to fetch rates for base currency"
                    );
                    failed_pairs.extend(lost);
                }
                Err(e) => {
                    error!(%pass_id, error = %e, "Refresh task aborted");
                }
            }
        }

        let elapsed = start.elapsed();
        self.metrics
            .pass_completed(succeeded, failed_pairs.len(), elapsed);

        info!(
            %pass_id,
            succeeded,
            failed = failed_pairs.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Rate refresh completed"
        );

        RefreshReport {
            pass_id,
            succeeded,
            failed_pairs,
            elapsed,
        }
    }

    /// Write one base's supported quotes plus its self-rate. Returns pairs written.
    fn store_base(&self, base: &Currency, table: &RateTable) -> usize {
        let mut written = 0;

        for (quote, rate) in table {
            if quote != base && self.currencies.contains(quote) {
                self.cache
                    .set(&CurrencyPair::new(base.clone(), quote.clone()), None, *rate);
                written += 1;
            }
        }

        self.cache
            .set(&CurrencyPair::new(base.clone(), base.clone()), None, 1.0);

        written + 1
    }

    fn pairs_for_failed_base(&self, base: &Currency) -> Vec<CurrencyPair> {
        self.currencies
            .iter()
            .filter(|quote| *quote != base)
            .map(|quote| CurrencyPair::new(base.clone(), quote.clone()))
            .collect()
    }
}

/// Handles of the tasks started by [`RateRefresher::start`].
struct RunningTasks {
    shutdown_tx: watch::Sender<bool>,
    initial: JoinHandle<()>,
    periodic: JoinHandle<()>,
}

/// Keeps the cache warm for a fixed currency set and serves cache misses.
///
/// `start` runs one refresh immediately and then one per `fetch_interval`.
/// `stop` waits for the loop and any in-flight pass to finish. Dropping a
/// running refresher signals its loop to exit without waiting.
pub struct RateRefresher {
    shared: Arc<Shared>,
    tasks: Mutex<Option<RunningTasks>>,
}

impl RateRefresher {
    /// Create a stopped refresher.
    pub fn new(
        source: Arc<dyn RateSource>,
        cache: Arc<RateCache>,
        currencies: CurrencySet,
        config: RefresherConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                cache,
                currencies,
                config,
                metrics: RefreshMetrics::new(),
            }),
            tasks: Mutex::new(None),
        }
    }

    /// Start refreshing. No-op when already running.
    ///
    /// Must be called from within a Tokio runtime. The loop panics on a zero
    /// `fetch_interval`; validate the config first.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if tasks.is_some() {
            debug!("Rate refresher already running");
            return;
        }

        info!(
            currencies = ?self.shared.currencies.codes(),
            interval_secs = self.shared.config.fetch_interval.as_secs_f64(),
            "Starting rate refresher"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = self.shared.clone();
        let initial = tokio::spawn(async move {
            shared.refresh_all().await;
        });
        let periodic = tokio::spawn(run_refresh_loop(self.shared.clone(), shutdown_rx));

        *tasks = Some(RunningTasks {
            shutdown_tx,
            initial,
            periodic,
        });
    }

    /// Stop refreshing and wait until the loop has exited and any in-flight
    /// pass has returned. No-op when already stopped.
    pub async fn stop(&self) {
        let running = self.tasks.lock().take();
        let Some(running) = running else {
            return;
        };

        info!("Stopping rate refresher");
        let _ = running.shutdown_tx.send(true);

        for (task, handle) in [
            ("initial refresh", running.initial),
            ("refresh loop", running.periodic),
        ] {
            if let Err(e) = handle.await {
                warn!(task, error = %e, "Refresher task ended abnormally");
            }
        }

        info!("Rate refresher stopped");
    }

    /// Run one full refresh pass now, outside the schedule.
    pub async fn refresh_now(&self) -> RefreshReport {
        self.shared.refresh_all().await
    }

    pub fn is_running(&self) -> bool {
        self.tasks.lock().is_some()
    }

    pub fn state(&self) -> RefresherState {
        if self.is_running() {
            RefresherState::Running
        } else {
            RefresherState::Stopped
        }
    }

    /// Fetch the latest rate for one pair from the source and cache it.
    ///
    /// Failures are returned unchanged and nothing is cached for them.
    #[instrument(skip(self, pair), fields(pair = %pair))]
    pub async fn fetch_rate_on_demand(&self, pair: &CurrencyPair) -> FxResult<f64> {
        if pair.is_identity() {
            return Ok(1.0);
        }

        info!("Fetching on-demand rate");
        let result = self.shared.source.rate_for_pair(pair).await;
        self.shared.metrics.on_demand(result.is_ok());

        let rate = result?;
        self.shared.cache.set(pair, None, rate);
        Ok(rate)
    }

    /// Fetch the rate for one pair on `date` from the source and cache it.
    #[instrument(skip(self, pair), fields(pair = %pair))]
    pub async fn fetch_historical_rate_on_demand(
        &self,
        pair: &CurrencyPair,
        date: NaiveDate,
    ) -> FxResult<f64> {
        if pair.is_identity() {
            return Ok(1.0);
        }

        info!("Fetching historical rate");
        let result = self.shared.source.historical_rate_for_pair(pair, date).await;
        self.shared.metrics.on_demand(result.is_ok());

        let rate = result?;
        self.shared.cache.set(pair, Some(date), rate);
        Ok(rate)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.shared.cache.stats()
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.shared.cache
    }

    pub fn currencies(&self) -> &CurrencySet {
        &self.shared.currencies
    }

    pub fn metrics(&self) -> RefreshMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

/// Refresh on every tick until shutdown is signalled.
///
/// A pass always runs to completion; shutdown is only observed between
/// passes. Ticks missed during a slow pass are delayed, not bunched.
async fn run_refresh_loop(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    let period = shared.config.fetch_interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                shared.refresh_all().await;
            }
        }
    }

    debug!("Rate refresh loop exited");
}
