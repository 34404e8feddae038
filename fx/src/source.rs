//! Rate source trait and test double.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use ratekeeper_common::{Currency, CurrencyPair};

use crate::error::{FxError, FxResult};

/// Quote currency to rate, for a single base currency.
pub type RateTable = HashMap<Currency, f64>;

/// Upstream supplier of exchange rates.
///
/// Implementations own their transport, including any timeouts.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Latest rates for every quote currency the source knows, against `base`.
    async fn latest_rates(&self, base: &Currency) -> FxResult<RateTable>;

    /// Rates for `base` as of `date`.
    async fn historical_rates(&self, base: &Currency, date: NaiveDate) -> FxResult<RateTable>;

    /// Latest rate for a single pair.
    async fn rate_for_pair(&self, pair: &CurrencyPair) -> FxResult<f64> {
        if pair.is_identity() {
            return Ok(1.0);
        }

        let rates = self.latest_rates(&pair.base).await?;
        rates
            .get(&pair.quote)
            .copied()
            .ok_or_else(|| FxError::RateNotFound {
                pair: pair.clone(),
                date: None,
            })
    }

    /// Rate for a single pair as of `date`.
    async fn historical_rate_for_pair(
        &self,
        pair: &CurrencyPair,
        date: NaiveDate,
    ) -> FxResult<f64> {
        if pair.is_identity() {
            return Ok(1.0);
        }

        let rates = self.historical_rates(&pair.base, date).await?;
        rates
            .get(&pair.quote)
            .copied()
            .ok_or_else(|| FxError::RateNotFound {
                pair: pair.clone(),
                date: Some(date),
            })
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockRateSource;

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted rate source for tests.
    pub struct MockRateSource {
        name: String,
        latest: DashMap<Currency, RateTable>,
        historical: DashMap<(Currency, NaiveDate), RateTable>,
        failing: DashMap<Currency, FxError>,
        latency: parking_lot::RwLock<Duration>,
        latest_calls: AtomicUsize,
        historical_calls: AtomicUsize,
    }

    impl MockRateSource {
        /// Create a new mock source.
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                latest: DashMap::new(),
                historical: DashMap::new(),
                failing: DashMap::new(),
                latency: parking_lot::RwLock::new(Duration::ZERO),
                latest_calls: AtomicUsize::new(0),
                historical_calls: AtomicUsize::new(0),
            }
        }

        /// Set the latest rate for a currency pair.
        pub fn set_rate(&self, base: &str, quote: &str, rate: f64) {
            self.latest
                .entry(Currency::new(base))
                .or_default()
                .insert(Currency::new(quote), rate);
        }

        /// Set a historical rate for a currency pair.
        pub fn set_historical_rate(&self, base: &str, quote: &str, date: NaiveDate, rate: f64) {
            self.historical
                .entry((Currency::new(base), date))
                .or_default()
                .insert(Currency::new(quote), rate);
        }

        /// Make every request for `base` fail with `error`.
        pub fn fail_base(&self, base: &str, error: FxError) {
            self.failing.insert(Currency::new(base), error);
        }

        /// Stop failing requests for `base`.
        pub fn recover_base(&self, base: &str) {
            self.failing.remove(&Currency::new(base));
        }

        /// Delay every response by `latency`.
        pub fn set_latency(&self, latency: Duration) {
            *self.latency.write() = latency;
        }

        /// Number of `latest_rates` calls served so far.
        pub fn latest_calls(&self) -> usize {
            self.latest_calls.load(Ordering::SeqCst)
        }

        /// Number of `historical_rates` calls served so far.
        pub fn historical_calls(&self) -> usize {
            self.historical_calls.load(Ordering::SeqCst)
        }

        async fn simulate_latency(&self) {
            let latency = *self.latency.read();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
        }

        fn check_failure(&self, base: &Currency) -> FxResult<()> {
            match self.failing.get(base) {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl RateSource for MockRateSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn latest_rates(&self, base: &Currency) -> FxResult<RateTable> {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate_latency().await;
            self.check_failure(base)?;

            self.latest
                .get(base)
                .map(|t| t.clone())
                .filter(|t| !t.is_empty())
                .ok_or_else(|| FxError::EmptyResponse(base.clone()))
        }

        async fn historical_rates(
            &self,
            base: &Currency,
            date: NaiveDate,
        ) -> FxResult<RateTable> {
            self.historical_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate_latency().await;
            self.check_failure(base)?;

            self.historical
                .get(&(base.clone(), date))
                .map(|t| t.clone())
                .ok_or_else(|| FxError::NotSupported(format!("no history for {base} on {date}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_latest() {
        let source = MockRateSource::new("test");
        source.set_rate("USD", "EUR", 0.92);

        let rates = source.latest_rates(&Currency::usd()).await.unwrap();

        assert_eq!(rates.get(&Currency::eur()), Some(&0.92));
        assert_eq!(source.latest_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_source_empty_response() {
        let source = MockRateSource::new("test");

        let result = source.latest_rates(&Currency::gbp()).await;

        assert!(matches!(result, Err(FxError::EmptyResponse(_))));
    }

    #[tokio::test]
    async fn test_rate_for_pair() {
        let source = MockRateSource::new("test");
        source.set_rate("USD", "INR", 83.5);

        let pair = CurrencyPair::new("USD", "INR");
        assert_eq!(source.rate_for_pair(&pair).await.unwrap(), 83.5);
    }

    #[tokio::test]
    async fn test_rate_for_identity_pair_skips_source() {
        let source = MockRateSource::new("test");

        let rate = source.rate_for_pair(&CurrencyPair::new("JPY", "JPY")).await.unwrap();

        assert_eq!(rate, 1.0);
        assert_eq!(source.latest_calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_for_pair_missing_quote() {
        let source = MockRateSource::new("test");
        source.set_rate("USD", "EUR", 0.92);

        let result = source.rate_for_pair(&CurrencyPair::new("USD", "INR")).await;

        assert!(matches!(result, Err(FxError::RateNotFound { date: None, .. })));
    }

    #[tokio::test]
    async fn test_historical_rate_for_pair() {
        let source = MockRateSource::new("test");
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        source.set_historical_rate("USD", "INR", date, 82.0);

        let pair = CurrencyPair::new("USD", "INR");
        assert_eq!(source.historical_rate_for_pair(&pair, date).await.unwrap(), 82.0);

        let missing = source
            .historical_rate_for_pair(&CurrencyPair::new("USD", "GBP"), date)
            .await;
        assert!(matches!(
            missing,
            Err(FxError::RateNotFound { date: Some(_), .. })
        ));
    }

    #[tokio::test]
    async fn test_failing_base_propagates() {
        let source = MockRateSource::new("test");
        source.set_rate("EUR", "USD", 1.08);
        source.fail_base("EUR", FxError::fetch(&Currency::eur(), "status 503"));

        let result = source.rate_for_pair(&CurrencyPair::new("EUR", "USD")).await;
        assert!(matches!(result, Err(FxError::Fetch { .. })));

        source.recover_base("EUR");
        let rate = source.rate_for_pair(&CurrencyPair::new("EUR", "USD")).await.unwrap();
        assert_eq!(rate, 1.08);
    }
}
