//! Cache-first rate lookups and conversions.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use ratekeeper_common::{time, CurrencyPair, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cache::CacheStats;
use crate::error::FxResult;
use crate::metrics::RefreshMetricsSnapshot;
use crate::refresher::RateRefresher;

/// Request to convert an amount between two currencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub pair: CurrencyPair,
    pub amount: f64,
    /// Convert at this date's rate instead of the latest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl ConversionRequest {
    /// Convert at the latest rate.
    pub fn new(pair: CurrencyPair, amount: f64) -> Self {
        Self {
            pair,
            amount,
            date: None,
        }
    }

    /// Convert at the rate for `date`.
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Represents a completed currency conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub pair: CurrencyPair,
    pub amount: f64,
    pub converted_amount: f64,
    pub rate: f64,
    /// Requested date, or today for latest-rate conversions.
    pub date: NaiveDate,
}

/// Service health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    pub refresher_running: bool,
    pub supported_currencies: Vec<String>,
    pub cache_stats: CacheStats,
    pub refresh_metrics: RefreshMetricsSnapshot,
    pub timestamp: Timestamp,
}

/// Answers rate queries from the cache, falling back to the refresher's
/// on-demand path on a miss.
pub struct RateService {
    refresher: Arc<RateRefresher>,
}

impl RateService {
    pub fn new(refresher: Arc<RateRefresher>) -> Self {
        Self { refresher }
    }

    /// Latest rate for a pair.
    #[instrument(skip(self, pair), fields(pair = %pair))]
    pub async fn latest_rate(&self, pair: &CurrencyPair) -> FxResult<f64> {
        if pair.is_identity() {
            return Ok(1.0);
        }

        if let Some(rate) = self.refresher.cache().get(pair, None) {
            debug!("Using cached rate");
            return Ok(rate);
        }

        self.refresher.fetch_rate_on_demand(pair).await
    }

    /// Rate for a pair on `date`.
    #[instrument(skip(self, pair), fields(pair = %pair))]
    pub async fn historical_rate(&self, pair: &CurrencyPair, date: NaiveDate) -> FxResult<f64> {
        if pair.is_identity() {
            return Ok(1.0);
        }

        if let Some(rate) = self.refresher.cache().get(pair, Some(date)) {
            debug!("Using cached historical rate");
            return Ok(rate);
        }

        self.refresher
            .fetch_historical_rate_on_demand(pair, date)
            .await
    }

    /// Convert an amount at the latest rate or the requested date's rate.
    pub async fn convert(&self, request: ConversionRequest) -> FxResult<ConversionResult> {
        let (rate, date) = match request.date {
            Some(date) => (self.historical_rate(&request.pair, date).await?, date),
            None => (self.latest_rate(&request.pair).await?, time::today()),
        };

        Ok(ConversionResult {
            pair: request.pair,
            amount: request.amount,
            converted_amount: request.amount * rate,
            rate,
            date,
        })
    }

    /// Rates for a pair across several dates. Dates whose lookup fails are
    /// left out of the result.
    pub async fn historical_rates(
        &self,
        pair: &CurrencyPair,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> BTreeMap<NaiveDate, f64> {
        let mut rates = BTreeMap::new();

        for date in dates {
            match self.historical_rate(pair, date).await {
                Ok(rate) => {
                    rates.insert(date, rate);
                }
                Err(e) => {
                    debug!(pair = %pair, %date, error = %e, "Skipping date without rate");
                }
            }
        }

        rates
    }

    pub fn supported_currencies(&self) -> Vec<String> {
        self.refresher.currencies().codes()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.refresher.cache_stats()
    }

    pub fn health(&self) -> ServiceHealth {
        ServiceHealth {
            status: "healthy".to_string(),
            refresher_running: self.refresher.is_running(),
            supported_currencies: self.supported_currencies(),
            cache_stats: self.cache_stats(),
            refresh_metrics: self.refresher.metrics(),
            timestamp: time::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RateCache;
    use crate::error::FxError;
    use crate::refresher::RefresherConfig;
    use crate::source::MockRateSource;
    use ratekeeper_common::{Currency, CurrencySet};
    use std::time::Duration;

    fn setup() -> (Arc<MockRateSource>, RateService) {
        let source = Arc::new(MockRateSource::new("test"));
        source.set_rate("USD", "INR", 83.5);
        source.set_rate("USD", "EUR", 0.92);

        let cache = Arc::new(RateCache::new(Duration::from_secs(3600)));
        let refresher = Arc::new(RateRefresher::new(
            source.clone(),
            cache,
            CurrencySet::new(vec![Currency::usd(), Currency::inr(), Currency::eur()]),
            RefresherConfig::default(),
        ));

        (source, RateService::new(refresher))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_latest_rate_pulls_through_once() {
        let (source, service) = setup();
        let pair = CurrencyPair::new("USD", "INR");

        assert_eq!(service.latest_rate(&pair).await.unwrap(), 83.5);
        assert_eq!(service.latest_rate(&pair).await.unwrap(), 83.5);

        assert_eq!(source.latest_calls(), 1);
        assert_eq!(service.cache_stats().total_items, 1);
    }

    #[tokio::test]
    async fn test_identity_pair_is_one() {
        let (source, service) = setup();

        let rate = service.latest_rate(&CurrencyPair::new("GBP", "GBP")).await.unwrap();

        assert_eq!(rate, 1.0);
        assert_eq!(source.latest_calls(), 0);
    }

    #[tokio::test]
    async fn test_convert_latest() {
        let (_, service) = setup();

        let result = service
            .convert(ConversionRequest::new(CurrencyPair::new("USD", "EUR"), 100.0))
            .await
            .unwrap();

        assert_eq!(result.rate, 0.92);
        assert!((result.converted_amount - 92.0).abs() < 1e-9);
        assert_eq!(result.date, time::today());
    }

    #[tokio::test]
    async fn test_convert_historical() {
        let (source, service) = setup();
        source.set_historical_rate("USD", "INR", date(2023, 1, 1), 82.0);

        let request =
            ConversionRequest::new(CurrencyPair::new("USD", "INR"), 10.0).on(date(2023, 1, 1));
        let result = service.convert(request).await.unwrap();

        assert_eq!(result.converted_amount, 820.0);
        assert_eq!(result.date, date(2023, 1, 1));
    }

    #[tokio::test]
    async fn test_convert_propagates_missing_rate() {
        let (_, service) = setup();

        let result = service
            .convert(ConversionRequest::new(CurrencyPair::new("USD", "JPY"), 5.0))
            .await;

        assert!(matches!(result, Err(FxError::RateNotFound { .. })));
    }

    #[tokio::test]
    async fn test_historical_rates_skip_missing_dates() {
        let (source, service) = setup();
        let pair = CurrencyPair::new("USD", "INR");
        source.set_historical_rate("USD", "INR", date(2023, 1, 1), 82.0);
        source.set_historical_rate("USD", "INR", date(2023, 1, 3), 82.4);

        let rates = service
            .historical_rates(&pair, [date(2023, 1, 1), date(2023, 1, 2), date(2023, 1, 3)])
            .await;

        assert_eq!(rates.len(), 2);
        assert_eq!(rates.get(&date(2023, 1, 3)), Some(&82.4));
        assert!(!rates.contains_key(&date(2023, 1, 2)));
    }

    #[tokio::test]
    async fn test_health_report() {
        let (_, service) = setup();
        service
            .latest_rate(&CurrencyPair::new("USD", "EUR"))
            .await
            .unwrap();

        let health = service.health();

        assert_eq!(health.status, "healthy");
        assert!(!health.refresher_running);
        assert_eq!(health.supported_currencies, vec!["EUR", "INR", "USD"]);
        assert_eq!(health.cache_stats.valid_items, 1);
        assert_eq!(health.refresh_metrics.on_demand_fetches, 1);

        let json = serde_json::to_value(&health).unwrap();
        assert!(json["timestamp"].is_string());
    }
}
