//! Wiring of cache, refresher and service for one daemon instance.

use std::sync::Arc;

use tracing::info;

use ratekeeper_fx::{
    RateCache, RateRefresher, RateService, RateSource, ServiceHealth, SweeperHandle,
};

use crate::config::DaemonConfig;

/// A running Ratekeeper instance.
pub struct Ratekeeper {
    refresher: Arc<RateRefresher>,
    service: Arc<RateService>,
    sweeper: SweeperHandle,
}

impl Ratekeeper {
    /// Build the cache and refresher over `source` and start refreshing.
    pub fn start(config: &DaemonConfig, source: Arc<dyn RateSource>) -> Self {
        let (cache, sweeper) = RateCache::spawn(config.cache.clone());

        let refresher = Arc::new(RateRefresher::new(
            source,
            cache,
            config.currencies.clone(),
            config.refresher.clone(),
        ));
        refresher.start();

        let service = Arc::new(RateService::new(refresher.clone()));

        Self {
            refresher,
            service,
            sweeper,
        }
    }

    pub fn service(&self) -> &Arc<RateService> {
        &self.service
    }

    /// Stop the refresher, then the sweep, waiting for both. Returns the final
    /// health report.
    pub async fn shutdown(self) -> ServiceHealth {
        self.refresher.stop().await;
        self.sweeper.shutdown().await;

        let health = self.service.health();
        info!(
            cache_items = health.cache_stats.total_items,
            passes = health.refresh_metrics.passes_completed,
            "Ratekeeper shut down"
        );
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratekeeper_common::{Currency, CurrencyPair, CurrencySet};
    use ratekeeper_fx::source::MockRateSource;
    use std::time::Duration;

    fn setup_source() -> Arc<MockRateSource> {
        let source = Arc::new(MockRateSource::new("test"));
        source.set_rate("USD", "GBP", 0.79);
        source.set_rate("GBP", "USD", 1.27);
        source
    }

    fn test_config() -> DaemonConfig {
        DaemonConfig {
            currencies: CurrencySet::new(vec![Currency::usd(), Currency::gbp()]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let source = setup_source();
        let app = Ratekeeper::start(&test_config(), source.clone());

        assert!(app.service().health().refresher_running);

        tokio::time::timeout(Duration::from_secs(2), async {
            while app.service().cache_stats().total_items < 4 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("initial refresh did not land");

        let rate = app
            .service()
            .latest_rate(&CurrencyPair::new("GBP", "USD"))
            .await
            .unwrap();
        assert_eq!(rate, 1.27);
        // Served from cache, no extra source call.
        assert_eq!(source.latest_calls(), 2);

        let health = app.shutdown().await;
        assert!(!health.refresher_running);
        assert_eq!(health.refresh_metrics.passes_completed, 1);
        assert_eq!(health.cache_stats.total_items, 4);
    }
}
