//! HTTP rate source backed by the exchangerate-api.com v4 API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use ratekeeper_common::{constants, Currency};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{FxError, FxResult};
use crate::source::{RateSource, RateTable};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.exchangerate-api.com/v4";

/// Response body of `GET /latest/{base}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestRatesResponse {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time_last_updated: Option<i64>,
    #[serde(default)]
    pub rates: Option<HashMap<String, f64>>,
}

impl LatestRatesResponse {
    /// Convert into a rate table, failing when no rates were sent.
    pub fn into_table(self, base: &Currency) -> FxResult<RateTable> {
        match self.rates {
            Some(rates) if !rates.is_empty() => Ok(rates
                .into_iter()
                .map(|(code, rate)| (Currency::new(code), rate))
                .collect()),
            _ => Err(FxError::EmptyResponse(base.clone())),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: constants::request_timeout(),
        }
    }
}

/// [`RateSource`] over HTTP.
pub struct ExchangeRateApiClient {
    client: Client,
    base_url: String,
}

impl ExchangeRateApiClient {
    /// Build a client with its own connection pool.
    pub fn new(config: ApiClientConfig) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FxError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn latest_url(&self, base: &Currency) -> String {
        format!("{}/latest/{}", self.base_url, base.code())
    }
}

#[async_trait]
impl RateSource for ExchangeRateApiClient {
    fn name(&self) -> &str {
        "exchangerate-api"
    }

    async fn latest_rates(&self, base: &Currency) -> FxResult<RateTable> {
        let url = self.latest_url(base);
        debug!(url = %url, "Fetching latest rates");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FxError::fetch(base, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::fetch(base, format!("API returned status code {status}")));
        }

        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|e| FxError::fetch(base, format!("failed to decode response: {e}")))?;

        let table = body.into_table(base)?;
        debug!(base = %base, count = table.len(), "Fetched latest rates");
        Ok(table)
    }

    async fn historical_rates(&self, base: &Currency, date: NaiveDate) -> FxResult<RateTable> {
        // The free tier has no history endpoint.
        Err(FxError::NotSupported(format!(
            "historical rates for {base} on {date} need a paid exchangerate-api plan"
        )))
    }
}
