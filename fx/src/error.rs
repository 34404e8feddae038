//! FX error types.

use chrono::NaiveDate;
use ratekeeper_common::{Currency, CurrencyPair};
use thiserror::Error;

/// Errors that can occur while fetching or caching rates.
#[derive(Debug, Clone, Error)]
pub enum FxError {
    /// Transport, status or decode failure from the rate source.
    #[error("Failed to fetch rates for {base}: {reason}")]
    Fetch { base: Currency, reason: String },

    /// The source answered but carried no rates.
    #[error("Rate source returned no rates for {0}")]
    EmptyResponse(Currency),

    /// The source cannot serve this kind of request.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The quote currency is absent from an otherwise valid response.
    #[error("Rate not found for {pair}{}", date_suffix(.date))]
    RateNotFound {
        pair: CurrencyPair,
        date: Option<NaiveDate>,
    },

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FxError {
    /// Build a fetch error from anything printable.
    pub fn fetch(base: &Currency, reason: impl ToString) -> Self {
        FxError::Fetch {
            base: base.clone(),
            reason: reason.to_string(),
        }
    }

    /// Get error code for reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::Fetch { .. } => "FETCH_FAILED",
            FxError::EmptyResponse(_) => "EMPTY_RESPONSE",
            FxError::NotSupported(_) => "NOT_SUPPORTED",
            FxError::RateNotFound { .. } => "RATE_NOT_FOUND",
            FxError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

fn date_suffix(date: &Option<NaiveDate>) -> String {
    match date {
        Some(d) => format!(" on {d}"),
        None => String::new(),
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let pair = CurrencyPair::new("USD", "XYZ");
        let latest = FxError::RateNotFound {
            pair: pair.clone(),
            date: None,
        };
        assert_eq!(latest.to_string(), "Rate not found for USD/XYZ");

        let dated = FxError::RateNotFound {
            pair,
            date: NaiveDate::from_ymd_opt(2023, 1, 1),
        };
        assert_eq!(dated.to_string(), "Rate not found for USD/XYZ on 2023-01-01");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            FxError::fetch(&Currency::usd(), "timeout").error_code(),
            "FETCH_FAILED"
        );
        assert_eq!(
            FxError::EmptyResponse(Currency::eur()).error_code(),
            "EMPTY_RESPONSE"
        );
    }
}
