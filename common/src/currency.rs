//! Currency codes, pairs and the supported currency set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CurrencyError;

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Parse a three-letter alphabetic code.
    pub fn parse(code: &str) -> Result<Self, CurrencyError> {
        let trimmed = code.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyError::InvalidCode(code.to_string()));
        }
        Ok(Self::new(trimmed))
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn inr() -> Self {
        Self::new("INR")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A currency pair: one unit of `base` is worth `rate` units of `quote`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Base currency.
    pub base: Currency,
    /// Quote currency.
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: impl Into<Currency>, quote: impl Into<Currency>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }

    /// True when base and quote are the same currency.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// The fixed set of currencies a deployment supports.
///
/// Ordered and de-duplicated, so iteration order is stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySet(Vec<Currency>);

impl CurrencySet {
    /// Build a set from any list of currencies, dropping duplicates.
    pub fn new(currencies: impl IntoIterator<Item = Currency>) -> Self {
        let mut codes: Vec<Currency> = currencies.into_iter().collect();
        codes.sort();
        codes.dedup();
        Self(codes)
    }

    /// Parse a comma separated list such as `"USD,EUR,GBP"`.
    pub fn parse_list(list: &str) -> Result<Self, CurrencyError> {
        let currencies = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Currency::parse)
            .collect::<Result<Vec<_>, _>>()?;

        if currencies.is_empty() {
            return Err(CurrencyError::EmptySet);
        }

        Ok(Self::new(currencies))
    }

    pub fn contains(&self, currency: &Currency) -> bool {
        self.0.binary_search(currency).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Currency> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Codes as plain strings, for reporting.
    pub fn codes(&self) -> Vec<String> {
        self.0.iter().map(|c| c.code().to_string()).collect()
    }
}

impl Default for CurrencySet {
    /// USD, INR, EUR, JPY and GBP.
    fn default() -> Self {
        Self::new([
            Currency::usd(),
            Currency::inr(),
            Currency::eur(),
            Currency::jpy(),
            Currency::gbp(),
        ])
    }
}

impl<'a> IntoIterator for &'a CurrencySet {
    type Item = &'a Currency;
    type IntoIter = std::slice::Iter<'a, Currency>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
