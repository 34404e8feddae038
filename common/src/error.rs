//! Error types for shared Ratekeeper types.

use thiserror::Error;

/// Errors raised while building currencies and currency sets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    /// Not a three-letter alphabetic code.
    #[error("Invalid currency code: {0:?}")]
    InvalidCode(String),

    /// A currency set must name at least one currency.
    #[error("Currency set is empty")]
    EmptySet,
}
