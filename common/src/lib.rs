//! Ratekeeper Common Types
//!
//! Shared types used across the Ratekeeper workspace: currency codes,
//! currency pairs, the supported currency set and time helpers.

pub mod currency;
pub mod error;
pub mod time;

pub use currency::*;
pub use error::*;
pub use time::*;
