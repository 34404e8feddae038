//! Ratekeeper Daemon
//!
//! Keeps a currency-pair rate cache warm from an upstream HTTP source and
//! shuts it down cleanly on Ctrl-C.

pub mod app;
pub mod config;

pub use app::Ratekeeper;
pub use config::DaemonConfig;
