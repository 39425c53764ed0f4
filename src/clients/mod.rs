//! Per-service alert clients.

pub mod hsdb;
pub mod orca;

// Re-exports
pub use hsdb::HsdbClient;
pub use orca::{AlertPager, OrcaClient};
