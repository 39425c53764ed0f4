//! orca-sync
//!
//! Fetches security alerts from the internal HSDB alert database and the
//! Orca cloud-security service, reconciles the two, and writes the results
//! to local snapshot and report files.
//!
//! Two pipelines share the same shape: an authenticating transport feeds a
//! paginated fetcher, whose output either lands in a full snapshot dump or
//! streams through the reconciler against a previously dumped snapshot.

pub mod clients;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod snapshot;
pub mod transport;
pub mod types;

// Re-exports
pub use clients::{AlertPager, HsdbClient, OrcaClient};
pub use config::{ConfigError, HsdbConfig, OrcaConfig};
pub use error::Error;
pub use reconcile::{
    LocalSnapshot, ReconcileConfig, ReconcileOutputs, ReconcileSummary, Reconciler,
};
pub use transport::{HsdbTransport, OrcaTransport};
pub use types::{AlertFilters, AlertRecord, DslFilter, FilterClause};
