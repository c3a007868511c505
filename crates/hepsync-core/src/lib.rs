//! HEPSync Core - record reconciliation and ingestion pipeline
//!
//! Given a remote catalog of publication identifiers and per-identifier
//! data bundles, this crate determines which identifiers are missing or
//! stale in the local store, fetches and unpacks each bundle, resolves
//! bibliographic metadata, and atomically creates-or-updates one local
//! submission aggregate per identifier.
//!
//! # Components
//!
//! - [`catalog`]: lists identifiers known to the remote catalog
//! - [`fetch`]: downloads a per-identifier bundle to a temp file
//! - [`bundle`]: expands a bundle into a manifest plus per-table files
//! - [`inspire`]: resolves bibliographic metadata for an identifier
//! - [`submission`]: the aggregate model and the all-or-nothing loader
//! - [`store`]: the durable store boundary (in-memory and Postgres)
//! - [`sync`]: the per-identifier state machine and batch entry points
//! - [`dispatch`]: fan-out execution with per-unit failure isolation
//! - [`finalize`]: hand-off boundary to downstream indexing/notification

pub mod bundle;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod finalize;
pub mod inspire;
pub mod store;
pub mod submission;
pub mod sync;

pub use config::SyncConfig;
pub use dispatch::{BatchSummary, DispatchMode, JobDispatcher, UnitReport};
pub use submission::report::ErrorReport;
pub use sync::service::SyncService;
pub use sync::synchronizer::{RecordSynchronizer, SyncError, SyncOptions, UnitOutcome};
