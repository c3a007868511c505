//! Record synchronization
//!
//! The per-identifier pipeline ([`synchronizer`]) and the batch entry
//! points consumed by the surrounding CLI/UI ([`service`]).

pub mod service;
pub mod synchronizer;

pub use service::SyncService;
pub use synchronizer::{RecordSynchronizer, SyncError, SyncOptions, UnitOutcome};
