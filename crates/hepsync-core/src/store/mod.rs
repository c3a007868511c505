//! Durable submission store boundary
//!
//! The store is an external collaborator as far as the pipeline is
//! concerned; this module fixes its interface. The one obligation beyond
//! plain CRUD is per-record atomicity: committing an aggregate (metadata,
//! tables, version bump) is a single atomic operation from the
//! perspective of any concurrent reader, and record creation is a single
//! conditional insert so two simultaneous creators cannot both win.

use async_trait::async_trait;
use hepsync_common::ids::{InspireId, RecordId};

use crate::submission::models::{DataTable, PublicationRecord, Submission};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error types for the store boundary
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate record for {0}")]
    Duplicate(InspireId),

    #[error("unknown record {0}")]
    UnknownRecord(RecordId),

    #[error("invalid stored data: {0}")]
    Invalid(String),

    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of the conditional insert in [`SubmissionStore::create_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// This caller allocated the record.
    Created(RecordId),
    /// Another writer got there first; the existing record is returned.
    Exists(RecordId),
}

/// The local store for submission aggregates.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Look up the record for an identifier, if one exists.
    async fn find(&self, id: &InspireId) -> Result<Option<RecordId>>;

    /// Create a draft record for `id` unless one already exists.
    ///
    /// Atomic: of any number of concurrent callers, exactly one observes
    /// [`CreateOutcome::Created`].
    async fn create_if_absent(
        &self,
        id: &InspireId,
        publication: &PublicationRecord,
    ) -> Result<CreateOutcome>;

    /// Load the full aggregate for a record.
    async fn load(&self, recid: RecordId) -> Result<Option<Submission>>;

    /// Atomically replace the aggregate's metadata and tables and bump
    /// its version. A concurrent reader sees either the previous state or
    /// the new one, never a mixture.
    async fn commit(
        &self,
        recid: RecordId,
        publication: &PublicationRecord,
        tables: Vec<DataTable>,
    ) -> Result<()>;

    /// Overwrite the stored publication metadata only, bumping the
    /// version; tables are untouched.
    async fn update_publication(
        &self,
        recid: RecordId,
        publication: &PublicationRecord,
    ) -> Result<()>;

    /// Mark the aggregate finished (used by the finalizer).
    async fn mark_finished(&self, recid: RecordId) -> Result<()>;

    /// Remove the aggregate and its tables entirely.
    async fn remove(&self, recid: RecordId) -> Result<()>;
}
