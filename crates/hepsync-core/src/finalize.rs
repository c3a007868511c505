//! Finalizer boundary
//!
//! Marking an aggregate finished and triggering downstream indexing and
//! notification belongs to the surrounding application; the trait pins
//! down the hand-off. Delivery downstream is at-least-once; consumers
//! deduplicate by record id.

use async_trait::async_trait;
use hepsync_common::ids::RecordId;
use std::sync::Arc;
use tracing::{debug, info};

use crate::store::{StoreError, SubmissionStore};
use crate::submission::models::PublicationRecord;

/// Result type for finalization
pub type Result<T> = std::result::Result<T, FinalizeError>;

/// Error types for the finalizer boundary
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("finalization failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Downstream hand-off for completed submissions.
#[async_trait]
pub trait Finalizer: Send + Sync {
    /// Mark the aggregate complete and trigger indexing/notification.
    async fn finalize(
        &self,
        recid: RecordId,
        publication: &PublicationRecord,
        forced: bool,
    ) -> Result<()>;

    /// Re-index an existing record without touching its data.
    async fn reindex(&self, recid: RecordId) -> Result<()>;
}

/// Finalizer that marks aggregates finished in the store and logs the
/// downstream hand-off.
pub struct StoreFinalizer {
    store: Arc<dyn SubmissionStore>,
}

impl StoreFinalizer {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Finalizer for StoreFinalizer {
    async fn finalize(
        &self,
        recid: RecordId,
        publication: &PublicationRecord,
        forced: bool,
    ) -> Result<()> {
        self.store.mark_finished(recid).await?;
        info!(
            %recid,
            inspire_id = %publication.inspire_id,
            forced,
            "Submission finalised; queueing index and notification"
        );
        Ok(())
    }

    async fn reindex(&self, recid: RecordId) -> Result<()> {
        debug!(%recid, "Reindex requested");
        Ok(())
    }
}
