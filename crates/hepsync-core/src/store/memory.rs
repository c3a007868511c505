//! In-memory submission store
//!
//! Backs tests and deterministic dry runs. A single lock around both maps
//! gives the same per-record atomicity the database store provides.

use async_trait::async_trait;
use chrono::Utc;
use hepsync_common::ids::{InspireId, RecordId};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CreateOutcome, Result, StoreError, SubmissionStore};
use crate::submission::models::{
    DataTable, PublicationRecord, Submission, SubmissionStatus,
};

#[derive(Default)]
struct Inner {
    by_inspire: HashMap<InspireId, RecordId>,
    submissions: HashMap<RecordId, Submission>,
}

/// In-memory [`SubmissionStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored aggregates.
    pub async fn len(&self) -> usize {
        self.inner.read().await.submissions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn find(&self, id: &InspireId) -> Result<Option<RecordId>> {
        Ok(self.inner.read().await.by_inspire.get(id).copied())
    }

    async fn create_if_absent(
        &self,
        id: &InspireId,
        publication: &PublicationRecord,
    ) -> Result<CreateOutcome> {
        let mut inner = self.inner.write().await;
        if let Some(&existing) = inner.by_inspire.get(id) {
            return Ok(CreateOutcome::Exists(existing));
        }

        let recid = RecordId::new();
        let now = Utc::now();
        inner.by_inspire.insert(id.clone(), recid);
        inner.submissions.insert(
            recid,
            Submission {
                recid,
                inspire_id: id.clone(),
                publication: publication.clone(),
                tables: Vec::new(),
                status: SubmissionStatus::Draft,
                version: 0,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(CreateOutcome::Created(recid))
    }

    async fn load(&self, recid: RecordId) -> Result<Option<Submission>> {
        Ok(self.inner.read().await.submissions.get(&recid).cloned())
    }

    async fn commit(
        &self,
        recid: RecordId,
        publication: &PublicationRecord,
        tables: Vec<DataTable>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let submission = inner
            .submissions
            .get_mut(&recid)
            .ok_or(StoreError::UnknownRecord(recid))?;
        submission.publication = publication.clone();
        submission.tables = tables;
        submission.version += 1;
        submission.updated_at = Utc::now();
        Ok(())
    }

    async fn update_publication(
        &self,
        recid: RecordId,
        publication: &PublicationRecord,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let submission = inner
            .submissions
            .get_mut(&recid)
            .ok_or(StoreError::UnknownRecord(recid))?;
        submission.publication = publication.clone();
        submission.version += 1;
        submission.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_finished(&self, recid: RecordId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let submission = inner
            .submissions
            .get_mut(&recid)
            .ok_or(StoreError::UnknownRecord(recid))?;
        submission.status = SubmissionStatus::Finished;
        submission.updated_at = Utc::now();
        Ok(())
    }

    async fn remove(&self, recid: RecordId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(submission) = inner.submissions.remove(&recid) {
            inner.by_inspire.remove(&submission.inspire_id);
        }
        Ok(())
    }
}
