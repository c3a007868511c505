//! Batch entry points
//!
//! The operations the surrounding CLI/UI drives: list identifiers since a
//! date, synchronize a set of identifiers, synchronize metadata only, and
//! the maintenance helpers around them. Each maps onto one dispatcher
//! submission; per-identifier outcomes come back in the batch summary.

use chrono::{Duration, NaiveDate, Utc};
use hepsync_common::ids::InspireId;
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

use crate::catalog::{CatalogClient, CatalogError};
use crate::config::SyncConfig;
use crate::dispatch::{BatchSummary, DispatchMode, JobDispatcher};
use crate::finalize::Finalizer;
use crate::store::{self, SubmissionStore};
use crate::sync::synchronizer::{RecordSynchronizer, SyncOptions};

const USER_AGENT: &str = concat!("hepsync/", env!("CARGO_PKG_VERSION"));

/// Facade over catalog, synchronizer and dispatcher.
pub struct SyncService {
    catalog: CatalogClient,
    synchronizer: Arc<RecordSynchronizer>,
    dispatcher: JobDispatcher,
    store: Arc<dyn SubmissionStore>,
}

impl SyncService {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn SubmissionStore>,
        finalizer: Arc<dyn Finalizer>,
        mode: DispatchMode,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        let catalog = CatalogClient::new(client.clone(), &config)?;
        let dispatcher = JobDispatcher::new(mode, config.concurrency);
        let synchronizer = Arc::new(RecordSynchronizer::new(
            config,
            client,
            store.clone(),
            finalizer,
        ));

        Ok(Self {
            catalog,
            synchronizer,
            dispatcher,
            store,
        })
    }

    /// List identifiers known to the catalog, optionally modified since
    /// `since`.
    pub async fn list_since(&self, since: Option<NaiveDate>) -> Result<Vec<InspireId>, CatalogError> {
        self.catalog.list_ids(since).await
    }

    /// Add or update every record modified since `since` (yesterday when
    /// omitted).
    pub async fn add_or_update_since(
        &self,
        since: Option<NaiveDate>,
    ) -> anyhow::Result<BatchSummary> {
        let since = since.unwrap_or_else(|| (Utc::now() - Duration::days(1)).date_naive());
        let ids = self.catalog.list_ids(Some(since)).await?;
        info!("{} records to be added or updated since {}", ids.len(), since);
        Ok(self.load_records(ids).await)
    }

    /// Synchronize a set of identifiers through the full pipeline,
    /// creating or updating as each record requires.
    pub async fn load_records(&self, ids: Vec<InspireId>) -> BatchSummary {
        self.dispatcher
            .submit(self.synchronizer.clone(), ids, SyncOptions::default())
            .await
    }

    /// Synchronize updates for a set of identifiers; with `metadata_only`
    /// the bundles are skipped and only publication records are
    /// refreshed.
    pub async fn update_records(
        &self,
        ids: Vec<InspireId>,
        metadata_only: bool,
    ) -> BatchSummary {
        self.dispatcher
            .submit(
                self.synchronizer.clone(),
                ids,
                SyncOptions { metadata_only },
            )
            .await
    }

    /// Identifiers present in the remote catalog but absent locally.
    pub async fn missing_ids(&self) -> anyhow::Result<Vec<InspireId>> {
        let ids = self.catalog.list_ids(None).await?;
        let mut missing = Vec::new();
        for id in ids {
            if self.store.find(&id).await?.is_none() {
                missing.push(id);
            }
        }
        info!("{} records missing locally", missing.len());
        Ok(missing)
    }

    /// Explicit external unload: remove the local record for `id`.
    /// Returns whether a record existed.
    pub async fn unload(&self, id: &InspireId) -> store::Result<bool> {
        match self.store.find(id).await? {
            Some(recid) => {
                self.store.remove(recid).await?;
                info!(inspire_id = %id, %recid, "Removed local record");
                Ok(true)
            },
            None => Ok(false),
        }
    }
}
