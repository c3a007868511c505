//! Per-identifier synchronization pipeline
//!
//! One unit of work runs the state machine
//! `Checking -> {Creating | Updating} -> Splitting -> Loading ->
//! {Finalizing | RollingBack} -> Done` for a single identifier. Every
//! step is safe to repeat: the execution substrate delivers units
//! at-least-once and nothing here retries internally.

use hepsync_common::ids::{InspireId, RecordId};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bundle::{self, BundleError};
use crate::config::SyncConfig;
use crate::fetch::{discard_archive, BundleFetcher, FetchError};
use crate::finalize::{FinalizeError, Finalizer};
use crate::inspire::{InspireClient, InspireError};
use crate::store::{CreateOutcome, StoreError, SubmissionStore};
use crate::submission::loader::SubmissionLoader;
use crate::submission::models::PublicationRecord;
use crate::submission::report::ErrorReport;

/// Error types for one synchronization unit
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Metadata(#[from] InspireError),

    /// The bundle loaded with structural errors; the aggregate was
    /// discarded/rolled back.
    #[error("submission failed for {id}: {report}")]
    Submission { id: InspireId, report: ErrorReport },

    /// A concurrent creating pass won the conditional insert.
    #[error("duplicate record for {0}: concurrent create won")]
    Duplicate(InspireId),

    /// Metadata-only update requested for an identifier never loaded.
    #[error("no local record for {0}; load it first")]
    UnknownRecord(InspireId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Finalize(#[from] FinalizeError),

    /// The unit's task was abandoned by the execution substrate.
    #[error("unit aborted: {0}")]
    Aborted(String),
}

impl SyncError {
    /// Whether the external substrate may meaningfully retry this unit.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Fetch(FetchError::Transient { .. }) | SyncError::Metadata(_)
        )
    }
}

/// Per-unit options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Refresh publication metadata and reindex only; skip the bundle
    /// entirely. Requires an existing record.
    pub metadata_only: bool,
}

/// Successful outcome of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// First ingestion: a record was allocated and loaded.
    Created(RecordId),
    /// Existing record reloaded from a fresh bundle.
    Updated(RecordId),
    /// Metadata-only refresh of an existing record.
    MetadataRefreshed(RecordId),
}

impl UnitOutcome {
    pub fn recid(&self) -> RecordId {
        match self {
            UnitOutcome::Created(recid)
            | UnitOutcome::Updated(recid)
            | UnitOutcome::MetadataRefreshed(recid) => *recid,
        }
    }
}

/// A fetched, split and metadata-resolved bundle, ready to load.
struct StagedBundle {
    archive: PathBuf,
    workdir: PathBuf,
    manifest: PathBuf,
    publication: PublicationRecord,
}

impl StagedBundle {
    /// Remove the archive and working directory; best effort.
    fn cleanup(&self) {
        cleanup_staging(&self.archive, &self.workdir);
    }
}

/// Best-effort removal of a pass's ephemeral files.
fn cleanup_staging(archive: &std::path::Path, workdir: &std::path::Path) {
    discard_archive(archive);
    if workdir.exists() {
        if let Err(e) = std::fs::remove_dir_all(workdir) {
            warn!("Failed to remove working directory {}: {}", workdir.display(), e);
        }
    }
}

/// Runs the synchronization pipeline for single identifiers.
///
/// Holds no per-unit state; one instance is shared across all units of a
/// batch.
pub struct RecordSynchronizer {
    config: SyncConfig,
    fetcher: BundleFetcher,
    inspire: InspireClient,
    loader: SubmissionLoader,
    store: Arc<dyn SubmissionStore>,
    finalizer: Arc<dyn Finalizer>,
}

impl RecordSynchronizer {
    pub fn new(
        config: SyncConfig,
        client: Client,
        store: Arc<dyn SubmissionStore>,
        finalizer: Arc<dyn Finalizer>,
    ) -> Self {
        let fetcher = BundleFetcher::new(client.clone(), config.clone());
        let inspire = InspireClient::new(client, &config);
        let loader = SubmissionLoader::new(store.clone());
        Self {
            config,
            fetcher,
            inspire,
            loader,
            store,
            finalizer,
        }
    }

    /// Run one unit of work. `Done` is reaching either `Ok` or `Err`;
    /// both are terminal for this identifier in this pass.
    pub async fn sync_record(
        &self,
        id: &InspireId,
        opts: SyncOptions,
    ) -> Result<UnitOutcome, SyncError> {
        // Checking: read-only existence probe; the create path re-checks
        // atomically at insert time.
        let existing = self.store.find(id).await?;
        match existing {
            Some(recid) if opts.metadata_only => self.refresh_metadata(id, recid).await,
            Some(recid) => self.update_record(id, recid).await,
            None if opts.metadata_only => Err(SyncError::UnknownRecord(id.clone())),
            None => self.create_record(id).await,
        }
    }

    /// Updating, metadata-only: refresh the stored publication record and
    /// reindex; data tables stay untouched.
    async fn refresh_metadata(
        &self,
        id: &InspireId,
        recid: RecordId,
    ) -> Result<UnitOutcome, SyncError> {
        info!(inspire_id = %id, %recid, "Refreshing publication metadata only");
        let publication = self.inspire.resolve(id).await?;
        self.store.update_publication(recid, &publication).await?;
        self.finalizer.reindex(recid).await?;
        Ok(UnitOutcome::MetadataRefreshed(recid))
    }

    /// Creating: full pipeline for an identifier with no local record.
    async fn create_record(&self, id: &InspireId) -> Result<UnitOutcome, SyncError> {
        info!(inspire_id = %id, "Record absent locally; creating");
        let staged = self.stage_bundle(id).await?;
        let outcome = self.load_new(id, &staged).await;
        staged.cleanup();
        outcome
    }

    /// Updating: full pipeline against an existing record.
    async fn update_record(
        &self,
        id: &InspireId,
        recid: RecordId,
    ) -> Result<UnitOutcome, SyncError> {
        info!(inspire_id = %id, %recid, "Record exists locally; updating");
        let staged = self.stage_bundle(id).await?;
        let outcome = self.load_existing(id, recid, &staged).await;
        staged.cleanup();
        outcome
    }

    /// Fetching + Splitting + metadata resolution, with cleanup of
    /// whatever was staged before a failure.
    async fn stage_bundle(&self, id: &InspireId) -> Result<StagedBundle, SyncError> {
        let archive = self.fetcher.fetch(id).await?;
        let workdir = self.config.workdir(id);

        let split = match bundle::split_bundle(&archive, &workdir) {
            Ok(split) => split,
            Err(e) => {
                cleanup_staging(&archive, &workdir);
                return Err(e.into());
            },
        };

        let publication = match self.inspire.resolve(id).await {
            Ok(publication) => publication,
            Err(e) => {
                cleanup_staging(&archive, &workdir);
                return Err(e.into());
            },
        };

        info!(inspire_id = %id, tables = split.table_count, "Bundle expanded");
        Ok(StagedBundle {
            archive,
            workdir,
            manifest: split.manifest_path,
            publication,
        })
    }

    /// Loading -> Finalizing | RollingBack for a creating pass.
    async fn load_new(
        &self,
        id: &InspireId,
        staged: &StagedBundle,
    ) -> Result<UnitOutcome, SyncError> {
        let recid = match self
            .store
            .create_if_absent(id, &staged.publication)
            .await?
        {
            CreateOutcome::Created(recid) => recid,
            CreateOutcome::Exists(_) => return Err(SyncError::Duplicate(id.clone())),
        };

        let report = match self
            .loader
            .load(&staged.manifest, &staged.workdir, recid, &staged.publication, false)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                // Store-layer failure mid-load: drop the fresh stub so the
                // store returns to its pre-pass state.
                if let Err(re) = self.store.remove(recid).await {
                    warn!(inspire_id = %id, %recid, "Rollback of new record failed: {}", re);
                }
                return Err(e.into());
            },
        };

        if report.is_empty() {
            self.finalizer.finalize(recid, &staged.publication, true).await?;
            Ok(UnitOutcome::Created(recid))
        } else {
            error!(
                inspire_id = %id,
                %recid,
                "Rolling back newly created record after failed load"
            );
            self.store.remove(recid).await?;
            Err(SyncError::Submission {
                id: id.clone(),
                report,
            })
        }
    }

    /// Loading -> Finalizing | RollingBack for an updating pass. Nothing
    /// durable happens unless the load commits, so rollback leaves the
    /// previous version untouched.
    async fn load_existing(
        &self,
        id: &InspireId,
        recid: RecordId,
        staged: &StagedBundle,
    ) -> Result<UnitOutcome, SyncError> {
        let report = self
            .loader
            .load(&staged.manifest, &staged.workdir, recid, &staged.publication, true)
            .await?;

        if report.is_empty() {
            self.finalizer.finalize(recid, &staged.publication, true).await?;
            Ok(UnitOutcome::Updated(recid))
        } else {
            error!(
                inspire_id = %id,
                %recid,
                "Update discarded; previous version left untouched"
            );
            Err(SyncError::Submission {
                id: id.clone(),
                report,
            })
        }
    }
}
