//! Bundle fetcher
//!
//! Downloads one identifier's submission bundle to a uniquely named file
//! in the configured temp directory. Socket-level failures are transient
//! and eligible for external retry; any non-2xx status is a hard failure
//! for the identifier and is never retried here.

use futures::StreamExt;
use hepsync_common::ids::InspireId;
use reqwest::{Client, StatusCode};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::SyncConfig;

/// Result type for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Error types for bundle downloads
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Socket-level failure; the identifier can be retried by the caller.
    #[error("transient network failure fetching {id}: {source}")]
    Transient {
        id: InspireId,
        source: reqwest::Error,
    },

    /// The remote has no bundle for this identifier.
    #[error("no remote bundle for {0}")]
    NotFound(InspireId),

    /// Any other unsuccessful response; hard failure for this identifier.
    #[error("remote returned {status} for {id}")]
    Remote {
        id: InspireId,
        status: StatusCode,
    },

    #[error("i/o failure writing bundle: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads per-identifier bundles.
pub struct BundleFetcher {
    client: Client,
    config: SyncConfig,
}

impl BundleFetcher {
    pub fn new(client: Client, config: SyncConfig) -> Self {
        Self { client, config }
    }

    /// Download the bundle for `id`, returning the path of the archive.
    ///
    /// The archive lands in the configured temp directory under a unique
    /// name; the caller owns cleanup.
    pub async fn fetch(&self, id: &InspireId) -> Result<PathBuf> {
        let url = self.config.bundle_url(id);
        info!(inspire_id = %id, "Downloading bundle from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transient {
                id: id.clone(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => {},
            StatusCode::NOT_FOUND => {
                warn!(inspire_id = %id, "Remote has no bundle");
                return Err(FetchError::NotFound(id.clone()));
            },
            status => {
                warn!(inspire_id = %id, %status, "Bundle download failed");
                return Err(FetchError::Remote {
                    id: id.clone(),
                    status,
                });
            },
        }

        std::fs::create_dir_all(&self.config.tmp_dir)?;
        let mut archive = NamedTempFile::new_in(&self.config.tmp_dir)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Transient {
                id: id.clone(),
                source,
            })?;
            archive.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
        }

        let (_, archive_path) = archive.keep().map_err(|e| FetchError::Io(e.error))?;
        info!(
            inspire_id = %id,
            "Downloaded bundle: {} bytes to {}",
            downloaded,
            archive_path.display()
        );
        Ok(archive_path)
    }
}

/// Best-effort removal of a downloaded archive.
pub fn discard_archive(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Failed to remove archive {}: {}", path.display(), e);
    }
}
