//! Remote catalog client
//!
//! Lists publication identifiers known to the legacy catalog, optionally
//! filtered by modification date. The endpoint returns plain text with
//! zero or more `[id,x,y]` triples; only the first element of each triple
//! matters here, and a zero id is the catalog's sentinel for "no id".

use chrono::NaiveDate;
use hepsync_common::ids::InspireId;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::SyncConfig;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Error types for the catalog client
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("catalog returned {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid listing pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Client for the remote catalog's identifier listing.
pub struct CatalogClient {
    client: Client,
    base_url: String,
    prefix: String,
    triple: Regex,
}

impl CatalogClient {
    pub fn new(client: Client, config: &SyncConfig) -> Result<Self> {
        Ok(Self {
            client,
            base_url: config.catalog_url.trim_end_matches('/').to_string(),
            prefix: config.id_prefix.clone(),
            triple: Regex::new(r"\[([0-9]+),[0-9]+,[0-9]+\]")?,
        })
    }

    /// List all identifiers, optionally restricted to records added or
    /// modified since `since`. Does not retry; the caller decides whether
    /// to retry the whole listing.
    pub async fn list_ids(&self, since: Option<NaiveDate>) -> Result<Vec<InspireId>> {
        let url = match since {
            Some(date) => format!("{}/{}", self.base_url, date.format("%Y%m%d")),
            None => self.base_url.clone(),
        };

        info!("Listing catalog identifiers from {}", url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status()));
        }

        let body = response.text().await?;
        let ids = self.parse_listing(&body);
        info!("Catalog listing returned {} identifiers", ids.len());
        Ok(ids)
    }

    /// Extract identifiers from the bracketed triple-list format.
    fn parse_listing(&self, body: &str) -> Vec<InspireId> {
        let mut ids = Vec::new();
        for captures in self.triple.captures_iter(body) {
            let id = &captures[1];
            if id == "0" {
                debug!("Skipping zero-id catalog entry");
                continue;
            }
            ids.push(InspireId::with_prefix(id, &self.prefix));
        }
        ids
    }
}
