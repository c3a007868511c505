//! Bibliographic metadata resolver
//!
//! Fetches publication information (title, authors, abstract, DOI, arXiv
//! id, collaboration) for an identifier from the external metadata
//! service. The service is queried by the numeric portion of the
//! identifier; a fresh snapshot is taken on every synchronization pass.

use hepsync_common::ids::InspireId;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::SyncConfig;
use crate::submission::models::PublicationRecord;

/// Result type for metadata resolution
pub type Result<T> = std::result::Result<T, InspireError>;

/// Error types for the metadata resolver
#[derive(Debug, thiserror::Error)]
pub enum InspireError {
    #[error("metadata service unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("metadata service returned {0}")]
    Status(reqwest::StatusCode),
}

/// Wire format of the metadata service response.
#[derive(Debug, Deserialize)]
struct WireRecord {
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    arxiv_id: Option<String>,
    #[serde(default)]
    collaboration: Option<String>,
}

/// Client for the bibliographic metadata service.
pub struct InspireClient {
    client: Client,
    base_url: String,
}

impl InspireClient {
    pub fn new(client: Client, config: &SyncConfig) -> Self {
        Self {
            client,
            base_url: config.inspire_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve the publication record for `id`.
    pub async fn resolve(&self, id: &InspireId) -> Result<PublicationRecord> {
        let url = format!("{}/{}", self.base_url, id.numeric());
        debug!(inspire_id = %id, "Resolving publication metadata from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(InspireError::Status(response.status()));
        }

        let wire: WireRecord = response.json().await?;
        Ok(PublicationRecord {
            inspire_id: id.clone(),
            title: wire.title,
            authors: wire.authors,
            abstract_text: wire.abstract_text,
            doi: wire.doi,
            arxiv_id: wire.arxiv_id,
            collaboration: wire.collaboration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server_uri: &str) -> InspireClient {
        let config = SyncConfig {
            inspire_url: format!("{server_uri}/api/literature"),
            ..Default::default()
        };
        InspireClient::new(Client::new(), &config)
    }

    #[tokio::test]
    async fn test_resolve_maps_wire_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/literature/1001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "Measurement of the top quark mass",
                "authors": ["A. Author", "B. Author"],
                "abstract": "We measure things.",
                "doi": "10.1000/demo",
                "arxiv_id": "1601.00001",
                "collaboration": "DEMO"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let record = client.resolve(&InspireId::new("ins1001")).await.unwrap();
        assert_eq!(record.inspire_id, InspireId::new("ins1001"));
        assert_eq!(record.title, "Measurement of the top quark mass");
        assert_eq!(record.authors.len(), 2);
        assert_eq!(record.collaboration.as_deref(), Some("DEMO"));
    }

    #[tokio::test]
    async fn test_resolve_tolerates_missing_optional_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/literature/2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"title": "Sparse record"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let record = client.resolve(&InspireId::new("ins2")).await.unwrap();
        assert_eq!(record.title, "Sparse record");
        assert!(record.authors.is_empty());
        assert!(record.doi.is_none());
    }

    #[tokio::test]
    async fn test_resolve_reports_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/literature/3"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client.resolve(&InspireId::new("ins3")).await.unwrap_err();
        assert!(matches!(err, InspireError::Status(s) if s.as_u16() == 502));
    }
}
