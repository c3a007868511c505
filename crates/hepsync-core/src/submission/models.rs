//! Submission aggregate models

use chrono::{DateTime, Utc};
use hepsync_common::ids::{InspireId, RecordId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a submission aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Created or updated but not yet finalised
    Draft,
    /// Finalised; visible downstream
    Finished,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Finished => "finished",
        }
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SubmissionStatus::Draft),
            "finished" => Ok(SubmissionStatus::Finished),
            other => Err(format!("unknown submission status: {other}")),
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bibliographic snapshot of one publication.
///
/// Fetched fresh from the metadata service on every synchronization pass
/// and always overwrites the stored copy on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub inspire_id: InspireId,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub collaboration: Option<String>,
}

/// One data table of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    /// 1-based position in the split bundle
    pub index: usize,
    pub name: String,
    /// Parsed table document (independent/dependent variables)
    pub payload: serde_json::Value,
}

/// The durable local representation of one publication's submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub recid: RecordId,
    pub inspire_id: InspireId,
    pub publication: PublicationRecord,
    pub tables: Vec<DataTable>,
    pub status: SubmissionStatus,
    /// Incremented on every successful update
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            "draft".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Draft
        );
        assert_eq!(SubmissionStatus::Finished.as_str(), "finished");
        assert!("bogus".parse::<SubmissionStatus>().is_err());
    }
}
