//! Identifier types shared across hepsync

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix applied to catalog identifiers by default.
pub const DEFAULT_ID_PREFIX: &str = "ins";

/// Stable key of a publication record in the remote catalog.
///
/// The catalog hands out numeric identifiers; a fixed prefix is applied so
/// the values are recognizable across logs and the store (e.g. `ins1245023`).
/// The prefix is cosmetic: all remote lookups use the numeric portion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InspireId(String);

impl InspireId {
    /// Wrap a raw identifier as received (prefix included or not).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build an identifier from its numeric portion and a prefix.
    pub fn with_prefix(numeric: &str, prefix: &str) -> Self {
        Self(format!("{prefix}{numeric}"))
    }

    /// The numeric portion, with any leading prefix stripped.
    pub fn numeric(&self) -> &str {
        self.0.trim_start_matches(|c: char| !c.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InspireId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InspireId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Surrogate key of a submission aggregate in the local store.
///
/// Allocated on first ingestion of an [`InspireId`] and stable thereafter;
/// at most one `RecordId` maps to a given `InspireId` at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_strips_prefix() {
        assert_eq!(InspireId::new("ins1245023").numeric(), "1245023");
        assert_eq!(InspireId::new("1245023").numeric(), "1245023");
    }

    #[test]
    fn test_with_prefix() {
        let id = InspireId::with_prefix("1001", DEFAULT_ID_PREFIX);
        assert_eq!(id.as_str(), "ins1001");
        assert_eq!(id.numeric(), "1001");
    }

    #[test]
    fn test_display_round_trip() {
        let id = InspireId::new("ins42");
        assert_eq!(id.to_string(), "ins42");
    }

    #[test]
    fn test_record_ids_are_unique() {
        assert_ne!(RecordId::new(), RecordId::new());
    }

    #[test]
    fn test_record_id_uuid_round_trip() {
        let recid = RecordId::new();
        assert_eq!(RecordId::from(recid.as_uuid()), recid);
    }
}
