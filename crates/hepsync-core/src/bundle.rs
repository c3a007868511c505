//! Bundle splitter
//!
//! Expands a downloaded archive into a per-identifier submission
//! directory: one manifest (`submission.yaml`) plus one `data{N}.yaml`
//! file per table, named by table index. Pure transformation; no network
//! or store access.
//!
//! The archive is a multi-document YAML stream, optionally
//! gzip-compressed. Documents carrying a `name` key are table documents;
//! everything else belongs to the manifest header. Inline `data` payloads
//! are moved out into the per-table files and replaced with `data_file`
//! references, so the manifest stays small and each table can be parsed
//! (and fail) independently.

use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_yaml::Value;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result type for bundle operations
pub type Result<T> = std::result::Result<T, BundleError>;

/// Error types for bundle expansion
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("malformed archive: {0}")]
    Malformed(String),

    #[error("i/o failure expanding bundle: {0}")]
    Io(#[from] std::io::Error),
}

/// File name of the manifest inside an expanded bundle.
pub const MANIFEST_FILE: &str = "submission.yaml";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// An expanded bundle on disk.
#[derive(Debug)]
pub struct SplitBundle {
    /// Path of the written manifest
    pub manifest_path: PathBuf,
    /// Number of table documents found in the archive
    pub table_count: usize,
}

/// Expand `archive_path` into `output_dir`.
pub fn split_bundle(archive_path: &Path, output_dir: &Path) -> Result<SplitBundle> {
    let text = read_archive(archive_path)?;

    let mut headers = Vec::new();
    let mut tables = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&text) {
        let value = Value::deserialize(document)
            .map_err(|e| BundleError::Malformed(format!("unparsable document: {e}")))?;
        if value.is_null() {
            continue;
        }
        if value.get("name").is_some() {
            tables.push(value);
        } else {
            headers.push(value);
        }
    }

    if headers.is_empty() {
        return Err(BundleError::Malformed(
            "archive contains no manifest document".to_string(),
        ));
    }

    fs::create_dir_all(output_dir)?;

    let table_count = tables.len();
    let mut manifest_docs = headers;
    for (i, mut table) in tables.into_iter().enumerate() {
        let index = i + 1;
        let data_file = format!("data{index}.yaml");
        if let Some(mapping) = table.as_mapping_mut() {
            if let Some(data) = mapping.remove("data") {
                let rendered = serde_yaml::to_string(&data)
                    .map_err(|e| BundleError::Malformed(format!("unwritable table data: {e}")))?;
                let table_path = output_dir.join(&data_file);
                fs::write(&table_path, rendered)?;
                debug!("Wrote table payload {}", table_path.display());
                mapping.insert(Value::from("data_file"), Value::from(data_file));
            } else if !mapping.contains_key("data_file") {
                // No payload anywhere; point at the indexed file so the
                // loader reports it as a missing table rather than
                // silently skipping the entry.
                mapping.insert(Value::from("data_file"), Value::from(data_file));
            }
        }
        manifest_docs.push(table);
    }

    let manifest_path = output_dir.join(MANIFEST_FILE);
    let mut manifest = String::new();
    for doc in &manifest_docs {
        let rendered = serde_yaml::to_string(doc)
            .map_err(|e| BundleError::Malformed(format!("unwritable manifest: {e}")))?;
        manifest.push_str("---\n");
        manifest.push_str(&rendered);
    }
    fs::write(&manifest_path, manifest)?;

    debug!(
        "Expanded bundle into {} ({} tables)",
        output_dir.display(),
        table_count
    );

    Ok(SplitBundle {
        manifest_path,
        table_count,
    })
}

/// Read the archive, decompressing if it carries the gzip magic.
fn read_archive(archive_path: &Path) -> Result<String> {
    let raw = fs::read(archive_path)?;
    if raw.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(raw.as_slice());
        let mut text = String::new();
        decoder
            .read_to_string(&mut text)
            .map_err(|e| BundleError::Malformed(format!("gzip: {e}")))?;
        Ok(text)
    } else {
        String::from_utf8(raw).map_err(|e| BundleError::Malformed(format!("not utf-8: {e}")))
    }
}
