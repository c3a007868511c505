//! Submission loader
//!
//! Parses an expanded bundle (manifest plus per-table files) into a
//! submission aggregate. Structural problems never abort the pass: every
//! unparsable file, missing referenced table, and invalid field is
//! appended to the [`ErrorReport`] under the offending file name, so one
//! pass surfaces the complete error set. The staged aggregate is
//! committed to the store only when the report comes back empty;
//! otherwise nothing durable is written.

use hepsync_common::ids::RecordId;
use serde::Deserialize;
use serde_yaml::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::{self, SubmissionStore};
use crate::submission::models::{DataTable, PublicationRecord};
use crate::submission::report::ErrorReport;

/// Loads expanded bundles into the store, all-or-nothing per record.
pub struct SubmissionLoader {
    store: Arc<dyn SubmissionStore>,
}

impl SubmissionLoader {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }

    /// Load the bundle under `table_dir` into the record `recid`.
    ///
    /// Returns the accumulated report; an `Err` is reserved for
    /// store-layer failures. `update` only affects bookkeeping: the
    /// commit itself replaces whatever state the record had.
    pub async fn load(
        &self,
        manifest_path: &Path,
        table_dir: &Path,
        recid: RecordId,
        publication: &PublicationRecord,
        update: bool,
    ) -> store::Result<ErrorReport> {
        let mut report = ErrorReport::new();
        let manifest_name = file_name(manifest_path);

        let text = match fs::read_to_string(manifest_path) {
            Ok(text) => text,
            Err(e) => {
                report.add(manifest_name, format!("cannot read manifest: {e}"));
                return Ok(report);
            },
        };

        let mut tables = Vec::new();
        let mut index = 0usize;
        for document in serde_yaml::Deserializer::from_str(&text) {
            let value = match Value::deserialize(document) {
                Ok(value) => value,
                Err(e) => {
                    report.add(&manifest_name, format!("unparsable manifest document: {e}"));
                    continue;
                },
            };
            // Header documents carry no table name and need no validation.
            if value.get("name").is_none() {
                continue;
            }
            index += 1;
            if let Some(table) = self.stage_table(&value, index, table_dir, &manifest_name, &mut report) {
                tables.push(table);
            }
        }

        if !report.is_empty() {
            warn!(
                %recid,
                files = report.file_count(),
                errors = report.message_count(),
                "Submission load failed; nothing committed"
            );
            return Ok(report);
        }

        self.store.commit(recid, publication, tables).await?;
        info!(
            %recid,
            tables = index,
            "Committed {} submission",
            if update { "updated" } else { "new" }
        );
        Ok(report)
    }

    /// Validate one manifest table entry and stage its payload.
    fn stage_table(
        &self,
        entry: &Value,
        index: usize,
        table_dir: &Path,
        manifest_name: &str,
        report: &mut ErrorReport,
    ) -> Option<DataTable> {
        let name = match entry.get("name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => {
                report.add(manifest_name, format!("table {index} has a missing or empty name"));
                String::new()
            },
        };

        let Some(data_file) = entry.get("data_file").and_then(Value::as_str) else {
            report.add(
                manifest_name,
                format!("table {index} ({name}) has no data_file reference"),
            );
            return None;
        };

        let payload_text = match fs::read_to_string(table_dir.join(data_file)) {
            Ok(text) => text,
            Err(_) => {
                report.add(data_file, "referenced table file is missing");
                return None;
            },
        };

        let payload: Value = match serde_yaml::from_str(&payload_text) {
            Ok(payload) => payload,
            Err(e) => {
                report.add(data_file, format!("unparsable table file: {e}"));
                return None;
            },
        };

        validate_table(&payload, data_file, report);

        let payload = match serde_json::to_value(&payload) {
            Ok(payload) => payload,
            Err(e) => {
                report.add(data_file, format!("unrepresentable table payload: {e}"));
                return None;
            },
        };

        Some(DataTable {
            index,
            name,
            payload,
        })
    }
}

/// Check the required table fields: data points and qualifiers.
fn validate_table(payload: &Value, file: &str, report: &mut ErrorReport) {
    if payload.as_mapping().is_none() {
        report.add(file, "table payload is not a mapping");
        return;
    }

    match payload.get("independent_variables") {
        Some(v) if v.is_sequence() => {},
        Some(_) => report.add(file, "independent_variables must be a sequence"),
        None => report.add(file, "missing independent_variables"),
    }

    match payload.get("dependent_variables") {
        Some(v) if v.is_sequence() => {
            if let Some(dependents) = v.as_sequence() {
                for (i, dependent) in dependents.iter().enumerate() {
                    let ordinal = i + 1;
                    if dependent.get("header").is_none() {
                        report.add(file, format!("dependent variable {ordinal} has no header"));
                    }
                    match dependent.get("qualifiers") {
                        Some(q) if q.is_sequence() => {},
                        Some(_) => report.add(
                            file,
                            format!("dependent variable {ordinal} qualifiers must be a sequence"),
                        ),
                        None => report.add(
                            file,
                            format!("dependent variable {ordinal} has no qualifiers"),
                        ),
                    }
                    match dependent.get("values") {
                        Some(x) if x.is_sequence() => {},
                        _ => report.add(file, format!("dependent variable {ordinal} has no values")),
                    }
                }
            }
        },
        Some(_) => report.add(file, "dependent_variables must be a sequence"),
        None => report.add(file, "missing dependent_variables"),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
