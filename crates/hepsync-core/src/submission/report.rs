//! Structural error accumulation for one submission load

use std::collections::BTreeMap;

/// Errors found while loading one bundle, keyed by the offending file.
///
/// The loader keeps going past individual problems so a single pass
/// surfaces the complete error set. A non-empty report means the
/// in-progress aggregate is discarded, never partially committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorReport {
    errors: BTreeMap<String, Vec<String>>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one error message against a file.
    pub fn add(&mut self, file: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(file.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of files with at least one error.
    pub fn file_count(&self) -> usize {
        self.errors.len()
    }

    /// Total number of messages across all files.
    pub fn message_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn messages_for(&self, file: &str) -> &[String] {
        self.errors.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.errors.iter()
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (file, messages) in &self.errors {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{file}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}
