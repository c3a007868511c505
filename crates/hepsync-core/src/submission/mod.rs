//! Submission aggregates
//!
//! The durable model of one publication's submission (metadata plus
//! ordered data tables) and the all-or-nothing loader that builds it
//! from an expanded bundle.

pub mod loader;
pub mod models;
pub mod report;

pub use loader::SubmissionLoader;
pub use models::{DataTable, PublicationRecord, Submission, SubmissionStatus};
pub use report::ErrorReport;
