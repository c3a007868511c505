//! HEPSync Common Library
//!
//! Shared identifier types and logging initialization for the hepsync
//! workspace members.

pub mod ids;
pub mod logging;

pub use ids::{InspireId, RecordId};
