//! GCMM Toolkit
//!
//! Ingests a GCMM maturity-assessment spreadsheet (Axes → Domains →
//! Objectives, each scored against five maturity levels), aggregates scores,
//! and exports the model back as spreadsheets or a narrative report.
//!
//! This library provides:
//! - `sheet`: xlsx/csv readers producing a plain cell table
//! - `schema`: the three column layouts (evaluation, profile, french)
//! - `parser`: header validation and typed row decoding
//! - `hierarchy`: folds rows into the three-level tree
//! - `aggregate`: domain, axis and global scores plus radar data
//! - `flatten`: tree back to rows, with the recommendation range rule
//! - `xlsx_export` / `report`: spreadsheet, CSV and DOCX writers
//! - `bulk`: client-authored hierarchy payloads
//! - `store`: the single live dataset behind a lock
//!
//! Binaries:
//! - `gcmm`: command-line front end over the store

pub mod aggregate;
pub mod bulk;
pub mod config;
pub mod error;
pub mod flatten;
pub mod hierarchy;
pub mod model;
pub mod parser;
pub mod report;
pub mod schema;
pub mod sheet;
pub mod store;
pub mod xlsx_export;

pub use config::ToolkitConfig;
pub use error::{ErrorKind, GcmmError, Result};
pub use model::{Assessment, Axis, Dataset, Domain, Level, Objective, RadarEntry};
pub use schema::{Schema, SchemaVariant};
pub use store::{EvaluateOutcome, EvaluationUpdate, Store, UploadSummary};
