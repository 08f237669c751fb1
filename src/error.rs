//! Error taxonomy for the ingest, aggregation and export stages.
//!
//! Every stage returns [`Result`], so a failing upload short-circuits before
//! anything reaches the store. [`GcmmError::kind`] gives the coarse class an
//! outer serving layer needs to pick a status code.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, GcmmError>;

/// Coarse error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or insufficient columns
    Schema,
    /// Unreadable input, wrong extension, empty sheet
    Format,
    /// A cell or payload value failed to decode
    Data,
    /// Unknown objective or axis id
    NotFound,
    /// Failure after the input was structurally valid
    Internal,
}

#[derive(Debug, Error)]
pub enum GcmmError {
    #[error("Spreadsheet should have at least {expected} columns, but found {found}")]
    InsufficientColumns { expected: usize, found: usize },

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid file format: {0}")]
    Format(String),

    #[error("Invalid value '{value}' at {location}: {reason}")]
    Data {
        location: String,
        value: String,
        reason: String,
    },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GcmmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GcmmError::InsufficientColumns { .. } | GcmmError::MissingColumns(_) => {
                ErrorKind::Schema
            }
            GcmmError::Format(_) => ErrorKind::Format,
            GcmmError::Data { .. } => ErrorKind::Data,
            GcmmError::NotFound { .. } => ErrorKind::NotFound,
            GcmmError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a [`GcmmError::Data`].
    pub fn data(
        location: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GcmmError::Data {
            location: location.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        GcmmError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<zip::result::ZipError> for GcmmError {
    fn from(e: zip::result::ZipError) -> Self {
        GcmmError::Format(format!("not a readable spreadsheet archive ({e})"))
    }
}

impl From<rust_xlsxwriter::XlsxError> for GcmmError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        GcmmError::Internal(format!("failed to write workbook: {e}"))
    }
}

impl From<serde_json::Error> for GcmmError {
    fn from(e: serde_json::Error) -> Self {
        GcmmError::Internal(format!("serialization failed: {e}"))
    }
}
