//! Curation manifest reconciliation
//!
//! Joins the previous curation, the freshly published catalog studies and
//! the summary statistics synced into storage, assigning every study one
//! [`CurationStatus`].

use crate::storage::StorageError;
use gwas_common::UriError;
use thiserror::Error;

pub mod reconcile;
pub mod schema;
pub mod tables;

pub use reconcile::{CurationManifest, GwasCatalogCuration, ManifestRow};
pub use schema::CurationStatus;
pub use tables::{CuratedStudy, PublishedStudy};

pub type Result<T> = std::result::Result<T, CurationError>;

#[derive(Error, Debug)]
pub enum CurationError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Uri(#[from] UriError),

    #[error("Malformed table {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Table {path} is missing required columns: {}", .columns.join(", "))]
    MissingColumns { path: String, columns: Vec<String> },

    #[error("Row {line} of {path} has no studyId")]
    MissingStudyId { path: String, line: u64 },

    #[error("Invalid value '{value}' for column {column} in {path}")]
    InvalidValue {
        path: String,
        column: &'static str,
        value: String,
    },

    #[error("Previous curation table {path} is empty")]
    PreviousCurationEmpty { path: String },

    #[error("Downloaded studies table {path} is empty")]
    DownloadedStudiesEmpty { path: String },

    #[error("Duplicate studyId values in {stage}: {}", .ids.join(", "))]
    DuplicateStudyIds { stage: &'static str, ids: Vec<String> },

    #[error("Curation produced {actual} rows, expected {expected}")]
    RowCountMismatch { expected: usize, actual: usize },
}
