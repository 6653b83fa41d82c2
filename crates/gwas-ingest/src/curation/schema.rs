//! Column names and status values of the curation tables

use std::fmt;
use std::str::FromStr;

pub const STUDY_ID: &str = "studyId";
pub const STUDY_TYPE: &str = "studyType";
pub const ANALYSIS_FLAG: &str = "analysisFlag";
pub const QUALITY_CONTROL: &str = "qualityControl";
pub const IS_CURATED: &str = "isCurated";
pub const PUBMED_ID: &str = "pubmedId";
pub const PUBLICATION_TITLE: &str = "publicationTitle";
pub const TRAIT_FROM_SOURCE: &str = "traitFromSource";
pub const STATUS: &str = "status";

/// Required columns of a previous curation table, in output order
pub const CURATION_COLUMNS: [&str; 8] = [
    STUDY_ID,
    STUDY_TYPE,
    ANALYSIS_FLAG,
    QUALITY_CONTROL,
    IS_CURATED,
    PUBMED_ID,
    PUBLICATION_TITLE,
    TRAIT_FROM_SOURCE,
];

/// Columns of the reconciliation output
pub const MANIFEST_COLUMNS: [&str; 9] = [
    STUDY_ID,
    STUDY_TYPE,
    ANALYSIS_FLAG,
    QUALITY_CONTROL,
    IS_CURATED,
    PUBMED_ID,
    PUBLICATION_TITLE,
    TRAIT_FROM_SOURCE,
    STATUS,
];

/// Catalog download headers and the columns they become
pub const DOWNLOADED_STUDIES_HEADERS: [(&str, &str); 4] = [
    ("STUDY ACCESSION", STUDY_ID),
    ("STUDY", PUBLICATION_TITLE),
    ("PUBMED ID", PUBMED_ID),
    ("DISEASE/TRAIT", TRAIT_FROM_SOURCE),
];

/// Columns required from the downloaded studies after renaming
pub const DOWNLOADED_STUDIES_COLUMNS: [&str; 4] =
    [STUDY_ID, PUBLICATION_TITLE, PUBMED_ID, TRAIT_FROM_SOURCE];

/// Internal column name for a catalog download header
pub fn map_downloaded_header(header: &str) -> &str {
    DOWNLOADED_STUDIES_HEADERS
        .iter()
        .find(|(source, _)| *source == header.trim())
        .map(|(_, target)| *target)
        .unwrap_or(header)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CurationStatus {
    /// Previously curated, no longer published
    Removed,
    /// Previously curated, still published
    Curated,
    /// New, with summary statistics in storage
    ToCurate,
    /// New, nothing synced yet
    NoSummaryStatistics,
}

impl CurationStatus {
    pub const ALL: [CurationStatus; 4] = [
        CurationStatus::Removed,
        CurationStatus::Curated,
        CurationStatus::ToCurate,
        CurationStatus::NoSummaryStatistics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CurationStatus::Removed => "removed",
            CurationStatus::Curated => "curated",
            CurationStatus::ToCurate => "to_curate",
            CurationStatus::NoSummaryStatistics => "no_summary_statistics",
        }
    }
}

impl fmt::Display for CurationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown curation status: {}", s))
    }
}
