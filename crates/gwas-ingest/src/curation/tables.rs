//! Typed rows for the curation input tables
//!
//! Tables are tab-separated. Headers are checked once at load time; after
//! that, rows are plain structs.

use super::schema::{self, map_downloaded_header};
use super::{CurationError, Result};
use crate::storage::ObjectStore;
use csv::StringRecord;
use gwas_common::StoragePath;
use std::collections::HashMap;
use tracing::debug;

/// Study from a previous curation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CuratedStudy {
    pub study_id: String,
    pub study_type: Option<String>,
    pub analysis_flag: Option<String>,
    pub quality_control: Option<String>,
    pub is_curated: Option<bool>,
    pub pubmed_id: Option<String>,
    pub publication_title: Option<String>,
    pub trait_from_source: Option<String>,
}

/// Study listed in the latest catalog download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedStudy {
    pub study_id: String,
    pub pubmed_id: Option<String>,
    pub publication_title: Option<String>,
    pub trait_from_source: Option<String>,
}

/// Read a table from a local path or a `gs://` URI
pub async fn read_source(store: &dyn ObjectStore, path: &str) -> Result<Vec<u8>> {
    if path.starts_with("gs://") {
        let location = StoragePath::parse(path)?;
        let data = store.get(location.bucket(), location.object()).await?;
        Ok(data.to_vec())
    } else {
        tokio::fs::read(path).await.map_err(|source| CurationError::Io {
            path: path.to_string(),
            source,
        })
    }
}

/// Header positions of a validated table
struct Columns<'a> {
    path: &'a str,
    index: HashMap<String, usize>,
}

impl<'a> Columns<'a> {
    fn new(path: &'a str, headers: &StringRecord, required: &[&str]) -> Result<Self> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();

        let missing: Vec<String> = required
            .iter()
            .filter(|column| !index.contains_key(**column))
            .map(|column| column.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(CurationError::MissingColumns {
                path: path.to_string(),
                columns: missing,
            });
        }

        Ok(Self { path, index })
    }

    /// Trimmed value, `None` when empty
    fn optional(&self, record: &StringRecord, column: &str) -> Option<String> {
        self.index
            .get(column)
            .and_then(|i| record.get(*i))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn study_id(&self, record: &StringRecord) -> Result<String> {
        self.optional(record, schema::STUDY_ID)
            .ok_or_else(|| CurationError::MissingStudyId {
                path: self.path.to_string(),
                line: record.position().map(|p| p.line()).unwrap_or(0),
            })
    }

    fn flag(&self, record: &StringRecord, column: &'static str) -> Result<Option<bool>> {
        match self.optional(record, column) {
            None => Ok(None),
            Some(value) => parse_flag(&value).map(Some).ok_or(CurationError::InvalidValue {
                path: self.path.to_string(),
                column,
                value,
            }),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn reader(data: &[u8], quote: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quote(quote)
        .flexible(true)
        .from_reader(data)
}

fn csv_error(path: &str) -> impl Fn(csv::Error) -> CurationError + '_ {
    move |source| CurationError::Csv {
        path: path.to_string(),
        source,
    }
}

/// Parse a previous curation table.
///
/// Columns beyond [`schema::CURATION_COLUMNS`] (such as an earlier `status`)
/// are ignored.
pub fn parse_curated_studies(path: &str, data: &[u8]) -> Result<Vec<CuratedStudy>> {
    let mut reader = reader(data, b'"');
    let headers = reader.headers().map_err(csv_error(path))?.clone();
    let columns = Columns::new(path, &headers, &schema::CURATION_COLUMNS)?;

    let mut studies = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error(path))?;
        studies.push(CuratedStudy {
            study_id: columns.study_id(&record)?,
            study_type: columns.optional(&record, schema::STUDY_TYPE),
            analysis_flag: columns.optional(&record, schema::ANALYSIS_FLAG),
            quality_control: columns.optional(&record, schema::QUALITY_CONTROL),
            is_curated: columns.flag(&record, schema::IS_CURATED)?,
            pubmed_id: columns.optional(&record, schema::PUBMED_ID),
            publication_title: columns.optional(&record, schema::PUBLICATION_TITLE),
            trait_from_source: columns.optional(&record, schema::TRAIT_FROM_SOURCE),
        });
    }

    debug!("Parsed {} curated studies from {}", studies.len(), path);
    Ok(studies)
}

/// Parse the catalog studies download.
///
/// Quoting uses backticks so double quotes inside titles are kept verbatim.
/// Headers are renamed through [`schema::DOWNLOADED_STUDIES_HEADERS`].
pub fn parse_published_studies(path: &str, data: &[u8]) -> Result<Vec<PublishedStudy>> {
    let mut reader = reader(data, b'`');
    let headers: StringRecord = reader
        .headers()
        .map_err(csv_error(path))?
        .iter()
        .map(map_downloaded_header)
        .collect();
    let columns = Columns::new(path, &headers, &schema::DOWNLOADED_STUDIES_COLUMNS)?;

    let mut studies = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error(path))?;
        studies.push(PublishedStudy {
            study_id: columns.study_id(&record)?,
            pubmed_id: columns.optional(&record, schema::PUBMED_ID),
            publication_title: columns.optional(&record, schema::PUBLICATION_TITLE),
            trait_from_source: columns.optional(&record, schema::TRAIT_FROM_SOURCE),
        });
    }

    debug!("Parsed {} published studies from {}", studies.len(), path);
    Ok(studies)
}
