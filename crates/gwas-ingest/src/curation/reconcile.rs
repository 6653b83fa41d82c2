use super::schema::{self, CurationStatus};
use super::tables::{self, CuratedStudy, PublishedStudy};
use super::{CurationError, Result};
use crate::storage::{ObjectStore, SummaryStatisticsCrawler, SyncedFiles};
use crate::transfer::Tabular;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};

/// One study in the reconciliation output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    pub study_id: String,
    pub study_type: Option<String>,
    pub analysis_flag: Option<String>,
    pub quality_control: Option<String>,
    pub is_curated: bool,
    pub pubmed_id: Option<String>,
    pub publication_title: Option<String>,
    pub trait_from_source: Option<String>,
    pub status: CurationStatus,
}

impl ManifestRow {
    fn from_previous(study: &CuratedStudy, status: CurationStatus) -> Self {
        Self {
            study_id: study.study_id.clone(),
            study_type: study.study_type.clone(),
            analysis_flag: study.analysis_flag.clone(),
            quality_control: study.quality_control.clone(),
            is_curated: study.is_curated.unwrap_or(false),
            pubmed_id: study.pubmed_id.clone(),
            publication_title: study.publication_title.clone(),
            trait_from_source: study.trait_from_source.clone(),
            status,
        }
    }

    fn from_published(study: &PublishedStudy, status: CurationStatus) -> Self {
        Self {
            study_id: study.study_id.clone(),
            study_type: None,
            analysis_flag: None,
            quality_control: None,
            is_curated: false,
            pubmed_id: study.pubmed_id.clone(),
            publication_title: study.publication_title.clone(),
            trait_from_source: study.trait_from_source.clone(),
            status,
        }
    }

    fn record(&self) -> [&str; 9] {
        fn opt(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("")
        }

        [
            self.study_id.as_str(),
            opt(&self.study_type),
            opt(&self.analysis_flag),
            opt(&self.quality_control),
            if self.is_curated { "true" } else { "false" },
            opt(&self.pubmed_id),
            opt(&self.publication_title),
            opt(&self.trait_from_source),
            self.status.as_str(),
        ]
    }
}

/// Reconciled curation table, unique by study
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurationManifest {
    rows: Vec<ManifestRow>,
}

impl CurationManifest {
    pub fn rows(&self) -> &[ManifestRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn status_of(&self, study_id: &str) -> Option<CurationStatus> {
        self.rows
            .iter()
            .find(|row| row.study_id == study_id)
            .map(|row| row.status)
    }

    pub fn count_by_status(&self) -> BTreeMap<CurationStatus, usize> {
        let mut counts: BTreeMap<CurationStatus, usize> =
            CurationStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for row in &self.rows {
            *counts.entry(row.status).or_default() += 1;
        }
        counts
    }

    /// Rows flagged as curated by a curator
    pub fn curated_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_curated).count()
    }
}

impl Tabular for CurationManifest {
    fn name(&self) -> &str {
        "curation_manifest"
    }

    fn to_tsv(&self) -> std::result::Result<Vec<u8>, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());

        writer.write_record(schema::MANIFEST_COLUMNS)?;
        for row in &self.rows {
            writer.write_record(row.record())?;
        }

        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

/// The three inputs of a reconciliation
#[derive(Debug, Clone)]
pub struct GwasCatalogCuration {
    previous: Vec<CuratedStudy>,
    studies: Vec<PublishedStudy>,
    synced: SyncedFiles,
}

impl GwasCatalogCuration {
    pub fn new(previous: Vec<CuratedStudy>, studies: Vec<PublishedStudy>, synced: SyncedFiles) -> Self {
        Self {
            previous,
            studies,
            synced,
        }
    }

    /// Load both tables (local paths or `gs://` URIs) and crawl storage for
    /// synced summary statistics.
    #[instrument(skip(store))]
    pub async fn from_previous_curation(
        store: Arc<dyn ObjectStore>,
        previous_curation_path: &str,
        downloaded_studies_path: &str,
        summary_statistics_glob: &str,
    ) -> Result<Self> {
        let data = tables::read_source(store.as_ref(), previous_curation_path).await?;
        let previous = tables::parse_curated_studies(previous_curation_path, &data)?;
        if previous.is_empty() {
            return Err(CurationError::PreviousCurationEmpty {
                path: previous_curation_path.to_string(),
            });
        }
        info!("Loaded {} previously curated studies", previous.len());

        let data = tables::read_source(store.as_ref(), downloaded_studies_path).await?;
        let studies = tables::parse_published_studies(downloaded_studies_path, &data)?;
        if studies.is_empty() {
            return Err(CurationError::DownloadedStudiesEmpty {
                path: downloaded_studies_path.to_string(),
            });
        }
        info!("Loaded {} published studies", studies.len());

        let synced = SummaryStatisticsCrawler::new(store)
            .crawl(summary_statistics_glob)
            .await?;

        Ok(Self::new(previous, studies, synced))
    }

    pub fn previous(&self) -> &[CuratedStudy] {
        &self.previous
    }

    pub fn studies(&self) -> &[PublishedStudy] {
        &self.studies
    }

    pub fn synced(&self) -> &SyncedFiles {
        &self.synced
    }

    /// Classify every known study.
    ///
    /// Output order: removed, then still curated (previous order), then new
    /// studies (catalog order).
    pub fn result(&self) -> Result<CurationManifest> {
        let published: HashSet<&str> = self.studies.iter().map(|s| s.study_id.as_str()).collect();
        let previously_curated: HashSet<&str> =
            self.previous.iter().map(|s| s.study_id.as_str()).collect();
        let expected = previously_curated.union(&published).count();

        let (still_published, removed): (Vec<&CuratedStudy>, Vec<&CuratedStudy>) = self
            .previous
            .iter()
            .partition(|study| published.contains(study.study_id.as_str()));

        let mut rows: Vec<ManifestRow> = removed
            .iter()
            .map(|study| ManifestRow::from_previous(study, CurationStatus::Removed))
            .chain(
                still_published
                    .iter()
                    .map(|study| ManifestRow::from_previous(study, CurationStatus::Curated)),
            )
            .collect();
        ensure_unique("previous curation", &rows)?;

        let synced = self.synced.study_ids();
        let new_studies: Vec<ManifestRow> = self
            .studies
            .iter()
            .filter(|study| !previously_curated.contains(study.study_id.as_str()))
            .map(|study| {
                let status = if synced.contains(study.study_id.as_str()) {
                    CurationStatus::ToCurate
                } else {
                    CurationStatus::NoSummaryStatistics
                };
                ManifestRow::from_published(study, status)
            })
            .collect();
        let new_count = new_studies.len();

        rows.extend(new_studies);
        if rows.len() != expected {
            return Err(CurationError::RowCountMismatch {
                expected,
                actual: rows.len(),
            });
        }
        ensure_unique("curation manifest", &rows)?;

        let manifest = CurationManifest { rows };
        info!(
            removed = removed.len(),
            curated = still_published.len(),
            new = new_count,
            "Reconciled {} studies",
            manifest.len()
        );
        Ok(manifest)
    }
}

fn ensure_unique(stage: &'static str, rows: &[ManifestRow]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut duplicated: Vec<String> = Vec::new();
    for row in rows {
        if !seen.insert(row.study_id.as_str()) && !duplicated.contains(&row.study_id) {
            duplicated.push(row.study_id.clone());
        }
    }

    if duplicated.is_empty() {
        Ok(())
    } else {
        Err(CurationError::DuplicateStudyIds {
            stage,
            ids: duplicated,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn curated(id: &str) -> CuratedStudy {
        CuratedStudy {
            study_id: id.to_string(),
            study_type: Some("GWAS".to_string()),
            is_curated: Some(true),
            ..CuratedStudy::default()
        }
    }

    fn published(id: &str) -> PublishedStudy {
        PublishedStudy {
            study_id: id.to_string(),
            pubmed_id: Some("12345".to_string()),
            ..PublishedStudy::default()
        }
    }

    fn synced(ids: &[&str]) -> SyncedFiles {
        SyncedFiles::from_paths(ids.iter().map(|id| format!("gs://bucket/sumstats/{}/data.tsv", id)))
    }

    fn reference_curation() -> GwasCatalogCuration {
        GwasCatalogCuration::new(
            ["GCST000001", "GCST000002", "GCST000003", "GCST000004"]
                .into_iter()
                .map(curated)
                .collect(),
            ["GCST000001", "GCST000002", "GCST000003", "GCST000005", "GCST000006"]
                .into_iter()
                .map(published)
                .collect(),
            synced(&["GCST000001", "GCST000002", "GCST000003", "GCST000005"]),
        )
    }

    #[test]
    fn test_statuses() {
        let manifest = reference_curation().result().unwrap();

        assert_eq!(manifest.len(), 6);
        assert_eq!(manifest.status_of("GCST000004"), Some(CurationStatus::Removed));
        for id in ["GCST000001", "GCST000002", "GCST000003"] {
            assert_eq!(manifest.status_of(id), Some(CurationStatus::Curated));
        }
        assert_eq!(manifest.status_of("GCST000005"), Some(CurationStatus::ToCurate));
        assert_eq!(
            manifest.status_of("GCST000006"),
            Some(CurationStatus::NoSummaryStatistics)
        );
        assert_eq!(manifest.curated_count(), 4);
    }

    #[test]
    fn test_output_order() {
        let manifest = reference_curation().result().unwrap();
        let ids: Vec<&str> = manifest.rows().iter().map(|r| r.study_id.as_str()).collect();
        assert_eq!(
            ids,
            ["GCST000004", "GCST000001", "GCST000002", "GCST000003", "GCST000005", "GCST000006"]
        );
    }

    #[test]
    fn test_new_studies_have_no_curation_fields() {
        let manifest = reference_curation().result().unwrap();
        let row = manifest.rows().iter().find(|r| r.study_id == "GCST000005").unwrap();
        assert_eq!(row.study_type, None);
        assert_eq!(row.analysis_flag, None);
        assert_eq!(row.quality_control, None);
        assert!(!row.is_curated);
        assert_eq!(row.pubmed_id.as_deref(), Some("12345"));
    }

    #[test]
    fn test_missing_is_curated_becomes_false() {
        let mut previous = curated("GCST000001");
        previous.is_curated = None;
        let manifest = GwasCatalogCuration::new(vec![previous], vec![], SyncedFiles::default())
            .result()
            .unwrap();
        assert!(!manifest.rows()[0].is_curated);
        assert_eq!(manifest.status_of("GCST000001"), Some(CurationStatus::Removed));
    }

    #[test]
    fn test_duplicate_previous_studies_are_fatal() {
        let curation = GwasCatalogCuration::new(
            vec![curated("GCST000001"), curated("GCST000001")],
            vec![published("GCST000001")],
            SyncedFiles::default(),
        );
        match curation.result().unwrap_err() {
            CurationError::DuplicateStudyIds { ids, .. } => assert_eq!(ids, vec!["GCST000001"]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_new_studies_break_row_count() {
        let curation = GwasCatalogCuration::new(
            vec![curated("GCST000001"), curated("GCST000002")],
            vec![
                published("GCST000001"),
                published("GCST000003"),
                published("GCST000003"),
                published("GCST000004"),
            ],
            SyncedFiles::default(),
        );
        // Two previous studies plus two distinct new ones
        match curation.result().unwrap_err() {
            CurationError::RowCountMismatch { expected, actual } => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 5);
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_repeated_previously_curated_study_is_not_duplicated() {
        let manifest = GwasCatalogCuration::new(
            vec![curated("GCST000001")],
            vec![published("GCST000001"), published("GCST000001"), published("GCST000002")],
            SyncedFiles::default(),
        )
        .result()
        .unwrap();
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn test_count_by_status() {
        let counts = reference_curation().result().unwrap().count_by_status();
        assert_eq!(counts[&CurationStatus::Removed], 1);
        assert_eq!(counts[&CurationStatus::Curated], 3);
        assert_eq!(counts[&CurationStatus::ToCurate], 1);
        assert_eq!(counts[&CurationStatus::NoSummaryStatistics], 1);
    }

    #[test]
    fn test_to_tsv() {
        let manifest = GwasCatalogCuration::new(
            vec![curated("GCST000001")],
            vec![published("GCST000001"), published("GCST000002")],
            SyncedFiles::default(),
        )
        .result()
        .unwrap();

        let tsv = String::from_utf8(manifest.to_tsv().unwrap()).unwrap();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines[0], schema::MANIFEST_COLUMNS.join("\t"));
        assert_eq!(lines[1], "GCST000001\tGWAS\t\t\ttrue\t\t\t\tcurated");
        assert_eq!(
            lines[2],
            "GCST000002\t\t\t\tfalse\t12345\t\t\tno_summary_statistics"
        );
    }
}
