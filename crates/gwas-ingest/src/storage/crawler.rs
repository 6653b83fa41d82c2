//! Discovery of summary statistics already synced into object storage

use super::{glob::ObjectGlob, ObjectStore, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// Study identifier as it appears between two path separators
static STUDY_ID_IN_PATH: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"/(GCST\d+)/").expect("study id pattern is valid")
});

/// One summary statistics object found in storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedFile {
    /// Full `gs://bucket/key` URI
    pub file_path: String,
    pub study_id: String,
    pub is_synced: bool,
}

/// Synced files with at most one entry per study
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncedFiles {
    files: Vec<SyncedFile>,
}

impl SyncedFiles {
    /// Extract study ids from object URIs.
    ///
    /// URIs without a study id are skipped. When several URIs carry the same
    /// id, the first one listed is kept and a warning names the duplicates.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut duplicated = Vec::new();
        let mut files = Vec::new();

        for path in paths {
            let path = path.into();
            let Some(study_id) = STUDY_ID_IN_PATH
                .captures(&path)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
            else {
                debug!(path = %path, "Skipping object without a study id");
                continue;
            };

            if !seen.insert(study_id.clone()) {
                if !duplicated.contains(&study_id) {
                    duplicated.push(study_id);
                }
                continue;
            }

            files.push(SyncedFile {
                file_path: path,
                study_id,
                is_synced: true,
            });
        }

        if !duplicated.is_empty() {
            warn!(
                study_ids = ?duplicated,
                "Found studies with multiple summary statistics files, keeping one file per study"
            );
        }

        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, study_id: &str) -> bool {
        self.files.iter().any(|f| f.study_id == study_id)
    }

    pub fn study_ids(&self) -> HashSet<&str> {
        self.files.iter().map(|f| f.study_id.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncedFile> {
        self.files.iter()
    }
}

impl IntoIterator for SyncedFiles {
    type Item = SyncedFile;
    type IntoIter = std::vec::IntoIter<SyncedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Lists objects matching a glob and maps them to studies
pub struct SummaryStatisticsCrawler {
    store: Arc<dyn ObjectStore>,
}

impl SummaryStatisticsCrawler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn crawl(&self, glob: &str) -> Result<SyncedFiles> {
        let glob = ObjectGlob::parse(glob)?;
        let keys = self.store.list(glob.bucket(), glob.prefix()).await?;
        let listed = keys.len();

        let uris: Vec<String> = keys
            .into_iter()
            .filter(|key| glob.matches(key))
            .map(|key| format!("gs://{}/{}", glob.bucket(), key))
            .collect();

        let synced = SyncedFiles::from_paths(uris);
        info!(
            bucket = glob.bucket(),
            listed,
            synced = synced.len(),
            "Crawled summary statistics"
        );
        Ok(synced)
    }
}
