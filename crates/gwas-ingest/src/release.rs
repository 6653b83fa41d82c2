//! Catalog release metadata
//!
//! The catalog publishes statistics about its current release as a flat JSON
//! object. Only `efoversion` and `ensemblbuild` are interpreted; every other
//! key is kept and logged.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_RELEASE_INFO_URL: &str = "https://www.ebi.ac.uk/gwas/api/search/stats";

#[derive(Error, Debug)]
pub enum ReleaseInfoError {
    #[error("Failed to fetch release info from {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch release info: HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Release info from {url} is not a JSON object")]
    NotAnObject { url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseInfo {
    fields: Map<String, Value>,
}

impl ReleaseInfo {
    pub fn from_json(url: &str, value: Value) -> Result<Self, ReleaseInfoError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(ReleaseInfoError::NotAnObject {
                url: url.to_string(),
            }),
        }
    }

    /// EFO release diseases were mapped to
    pub fn efo_version(&self) -> Option<String> {
        self.text("efoversion")
    }

    /// Ensembl release genes were mapped to
    pub fn ensembl_build(&self) -> Option<String> {
        self.text("ensemblbuild")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn log(&self) {
        for (key, value) in &self.fields {
            debug!("{}: {}", key, value);
        }

        let efo_version = self.efo_version().unwrap_or_else(|| "unknown".to_string());
        let ensembl_build = self.ensembl_build().unwrap_or_else(|| "unknown".to_string());
        info!("Diseases were mapped to {} EFO release", efo_version);
        info!("Genes were mapped to v{} Ensembl release", ensembl_build);
    }
}

pub async fn fetch_release_info(
    client: &reqwest::Client,
    url: &str,
) -> Result<ReleaseInfo, ReleaseInfoError> {
    let request_error = |source| ReleaseInfoError::Request {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(request_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ReleaseInfoError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let value: Value = response.json().await.map_err(request_error)?;
    let info = ReleaseInfo::from_json(url, value)?;
    info.log();
    Ok(info)
}
