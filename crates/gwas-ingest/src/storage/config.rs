use serde::{Deserialize, Serialize};
use std::env;

/// GCS S3-interoperability endpoint
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_STORAGE_REGION: &str = "auto";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    /// HMAC access key; when unset the default AWS credential chain is used
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: Some(DEFAULT_STORAGE_ENDPOINT.to_string()),
            region: DEFAULT_STORAGE_REGION.to_string(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: Some(
                env::var("GWAS_STORAGE_ENDPOINT")
                    .unwrap_or_else(|_| DEFAULT_STORAGE_ENDPOINT.to_string()),
            ),
            region: env::var("GWAS_STORAGE_REGION")
                .unwrap_or_else(|_| DEFAULT_STORAGE_REGION.to_string()),
            access_key: env::var("GWAS_STORAGE_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .ok(),
            secret_key: env::var("GWAS_STORAGE_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .ok(),
            path_style: env::var("GWAS_STORAGE_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Local S3-compatible server such as MinIO
    pub fn for_local(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }

    /// Static credentials, if both halves are present
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (self.access_key.as_deref(), self.secret_key.as_deref()) {
            (Some(access), Some(secret)) => Some((access, secret)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_for_local() {
        let config = StorageConfig::for_local("http://localhost:9000");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.path_style);
        assert_eq!(config.static_credentials(), Some(("minioadmin", "minioadmin")));
    }

    #[test]
    #[serial]
    fn test_from_env_falls_back_to_aws_keys() {
        env::remove_var("GWAS_STORAGE_ACCESS_KEY");
        env::remove_var("GWAS_STORAGE_SECRET_KEY");
        env::remove_var("GWAS_STORAGE_ENDPOINT");
        env::set_var("AWS_ACCESS_KEY_ID", "hmac_key");
        env::set_var("AWS_SECRET_ACCESS_KEY", "hmac_secret");

        let config = StorageConfig::from_env();
        assert_eq!(config.endpoint.as_deref(), Some(DEFAULT_STORAGE_ENDPOINT));
        assert_eq!(config.static_credentials(), Some(("hmac_key", "hmac_secret")));

        env::remove_var("AWS_ACCESS_KEY_ID");
        env::remove_var("AWS_SECRET_ACCESS_KEY");
    }

    #[test]
    fn test_partial_credentials_are_ignored() {
        let config = StorageConfig {
            access_key: Some("key".to_string()),
            ..StorageConfig::default()
        };
        assert_eq!(config.static_credentials(), None);
    }
}
