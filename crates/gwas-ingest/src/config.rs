//! Runtime configuration for the ingest binary
//!
//! Values come from the environment (a `.env` file is loaded first when
//! present). Every setting has a default, so an empty environment yields a
//! working anonymous-FTP / GCS configuration.

use crate::storage::StorageConfig;
use crate::transfer::{RetryPolicy, SuppaFtpConnector, TransferError};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_FTP_PORT: u16 = 21;
pub const DEFAULT_FTP_USERNAME: &str = "anonymous";
pub const DEFAULT_FTP_PASSWORD: &str = "anonymous";
/// Bytes per read from an FTP data stream
pub const DEFAULT_FTP_BLOCK_SIZE: usize = 65536;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 1;
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpConfig {
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub block_size: usize,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_FTP_PORT,
            username: DEFAULT_FTP_USERNAME.to_string(),
            password: DEFAULT_FTP_PASSWORD.to_string(),
            block_size: DEFAULT_FTP_BLOCK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    /// Upper bound on jobs in flight, and on jobs per batch from the CLI
    pub max_concurrent_transfers: usize,
    pub http_timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_secs: DEFAULT_INITIAL_BACKOFF_SECS,
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    pub storage: StorageConfig,
    pub ftp: FtpConfig,
    pub transfer: TransferConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl IngestConfig {
    /// Load configuration from `.env` and the environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            storage: StorageConfig::from_env(),
            ftp: FtpConfig {
                port: env_or("GWAS_FTP_PORT", DEFAULT_FTP_PORT),
                username: env::var("GWAS_FTP_USERNAME")
                    .unwrap_or_else(|_| DEFAULT_FTP_USERNAME.to_string()),
                password: env::var("GWAS_FTP_PASSWORD")
                    .unwrap_or_else(|_| DEFAULT_FTP_PASSWORD.to_string()),
                block_size: env_or("GWAS_FTP_BLOCK_SIZE", DEFAULT_FTP_BLOCK_SIZE),
            },
            transfer: TransferConfig {
                max_attempts: env_or("GWAS_TRANSFER_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
                initial_backoff_secs: env_or(
                    "GWAS_TRANSFER_INITIAL_BACKOFF_SECS",
                    DEFAULT_INITIAL_BACKOFF_SECS,
                ),
                max_concurrent_transfers: env_or(
                    "GWAS_MAX_CONCURRENT_TRANSFERS",
                    DEFAULT_MAX_CONCURRENT_TRANSFERS,
                ),
                http_timeout_secs: env_or("GWAS_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.transfer.max_attempts == 0 {
            anyhow::bail!("GWAS_TRANSFER_MAX_ATTEMPTS must be greater than 0");
        }
        if self.transfer.max_concurrent_transfers == 0 {
            anyhow::bail!("GWAS_MAX_CONCURRENT_TRANSFERS must be greater than 0");
        }
        if self.ftp.block_size == 0 {
            anyhow::bail!("GWAS_FTP_BLOCK_SIZE must be greater than 0");
        }
        if self.transfer.http_timeout_secs == 0 {
            anyhow::bail!("GWAS_HTTP_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy<TransferError> {
        RetryPolicy::for_transfers()
            .with_max_attempts(self.transfer.max_attempts)
            .with_initial_backoff(Duration::from_secs(self.transfer.initial_backoff_secs))
    }

    pub fn ftp_connector(&self) -> SuppaFtpConnector {
        SuppaFtpConnector {
            port: self.ftp.port,
            username: self.ftp.username.clone(),
            password: self.ftp.password.clone(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer.http_timeout_secs)
    }
}
