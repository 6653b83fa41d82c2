//! Transfer of remote files into object storage
//!
//! A transfer job moves one source (FTP file, HTTP resource or in-memory
//! table) to one `gs://` destination. Jobs implement [`Transferable`] and are
//! batched by [`TransferManager`].
//!
//! ```rust,ignore
//! let job = FtpToStorage::new(
//!     "ftp://ftp.ebi.ac.uk/pub/databases/gwas/releases/2025/01/31/studies.tsv",
//!     "gs://gwas_catalog_inputs/studies.tsv",
//! )?;
//! let report = TransferManager::new(ctx, 10).transfer(vec![job]).await?;
//! ```

use crate::storage::{StorageError, UploadResult};
use async_trait::async_trait;
use gwas_common::{StoragePath, UriError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod archive;
pub mod ftp;
pub mod http;
pub mod manager;
pub mod objects;
pub mod release_dir;
pub mod retry;

pub use ftp::{FtpConnector, FtpSession, SuppaFtpConnector};
pub use manager::{BatchError, BatchReport, FailedTransfer, TransferManager};
pub use objects::{FtpToStorage, HttpToStorage, TableToStorage, Tabular};
pub use retry::RetryPolicy;

pub type Result<T> = std::result::Result<T, TransferError>;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    InvalidUri(#[from] UriError),

    #[error("Release date could not be extracted from the FTP path: {path}")]
    ReleaseDateNotFound { path: String },

    #[error("Release directory {requested} not found, and fallback {fallback} is unavailable")]
    ReleaseDirectoryNotFound { requested: String, fallback: String },

    #[error("No files were found in the zipped buffer {file}")]
    EmptyArchive { file: String },

    #[error("Multiple files were found in the zipped buffer {file} ({entries} entries)")]
    AmbiguousArchive { file: String, entries: usize },

    #[error("Failed to read archive {file}: {message}")]
    Archive { file: String, message: String },

    #[error("FTP server rejected {command} with {code}: {message}")]
    FtpRejected {
        command: &'static str,
        code: u32,
        message: String,
    },

    #[error("FTP {command} failed: {message}")]
    Ftp {
        command: &'static str,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to serialize table {table}: {message}")]
    Serialization { table: String, message: String },

    #[error("Transfer task panicked: {0}")]
    TaskPanicked(String),
}

impl TransferError {
    /// Network-class failures worth another attempt.
    ///
    /// FTP replies follow RFC 959: 4xx is transient, 5xx is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            TransferError::Io(_) | TransferError::Ftp { .. } => true,
            TransferError::FtpRejected { code, .. } => (400..500).contains(code),
            TransferError::Http(e) => e.is_connect() || e.is_timeout() || e.is_body() || e.is_request(),
            TransferError::HttpStatus { status, .. } => *status >= 500,
            TransferError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl RetryPolicy<TransferError> {
    /// Three attempts, waiting 1s then 2s, retrying transient failures only
    pub fn for_transfers() -> Self {
        RetryPolicy::new(TransferError::is_transient)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransferKind {
    FtpToStorage,
    HttpToStorage,
    TableToStorage,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferKind::FtpToStorage => "ftp-to-storage",
            TransferKind::HttpToStorage => "http-to-storage",
            TransferKind::TableToStorage => "table-to-storage",
        };
        f.write_str(name)
    }
}

/// Shared collaborators for every job in a run
#[derive(Clone)]
pub struct TransferContext {
    pub store: Arc<dyn crate::storage::ObjectStore>,
    pub ftp: Arc<dyn FtpConnector>,
    pub http: reqwest::Client,
    pub retry: RetryPolicy<TransferError>,
    /// Read size for FTP data streams
    pub block_size: usize,
}

impl TransferContext {
    pub fn new(store: Arc<dyn crate::storage::ObjectStore>, ftp: Arc<dyn FtpConnector>) -> Self {
        Self {
            store,
            ftp,
            http: reqwest::Client::new(),
            retry: RetryPolicy::for_transfers(),
            block_size: crate::config::DEFAULT_FTP_BLOCK_SIZE,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy<TransferError>) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Build an HTTP client with a whole-request timeout
    pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gwas-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}

/// One unit of work: move a source into a storage object
#[async_trait]
pub trait Transferable: Send + Sync {
    fn kind(&self) -> TransferKind;

    /// Human-readable source location
    fn source(&self) -> String;

    fn destination(&self) -> &StoragePath;

    /// Run the whole job, retries included
    async fn transfer(&self, ctx: &TransferContext) -> Result<UploadResult>;
}

/// Closed set of built-in jobs, for callers mixing variants in one list
#[derive(Clone)]
pub enum TransferJob {
    Ftp(FtpToStorage),
    Http(HttpToStorage),
    Table(TableToStorage),
}

impl TransferJob {
    /// Build a remote job from a source URI, picking FTP or HTTP by scheme
    pub fn remote(source: &str, destination: &str) -> Result<Self> {
        match gwas_common::SourceUri::parse(source)? {
            gwas_common::SourceUri::Ftp(_) => FtpToStorage::new(source, destination).map(Self::Ftp),
            gwas_common::SourceUri::Http(_) => {
                HttpToStorage::new(source, destination).map(Self::Http)
            },
        }
    }
}

#[async_trait]
impl Transferable for TransferJob {
    fn kind(&self) -> TransferKind {
        match self {
            TransferJob::Ftp(job) => job.kind(),
            TransferJob::Http(job) => job.kind(),
            TransferJob::Table(job) => job.kind(),
        }
    }

    fn source(&self) -> String {
        match self {
            TransferJob::Ftp(job) => job.source(),
            TransferJob::Http(job) => job.source(),
            TransferJob::Table(job) => job.source(),
        }
    }

    fn destination(&self) -> &StoragePath {
        match self {
            TransferJob::Ftp(job) => job.destination(),
            TransferJob::Http(job) => job.destination(),
            TransferJob::Table(job) => job.destination(),
        }
    }

    async fn transfer(&self, ctx: &TransferContext) -> Result<UploadResult> {
        match self {
            TransferJob::Ftp(job) => job.transfer(ctx).await,
            TransferJob::Http(job) => job.transfer(ctx).await,
            TransferJob::Table(job) => job.transfer(ctx).await,
        }
    }
}
