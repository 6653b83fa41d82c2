//! Concrete transfer jobs
//!
//! Sources and destinations are parsed when a job is built, so a job that
//! exists is always well-formed.

use super::{archive, ftp, http, Result, TransferContext, TransferError, TransferKind, Transferable};
use crate::storage::UploadResult;
use async_trait::async_trait;
use gwas_common::{FtpPath, HttpPath, StoragePath};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// In-memory table that can be written as TSV
pub trait Tabular: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    fn to_tsv(&self) -> std::result::Result<Vec<u8>, csv::Error>;
}

async fn upload(
    ctx: &TransferContext,
    destination: &StoragePath,
    file_name: &str,
    data: Vec<u8>,
) -> Result<UploadResult> {
    let content = if archive::is_zip(file_name) {
        info!("Unzipping {} before upload", file_name);
        archive::unpack_single_file(file_name, &data)?
    } else {
        data
    };

    info!("Uploading {} bytes to {}", content.len(), destination);
    Ok(ctx
        .store
        .put(destination.bucket(), destination.object(), content)
        .await?)
}

/// FTP file, read from its release directory, into storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpToStorage {
    source: FtpPath,
    destination: StoragePath,
}

impl FtpToStorage {
    pub fn new(source: &str, destination: &str) -> Result<Self> {
        Ok(Self {
            source: FtpPath::parse(source)?,
            destination: StoragePath::parse(destination)?,
        })
    }

    pub fn source_path(&self) -> &FtpPath {
        &self.source
    }

    async fn attempt(&self, ctx: &TransferContext) -> Result<UploadResult> {
        info!(
            "Attempting to transfer data from {} to {}",
            self.source, self.destination
        );

        let connector = Arc::clone(&ctx.ftp);
        let source = self.source.clone();
        let block_size = ctx.block_size;

        let download = tokio::task::spawn_blocking(move || {
            ftp::download_release_file(connector.as_ref(), &source, block_size)
        })
        .await
        .map_err(|e| TransferError::TaskPanicked(e.to_string()))??;

        upload(ctx, &self.destination, download.path.file_name(), download.data).await
    }
}

#[async_trait]
impl Transferable for FtpToStorage {
    fn kind(&self) -> TransferKind {
        TransferKind::FtpToStorage
    }

    fn source(&self) -> String {
        self.source.to_string()
    }

    fn destination(&self) -> &StoragePath {
        &self.destination
    }

    #[instrument(skip_all, fields(source = %self.source, destination = %self.destination))]
    async fn transfer(&self, ctx: &TransferContext) -> Result<UploadResult> {
        let label = format!("transfer of {}", self.source);
        ctx.retry.run(&label, |_| self.attempt(ctx)).await
    }
}

/// HTTP(S) resource into storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpToStorage {
    source: HttpPath,
    destination: StoragePath,
}

impl HttpToStorage {
    pub fn new(source: &str, destination: &str) -> Result<Self> {
        Ok(Self {
            source: HttpPath::parse(source)?,
            destination: StoragePath::parse(destination)?,
        })
    }

    async fn attempt(&self, ctx: &TransferContext) -> Result<UploadResult> {
        info!(
            "Attempting to transfer data from {} to {}",
            self.source, self.destination
        );
        let data = http::download(&ctx.http, &self.source).await?;
        let file_name = self.source.file_name().unwrap_or_default();
        upload(ctx, &self.destination, file_name, data).await
    }
}

#[async_trait]
impl Transferable for HttpToStorage {
    fn kind(&self) -> TransferKind {
        TransferKind::HttpToStorage
    }

    fn source(&self) -> String {
        self.source.to_string()
    }

    fn destination(&self) -> &StoragePath {
        &self.destination
    }

    #[instrument(skip_all, fields(source = %self.source, destination = %self.destination))]
    async fn transfer(&self, ctx: &TransferContext) -> Result<UploadResult> {
        let label = format!("transfer of {}", self.source);
        ctx.retry.run(&label, |_| self.attempt(ctx)).await
    }
}

/// In-memory table serialized as TSV into storage
#[derive(Clone)]
pub struct TableToStorage {
    table: Arc<dyn Tabular>,
    destination: StoragePath,
}

impl fmt::Debug for TableToStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableToStorage")
            .field("table", &self.table.name())
            .field("destination", &self.destination)
            .finish()
    }
}

impl TableToStorage {
    pub fn new(table: Arc<dyn Tabular>, destination: &str) -> Result<Self> {
        Ok(Self {
            table,
            destination: StoragePath::parse(destination)?,
        })
    }

    async fn attempt(&self, ctx: &TransferContext) -> Result<UploadResult> {
        let data = self.table.to_tsv().map_err(|e| TransferError::Serialization {
            table: self.table.name().to_string(),
            message: e.to_string(),
        })?;

        info!("Uploading table {} ({} bytes) to {}", self.table.name(), data.len(), self.destination);
        Ok(ctx
            .store
            .put(self.destination.bucket(), self.destination.object(), data)
            .await?)
    }
}

#[async_trait]
impl Transferable for TableToStorage {
    fn kind(&self) -> TransferKind {
        TransferKind::TableToStorage
    }

    fn source(&self) -> String {
        format!("memory://{}", self.table.name())
    }

    fn destination(&self) -> &StoragePath {
        &self.destination
    }

    #[instrument(skip_all, fields(table = self.table.name(), destination = %self.destination))]
    async fn transfer(&self, ctx: &TransferContext) -> Result<UploadResult> {
        let label = format!("upload of table {}", self.table.name());
        ctx.retry.run(&label, |_| self.attempt(ctx)).await
    }
}
