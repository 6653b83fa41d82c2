//! GWAS Ingest Library
//!
//! Stages GWAS Catalog releases into object storage and prepares the
//! curation manifest.
//!
//! # Components
//!
//! - **Storage**: `ObjectStore` abstraction over S3-compatible storage, plus the
//!   summary statistics crawler
//! - **Transfer**: FTP/HTTP/table jobs with retries, run in bounded batches
//! - **Curation**: Reconciliation of the previous curation against the latest
//!   catalog studies and the synced summary statistics
//! - **Release**: Catalog release metadata
//!
//! # Example
//!
//! ```no_run
//! use gwas_ingest::config::IngestConfig;
//! use gwas_ingest::storage::S3ObjectStore;
//! use gwas_ingest::transfer::{TransferContext, TransferJob, TransferManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let store = Arc::new(S3ObjectStore::new(&config.storage).await?);
//!     let ctx = TransferContext::new(store, Arc::new(config.ftp_connector()))
//!         .with_retry(config.retry_policy());
//!
//!     let job = TransferJob::remote(
//!         "ftp://ftp.ebi.ac.uk/pub/databases/gwas/releases/2025/01/31/gwas-catalog-studies.tsv",
//!         "gs://gwas_catalog_inputs/gwas_catalog_studies.tsv",
//!     )?;
//!     TransferManager::new(ctx, config.transfer.max_concurrent_transfers)
//!         .transfer(vec![job])
//!         .await?;
//!     Ok(())
//! }
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod curation;
pub mod release;
pub mod storage;
pub mod transfer;

pub use config::IngestConfig;
pub use curation::{CurationManifest, CurationStatus, GwasCatalogCuration};
pub use release::{fetch_release_info, ReleaseInfo};
pub use storage::{InMemoryObjectStore, ObjectStore, S3ObjectStore, SummaryStatisticsCrawler};
pub use transfer::{TransferContext, TransferJob, TransferManager, Transferable};
