//! GWAS Common Library
//!
//! Shared types, utilities, and error handling for the GWAS curation workspace.
//!
//! # Overview
//!
//! - **URIs**: Typed parsing of `ftp://`, `http(s)://` and `gs://` locations
//! - **Checksums**: SHA-256 digests reported for every uploaded object
//! - **Logging**: Console/file logging setup, including logs destined for object storage
//!
//! # Example
//!
//! ```no_run
//! use gwas_common::uri::{FtpPath, StoragePath};
//!
//! fn main() -> gwas_common::Result<()> {
//!     let source: FtpPath =
//!         "ftp://ftp.ebi.ac.uk/pub/databases/gwas/releases/2025/01/31/studies.tsv".parse()?;
//!     let destination: StoragePath = "gs://gwas_catalog_inputs/studies.tsv".parse()?;
//!     assert_eq!(source.file_name(), "studies.tsv");
//!     assert_eq!(destination.bucket(), "gwas_catalog_inputs");
//!     Ok(())
//! }
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;
pub mod uri;

// Re-export commonly used types
pub use error::{Result, UriError};
pub use uri::{FtpPath, HttpPath, SourceUri, StoragePath};
