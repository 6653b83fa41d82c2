//! Concurrent execution of a homogeneous batch of transfer jobs

use super::{TransferContext, TransferError, TransferKind, Transferable};
use crate::storage::UploadResult;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Transfer list is empty")]
    EmptyTransferList,

    #[error("Transfer list mixes job kinds: {}", format_kinds(.kinds))]
    InvalidTransferableObjects { kinds: Vec<TransferKind> },

    #[error("{} of {} transfers failed", .0.failed.len(), .0.total())]
    JobsFailed(BatchReport),
}

fn format_kinds(kinds: &[TransferKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug)]
pub struct FailedTransfer {
    pub source: String,
    pub destination: String,
    pub error: TransferError,
}

impl fmt::Display for FailedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.source, self.destination, self.error)
    }
}

/// Outcome of a batch, in submission order
#[derive(Debug)]
pub struct BatchReport {
    pub kind: TransferKind,
    pub succeeded: Vec<UploadResult>,
    pub failed: Vec<FailedTransfer>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => panic
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}

pub struct TransferManager {
    ctx: TransferContext,
    concurrency: usize,
}

impl TransferManager {
    pub fn new(ctx: TransferContext, concurrency: usize) -> Self {
        Self {
            ctx,
            concurrency: concurrency.max(1),
        }
    }

    /// Check a batch before any I/O: non-empty and a single job kind.
    pub fn validate<T: Transferable>(jobs: &[T]) -> Result<TransferKind, BatchError> {
        let kinds: BTreeSet<TransferKind> = jobs.iter().map(Transferable::kind).collect();

        let mut iter = kinds.iter();
        match (iter.next(), iter.next()) {
            (None, _) => Err(BatchError::EmptyTransferList),
            (Some(kind), None) => Ok(*kind),
            _ => Err(BatchError::InvalidTransferableObjects {
                kinds: kinds.into_iter().collect(),
            }),
        }
    }

    /// Run every job, each exactly once, with bounded concurrency.
    ///
    /// A failing job does not stop its siblings; failures (panics included,
    /// as [`TransferError::TaskPanicked`]) are collected and returned as
    /// [`BatchError::JobsFailed`] once all jobs have finished.
    pub async fn transfer<T: Transferable>(&self, jobs: Vec<T>) -> Result<BatchReport, BatchError> {
        let kind = Self::validate(&jobs)?;
        let total = jobs.len();
        let started = Instant::now();

        info!(
            kind = %kind,
            "Transferring {} objects (concurrency={})",
            total, self.concurrency
        );

        let ctx = &self.ctx;
        let mut outcomes: Vec<(usize, String, String, Result<UploadResult, TransferError>)> =
            stream::iter(jobs.iter().enumerate())
                .map(|(index, job)| async move {
                    let outcome = AssertUnwindSafe(job.transfer(ctx))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(TransferError::TaskPanicked(panic_message(panic))));
                    match &outcome {
                        Ok(upload) => info!(
                            "Completed transfer {} / {}: {} ({} bytes)",
                            index + 1,
                            total,
                            upload.uri(),
                            upload.size
                        ),
                        Err(e) => error!(
                            "Failed transfer {} / {}: {}: {}",
                            index + 1,
                            total,
                            job.source(),
                            e
                        ),
                    }
                    (index, job.source(), job.destination().to_string(), outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        outcomes.sort_by_key(|(index, ..)| *index);

        let mut report = BatchReport {
            kind,
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for (_, source, destination, outcome) in outcomes {
            match outcome {
                Ok(upload) => report.succeeded.push(upload),
                Err(error) => report.failed.push(FailedTransfer {
                    source,
                    destination,
                    error,
                }),
            }
        }

        info!(
            "Batch complete: {} / {} transfers successful in {:.2}s",
            report.succeeded.len(),
            total,
            started.elapsed().as_secs_f64()
        );

        if report.is_success() {
            Ok(report)
        } else {
            Err(BatchError::JobsFailed(report))
        }
    }
}
