//! Shared fakes and fixtures for the gwas-ingest integration tests
//!
//! - [`FakeFtpConnector`]: scripted FTP server (directories, files, failures)
//! - [`capture_logs`]: thread-scoped tracing subscriber writing into a buffer
//! - TSV fixtures for the reconciliation tests

#![allow(dead_code, clippy::unwrap_used)]

use gwas_ingest::storage::InMemoryObjectStore;
use gwas_ingest::transfer::{
    FtpConnector, FtpSession, RetryPolicy, TransferContext, TransferError,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

pub const TEST_BUCKET: &str = "gwas_catalog_inputs";

// ============================================================================
// Fake FTP server
// ============================================================================

/// Failure injected into the next `RETR`
#[derive(Debug, Clone, Copy)]
pub enum ScriptedFailure {
    /// Connection dropped mid-transfer
    ConnectionReset,
    /// Permanent reply code, e.g. 550
    Rejected(u32),
}

impl ScriptedFailure {
    fn into_error(self) -> TransferError {
        match self {
            ScriptedFailure::ConnectionReset => {
                TransferError::Io(io::Error::from(io::ErrorKind::ConnectionReset))
            },
            ScriptedFailure::Rejected(code) => TransferError::FtpRejected {
                command: "RETR",
                code,
                message: "Scripted failure".to_string(),
            },
        }
    }
}

#[derive(Default)]
struct FtpState {
    directories: HashSet<String>,
    files: HashMap<String, Vec<u8>>,
    failures: VecDeque<ScriptedFailure>,
    cwd_replies: VecDeque<u32>,
    connects: usize,
    quits: usize,
    cwd_history: Vec<String>,
    retrieved: Vec<String>,
}

/// In-process FTP server; clones share state
#[derive(Clone, Default)]
pub struct FakeFtpConnector {
    state: Arc<Mutex<FtpState>>,
}

impl FakeFtpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` at the absolute `path`; its directory becomes enterable
    pub fn with_file(self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let (dir, _) = path.rsplit_once('/').unwrap();
            state.directories.insert(dir.to_string());
            state.files.insert(path.to_string(), data.into());
        }
        self
    }

    /// Fail the next `RETR` calls, in order
    pub fn with_failures(self, failures: &[ScriptedFailure]) -> Self {
        self.state.lock().unwrap().failures.extend(failures.iter().copied());
        self
    }

    /// Reject the next `CWD` calls with these reply codes, in order
    pub fn with_cwd_replies(self, codes: &[u32]) -> Self {
        self.state.lock().unwrap().cwd_replies.extend(codes.iter().copied());
        self
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn quits(&self) -> usize {
        self.state.lock().unwrap().quits
    }

    pub fn cwd_history(&self) -> Vec<String> {
        self.state.lock().unwrap().cwd_history.clone()
    }

    pub fn retrieved(&self) -> Vec<String> {
        self.state.lock().unwrap().retrieved.clone()
    }
}

impl FtpConnector for FakeFtpConnector {
    fn connect(&self, _server: &str) -> Result<Box<dyn FtpSession>, TransferError> {
        self.state.lock().unwrap().connects += 1;
        Ok(Box::new(FakeFtpSession {
            state: Arc::clone(&self.state),
            cwd: "/".to_string(),
        }))
    }
}

struct FakeFtpSession {
    state: Arc<Mutex<FtpState>>,
    cwd: String,
}

impl FtpSession for FakeFtpSession {
    fn change_directory(&mut self, path: &str) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap();
        state.cwd_history.push(path.to_string());
        if let Some(code) = state.cwd_replies.pop_front() {
            return Err(TransferError::FtpRejected {
                command: "CWD",
                code,
                message: "Scripted reply".to_string(),
            });
        }
        if state.directories.contains(path) {
            self.cwd = path.to_string();
            Ok(())
        } else {
            Err(TransferError::FtpRejected {
                command: "CWD",
                code: 550,
                message: format!("{}: No such file or directory", path),
            })
        }
    }

    fn retrieve(
        &mut self,
        file_name: &str,
        block_size: usize,
        sink: &mut Vec<u8>,
    ) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap();
        let path = format!("{}/{}", self.cwd.trim_end_matches('/'), file_name);
        state.retrieved.push(path.clone());

        if let Some(failure) = state.failures.pop_front() {
            return Err(failure.into_error());
        }

        let data = state.files.get(&path).ok_or(TransferError::FtpRejected {
            command: "RETR",
            code: 550,
            message: format!("{}: No such file", path),
        })?;
        for block in data.chunks(block_size.max(1)) {
            sink.extend_from_slice(block);
        }
        Ok(())
    }

    fn quit(&mut self) -> Result<(), TransferError> {
        self.state.lock().unwrap().quits += 1;
        Ok(())
    }
}

// ============================================================================
// Transfer context
// ============================================================================

/// Store with [`TEST_BUCKET`] created
pub async fn test_store() -> Arc<InMemoryObjectStore> {
    let store = Arc::new(InMemoryObjectStore::new());
    store.create_bucket(TEST_BUCKET).await;
    store
}

/// Default retry semantics with millisecond backoff
pub fn fast_retry() -> RetryPolicy<TransferError> {
    RetryPolicy::for_transfers().with_initial_backoff(Duration::from_millis(1))
}

pub fn test_context(store: Arc<InMemoryObjectStore>, ftp: FakeFtpConnector) -> TransferContext {
    TransferContext::new(store, Arc::new(ftp))
        .with_retry(fast_retry())
        .with_block_size(4)
}

// ============================================================================
// Log capture
// ============================================================================

#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

pub struct CapturedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Install a subscriber for the current thread only.
///
/// Events from other threads (blocking pool, multi-thread runtime workers)
/// are not captured.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

// ============================================================================
// Curation fixtures
// ============================================================================

pub const PREVIOUS_CURATION_TSV: &str = "\
studyId\tstudyType\tanalysisFlag\tqualityControl\tisCurated\tpubmedId\tpublicationTitle\ttraitFromSource
GCST000001\tGWAS\t\t\tTrue\t1001\tFirst study\tHeight
GCST000002\tGWAS\t\t\tTrue\t1002\tSecond study\tWeight
GCST000003\tGWAS\tMetabolite\t\tTrue\t1003\tThird study\tGlucose
GCST000004\tGWAS\t\t\tTrue\t1004\tRetracted study\tBMI
";

pub const DOWNLOADED_STUDIES_TSV: &str = "\
DATE ADDED TO CATALOG\tPUBMED ID\tFIRST AUTHOR\tSTUDY\tDISEASE/TRAIT\tSTUDY ACCESSION
2020-01-01\t1001\tSmith J\tFirst study\tHeight\tGCST000001
2020-01-01\t1002\tDoe A\tSecond study\tWeight\tGCST000002
2020-01-01\t1003\tRoe B\tThird study\tGlucose\tGCST000003
2024-06-01\t1005\tLee C\tA \"quoted\" title\tAsthma\tGCST000005
2024-06-01\t1006\tKim D\tSixth study\tEczema\tGCST000006
";

/// Synced harmonised summary statistics, one per study with data
pub const SYNCED_SUMMARY_STATISTICS: [&str; 4] = [
    "raw_summary_statistics/GCST000001/GCST000001.h.tsv.gz",
    "raw_summary_statistics/GCST000002/GCST000002.h.tsv.gz",
    "raw_summary_statistics/GCST000003/GCST000003.h.tsv.gz",
    "raw_summary_statistics/GCST000005/GCST000005.h.tsv.gz",
];

pub const SUMMARY_STATISTICS_GLOB: &str = "gs://gwas_catalog_inputs/raw_summary_statistics/**h.tsv.gz";

pub async fn seed_summary_statistics(store: &InMemoryObjectStore) {
    for key in SYNCED_SUMMARY_STATISTICS {
        store.insert(TEST_BUCKET, key, b"chr\tpos\n".to_vec()).await;
    }
}
