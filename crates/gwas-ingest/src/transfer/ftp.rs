//! FTP downloads from date-stamped release directories
//!
//! Sessions are blocking (`suppaftp::FtpStream`) and run on the blocking
//! thread pool. The [`FtpConnector`] seam lets tests script server behavior.

use super::release_dir::ReleaseDirectory;
use super::{Result, TransferError};
use gwas_common::FtpPath;
use std::io::Read;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, info, warn};

/// An authenticated session positioned anywhere on the server
pub trait FtpSession: Send {
    /// `CWD`; a rejected directory surfaces as [`TransferError::FtpRejected`]
    fn change_directory(&mut self, path: &str) -> Result<()>;

    /// `RETR` `file_name` from the current directory, appending to `sink`
    /// in reads of at most `block_size` bytes
    fn retrieve(&mut self, file_name: &str, block_size: usize, sink: &mut Vec<u8>) -> Result<()>;

    fn quit(&mut self) -> Result<()>;
}

pub trait FtpConnector: Send + Sync + 'static {
    /// Open and log in to `server` (`host` or `host:port`)
    fn connect(&self, server: &str) -> Result<Box<dyn FtpSession>>;
}

/// Anonymous-login connector backed by `suppaftp`
#[derive(Debug, Clone)]
pub struct SuppaFtpConnector {
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for SuppaFtpConnector {
    fn default() -> Self {
        Self {
            port: crate::config::DEFAULT_FTP_PORT,
            username: crate::config::DEFAULT_FTP_USERNAME.to_string(),
            password: crate::config::DEFAULT_FTP_PASSWORD.to_string(),
        }
    }
}

impl SuppaFtpConnector {
    fn address(&self, server: &str) -> String {
        if server.contains(':') {
            server.to_string()
        } else {
            format!("{}:{}", server, self.port)
        }
    }
}

fn ftp_error(command: &'static str, err: FtpError) -> TransferError {
    match err {
        FtpError::ConnectionError(io) => TransferError::Io(io),
        FtpError::UnexpectedResponse(response) => TransferError::FtpRejected {
            command,
            code: response.status.code(),
            message: String::from_utf8_lossy(&response.body).trim().to_string(),
        },
        other => TransferError::Ftp {
            command,
            message: other.to_string(),
        },
    }
}

impl FtpConnector for SuppaFtpConnector {
    fn connect(&self, server: &str) -> Result<Box<dyn FtpSession>> {
        let address = self.address(server);
        debug!("Connecting to FTP server: {}", address);

        let mut stream = FtpStream::connect(&address).map_err(|e| ftp_error("CONNECT", e))?;

        // Extended passive mode works behind NAT
        stream.set_mode(suppaftp::Mode::ExtendedPassive);

        stream
            .login(&self.username, &self.password)
            .map_err(|e| ftp_error("LOGIN", e))?;

        stream
            .transfer_type(suppaftp::types::FileType::Binary)
            .map_err(|e| ftp_error("TYPE", e))?;

        Ok(Box::new(SuppaFtpSession { stream }))
    }
}

struct SuppaFtpSession {
    stream: FtpStream,
}

impl FtpSession for SuppaFtpSession {
    fn change_directory(&mut self, path: &str) -> Result<()> {
        self.stream.cwd(path).map_err(|e| ftp_error("CWD", e))
    }

    fn retrieve(&mut self, file_name: &str, block_size: usize, sink: &mut Vec<u8>) -> Result<()> {
        let mut reader = self
            .stream
            .retr_as_stream(file_name)
            .map_err(|e| ftp_error("RETR", e))?;

        let mut block = vec![0u8; block_size.max(1)];
        loop {
            let read = reader.read(&mut block)?;
            if read == 0 {
                break;
            }
            sink.extend_from_slice(&block[..read]);
        }

        self.stream
            .finalize_retr_stream(reader)
            .map_err(|e| ftp_error("RETR", e))
    }

    fn quit(&mut self) -> Result<()> {
        self.stream.quit().map_err(|e| ftp_error("QUIT", e))
    }
}

/// `550`: the directory does not exist or cannot be entered. Other `CWD`
/// rejections keep their own retry classification.
const DIRECTORY_UNAVAILABLE: u32 = 550;

/// A downloaded file and the location it was actually read from
#[derive(Debug, Clone)]
pub struct FtpDownload {
    pub path: FtpPath,
    pub data: Vec<u8>,
}

/// Download `source`, falling back to the `latest` release directory when the
/// dated one does not exist (reply 550). Blocking.
pub fn download_release_file(
    connector: &dyn FtpConnector,
    source: &FtpPath,
    block_size: usize,
) -> Result<FtpDownload> {
    info!(
        "Searching for the release date in the provided ftp path: {}",
        source.base_dir()
    );
    let release = ReleaseDirectory::locate(source.base_dir())?;
    info!(release_date = %release.date(), "Found release date");

    let mut session = connector.connect(source.server())?;

    let resolved = match enter_release_directory(session.as_mut(), source, &release) {
        Ok(resolved) => resolved,
        Err(e) => {
            close(session.as_mut());
            return Err(e);
        },
    };

    debug!("Downloading {} into memory", resolved);
    let mut data = Vec::new();
    if let Err(e) = session.retrieve(resolved.file_name(), block_size, &mut data) {
        close(session.as_mut());
        return Err(e);
    }
    info!("Downloaded {} bytes from {}", data.len(), resolved);

    close(session.as_mut());
    Ok(FtpDownload {
        path: resolved,
        data,
    })
}

fn enter_release_directory(
    session: &mut dyn FtpSession,
    source: &FtpPath,
    release: &ReleaseDirectory,
) -> Result<FtpPath> {
    debug!("Changing directory to: {}", source.base_dir());
    match session.change_directory(source.base_dir()) {
        Ok(()) => {
            info!("Successfully changed directory to: {}", source.base_dir());
            return Ok(source.clone());
        },
        Err(TransferError::FtpRejected { code, message, .. })
            if code == DIRECTORY_UNAVAILABLE =>
        {
            warn!(
                code,
                "Failed to change directory to {}: {}",
                source.base_dir(),
                message
            );
        },
        Err(e) => return Err(e),
    }

    let fallback = source.with_base_dir(release.fallback_dir());
    warn!("Attempting to load the `latest` release: {}", fallback.base_dir());

    match session.change_directory(fallback.base_dir()) {
        Ok(()) => {
            info!("Successfully changed directory to: {}", fallback.base_dir());
            Ok(fallback)
        },
        Err(TransferError::FtpRejected { code, .. }) if code == DIRECTORY_UNAVAILABLE => {
            Err(TransferError::ReleaseDirectoryNotFound {
                requested: source.to_string(),
                fallback: fallback.to_string(),
            })
        },
        Err(e) => Err(e),
    }
}

fn close(session: &mut dyn FtpSession) {
    if let Err(e) = session.quit() {
        warn!("Failed to quit FTP session gracefully: {}", e);
    }
}
