//! Typed locations for transfer sources and destinations
//!
//! Parsing is pure: no network or storage access happens here.
//!
//! - [`StoragePath`]: `gs://bucket/path/to/object`
//! - [`FtpPath`]: `ftp://server/base/dir/file.txt`
//! - [`HttpPath`]: `http(s)://host/anything`
//!
//! # Examples
//!
//! ```rust
//! use gwas_common::uri::StoragePath;
//!
//! let path: StoragePath = "gs://bucket/path/to/object/".parse().unwrap();
//! assert_eq!(path.bucket(), "bucket");
//! assert_eq!(path.object(), "path/to/object");
//! ```

use crate::error::{Result, UriError};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Schemes accepted for object storage destinations
pub const STORAGE_SCHEMES: &[&str] = &["gs"];

/// Schemes accepted for FTP sources
pub const FTP_SCHEMES: &[&str] = &["ftp"];

/// Schemes accepted for HTTP sources
pub const HTTP_SCHEMES: &[&str] = &["http", "https"];

/// Parse `uri` and check its scheme against `expected`.
fn parse_with_schemes(uri: &str, expected: &[&str]) -> Result<Url> {
    let url = match Url::parse(uri) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Err(UriError::UnsupportedScheme {
                scheme: String::new(),
                uri: uri.to_string(),
                expected: expected.join(", "),
            })
        },
        Err(url::ParseError::EmptyHost) => {
            return Err(UriError::MissingAuthority {
                uri: uri.to_string(),
            })
        },
        Err(e) => {
            return Err(UriError::Malformed {
                uri: uri.to_string(),
                reason: e.to_string(),
            })
        },
    };

    if !expected.contains(&url.scheme()) {
        return Err(UriError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
            uri: uri.to_string(),
            expected: expected.join(", "),
        });
    }

    // `ftp:///a/b` would otherwise take `a` as the host
    let after_scheme = uri.split_once("://").map(|(_, rest)| rest);
    if after_scheme.is_some_and(|rest| rest.starts_with('/')) {
        return Err(UriError::MissingAuthority {
            uri: uri.to_string(),
        });
    }

    Ok(url)
}

/// Host plus an explicit port, if any.
fn authority(url: &Url, uri: &str) -> Result<String> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| UriError::MissingAuthority {
            uri: uri.to_string(),
        })?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn decoded_path(url: &Url, uri: &str) -> Result<String> {
    urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .map_err(|e| UriError::Malformed {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
}

/// Object storage location: `gs://<bucket>/<object>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePath {
    bucket: String,
    object: String,
}

impl StoragePath {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = parse_with_schemes(uri, STORAGE_SCHEMES)?;
        let bucket = authority(&url, uri)?;
        let object = decoded_path(&url, uri)?.trim_matches('/').to_string();

        if object.is_empty() {
            return Err(UriError::MissingObjectName {
                uri: uri.to_string(),
            });
        }

        Ok(Self { bucket, object })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key without leading or trailing slashes
    pub fn object(&self) -> &str {
        &self.object
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

impl FromStr for StoragePath {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// FTP file location split into server, directory and file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FtpPath {
    server: String,
    base_dir: String,
    file_name: String,
}

impl FtpPath {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = parse_with_schemes(uri, FTP_SCHEMES)?;
        let server = authority(&url, uri)?;
        let path = decoded_path(&url, uri)?;

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((file_name, dirs)) = segments.split_last() else {
            return Err(UriError::MissingObjectName {
                uri: uri.to_string(),
            });
        };

        // A trailing slash names a directory, not a file
        if path.ends_with('/') {
            return Err(UriError::MissingObjectName {
                uri: uri.to_string(),
            });
        }

        Ok(Self {
            server,
            base_dir: format!("/{}", dirs.join("/")),
            file_name: file_name.to_string(),
        })
    }

    /// Server authority, `host` or `host:port`
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Absolute directory holding the file (`/` for files at the root)
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Same server and file name, different directory
    pub fn with_base_dir(&self, base_dir: impl Into<String>) -> Self {
        let base_dir = base_dir.into();
        let base_dir = if base_dir.starts_with('/') {
            base_dir
        } else {
            format!("/{}", base_dir)
        };

        Self {
            server: self.server.clone(),
            base_dir,
            file_name: self.file_name.clone(),
        }
    }

    /// Absolute path of the file on the server
    pub fn full_path(&self) -> String {
        if self.base_dir == "/" {
            format!("/{}", self.file_name)
        } else {
            format!("{}/{}", self.base_dir, self.file_name)
        }
    }
}

impl fmt::Display for FtpPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ftp://{}{}", self.server, self.full_path())
    }
}

impl FromStr for FtpPath {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// HTTP(S) resource location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpPath {
    url: Url,
}

impl HttpPath {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = parse_with_schemes(uri, HTTP_SCHEMES)?;
        authority(&url, uri)?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Last non-empty path segment, if the URL names a file
    pub fn file_name(&self) -> Option<&str> {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
    }
}

impl fmt::Display for HttpPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

impl FromStr for HttpPath {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A remote source: either FTP or HTTP(S)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceUri {
    Ftp(FtpPath),
    Http(HttpPath),
}

impl SourceUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let scheme = uri.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());

        match scheme.as_deref() {
            Some("ftp") => FtpPath::parse(uri).map(SourceUri::Ftp),
            Some("http") | Some("https") => HttpPath::parse(uri).map(SourceUri::Http),
            other => Err(UriError::UnsupportedScheme {
                scheme: other.unwrap_or_default().to_string(),
                uri: uri.to_string(),
                expected: [FTP_SCHEMES, HTTP_SCHEMES].concat().join(", "),
            }),
        }
    }
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceUri::Ftp(path) => path.fmt(f),
            SourceUri::Http(path) => path.fmt(f),
        }
    }
}

impl FromStr for SourceUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
