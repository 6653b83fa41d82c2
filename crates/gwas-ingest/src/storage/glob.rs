//! Object key globs
//!
//! Keys are matched with [`glob::Pattern`] with literal separators, so `*`
//! stays within one path segment and `**/` spans any number of segments.
//! A `**` glued to a file name (`**h.tsv.gz`) is read as `**/*h.tsv.gz`.
//! Listing uses the literal prefix before the first wildcard, then filters
//! keys with the compiled pattern.

use super::{Result, StorageError};
use glob::{MatchOptions, Pattern};
use gwas_common::UriError;

const KEY_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
pub struct ObjectGlob {
    bucket: String,
    prefix: String,
    pattern: Pattern,
}

impl ObjectGlob {
    /// Parse `gs://bucket/<key glob>`
    pub fn parse(uri: &str) -> Result<Self> {
        // Split by hand: `?` and `#` are wildcards here, not URL delimiters
        let Some(rest) = uri.strip_prefix("gs://") else {
            let scheme = uri.split_once("://").map(|(s, _)| s).unwrap_or_default();
            return Err(UriError::UnsupportedScheme {
                scheme: scheme.to_string(),
                uri: uri.to_string(),
                expected: "gs".to_string(),
            }
            .into());
        };

        let (bucket, key_glob) = rest.split_once('/').unwrap_or((rest, ""));
        let key_glob = key_glob.trim_start_matches('/');
        if bucket.is_empty() {
            return Err(UriError::MissingAuthority { uri: uri.to_string() }.into());
        }
        if key_glob.is_empty() {
            return Err(UriError::MissingObjectName { uri: uri.to_string() }.into());
        }

        let prefix_len = key_glob
            .find(['*', '?', '['])
            .unwrap_or(key_glob.len());
        let prefix = key_glob[..prefix_len].to_string();

        let pattern = Pattern::new(&split_recursive_wildcards(key_glob)).map_err(|e| {
            StorageError::InvalidGlob {
                pattern: uri.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            bucket: bucket.to_string(),
            prefix,
            pattern,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Literal key prefix usable for a storage listing
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, key: &str) -> bool {
        self.pattern.matches_with(key, KEY_MATCH)
    }
}

/// Rewrite `**name` at the start of a segment as `**/*name`.
fn split_recursive_wildcards(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 4);
    let mut rest = glob;
    while let Some(idx) = rest.find("**") {
        let (before, after) = rest.split_at(idx);
        let after = &after[2..];
        out.push_str(before);
        out.push_str("**");
        let segment_start = out.len() == 2 || out[..out.len() - 2].ends_with('/');
        if segment_start && !after.is_empty() && !after.starts_with('/') {
            out.push_str("/*");
        }
        rest = after;
    }
    out.push_str(rest);
    out
}
