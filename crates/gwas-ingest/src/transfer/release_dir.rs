//! Date-stamped release directories on the catalog FTP server
//!
//! Releases live under `.../releases/YYYY/MM/DD`. When that directory is
//! missing, the server's `.../releases/latest` alias is used instead.

use super::{Result, TransferError};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// Token replacing the date when the dated directory is unavailable
pub const LATEST_RELEASE: &str = "latest";

static RELEASE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(?P<parent>.*/)?(?P<date>\d{4}/\d{2}/\d{2})$").expect("release date pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDirectory {
    date: NaiveDate,
    parent: String,
}

impl ReleaseDirectory {
    /// Find a `YYYY/MM/DD` date at the end of `base_dir`
    pub fn locate(base_dir: &str) -> Result<Self> {
        let not_found = || TransferError::ReleaseDateNotFound {
            path: base_dir.to_string(),
        };

        let captures = RELEASE_DATE
            .captures(base_dir.trim_end_matches('/'))
            .ok_or_else(not_found)?;

        let date = captures
            .name("date")
            .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y/%m/%d").ok())
            .ok_or_else(not_found)?;
        let parent = captures
            .name("parent")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        Ok(Self { date, parent })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// The dated directory, as matched
    pub fn dated_dir(&self) -> String {
        format!("{}{}", self.parent, self.date.format("%Y/%m/%d"))
    }

    /// Same parent, `latest` instead of the date
    pub fn fallback_dir(&self) -> String {
        format!("{}{}", self.parent, LATEST_RELEASE)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_locates_trailing_date() {
        let dir = ReleaseDirectory::locate("/pub/databases/gwas/releases/2025/01/31").unwrap();
        assert_eq!(dir.date(), NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert_eq!(dir.dated_dir(), "/pub/databases/gwas/releases/2025/01/31");
        assert_eq!(dir.fallback_dir(), "/pub/databases/gwas/releases/latest");
    }

    #[test]
    fn test_only_trailing_date_is_replaced() {
        let dir = ReleaseDirectory::locate("/archive/2024/12/01/releases/2025/02/14").unwrap();
        assert_eq!(dir.fallback_dir(), "/archive/2024/12/01/releases/latest");
    }

    #[test]
    fn test_missing_date() {
        let err = ReleaseDirectory::locate("/pub/databases/gwas/releases/latest").unwrap_err();
        assert!(matches!(err, TransferError::ReleaseDateNotFound { .. }));

        let err = ReleaseDirectory::locate("/").unwrap_err();
        assert!(matches!(err, TransferError::ReleaseDateNotFound { .. }));
    }

    #[test]
    fn test_date_not_at_the_end() {
        let err = ReleaseDirectory::locate("/releases/2025/01/31/extra").unwrap_err();
        assert!(matches!(err, TransferError::ReleaseDateNotFound { .. }));
    }

    #[test]
    fn test_impossible_calendar_date() {
        let err = ReleaseDirectory::locate("/releases/2025/02/30").unwrap_err();
        assert!(matches!(err, TransferError::ReleaseDateNotFound { .. }));
    }

    #[test]
    fn test_relative_date_only() {
        let dir = ReleaseDirectory::locate("2025/01/31").unwrap();
        assert_eq!(dir.fallback_dir(), "latest");
    }
}
