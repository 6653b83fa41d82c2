//! In-memory unpacking of single-file zip archives

use super::{Result, TransferError};
use std::io::{Cursor, Read};
use tracing::info;

pub fn is_zip(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".zip")
}

/// Contents of the only file in a zip archive.
///
/// Directory entries are ignored. No file is [`TransferError::EmptyArchive`],
/// more than one is [`TransferError::AmbiguousArchive`].
pub fn unpack_single_file(file_name: &str, data: &[u8]) -> Result<Vec<u8>> {
    let archive_error = |e: zip::result::ZipError| TransferError::Archive {
        file: file_name.to_string(),
        message: e.to_string(),
    };

    let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(archive_error)?;

    let mut files = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(archive_error)?;
        if !entry.is_dir() {
            files.push(i);
        }
    }

    let index = match files.as_slice() {
        [] => {
            return Err(TransferError::EmptyArchive {
                file: file_name.to_string(),
            })
        },
        [index] => *index,
        _ => {
            return Err(TransferError::AmbiguousArchive {
                file: file_name.to_string(),
                entries: files.len(),
            })
        },
    };

    let mut entry = archive.by_index(index).map_err(archive_error)?;
    let mut contents = Vec::with_capacity(capacity_hint(entry.size()));
    entry.read_to_end(&mut contents)?;

    info!(
        "Unzipped file: {} with size {} bytes",
        entry.name(),
        contents.len()
    );
    Ok(contents)
}

/// Upper bound on buffer space reserved from an entry's declared size
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// The header size is untrusted; larger entries grow the buffer as they read.
fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared)
        .unwrap_or(MAX_PREALLOCATION)
        .min(MAX_PREALLOCATION)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])], dirs: &[&str]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for dir in dirs {
            writer.add_directory(*dir, SimpleFileOptions::default()).unwrap();
        }
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_is_zip() {
        assert!(is_zip("gwas-catalog-associations.zip"));
        assert!(is_zip("UPPER.ZIP"));
        assert!(!is_zip("studies.tsv"));
        assert!(!is_zip("zip.tsv"));
    }

    #[test]
    fn test_single_file() {
        let data = build_zip(&[("test_file.txt", b"This is test content")], &[]);
        let contents = unpack_single_file("archive.zip", &data).unwrap();
        assert_eq!(contents, b"This is test content");
    }

    #[test]
    fn test_directories_are_ignored() {
        let data = build_zip(&[("nested/test_file.txt", b"content")], &["nested/"]);
        assert_eq!(unpack_single_file("archive.zip", &data).unwrap(), b"content");
    }

    #[test]
    fn test_multiple_files() {
        let data = build_zip(&[("a.txt", b"a"), ("b.txt", b"b")], &[]);
        let err = unpack_single_file("archive.zip", &data).unwrap_err();
        assert!(matches!(err, TransferError::AmbiguousArchive { entries: 2, .. }));
    }

    #[test]
    fn test_empty_archive() {
        let data = build_zip(&[], &[]);
        let err = unpack_single_file("archive.zip", &data).unwrap_err();
        assert!(matches!(err, TransferError::EmptyArchive { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_corrupt_archive() {
        let err = unpack_single_file("archive.zip", b"not a zip").unwrap_err();
        assert!(matches!(err, TransferError::Archive { .. }));
    }

    #[test]
    fn test_declared_size_does_not_drive_allocation() {
        assert_eq!(capacity_hint(1024), 1024);
        assert_eq!(capacity_hint(u64::MAX), MAX_PREALLOCATION);
        assert_eq!(capacity_hint(8 * 1024 * 1024 * 1024), MAX_PREALLOCATION);
    }
}
