//! Source-size queries.
//!
//! A size is only considered known for regular files; pipes, terminals, and
//! other special files report `None`, which the engine treats as "size
//! unknown" (no pledged size, no progress denominators).

use std::fs;
use std::path::Path;

/// Returns the byte size of `path` when it names a regular file, `None`
/// otherwise (missing file, directory, FIFO, device, ...).
pub fn file_size(path: &Path) -> Option<u64> {
    let md = fs::metadata(path).ok()?;
    if md.file_type().is_file() {
        Some(md.len())
    } else {
        None
    }
}

/// Largest known size among `paths`. Entries with unknown size count as 0.
/// Used to pick window parameters that must fit every file of a batch.
pub fn largest_file_size<P: AsRef<Path>>(paths: &[P]) -> Option<u64> {
    paths
        .iter()
        .map(|p| file_size(p.as_ref()).unwrap_or(0))
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_size_of_regular_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ten.bin");
        std::fs::write(&path, [0u8; 10]).unwrap();
        assert_eq!(file_size(&path), Some(10));
    }

    #[test]
    fn file_size_of_directory_is_unknown() {
        let dir = TempDir::new().unwrap();
        assert_eq!(file_size(dir.path()), None);
    }

    #[test]
    fn file_size_of_missing_path_is_unknown() {
        assert_eq!(file_size(Path::new("/nonexistent/__zstdr_size__")), None);
    }

    #[test]
    fn largest_file_size_picks_max() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, [0u8; 3]).unwrap();
        std::fs::write(&b, [0u8; 7]).unwrap();
        assert_eq!(largest_file_size(&[a, b]), Some(7));
    }
}
