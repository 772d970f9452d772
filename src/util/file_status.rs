//! File-type queries and metadata transfer.
//!
//! The engine needs to distinguish regular files, FIFOs, and block devices
//! when opening sources, detect when two paths resolve to the same file, and
//! copy a source's modification time and permission bits onto a finished
//! destination.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use filetime::FileTime;

/// Returns `true` if `path` refers to a regular file. Symlinks are followed.
pub fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.file_type().is_file())
        .unwrap_or(false)
}

/// Returns `true` if `path` refers to a directory.
pub fn is_directory(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false)
}

/// Returns `true` if `path` refers to a named pipe.
#[cfg(unix)]
pub fn is_fifo(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    fs::metadata(path)
        .map(|m| m.file_type().is_fifo())
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_fifo(_path: &Path) -> bool {
    false
}

/// Returns `true` if `path` refers to a block device.
#[cfg(unix)]
pub fn is_block_device(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    fs::metadata(path)
        .map(|m| m.file_type().is_block_device())
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_block_device(_path: &Path) -> bool {
    false
}

/// Returns `true` if `a` and `b` name the same underlying file.
///
/// On POSIX this compares device and inode numbers, so it also catches
/// hard links and symlinked aliases; elsewhere it falls back to comparing
/// canonicalized paths.
#[cfg(unix)]
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

/// Applies a modification time and permission bits to `path`.
///
/// Only the lower 12 permission bits are transferred (`rwxrwxrwx` plus the
/// setuid/setgid/sticky bits). The access time is set to now.
pub fn set_file_stat(path: &Path, mtime: SystemTime, mode: u32) -> io::Result<()> {
    if !is_regular_file(path) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "set_file_stat: not a regular file",
        ));
    }

    let atime = FileTime::from_system_time(SystemTime::now());
    let ft_mtime = FileTime::from_system_time(mtime);
    filetime::set_file_times(path, atime, ft_mtime)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    }
    #[cfg(windows)]
    {
        // Windows has no mode bits; honour the write bit as read-only.
        let readonly = (mode & 0o200) == 0;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(readonly);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(any(unix, windows)))]
    let _ = mode;

    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn regular_file_detection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        File::create(&path).unwrap();
        assert!(is_regular_file(&path));
        assert!(!is_regular_file(dir.path()));
        assert!(!is_regular_file(Path::new("/nonexistent/__zstdr_stat__")));
    }

    #[test]
    fn directory_detection() {
        let dir = TempDir::new().unwrap();
        assert!(is_directory(dir.path()));
        let path = dir.path().join("file.txt");
        File::create(&path).unwrap();
        assert!(!is_directory(&path));
    }

    #[test]
    fn same_file_detects_identity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x");
        File::create(&path).unwrap();
        assert!(is_same_file(&path, &path));
        let other = dir.path().join("y");
        File::create(&other).unwrap();
        assert!(!is_same_file(&path, &other));
    }

    #[cfg(unix)]
    #[test]
    fn same_file_detects_hard_link() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        File::create(&a).unwrap();
        fs::hard_link(&a, &b).unwrap();
        assert!(is_same_file(&a, &b));
    }

    #[test]
    fn set_file_stat_mtime_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mtime.txt");
        File::create(&path).unwrap();

        let target = SystemTime::now() - Duration::from_secs(3600);
        set_file_stat(&path, target, 0o644).unwrap();

        let actual = fs::metadata(&path).unwrap().modified().unwrap();
        let diff = match actual.duration_since(target) {
            Ok(d) => d,
            Err(e) => e.duration(),
        };
        assert!(diff < Duration::from_secs(1));
    }

    #[test]
    fn set_file_stat_rejects_directory() {
        let dir = TempDir::new().unwrap();
        assert!(set_file_stat(dir.path(), SystemTime::now(), 0o755).is_err());
    }
}
