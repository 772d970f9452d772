//! Source and destination file primitives.
//!
//! Sources resolve to a buffered reader: the `stdin` sentinel maps to
//! standard input (switched to binary mode on Windows), directories are
//! rejected with a warning, and anything that is neither a regular file nor
//! a FIFO is refused unless block devices were explicitly allowed.
//!
//! Destinations resolve to a [`DstFile`]: the `stdout` sentinel maps to
//! standard output (where sparse mode silently degrades from auto to off),
//! and regular paths go through the overwrite policy (silent refusal at
//! verbosity <= 1, an interactive prompt otherwise) plus a same-file check
//! so a source is never clobbered by its own output.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use crate::io::display::Display;
use crate::io::prefs::{Context, Prefs, SparseMode};
use crate::util::{is_block_device, is_directory, is_fifo, is_regular_file, is_same_file};

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Sentinel path: read from standard input.
pub const STDIN_MARK: &str = "stdin";

/// Sentinel path: write to standard output.
pub const STDOUT_MARK: &str = "stdout";

/// Null device path for "decode and discard".
#[cfg(windows)]
pub const NUL_MARK: &str = "nul";
#[cfg(not(windows))]
pub const NUL_MARK: &str = "/dev/null";

pub fn is_stdin_mark(name: &str) -> bool {
    name == STDIN_MARK
}

pub fn is_stdout_mark(name: &str) -> bool {
    name == STDOUT_MARK
}

// ---------------------------------------------------------------------------
// Interactive confirmation
// ---------------------------------------------------------------------------

/// Asks a yes/no question on stderr and reads the answer from stdin.
/// Returns `true` when the user accepted. When stdin already carries data
/// (`has_stdin_input`), prompting is impossible and the answer is no.
pub fn require_user_confirmation(prompt: &str, abort_msg: &str, has_stdin_input: bool) -> bool {
    if has_stdin_input {
        eprintln!("stdin is an input - not proceeding");
        return false;
    }
    eprint!("{}", prompt);
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        eprintln!("{}", abort_msg);
        return false;
    }
    let accepted = matches!(line.trim_start().chars().next(), Some('y') | Some('Y'));
    if !accepted {
        eprintln!("{}", abort_msg);
    }
    accepted
}

// ---------------------------------------------------------------------------
// File removal
// ---------------------------------------------------------------------------

/// Unlinks `path` if it is a regular file; refuses anything else so a
/// cleanup path can never delete devices or directories.
pub fn remove_file(path: &str, display: &Display) -> io::Result<()> {
    if !is_regular_file(Path::new(path)) {
        display.say(2, &format!("refusing to remove non-regular file {} \n", path));
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: not a regular file", path),
        ));
    }
    fs::remove_file(path)
}

// ---------------------------------------------------------------------------
// Source files
// ---------------------------------------------------------------------------

/// Opens `name` for reading.
///
/// The `stdin` sentinel yields standard input. Directories are skipped with
/// a warning; special files other than FIFOs need `allow_block_devices`.
pub fn open_src_file(
    prefs: &Prefs,
    display: &Display,
    name: &str,
) -> io::Result<Box<dyn Read>> {
    if is_stdin_mark(name) {
        display.say(4, "Using stdin for input \n");
        #[cfg(windows)]
        // SAFETY: switching fd 0 to binary mode is always valid.
        unsafe {
            libc::_setmode(0, libc::O_BINARY);
        }
        return Ok(Box::new(io::stdin()));
    }

    let path = Path::new(name);
    if is_directory(path) {
        display.say(1, &format!("zstdr: {} is a directory -- ignored \n", name));
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: is a directory", name),
        ));
    }

    if !is_regular_file(path)
        && !is_fifo(path)
        && !(prefs.allow_block_devices && is_block_device(path))
    {
        display.say(1, &format!("zstdr: {} is not a regular file -- ignored \n", name));
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: not a regular file", name),
        ));
    }

    let f = File::open(name).map_err(|e| {
        display.say(1, &format!("zstdr: {}: {} \n", name, e));
        e
    })?;
    Ok(Box::new(BufReader::new(f)))
}

// ---------------------------------------------------------------------------
// Destination files
// ---------------------------------------------------------------------------

/// An open destination: a regular file (with its path retained for cleanup
/// and stat transfer) or standard output.
pub enum DstFile {
    File { file: File, path: String },
    Stdout(io::Stdout),
}

impl DstFile {
    pub fn is_stdout(&self) -> bool {
        matches!(self, DstFile::Stdout(_))
    }

    /// The regular file handle, when the destination is one.
    pub fn as_file_mut(&mut self) -> Option<&mut File> {
        match self {
            DstFile::File { file, .. } => Some(file),
            DstFile::Stdout(_) => None,
        }
    }
}

impl Write for DstFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            DstFile::File { file, .. } => file.write(buf),
            DstFile::Stdout(out) => out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            DstFile::File { file, .. } => file.flush(),
            DstFile::Stdout(out) => out.flush(),
        }
    }
}

/// Opens `dst_name` for writing with `mode` permission bits.
///
/// Resolves the `stdout` sentinel first (degrading sparse mode from auto to
/// disabled), then refuses destinations that alias the source, then applies
/// the overwrite policy for existing regular files. An accepted existing
/// file is unlinked before reopening, so interrupted runs delete only data
/// this run wrote.
pub fn open_dst_file(
    ctx: &Context,
    prefs: &mut Prefs,
    display: &Display,
    src_name: Option<&str>,
    dst_name: &str,
    mode: u32,
) -> io::Result<DstFile> {
    if is_stdout_mark(dst_name) {
        display.say(4, "Using stdout for output \n");
        #[cfg(windows)]
        // SAFETY: switching fd 1 to binary mode is always valid.
        unsafe {
            libc::_setmode(1, libc::O_BINARY);
        }
        if prefs.sparse_mode == SparseMode::Auto {
            prefs.sparse_mode = SparseMode::Disabled;
            display.say(
                4,
                "Sparse file support is automatically disabled on stdout; try --sparse \n",
            );
        }
        return Ok(DstFile::Stdout(io::stdout()));
    }

    if let Some(src) = src_name {
        if !is_stdin_mark(src) && is_same_file(Path::new(src), Path::new(dst_name)) {
            display.say(
                1,
                "zstdr: refusing to open an output file which will overwrite the input file \n",
            );
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}: output would overwrite input", dst_name),
            ));
        }
    }

    if is_regular_file(Path::new(dst_name)) {
        if !prefs.overwrite {
            if display.level() <= 1 {
                // No interaction possible at this verbosity.
                display.say(1, &format!("zstdr: {} already exists; not overwritten \n", dst_name));
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{}: already exists", dst_name),
                ));
            }
            let prompt = format!("zstdr: {} already exists; overwrite (y/n) ? ", dst_name);
            if !require_user_confirmation(&prompt, "Not overwritten", ctx.has_stdin_input) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{}: not overwritten", dst_name),
                ));
            }
        }
        let _ = remove_file(dst_name, display);
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let file = options.open(dst_name).map_err(|e| {
        display.say(1, &format!("zstdr: {}: {} \n", dst_name, e));
        e
    })?;

    Ok(DstFile::File {
        file,
        path: dst_name.to_owned(),
    })
}

/// Default permission bits for destinations whose source has none to copy.
pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o666;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quiet() -> Display {
        Display::new(0)
    }

    #[test]
    fn open_src_file_rejects_missing() {
        let prefs = Prefs::default();
        assert!(open_src_file(&prefs, &quiet(), "/nonexistent/__zstdr_src__").is_err());
    }

    #[test]
    fn open_src_file_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let prefs = Prefs::default();
        let err = open_src_file(&prefs, &quiet(), dir.path().to_str().unwrap());
        assert!(err.is_err());
    }

    #[test]
    fn open_dst_file_stdout_sentinel_degrades_sparse() {
        let ctx = Context::default();
        let mut prefs = Prefs::default();
        assert_eq!(prefs.sparse_mode, SparseMode::Auto);
        let dst = open_dst_file(&ctx, &mut prefs, &quiet(), None, STDOUT_MARK, 0o644).unwrap();
        assert!(dst.is_stdout());
        assert_eq!(prefs.sparse_mode, SparseMode::Disabled);
    }

    #[test]
    fn open_dst_file_forced_sparse_survives_stdout() {
        let ctx = Context::default();
        let mut prefs = Prefs::default();
        prefs.sparse_mode = SparseMode::Forced;
        let _ = open_dst_file(&ctx, &mut prefs, &quiet(), None, STDOUT_MARK, 0o644).unwrap();
        assert_eq!(prefs.sparse_mode, SparseMode::Forced);
    }

    #[test]
    fn open_dst_file_refuses_existing_without_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zst");
        std::fs::write(&path, b"existing").unwrap();

        let ctx = Context::default();
        let mut prefs = Prefs::default();
        prefs.overwrite = false;
        let result = open_dst_file(
            &ctx,
            &mut prefs,
            &quiet(),
            None,
            path.to_str().unwrap(),
            0o644,
        );
        assert!(result.is_err());
        // The refused file is untouched.
        assert_eq!(std::fs::read(&path).unwrap(), b"existing");
    }

    #[test]
    fn open_dst_file_refuses_same_file_as_src() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"payload").unwrap();

        let ctx = Context::default();
        let mut prefs = Prefs::default();
        prefs.overwrite = true;
        let result = open_dst_file(
            &ctx,
            &mut prefs,
            &quiet(),
            Some(path.to_str().unwrap()),
            path.to_str().unwrap(),
            0o644,
        );
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn open_dst_file_creates_fresh_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.zst");
        let ctx = Context::default();
        let mut prefs = Prefs::default();
        let dst = open_dst_file(
            &ctx,
            &mut prefs,
            &quiet(),
            None,
            path.to_str().unwrap(),
            0o644,
        )
        .unwrap();
        assert!(!dst.is_stdout());
        assert!(path.exists());
    }

    #[test]
    fn remove_file_refuses_directory() {
        let dir = TempDir::new().unwrap();
        assert!(remove_file(dir.path().to_str().unwrap(), &quiet()).is_err());
        assert!(dir.path().exists());
    }
}
