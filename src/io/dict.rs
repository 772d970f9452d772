//! Dictionary loading.
//!
//! A dictionary is read whole into memory before the first file of a batch.
//! Its size must be known up front (a dictionary cannot arrive on stdin) and
//! is capped: in patch-from mode the cap is the configured memory limit,
//! since the reference file becomes the decode window; otherwise a fixed
//! 32 MiB bound keeps pathological dictionary files from exhausting memory.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::config::DICTSIZE_MAX;
use crate::io::display::Display;
use crate::io::prefs::Prefs;
use crate::util::file_size;

/// Reads the dictionary at `path` into a fresh buffer.
///
/// `None` yields an empty buffer (no dictionary). A short read is fatal:
/// compressing against half a dictionary would produce frames the matching
/// decoder cannot reproduce.
pub fn load_dict(
    path: Option<&str>,
    prefs: &Prefs,
    display: &Display,
) -> io::Result<Vec<u8>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    display.say(4, &format!("Loading {} as dictionary \n", path));

    let size = file_size(Path::new(path)).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("dictionary {}: size unknown (not a regular file)", path),
        )
    })?;

    let size_max = if prefs.patch_from {
        prefs.mem_limit as u64
    } else {
        DICTSIZE_MAX as u64
    };
    if size > size_max {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("dictionary {} is too large (> {} bytes)", path, size_max),
        ));
    }

    let mut file = File::open(path)?;
    let mut buf = vec![0u8; size as usize];
    file.read_exact(&mut buf).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("error reading dictionary {}: {}", path, e),
        )
    })?;
    Ok(buf)
}

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
    fn absent_dictionary_is_empty() {
        let prefs = Prefs::default();
        let dict = load_dict(None, &prefs, &quiet()).unwrap();
        assert!(dict.is_empty());
    }

    #[test]
    fn small_dictionary_loads_whole() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dict.bin");
        std::fs::write(&path, b"dictionary payload").unwrap();

        let prefs = Prefs::default();
        let dict = load_dict(Some(path.to_str().unwrap()), &prefs, &quiet()).unwrap();
        assert_eq!(dict.as_slice(), b"dictionary payload");
    }

    #[test]
    fn missing_dictionary_is_an_error() {
        let prefs = Prefs::default();
        assert!(load_dict(Some("/nonexistent/__zstdr_dict__"), &prefs, &quiet()).is_err());
    }

    #[test]
    fn patch_from_cap_follows_mem_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ref.bin");
        std::fs::write(&path, vec![7u8; 4096]).unwrap();

        let mut prefs = Prefs::default();
        prefs.patch_from = true;
        prefs.mem_limit = 1024; // smaller than the file
        assert!(load_dict(Some(path.to_str().unwrap()), &prefs, &quiet()).is_err());

        prefs.mem_limit = 8192;
        let dict = load_dict(Some(path.to_str().unwrap()), &prefs, &quiet()).unwrap();
        assert_eq!(dict.len(), 4096);
    }
}
