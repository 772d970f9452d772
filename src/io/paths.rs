//! Destination-name derivation and path bookkeeping.
//!
//! Compressed names are `source + suffix`; decompressed names strip one
//! recognized suffix, with the tar shorthands (`.tzst`, `.tgz`, `.txz`,
//! `.tlz4`) expanding to `.tar`. When an output directory is given, only the
//! basename of the source survives; source directories never leak into the
//! output tree. Every derivation returns an owned `String`, so calls are
//! reentrant and results live as long as the caller needs them.

use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::io::display::Display;

// ---------------------------------------------------------------------------
// Extensions
// ---------------------------------------------------------------------------

pub const ZSTD_EXTENSION: &str = ".zst";
pub const ZSTD_ALT_EXTENSION: &str = ".zstd";
pub const TZSTD_EXTENSION: &str = ".tzst";
pub const GZ_EXTENSION: &str = ".gz";
pub const TGZ_EXTENSION: &str = ".tgz";
pub const XZ_EXTENSION: &str = ".xz";
pub const TXZ_EXTENSION: &str = ".txz";
pub const LZMA_EXTENSION: &str = ".lzma";
pub const LZ4_EXTENSION: &str = ".lz4";
pub const TLZ4_EXTENSION: &str = ".tlz4";
pub const TAR_EXTENSION: &str = ".tar";

/// Suffixes the decoder recognizes, with the replacement appended after the
/// suffix is stripped (tar shorthands decode to `<stem>.tar`).
const SUFFIX_TABLE: [(&str, &str); 10] = [
    (ZSTD_EXTENSION, ""),
    (ZSTD_ALT_EXTENSION, ""),
    (TZSTD_EXTENSION, TAR_EXTENSION),
    (GZ_EXTENSION, ""),
    (TGZ_EXTENSION, TAR_EXTENSION),
    (XZ_EXTENSION, ""),
    (TXZ_EXTENSION, TAR_EXTENSION),
    (LZMA_EXTENSION, ""),
    (LZ4_EXTENSION, ""),
    (TLZ4_EXTENSION, TAR_EXTENSION),
];

/// Extensions regarded as already-compressed for `--exclude-compressed`.
const COMPRESSED_EXTENSIONS: [&str; 9] = [
    ZSTD_EXTENSION,
    TZSTD_EXTENSION,
    GZ_EXTENSION,
    TGZ_EXTENSION,
    LZMA_EXTENSION,
    XZ_EXTENSION,
    TXZ_EXTENSION,
    LZ4_EXTENSION,
    TLZ4_EXTENSION,
];

/// The recognized-suffix list as shown in error messages.
pub fn known_suffix_list() -> String {
    SUFFIX_TABLE
        .iter()
        .map(|(s, _)| *s)
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Basename handling
// ---------------------------------------------------------------------------

/// Returns the part of `path` after the last path separator. On Windows both
/// `\` and `/` are accepted as separators.
pub fn extract_filename(path: &str) -> &str {
    let cut = path.rfind('/');
    #[cfg(windows)]
    let cut = match (cut, path.rfind('\\')) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    match cut {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

fn join_out_dir(out_dir: &str, filename: &str) -> String {
    if out_dir.ends_with(std::path::MAIN_SEPARATOR) || out_dir.ends_with('/') {
        format!("{}{}", out_dir, filename)
    } else {
        format!("{}{}{}", out_dir, std::path::MAIN_SEPARATOR, filename)
    }
}

// ---------------------------------------------------------------------------
// Name derivation
// ---------------------------------------------------------------------------

/// Destination name for compressing `src`: `src + suffix`, or
/// `out_dir/basename(src) + suffix` when an output directory is given.
pub fn derive_compressed_name(src: &str, out_dir: Option<&str>, suffix: &str) -> String {
    match out_dir {
        Some(dir) => format!("{}{}", join_out_dir(dir, extract_filename(src)), suffix),
        None => format!("{}{}", src, suffix),
    }
}

/// Destination name for decompressing `src`, or `None` when `src` does not
/// end in a recognized suffix (the caller reports and skips the file).
pub fn derive_decompressed_name(src: &str, out_dir: Option<&str>) -> Option<String> {
    let (suffix, replacement) = SUFFIX_TABLE
        .iter()
        .find(|(s, _)| src.len() > s.len() && src.ends_with(s))?;

    let stem_len = src.len() - suffix.len();
    let stem = match out_dir {
        Some(dir) => {
            let base = extract_filename(src);
            join_out_dir(dir, &base[..base.len() - suffix.len()])
        }
        None => src[..stem_len].to_owned(),
    };
    if extract_filename(&stem).is_empty() {
        return None;
    }
    Some(format!("{}{}", stem, replacement))
}

/// True when `path` already carries a known compressed-file extension.
pub fn has_compressed_extension(path: &str) -> bool {
    COMPRESSED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

// ---------------------------------------------------------------------------
// Collision check
// ---------------------------------------------------------------------------

/// Warns (level 2) when two inputs share a basename and would therefore
/// collide inside a flat output directory. Never fatal.
pub fn check_filename_collisions<S: AsRef<str>>(names: &[S], display: &Display) {
    let mut seen = HashSet::new();
    for name in names {
        let base = extract_filename(name.as_ref());
        if !seen.insert(base.to_owned()) {
            display.say(
                2,
                &format!("WARNING: two files have the same filename: {} \n", base),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Mirrored output directories
// ---------------------------------------------------------------------------

/// Sanitizes the directory part of `src` for reuse under a mirror root:
/// root and parent components are dropped, so the result never escapes the
/// mirror tree. Returns `None` when nothing usable remains for a source
/// that had a directory part consisting only of such components.
fn sanitized_parent(src: &str) -> Option<PathBuf> {
    let parent = Path::new(src).parent()?;
    let mut clean = PathBuf::new();
    for comp in parent.components() {
        match comp {
            Component::Normal(part) => clean.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => return None,
        }
    }
    Some(clean)
}

/// Directory under `out_root` that mirrors the directory of `src`, or `None`
/// when the source path cannot be mirrored (e.g. it climbs out of its tree).
pub fn mirrored_dest_dir(src: &str, out_root: &str) -> Option<String> {
    let clean = sanitized_parent(src)?;
    let joined = Path::new(out_root).join(clean);
    Some(joined.to_string_lossy().into_owned())
}

/// Recreates the directory structure of every source under `out_root`.
/// Called once per batch before any destination file is opened.
pub fn mirror_source_directories<S: AsRef<str>>(srcs: &[S], out_root: &str) -> io::Result<()> {
    for src in srcs {
        if let Some(dir) = mirrored_dest_dir(src.as_ref(), out_root) {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_name_appends_suffix() {
        assert_eq!(
            derive_compressed_name("dir/file.txt", None, ".zst"),
            "dir/file.txt.zst"
        );
    }

    #[test]
    fn compressed_name_into_out_dir_uses_basename_only() {
        let name = derive_compressed_name("deep/nested/file.txt", Some("out"), ".zst");
        assert_eq!(name, format!("out{}file.txt.zst", std::path::MAIN_SEPARATOR));
    }

    #[test]
    fn decompressed_name_strips_known_suffixes() {
        assert_eq!(
            derive_decompressed_name("a/file.txt.zst", None).as_deref(),
            Some("a/file.txt")
        );
        assert_eq!(
            derive_decompressed_name("file.zstd", None).as_deref(),
            Some("file")
        );
        assert_eq!(
            derive_decompressed_name("file.gz", None).as_deref(),
            Some("file")
        );
        assert_eq!(
            derive_decompressed_name("file.lzma", None).as_deref(),
            Some("file")
        );
    }

    #[test]
    fn tar_shorthands_expand_to_tar() {
        assert_eq!(
            derive_decompressed_name("backup.tzst", None).as_deref(),
            Some("backup.tar")
        );
        assert_eq!(
            derive_decompressed_name("backup.tgz", None).as_deref(),
            Some("backup.tar")
        );
        assert_eq!(
            derive_decompressed_name("backup.txz", None).as_deref(),
            Some("backup.tar")
        );
        assert_eq!(
            derive_decompressed_name("backup.tlz4", None).as_deref(),
            Some("backup.tar")
        );
    }

    #[test]
    fn unknown_suffix_is_rejected() {
        assert!(derive_decompressed_name("file.txt", None).is_none());
        assert!(derive_decompressed_name("file", None).is_none());
        // A bare suffix has no stem to decode into.
        assert!(derive_decompressed_name(".zst", None).is_none());
    }

    #[test]
    fn decompressed_name_into_out_dir_uses_basename_only() {
        let name = derive_decompressed_name("deep/nested/file.txt.zst", Some("out"));
        assert_eq!(
            name.as_deref(),
            Some(format!("out{}file.txt", std::path::MAIN_SEPARATOR).as_str())
        );
    }

    #[test]
    fn compressed_extension_table() {
        assert!(has_compressed_extension("a.zst"));
        assert!(has_compressed_extension("a.tgz"));
        assert!(has_compressed_extension("a.lz4"));
        assert!(!has_compressed_extension("a.txt"));
        assert!(!has_compressed_extension("a.tar"));
    }

    #[test]
    fn extract_filename_takes_last_component() {
        assert_eq!(extract_filename("a/b/c.txt"), "c.txt");
        assert_eq!(extract_filename("c.txt"), "c.txt");
        assert_eq!(extract_filename("a/"), "");
    }

    #[test]
    fn mirrored_dest_dir_strips_root_components() {
        let dir = mirrored_dest_dir("/abs/path/file.txt", "mirror").unwrap();
        assert_eq!(
            dir,
            Path::new("mirror").join("abs").join("path").to_string_lossy()
        );
    }

    #[test]
    fn mirrored_dest_dir_refuses_parent_escapes() {
        assert!(mirrored_dest_dir("../evil/file.txt", "mirror").is_none());
    }
}
