//! Destination-lifecycle behavior: source removal and preservation,
//! overwrite policy, self-overwrite refusal, metadata transfer, batch
//! naming, output directories, exclusion, test mode, and pass-through.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use zstdr::codec::CompressionParams;
use zstdr::{
    compress_filename, compress_multiple_filenames, decompress_filename,
    decompress_multiple_filenames, Context, Display, Prefs,
};

fn quiet() -> Display {
    Display::new(0)
}

fn compress(src: &Path, dst: &Path, prefs: &mut Prefs, level: i32) -> std::io::Result<()> {
    let mut ctx = Context::new(1);
    compress_filename(
        &mut ctx,
        prefs,
        &quiet(),
        dst.to_str().unwrap(),
        src.to_str().unwrap(),
        None,
        level,
        CompressionParams::default(),
    )
}

fn decompress(src: &Path, dst: &Path, prefs: &mut Prefs) -> std::io::Result<()> {
    let mut ctx = Context::new(1);
    decompress_filename(
        &mut ctx,
        prefs,
        &quiet(),
        dst.to_str().unwrap(),
        src.to_str().unwrap(),
        None,
    )
}

// ---------------------------------------------------------------------------
// Source removal / preservation
// ---------------------------------------------------------------------------

#[test]
fn remove_src_deletes_source_only_on_success() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("data.txt");
    let dst = dir.path().join("data.txt.zst");
    fs::write(&src, b"to be moved").unwrap();

    let mut prefs = Prefs::default();
    prefs.remove_src_file = true;
    compress(&src, &dst, &mut prefs, 3).unwrap();
    assert!(!src.exists(), "source removed after success");
    assert!(dst.exists());
}

#[test]
fn source_kept_by_default() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("data.txt");
    let dst = dir.path().join("data.txt.zst");
    fs::write(&src, b"to be kept").unwrap();

    compress(&src, &dst, &mut Prefs::default(), 3).unwrap();
    assert!(src.exists());
    assert!(dst.exists());
}

#[test]
fn source_kept_when_compression_fails() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("missing.txt");
    let dst = dir.path().join("missing.txt.zst");

    let mut prefs = Prefs::default();
    prefs.remove_src_file = true;
    assert!(compress(&src, &dst, &mut prefs, 3).is_err());
    assert!(!dst.exists(), "no artifact left behind");
}

// ---------------------------------------------------------------------------
// Overwrite policy and self-overwrite
// ---------------------------------------------------------------------------

#[test]
fn existing_destination_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("data.txt");
    let dst = dir.path().join("data.txt.zst");
    fs::write(&src, b"fresh data").unwrap();
    fs::write(&dst, b"old artifact").unwrap();

    // overwrite=false at level 0: silent refusal, no prompt possible.
    let err = compress(&src, &dst, &mut Prefs::default(), 3);
    assert!(err.is_err());
    assert_eq!(fs::read(&dst).unwrap(), b"old artifact");
    assert!(src.exists());
}

#[test]
fn force_overwrites_existing_destination() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("data.txt");
    let dst = dir.path().join("data.txt.zst");
    fs::write(&src, b"fresh data").unwrap();
    fs::write(&dst, b"old artifact").unwrap();

    let mut prefs = Prefs::default();
    prefs.overwrite = true;
    compress(&src, &dst, &mut prefs, 3).unwrap();
    let back = dir.path().join("back.txt");
    decompress(&dst, &back, &mut Prefs::default()).unwrap();
    assert_eq!(fs::read(&back).unwrap(), b"fresh data");
}

#[test]
fn refuses_to_overwrite_the_source_itself() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("data.txt");
    fs::write(&src, b"important data").unwrap();

    let mut prefs = Prefs::default();
    prefs.overwrite = true; // even with force
    assert!(compress(&src, &src, &mut prefs, 3).is_err());
    assert_eq!(fs::read(&src).unwrap(), b"important data");
}

// ---------------------------------------------------------------------------
// Metadata transfer
// ---------------------------------------------------------------------------

#[test]
fn mtime_is_transferred_to_destination() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("old.txt");
    let dst = dir.path().join("old.txt.zst");
    fs::write(&src, b"aged content").unwrap();

    let old_mtime = SystemTime::now() - Duration::from_secs(7 * 24 * 3600);
    let ft = filetime_from(old_mtime);
    filetime::set_file_mtime(&src, ft).unwrap();

    compress(&src, &dst, &mut Prefs::default(), 3).unwrap();
    let dst_mtime = fs::metadata(&dst).unwrap().modified().unwrap();
    let diff = match dst_mtime.duration_since(old_mtime) {
        Ok(d) => d,
        Err(e) => e.duration(),
    };
    assert!(diff < Duration::from_secs(2), "mtime drifted by {:?}", diff);
}

fn filetime_from(t: SystemTime) -> filetime::FileTime {
    filetime::FileTime::from_system_time(t)
}

#[cfg(unix)]
#[test]
fn permissions_are_transferred_to_destination() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let src = dir.path().join("locked.txt");
    let dst = dir.path().join("locked.txt.zst");
    fs::write(&src, b"restricted").unwrap();
    fs::set_permissions(&src, fs::Permissions::from_mode(0o640)).unwrap();

    compress(&src, &dst, &mut Prefs::default(), 3).unwrap();
    let mode = fs::metadata(&dst).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode, 0o640);
}

// ---------------------------------------------------------------------------
// Batches and output directories
// ---------------------------------------------------------------------------

#[test]
fn batch_compress_then_batch_decompress() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"contents of a").unwrap();
    fs::write(&b, b"contents of b, longer").unwrap();

    let srcs = vec![
        a.to_str().unwrap().to_owned(),
        b.to_str().unwrap().to_owned(),
    ];
    let mut ctx = Context::new(srcs.len());
    let missed = compress_multiple_filenames(
        &mut ctx,
        &mut Prefs::default(),
        &quiet(),
        &srcs,
        None,
        None,
        None,
        ".zst",
        None,
        3,
        CompressionParams::default(),
    )
    .unwrap();
    assert_eq!(missed, 0);
    assert!(dir.path().join("a.txt.zst").exists());
    assert!(dir.path().join("b.txt.zst").exists());

    // Decode the pair into a flat output directory.
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let packed = vec![
        dir.path().join("a.txt.zst").to_str().unwrap().to_owned(),
        dir.path().join("b.txt.zst").to_str().unwrap().to_owned(),
    ];
    let mut ctx = Context::new(packed.len());
    let missed = decompress_multiple_filenames(
        &mut ctx,
        &mut Prefs::default(),
        &quiet(),
        &packed,
        None,
        Some(out.to_str().unwrap()),
        None,
        None,
    )
    .unwrap();
    assert_eq!(missed, 0);
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"contents of a");
    assert_eq!(fs::read(out.join("b.txt")).unwrap(), b"contents of b, longer");
}

#[test]
fn batch_into_single_output_concatenates() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"one|").unwrap();
    fs::write(&b, b"two").unwrap();

    let srcs = vec![
        a.to_str().unwrap().to_owned(),
        b.to_str().unwrap().to_owned(),
    ];
    let joined = dir.path().join("joined.zst");
    let mut prefs = Prefs::default();
    prefs.overwrite = true; // skip the concatenation warning prompt
    let mut ctx = Context::new(srcs.len());
    let missed = compress_multiple_filenames(
        &mut ctx,
        &mut prefs,
        &quiet(),
        &srcs,
        None,
        None,
        Some(joined.to_str().unwrap()),
        ".zst",
        None,
        3,
        CompressionParams::default(),
    )
    .unwrap();
    assert_eq!(missed, 0);

    let back = dir.path().join("joined.out");
    decompress(&joined, &back, &mut Prefs::default()).unwrap();
    assert_eq!(fs::read(&back).unwrap(), b"one|two");
}

#[test]
fn batch_single_output_with_rm_aborts_quietly() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"one").unwrap();
    fs::write(&b, b"two").unwrap();

    let srcs = vec![
        a.to_str().unwrap().to_owned(),
        b.to_str().unwrap().to_owned(),
    ];
    let joined = dir.path().join("joined.zst");
    let mut prefs = Prefs::default();
    prefs.remove_src_file = true; // destructive + quiet display → abort
    let mut ctx = Context::new(srcs.len());
    let missed = compress_multiple_filenames(
        &mut ctx,
        &mut prefs,
        &quiet(),
        &srcs,
        None,
        None,
        Some(joined.to_str().unwrap()),
        ".zst",
        None,
        3,
        CompressionParams::default(),
    )
    .unwrap();
    assert_eq!(missed, srcs.len());
    assert!(a.exists() && b.exists(), "nothing deleted on abort");
}

#[test]
fn mirrored_output_directories_are_recreated() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("tree").join("deep");
    fs::create_dir_all(&nested).unwrap();
    let src = nested.join("leaf.txt");
    fs::write(&src, b"mirrored content").unwrap();

    let mirror = dir.path().join("mirror");
    let srcs = vec![src.to_str().unwrap().to_owned()];
    let mut ctx = Context::new(1);
    let missed = compress_multiple_filenames(
        &mut ctx,
        &mut Prefs::default(),
        &quiet(),
        &srcs,
        Some(mirror.to_str().unwrap()),
        None,
        None,
        ".zst",
        None,
        3,
        CompressionParams::default(),
    )
    .unwrap();
    assert_eq!(missed, 0);

    // The source's directory chain reappears under the mirror root.
    let produced = walk_for_zst(&mirror);
    assert_eq!(produced.len(), 1);
    assert!(produced[0].ends_with("leaf.txt.zst"));
}

fn walk_for_zst(root: &Path) -> Vec<String> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|e| e == "zst") {
                found.push(path.to_string_lossy().into_owned());
            }
        }
    }
    found
}

// ---------------------------------------------------------------------------
// Exclusion, directories, test mode, pass-through
// ---------------------------------------------------------------------------

#[test]
fn exclude_compressed_skips_without_error() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("packed.gz");
    fs::write(&src, b"pretend this is compressed").unwrap();
    let dst = dir.path().join("packed.gz.zst");

    let mut prefs = Prefs::default();
    prefs.exclude_compressed = true;
    compress(&src, &dst, &mut prefs, 3).unwrap();
    assert!(!dst.exists(), "excluded source produces no output");
}

#[test]
fn directory_source_is_an_error() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("folder");
    fs::create_dir(&sub).unwrap();
    let dst = dir.path().join("folder.zst");
    assert!(compress(&sub, &dst, &mut Prefs::default(), 3).is_err());
    assert!(!dst.exists());
}

#[test]
fn test_mode_creates_no_output() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("data.txt");
    let zst = dir.path().join("data.txt.zst");
    fs::write(&src, b"integrity check me").unwrap();
    compress(&src, &zst, &mut Prefs::default(), 3).unwrap();

    let phantom = dir.path().join("phantom.out");
    let mut prefs = Prefs::default();
    prefs.test_mode = true;
    decompress(&zst, &phantom, &mut prefs).unwrap();
    assert!(!phantom.exists(), "test mode never opens a destination");
}

#[test]
fn test_mode_still_detects_corruption() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("data.txt");
    let zst = dir.path().join("data.txt.zst");
    fs::write(&src, vec![42u8; 20_000]).unwrap();
    compress(&src, &zst, &mut Prefs::default(), 3).unwrap();

    // Flip a byte in the middle of the frame body.
    let mut bytes = fs::read(&zst).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    let bad = dir.path().join("bad.zst");
    fs::write(&bad, &bytes).unwrap();

    let phantom = dir.path().join("phantom.out");
    let mut prefs = Prefs::default();
    prefs.test_mode = true;
    assert!(decompress(&bad, &phantom, &mut prefs).is_err());
}

#[test]
fn pass_through_requires_overwrite_and_stdout() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("plain.txt");
    fs::write(&src, b"not compressed at all").unwrap();

    // Unknown magic into a regular file: refused.
    let dst = dir.path().join("plain.out");
    assert!(decompress(&src, &dst, &mut Prefs::default()).is_err());
    assert!(!dst.exists());

    // Unknown magic to stdout with overwrite: forwarded verbatim.
    let mut prefs = Prefs::default();
    prefs.overwrite = true;
    let mut ctx = Context::new(1);
    decompress_filename(
        &mut ctx,
        &mut prefs,
        &quiet(),
        "stdout",
        src.to_str().unwrap(),
        None,
    )
    .unwrap();
}
