//! Failure paths: pledged-size mismatch, window-limit refusal with
//! recovery, truncated trailing frames, unknown formats, and empty input.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use tempfile::TempDir;
use zstdr::codec::CompressionParams;
use zstdr::io::compress::{compress_zstd_frame, CompressResources};
use zstdr::io::file_io::DstFile;
use zstdr::{
    compress_filename, decompress_filename, decompress_multiple_filenames, Context, Display,
    Prefs,
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
// Pledged size honesty
// ---------------------------------------------------------------------------

#[test]
fn short_read_against_pledged_size_fails() {
    let dir = TempDir::new().unwrap();
    let out_path = dir.path().join("short.zst");

    let mut prefs = Prefs::default();
    let mut ress = CompressResources::new(
        &mut prefs,
        &quiet(),
        None,
        Some(100),
        3,
        CompressionParams::default(),
    )
    .unwrap();

    // The stream claims 100 bytes but delivers 50.
    let mut src = Cursor::new(vec![7u8; 50]);
    let mut dst = DstFile::File {
        file: fs::File::create(&out_path).unwrap(),
        path: out_path.to_string_lossy().into_owned(),
    };
    let ctx = Context::new(1);
    let mut readsize = 0u64;
    let err = compress_zstd_frame(
        &ctx,
        &prefs,
        &mut ress,
        &quiet(),
        &mut src,
        &mut dst,
        "pledged",
        Some(100),
        3,
        &mut readsize,
    )
    .unwrap_err();
    assert!(err.to_string().contains("incomplete read"), "got: {}", err);
}

// ---------------------------------------------------------------------------
// Window limit
// ---------------------------------------------------------------------------

#[test]
fn window_above_memory_limit_fails_then_succeeds_with_room() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("big.bin");
    let zst = dir.path().join("big.zst");
    fs::write(&src, vec![3u8; 2 << 20]).unwrap();

    let mut prefs = Prefs::default();
    prefs.ldm = true;
    let mut ctx = Context::new(1);
    let mut params = CompressionParams::default();
    params.window_log = 25;
    compress_filename(
        &mut ctx,
        &mut prefs,
        &quiet(),
        zst.to_str().unwrap(),
        src.to_str().unwrap(),
        None,
        3,
        params,
    )
    .unwrap();

    // A 1 MiB decoder cap cannot host this frame's window.
    let out = dir.path().join("big.out");
    let mut tight = Prefs::default();
    tight.mem_limit = 1 << 20;
    assert!(decompress(&zst, &out, &mut tight).is_err());
    assert!(!out.exists(), "failed decode leaves no artifact");

    // The default limit (and any sufficient --memory) accepts it.
    decompress(&zst, &out, &mut Prefs::default()).unwrap();
    assert_eq!(fs::metadata(&out).unwrap().len(), 2 << 20);
}

// ---------------------------------------------------------------------------
// Truncation
// ---------------------------------------------------------------------------

#[test]
fn truncated_final_frame_fails_but_keeps_earlier_frames() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::write(&a, b"first frame payload").unwrap();
    fs::write(&b, vec![9u8; 50_000]).unwrap();

    let a_z = dir.path().join("a.zst");
    let b_z = dir.path().join("b.zst");
    compress(&a, &a_z, &mut Prefs::default(), 3).unwrap();
    compress(&b, &b_z, &mut Prefs::default(), 3).unwrap();

    // Chop the tail off the second stream.
    let mut truncated = fs::read(&b_z).unwrap();
    truncated.truncate(truncated.len() - 4);
    let b_trunc = dir.path().join("b_trunc.zst");
    fs::write(&b_trunc, &truncated).unwrap();

    // Decode both into one shared output: the good file lands, the
    // truncated one errors, and the shared output survives.
    let joined = dir.path().join("joined.out");
    let srcs = vec![
        a_z.to_str().unwrap().to_owned(),
        b_trunc.to_str().unwrap().to_owned(),
    ];
    let mut prefs = Prefs::default();
    prefs.overwrite = true;
    let mut ctx = Context::new(srcs.len());
    let missed = decompress_multiple_filenames(
        &mut ctx,
        &mut prefs,
        &quiet(),
        &srcs,
        None,
        None,
        Some(joined.to_str().unwrap()),
        None,
    )
    .unwrap();
    assert_eq!(missed, 1);

    let data = fs::read(&joined).unwrap();
    assert!(data.starts_with(b"first frame payload"));
}

#[test]
fn truncated_single_frame_removes_the_artifact() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("data");
    fs::write(&src, vec![1u8; 40_000]).unwrap();
    let zst = dir.path().join("data.zst");
    compress(&src, &zst, &mut Prefs::default(), 3).unwrap();

    let mut bytes = fs::read(&zst).unwrap();
    bytes.truncate(bytes.len() / 2);
    let bad = dir.path().join("bad.zst");
    fs::write(&bad, &bytes).unwrap();

    let out = dir.path().join("data.out");
    assert!(decompress(&bad, &out, &mut Prefs::default()).is_err());
    assert!(!out.exists());
}

// ---------------------------------------------------------------------------
// Unknown formats and empty input
// ---------------------------------------------------------------------------

#[test]
fn unknown_magic_without_pass_through_is_refused() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("noise.bin");
    fs::write(&src, b"definitely not a frame").unwrap();

    let out = dir.path().join("noise.out");
    let err = decompress(&src, &out, &mut Prefs::default()).unwrap_err();
    assert!(err.to_string().contains("unsupported format"), "got: {}", err);
    assert!(!out.exists());
}

#[test]
fn empty_input_is_invalid() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("empty.zst");
    fs::write(&src, b"").unwrap();

    let out = dir.path().join("empty.out");
    let err = decompress(&src, &out, &mut Prefs::default()).unwrap_err();
    assert!(err.to_string().contains("unexpected end"), "got: {}", err);
}

#[test]
fn garbage_after_valid_frames_is_refused() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("data");
    fs::write(&src, b"valid payload").unwrap();
    let zst = dir.path().join("data.zst");
    compress(&src, &zst, &mut Prefs::default(), 3).unwrap();

    let mut bytes = fs::read(&zst).unwrap();
    bytes.extend_from_slice(b"tail of junk bytes");
    let mixed = dir.path().join("mixed.zst");
    fs::write(&mixed, &bytes).unwrap();

    let out = dir.path().join("mixed.out");
    assert!(decompress(&mixed, &out, &mut Prefs::default()).is_err());
}
