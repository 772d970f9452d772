//! End-to-end round trips over real files: every backend, a spread of
//! levels, multi-frame concatenation, and the pledged content size.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use zstdr::codec::{self, CompressionParams};
use zstdr::{
    compress_filename, decompress_filename, CompressionFormat, Context, Display, Prefs,
};

fn quiet() -> Display {
    Display::new(0)
}

fn write_sample(path: &Path, len: usize) -> Vec<u8> {
    // Compressible but non-trivial: repeated phrase with a counter mixed in.
    let mut data = Vec::with_capacity(len);
    let mut i = 0u32;
    while data.len() < len {
        data.extend_from_slice(format!("block {:08} of sample text; ", i).as_bytes());
        i = i.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    }
    data.truncate(len);
    fs::write(path, &data).unwrap();
    data
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

#[test]
fn hello_world_round_trip_is_tiny() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("hello.txt");
    let zst = dir.path().join("hello.txt.zst");
    let back = dir.path().join("hello.out");
    fs::write(&src, b"hello, world\n").unwrap();

    compress(&src, &zst, &mut Prefs::default(), 3).unwrap();
    let compressed = fs::read(&zst).unwrap();
    assert!(compressed.len() <= 30, "compressed to {} bytes", compressed.len());

    decompress(&zst, &back, &mut Prefs::default()).unwrap();
    assert_eq!(fs::read(&back).unwrap(), b"hello, world\n");
}

#[test]
fn round_trip_across_levels() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("sample.bin");
    let data = write_sample(&src, 100 * 1024);

    for level in [-5, -1, 1, 3, 9, 19] {
        let zst = dir.path().join(format!("sample.{}.zst", level));
        let back = dir.path().join(format!("sample.{}.out", level));
        compress(&src, &zst, &mut Prefs::default(), level).unwrap();
        decompress(&zst, &back, &mut Prefs::default()).unwrap();
        assert_eq!(fs::read(&back).unwrap(), data, "level {}", level);
    }
}

#[test]
fn empty_input_round_trips() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("empty");
    let zst = dir.path().join("empty.zst");
    let back = dir.path().join("empty.out");
    fs::write(&src, b"").unwrap();

    compress(&src, &zst, &mut Prefs::default(), 3).unwrap();
    assert!(fs::metadata(&zst).unwrap().len() > 0, "a frame is still emitted");
    decompress(&zst, &back, &mut Prefs::default()).unwrap();
    assert_eq!(fs::metadata(&back).unwrap().len(), 0);
}

#[test]
fn concatenated_frames_decode_in_order() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::write(&a, b"abc").unwrap();
    fs::write(&b, b"def").unwrap();

    let a_z = dir.path().join("a.zst");
    let b_z = dir.path().join("b.zst");
    compress(&a, &a_z, &mut Prefs::default(), 3).unwrap();
    compress(&b, &b_z, &mut Prefs::default(), 3).unwrap();

    let joined = dir.path().join("joined.zst");
    let mut bytes = fs::read(&a_z).unwrap();
    bytes.extend_from_slice(&fs::read(&b_z).unwrap());
    fs::write(&joined, &bytes).unwrap();

    let back = dir.path().join("joined.out");
    decompress(&joined, &back, &mut Prefs::default()).unwrap();
    assert_eq!(fs::read(&back).unwrap(), b"abcdef");
}

#[test]
fn every_format_round_trips() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("multi.bin");
    let data = write_sample(&src, 50 * 1024);

    let formats = [
        (CompressionFormat::Zstd, "zst"),
        (CompressionFormat::Gzip, "gz"),
        (CompressionFormat::Xz, "xz"),
        (CompressionFormat::Lzma, "lzma"),
        (CompressionFormat::Lz4, "lz4"),
    ];
    for (format, ext) in formats {
        let packed = dir.path().join(format!("multi.{}", ext));
        let back = dir.path().join(format!("multi.{}.out", ext));

        let mut prefs = Prefs::default();
        prefs.format = format;
        compress(&src, &packed, &mut prefs, 6).unwrap();

        // Decoding sniffs the format from the magic, not from preferences.
        decompress(&packed, &back, &mut Prefs::default()).unwrap();
        assert_eq!(fs::read(&back).unwrap(), data, "format {:?}", format);
    }
}

#[test]
fn mixed_format_concatenation_decodes() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::write(&a, b"first part / ").unwrap();
    fs::write(&b, b"second part").unwrap();

    let a_z = dir.path().join("a.zst");
    let b_gz = dir.path().join("b.gz");
    compress(&a, &a_z, &mut Prefs::default(), 3).unwrap();
    let mut gz_prefs = Prefs::default();
    gz_prefs.format = CompressionFormat::Gzip;
    compress(&b, &b_gz, &mut gz_prefs, 6).unwrap();

    let joined = dir.path().join("joined.mixed");
    let mut bytes = fs::read(&a_z).unwrap();
    bytes.extend_from_slice(&fs::read(&b_gz).unwrap());
    fs::write(&joined, &bytes).unwrap();

    let back = dir.path().join("joined.out");
    decompress(&joined, &back, &mut Prefs::default()).unwrap();
    assert_eq!(fs::read(&back).unwrap(), b"first part / second part");
}

#[test]
fn known_size_is_pledged_in_the_frame() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("sized.bin");
    write_sample(&src, 12_345);
    let zst = dir.path().join("sized.zst");
    compress(&src, &zst, &mut Prefs::default(), 3).unwrap();

    let compressed = fs::read(&zst).unwrap();
    let header = codec::frame_header(&compressed).expect("valid frame header");
    assert_eq!(header.content_size, Some(12_345));
}

#[test]
fn content_size_can_be_suppressed() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("nosize.bin");
    write_sample(&src, 4096);
    let zst = dir.path().join("nosize.zst");

    let mut prefs = Prefs::default();
    prefs.content_size = false;
    compress(&src, &zst, &mut prefs, 3).unwrap();

    let compressed = fs::read(&zst).unwrap();
    let header = codec::frame_header(&compressed).expect("valid frame header");
    assert_eq!(header.content_size, None);
}
