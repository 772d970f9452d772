//! Delta compression against a reference file: a source that mostly equals
//! the reference compresses to a tiny patch, and the same reference
//! reproduces the source on decode.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use zstdr::codec::CompressionParams;
use zstdr::{compress_filename, decompress_filename, Context, Display, Prefs};

fn quiet() -> Display {
    Display::new(0)
}

/// Deterministic pseudo-random bytes (plain linear congruential walk).
fn pseudo_random(len: usize, mut seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    for _ in 0..len {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        data.push((seed >> 56) as u8);
    }
    data
}

fn patch_compress(src: &Path, dst: &Path, reference: &Path) -> std::io::Result<()> {
    let mut prefs = Prefs::default();
    prefs.patch_from = true;
    let mut ctx = Context::new(1);
    compress_filename(
        &mut ctx,
        &mut prefs,
        &quiet(),
        dst.to_str().unwrap(),
        src.to_str().unwrap(),
        Some(reference.to_str().unwrap()),
        3,
        CompressionParams::default(),
    )
}

fn patch_decompress(src: &Path, dst: &Path, reference: &Path) -> std::io::Result<()> {
    let mut prefs = Prefs::default();
    prefs.patch_from = true;
    // The patched file is slightly larger than the reference, so the decode
    // window must cover it; mirror the documented `--memory` usage.
    prefs.mem_limit = 4 << 20;
    let mut ctx = Context::new(1);
    decompress_filename(
        &mut ctx,
        &mut prefs,
        &quiet(),
        dst.to_str().unwrap(),
        src.to_str().unwrap(),
        Some(reference.to_str().unwrap()),
    )
}

#[test]
fn appended_tail_compresses_to_a_small_patch() {
    let dir = TempDir::new().unwrap();
    let reference = dir.path().join("reference.bin");
    let source = dir.path().join("source.bin");
    let patch = dir.path().join("source.patch.zst");
    let rebuilt = dir.path().join("rebuilt.bin");

    // Reference: 1 MiB of incompressible data. Source: the same bytes with
    // a 4 KiB tail appended.
    let base = pseudo_random(1 << 20, 0x5eed);
    let mut full = base.clone();
    full.extend_from_slice(&pseudo_random(4096, 0x7a11));
    fs::write(&reference, &base).unwrap();
    fs::write(&source, &full).unwrap();

    patch_compress(&source, &patch, &reference).unwrap();
    let patch_len = fs::metadata(&patch).unwrap().len();
    assert!(
        patch_len <= 8 * 1024,
        "patch is {} bytes; the shared megabyte should collapse",
        patch_len
    );

    patch_decompress(&patch, &rebuilt, &reference).unwrap();
    assert_eq!(fs::read(&rebuilt).unwrap(), full);
}

#[test]
fn small_edit_in_place_compresses_to_a_small_patch() {
    let dir = TempDir::new().unwrap();
    let reference = dir.path().join("reference.bin");
    let source = dir.path().join("source.bin");
    let patch = dir.path().join("source.patch.zst");
    let rebuilt = dir.path().join("rebuilt.bin");

    let base = pseudo_random(512 * 1024, 99);
    let mut edited = base.clone();
    for b in &mut edited[100_000..100_064] {
        *b ^= 0x42;
    }
    fs::write(&reference, &base).unwrap();
    fs::write(&source, &edited).unwrap();

    patch_compress(&source, &patch, &reference).unwrap();
    assert!(fs::metadata(&patch).unwrap().len() <= 8 * 1024);

    patch_decompress(&patch, &rebuilt, &reference).unwrap();
    assert_eq!(fs::read(&rebuilt).unwrap(), edited);
}

#[test]
fn patch_from_refuses_the_reference_as_input() {
    let dir = TempDir::new().unwrap();
    let reference = dir.path().join("reference.bin");
    fs::write(&reference, pseudo_random(4096, 5)).unwrap();
    let patch = dir.path().join("out.zst");

    // Compressing the reference against itself is rejected up front.
    assert!(patch_compress(&reference, &patch, &reference).is_err());
}
