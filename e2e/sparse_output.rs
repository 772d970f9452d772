//! Sparse decode output: byte-exact reconstruction with holes for zero
//! runs, correct trailing-zero finalization, and reduced disk usage on
//! filesystems that support holes.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use zstdr::codec::CompressionParams;
use zstdr::{compress_filename, decompress_filename, Context, Display, Prefs, SparseMode};

fn quiet() -> Display {
    Display::new(0)
}

fn compress(src: &Path, dst: &Path, level: i32) {
    let mut ctx = Context::new(1);
    compress_filename(
        &mut ctx,
        &mut Prefs::default(),
        &quiet(),
        dst.to_str().unwrap(),
        src.to_str().unwrap(),
        None,
        level,
        CompressionParams::default(),
    )
    .unwrap();
}

fn decompress_sparse(src: &Path, dst: &Path, mode: SparseMode) {
    let mut prefs = Prefs::default();
    prefs.sparse_mode = mode;
    let mut ctx = Context::new(1);
    decompress_filename(
        &mut ctx,
        &mut prefs,
        &quiet(),
        dst.to_str().unwrap(),
        src.to_str().unwrap(),
        None,
    )
    .unwrap();
}

#[test]
fn all_zero_megabyte_reconstructs_exactly() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("zeros.bin");
    let zst = dir.path().join("zeros.zst");
    let out = dir.path().join("zeros.out");
    fs::write(&src, vec![0u8; 1 << 20]).unwrap();

    compress(&src, &zst, 1);
    decompress_sparse(&zst, &out, SparseMode::Forced);

    let data = fs::read(&out).unwrap();
    assert_eq!(data.len(), 1 << 20);
    assert!(data.iter().all(|&b| b == 0));
    assert_eq!(*data.last().unwrap(), 0, "trailing hole is materialized");
}

#[cfg(unix)]
#[test]
fn all_zero_output_occupies_little_disk() {
    use std::os::unix::fs::MetadataExt;

    let dir = TempDir::new().unwrap();
    let src = dir.path().join("zeros.bin");
    let zst = dir.path().join("zeros.zst");
    let out = dir.path().join("zeros.out");
    fs::write(&src, vec![0u8; 1 << 20]).unwrap();

    compress(&src, &zst, 1);
    decompress_sparse(&zst, &out, SparseMode::Forced);

    let md = fs::metadata(&out).unwrap();
    assert_eq!(md.len(), 1 << 20);
    // On hole-supporting filesystems nearly nothing is allocated; stay
    // well under half the logical size to tolerate metadata blocks.
    assert!(
        md.blocks() * 512 < (1 << 19),
        "allocated {} bytes for a sparse file",
        md.blocks() * 512
    );
}

#[test]
fn zero_runs_between_data_reconstruct_exactly() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("mixed.bin");
    let zst = dir.path().join("mixed.zst");

    let mut data = Vec::new();
    data.extend_from_slice(&[0xA5u8; 8 * 1024]);
    data.extend_from_slice(&vec![0u8; 256 * 1024]);
    data.extend_from_slice(&[0x5Au8; 8 * 1024]);
    data.extend_from_slice(&vec![0u8; 64 * 1024]); // trailing hole
    fs::write(&src, &data).unwrap();

    compress(&src, &zst, 3);

    for mode in [SparseMode::Forced, SparseMode::Auto, SparseMode::Disabled] {
        let out = dir.path().join(format!("mixed.{:?}.out", mode));
        decompress_sparse(&zst, &out, mode);
        assert_eq!(fs::read(&out).unwrap(), data, "mode {:?}", mode);
    }
}

#[test]
fn unaligned_lengths_reconstruct_exactly() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("odd.bin");
    let zst = dir.path().join("odd.zst");
    let out = dir.path().join("odd.out");

    // Length deliberately prime-ish; ends mid-word with zeros.
    let mut data = vec![7u8; 12_347];
    data.extend_from_slice(&vec![0u8; 4_099]);
    fs::write(&src, &data).unwrap();

    compress(&src, &zst, 3);
    decompress_sparse(&zst, &out, SparseMode::Forced);
    assert_eq!(fs::read(&out).unwrap(), data);
}
