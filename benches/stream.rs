//! Throughput of the streaming engine over real files.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::fs;
use tempfile::TempDir;
use zstdr::codec::CompressionParams;
use zstdr::{compress_filename, decompress_filename, Context, Display, Prefs};

const PAYLOAD: usize = 1 << 20;

fn sample(len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    let mut i = 0u64;
    while data.len() < len {
        data.extend_from_slice(format!("entry {:012x} ", i).as_bytes());
        i = i.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
    }
    data.truncate(len);
    data
}

fn bench_stream(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("input.bin");
    fs::write(&src, sample(PAYLOAD)).unwrap();
    let zst = dir.path().join("input.zst");
    let out = dir.path().join("input.out");
    let display = Display::new(0);

    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Bytes(PAYLOAD as u64));

    group.bench_function("compress_level3", |b| {
        b.iter(|| {
            let mut prefs = Prefs::default();
            prefs.overwrite = true;
            let mut ctx = Context::new(1);
            compress_filename(
                &mut ctx,
                &mut prefs,
                &display,
                zst.to_str().unwrap(),
                src.to_str().unwrap(),
                None,
                3,
                CompressionParams::default(),
            )
            .unwrap();
        })
    });

    group.bench_function("decompress", |b| {
        b.iter(|| {
            let mut prefs = Prefs::default();
            prefs.overwrite = true;
            let mut ctx = Context::new(1);
            decompress_filename(
                &mut ctx,
                &mut prefs,
                &display,
                out.to_str().unwrap(),
                zst.to_str().unwrap(),
                None,
            )
            .unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_stream);
criterion_main!(benches);
