//! Auxiliary compression backends: gzip, xz, lzma-alone, and lz4.
//!
//! Each backend reuses the batch's staging buffers and follows the same
//! outer shape as the zstd loop (read a chunk, push it through the codec,
//! write what comes out, show throttled progress) while the codec-specific
//! state machine differs per library:
//!
//! - gzip drives a deflate stream with the gzip wrapper (window 15 + 16);
//! - xz uses the easy encoder with a CRC64 integrity check, lzma-alone the
//!   legacy single-stream encoder with a preset;
//! - lz4 emits a frame of linked 64 KiB blocks, with the content size
//!   recorded when the source size is known.
//!
//! Levels are clamped to each format's own range ([0..9] for gzip and
//! xz/lzma; lz4 has a single strength in this backend).

use std::io::{self, Read, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use liblzma::stream::{Action, Check, LzmaOptions, Status, Stream};
use lz4_flex::frame::{BlockMode, BlockSize, FrameEncoder, FrameInfo};

use crate::io::compress::{read_fill, CompressResources};
use crate::io::display::{human_size, Display};
use crate::io::file_io::DstFile;

// ---------------------------------------------------------------------------
// Output byte counting
// ---------------------------------------------------------------------------

/// Counts bytes flowing into the wrapped writer, so encoders that own the
/// write path can still report the compressed size.
struct CountingWriter<'a> {
    inner: &'a mut DstFile,
    bytes: u64,
}

impl<'a> CountingWriter<'a> {
    fn new(inner: &'a mut DstFile) -> Self {
        CountingWriter { inner, bytes: 0 }
    }

    fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn progress_line(
    display: &Display,
    in_size: u64,
    out_size: u64,
    total: Option<u64>,
) {
    let ratio = out_size as f64 / in_size.max(1) as f64 * 100.0;
    match total {
        Some(t) => display.update(
            2,
            &format!(
                "\rRead : {} / {} ==> {:.2}% ",
                human_size(in_size),
                human_size(t),
                ratio
            ),
        ),
        None => display.update(
            2,
            &format!("\rRead : {} ==> {:.2}% ", human_size(in_size), ratio),
        ),
    }
}

// ---------------------------------------------------------------------------
// gzip
// ---------------------------------------------------------------------------

/// Compresses one source stream into a gzip member.
#[allow(clippy::too_many_arguments)]
pub fn compress_gzip_frame(
    ress: &mut CompressResources,
    display: &Display,
    src: &mut dyn Read,
    dst: &mut DstFile,
    src_name: &str,
    src_size: Option<u64>,
    level: i32,
    readsize: &mut u64,
) -> io::Result<u64> {
    let level = level.clamp(0, 9) as u32;
    let mut counter = CountingWriter::new(dst);
    let mut encoder = GzEncoder::new(&mut counter, Compression::new(level));

    loop {
        let n = read_fill(src, &mut ress.src_buf)?;
        if n == 0 {
            break;
        }
        *readsize += n as u64;
        encoder.write_all(&ress.src_buf[..n]).map_err(|e| {
            io::Error::new(e.kind(), format!("{}: gzip compression error: {}", src_name, e))
        })?;
        progress_line(display, *readsize, encoder.get_ref().bytes(), src_size);
    }

    encoder.finish().map_err(|e| {
        io::Error::new(e.kind(), format!("{}: gzip finish error: {}", src_name, e))
    })?;
    Ok(counter.bytes())
}

// ---------------------------------------------------------------------------
// xz / lzma
// ---------------------------------------------------------------------------

/// Compresses one source stream as xz (`plain_lzma == false`, CRC64
/// integrity check) or as a legacy lzma-alone stream.
#[allow(clippy::too_many_arguments)]
pub fn compress_lzma_frame(
    ress: &mut CompressResources,
    display: &Display,
    src: &mut dyn Read,
    dst: &mut DstFile,
    src_name: &str,
    src_size: Option<u64>,
    level: i32,
    plain_lzma: bool,
    readsize: &mut u64,
) -> io::Result<u64> {
    let preset = level.clamp(0, 9) as u32;
    let mut strm = if plain_lzma {
        let opts = LzmaOptions::new_preset(preset)
            .map_err(|e| io::Error::other(format!("{}: lzma preset error: {}", src_name, e)))?;
        Stream::new_lzma_encoder(&opts)
            .map_err(|e| io::Error::other(format!("{}: lzma encoder error: {}", src_name, e)))?
    } else {
        Stream::new_easy_encoder(preset, Check::Crc64)
            .map_err(|e| io::Error::other(format!("{}: xz encoder error: {}", src_name, e)))?
    };

    let mut out_size = 0u64;
    let mut finishing = false;
    let mut filled = 0usize;
    let mut pos = 0usize;

    loop {
        if pos == filled && !finishing {
            filled = read_fill(src, &mut ress.src_buf)?;
            pos = 0;
            *readsize += filled as u64;
            if filled == 0 {
                finishing = true;
            }
        }

        let action = if finishing { Action::Finish } else { Action::Run };
        let before_in = strm.total_in();
        let before_out = strm.total_out();
        let status = strm
            .process(&ress.src_buf[pos..filled], &mut ress.dst_buf, action)
            .map_err(|e| {
                io::Error::other(format!("{}: lzma encoding error: {}", src_name, e))
            })?;
        pos += (strm.total_in() - before_in) as usize;
        let produced = (strm.total_out() - before_out) as usize;

        if produced > 0 {
            dst.write_all(&ress.dst_buf[..produced])?;
            out_size += produced as u64;
        }
        progress_line(display, *readsize, out_size, src_size);

        if let Status::StreamEnd = status {
            break;
        }
    }

    Ok(out_size)
}

// ---------------------------------------------------------------------------
// lz4
// ---------------------------------------------------------------------------

/// Compresses one source stream into an lz4 frame of linked 64 KiB blocks.
#[allow(clippy::too_many_arguments)]
pub fn compress_lz4_frame(
    ress: &mut CompressResources,
    display: &Display,
    src: &mut dyn Read,
    dst: &mut DstFile,
    src_name: &str,
    src_size: Option<u64>,
    _level: i32,
    checksum: bool,
    readsize: &mut u64,
) -> io::Result<u64> {
    let mut info = FrameInfo::new()
        .block_size(BlockSize::Max64KB)
        .block_mode(BlockMode::Linked)
        .content_checksum(checksum);
    if src_size.is_some() {
        info = info.content_size(src_size);
    }

    let mut counter = CountingWriter::new(dst);
    let mut encoder = FrameEncoder::with_frame_info(info, &mut counter);

    loop {
        let n = read_fill(src, &mut ress.src_buf)?;
        if n == 0 {
            break;
        }
        *readsize += n as u64;
        encoder.write_all(&ress.src_buf[..n]).map_err(|e| {
            io::Error::new(e.kind(), format!("{}: lz4 compression error: {}", src_name, e))
        })?;
        progress_line(display, *readsize, encoder.get_ref().bytes(), src_size);
    }

    encoder
        .finish()
        .map_err(|e| io::Error::other(format!("{}: lz4 finish error: {}", src_name, e)))?;
    Ok(counter.bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::prefs::Prefs;
    use std::io::Cursor;

    fn quiet() -> Display {
        Display::new(0)
    }

    fn ress() -> CompressResources {
        let mut prefs = Prefs::default();
        CompressResources::new(&mut prefs, &quiet(), None, None, 3, Default::default()).unwrap()
    }

    fn temp_dst(dir: &tempfile::TempDir, name: &str) -> DstFile {
        let path = dir.path().join(name);
        DstFile::File {
            file: std::fs::File::create(&path).unwrap(),
            path: path.to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn gzip_output_carries_magic() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut dst = temp_dst(&dir, "out.gz");
        let mut src = Cursor::new(b"gzip backend payload".repeat(100));
        let mut readsize = 0u64;
        let out = compress_gzip_frame(
            &mut ress(),
            &quiet(),
            &mut src,
            &mut dst,
            "mem",
            None,
            6,
            &mut readsize,
        )
        .unwrap();
        assert!(out > 0);
        assert_eq!(readsize, 2000);
        drop(dst);
        let bytes = std::fs::read(dir.path().join("out.gz")).unwrap();
        assert_eq!(&bytes[..2], &[0x1F, 0x8B]);
    }

    #[test]
    fn xz_output_carries_magic() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut dst = temp_dst(&dir, "out.xz");
        let mut src = Cursor::new(b"xz backend payload".repeat(100));
        let mut readsize = 0u64;
        compress_lzma_frame(
            &mut ress(),
            &quiet(),
            &mut src,
            &mut dst,
            "mem",
            None,
            6,
            false,
            &mut readsize,
        )
        .unwrap();
        drop(dst);
        let bytes = std::fs::read(dir.path().join("out.xz")).unwrap();
        assert_eq!(&bytes[..2], &[0xFD, 0x37]);
    }

    #[test]
    fn lzma_alone_output_carries_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut dst = temp_dst(&dir, "out.lzma");
        let mut src = Cursor::new(b"lzma backend payload".repeat(100));
        let mut readsize = 0u64;
        compress_lzma_frame(
            &mut ress(),
            &quiet(),
            &mut src,
            &mut dst,
            "mem",
            None,
            6,
            true,
            &mut readsize,
        )
        .unwrap();
        drop(dst);
        let bytes = std::fs::read(dir.path().join("out.lzma")).unwrap();
        assert_eq!(&bytes[..2], &[0x5D, 0x00]);
    }

    #[test]
    fn lz4_output_carries_magic() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut dst = temp_dst(&dir, "out.lz4");
        let mut src = Cursor::new(b"lz4 backend payload".repeat(100));
        let mut readsize = 0u64;
        compress_lz4_frame(
            &mut ress(),
            &quiet(),
            &mut src,
            &mut dst,
            "mem",
            Some(2000),
            1,
            true,
            &mut readsize,
        )
        .unwrap();
        drop(dst);
        let bytes = std::fs::read(dir.path().join("out.lz4")).unwrap();
        assert_eq!(&bytes[..4], &[0x04, 0x22, 0x4D, 0x18]);
    }
}
