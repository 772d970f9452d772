//! Streaming decompression: multi-format dispatch, the zstd frame decoder,
//! pass-through mode, and the decode-side per-file / multi-file
//! orchestration.
//!
//! Compressed streams may concatenate frames of different formats. The
//! dispatcher keeps a held-over input buffer with an explicit `loaded`
//! length: each iteration tops it up to at least four bytes, sniffs the
//! magic number, and routes the whole stream position (held-over bytes
//! included) into the matching frame decoder. Decoders consume exactly
//! through their frame boundary and leave trailing bytes in the held-over
//! buffer for the next iteration.
//!
//! Output goes through a [`DecodeOut`] sink: a sparse-capable writer for
//! regular files, a plain writer for stdout, or nothing in test mode.

use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::Path;

use crate::codec::{self, Dctx, InBuffer, OutBuffer};
use crate::config::WINDOWLOG_MAX;
use crate::io::compress::adjust_mem_limit_for_patch_from;
use crate::io::decompress_other::{
    decompress_gzip_frame, decompress_lz4_frame, decompress_lzma_frame,
};
use crate::io::dict::load_dict;
use crate::io::display::{human_size, Display, ProgressSetting};
use crate::io::file_io::{
    is_stdin_mark, is_stdout_mark, open_dst_file, open_src_file, remove_file, DstFile,
    DEFAULT_FILE_PERMISSIONS,
};
use crate::io::guard::ArtifactGuard;
use crate::io::paths;
use crate::io::prefs::{Context, Prefs, SparseMode};
use crate::io::sparse::SparseWriter;
use crate::util::{file_size, is_directory, set_file_stat};

// ---------------------------------------------------------------------------
// Magic numbers of the auxiliary formats
// ---------------------------------------------------------------------------

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const XZ_MAGIC: [u8; 2] = [0xFD, 0x37];
const LZMA_MAGIC: [u8; 2] = [0x5D, 0x00];
const LZ4_MAGIC: u32 = 0x184D_2204;

/// Pass-through copies input in blocks of this size.
const PASS_THROUGH_BLOCK: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Held-over source buffer
// ---------------------------------------------------------------------------

/// Input staging buffer with an explicit count of live bytes.
///
/// Bytes a frame decoder did not consume stay at the front of `buf` and are
/// seen again by the next dispatch iteration. `loaded` is always the number
/// of valid bytes starting at offset 0.
pub(crate) struct SrcBuffer {
    pub buf: Vec<u8>,
    pub loaded: usize,
}

impl SrcBuffer {
    fn with_capacity(capacity: usize) -> Self {
        SrcBuffer {
            buf: vec![0u8; capacity],
            loaded: 0,
        }
    }

    /// Drops `n` consumed bytes from the front, compacting the tail down.
    pub fn consume_front(&mut self, n: usize) {
        debug_assert!(n <= self.loaded);
        self.buf.copy_within(n..self.loaded, 0);
        self.loaded -= n;
    }

    /// Tops the buffer up from `src` until at least `min` bytes are loaded
    /// or the source hits EOF. Best effort; the caller checks `loaded`.
    pub fn fill_to(&mut self, min: usize, src: &mut dyn Read) -> io::Result<()> {
        let want = min.min(self.buf.len());
        while self.loaded < want {
            match src.read(&mut self.buf[self.loaded..]) {
                Ok(0) => break,
                Ok(n) => self.loaded += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Reader over the held-over bytes followed by the rest of the source.
///
/// Implements `BufRead` directly on the held-over storage, so wrapped
/// decoders (gzip, lz4) consume exactly what they use; anything they leave
/// behind is still in the [`SrcBuffer`] when they finish.
pub(crate) struct HeldOverReader<'a> {
    hold: &'a mut SrcBuffer,
    src: &'a mut dyn Read,
}

impl<'a> HeldOverReader<'a> {
    pub fn new(hold: &'a mut SrcBuffer, src: &'a mut dyn Read) -> Self {
        HeldOverReader { hold, src }
    }
}

impl Read for HeldOverReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.hold.loaded > 0 {
            let n = out.len().min(self.hold.loaded);
            out[..n].copy_from_slice(&self.hold.buf[..n]);
            self.hold.consume_front(n);
            return Ok(n);
        }
        self.src.read(out)
    }
}

impl BufRead for HeldOverReader<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.hold.loaded == 0 {
            let n = self.src.read(&mut self.hold.buf)?;
            self.hold.loaded = n;
        }
        Ok(&self.hold.buf[..self.hold.loaded])
    }

    fn consume(&mut self, amt: usize) {
        self.hold.consume_front(amt);
    }
}

// ---------------------------------------------------------------------------
// Output sink
// ---------------------------------------------------------------------------

/// Where decoded bytes go.
pub(crate) enum DecodeOut<'a> {
    /// Regular file, hole-punching zero runs when enabled.
    Sparse(SparseWriter<'a>),
    /// Stdout (or any plain writer).
    Plain(&'a mut dyn Write),
    /// Test mode: decode and discard.
    Null,
}

impl DecodeOut<'_> {
    pub fn write_block(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            DecodeOut::Sparse(w) => w.write_block(buf),
            DecodeOut::Plain(w) => w.write_all(buf),
            DecodeOut::Null => Ok(()),
        }
    }

    /// Verbatim write for pass-through prefixes (no hole scanning).
    fn write_verbatim(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            DecodeOut::Sparse(w) => w.write_direct(buf),
            DecodeOut::Plain(w) => w.write_all(buf),
            DecodeOut::Null => Ok(()),
        }
    }

    /// Realizes trailing holes and flushes. Must run after the last block.
    pub fn finish(&mut self) -> io::Result<()> {
        match self {
            DecodeOut::Sparse(w) => w.finish(),
            DecodeOut::Plain(w) => w.flush(),
            DecodeOut::Null => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Everything a decompression batch owns: the streaming context and the
/// held-over input / decoded output buffers.
pub struct DecompressResources {
    pub(crate) dctx: Dctx,
    pub(crate) src_buf: SrcBuffer,
    pub(crate) dst_buf: Vec<u8>,
}

impl DecompressResources {
    pub fn new(prefs: &mut Prefs, display: &Display, dict_path: Option<&str>) -> io::Result<Self> {
        if prefs.patch_from {
            let dict_size = dict_path.and_then(|p| file_size(Path::new(p)));
            // Decode side only needs the reference in the window.
            adjust_mem_limit_for_patch_from(prefs, dict_size, Some(0))?;
        }

        let mut dctx = Dctx::try_create().ok_or_else(|| {
            io::Error::other("allocation error: cannot create decompression context")
        })?;
        if prefs.mem_limit > 0 {
            dctx.set_max_window_size(prefs.mem_limit as usize)
                .map_err(|e| io::Error::other(format!("cannot set memory limit: {}", e)))?;
        }
        dctx.force_ignore_checksum(!prefs.checksum)
            .map_err(|e| io::Error::other(format!("cannot set checksum mode: {}", e)))?;

        let dict = load_dict(dict_path, prefs, display)?;
        dctx.load_dictionary(&dict)
            .map_err(|e| io::Error::other(format!("cannot load dictionary: {}", e)))?;

        Ok(DecompressResources {
            dctx,
            src_buf: SrcBuffer::with_capacity(Dctx::in_size()),
            dst_buf: vec![0u8; Dctx::out_size()],
        })
    }
}

// ---------------------------------------------------------------------------
// zstd frame decoding
// ---------------------------------------------------------------------------

/// Explains a window-too-large failure with the flags that would fix it.
fn zstd_error_help(
    prefs: &Prefs,
    src_buf: &SrcBuffer,
    display: &Display,
    src_name: &str,
    err: &codec::ZstdError,
) {
    if !err.is_window_too_large() {
        return;
    }
    let Some(header) = codec::frame_header(&src_buf.buf[..src_buf.loaded]) else {
        return;
    };
    let window_size = header.window_size;
    let window_log = if window_size.is_power_of_two() {
        window_size.trailing_zeros()
    } else {
        64 - window_size.leading_zeros()
    };
    let limit = if prefs.mem_limit > 0 {
        u64::from(prefs.mem_limit)
    } else {
        1u64 << 27
    };
    display.say(
        1,
        &format!(
            "{} : window size larger than maximum : {} > {} \n",
            src_name, window_size, limit
        ),
    );
    if window_log <= WINDOWLOG_MAX {
        let window_mb = (window_size >> 20) + u64::from(window_size.trailing_zeros() < 20);
        display.say(
            1,
            &format!("{} : use --long={} or --memory={}MB \n", src_name, window_log, window_mb),
        );
    } else {
        display.say(
            1,
            &format!("{} : window log {} is not supported \n", src_name, window_log),
        );
    }
}

/// Decodes one zstd frame from the held-over buffer plus `src` into `out`.
///
/// The context is reset to a fresh session (parameters and dictionary are
/// retained). After each streaming call the consumed prefix is dropped from
/// the held-over buffer and, while the frame is unfinished, the buffer is
/// topped up to the codec's read hint. EOF mid-frame is an error.
fn decompress_zstd_frame(
    ctx: &Context,
    ress: &mut DecompressResources,
    src: &mut dyn Read,
    out: &mut DecodeOut<'_>,
    prefs: &Prefs,
    display: &Display,
    src_name: &str,
    already_decoded: u64,
) -> io::Result<u64> {
    ress.dctx.reset_session();
    ress.src_buf.fill_to(codec::FRAME_HEADER_SIZE_MAX, src)?;

    let mut frame_size = 0u64;
    let progress_level =
        if !ctx.has_stdout_output || display.progress_setting() == ProgressSetting::Always {
            1
        } else {
            2
        };

    loop {
        let (hint, consumed) = {
            let mut input = InBuffer::around(&ress.src_buf.buf[..ress.src_buf.loaded]);
            let mut output = OutBuffer::around(&mut ress.dst_buf);
            let hint = ress
                .dctx
                .decompress_stream(&mut output, &mut input)
                .map_err(|e| {
                    display.say(1, &format!("{} : decoding error : {} \n", src_name, e));
                    zstd_error_help(prefs, &ress.src_buf, display, src_name, &e);
                    io::Error::other(format!("{}: decoding error: {}", src_name, e))
                })?;
            out.write_block(output.as_slice())?;
            frame_size += output.pos as u64;
            (hint, input.pos)
        };
        ress.src_buf.consume_front(consumed);

        display.update(
            progress_level,
            &format!(
                "\r{:<20} : {}...     ",
                src_name,
                human_size(already_decoded + frame_size)
            ),
        );

        if hint == 0 {
            break; // end of frame
        }

        // Top up to the codec's read hint (bounded by the buffer size, which
        // still makes progress on large skippable frames).
        let to_load = hint.min(ress.src_buf.buf.len());
        if ress.src_buf.loaded < to_load {
            let before = ress.src_buf.loaded;
            ress.src_buf.fill_to(to_load, src)?;
            if ress.src_buf.loaded == before {
                display.say(1, &format!("{} : read error : premature end \n", src_name));
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{}: premature end", src_name),
                ));
            }
        }
    }

    Ok(frame_size)
}

// ---------------------------------------------------------------------------
// Pass-through
// ---------------------------------------------------------------------------

/// Copies the source verbatim to the output. Used when decoding to stdout
/// in overwrite mode and the input is not in any recognized format.
fn pass_through(
    ress: &mut DecompressResources,
    src: &mut dyn Read,
    out: &mut DecodeOut<'_>,
) -> io::Result<u64> {
    // The prefix the dispatcher already buffered goes out unmodified.
    out.write_verbatim(&ress.src_buf.buf[..ress.src_buf.loaded])?;
    let mut total = ress.src_buf.loaded as u64;
    ress.src_buf.loaded = 0;

    let block = PASS_THROUGH_BLOCK.min(ress.src_buf.buf.len());
    loop {
        let n = crate::io::compress::read_fill(src, &mut ress.src_buf.buf[..block])?;
        if n == 0 {
            break;
        }
        out.write_block(&ress.src_buf.buf[..n])?;
        total += n as u64;
        if n < block {
            break;
        }
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Frame dispatch
// ---------------------------------------------------------------------------

/// Decodes every frame of `src` into `out`, sniffing the format per frame.
fn decompress_frames(
    ctx: &mut Context,
    ress: &mut DecompressResources,
    src: &mut dyn Read,
    prefs: &Prefs,
    display: &Display,
    out: &mut DecodeOut<'_>,
    dst_name: &str,
    src_name: &str,
) -> io::Result<u64> {
    let mut filesize = 0u64;
    let mut read_something = false;

    loop {
        ress.src_buf.fill_to(4, src)?;
        if ress.src_buf.loaded == 0 {
            if !read_something {
                // An empty input is not a valid compressed stream.
                display.say(1, &format!("zstdr: {}: unexpected end of file \n", src_name));
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{}: unexpected end of file", src_name),
                ));
            }
            break; // clean frame boundary
        }
        read_something = true;
        if ress.src_buf.loaded < 4 {
            display.say(1, &format!("zstdr: {}: unknown header \n", src_name));
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: unknown header", src_name),
            ));
        }

        let head: [u8; 4] = ress.src_buf.buf[..4].try_into().unwrap();
        if codec::is_frame(&ress.src_buf.buf[..ress.src_buf.loaded]) {
            filesize += decompress_zstd_frame(
                ctx, ress, src, out, prefs, display, src_name, filesize,
            )?;
        } else if head[..2] == GZIP_MAGIC {
            filesize += decompress_gzip_frame(
                &mut ress.src_buf,
                &mut ress.dst_buf,
                src,
                out,
                display,
                src_name,
            )?;
        } else if head[..2] == XZ_MAGIC || head[..2] == LZMA_MAGIC {
            let plain_lzma = head[0] != XZ_MAGIC[0];
            filesize += decompress_lzma_frame(
                &mut ress.src_buf,
                &mut ress.dst_buf,
                src,
                out,
                display,
                src_name,
                plain_lzma,
            )?;
        } else if u32::from_le_bytes(head) == LZ4_MAGIC {
            filesize += decompress_lz4_frame(
                &mut ress.src_buf,
                &mut ress.dst_buf,
                src,
                out,
                display,
                src_name,
            )?;
        } else if prefs.overwrite && is_stdout_mark(dst_name) {
            filesize += pass_through(ress, src, out)?;
            break;
        } else {
            display.say(1, &format!("zstdr: {}: unsupported format \n", src_name));
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: unsupported format", src_name),
            ));
        }
    }

    ctx.total_bytes_out += filesize;
    display.clear_line(2);
    if (display.level() >= 2 && ctx.files_total <= 1)
        || display.level() >= 3
        || display.progress_setting() == ProgressSetting::Always
    {
        display.say(1, &format!("\r{:<20}: {} bytes \n", src_name, filesize));
    }

    Ok(filesize)
}

// ---------------------------------------------------------------------------
// Per-file orchestration
// ---------------------------------------------------------------------------

/// Opens the destination (or reuses a shared one), wires the decode sink,
/// runs the dispatcher, and finalizes the artifact.
fn decompress_dst_file(
    ctx: &mut Context,
    prefs: &mut Prefs,
    ress: &mut DecompressResources,
    display: &Display,
    shared_dst: Option<&mut DstFile>,
    src: &mut dyn Read,
    dst_name: &str,
    src_name: &str,
) -> io::Result<()> {
    if prefs.test_mode {
        let mut out = DecodeOut::Null;
        decompress_frames(ctx, ress, src, prefs, display, &mut out, dst_name, src_name)?;
        return Ok(());
    }

    if let Some(dst) = shared_dst {
        let sparse_enabled = prefs.sparse_mode != SparseMode::Disabled;
        let mut out = match dst {
            DstFile::File { file, .. } => {
                DecodeOut::Sparse(SparseWriter::new(file, sparse_enabled))
            }
            DstFile::Stdout(stdout) => DecodeOut::Plain(stdout),
        };
        decompress_frames(ctx, ress, src, prefs, display, &mut out, dst_name, src_name)?;
        out.finish()?;
        return Ok(());
    }

    // Stat snapshot before the destination opens; mtime belongs to the src.
    let mut transfer = None;
    let mut permissions = DEFAULT_FILE_PERMISSIONS;
    if !is_stdin_mark(src_name) {
        if let Ok(md) = fs::metadata(src_name) {
            if md.file_type().is_file() {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::MetadataExt;
                    permissions = md.mode();
                }
                transfer = md.modified().ok().map(|mtime| (mtime, permissions));
            }
        }
    }

    let mut dst = open_dst_file(ctx, prefs, display, Some(src_name), dst_name, permissions)?;
    // Read after the open: stdout destinations degrade auto to disabled.
    let sparse_enabled = prefs.sparse_mode != SparseMode::Disabled;
    let mut guard = ArtifactGuard::register(Path::new(dst_name));

    let result = {
        let mut out = match &mut dst {
            DstFile::File { file, .. } => {
                DecodeOut::Sparse(SparseWriter::new(file, sparse_enabled))
            }
            DstFile::Stdout(stdout) => DecodeOut::Plain(stdout),
        };
        decompress_frames(ctx, ress, src, prefs, display, &mut out, dst_name, src_name)
            .and_then(|n| {
                out.finish()?;
                Ok(n)
            })
    };

    let is_stdout = dst.is_stdout();
    let close_result = dst.flush();
    drop(dst);
    guard.disarm();

    let result = result.map(|_| ()).and(close_result);
    match &result {
        Ok(()) => {
            if let Some((mtime, mode)) = transfer {
                if !is_stdout {
                    let _ = set_file_stat(Path::new(dst_name), mtime, mode);
                }
            }
        }
        Err(_) => {
            if !is_stdout {
                let _ = remove_file(dst_name, display);
            }
        }
    }
    result
}

/// Validates and opens the source, resets the held-over buffer, and hands
/// off to the destination side. Removes the source on success with `--rm`.
fn decompress_src_file(
    ctx: &mut Context,
    prefs: &mut Prefs,
    ress: &mut DecompressResources,
    display: &Display,
    shared_dst: Option<&mut DstFile>,
    dst_name: &str,
    src_name: &str,
) -> io::Result<()> {
    if is_directory(Path::new(src_name)) {
        display.say(1, &format!("zstdr: {} is a directory -- ignored \n", src_name));
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: is a directory", src_name),
        ));
    }

    let mut src = open_src_file(prefs, display, src_name)?;
    // Held-over bytes never cross file boundaries.
    ress.src_buf.loaded = 0;

    let result = decompress_dst_file(
        ctx, prefs, ress, display, shared_dst, &mut src, dst_name, src_name,
    );
    drop(src);

    if result.is_ok() && prefs.remove_src_file && !is_stdin_mark(src_name) {
        remove_file(src_name, display)?;
    }
    result
}

// ---------------------------------------------------------------------------
// Public operations
// ---------------------------------------------------------------------------

/// Decompresses a single file (or stdin) into `dst_name` (or stdout).
pub fn decompress_filename(
    ctx: &mut Context,
    prefs: &mut Prefs,
    display: &Display,
    dst_name: &str,
    src_name: &str,
    dict_path: Option<&str>,
) -> io::Result<()> {
    let mut ress = DecompressResources::new(prefs, display, dict_path)?;
    decompress_src_file(ctx, prefs, &mut ress, display, None, dst_name, src_name)
}

/// Decompresses a batch of files: either one destination per source
/// (suffix-derived, optionally into a flat or mirrored output directory) or
/// everything concatenated into a single `out_file`. Returns the number of
/// files that failed.
#[allow(clippy::too_many_arguments)]
pub fn decompress_multiple_filenames(
    ctx: &mut Context,
    prefs: &mut Prefs,
    display: &Display,
    srcs: &[String],
    out_mirror: Option<&str>,
    out_dir: Option<&str>,
    out_file: Option<&str>,
    dict_path: Option<&str>,
) -> io::Result<usize> {
    let mut ress = DecompressResources::new(prefs, display, dict_path)?;
    let mut missed = 0usize;

    if let Some(out_name) = out_file {
        let mut dst = if prefs.test_mode {
            None
        } else {
            Some(open_dst_file(
                ctx,
                prefs,
                display,
                None,
                out_name,
                DEFAULT_FILE_PERMISSIONS,
            )?)
        };
        let mut guard = ArtifactGuard::register(Path::new(out_name));
        for (idx, src_name) in srcs.iter().enumerate() {
            ctx.current_index = idx;
            match decompress_src_file(
                ctx,
                prefs,
                &mut ress,
                display,
                dst.as_mut(),
                out_name,
                src_name,
            ) {
                Ok(()) => ctx.files_processed += 1,
                Err(e) => {
                    display.say(1, &format!("zstdr: {}: {} \n", src_name, e));
                    missed += 1;
                }
            }
        }
        if let Some(mut dst) = dst {
            dst.flush()?;
        }
        guard.disarm();
    } else {
        if let Some(mirror_root) = out_mirror {
            paths::mirror_source_directories(srcs, mirror_root)?;
        }
        for (idx, src_name) in srcs.iter().enumerate() {
            ctx.current_index = idx;
            let derived = if let Some(mirror_root) = out_mirror {
                paths::mirrored_dest_dir(src_name, mirror_root)
                    .and_then(|dir| paths::derive_decompressed_name(src_name, Some(&dir)))
            } else {
                paths::derive_decompressed_name(src_name, out_dir)
            };
            let Some(dst_name) = derived else {
                display.say(
                    1,
                    &format!(
                        "zstdr: {}: unknown suffix ({} expected) -- ignored \n",
                        src_name,
                        paths::known_suffix_list()
                    ),
                );
                missed += 1;
                continue;
            };
            match decompress_src_file(
                ctx, prefs, &mut ress, display, None, &dst_name, src_name,
            ) {
                Ok(()) => ctx.files_processed += 1,
                Err(e) => {
                    display.say(1, &format!("zstdr: {}: {} \n", src_name, e));
                    missed += 1;
                }
            }
        }
        if out_dir.is_some() {
            paths::check_filename_collisions(srcs, display);
        }
    }

    if ctx.files_processed >= 1 && ctx.files_total > 1 && ctx.total_bytes_out > 0 {
        display.say(
            2,
            &format!(
                "{} files decompressed : {} bytes total \n",
                ctx.files_processed, ctx.total_bytes_out
            ),
        );
    }

    Ok(missed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn src_buffer_consume_front_compacts() {
        let mut b = SrcBuffer::with_capacity(8);
        b.buf[..5].copy_from_slice(b"abcde");
        b.loaded = 5;
        b.consume_front(2);
        assert_eq!(b.loaded, 3);
        assert_eq!(&b.buf[..3], b"cde");
    }

    #[test]
    fn src_buffer_fill_to_stops_at_eof() {
        let mut b = SrcBuffer::with_capacity(16);
        let mut src = Cursor::new(b"abc".to_vec());
        b.fill_to(10, &mut src).unwrap();
        assert_eq!(b.loaded, 3);
    }

    #[test]
    fn held_over_reader_drains_hold_first() {
        let mut b = SrcBuffer::with_capacity(8);
        b.buf[..3].copy_from_slice(b"abc");
        b.loaded = 3;
        let mut src = Cursor::new(b"defgh".to_vec());
        let mut reader = HeldOverReader::new(&mut b, &mut src);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcdefgh");
    }

    #[test]
    fn held_over_reader_leaves_unconsumed_tail() {
        let mut b = SrcBuffer::with_capacity(8);
        b.buf[..6].copy_from_slice(b"abcdef");
        b.loaded = 6;
        let mut src = Cursor::new(Vec::new());
        {
            let mut reader = HeldOverReader::new(&mut b, &mut src);
            let chunk = reader.fill_buf().unwrap();
            assert_eq!(chunk, b"abcdef");
            reader.consume(2);
        }
        assert_eq!(b.loaded, 4);
        assert_eq!(&b.buf[..4], b"cdef");
    }
}
