//! Streaming compression: resources, the zstd frame loop with adaptive
//! level control, patch-from parameter adjustment, and the per-file /
//! multi-file orchestration for the compress direction.
//!
//! Resources (contexts and buffers) are allocated once per batch and reused
//! by every file. The zstd loop reads codec-recommended chunks, feeds them
//! through the streaming context, and writes whatever the codec produces;
//! when adaptive mode is on, the codec's progression counters are sampled on
//! the progress clock and the compression level is nudged up when output or
//! compression lags, down when input starves the workers.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Instant;

use crate::codec::{
    self, CParam, Cctx, CompressionParams, Directive, FrameProgression, InBuffer, OutBuffer,
};
use crate::config::{ADAPT_WINDOWLOG_DEFAULT, GB, WINDOWLOG_MAX, WINDOWLOG_MIN};
use crate::io::compress_other::{compress_gzip_frame, compress_lz4_frame, compress_lzma_frame};
use crate::io::dict::load_dict;
use crate::io::display::{human_size, Display, ProgressSetting};
use crate::io::file_io::{
    is_stdin_mark, is_stdout_mark, open_dst_file, open_src_file, remove_file, DstFile,
    DEFAULT_FILE_PERMISSIONS,
};
use crate::io::guard::ArtifactGuard;
use crate::io::paths;
use crate::io::prefs::{CompressionFormat, Context, Prefs};
use crate::util::{file_size, is_directory, is_same_file, largest_file_size, set_file_stat};

// `clock()` is a macro on some libcs, so the `libc` crate does not expose it
// as a function everywhere; bind it directly.
extern "C" {
    fn clock() -> libc::clock_t;
}

/// POSIX fixes CLOCKS_PER_SEC at one million.
const CLOCKS_PER_SEC: f64 = 1_000_000.0;

// ---------------------------------------------------------------------------
// Small helpers
// ---------------------------------------------------------------------------

fn codec_error(src_name: &str, what: &str, err: codec::ZstdError) -> io::Error {
    io::Error::other(format!("{}: {}: {}", src_name, what, err))
}

/// Position of the highest set bit. `v` must be nonzero.
fn highbit(v: u64) -> u32 {
    debug_assert!(v > 0);
    63 - v.leading_zeros()
}

/// Effective search-cycle log of a match finder: binary-tree strategies
/// spend one chain-log bit per position.
fn cycle_log(chain_log: u32, strategy: u32) -> u32 {
    let bt_scale = u32::from(strategy >= codec::STRATEGY_BTLAZY2);
    chain_log - bt_scale
}

/// Fills `buf` from `reader`, retrying on interruption, stopping at EOF.
pub(crate) fn read_fill(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Patch-from parameter adjustment
// ---------------------------------------------------------------------------

/// Raises the memory limit so the reference file fits in the decode window.
/// Fails when no size is known (stdin without `--stream-size`) or the
/// required window exceeds what the format can express.
pub(crate) fn adjust_mem_limit_for_patch_from(
    prefs: &mut Prefs,
    dict_size: Option<u64>,
    max_src_size: Option<u64>,
) -> io::Result<()> {
    let (Some(dict_size), Some(max_src_size)) = (dict_size, max_src_size) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "using --patch-from with stdin requires --stream-size",
        ));
    };
    let max_window = 1u64 << WINDOWLOG_MAX;
    let max_size = u64::from(prefs.mem_limit).max(dict_size).max(max_src_size);
    if max_size > max_window {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot handle files larger than {} GB", max_window / GB as u64),
        ));
    }
    prefs.mem_limit = max_size as u32;
    Ok(())
}

/// Patch-from mode: size the window to cover the whole source, and switch on
/// long-distance matching when the reference lies beyond the reach of the
/// level's ordinary match finder.
fn adjust_params_for_patch_from(
    prefs: &mut Prefs,
    params: &mut CompressionParams,
    dict_size: Option<u64>,
    max_src_size: Option<u64>,
    level: i32,
    display: &Display,
) -> io::Result<()> {
    adjust_mem_limit_for_patch_from(prefs, dict_size, max_src_size)?;
    let max_src = max_src_size.unwrap_or(1).max(1);
    let file_window_log = highbit(max_src) + 1;
    let table = codec::cparams(level, max_src_size, dict_size.unwrap_or(0) as usize);

    if file_window_log > WINDOWLOG_MAX {
        display.say(1, "max window log exceeded by file (compression ratio will suffer) \n");
    }
    params.window_log = file_window_log.clamp(WINDOWLOG_MIN, WINDOWLOG_MAX);

    if file_window_log > cycle_log(table.chain_log, table.strategy) {
        if !prefs.ldm {
            display.say(1, "long mode automatically triggered \n");
        }
        prefs.ldm = true;
    }
    if table.strategy >= codec::STRATEGY_BTOPT {
        display.say(
            1,
            "note: single-thread mode and a larger targetLength can improve patch size \n",
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Everything a compression batch owns: the streaming context, staging
/// buffers of the codec's recommended sizes, and the loaded dictionary.
pub struct CompressResources {
    pub cctx: Cctx,
    pub src_buf: Vec<u8>,
    pub dst_buf: Vec<u8>,
    dict: Vec<u8>,
    dict_path: Option<String>,
}

impl CompressResources {
    /// Allocates resources and configures the context from `prefs`.
    ///
    /// `max_src_size` is the largest source the batch will see (`None` when
    /// unknown); patch-from uses it to size the window, and the parameter
    /// table consults it for the source-size estimate.
    pub fn new(
        prefs: &mut Prefs,
        display: &Display,
        dict_path: Option<&str>,
        max_src_size: Option<u64>,
        level: i32,
        mut params: CompressionParams,
    ) -> io::Result<Self> {
        let mut cctx = Cctx::try_create().ok_or_else(|| {
            io::Error::other("allocation error: cannot create compression context")
        })?;

        // The memory limit must be settled before the dictionary loads,
        // because patch-from sizes the dictionary cap from it.
        if prefs.patch_from {
            let declared = (prefs.stream_src_size > 0).then_some(prefs.stream_src_size);
            let dict_size = dict_path.and_then(|p| file_size(Path::new(p)));
            adjust_params_for_patch_from(
                prefs,
                &mut params,
                dict_size,
                declared.or(max_src_size),
                level,
                display,
            )?;
        }

        let dict = load_dict(dict_path, prefs, display)?;

        // With adaptive mode the window must not follow the changing level,
        // or mid-stream level changes would alter decode-side memory.
        if prefs.adaptive && !prefs.ldm && params.window_log == 0 {
            params.window_log = ADAPT_WINDOWLOG_DEFAULT;
        }

        let set = |cctx: &mut Cctx, p: CParam| -> io::Result<()> {
            cctx.set_parameter(p)
                .map_err(|e| codec_error("zstdr", "parameter setup failed", e))
        };

        set(&mut cctx, CParam::ContentSizeFlag(prefs.content_size))?;
        set(&mut cctx, CParam::DictIdFlag(prefs.dict_id))?;
        set(&mut cctx, CParam::ChecksumFlag(prefs.checksum))?;
        set(&mut cctx, CParam::CompressionLevel(level))?;
        set(&mut cctx, CParam::TargetCBlockSize(prefs.target_cblock_size))?;
        set(&mut cctx, CParam::SrcSizeHint(prefs.src_size_hint))?;
        set(&mut cctx, CParam::EnableLongDistanceMatching(prefs.ldm))?;
        if let Some(v) = prefs.ldm_hash_log {
            set(&mut cctx, CParam::LdmHashLog(v))?;
        }
        if let Some(v) = prefs.ldm_min_match {
            set(&mut cctx, CParam::LdmMinMatch(v))?;
        }
        if let Some(v) = prefs.ldm_bucket_size_log {
            set(&mut cctx, CParam::LdmBucketSizeLog(v))?;
        }
        if let Some(v) = prefs.ldm_hash_rate_log {
            set(&mut cctx, CParam::LdmHashRateLog(v))?;
        }
        set(&mut cctx, CParam::UseRowMatchFinder(prefs.use_row_match_finder))?;
        set(&mut cctx, CParam::WindowLog(params.window_log))?;
        set(&mut cctx, CParam::ChainLog(params.chain_log))?;
        set(&mut cctx, CParam::HashLog(params.hash_log))?;
        set(&mut cctx, CParam::SearchLog(params.search_log))?;
        set(&mut cctx, CParam::MinMatch(params.min_match))?;
        set(&mut cctx, CParam::TargetLength(params.target_length))?;
        set(&mut cctx, CParam::Strategy(params.strategy))?;
        set(
            &mut cctx,
            CParam::LiteralCompressionMode(prefs.literal_compression_mode),
        )?;
        set(&mut cctx, CParam::EnableDedicatedDictSearch(true))?;
        display.say(5, &format!("set nb workers = {} \n", prefs.workers));
        set(&mut cctx, CParam::NbWorkers(prefs.workers))?;
        set(&mut cctx, CParam::JobSize(prefs.block_size))?;
        if let Some(v) = prefs.overlap_log {
            display.say(3, &format!("set overlapLog = {} \n", v));
            set(&mut cctx, CParam::OverlapLog(v))?;
        }
        set(&mut cctx, CParam::Rsyncable(prefs.rsyncable))?;

        if prefs.patch_from {
            // SAFETY: `dict` is owned by the resources bundle and outlives
            // the context; the buffer is never reallocated after this point.
            unsafe { cctx.ref_prefix(&dict) }
                .map_err(|e| codec_error("zstdr", "cannot reference prefix", e))?;
        } else {
            cctx.load_dictionary(&dict)
                .map_err(|e| codec_error("zstdr", "cannot load dictionary", e))?;
        }

        Ok(CompressResources {
            cctx,
            src_buf: vec![0u8; Cctx::in_size()],
            dst_buf: vec![0u8; Cctx::out_size()],
            dict,
            dict_path: dict_path.map(str::to_owned),
        })
    }

    pub fn dict_path(&self) -> Option<&str> {
        self.dict_path.as_deref()
    }

    pub fn dict_len(&self) -> usize {
        self.dict.len()
    }
}

// ---------------------------------------------------------------------------
// Adaptive level control
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpeedChange {
    NoChange,
    Slower,
    Faster,
}

/// Feedback state for live level adjustment.
///
/// Two snapshots of the progression counters are kept: `prev_update`
/// detects immediate back-pressure between consecutive ticks, while
/// `prev_correction` measures longer per-job trends. The per-tick counters
/// (`input_presented`, `input_blocked`, `flush_waiting`) are fed by the
/// streaming loop itself.
pub(crate) struct AdaptState {
    pub level: i32,
    last_job_id: u32,
    prev_update: FrameProgression,
    prev_correction: FrameProgression,
    pub flush_waiting: bool,
    pub input_presented: u64,
    pub input_blocked: u64,
}

impl AdaptState {
    fn new(level: i32) -> Self {
        AdaptState {
            level,
            last_job_id: 0,
            prev_update: FrameProgression::default(),
            prev_correction: FrameProgression::default(),
            flush_waiting: false,
            input_presented: 0,
            input_blocked: 0,
        }
    }

    /// One adaptation tick: classify the pipeline state, then move the level
    /// by one step when a fresh job completed.
    fn tick(&mut self, zfp: FrameProgression, prefs: &Prefs, cctx: &mut Cctx, display: &Display) {
        let mut change = SpeedChange::NoChange;

        // Output-side check: meaningful once the job pipeline is rolling.
        if zfp.current_job_id > 1 {
            let newly_produced = zfp.produced - self.prev_update.produced;
            let newly_flushed = zfp.flushed - self.prev_update.flushed;

            // No byte was compressed and no worker is running: every buffer
            // is full, compression itself is the bottleneck.
            if zfp.consumed == self.prev_update.consumed && zfp.nb_active_workers == 0 {
                display.say(6, "all buffers full : compression stopped => slow down \n");
                change = SpeedChange::Slower;
            }
            self.prev_update = zfp;

            // Production outruns flushing while the flusher never starved:
            // the output side cannot keep up.
            if newly_produced > newly_flushed * 9 / 8 && !self.flush_waiting {
                display.say(6, "compression faster than flush => slow down \n");
                change = SpeedChange::Slower;
            }
            self.flush_waiting = false;
        }

        // Course-correct only when at least one new job completed.
        if zfp.current_job_id > self.last_job_id {
            // Past the warm-up period that fills all workers.
            if zfp.current_job_id > prefs.workers + 1 {
                if self.input_blocked == 0 {
                    display.say(6, "input is never blocked => input is the bottleneck \n");
                    change = SpeedChange::Slower;
                } else if change == SpeedChange::NoChange {
                    let newly_ingested = zfp.ingested - self.prev_correction.ingested;
                    let newly_consumed = zfp.consumed - self.prev_correction.consumed;
                    let newly_produced = zfp.produced - self.prev_correction.produced;
                    let newly_flushed = zfp.flushed - self.prev_correction.flushed;
                    self.prev_correction = zfp;

                    // Input waits often while both ends keep pace with the
                    // middle: a cheaper level may raise total throughput.
                    if self.input_blocked > self.input_presented / 8
                        && newly_flushed * 33 / 32 > newly_produced
                        && newly_ingested * 33 / 32 > newly_consumed
                    {
                        display.say(6, "balanced pipeline => speed up \n");
                        change = SpeedChange::Faster;
                    }
                }
                self.input_blocked = 0;
                self.input_presented = 0;
            }

            match change {
                SpeedChange::Slower => {
                    self.level += 1;
                    self.level = self.level.min(codec::max_c_level()).min(prefs.adapt_max);
                    if self.level == 0 {
                        self.level = 1; // level 0 means "default", skip it
                    }
                    let _ = cctx.set_parameter(CParam::CompressionLevel(self.level));
                }
                SpeedChange::Faster => {
                    self.level -= 1;
                    self.level = self.level.max(prefs.adapt_min);
                    if self.level == 0 {
                        self.level = -1;
                    }
                    let _ = cctx.set_parameter(CParam::CompressionLevel(self.level));
                }
                SpeedChange::NoChange => {}
            }
            self.last_job_id = zfp.current_job_id;
        }
    }
}

// ---------------------------------------------------------------------------
// zstd streaming loop
// ---------------------------------------------------------------------------

/// Compresses one source stream into `dst` as a single zstd frame.
///
/// `file_size` is the stat'ed size when known; it (or the declared
/// `--stream-size`) becomes the pledged size recorded in the frame header.
/// Returns the compressed byte count and accumulates the consumed input
/// into `readsize`.
pub fn compress_zstd_frame(
    ctx: &Context,
    prefs: &Prefs,
    ress: &mut CompressResources,
    display: &Display,
    src: &mut dyn Read,
    dst: &mut DstFile,
    src_name: &str,
    file_size: Option<u64>,
    level: i32,
    readsize: &mut u64,
) -> io::Result<u64> {
    display.say(6, "compression using zstd format \n");

    let pledged = file_size.or((prefs.stream_src_size > 0).then_some(prefs.stream_src_size));
    ress.cctx
        .set_pledged_src_size(pledged)
        .map_err(|e| codec_error(src_name, "cannot set pledged size", e))?;

    if display.level() >= 4 {
        let table = codec::cparams(level, file_size, ress.dict_len());
        let window = 1u64 << table.window_log;
        let need = pledged.map_or(window, |p| window.min(p.max(1)));
        display.say(
            4,
            &format!("decompression will require {} of memory \n", human_size(need)),
        );
    }

    let mut compressed_size = 0u64;
    let mut directive = Directive::Continue;
    let mut adapt = AdaptState::new(level);

    loop {
        let in_size = read_fill(src, &mut ress.src_buf)?;
        display.say(6, &format!("read {} bytes from source \n", in_size));
        *readsize += in_size as u64;
        if in_size == 0 || Some(*readsize) == file_size {
            directive = Directive::End;
        }

        let mut input = InBuffer::around(&ress.src_buf[..in_size]);
        let mut still_to_flush = 1usize;
        while input.pos != input.src.len()
            || (directive == Directive::End && still_to_flush != 0)
        {
            let old_in_pos = input.pos;
            let to_flush_now = ress.cctx.to_flush_now();
            let mut output = OutBuffer::around(&mut ress.dst_buf);
            still_to_flush = ress
                .cctx
                .compress_stream2(&mut output, &mut input, directive)
                .map_err(|e| codec_error(src_name, "compression error", e))?;

            adapt.input_presented += 1;
            if old_in_pos == input.pos {
                // Input buffer is full and could not take any more: input
                // arrives faster than the pipeline consumes it.
                adapt.input_blocked += 1;
            }
            if to_flush_now == 0 {
                adapt.flush_waiting = true;
            }

            if output.pos > 0 {
                dst.write_all(output.as_slice()).map_err(|e| {
                    io::Error::new(
                        e.kind(),
                        format!("write error: cannot write compressed block: {}", e),
                    )
                })?;
                compressed_size += output.pos as u64;
            }

            if display.ready_for_update() {
                display.delay_next_update();
                let zfp = ress.cctx.frame_progression();
                let c_share =
                    zfp.produced as f64 / (zfp.consumed.max(1)) as f64 * 100.0;
                if display.level() >= 3 {
                    display.say(
                        3,
                        &format!(
                            "\r(L{}) Buffered:{:>10} - Consumed:{:>10} - Compressed:{:>10} => {:.2}% ",
                            adapt.level,
                            human_size(zfp.ingested - zfp.consumed),
                            human_size(zfp.consumed),
                            human_size(zfp.produced),
                            c_share,
                        ),
                    );
                } else if display.level() >= 2
                    || display.progress_setting() == ProgressSetting::Always
                {
                    display.clear_line(1);
                    if ctx.files_total > 1 {
                        display.say(
                            1,
                            &format!(
                                "Compress: {}/{} files. Current: {} ",
                                ctx.current_index + 1,
                                ctx.files_total,
                                src_name,
                            ),
                        );
                    }
                    match file_size {
                        Some(total) => display.say(
                            1,
                            &format!(
                                "Read:{:>10} /{:>10} ==> {:.0}%",
                                human_size(zfp.consumed),
                                human_size(total),
                                c_share,
                            ),
                        ),
                        None => display.say(
                            1,
                            &format!("Read:{:>10} ==> {:.0}%", human_size(zfp.consumed), c_share),
                        ),
                    }
                }

                if prefs.adaptive {
                    adapt.tick(zfp, prefs, &mut ress.cctx, display);
                }
            }
        }

        if directive == Directive::End {
            break;
        }
    }

    if let Some(expected) = file_size {
        if *readsize != expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read error: incomplete read: {} / {} bytes",
                    readsize, expected
                ),
            ));
        }
    }

    Ok(compressed_size)
}

// ---------------------------------------------------------------------------
// Per-file orchestration
// ---------------------------------------------------------------------------

/// Runs the format-selected engine over already-open handles, then prints
/// the per-file status line and accumulates batch totals.
fn compress_filename_internal(
    ctx: &mut Context,
    prefs: &Prefs,
    ress: &mut CompressResources,
    display: &Display,
    src: &mut dyn Read,
    dst: &mut DstFile,
    dst_name: &str,
    src_name: &str,
    level: i32,
) -> io::Result<()> {
    let time_start = Instant::now();
    let cpu_start = unsafe { clock() };
    let size = if is_stdin_mark(src_name) {
        None
    } else {
        file_size(Path::new(src_name))
    };
    match size {
        Some(n) => display.say(5, &format!("{}: {} bytes \n", src_name, n)),
        None => display.say(5, &format!("{}: unknown size \n", src_name)),
    }

    let mut readsize = 0u64;
    let compressed = match prefs.format {
        CompressionFormat::Zstd => compress_zstd_frame(
            ctx, prefs, ress, display, src, dst, src_name, size, level, &mut readsize,
        )?,
        CompressionFormat::Gzip => {
            compress_gzip_frame(ress, display, src, dst, src_name, size, level, &mut readsize)?
        }
        CompressionFormat::Xz => compress_lzma_frame(
            ress, display, src, dst, src_name, size, level, false, &mut readsize,
        )?,
        CompressionFormat::Lzma => compress_lzma_frame(
            ress, display, src, dst, src_name, size, level, true, &mut readsize,
        )?,
        CompressionFormat::Lz4 => compress_lz4_frame(
            ress,
            display,
            src,
            dst,
            src_name,
            size,
            level,
            prefs.checksum,
            &mut readsize,
        )?,
    };

    ctx.total_bytes_in += readsize;
    ctx.total_bytes_out += compressed;
    display.clear_line(2);
    if display.level() >= 2
        && !ctx.has_stdout_output
        && (display.level() >= 3 || ctx.files_total <= 1)
    {
        let ratio = compressed as f64 / readsize.max(1) as f64 * 100.0;
        display.say(
            2,
            &format!(
                "{:<20} :{:6.2}%   ({} => {}, {}) \n",
                src_name,
                ratio,
                human_size(readsize),
                human_size(compressed),
                dst_name,
            ),
        );
    }

    let elapsed = time_start.elapsed().as_secs_f64().max(1e-9);
    let cpu_load = (unsafe { clock() } - cpu_start) as f64 / CLOCKS_PER_SEC;
    display.say(
        4,
        &format!(
            "{:<20} : completed in {:.2} sec  (cpu load : {:.0}%) \n",
            src_name,
            elapsed,
            cpu_load / elapsed * 100.0,
        ),
    );
    Ok(())
}

/// Opens the destination (unless a shared one is supplied), guards it
/// against interrupts while the engine runs, and finalizes: close, transfer
/// mtime/permissions from the source, and remove the artifact on failure.
fn compress_filename_dst_file(
    ctx: &mut Context,
    prefs: &mut Prefs,
    ress: &mut CompressResources,
    display: &Display,
    shared_dst: Option<&mut DstFile>,
    dst_name: &str,
    src_name: &str,
    level: i32,
    src: &mut dyn Read,
) -> io::Result<()> {
    if let Some(dst) = shared_dst {
        // Batch concatenation into one output: lifecycle is the batch's.
        return compress_filename_internal(
            ctx, prefs, ress, display, src, dst, dst_name, src_name, level,
        );
    }

    // Stat snapshot taken before the destination opens; the mtime belongs
    // to the source regardless of how long the open takes.
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

    display.say(6, &format!("opening destination: {} \n", dst_name));
    let mut dst = open_dst_file(ctx, prefs, display, Some(src_name), dst_name, permissions)?;
    // Registered only after the open succeeded: otherwise an interrupt
    // during the overwrite prompt could delete a pre-existing file.
    let mut guard = ArtifactGuard::register(Path::new(dst_name));

    let result = compress_filename_internal(
        ctx, prefs, ress, display, src, &mut dst, dst_name, src_name, level,
    );

    let is_stdout = dst.is_stdout();
    let close_result = dst.flush();
    drop(dst);
    guard.disarm();

    let result = result.and(close_result);
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

/// Validates and opens the source, then hands off to the destination side.
/// Removes the source afterwards when `--rm` is set and everything worked.
fn compress_filename_src_file(
    ctx: &mut Context,
    prefs: &mut Prefs,
    ress: &mut CompressResources,
    display: &Display,
    shared_dst: Option<&mut DstFile>,
    dst_name: &str,
    src_name: &str,
    level: i32,
) -> io::Result<()> {
    display.say(6, &format!("compressing source: {} \n", src_name));

    if is_directory(Path::new(src_name)) {
        display.say(1, &format!("zstdr: {} is a directory -- ignored \n", src_name));
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: is a directory", src_name),
        ));
    }

    if let Some(dict) = ress.dict_path() {
        if is_same_file(Path::new(src_name), Path::new(dict)) {
            display.say(
                1,
                &format!("zstdr: cannot use {} as an input file and dictionary \n", src_name),
            );
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}: is the dictionary", src_name),
            ));
        }
    }

    // `--exclude-compressed`: skip sources that already look compressed.
    // Counts as success, not as an error.
    if prefs.exclude_compressed && paths::has_compressed_extension(src_name) {
        display.say(4, &format!("file is already compressed: {} \n", src_name));
        return Ok(());
    }

    let mut src = open_src_file(prefs, display, src_name)?;
    let result = compress_filename_dst_file(
        ctx, prefs, ress, display, shared_dst, dst_name, src_name, level, &mut src,
    );
    drop(src);

    if result.is_ok() && prefs.remove_src_file && !is_stdin_mark(src_name) {
        // The artifact guard is already cleared; removing the source now
        // can never race with interrupt cleanup of the destination.
        remove_file(src_name, display)?;
    }
    result
}

// ---------------------------------------------------------------------------
// Public operations
// ---------------------------------------------------------------------------

/// Compresses a single file (or stdin) into `dst_name` (or stdout).
pub fn compress_filename(
    ctx: &mut Context,
    prefs: &mut Prefs,
    display: &Display,
    dst_name: &str,
    src_name: &str,
    dict_path: Option<&str>,
    level: i32,
    params: CompressionParams,
) -> io::Result<()> {
    let max_src = if is_stdin_mark(src_name) {
        None
    } else {
        file_size(Path::new(src_name))
    };
    let mut ress = CompressResources::new(prefs, display, dict_path, max_src, level, params)?;
    compress_filename_src_file(ctx, prefs, &mut ress, display, None, dst_name, src_name, level)
}

/// Warns (or aborts) when several inputs are about to be concatenated into
/// one output. Returns `true` when the batch must not proceed.
fn remove_multi_files_warning(
    ctx: &Context,
    prefs: &Prefs,
    display: &Display,
    out_name: &str,
) -> bool {
    if ctx.files_total <= 1 || prefs.overwrite {
        return false;
    }
    if display.level() <= 1 {
        if prefs.remove_src_file {
            display.say(
                1,
                &format!("zstdr: aborting; not deleting files and processing into: {} \n", out_name),
            );
            return true;
        }
        return false;
    }
    if is_stdout_mark(out_name) {
        display.say(
            2,
            "zstdr: WARNING: all input files will be processed and concatenated into stdout. \n",
        );
    } else {
        display.say(
            2,
            &format!(
                "zstdr: WARNING: all input files will be processed and concatenated into a single output file: {} \n",
                out_name
            ),
        );
    }
    display.say(2, "The concatenated output CANNOT regenerate the original directory tree. \n");
    if prefs.remove_src_file {
        if ctx.has_stdout_output {
            display.say(
                1,
                "Aborting. Use -f if you really want to delete the files and output to stdout \n",
            );
            return true;
        }
        return !crate::io::file_io::require_user_confirmation(
            "This is a destructive operation. Proceed? (y/n): ",
            "Aborting...",
            ctx.has_stdin_input,
        );
    }
    false
}

/// Compresses a batch of files: either one destination per source (suffix
/// or output-directory derived) or all sources concatenated into a single
/// `out_file`. Returns the number of files that failed.
#[allow(clippy::too_many_arguments)]
pub fn compress_multiple_filenames(
    ctx: &mut Context,
    prefs: &mut Prefs,
    display: &Display,
    srcs: &[String],
    out_mirror: Option<&str>,
    out_dir: Option<&str>,
    out_file: Option<&str>,
    suffix: &str,
    dict_path: Option<&str>,
    level: i32,
    params: CompressionParams,
) -> io::Result<usize> {
    let mut ress = CompressResources::new(
        prefs,
        display,
        dict_path,
        largest_file_size(srcs),
        level,
        params,
    )?;
    let mut missed = 0usize;

    if let Some(out_name) = out_file {
        // Single destination: every source is appended as its own frame.
        if remove_multi_files_warning(ctx, prefs, display, out_name) {
            return Ok(srcs.len());
        }
        let mut dst =
            open_dst_file(ctx, prefs, display, None, out_name, DEFAULT_FILE_PERMISSIONS)?;
        let mut guard = ArtifactGuard::register(Path::new(out_name));
        for (idx, src_name) in srcs.iter().enumerate() {
            ctx.current_index = idx;
            match compress_filename_src_file(
                ctx,
                prefs,
                &mut ress,
                display,
                Some(&mut dst),
                out_name,
                src_name,
                level,
            ) {
                Ok(()) => ctx.files_processed += 1,
                Err(e) => {
                    display.say(1, &format!("zstdr: {}: {} \n", src_name, e));
                    missed += 1;
                }
            }
        }
        dst.flush()?;
        drop(dst);
        guard.disarm();
    } else {
        if let Some(mirror_root) = out_mirror {
            paths::mirror_source_directories(srcs, mirror_root)?;
        }
        for (idx, src_name) in srcs.iter().enumerate() {
            ctx.current_index = idx;
            let dst_name = if let Some(mirror_root) = out_mirror {
                match paths::mirrored_dest_dir(src_name, mirror_root) {
                    Some(dir) => paths::derive_compressed_name(src_name, Some(&dir), suffix),
                    None => {
                        display.say(
                            2,
                            &format!(
                                "zstdr: --output-dir-mirror cannot compress '{}' into '{}' \n",
                                src_name, mirror_root
                            ),
                        );
                        missed += 1;
                        continue;
                    }
                }
            } else {
                paths::derive_compressed_name(src_name, out_dir, suffix)
            };
            match compress_filename_src_file(
                ctx, prefs, &mut ress, display, None, &dst_name, src_name, level,
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

    if ctx.files_processed >= 1 && ctx.files_total > 1 && ctx.total_bytes_in > 0 {
        display.clear_line(2);
        display.say(
            2,
            &format!(
                "{} files compressed : {:.2}%   ({} => {}) \n",
                ctx.files_processed,
                ctx.total_bytes_out as f64 / ctx.total_bytes_in as f64 * 100.0,
                human_size(ctx.total_bytes_in),
                human_size(ctx.total_bytes_out),
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
    use crate::io::display::Display;

    fn quiet() -> Display {
        Display::new(0)
    }

    #[test]
    fn highbit_positions() {
        assert_eq!(highbit(1), 0);
        assert_eq!(highbit(2), 1);
        assert_eq!(highbit(3), 1);
        assert_eq!(highbit(1 << 20), 20);
        assert_eq!(highbit((1 << 20) + 1), 20);
    }

    #[test]
    fn cycle_log_scales_binary_tree_strategies() {
        assert_eq!(cycle_log(17, codec::STRATEGY_BTLAZY2), 16);
        assert_eq!(cycle_log(17, codec::STRATEGY_BTLAZY2 - 1), 17);
    }

    #[test]
    fn resources_allocate_with_defaults() {
        let mut prefs = Prefs::default();
        let ress =
            CompressResources::new(&mut prefs, &quiet(), None, Some(1 << 16), 3, Default::default())
                .unwrap();
        assert_eq!(ress.src_buf.len(), Cctx::in_size());
        assert_eq!(ress.dst_buf.len(), Cctx::out_size());
        assert_eq!(ress.dict_len(), 0);
    }

    #[test]
    fn patch_from_without_any_size_fails() {
        let mut prefs = Prefs::default();
        prefs.patch_from = true;
        let err = CompressResources::new(&mut prefs, &quiet(), None, None, 3, Default::default());
        assert!(err.is_err());
    }

    #[test]
    fn patch_from_raises_mem_limit() {
        let mut prefs = Prefs::default();
        prefs.mem_limit = 0;
        adjust_mem_limit_for_patch_from(&mut prefs, Some(1 << 20), Some(1 << 21)).unwrap();
        assert_eq!(prefs.mem_limit, 1 << 21);
    }

    #[test]
    fn patch_from_rejects_oversized_sources() {
        let mut prefs = Prefs::default();
        let too_big = (1u64 << WINDOWLOG_MAX) + 1;
        assert!(adjust_mem_limit_for_patch_from(&mut prefs, Some(too_big), Some(0)).is_err());
    }

    #[test]
    fn adapt_slower_when_buffers_full() {
        let prefs = {
            let mut p = Prefs::default();
            p.set_workers(2);
            p.adaptive = true;
            p
        };
        let mut cctx = Cctx::try_create().unwrap();
        let mut adapt = AdaptState::new(3);
        adapt.input_blocked = 1; // avoid the input-starved branch
        adapt.input_presented = 4;

        // Same consumed count as the previous tick, no active workers,
        // and a completed job: classified as "slower".
        adapt.prev_update.consumed = 500;
        let zfp = FrameProgression {
            ingested: 1000,
            consumed: 500,
            produced: 400,
            flushed: 400,
            current_job_id: 5,
            nb_active_workers: 0,
        };
        adapt.tick(zfp, &prefs, &mut cctx, &quiet());
        assert_eq!(adapt.level, 4);
    }

    #[test]
    fn adapt_faster_when_pipeline_balanced() {
        let prefs = {
            let mut p = Prefs::default();
            p.set_workers(2);
            p.adaptive = true;
            p
        };
        let mut cctx = Cctx::try_create().unwrap();
        let mut adapt = AdaptState::new(5);
        adapt.input_blocked = 10;
        adapt.input_presented = 16;
        adapt.flush_waiting = true; // suppress the produced-vs-flushed rule
        adapt.prev_update.consumed = 400;

        let zfp = FrameProgression {
            ingested: 4000,
            consumed: 3900,
            produced: 2000,
            flushed: 2000,
            current_job_id: 6,
            nb_active_workers: 2,
        };
        adapt.tick(zfp, &prefs, &mut cctx, &quiet());
        assert_eq!(adapt.level, 4);
    }

    #[test]
    fn adapt_level_clamps_and_skips_zero() {
        let prefs = {
            let mut p = Prefs::default();
            p.set_workers(2);
            p.adaptive = true;
            p.set_adapt_min(-5);
            p
        };
        let mut cctx = Cctx::try_create().unwrap();
        let mut adapt = AdaptState::new(1);
        adapt.input_blocked = 10;
        adapt.input_presented = 16;
        adapt.flush_waiting = true;
        adapt.prev_update.consumed = 1;

        let zfp = FrameProgression {
            ingested: 4000,
            consumed: 3900,
            produced: 2000,
            flushed: 2000,
            current_job_id: 6,
            nb_active_workers: 2,
        };
        adapt.tick(zfp, &prefs, &mut cctx, &quiet());
        // 1 - 1 would land on the reserved level 0; it must skip to -1.
        assert_eq!(adapt.level, -1);
    }
}
