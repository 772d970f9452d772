//! Thin RAII binding over the zstd streaming API.
//!
//! The engine drives zstd through two owned contexts, [`Cctx`] and [`Dctx`],
//! plus a handful of free functions (level bounds, frame probing, parameter
//! tables).  Everything the engine needs from the library goes through this
//! module: typed parameter setters, the pledged source size, dictionary
//! loading vs prefix referencing, the streaming compress/decompress calls
//! with their end directives, the flush query, and the per-job progression
//! counters that feed adaptive level control.
//!
//! Buffers are exchanged through [`InBuffer`]/[`OutBuffer`] pairs that track
//! a read/write position across calls, mirroring the library's own
//! `ZSTD_inBuffer`/`ZSTD_outBuffer` protocol.

use std::ffi::CStr;
use std::fmt;
use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;

use zstd_sys::{
    ZSTD_EndDirective, ZSTD_ResetDirective, ZSTD_cParameter, ZSTD_FrameHeader,
    ZSTD_frameProgression, ZSTD_inBuffer, ZSTD_outBuffer, ZSTD_strategy,
};

// ---------------------------------------------------------------------------
// Constants the header exposes only as function-like macros
// ---------------------------------------------------------------------------

/// Largest possible zstd frame header, in bytes. Loading this many bytes
/// guarantees a frame-header probe can succeed.
pub const FRAME_HEADER_SIZE_MAX: usize = 18;

/// Sentinel passed to the library when the content size is not known.
const CONTENTSIZE_UNKNOWN: u64 = u64::MAX;

/// Strategy ordinal of the first binary-tree match finder. Strategies at or
/// above this point use one less chain-log bit per search cycle.
pub const STRATEGY_BTLAZY2: u32 = ZSTD_strategy::ZSTD_btlazy2 as u32;

/// Strategy ordinal of the optimal parser.
pub const STRATEGY_BTOPT: u32 = ZSTD_strategy::ZSTD_btopt as u32;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A raw error code returned by the library.
#[derive(Clone, Copy)]
pub struct ZstdError(usize);

impl ZstdError {
    /// Human-readable description from the library's error table.
    pub fn name(&self) -> &'static str {
        unsafe {
            CStr::from_ptr(zstd_sys::ZSTD_getErrorName(self.0))
                .to_str()
                .unwrap_or("unknown zstd error")
        }
    }

    /// True when decoding failed because the frame's window exceeds the
    /// decoder's configured memory limit.
    pub fn is_window_too_large(&self) -> bool {
        unsafe {
            zstd_sys::ZSTD_getErrorCode(self.0)
                == zstd_sys::ZSTD_ErrorCode::ZSTD_error_frameParameter_windowTooLarge
        }
    }
}

impl fmt::Display for ZstdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for ZstdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZstdError({}: {})", self.0, self.name())
    }
}

fn parse_code(code: usize) -> Result<usize, ZstdError> {
    if unsafe { zstd_sys::ZSTD_isError(code) } != 0 {
        Err(ZstdError(code))
    } else {
        Ok(code)
    }
}

// ---------------------------------------------------------------------------
// Buffer cursors
// ---------------------------------------------------------------------------

/// An input slice plus the number of bytes the codec has consumed from it.
pub struct InBuffer<'a> {
    pub src: &'a [u8],
    pub pos: usize,
}

impl<'a> InBuffer<'a> {
    pub fn around(src: &'a [u8]) -> Self {
        InBuffer { src, pos: 0 }
    }

    fn as_sys(&mut self) -> ZSTD_inBuffer {
        ZSTD_inBuffer {
            src: self.src.as_ptr() as *const c_void,
            size: self.src.len(),
            pos: self.pos,
        }
    }
}

/// An output slice plus the number of bytes the codec has produced into it.
pub struct OutBuffer<'a> {
    pub dst: &'a mut [u8],
    pub pos: usize,
}

impl<'a> OutBuffer<'a> {
    pub fn around(dst: &'a mut [u8]) -> Self {
        OutBuffer { dst, pos: 0 }
    }

    /// The filled portion of the output slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.dst[..self.pos]
    }

    fn as_sys(&mut self) -> ZSTD_outBuffer {
        ZSTD_outBuffer {
            dst: self.dst.as_mut_ptr() as *mut c_void,
            size: self.dst.len(),
            pos: self.pos,
        }
    }
}

// ---------------------------------------------------------------------------
// Directives and parameter enums
// ---------------------------------------------------------------------------

/// End directive for a streaming compression call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    /// More input will follow.
    Continue,
    /// Flush whatever is buffered, then accept more input.
    Flush,
    /// Final call for this frame; flush everything and write the epilogue.
    End,
}

impl Directive {
    fn as_sys(self) -> ZSTD_EndDirective {
        match self {
            Directive::Continue => ZSTD_EndDirective::ZSTD_e_continue,
            Directive::Flush => ZSTD_EndDirective::ZSTD_e_flush,
            Directive::End => ZSTD_EndDirective::ZSTD_e_end,
        }
    }
}

/// Tri-state switch for parameters whose default the library chooses itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ParamSwitch {
    #[default]
    Auto,
    Enable,
    Disable,
}

impl ParamSwitch {
    fn as_int(self) -> c_int {
        match self {
            ParamSwitch::Auto => 0,
            ParamSwitch::Enable => 1,
            ParamSwitch::Disable => 2,
        }
    }
}

/// Typed compression parameters.
///
/// Each variant maps onto one library parameter; the advanced entries at the
/// bottom go through the library's extension slots.
#[derive(Clone, Copy, Debug)]
pub enum CParam {
    CompressionLevel(i32),
    WindowLog(u32),
    HashLog(u32),
    ChainLog(u32),
    SearchLog(u32),
    MinMatch(u32),
    TargetLength(u32),
    Strategy(u32),
    TargetCBlockSize(u32),
    EnableLongDistanceMatching(bool),
    LdmHashLog(u32),
    LdmMinMatch(u32),
    LdmBucketSizeLog(u32),
    LdmHashRateLog(u32),
    ContentSizeFlag(bool),
    ChecksumFlag(bool),
    DictIdFlag(bool),
    NbWorkers(u32),
    JobSize(u32),
    OverlapLog(u32),
    Rsyncable(bool),
    SrcSizeHint(u32),
    EnableDedicatedDictSearch(bool),
    LiteralCompressionMode(ParamSwitch),
    UseRowMatchFinder(ParamSwitch),
}

impl CParam {
    fn as_sys(self) -> (ZSTD_cParameter, c_int) {
        use ZSTD_cParameter::*;
        match self {
            CParam::CompressionLevel(v) => (ZSTD_c_compressionLevel, v),
            CParam::WindowLog(v) => (ZSTD_c_windowLog, v as c_int),
            CParam::HashLog(v) => (ZSTD_c_hashLog, v as c_int),
            CParam::ChainLog(v) => (ZSTD_c_chainLog, v as c_int),
            CParam::SearchLog(v) => (ZSTD_c_searchLog, v as c_int),
            CParam::MinMatch(v) => (ZSTD_c_minMatch, v as c_int),
            CParam::TargetLength(v) => (ZSTD_c_targetLength, v as c_int),
            CParam::Strategy(v) => (ZSTD_c_strategy, v as c_int),
            CParam::TargetCBlockSize(v) => (ZSTD_c_targetCBlockSize, v as c_int),
            CParam::EnableLongDistanceMatching(v) => {
                (ZSTD_c_enableLongDistanceMatching, v as c_int)
            }
            CParam::LdmHashLog(v) => (ZSTD_c_ldmHashLog, v as c_int),
            CParam::LdmMinMatch(v) => (ZSTD_c_ldmMinMatch, v as c_int),
            CParam::LdmBucketSizeLog(v) => (ZSTD_c_ldmBucketSizeLog, v as c_int),
            CParam::LdmHashRateLog(v) => (ZSTD_c_ldmHashRateLog, v as c_int),
            CParam::ContentSizeFlag(v) => (ZSTD_c_contentSizeFlag, v as c_int),
            CParam::ChecksumFlag(v) => (ZSTD_c_checksumFlag, v as c_int),
            CParam::DictIdFlag(v) => (ZSTD_c_dictIDFlag, v as c_int),
            CParam::NbWorkers(v) => (ZSTD_c_nbWorkers, v as c_int),
            CParam::JobSize(v) => (ZSTD_c_jobSize, v as c_int),
            CParam::OverlapLog(v) => (ZSTD_c_overlapLog, v as c_int),
            // Extension slots, in header order: rsyncable is slot 1, the
            // literal mode slot 5, the size hint slot 7, dedicated dict
            // search slot 8, the row match finder slot 14.
            CParam::Rsyncable(v) => (ZSTD_c_experimentalParam1, v as c_int),
            CParam::LiteralCompressionMode(v) => (ZSTD_c_experimentalParam5, v.as_int()),
            CParam::SrcSizeHint(v) => (ZSTD_c_experimentalParam7, v as c_int),
            CParam::EnableDedicatedDictSearch(v) => (ZSTD_c_experimentalParam8, v as c_int),
            CParam::UseRowMatchFinder(v) => (ZSTD_c_experimentalParam14, v.as_int()),
        }
    }
}

// ---------------------------------------------------------------------------
// Progression counters
// ---------------------------------------------------------------------------

/// Snapshot of the encoder's internal pipeline counters.
///
/// `ingested` counts bytes accepted from the caller, `consumed` bytes
/// actually compressed, `produced` compressed bytes generated, and `flushed`
/// compressed bytes handed back.  `current_job_id` and `nb_active_workers`
/// describe the multithreaded job pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameProgression {
    pub ingested: u64,
    pub consumed: u64,
    pub produced: u64,
    pub flushed: u64,
    pub current_job_id: u32,
    pub nb_active_workers: u32,
}

impl FrameProgression {
    fn from_sys(zfp: ZSTD_frameProgression) -> Self {
        FrameProgression {
            ingested: zfp.ingested as u64,
            consumed: zfp.consumed as u64,
            produced: zfp.produced as u64,
            flushed: zfp.flushed as u64,
            current_job_id: zfp.currentJobID,
            nb_active_workers: zfp.nbActiveWorkers,
        }
    }
}

// ---------------------------------------------------------------------------
// Compression parameter table
// ---------------------------------------------------------------------------

/// The parameter set the library would pick for a given level and sizes.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompressionParams {
    pub window_log: u32,
    pub chain_log: u32,
    pub hash_log: u32,
    pub search_log: u32,
    pub min_match: u32,
    pub target_length: u32,
    pub strategy: u32,
}

/// Looks up the library's parameter table for `level`, an estimated source
/// size (`None` when unknown), and a dictionary size (0 for none).
pub fn cparams(level: i32, src_size: Option<u64>, dict_size: usize) -> CompressionParams {
    let estimated = src_size.unwrap_or(CONTENTSIZE_UNKNOWN);
    let p = unsafe { zstd_sys::ZSTD_getCParams(level, estimated, dict_size) };
    CompressionParams {
        window_log: p.windowLog,
        chain_log: p.chainLog,
        hash_log: p.hashLog,
        search_log: p.searchLog,
        min_match: p.minMatch,
        target_length: p.targetLength,
        strategy: p.strategy as u32,
    }
}

// ---------------------------------------------------------------------------
// Level bounds and frame probes
// ---------------------------------------------------------------------------

/// Most negative (fastest) compression level the library accepts.
pub fn min_c_level() -> i32 {
    unsafe { zstd_sys::ZSTD_minCLevel() }
}

/// Highest compression level the library accepts.
pub fn max_c_level() -> i32 {
    unsafe { zstd_sys::ZSTD_maxCLevel() }
}

/// True when `buf` starts with a zstd frame (regular or skippable).
pub fn is_frame(buf: &[u8]) -> bool {
    unsafe { zstd_sys::ZSTD_isFrame(buf.as_ptr() as *const c_void, buf.len()) != 0 }
}

/// Frame header fields extracted from the start of a frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameHeader {
    pub window_size: u64,
    /// Declared uncompressed size, when the frame records one.
    pub content_size: Option<u64>,
    pub dict_id: u32,
    pub checksum_flag: bool,
}

/// Probes the frame header at the start of `buf`. Returns `None` when the
/// bytes do not hold a complete, valid header.
pub fn frame_header(buf: &[u8]) -> Option<FrameHeader> {
    let mut header = std::mem::MaybeUninit::<ZSTD_FrameHeader>::zeroed();
    let ret = unsafe {
        zstd_sys::ZSTD_getFrameHeader(
            header.as_mut_ptr(),
            buf.as_ptr() as *const c_void,
            buf.len(),
        )
    };
    if ret != 0 {
        // Nonzero means either an error or "need more bytes".
        return None;
    }
    let header = unsafe { header.assume_init() };
    let content_size = match header.frameContentSize as u64 {
        CONTENTSIZE_UNKNOWN => None,
        size => Some(size),
    };
    Some(FrameHeader {
        window_size: header.windowSize as u64,
        content_size,
        dict_id: header.dictID,
        checksum_flag: header.checksumFlag != 0,
    })
}

// ---------------------------------------------------------------------------
// Compression context
// ---------------------------------------------------------------------------

/// Owned streaming compression context. Dropped contexts release all library
/// state, including any worker threads.
pub struct Cctx(NonNull<zstd_sys::ZSTD_CCtx>);

impl Cctx {
    /// Allocates a fresh context. `None` on allocation failure.
    pub fn try_create() -> Option<Self> {
        NonNull::new(unsafe { zstd_sys::ZSTD_createCCtx() }).map(Cctx)
    }

    /// Recommended size for the input staging buffer.
    pub fn in_size() -> usize {
        unsafe { zstd_sys::ZSTD_CStreamInSize() }
    }

    /// Recommended size for the compressed output buffer.
    pub fn out_size() -> usize {
        unsafe { zstd_sys::ZSTD_CStreamOutSize() }
    }

    pub fn set_parameter(&mut self, param: CParam) -> Result<(), ZstdError> {
        let (p, v) = param.as_sys();
        parse_code(unsafe { zstd_sys::ZSTD_CCtx_setParameter(self.0.as_ptr(), p, v) })?;
        Ok(())
    }

    /// Declares the total uncompressed size of the next frame. `None` marks
    /// it unknown. The library stores the value in the frame header and
    /// verifies it at end-of-frame.
    pub fn set_pledged_src_size(&mut self, size: Option<u64>) -> Result<(), ZstdError> {
        let pledged = size.unwrap_or(CONTENTSIZE_UNKNOWN);
        parse_code(unsafe {
            zstd_sys::ZSTD_CCtx_setPledgedSrcSize(self.0.as_ptr(), pledged)
        })?;
        Ok(())
    }

    /// Loads `dict` as a digested dictionary for all following frames.
    /// An empty slice clears any previous dictionary.
    pub fn load_dictionary(&mut self, dict: &[u8]) -> Result<(), ZstdError> {
        parse_code(unsafe {
            zstd_sys::ZSTD_CCtx_loadDictionary(
                self.0.as_ptr(),
                dict.as_ptr() as *const c_void,
                dict.len(),
            )
        })?;
        Ok(())
    }

    /// References `prefix` as raw history for the next frame only, without
    /// digesting it into dictionary tables.
    ///
    /// # Safety
    ///
    /// The library keeps the pointer until the next frame completes or the
    /// context is reset; `prefix` must stay alive and unmoved until then.
    pub unsafe fn ref_prefix(&mut self, prefix: &[u8]) -> Result<(), ZstdError> {
        parse_code(zstd_sys::ZSTD_CCtx_refPrefix(
            self.0.as_ptr(),
            prefix.as_ptr() as *const c_void,
            prefix.len(),
        ))?;
        Ok(())
    }

    /// One streaming step. Consumes from `input`, produces into `output`,
    /// and returns the minimum number of bytes still buffered inside the
    /// context (0 means the requested flush/end is complete).
    pub fn compress_stream2(
        &mut self,
        output: &mut OutBuffer<'_>,
        input: &mut InBuffer<'_>,
        directive: Directive,
    ) -> Result<usize, ZstdError> {
        let mut out_sys = output.as_sys();
        let mut in_sys = input.as_sys();
        let ret = unsafe {
            zstd_sys::ZSTD_compressStream2(
                self.0.as_ptr(),
                &mut out_sys,
                &mut in_sys,
                directive.as_sys(),
            )
        };
        output.pos = out_sys.pos;
        input.pos = in_sys.pos;
        parse_code(ret)
    }

    /// Number of bytes ready to flush immediately without further input.
    pub fn to_flush_now(&self) -> usize {
        unsafe { zstd_sys::ZSTD_toFlushNow(self.0.as_ptr()) }
    }

    /// Current pipeline counters (valid while a frame is in flight).
    pub fn frame_progression(&self) -> FrameProgression {
        FrameProgression::from_sys(unsafe {
            zstd_sys::ZSTD_getFrameProgression(self.0.as_ptr())
        })
    }
}

impl Drop for Cctx {
    fn drop(&mut self) {
        unsafe {
            zstd_sys::ZSTD_freeCCtx(self.0.as_ptr());
        }
    }
}

// ---------------------------------------------------------------------------
// Decompression context
// ---------------------------------------------------------------------------

/// Owned streaming decompression context.
pub struct Dctx(NonNull<zstd_sys::ZSTD_DCtx>);

impl Dctx {
    /// Allocates a fresh context. `None` on allocation failure.
    pub fn try_create() -> Option<Self> {
        NonNull::new(unsafe { zstd_sys::ZSTD_createDCtx() }).map(Dctx)
    }

    /// Recommended size for the compressed input buffer.
    pub fn in_size() -> usize {
        unsafe { zstd_sys::ZSTD_DStreamInSize() }
    }

    /// Recommended size for the decoded output buffer.
    pub fn out_size() -> usize {
        unsafe { zstd_sys::ZSTD_DStreamOutSize() }
    }

    /// Discards in-flight frame state while keeping parameters and the
    /// loaded dictionary. Called between frames of a multi-frame stream.
    pub fn reset_session(&mut self) {
        // Session-only reset cannot fail.
        unsafe {
            zstd_sys::ZSTD_DCtx_reset(
                self.0.as_ptr(),
                ZSTD_ResetDirective::ZSTD_reset_session_only,
            );
        }
    }

    /// Caps the decode window; frames requiring more memory are rejected.
    pub fn set_max_window_size(&mut self, max_bytes: usize) -> Result<(), ZstdError> {
        parse_code(unsafe {
            zstd_sys::ZSTD_DCtx_setMaxWindowSize(self.0.as_ptr(), max_bytes)
        })?;
        Ok(())
    }

    /// Skips checksum verification on frames that carry one.
    /// Goes through the decoder's first extension slot.
    pub fn force_ignore_checksum(&mut self, ignore: bool) -> Result<(), ZstdError> {
        parse_code(unsafe {
            zstd_sys::ZSTD_DCtx_setParameter(
                self.0.as_ptr(),
                zstd_sys::ZSTD_dParameter::ZSTD_d_experimentalParam1,
                ignore as c_int,
            )
        })?;
        Ok(())
    }

    /// Loads `dict` for all following frames. Raw (non-digested) content is
    /// accepted, which pairs with the encoder's prefix referencing.
    pub fn load_dictionary(&mut self, dict: &[u8]) -> Result<(), ZstdError> {
        parse_code(unsafe {
            zstd_sys::ZSTD_DCtx_loadDictionary(
                self.0.as_ptr(),
                dict.as_ptr() as *const c_void,
                dict.len(),
            )
        })?;
        Ok(())
    }

    /// One streaming step. Returns 0 when the frame is complete, otherwise a
    /// hint for how many more input bytes the next call would like.
    pub fn decompress_stream(
        &mut self,
        output: &mut OutBuffer<'_>,
        input: &mut InBuffer<'_>,
    ) -> Result<usize, ZstdError> {
        let mut out_sys = output.as_sys();
        let mut in_sys = input.as_sys();
        let ret = unsafe {
            zstd_sys::ZSTD_decompressStream(self.0.as_ptr(), &mut out_sys, &mut in_sys)
        };
        output.pos = out_sys.pos;
        input.pos = in_sys.pos;
        parse_code(ret)
    }
}

impl Drop for Dctx {
    fn drop(&mut self) {
        unsafe {
            zstd_sys::ZSTD_freeDCtx(self.0.as_ptr());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bounds_sane() {
        assert!(min_c_level() < 0);
        assert!(max_c_level() >= 19);
    }

    #[test]
    fn recommended_buffer_sizes_nonzero() {
        assert!(Cctx::in_size() > 0);
        assert!(Cctx::out_size() > 0);
        assert!(Dctx::in_size() > 0);
        assert!(Dctx::out_size() > 0);
    }

    #[test]
    fn streaming_round_trip() {
        let payload = b"codec binding round trip payload".repeat(64);

        let mut cctx = Cctx::try_create().expect("cctx alloc");
        cctx.set_parameter(CParam::CompressionLevel(3)).unwrap();
        cctx.set_pledged_src_size(Some(payload.len() as u64)).unwrap();

        let mut compressed = vec![0u8; Cctx::out_size()];
        let mut produced = 0usize;
        let mut input = InBuffer::around(&payload);
        loop {
            let mut output = OutBuffer::around(&mut compressed[produced..]);
            let remaining = cctx
                .compress_stream2(&mut output, &mut input, Directive::End)
                .expect("compress step");
            produced += output.pos;
            if remaining == 0 && input.pos == input.src.len() {
                break;
            }
        }
        compressed.truncate(produced);
        assert!(is_frame(&compressed));

        let header = frame_header(&compressed).expect("header probe");
        assert!(header.window_size > 0);

        let mut dctx = Dctx::try_create().expect("dctx alloc");
        let mut decoded = vec![0u8; payload.len() + 64];
        let mut input = InBuffer::around(&compressed);
        let mut written = 0usize;
        loop {
            let mut output = OutBuffer::around(&mut decoded[written..]);
            let hint = dctx
                .decompress_stream(&mut output, &mut input)
                .expect("decompress step");
            written += output.pos;
            if hint == 0 {
                break;
            }
        }
        decoded.truncate(written);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn cparams_table_lookup() {
        let p = cparams(3, Some(1 << 20), 0);
        assert!(p.window_log >= 10);
        assert!(p.chain_log > 1);
        assert!(p.strategy >= 1);
    }

    #[test]
    fn experimental_parameters_accepted() {
        let mut cctx = Cctx::try_create().unwrap();
        cctx.set_parameter(CParam::NbWorkers(2)).unwrap();
        cctx.set_parameter(CParam::Rsyncable(true)).unwrap();
        cctx.set_parameter(CParam::SrcSizeHint(4096)).unwrap();
        cctx.set_parameter(CParam::UseRowMatchFinder(ParamSwitch::Enable))
            .unwrap();
        cctx.set_parameter(CParam::LiteralCompressionMode(ParamSwitch::Auto))
            .unwrap();
    }
}
