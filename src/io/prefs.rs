//! Engine preferences and batch context.
//!
//! [`Prefs`] is the read-mostly configuration bag filled in by the CLI and
//! consulted by every per-file run. Setters that combine badly with other
//! fields validate at set time and return an error instead of deferring the
//! failure into the middle of a stream. Parameters whose absence means
//! "let the library decide" are `Option`s rather than sentinel integers.
//!
//! [`Context`] carries the batch-wide counters: how many files, which one is
//! current, and the running input/output byte totals used for the final
//! summary line.

use std::io;

use crate::codec::ParamSwitch;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Output format selected for compression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompressionFormat {
    #[default]
    Zstd,
    Gzip,
    Xz,
    Lzma,
    Lz4,
}

/// Sparse-file handling for decoded output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SparseMode {
    /// Always write every byte.
    Disabled,
    /// Sparse on regular files, plain on stdout.
    #[default]
    Auto,
    /// Sparse even where auto would disable it.
    Forced,
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// All tunable engine parameters for one batch.
#[derive(Clone, Debug)]
pub struct Prefs {
    pub format: CompressionFormat,
    pub overwrite: bool,
    pub remove_src_file: bool,
    pub test_mode: bool,
    pub allow_block_devices: bool,
    pub exclude_compressed: bool,
    pub sparse_mode: SparseMode,

    /// Append a content checksum to produced frames.
    pub checksum: bool,
    /// Record the dictionary id in produced frames.
    pub dict_id: bool,
    /// Record the uncompressed size in produced frames when known.
    pub content_size: bool,

    /// Decode window cap and patch-from dictionary cap, in bytes. 0 = library default.
    pub mem_limit: u32,
    /// Worker threads inside the encoder. 0 = single-threaded mode.
    pub workers: u32,
    /// Job size for multithreaded compression, in bytes. 0 = library default.
    pub block_size: u32,
    /// Overlap log between jobs. `None` = library default.
    pub overlap_log: Option<u32>,

    pub ldm: bool,
    pub ldm_hash_log: Option<u32>,
    pub ldm_min_match: Option<u32>,
    pub ldm_bucket_size_log: Option<u32>,
    pub ldm_hash_rate_log: Option<u32>,

    pub adaptive: bool,
    pub adapt_min: i32,
    pub adapt_max: i32,
    pub rsyncable: bool,

    /// Declared uncompressed size for sources whose size cannot be stat'ed.
    pub stream_src_size: u64,
    /// Target size of produced compressed blocks. 0 = library default.
    pub target_cblock_size: u32,
    /// Estimated source size used for parameter selection. 0 = unset.
    pub src_size_hint: u32,

    pub literal_compression_mode: ParamSwitch,
    pub use_row_match_finder: ParamSwitch,

    pub patch_from: bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Prefs {
            format: CompressionFormat::Zstd,
            overwrite: false,
            remove_src_file: false,
            test_mode: false,
            allow_block_devices: false,
            exclude_compressed: false,
            sparse_mode: SparseMode::Auto,
            checksum: true,
            dict_id: true,
            content_size: true,
            mem_limit: 0,
            workers: 0,
            block_size: 0,
            overlap_log: None,
            ldm: false,
            ldm_hash_log: None,
            ldm_min_match: None,
            ldm_bucket_size_log: None,
            ldm_hash_rate_log: None,
            adaptive: false,
            adapt_min: crate::codec::min_c_level(),
            adapt_max: crate::codec::max_c_level(),
            rsyncable: false,
            stream_src_size: 0,
            target_cblock_size: 0,
            src_size_hint: 0,
            literal_compression_mode: ParamSwitch::Auto,
            use_row_match_finder: ParamSwitch::Auto,
            patch_from: false,
        }
    }
}

fn config_error(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg.to_owned())
}

impl Prefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables adaptive level control. Requires worker threads: the feedback
    /// counters only advance when the encoder pipelines jobs.
    pub fn set_adaptive(&mut self, adaptive: bool) -> io::Result<()> {
        if adaptive && self.workers == 0 {
            return Err(config_error(
                "adaptive mode is not compatible with single-thread mode",
            ));
        }
        self.adaptive = adaptive;
        Ok(())
    }

    /// Enables rsync-friendly output. Requires worker threads.
    pub fn set_rsyncable(&mut self, rsyncable: bool) -> io::Result<()> {
        if rsyncable && self.workers == 0 {
            return Err(config_error(
                "rsyncable mode is not compatible with single-thread mode",
            ));
        }
        self.rsyncable = rsyncable;
        Ok(())
    }

    /// Lower bound for adaptive level excursions, clamped to the library range.
    pub fn set_adapt_min(&mut self, level: i32) {
        self.adapt_min = level.max(crate::codec::min_c_level());
    }

    /// Upper bound for adaptive level excursions, clamped to the library range.
    pub fn set_adapt_max(&mut self, level: i32) {
        self.adapt_max = level.min(crate::codec::max_c_level());
    }

    /// Source-size hint for parameter selection. Values beyond the library's
    /// signed parameter range are rejected rather than silently truncated.
    pub fn set_src_size_hint(&mut self, hint: u64) -> io::Result<()> {
        if hint > i32::MAX as u64 {
            return Err(config_error("source size hint is too large"));
        }
        self.src_size_hint = hint as u32;
        Ok(())
    }

    pub fn set_workers(&mut self, workers: u32) -> u32 {
        self.workers = workers.min(crate::config::NB_WORKERS_MAX);
        self.workers
    }
}

// ---------------------------------------------------------------------------
// Batch context
// ---------------------------------------------------------------------------

/// Mutable batch-wide state shared by consecutive per-file runs.
#[derive(Clone, Debug, Default)]
pub struct Context {
    pub files_total: usize,
    pub current_index: usize,
    pub files_processed: usize,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
    pub has_stdin_input: bool,
    pub has_stdout_output: bool,
}

impl Context {
    pub fn new(files_total: usize) -> Self {
        Context {
            files_total,
            ..Context::default()
        }
    }

    /// Records whether any of the batch inputs is the stdin sentinel, which
    /// disables interactive prompts (stdin carries data, not answers).
    pub fn determine_has_stdin_input<S: AsRef<str>>(&mut self, inputs: &[S]) {
        self.has_stdin_input = inputs
            .iter()
            .any(|name| name.as_ref() == crate::io::file_io::STDIN_MARK);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefs_fields() {
        let p = Prefs::default();
        assert_eq!(p.format, CompressionFormat::Zstd);
        assert!(!p.overwrite);
        assert!(!p.remove_src_file);
        assert!(!p.test_mode);
        assert_eq!(p.sparse_mode, SparseMode::Auto);
        assert!(p.checksum);
        assert!(p.dict_id);
        assert!(p.content_size);
        assert_eq!(p.workers, 0);
        assert!(p.overlap_log.is_none());
        assert!(p.ldm_bucket_size_log.is_none());
        assert!(!p.adaptive);
        assert!(!p.patch_from);
    }

    #[test]
    fn adaptive_requires_workers() {
        let mut p = Prefs::default();
        assert!(p.set_adaptive(true).is_err());
        p.set_workers(2);
        assert!(p.set_adaptive(true).is_ok());
        assert!(p.adaptive);
    }

    #[test]
    fn rsyncable_requires_workers() {
        let mut p = Prefs::default();
        assert!(p.set_rsyncable(true).is_err());
        p.set_workers(1);
        assert!(p.set_rsyncable(true).is_ok());
    }

    #[test]
    fn src_size_hint_range_checked() {
        let mut p = Prefs::default();
        assert!(p.set_src_size_hint(4096).is_ok());
        assert_eq!(p.src_size_hint, 4096);
        assert!(p.set_src_size_hint(u64::from(u32::MAX) + 1).is_err());
        assert!(p.set_src_size_hint((i32::MAX as u64) + 1).is_err());
    }

    #[test]
    fn workers_clamped_to_cap() {
        let mut p = Prefs::default();
        assert_eq!(p.set_workers(100_000), crate::config::NB_WORKERS_MAX);
    }

    #[test]
    fn adapt_bounds_clamped_to_library_range() {
        let mut p = Prefs::default();
        p.set_adapt_min(-1_000_000);
        assert_eq!(p.adapt_min, crate::codec::min_c_level());
        p.set_adapt_max(1_000_000);
        assert_eq!(p.adapt_max, crate::codec::max_c_level());
    }

    #[test]
    fn context_detects_stdin_input() {
        let mut ctx = Context::new(2);
        ctx.determine_has_stdin_input(&["a.txt", "stdin"]);
        assert!(ctx.has_stdin_input);
        let mut ctx = Context::new(1);
        ctx.determine_has_stdin_input(&["a.txt"]);
        assert!(!ctx.has_stdin_input);
    }
}
