//! Argument parsing for the `zstdr` command line.
//!
//! The flag grammar does not fit a declarative parser: short options
//! aggregate (`-19fv`), bare digits select the level, and several long
//! options carry structured values (`--adapt=min=A,max=B`, `--long=27`,
//! size suffixes on `--memory`). The parse is a single hand-written loop
//! in the style of the classic compression CLIs; every recognized option
//! lands in a [`ParsedArgs`] value that the dispatch phase consumes.
//!
//! Options whose validity depends on other options (adaptive and rsyncable
//! need worker threads) are applied in a finalize step once the whole line
//! has been read, so `--adapt -T4` and `-T4 --adapt` behave the same.

use anyhow::{anyhow, bail, Result};

use crate::cli::op_mode::{CliInit, OpMode};
use crate::codec::CompressionParams;
use crate::io::display::ProgressSetting;
use crate::io::file_io::{STDIN_MARK, STDOUT_MARK};
use crate::io::prefs::{CompressionFormat, Prefs, SparseMode};

/// Default compression level when none is requested.
pub const DEFAULT_LEVEL: i32 = 3;

/// Highest level available without `--ultra`.
const MAX_LEVEL_WITHOUT_ULTRA: i32 = 19;

// ---------------------------------------------------------------------------
// Output type
// ---------------------------------------------------------------------------

/// Everything the dispatch phase needs, produced by [`parse_args_from`].
#[derive(Debug)]
pub struct ParsedArgs {
    pub prefs: Prefs,
    pub params: CompressionParams,
    pub op_mode: OpMode,
    pub level: i32,
    pub display_level: i32,
    pub progress: ProgressSetting,
    pub force_stdout: bool,
    pub in_files: Vec<String>,
    pub output_filename: Option<String>,
    pub out_dir: Option<String>,
    pub out_mirror: Option<String>,
    pub dict_filename: Option<String>,
    pub exit_early: bool,
}

// ---------------------------------------------------------------------------
// Value parsing helpers
// ---------------------------------------------------------------------------

/// Parses a decimal value with an optional binary-unit suffix
/// (`K`/`KB`/`KiB`, `M`/..., `G`/...).
pub fn parse_size(arg: &str) -> Result<u64> {
    let digits_end = arg
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(arg.len());
    if digits_end == 0 {
        bail!("bad usage: expected a number in '{}'", arg);
    }
    let value: u64 = arg[..digits_end].parse()?;
    let multiplier: u64 = match arg[digits_end..].to_ascii_uppercase().as_str() {
        "" => 1,
        "K" | "KB" | "KIB" => 1 << 10,
        "M" | "MB" | "MIB" => 1 << 20,
        "G" | "GB" | "GIB" => 1 << 30,
        other => bail!("bad usage: unknown size suffix '{}'", other),
    };
    value
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow!("bad usage: size overflows in '{}'", arg))
}

/// Splits `--option=value`; returns the value when `arg` starts with
/// `name=`.
fn long_value<'a>(arg: &'a str, name: &str) -> Option<&'a str> {
    arg.strip_prefix(name)?.strip_prefix('=')
}

/// Parses `min=A,max=B` (either part optional) for `--adapt`.
fn parse_adapt_bounds(value: &str) -> Result<(Option<i32>, Option<i32>)> {
    let mut min = None;
    let mut max = None;
    for part in value.split(',') {
        if let Some(v) = part.strip_prefix("min=") {
            min = Some(v.parse()?);
        } else if let Some(v) = part.strip_prefix("max=") {
            max = Some(v.parse()?);
        } else {
            bail!("bad usage: --adapt expects min=#,max=# (got '{}')", part);
        }
    }
    Ok((min, max))
}

fn print_usage() {
    println!("Usage: zstdr [OPTIONS] [FILE(s)]");
    println!();
    println!("  -#            compression level (1-19, default {})", DEFAULT_LEVEL);
    println!("  -z, --compress         force compression");
    println!("  -d, --decompress       force decompression");
    println!("  -t, --test             test compressed file integrity");
    println!("  -o FILE                result stored into FILE");
    println!("  -c, --stdout           write to standard output");
    println!("  -f, --force            overwrite output without prompting");
    println!("  -k, --keep             keep source files (default)");
    println!("      --rm               remove source files on success");
    println!("  -D FILE                use FILE as dictionary");
    println!("      --patch-from=REF   use REF as reference for delta compression");
    println!("  -T#, --threads=#       use # worker threads (0 = auto)");
    println!("      --adapt[=min=#,max=#]  adjust the level to I/O conditions");
    println!("      --long[=#]         long-distance matching with # windowLog");
    println!("      --memory=#         decoder memory usage limit");
    println!("      --stream-size=#    declared size of the input stream");
    println!("      --sparse / --no-sparse   sparse-file handling on decode");
    println!("      --format=FORMAT    zstd, gzip, xz, lzma or lz4");
    println!("      --exclude-compressed   skip already-compressed files");
    println!("  -O DIR, --output-dir-flat=DIR    outputs into DIR");
    println!("      --output-dir-mirror=DIR      outputs under DIR, mirroring dirs");
    println!("  -q / -v                quieter / more verbose");
    println!("  -V, --version          show version");
    println!("  -h, --help             show this help");
}

// ---------------------------------------------------------------------------
// Main parse loop
// ---------------------------------------------------------------------------

/// Parses `std::env::args()` after `argv[0]`.
pub fn parse_args(init: CliInit) -> Result<ParsedArgs> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    parse_args_from(&argv, init)
}

/// Parses an explicit argument slice (unit-testable entry point).
pub fn parse_args_from(argv: &[String], init: CliInit) -> Result<ParsedArgs> {
    let mut prefs = Prefs::default();
    let mut params = CompressionParams::default();
    let mut op_mode = if init.decompress {
        OpMode::Decompress
    } else {
        OpMode::Auto
    };
    let mut level = DEFAULT_LEVEL;
    let mut display_level = 2;
    let mut progress = ProgressSetting::Auto;
    let mut force_stdout = init.force_stdout;
    let mut in_files = Vec::new();
    let mut output_filename = if init.force_stdout {
        Some(STDOUT_MARK.to_owned())
    } else {
        None
    };
    let mut out_dir = None;
    let mut out_mirror = None;
    let mut dict_filename: Option<String> = None;
    let mut exit_early = false;

    let mut ultra = false;
    let mut threads: Option<u32> = None;
    let mut adaptive = false;
    let mut adapt_bounds: (Option<i32>, Option<i32>) = (None, None);
    let mut rsyncable = false;

    let mut only_files = false;
    let mut iter = argv.iter().peekable();

    while let Some(arg) = iter.next() {
        let arg = arg.as_str();

        if only_files || arg == "-" || !arg.starts_with('-') {
            if arg == "-" {
                in_files.push(STDIN_MARK.to_owned());
            } else {
                in_files.push(arg.to_owned());
            }
            continue;
        }

        // ── Long options ──────────────────────────────────────────────────
        if let Some(rest) = arg.strip_prefix("--") {
            match rest {
                "" => only_files = true,
                "compress" => op_mode = OpMode::Compress,
                "decompress" | "uncompress" => op_mode = OpMode::Decompress,
                "test" => op_mode = OpMode::Test,
                "stdout" => {
                    force_stdout = true;
                    output_filename = Some(STDOUT_MARK.to_owned());
                }
                "force" | "overwrite" => prefs.overwrite = true,
                "keep" => prefs.remove_src_file = false,
                "rm" => prefs.remove_src_file = true,
                "sparse" => prefs.sparse_mode = SparseMode::Forced,
                "no-sparse" => prefs.sparse_mode = SparseMode::Disabled,
                "check" => prefs.checksum = true,
                "no-check" => prefs.checksum = false,
                "no-dictID" => prefs.dict_id = false,
                "content-size" => prefs.content_size = true,
                "no-content-size" => prefs.content_size = false,
                "exclude-compressed" => prefs.exclude_compressed = true,
                "allow-block-devices" => prefs.allow_block_devices = true,
                "ultra" => ultra = true,
                "adapt" => adaptive = true,
                "rsyncable" => rsyncable = true,
                "long" => {
                    prefs.ldm = true;
                }
                "row-match-finder" => {
                    prefs.use_row_match_finder = crate::codec::ParamSwitch::Enable
                }
                "no-row-match-finder" => {
                    prefs.use_row_match_finder = crate::codec::ParamSwitch::Disable
                }
                "progress" => progress = ProgressSetting::Always,
                "no-progress" => progress = ProgressSetting::Never,
                "quiet" => display_level -= 1,
                "verbose" => display_level += 1,
                "version" => {
                    println!("zstdr {}", env!("CARGO_PKG_VERSION"));
                    exit_early = true;
                }
                "help" => {
                    print_usage();
                    exit_early = true;
                }
                _ => {
                    if let Some(v) = long_value(arg, "--adapt") {
                        adaptive = true;
                        adapt_bounds = parse_adapt_bounds(v)?;
                    } else if let Some(v) = long_value(arg, "--long") {
                        prefs.ldm = true;
                        let window_log: u32 = v.parse()?;
                        params.window_log = window_log;
                        // Make sure the matching decode succeeds too.
                        let window = 1u64
                            .checked_shl(window_log)
                            .ok_or_else(|| anyhow!("bad usage: --long={} is too large", v))?;
                        if window > u32::MAX as u64 {
                            bail!("bad usage: --long={} is too large", v);
                        }
                        prefs.mem_limit = prefs.mem_limit.max(window as u32);
                    } else if let Some(v) = long_value(arg, "--memory") {
                        prefs.mem_limit = parse_size(v)?
                            .try_into()
                            .map_err(|_| anyhow!("bad usage: --memory={} is too large", v))?;
                    } else if let Some(v) = long_value(arg, "--threads") {
                        threads = Some(v.parse()?);
                    } else if let Some(v) = long_value(arg, "--stream-size") {
                        prefs.stream_src_size = parse_size(v)?;
                    } else if let Some(v) = long_value(arg, "--size-hint") {
                        prefs.set_src_size_hint(parse_size(v)?)?;
                    } else if let Some(v) = long_value(arg, "--block-size") {
                        prefs.block_size = parse_size(v)?
                            .try_into()
                            .map_err(|_| anyhow!("bad usage: --block-size={} is too large", v))?;
                    } else if let Some(v) = long_value(arg, "--target-compressed-block-size") {
                        prefs.target_cblock_size = parse_size(v)?.try_into().map_err(|_| {
                            anyhow!("bad usage: --target-compressed-block-size={} is too large", v)
                        })?;
                    } else if let Some(v) = long_value(arg, "--patch-from") {
                        prefs.patch_from = true;
                        dict_filename = Some(v.to_owned());
                    } else if let Some(v) = long_value(arg, "--output-dir-flat") {
                        out_dir = Some(v.to_owned());
                    } else if let Some(v) = long_value(arg, "--output-dir-mirror") {
                        out_mirror = Some(v.to_owned());
                    } else if let Some(v) = long_value(arg, "--format") {
                        prefs.format = match v {
                            "zstd" => CompressionFormat::Zstd,
                            "gzip" => CompressionFormat::Gzip,
                            "xz" => CompressionFormat::Xz,
                            "lzma" => CompressionFormat::Lzma,
                            "lz4" => CompressionFormat::Lz4,
                            other => bail!("bad usage: unknown format '{}'", other),
                        };
                    } else if let Some(v) = long_value(arg, "--fast") {
                        let accel: i32 = v.parse()?;
                        if accel <= 0 {
                            bail!("bad usage: --fast expects a positive value");
                        }
                        level = -accel;
                    } else if arg == "--fast" {
                        level = -1;
                    } else {
                        bail!("bad usage: unknown option '{}'", arg);
                    }
                }
            }
            continue;
        }

        // ── Aggregated short options ──────────────────────────────────────
        let mut chars = arg[1..].chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '0'..='9' => {
                    let mut value = c.to_digit(10).unwrap() as i32;
                    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                        value = value * 10 + d as i32;
                        chars.next();
                    }
                    level = value;
                }
                'z' => op_mode = OpMode::Compress,
                'd' => op_mode = OpMode::Decompress,
                't' => op_mode = OpMode::Test,
                'c' => {
                    force_stdout = true;
                    output_filename = Some(STDOUT_MARK.to_owned());
                }
                'f' => prefs.overwrite = true,
                'k' => prefs.remove_src_file = false,
                'q' => display_level -= 1,
                'v' => display_level += 1,
                'T' => {
                    let digits: String = chars.by_ref().collect();
                    threads = Some(digits.parse().map_err(|_| {
                        anyhow!("bad usage: -T expects a thread count")
                    })?);
                }
                'o' => {
                    let rest: String = chars.by_ref().collect();
                    let value = if rest.is_empty() {
                        iter.next()
                            .ok_or_else(|| anyhow!("bad usage: -o expects a file name"))?
                            .clone()
                    } else {
                        rest
                    };
                    output_filename = Some(if value == "-" {
                        STDOUT_MARK.to_owned()
                    } else {
                        value
                    });
                }
                'D' => {
                    let rest: String = chars.by_ref().collect();
                    let value = if rest.is_empty() {
                        iter.next()
                            .ok_or_else(|| anyhow!("bad usage: -D expects a file name"))?
                            .clone()
                    } else {
                        rest
                    };
                    dict_filename = Some(value);
                }
                'O' => {
                    let rest: String = chars.by_ref().collect();
                    let value = if rest.is_empty() {
                        iter.next()
                            .ok_or_else(|| anyhow!("bad usage: -O expects a directory"))?
                            .clone()
                    } else {
                        rest
                    };
                    out_dir = Some(value);
                }
                'V' => {
                    println!("zstdr {}", env!("CARGO_PKG_VERSION"));
                    exit_early = true;
                }
                'h' | 'H' => {
                    print_usage();
                    exit_early = true;
                }
                other => bail!("bad usage: unknown option '-{}'", other),
            }
        }
    }

    // ── Finalize: order-independent cross-option application ─────────────
    if let Some(n) = threads {
        let n = if n == 0 {
            crate::config::default_nb_workers()
        } else {
            n
        };
        prefs.set_workers(n);
    }
    if adaptive {
        prefs
            .set_adaptive(true)
            .map_err(|e| anyhow!("bad usage: {}", e))?;
        if let Some(min) = adapt_bounds.0 {
            prefs.set_adapt_min(min);
        }
        if let Some(max) = adapt_bounds.1 {
            prefs.set_adapt_max(max);
        }
        if prefs.adapt_min > prefs.adapt_max {
            bail!("bad usage: --adapt min must not exceed max");
        }
    }
    if rsyncable {
        prefs
            .set_rsyncable(true)
            .map_err(|e| anyhow!("bad usage: {}", e))?;
    }
    if !ultra && level > MAX_LEVEL_WITHOUT_ULTRA {
        level = MAX_LEVEL_WITHOUT_ULTRA;
    }
    if level > crate::codec::max_c_level() {
        level = crate::codec::max_c_level();
    }

    Ok(ParsedArgs {
        prefs,
        params,
        op_mode,
        level,
        display_level,
        progress,
        force_stdout,
        in_files,
        output_filename,
        out_dir,
        out_mirror,
        dict_filename,
        exit_early,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ParsedArgs> {
        let argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        parse_args_from(&argv, CliInit::default())
    }

    #[test]
    fn parse_size_suffixes() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("4K").unwrap(), 4096);
        assert_eq!(parse_size("2MB").unwrap(), 2 << 20);
        assert_eq!(parse_size("1GiB").unwrap(), 1 << 30);
        assert!(parse_size("abc").is_err());
        assert!(parse_size("1T").is_err());
    }

    #[test]
    fn aggregated_short_options() {
        let args = parse(&["-19fv", "input.txt"]).unwrap();
        assert_eq!(args.level, 19);
        assert!(args.prefs.overwrite);
        assert_eq!(args.display_level, 3);
        assert_eq!(args.in_files, vec!["input.txt"]);
    }

    #[test]
    fn level_clamped_without_ultra() {
        let args = parse(&["-22", "f"]).unwrap();
        assert_eq!(args.level, 19);
        let args = parse(&["--ultra", "-22", "f"]).unwrap();
        assert_eq!(args.level, 22.min(crate::codec::max_c_level()));
    }

    #[test]
    fn fast_levels_are_negative() {
        assert_eq!(parse(&["--fast", "f"]).unwrap().level, -1);
        assert_eq!(parse(&["--fast=5", "f"]).unwrap().level, -5);
        assert!(parse(&["--fast=0", "f"]).is_err());
    }

    #[test]
    fn adapt_requires_threads() {
        assert!(parse(&["--adapt", "f"]).is_err());
        let args = parse(&["-T4", "--adapt=min=1,max=10", "f"]).unwrap();
        assert!(args.prefs.adaptive);
        assert_eq!(args.prefs.adapt_max, 10);
    }

    #[test]
    fn long_sets_window_and_memory() {
        let args = parse(&["--long=25", "f"]).unwrap();
        assert!(args.prefs.ldm);
        assert_eq!(args.params.window_log, 25);
        assert_eq!(args.prefs.mem_limit, 1 << 25);
    }

    #[test]
    fn patch_from_sets_dictionary() {
        let args = parse(&["--patch-from=ref.bin", "f"]).unwrap();
        assert!(args.prefs.patch_from);
        assert_eq!(args.dict_filename.as_deref(), Some("ref.bin"));
    }

    #[test]
    fn output_option_maps_dash_to_stdout() {
        let args = parse(&["-o", "-", "f"]).unwrap();
        assert_eq!(args.output_filename.as_deref(), Some(STDOUT_MARK));
        let args = parse(&["-o", "out.zst", "f"]).unwrap();
        assert_eq!(args.output_filename.as_deref(), Some("out.zst"));
    }

    #[test]
    fn dash_input_is_stdin() {
        let args = parse(&["-d", "-"]).unwrap();
        assert_eq!(args.in_files, vec![STDIN_MARK]);
    }

    #[test]
    fn double_dash_stops_option_parsing() {
        let args = parse(&["--", "-weird-name"]).unwrap();
        assert_eq!(args.in_files, vec!["-weird-name"]);
    }

    #[test]
    fn format_selection() {
        let args = parse(&["--format=gzip", "f"]).unwrap();
        assert_eq!(args.prefs.format, CompressionFormat::Gzip);
        assert!(parse(&["--format=rar", "f"]).is_err());
    }
}
