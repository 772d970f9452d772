//! Binary entry point for the `zstdr` command-line tool.
//!
//! Handles post-parse validation, console refusals, automatic output-name
//! resolution, and dispatch to the compression or decompression engine.
//! All per-file errors are folded into the process exit code: 0 on full
//! success, 1 when any file failed, 2 on interrupt (set by the signal
//! handler itself).

use std::io::IsTerminal;

use zstdr::cli::args::{parse_args, ParsedArgs};
use zstdr::cli::op_mode::{detect_alias, determine_op_mode, OpMode};
use zstdr::io::paths;
use zstdr::io::{
    compress_filename, compress_multiple_filenames, decompress_filename,
    decompress_multiple_filenames, CompressionFormat, Context, Display, Prefs,
    NUL_MARK, STDIN_MARK, STDOUT_MARK,
};

/// Output suffix for the selected compression format.
fn format_suffix(prefs: &Prefs) -> &'static str {
    match prefs.format {
        CompressionFormat::Zstd => paths::ZSTD_EXTENSION,
        CompressionFormat::Gzip => paths::GZ_EXTENSION,
        CompressionFormat::Xz => paths::XZ_EXTENSION,
        CompressionFormat::Lzma => paths::LZMA_EXTENSION,
        CompressionFormat::Lz4 => paths::LZ4_EXTENSION,
    }
}

fn run(args: ParsedArgs) -> i32 {
    let ParsedArgs {
        mut prefs,
        params,
        mut op_mode,
        level,
        display_level,
        progress,
        force_stdout,
        mut in_files,
        mut output_filename,
        out_dir,
        out_mirror,
        dict_filename,
        exit_early: _,
    } = args;

    let mut display = Display::new(display_level);
    display.set_progress_setting(progress);

    // ── Test mode decodes and discards ───────────────────────────────────
    if op_mode == OpMode::Test {
        prefs.test_mode = true;
        output_filename = Some(NUL_MARK.to_owned());
        op_mode = OpMode::Decompress;
    }

    // ── Default input is stdin ───────────────────────────────────────────
    if in_files.is_empty() {
        in_files.push(STDIN_MARK.to_owned());
    }
    let single_input = in_files.len() == 1;
    let first_input = in_files[0].clone();

    // Refuse to read binary data from an interactive terminal.
    if in_files.iter().any(|f| f == STDIN_MARK) && std::io::stdin().is_terminal() {
        display.say(1, "refusing to read from a console \n");
        return 1;
    }

    // Reading stdin without an explicit output writes to stdout.
    if first_input == STDIN_MARK && output_filename.is_none() {
        output_filename = Some(STDOUT_MARK.to_owned());
    }

    // ── Resolve the operation before deriving names ──────────────────────
    if op_mode == OpMode::Auto {
        op_mode = determine_op_mode(&first_input);
    }

    // ── Automatic output name for a single input ─────────────────────────
    if output_filename.is_none() && single_input && out_dir.is_none() && out_mirror.is_none() {
        match op_mode {
            OpMode::Compress => {
                let out = paths::derive_compressed_name(&first_input, None, format_suffix(&prefs));
                display.say(2, &format!("Compressed filename will be : {} \n", out));
                output_filename = Some(out);
            }
            OpMode::Decompress => match paths::derive_decompressed_name(&first_input, None) {
                Some(out) => {
                    display.say(2, &format!("Decoding file {} \n", out));
                    output_filename = Some(out);
                }
                None => {
                    display.say(
                        1,
                        &format!(
                            "zstdr: {}: unknown suffix ({} expected); specify the output with -o \n",
                            first_input,
                            paths::known_suffix_list()
                        ),
                    );
                    return 1;
                }
            },
            _ => {}
        }
    }

    // ── Console refusal for the output side ──────────────────────────────
    if output_filename.as_deref() == Some(STDOUT_MARK)
        && std::io::stdout().is_terminal()
        && !force_stdout
    {
        display.say(1, "refusing to write to console without -c \n");
        return 1;
    }

    // Pipe-friendly quieting: progress lines would corrupt redirections.
    if output_filename.as_deref() == Some(STDOUT_MARK) && display.level() == 2 {
        display.set_level(1);
    }
    if !single_input && display.level() == 2 {
        display.set_level(1);
    }

    // ── Batch context ────────────────────────────────────────────────────
    let mut ctx = Context::new(in_files.len());
    ctx.determine_has_stdin_input(&in_files);
    ctx.has_stdout_output = output_filename.as_deref() == Some(STDOUT_MARK);

    if prefs.patch_from && !single_input {
        display.say(1, "zstdr: --patch-from can only be used with a single input file \n");
        return 1;
    }

    // ── Dispatch ─────────────────────────────────────────────────────────
    let status = if op_mode == OpMode::Decompress {
        if !single_input || out_dir.is_some() || out_mirror.is_some() {
            // Explicit -o routes the whole batch into one output.
            let out_file = output_filename.as_deref().filter(|_| out_dir.is_none() && out_mirror.is_none());
            match decompress_multiple_filenames(
                &mut ctx,
                &mut prefs,
                &display,
                &in_files,
                out_mirror.as_deref(),
                out_dir.as_deref(),
                out_file,
                dict_filename.as_deref(),
            ) {
                Ok(0) => 0,
                Ok(_) => 1,
                Err(e) => {
                    display.say(1, &format!("zstdr: {} \n", e));
                    1
                }
            }
        } else {
            let dst = output_filename.as_deref().unwrap_or(NUL_MARK);
            match decompress_filename(
                &mut ctx,
                &mut prefs,
                &display,
                dst,
                &first_input,
                dict_filename.as_deref(),
            ) {
                Ok(()) => 0,
                Err(e) => {
                    display.say(1, &format!("zstdr: {}: {} \n", first_input, e));
                    1
                }
            }
        }
    } else {
        // Compression.
        if !single_input || out_dir.is_some() || out_mirror.is_some() {
            let out_file = output_filename.as_deref().filter(|_| out_dir.is_none() && out_mirror.is_none());
            let suffix = format_suffix(&prefs);
            match compress_multiple_filenames(
                &mut ctx,
                &mut prefs,
                &display,
                &in_files,
                out_mirror.as_deref(),
                out_dir.as_deref(),
                out_file,
                suffix,
                dict_filename.as_deref(),
                level,
                params,
            ) {
                Ok(0) => 0,
                Ok(_) => 1,
                Err(e) => {
                    display.say(1, &format!("zstdr: {} \n", e));
                    1
                }
            }
        } else {
            let dst = output_filename.as_deref().unwrap_or(STDOUT_MARK);
            match compress_filename(
                &mut ctx,
                &mut prefs,
                &display,
                dst,
                &first_input,
                dict_filename.as_deref(),
                level,
                params,
            ) {
                Ok(()) => 0,
                Err(e) => {
                    display.say(1, &format!("zstdr: {}: {} \n", first_input, e));
                    1
                }
            }
        }
    };

    status
}

fn main() {
    let argv0 = std::env::args().next().unwrap_or_else(|| "zstdr".to_owned());
    let init = detect_alias(&argv0);

    let args = match parse_args(init) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("zstdr: {}", e);
            std::process::exit(1);
        }
    };

    if args.exit_early {
        std::process::exit(0);
    }

    zstdr::io::guard::add_abort_handlers();

    std::process::exit(run(args));
}
