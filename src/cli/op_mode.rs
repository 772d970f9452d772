//! Operation selection.

use crate::io::paths;

/// What the invocation asks the engine to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpMode {
    /// Pick from the program name and input suffixes.
    Auto,
    Compress,
    Decompress,
    /// Decompress and discard the output.
    Test,
}

/// Initial state inferred from the program name: `unzstdr` implies
/// decompression, `zstdrcat` additionally forces stdout output.
#[derive(Clone, Copy, Debug, Default)]
pub struct CliInit {
    pub decompress: bool,
    pub force_stdout: bool,
}

/// Inspects `argv[0]` for the conventional alias names.
pub fn detect_alias(argv0: &str) -> CliInit {
    let exe = paths::extract_filename(argv0);
    let mut init = CliInit::default();
    if exe.contains("cat") {
        init.decompress = true;
        init.force_stdout = true;
    } else if exe.starts_with("un") {
        init.decompress = true;
    }
    init
}

/// Resolves `Auto` by looking at the input name: a recognized compressed
/// suffix means decompress, anything else means compress.
pub fn determine_op_mode(input_filename: &str) -> OpMode {
    if paths::derive_decompressed_name(input_filename, None).is_some() {
        OpMode::Decompress
    } else {
        OpMode::Compress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_detection() {
        assert!(detect_alias("/usr/bin/unzstdr").decompress);
        assert!(!detect_alias("/usr/bin/unzstdr").force_stdout);
        let cat = detect_alias("zstdrcat");
        assert!(cat.decompress && cat.force_stdout);
        let plain = detect_alias("zstdr");
        assert!(!plain.decompress && !plain.force_stdout);
    }

    #[test]
    fn op_mode_from_suffix() {
        assert_eq!(determine_op_mode("a.zst"), OpMode::Decompress);
        assert_eq!(determine_op_mode("a.gz"), OpMode::Decompress);
        assert_eq!(determine_op_mode("a.txt"), OpMode::Compress);
    }
}
