//! File-level compression/decompression engine.
//!
//! The orchestration layer lives in [`compress`] and [`decompress`]; the
//! remaining modules are the services they build on: preferences and batch
//! context, leveled display, the interrupt artifact guard, path derivation,
//! dictionary loading, sparse output, and raw file handling.

pub mod compress;
pub mod compress_other;
pub mod decompress;
pub mod decompress_other;
pub mod dict;
pub mod display;
pub mod file_io;
pub mod guard;
pub mod paths;
pub mod prefs;
pub mod sparse;

pub use compress::{compress_filename, compress_multiple_filenames, CompressResources};
pub use decompress::{
    decompress_filename, decompress_multiple_filenames, DecompressResources,
};
pub use display::{Display, ProgressSetting};
pub use file_io::{NUL_MARK, STDIN_MARK, STDOUT_MARK};
pub use prefs::{CompressionFormat, Context, Prefs, SparseMode};
