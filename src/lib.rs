//! zstdr is a zstd-style file compression tool.
//!
//! The crate is organized the way the binary uses it:
//!
//! - [`codec`]: RAII binding over the zstd streaming library;
//! - [`io`]: the file engine (streaming compression/decompression,
//!   multi-format dispatch, sparse output, destination lifecycle);
//! - [`cli`]: argument parsing and operation selection;
//! - [`config`] / [`util`]: constants and filesystem helpers.

pub mod cli;
pub mod codec;
pub mod config;
pub mod io;
pub mod util;

pub use io::{
    compress_filename, compress_multiple_filenames, decompress_filename,
    decompress_multiple_filenames, CompressionFormat, Context, Display, Prefs,
    ProgressSetting, SparseMode,
};
