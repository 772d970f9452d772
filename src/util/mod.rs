//! Filesystem helpers shared by the I/O engine.

mod file_size;
mod file_status;

pub use file_size::{file_size, largest_file_size};
pub use file_status::{
    is_block_device, is_directory, is_fifo, is_regular_file, is_same_file, set_file_stat,
};
