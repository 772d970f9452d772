//! Command-line front end: argument parsing and operation selection.

pub mod args;
pub mod op_mode;
