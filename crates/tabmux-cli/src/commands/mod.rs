//! CLI subcommand implementations.

pub mod attach;
pub mod url;
