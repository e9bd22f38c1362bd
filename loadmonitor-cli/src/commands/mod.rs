//! CLI subcommands.

pub mod common;
pub mod scan;
pub mod serve;
pub mod watch;
