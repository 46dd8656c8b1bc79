//! Command implementations for the ftpl CLI
//!
//! Each command module handles the CLI interface and delegates to
//! ftpl-core for the actual work.

pub mod compile;
pub mod resolve;
pub mod watch;
