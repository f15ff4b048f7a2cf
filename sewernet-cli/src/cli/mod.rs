//! Command-line interface for sewer network design and verification.
//!
//! `design` sizes every pipe of a table for a design storm and `verify`
//! routes observed or synthesized rainfall through a network of known sizes.

mod commands;
mod render;

pub use commands::{
    AlignArg, Cli, CliError, Command, DesignCommand, ExecutionSummary, NetworkArgs, OutputFormat,
    RunSummary, VerifyCommand, run_cli,
};
pub use render::render_summary;

#[cfg(test)]
mod test_helpers;
