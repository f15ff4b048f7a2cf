//! Support library for the sewernet CLI binary.
//!
//! Exposes command parsing, execution, and rendering so tests can drive the
//! design and verification pipelines without spawning a subprocess.

pub mod cli;
pub mod logging;
