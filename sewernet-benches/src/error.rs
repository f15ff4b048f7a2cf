//! Benchmark setup error type.
//!
//! Aggregates the failures that may arise while preparing benchmark
//! networks so setup functions can propagate them with `?`.

use sewernet_core::{ConfigError, SewerNetError};

use crate::network::SyntheticError;

/// Errors that may occur during benchmark setup.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Synthetic network generation failed.
    #[error("synthetic network generation failed: {0}")]
    Synthetic(#[from] SyntheticError),
    /// Run parameters were rejected.
    #[error("invalid run parameters: {0}")]
    Config(#[from] ConfigError),
    /// A preparatory engine run failed.
    #[error("engine run failed: {0}")]
    Engine(#[from] SewerNetError),
}
