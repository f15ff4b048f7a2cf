//! Benchmark parameter types.

use std::fmt;

/// Shape of a synthetic network benchmark case.
#[derive(Clone, Copy, Debug)]
pub struct NetworkBenchParams {
    /// Levels below the outlet pipe.
    pub depth: usize,
    /// Pipes draining into every non-leaf pipe.
    pub branching: usize,
    /// Total number of pipes.
    pub pipes: usize,
}

impl fmt::Display for NetworkBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d={},b={},n={}", self.depth, self.branching, self.pipes)
    }
}
