//! Builder utilities for configuring a [`SewerNet`].
//!
//! Collects the topology and solver settings and validates them before any
//! graph is built.

use crate::{
    Result,
    hydraulics::{DEFAULT_ACCURACY, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_THETA, SolverParams},
    network::NetworkTopologyBuilder,
    params::DEFAULT_JUNCTION_LIMIT,
    pipe::PipeId,
    sewernet::SewerNet,
};

/// Builder for [`SewerNet`].
///
/// Without an outlet the records' declared drain targets are used; with one
/// the topology is reconstructed from endpoint geometry.
///
/// # Examples
/// ```
/// use sewernet_core::{PipeId, SewerNetBuilder};
///
/// let engine = SewerNetBuilder::new()
///     .with_junction_limit(4)
///     .with_outlet(PipeId::new(12)?)
///     .build()?;
/// assert_eq!(engine.junction_limit(), 4);
/// assert_eq!(engine.outlet(), Some(PipeId::new(12)?));
/// # Ok::<(), sewernet_core::SewerNetError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SewerNetBuilder {
    junction_limit: usize,
    outlet: Option<PipeId>,
    accuracy: f64,
    max_iterations: u32,
    max_theta: f64,
}

impl Default for SewerNetBuilder {
    fn default() -> Self {
        Self {
            junction_limit: DEFAULT_JUNCTION_LIMIT,
            outlet: None,
            accuracy: DEFAULT_ACCURACY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_theta: DEFAULT_MAX_THETA,
        }
    }
}

impl SewerNetBuilder {
    /// Creates a builder populated with default parameters.
    ///
    /// # Examples
    /// ```
    /// use sewernet_core::SewerNetBuilder;
    ///
    /// let builder = SewerNetBuilder::new();
    /// assert_eq!(builder.junction_limit(), 6);
    /// assert!(builder.outlet().is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the maximum number of pipes joining at one point.
    #[must_use]
    pub fn with_junction_limit(mut self, limit: usize) -> Self {
        self.junction_limit = limit;
        self
    }

    /// Returns the configured junction limit.
    #[must_use]
    pub fn junction_limit(&self) -> usize {
        self.junction_limit
    }

    /// Reconstructs the topology geometrically from `outlet`.
    #[must_use]
    pub fn with_outlet(mut self, outlet: PipeId) -> Self {
        self.outlet = Some(outlet);
        self
    }

    /// Returns the configured outlet, if any.
    #[must_use]
    pub fn outlet(&self) -> Option<PipeId> {
        self.outlet
    }

    /// Overrides the absolute bisection accuracy in m³/s.
    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Overrides the bisection iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Overrides the maximum fill angle of circular pipes in radians.
    #[must_use]
    pub fn with_max_theta(mut self, theta: f64) -> Self {
        self.max_theta = theta;
        self
    }

    /// Validates the configuration and constructs a [`SewerNet`].
    ///
    /// # Errors
    /// Returns [`crate::ConfigError::JunctionLimitOutOfRange`],
    /// [`crate::ConfigError::IterationCapOutOfRange`],
    /// [`crate::ConfigError::FillAngleOutOfRange`], or
    /// [`crate::ConfigError::InvalidParameter`] for out-of-range settings.
    ///
    /// # Examples
    /// ```
    /// use sewernet_core::{ConfigError, SewerNetBuilder, SewerNetError};
    ///
    /// let err = SewerNetBuilder::new().with_max_iterations(2).build().unwrap_err();
    /// assert!(matches!(
    ///     err,
    ///     SewerNetError::Config(ConfigError::IterationCapOutOfRange { got: 2 })
    /// ));
    /// ```
    pub fn build(self) -> Result<SewerNet> {
        let topology = NetworkTopologyBuilder::new(self.junction_limit)?;
        let solver = SolverParams::new(self.accuracy, self.max_iterations, self.max_theta)?;
        Ok(SewerNet::new(topology, self.outlet, solver))
    }
}
