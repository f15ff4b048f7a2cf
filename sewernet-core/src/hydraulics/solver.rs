//! Bisection root finding on the uniform-flow discharge relation.

use std::f64::consts::TAU;

use tracing::trace;

use crate::{
    error::{ConfigError, SolverError},
    hydraulics::section::{CrossSection, DEFAULT_MAX_THETA, MIN_FILL_PARAMETER, MIN_MAX_THETA},
};

/// Smallest section size the sizing bracket starts from, in metres.
pub const MIN_SECTION_SIZE: f64 = 0.01;
/// Largest section size the sizing bracket extends to, in metres.
pub const MAX_SECTION_SIZE: f64 = 20.0;

/// Default absolute discharge accuracy in m³/s.
pub const DEFAULT_ACCURACY: f64 = 1e-5;
/// Default bisection iteration cap.
pub const DEFAULT_MAX_ITERATIONS: u32 = 40;

/// Validated numeric settings shared by every bisection.
///
/// # Examples
/// ```
/// use sewernet_core::SolverParams;
///
/// let params = SolverParams::new(1e-4, 50, 5.0)?;
/// assert_eq!(params.max_iterations(), 50);
/// assert!(SolverParams::new(1e-4, 2, 5.0).is_err());
/// # Ok::<(), sewernet_core::ConfigError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverParams {
    accuracy: f64,
    max_iterations: u32,
    max_theta: f64,
}

impl SolverParams {
    /// Validates and stores the solver settings.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] for a non-positive accuracy,
    /// [`ConfigError::IterationCapOutOfRange`] for a cap outside `[3, 1000]`,
    /// and [`ConfigError::FillAngleOutOfRange`] for an angle outside `[π, 2π]`.
    pub fn new(accuracy: f64, max_iterations: u32, max_theta: f64) -> Result<Self, ConfigError> {
        if !(accuracy.is_finite() && accuracy > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "accuracy",
                value: accuracy,
                expected: "a positive finite discharge",
            });
        }
        if !(3..=1000).contains(&max_iterations) {
            return Err(ConfigError::IterationCapOutOfRange {
                got: max_iterations,
            });
        }
        if !(MIN_MAX_THETA..=TAU).contains(&max_theta) {
            return Err(ConfigError::FillAngleOutOfRange { got: max_theta });
        }
        Ok(Self {
            accuracy,
            max_iterations,
            max_theta,
        })
    }

    /// Absolute discharge accuracy in m³/s.
    #[must_use]
    pub const fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Maximum number of bisection steps.
    #[must_use]
    pub const fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Maximum fill angle for circular pipes in radians.
    #[must_use]
    pub const fn max_theta(&self) -> f64 {
        self.max_theta
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            accuracy: DEFAULT_ACCURACY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_theta: DEFAULT_MAX_THETA,
        }
    }
}

/// Result of one bisection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bisection {
    /// Best estimate of the free variable.
    pub value: f64,
    /// Residual `f(value)`; computed minus target discharge.
    pub residual: f64,
    /// Number of midpoints evaluated.
    pub iterations: u32,
    /// Whether `|residual|` met the accuracy.
    pub converged: bool,
}

/// Runs bisection on an increasing `residual` over `[lower, upper]`.
///
/// The returned value is the evaluated point with the smallest absolute
/// residual, so raising the iteration cap never worsens the answer.
///
/// # Errors
/// Returns [`SolverError::DegenerateBracket`] when the residual does not
/// change sign across the interval or evaluates to a non-finite value.
pub fn bisect<F>(
    residual: F,
    lower: f64,
    upper: f64,
    params: &SolverParams,
) -> Result<Bisection, SolverError>
where
    F: Fn(f64) -> f64,
{
    let residual_lower = residual(lower);
    let residual_upper = residual(upper);
    if !(residual_lower.is_finite() && residual_upper.is_finite())
        || residual_lower > 0.0
        || residual_upper < 0.0
    {
        return Err(SolverError::DegenerateBracket {
            lower,
            upper,
            residual_lower,
            residual_upper,
        });
    }

    let mut best = if residual_lower.abs() <= residual_upper.abs() {
        (lower, residual_lower)
    } else {
        (upper, residual_upper)
    };
    let accuracy = params.accuracy();
    let (mut low, mut high) = (lower, upper);
    let mut iterations = 0;
    while best.1.abs() > accuracy && iterations < params.max_iterations() {
        let mid = low.midpoint(high);
        if mid <= low || mid >= high {
            break;
        }
        iterations += 1;
        let value = residual(mid);
        if value.abs() < best.1.abs() {
            best = (mid, value);
        }
        if value < 0.0 {
            low = mid;
        } else {
            high = mid;
        }
    }
    record_iterations(iterations);
    trace!(
        value = best.0,
        residual = best.1,
        iterations,
        "bisection finished"
    );
    Ok(Bisection {
        value: best.0,
        residual: best.1,
        iterations,
        converged: best.1.abs() <= accuracy,
    })
}

#[cfg(feature = "metrics")]
fn record_iterations(iterations: u32) {
    metrics::counter!("sewernet_bisection_iterations").increment(u64::from(iterations));
}

#[cfg(not(feature = "metrics"))]
fn record_iterations(_iterations: u32) {}

/// Per-pipe inputs shared by the sizing and fill solvers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowConditions {
    /// Section geometry.
    pub section: CrossSection,
    /// Gauckler–Strickler roughness.
    pub ks: f64,
    /// Pipe slope.
    pub slope: f64,
}

impl FlowConditions {
    fn check(&self, discharge: f64) -> Result<(), SolverError> {
        if !(discharge.is_finite() && discharge > 0.0) {
            return Err(SolverError::NonPositiveDischarge { discharge });
        }
        if !(self.slope.is_finite() && self.slope > 0.0) {
            return Err(SolverError::NonPositiveSlope { slope: self.slope });
        }
        Ok(())
    }
}

/// Bisection-based solver for one pipe at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HydraulicSolver {
    params: SolverParams,
}

impl HydraulicSolver {
    /// Creates a solver with validated settings.
    #[must_use]
    pub const fn new(params: SolverParams) -> Self {
        Self { params }
    }

    /// Solver settings.
    #[must_use]
    pub const fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Finds the section size conveying `discharge` at the fill parameter
    /// `design_parameter`.
    ///
    /// # Errors
    /// Returns [`SolverError::NonPositiveDischarge`] or
    /// [`SolverError::NonPositiveSlope`] for invalid inputs and
    /// [`SolverError::DegenerateBracket`] when no size within
    /// [`MIN_SECTION_SIZE`]..=[`MAX_SECTION_SIZE`] matches the discharge.
    ///
    /// # Examples
    /// ```
    /// use sewernet_core::{CrossSection, FlowConditions, HydraulicSolver};
    ///
    /// let solver = HydraulicSolver::default();
    /// let flow = FlowConditions { section: CrossSection::Circular, ks: 75.0, slope: 0.01 };
    /// let sized = solver.size_for_discharge(&flow, 0.25, std::f64::consts::PI)?;
    /// assert!(sized.converged);
    /// # Ok::<(), sewernet_core::SolverError>(())
    /// ```
    pub fn size_for_discharge(
        &self,
        flow: &FlowConditions,
        discharge: f64,
        design_parameter: f64,
    ) -> Result<Bisection, SolverError> {
        flow.check(discharge)?;
        bisect(
            |size| flow.section.discharge(flow.ks, flow.slope, size, design_parameter) - discharge,
            MIN_SECTION_SIZE,
            MAX_SECTION_SIZE,
            &self.params,
        )
    }

    /// Finds the fill parameter at which a section of `size` conveys
    /// `discharge`.
    ///
    /// # Errors
    /// Returns [`SolverError::NonPositiveSize`] for a non-positive size, the
    /// input errors of [`Self::size_for_discharge`], and
    /// [`SolverError::DegenerateBracket`] when the discharge exceeds the
    /// section capacity.
    pub fn fill_for_discharge(
        &self,
        flow: &FlowConditions,
        size: f64,
        discharge: f64,
    ) -> Result<Bisection, SolverError> {
        if !(size.is_finite() && size > 0.0) {
            return Err(SolverError::NonPositiveSize { size });
        }
        flow.check(discharge)?;
        bisect(
            |parameter| flow.section.discharge(flow.ks, flow.slope, size, parameter) - discharge,
            MIN_FILL_PARAMETER,
            flow.section.max_parameter(self.params.max_theta()),
            &self.params,
        )
    }

    /// Discharge of a section of `size` at its largest admissible fill.
    #[must_use]
    pub fn capacity(&self, flow: &FlowConditions, size: f64) -> f64 {
        flow.section
            .capacity(flow.ks, flow.slope, size, self.params.max_theta())
    }
}
