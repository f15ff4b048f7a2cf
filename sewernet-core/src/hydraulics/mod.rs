//! Hydraulic sections and the bisection solver.

mod section;
mod solver;

pub use section::{CrossSection, DEFAULT_MAX_THETA, MIN_MAX_THETA};
pub use solver::{
    Bisection, DEFAULT_ACCURACY, DEFAULT_MAX_ITERATIONS, FlowConditions, HydraulicSolver,
    MAX_SECTION_SIZE, MIN_SECTION_SIZE, SolverParams, bisect,
};

/// Specific weight of water in N/m³.
pub const WATER_SPECIFIC_WEIGHT: f64 = 9810.0;

/// Bed shear stress in Pa for hydraulic radius `radius` and slope `slope`.
#[must_use]
pub fn bed_shear_stress(radius: f64, slope: f64) -> f64 {
    WATER_SPECIFIC_WEIGHT * radius * slope
}
