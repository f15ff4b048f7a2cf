//! Cross-section geometry and Gauckler–Strickler conveyance.
//!
//! Every section is described by a *size* (diameter for circular pipes,
//! height for open channels) and a *fill parameter*: the wetted angle θ in
//! radians for circular pipes and the depth fraction for open channels.

use std::f64::consts::{PI, TAU};

use crate::pipe::SectionType;

/// Smallest fill parameter the solver will evaluate.
pub(crate) const MIN_FILL_PARAMETER: f64 = 1e-6;

/// Geometry of one cross-section family.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CrossSection {
    /// Circular pipe; the fill parameter is the wetted angle θ.
    Circular,
    /// Rectangular channel whose base is `base_ratio` times its height.
    Rectangular {
        /// Base width over section height.
        base_ratio: f64,
    },
    /// Trapezoidal channel with 1:1 side slopes and base `base_ratio`·height.
    Trapezoidal {
        /// Bottom width over section height.
        base_ratio: f64,
    },
}

impl CrossSection {
    /// Builds the geometry for `section` with the given base ratio.
    #[must_use]
    pub const fn from_type(section: SectionType, base_ratio: f64) -> Self {
        match section {
            SectionType::Circular => Self::Circular,
            SectionType::Rectangular => Self::Rectangular { base_ratio },
            SectionType::Trapezoidal => Self::Trapezoidal { base_ratio },
        }
    }

    /// Upper bound of the fill parameter used when sizing or solving.
    ///
    /// Circular pipes stop at `max_theta`; open channels at full height.
    #[must_use]
    pub const fn max_parameter(self, max_theta: f64) -> f64 {
        match self {
            Self::Circular => max_theta,
            Self::Rectangular { .. } | Self::Trapezoidal { .. } => 1.0,
        }
    }

    /// Fill parameter of a completely full section.
    #[must_use]
    pub const fn full_parameter(self) -> f64 {
        match self {
            Self::Circular => TAU,
            Self::Rectangular { .. } | Self::Trapezoidal { .. } => 1.0,
        }
    }

    /// Converts a fill degree (depth over size) to the fill parameter.
    ///
    /// # Examples
    /// ```
    /// use sewernet_core::CrossSection;
    ///
    /// let theta = CrossSection::Circular.parameter_for_fill(0.5);
    /// assert!((theta - std::f64::consts::PI).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn parameter_for_fill(self, fill: f64) -> f64 {
        let fill = fill.clamp(0.0, 1.0);
        match self {
            Self::Circular => 2.0 * (1.0 - 2.0 * fill).acos(),
            Self::Rectangular { .. } | Self::Trapezoidal { .. } => fill,
        }
    }

    /// Converts a fill parameter to the fill degree.
    #[must_use]
    pub fn fill_for_parameter(self, parameter: f64) -> f64 {
        match self {
            Self::Circular => (1.0 - (parameter / 2.0).cos()) / 2.0,
            Self::Rectangular { .. } | Self::Trapezoidal { .. } => parameter,
        }
    }

    /// Wetted area in m² for a section of `size` metres.
    #[must_use]
    pub fn wetted_area(self, size: f64, parameter: f64) -> f64 {
        match self {
            Self::Circular => size * size / 8.0 * (parameter - parameter.sin()),
            Self::Rectangular { base_ratio } => base_ratio * size * parameter * size,
            Self::Trapezoidal { base_ratio } => {
                let depth = parameter * size;
                (base_ratio * size + depth) * depth
            }
        }
    }

    /// Wetted perimeter in metres.
    #[must_use]
    pub fn wetted_perimeter(self, size: f64, parameter: f64) -> f64 {
        match self {
            Self::Circular => size * parameter / 2.0,
            Self::Rectangular { base_ratio } => base_ratio * size + 2.0 * parameter * size,
            Self::Trapezoidal { base_ratio } => {
                base_ratio * size + 2.0 * std::f64::consts::SQRT_2 * parameter * size
            }
        }
    }

    /// Hydraulic radius in metres.
    #[must_use]
    pub fn hydraulic_radius(self, size: f64, parameter: f64) -> f64 {
        let perimeter = self.wetted_perimeter(size, parameter);
        if perimeter <= 0.0 {
            return 0.0;
        }
        self.wetted_area(size, parameter) / perimeter
    }

    /// Uniform-flow discharge in m³/s.
    ///
    /// # Examples
    /// ```
    /// use sewernet_core::CrossSection;
    ///
    /// let half = CrossSection::Circular.discharge(75.0, 0.01, 0.5, std::f64::consts::PI);
    /// assert!(half > 0.0);
    /// ```
    #[must_use]
    pub fn discharge(self, ks: f64, slope: f64, size: f64, parameter: f64) -> f64 {
        let area = self.wetted_area(size, parameter);
        let radius = self.hydraulic_radius(size, parameter);
        ks * area * radius.powf(2.0 / 3.0) * slope.sqrt()
    }

    /// Discharge at the largest admissible fill parameter.
    #[must_use]
    pub fn capacity(self, ks: f64, slope: f64, size: f64, max_theta: f64) -> f64 {
        self.discharge(ks, slope, size, self.max_parameter(max_theta))
    }

    /// Area of the full section in m².
    #[must_use]
    pub fn full_area(self, size: f64) -> f64 {
        self.wetted_area(size, self.full_parameter())
    }
}

/// Default maximum fill angle for circular pipes, close to the angle of
/// maximum conveyance.
pub const DEFAULT_MAX_THETA: f64 = 5.28;

/// Smallest admissible maximum fill angle.
pub const MIN_MAX_THETA: f64 = PI;
