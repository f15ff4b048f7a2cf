//! Pipe records: geometry, physical attributes, and computed hydraulic outputs.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identifier of a pipe, unique within one network and always at least 1.
///
/// # Examples
/// ```
/// use sewernet_core::PipeId;
///
/// let id = PipeId::new(7)?;
/// assert_eq!(id.get(), 7);
/// assert!(PipeId::new(0).is_err());
/// # Ok::<(), sewernet_core::ConfigError>(())
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub struct PipeId(u32);

impl PipeId {
    /// Creates an identifier, rejecting zero.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidPipeId`] when `raw` is zero.
    pub const fn new(raw: u32) -> Result<Self, ConfigError> {
        if raw == 0 {
            return Err(ConfigError::InvalidPipeId { raw });
        }
        Ok(Self(raw))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for PipeId {
    type Error = ConfigError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<PipeId> for u32 {
    fn from(id: PipeId) -> Self {
        id.0
    }
}

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Planar coordinate in metres.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coordinate {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
}

impl Coordinate {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Whether `other` lies within `tolerance` metres of this point.
    #[must_use]
    pub fn coincides_with(self, other: Self, tolerance: f64) -> bool {
        self.distance(other) <= tolerance
    }
}

/// Cross-section shape of a pipe.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SectionType {
    /// Closed circular pipe sized by diameter.
    #[default]
    Circular,
    /// Open rectangular channel sized by height.
    Rectangular,
    /// Open trapezoidal channel with 1:1 side slopes sized by height.
    Trapezoidal,
}

impl SectionType {
    /// Stable lowercase name used in tables and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Circular => "circular",
            Self::Rectangular => "rectangular",
            Self::Trapezoidal => "trapezoidal",
        }
    }

    /// Whether the section is an open channel.
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Circular)
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SectionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "circular" | "circ" | "1" => Ok(Self::Circular),
            "rectangular" | "rect" | "2" => Ok(Self::Rectangular),
            "trapezoidal" | "trap" | "3" => Ok(Self::Trapezoidal),
            other => Err(format!("unknown section type `{other}`")),
        }
    }
}

/// Where a pipe discharges.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DrainTarget {
    /// The network outlet (target 0).
    Outlet,
    /// Another pipe of the same network.
    Pipe(PipeId),
}

impl DrainTarget {
    /// Raw representation with 0 denoting the outlet.
    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::Outlet => 0,
            Self::Pipe(id) => id.get(),
        }
    }
}

impl From<u32> for DrainTarget {
    fn from(raw: u32) -> Self {
        match PipeId::new(raw) {
            Ok(id) => Self::Pipe(id),
            Err(_) => Self::Outlet,
        }
    }
}

impl fmt::Display for DrainTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw())
    }
}

/// Physical inputs of a pipe.
///
/// Lengths and elevations are in metres, areas in hectares, and the residence
/// time in minutes. `diameter` is required for verification and ignored by
/// design, which sizes the pipe itself.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipeAttributes {
    /// Pipe length in metres.
    pub length: f64,
    /// Ground elevation at the upstream end.
    pub initial_elevation: f64,
    /// Ground elevation at the downstream end.
    pub final_elevation: f64,
    /// Local drained area in hectares.
    pub drain_area: f64,
    /// Runoff coefficient in `[0, 1]`.
    pub runoff_coefficient: f64,
    /// Gauckler–Strickler roughness coefficient in m^(1/3)/s.
    pub ks: f64,
    /// Minimum admissible pipe slope.
    pub minimum_slope: f64,
    /// Cross-section shape.
    pub section: SectionType,
    /// Average residence time of the local sub-basin in minutes.
    pub average_residence_time: f64,
    /// Average slope of the local sub-basin.
    pub average_slope: f64,
    /// Existing section size in metres (diameter or channel height).
    pub diameter: Option<f64>,
    /// Index of the rainfall column feeding this pipe.
    pub rain_zone: usize,
}

impl Default for PipeAttributes {
    fn default() -> Self {
        Self {
            length: 100.0,
            initial_elevation: 0.0,
            final_elevation: 0.0,
            drain_area: 1.0,
            runoff_coefficient: 0.5,
            ks: 75.0,
            minimum_slope: 0.005,
            section: SectionType::Circular,
            average_residence_time: 5.0,
            average_slope: 0.01,
            diameter: None,
            rain_zone: 0,
        }
    }
}

impl PipeAttributes {
    /// Checks every attribute against its admissible range.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidAttribute`] naming the first offending
    /// attribute.
    pub fn validate(&self, pipe: PipeId) -> Result<(), ConfigError> {
        let invalid = |attribute: &'static str, value: f64| ConfigError::InvalidAttribute {
            pipe,
            attribute,
            value,
        };
        let positive = [
            ("length", self.length),
            ("ks", self.ks),
            ("minimum_slope", self.minimum_slope),
        ];
        for (attribute, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(attribute, value));
            }
        }
        let non_negative = [
            ("drain_area", self.drain_area),
            ("average_residence_time", self.average_residence_time),
            ("average_slope", self.average_slope),
        ];
        for (attribute, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(attribute, value));
            }
        }
        for (attribute, value) in [
            ("initial_elevation", self.initial_elevation),
            ("final_elevation", self.final_elevation),
        ] {
            if !value.is_finite() {
                return Err(invalid(attribute, value));
            }
        }
        if !(0.0..=1.0).contains(&self.runoff_coefficient) {
            return Err(invalid("runoff_coefficient", self.runoff_coefficient));
        }
        if let Some(diameter) = self.diameter
            && !(diameter.is_finite() && diameter > 0.0)
        {
            return Err(invalid("diameter", diameter));
        }
        Ok(())
    }
}

/// Hydraulic quantities computed for a pipe by a design or verification run.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HydraulicOutputs {
    /// Peak discharge in m³/s.
    pub discharge: f64,
    /// Discharge per drained hectare in l/(s·ha).
    pub specific_discharge: f64,
    /// Concentration time at the downstream end in minutes.
    pub residence_time: f64,
    /// Critical rain duration in minutes.
    pub rain_duration: f64,
    /// Minutes from rain start to the peak discharge.
    pub peak_time: f64,
    /// Mean flow speed in m/s.
    pub mean_speed: f64,
    /// Adopted pipe slope.
    pub pipe_slope: f64,
    /// Adopted section size in metres.
    pub diameter: f64,
    /// Fill degree: water depth over section size.
    pub fill_degree: f64,
    /// Invert depth below ground at the upstream end.
    pub depth_initial: f64,
    /// Invert depth below ground at the downstream end.
    pub depth_final: f64,
    /// Free-surface elevation at the upstream end.
    pub free_surface_initial: f64,
    /// Free-surface elevation at the downstream end.
    pub free_surface_final: f64,
    /// Invert elevation at the upstream end.
    pub invert_initial: f64,
    /// Invert elevation at the downstream end.
    pub invert_final: f64,
    /// Total drained area upstream of and including this pipe, in hectares.
    pub total_subnet_area: f64,
    /// Area-weighted mean flow-path length of the subnet.
    pub mean_length_subnet: f64,
    /// Area-weighted variance of the subnet flow-path length.
    pub variance_length_subnet: f64,
}

/// One conduit of the network.
///
/// Structure (identifier, endpoints, drain target) is fixed once the network
/// has been assembled; runners only write to [`PipeRecord::outputs`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipeRecord {
    id: PipeId,
    start: Coordinate,
    end: Coordinate,
    drains_to: Option<DrainTarget>,
    #[cfg_attr(feature = "serde", serde(skip))]
    drain_index: Option<usize>,
    /// Physical inputs.
    pub attributes: PipeAttributes,
    /// Values written by the last run.
    pub outputs: HydraulicOutputs,
}

impl PipeRecord {
    /// Creates a pipe between `start` and `end` with no drain target yet.
    ///
    /// # Examples
    /// ```
    /// use sewernet_core::{Coordinate, PipeAttributes, PipeId, PipeRecord};
    ///
    /// let pipe = PipeRecord::new(
    ///     PipeId::new(1)?,
    ///     Coordinate::new(0.0, 0.0),
    ///     Coordinate::new(100.0, 0.0),
    ///     PipeAttributes::default(),
    /// );
    /// assert!(pipe.drains_to().is_none());
    /// # Ok::<(), sewernet_core::ConfigError>(())
    /// ```
    #[must_use]
    pub fn new(id: PipeId, start: Coordinate, end: Coordinate, attributes: PipeAttributes) -> Self {
        Self {
            id,
            start,
            end,
            drains_to: None,
            drain_index: None,
            attributes,
            outputs: HydraulicOutputs::default(),
        }
    }

    /// Records an explicit drain target, bypassing geometric matching.
    #[must_use]
    pub const fn with_drain_target(mut self, target: DrainTarget) -> Self {
        self.drains_to = Some(target);
        self
    }

    /// Pipe identifier.
    #[must_use]
    pub const fn id(&self) -> PipeId {
        self.id
    }

    /// Upstream endpoint.
    #[must_use]
    pub const fn start(&self) -> Coordinate {
        self.start
    }

    /// Downstream endpoint.
    #[must_use]
    pub const fn end(&self) -> Coordinate {
        self.end
    }

    /// Drain target, if one has been assigned.
    #[must_use]
    pub const fn drains_to(&self) -> Option<DrainTarget> {
        self.drains_to
    }

    /// Position of the receiving pipe in the network array, if resolved.
    #[must_use]
    pub const fn drain_index(&self) -> Option<usize> {
        self.drain_index
    }

    pub(crate) const fn set_drain(&mut self, target: DrainTarget, index: Option<usize>) {
        self.drains_to = Some(target);
        self.drain_index = index;
    }

    pub(crate) const fn clear_drain(&mut self) {
        self.drains_to = None;
        self.drain_index = None;
    }

    /// Whether this pipe discharges into the outlet.
    #[must_use]
    pub fn is_outlet(&self) -> bool {
        self.drains_to == Some(DrainTarget::Outlet)
    }
}
