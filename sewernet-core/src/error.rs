//! Error types for the sewernet core library.
//!
//! Errors follow the run taxonomy: configuration problems are detected before
//! any graph is built, topology violations after reconstruction, and numeric
//! failures while a pipe is being solved. Non-fatal anomalies are
//! [`crate::Warning`]s and never appear here.

use std::fmt;

use thiserror::Error;

use crate::pipe::PipeId;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// A configuration problem detected before any graph construction.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A numeric parameter fell outside its admissible range.
    #[error("parameter `{name}` must be {expected} (got {value})")]
    InvalidParameter {
        /// Parameter name as exposed by the builder.
        name: &'static str,
        /// Offending value.
        value: f64,
        /// Human-readable admissible range.
        expected: &'static str,
    },
    /// The junction limit lies outside `[1, 6]`.
    #[error("junction limit must lie within [1, 6] (got {got})")]
    JunctionLimitOutOfRange {
        /// The rejected limit.
        got: usize,
    },
    /// The bisection iteration cap lies outside `[3, 1000]`.
    #[error("bisection iteration cap must lie within [3, 1000] (got {got})")]
    IterationCapOutOfRange {
        /// The rejected cap.
        got: u32,
    },
    /// The maximum fill angle is below π or above 2π.
    #[error("maximum fill angle must lie within [π, 2π] radians (got {got})")]
    FillAngleOutOfRange {
        /// The rejected angle in radians.
        got: f64,
    },
    /// The design fill degree implies an angle above the maximum fill angle.
    #[error("design fill degree {fill} needs a fill angle of {angle} rad, above the maximum {max}")]
    DesignFillAboveMaxAngle {
        /// Requested design fill degree.
        fill: f64,
        /// Fill angle implied by `fill`.
        angle: f64,
        /// Configured maximum fill angle.
        max: f64,
    },
    /// Pipe identifiers start at one.
    #[error("pipe identifiers must be at least 1 (got {raw})")]
    InvalidPipeId {
        /// The rejected raw identifier.
        raw: u32,
    },
    /// Two input records share the same identifier.
    #[error("pipe identifier {pipe} appears more than once")]
    DuplicatePipeId {
        /// The duplicated identifier.
        pipe: PipeId,
    },
    /// The input collection is empty.
    #[error("the pipe collection contains no records")]
    EmptyNetwork,
    /// The designated outlet is not among the input records.
    #[error("outlet pipe {outlet} is not present in the input")]
    MissingOutlet {
        /// Requested outlet identifier.
        outlet: PipeId,
    },
    /// A required attribute was not supplied.
    #[error("pipe {pipe} is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// Pipe lacking the attribute.
        pipe: PipeId,
        /// Attribute name.
        attribute: &'static str,
    },
    /// An attribute value is non-finite or outside its admissible range.
    #[error("pipe {pipe} has invalid `{attribute}` = {value}")]
    InvalidAttribute {
        /// Pipe carrying the attribute.
        pipe: PipeId,
        /// Attribute name.
        attribute: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A pipe references a rain zone the series does not provide.
    #[error("pipe {pipe} uses rain zone {zone} but the series has {zones} zone(s)")]
    RainZoneOutOfRange {
        /// Pipe referencing the zone.
        pipe: PipeId,
        /// Requested zone index.
        zone: usize,
        /// Zones available in the series.
        zones: usize,
    },
    /// Neither an observed series nor storm-curve parameters were supplied.
    #[error("no rainfall series: supply observed rain or storm-curve parameters with a time step")]
    MissingRainfall,
    /// The observed rainfall series is malformed.
    #[error("invalid rainfall series: {reason}")]
    InvalidRainfall {
        /// Explanation of the defect.
        reason: String,
    },
    /// The commercial diameter catalog is empty or holds non-positive sizes.
    #[error("commercial diameter catalog is invalid: {reason}")]
    InvalidCatalog {
        /// Explanation of the defect.
        reason: String,
    },
}

define_error_codes! {
    /// Stable codes describing [`ConfigError`] variants.
    enum ConfigErrorCode for ConfigError {
        /// A numeric parameter fell outside its admissible range.
        InvalidParameter => InvalidParameter { .. } => "SEWERNET_CONFIG_INVALID_PARAMETER",
        /// The junction limit lies outside `[1, 6]`.
        JunctionLimitOutOfRange => JunctionLimitOutOfRange { .. } => "SEWERNET_CONFIG_JUNCTION_LIMIT",
        /// The bisection iteration cap lies outside `[3, 1000]`.
        IterationCapOutOfRange => IterationCapOutOfRange { .. } => "SEWERNET_CONFIG_ITERATION_CAP",
        /// The maximum fill angle is out of range.
        FillAngleOutOfRange => FillAngleOutOfRange { .. } => "SEWERNET_CONFIG_FILL_ANGLE",
        /// The design fill degree exceeds the maximum fill angle.
        DesignFillAboveMaxAngle => DesignFillAboveMaxAngle { .. } => "SEWERNET_CONFIG_DESIGN_FILL",
        /// Pipe identifiers start at one.
        InvalidPipeId => InvalidPipeId { .. } => "SEWERNET_CONFIG_INVALID_PIPE_ID",
        /// Two input records share the same identifier.
        DuplicatePipeId => DuplicatePipeId { .. } => "SEWERNET_CONFIG_DUPLICATE_PIPE_ID",
        /// The input collection is empty.
        EmptyNetwork => EmptyNetwork => "SEWERNET_CONFIG_EMPTY_NETWORK",
        /// The designated outlet is not among the input records.
        MissingOutlet => MissingOutlet { .. } => "SEWERNET_CONFIG_MISSING_OUTLET",
        /// A required attribute was not supplied.
        MissingAttribute => MissingAttribute { .. } => "SEWERNET_CONFIG_MISSING_ATTRIBUTE",
        /// An attribute value is invalid.
        InvalidAttribute => InvalidAttribute { .. } => "SEWERNET_CONFIG_INVALID_ATTRIBUTE",
        /// A pipe references a missing rain zone.
        RainZoneOutOfRange => RainZoneOutOfRange { .. } => "SEWERNET_CONFIG_RAIN_ZONE",
        /// No rainfall series could be established.
        MissingRainfall => MissingRainfall => "SEWERNET_CONFIG_MISSING_RAINFALL",
        /// The observed rainfall series is malformed.
        InvalidRainfall => InvalidRainfall { .. } => "SEWERNET_CONFIG_INVALID_RAINFALL",
        /// The diameter catalog is invalid.
        InvalidCatalog => InvalidCatalog { .. } => "SEWERNET_CONFIG_INVALID_CATALOG",
    }
}

/// A broken structural invariant of the drainage graph.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum TopologyViolation {
    /// The pipe was never linked to a downstream pipe or the outlet.
    #[error("pipe {pipe} is not connected to the outlet")]
    Unresolved {
        /// Pipe without a drain target.
        pipe: PipeId,
    },
    /// No pipe drains to the outlet.
    #[error("no reachable outlet: no pipe drains to target 0")]
    MissingOutlet,
    /// More than one pipe drains to the outlet.
    #[error("multiple outlets: pipes {pipes:?} all drain to target 0")]
    MultipleOutlets {
        /// Every pipe claiming to be the outlet.
        pipes: Vec<PipeId>,
    },
    /// The drain target does not name a pipe of this network.
    #[error("pipe {pipe} drains into unknown pipe {target}")]
    DanglingReference {
        /// Pipe holding the reference.
        pipe: PipeId,
        /// Unknown target identifier.
        target: PipeId,
    },
    /// A resolved drain index lies past the end of the pipe array.
    #[error("pipe {pipe} drains into index {index}, beyond the {len} pipe(s) of the network")]
    IndexOutOfBounds {
        /// Pipe holding the index.
        pipe: PipeId,
        /// Offending index.
        index: usize,
        /// Number of pipes.
        len: usize,
    },
    /// The pipe drains into itself.
    #[error("pipe {pipe} drains into itself")]
    SelfLoop {
        /// Offending pipe.
        pipe: PipeId,
    },
    /// Following drain targets from the pipe never reaches the outlet.
    #[error("cycle detected: following drains from pipe {pipe} exceeds {hops} hop(s)")]
    Cycle {
        /// Pipe the traversal started from.
        pipe: PipeId,
        /// Hop bound that was exceeded.
        hops: usize,
    },
    /// More pipes converge on a junction than the limit allows.
    #[error("{upstream} pipe(s) drain into pipe {pipe}, exceeding the junction limit {limit}")]
    JunctionOverflow {
        /// Receiving pipe.
        pipe: PipeId,
        /// Number of upstream pipes.
        upstream: usize,
        /// Configured junction limit.
        limit: usize,
    },
}

define_error_codes! {
    /// Stable codes describing [`TopologyViolation`] variants.
    enum TopologyErrorCode for TopologyViolation {
        /// The pipe was never linked to the network.
        Unresolved => Unresolved { .. } => "SEWERNET_TOPOLOGY_UNRESOLVED",
        /// No pipe drains to the outlet.
        MissingOutlet => MissingOutlet => "SEWERNET_TOPOLOGY_MISSING_OUTLET",
        /// More than one pipe drains to the outlet.
        MultipleOutlets => MultipleOutlets { .. } => "SEWERNET_TOPOLOGY_MULTIPLE_OUTLETS",
        /// The drain target does not name a pipe of this network.
        DanglingReference => DanglingReference { .. } => "SEWERNET_TOPOLOGY_DANGLING_REFERENCE",
        /// A drain index lies past the pipe array.
        IndexOutOfBounds => IndexOutOfBounds { .. } => "SEWERNET_TOPOLOGY_INDEX_OUT_OF_BOUNDS",
        /// The pipe drains into itself.
        SelfLoop => SelfLoop { .. } => "SEWERNET_TOPOLOGY_SELF_LOOP",
        /// A drain path never reaches the outlet.
        Cycle => Cycle { .. } => "SEWERNET_TOPOLOGY_CYCLE",
        /// A junction exceeds the fan-in limit.
        JunctionOverflow => JunctionOverflow { .. } => "SEWERNET_TOPOLOGY_JUNCTION_OVERFLOW",
    }
}

/// A numeric-domain failure raised by the hydraulic solver.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolverError {
    /// The target discharge must be strictly positive.
    #[error("target discharge must be positive (got {discharge} m³/s)")]
    NonPositiveDischarge {
        /// Rejected discharge.
        discharge: f64,
    },
    /// The pipe slope must be strictly positive.
    #[error("pipe slope must be positive (got {slope})")]
    NonPositiveSlope {
        /// Rejected slope.
        slope: f64,
    },
    /// The section size must be strictly positive.
    #[error("section size must be positive (got {size} m)")]
    NonPositiveSize {
        /// Rejected size.
        size: f64,
    },
    /// The residual does not change sign across the search interval.
    #[error(
        "no sign change in [{lower}, {upper}]: residuals {residual_lower} and {residual_upper} m³/s"
    )]
    DegenerateBracket {
        /// Lower end of the interval.
        lower: f64,
        /// Upper end of the interval.
        upper: f64,
        /// Residual at `lower`.
        residual_lower: f64,
        /// Residual at `upper`.
        residual_upper: f64,
    },
}

define_error_codes! {
    /// Stable codes describing [`SolverError`] variants.
    enum SolverErrorCode for SolverError {
        /// The target discharge must be strictly positive.
        NonPositiveDischarge => NonPositiveDischarge { .. } => "SEWERNET_SOLVER_NON_POSITIVE_DISCHARGE",
        /// The pipe slope must be strictly positive.
        NonPositiveSlope => NonPositiveSlope { .. } => "SEWERNET_SOLVER_NON_POSITIVE_SLOPE",
        /// The section size must be strictly positive.
        NonPositiveSize => NonPositiveSize { .. } => "SEWERNET_SOLVER_NON_POSITIVE_SIZE",
        /// The bisection bracket could not be established.
        DegenerateBracket => DegenerateBracket { .. } => "SEWERNET_SOLVER_DEGENERATE_BRACKET",
    }
}

/// Error type produced when building or running a [`crate::SewerNet`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SewerNetError {
    /// Configuration was rejected before the run started.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The reconstructed graph is not a valid drainage tree.
    #[error(transparent)]
    Topology(#[from] TopologyViolation),
    /// The hydraulic solver failed for a pipe.
    #[error("pipe {pipe}: {error}")]
    Numeric {
        /// Pipe being solved when the failure occurred.
        pipe: PipeId,
        #[source]
        /// Underlying solver failure.
        error: SolverError,
    },
}

define_error_codes! {
    /// Stable codes describing [`SewerNetError`] variants.
    enum SewerNetErrorCode for SewerNetError {
        /// Configuration was rejected before the run started.
        Config => Config { .. } => "SEWERNET_CONFIG",
        /// The reconstructed graph is not a valid drainage tree.
        Topology => Topology { .. } => "SEWERNET_TOPOLOGY",
        /// The hydraulic solver failed for a pipe.
        Numeric => Numeric { .. } => "SEWERNET_NUMERIC",
    }
}

impl SewerNetError {
    /// Retrieve the detailed code of the wrapped error.
    ///
    /// # Examples
    /// ```
    /// use sewernet_core::{ConfigError, SewerNetError};
    ///
    /// let err = SewerNetError::from(ConfigError::EmptyNetwork);
    /// assert_eq!(err.code().as_str(), "SEWERNET_CONFIG");
    /// assert_eq!(err.detail_code(), "SEWERNET_CONFIG_EMPTY_NETWORK");
    /// ```
    #[must_use]
    pub const fn detail_code(&self) -> &'static str {
        match self {
            Self::Config(error) => error.code().as_str(),
            Self::Topology(error) => error.code().as_str(),
            Self::Numeric { error, .. } => error.code().as_str(),
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, SewerNetError>;
