//! Validated run configuration for design and verification.
//!
//! Every range check happens in a `build()` call, so an invalid value is a
//! [`ConfigError`] raised before any graph is constructed.

use chrono::{DateTime, Utc};

use crate::{error::ConfigError, rainfall::RainfallSeries, rainfall::StormCurve};

/// Default junction limit.
pub const DEFAULT_JUNCTION_LIMIT: usize = 6;
/// Distance under which two endpoints are considered coincident, in metres.
pub const ENDPOINT_TOLERANCE: f64 = 0.1;
/// Default ratio between wave celerity and mean flow speed.
pub const DEFAULT_CELERITY_FACTOR: f64 = 1.2;
/// Default relative tolerance of the discharge/speed fixed point.
pub const DEFAULT_EPSILON: f64 = 1e-3;
/// Default minimum fill degree.
pub const DEFAULT_MIN_FILL: f64 = 0.01;
/// Default minimum discharge in m³/s.
pub const DEFAULT_MIN_DISCHARGE: f64 = 1e-3;
/// Default exponent of the drained area in the access time.
pub const DEFAULT_AREA_EXPONENT: f64 = 0.3;
/// Default exponent γ of the basin slope in the access time.
pub const DEFAULT_SLOPE_EXPONENT: f64 = 0.4;
/// Default commercial-size tolerance.
pub const DEFAULT_DIAMETER_TOLERANCE: f64 = 0.07;
/// Default minimum cover above circular pipes in metres.
pub const DEFAULT_MINIMUM_DEPTH: f64 = 1.2;
/// Default freeboard of open channels in metres.
pub const DEFAULT_FREEBOARD: f64 = 0.5;
/// Default open-channel base over height.
pub const DEFAULT_BASE_RATIO: f64 = 1.0;
/// Default shortest rain duration in minutes.
pub const DEFAULT_TP_MIN: f64 = 5.0;
/// Default longest rain duration in minutes.
pub const DEFAULT_TP_MAX: f64 = 120.0;
/// Default verification horizon in minutes.
pub const DEFAULT_HORIZON: f64 = 120.0;

fn check(
    name: &'static str,
    value: f64,
    expected: &'static str,
    valid: impl FnOnce(f64) -> bool,
) -> Result<(), ConfigError> {
    if value.is_finite() && valid(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value,
            expected,
        })
    }
}

/// Parameters shared by design and verification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HydraulicParams {
    /// Open-channel base over height.
    pub base_ratio: f64,
    /// Wave celerity over mean flow speed, within `[1, 1.6]`.
    pub celerity_factor: f64,
    /// Discharges below this value are treated as the minimum, in m³/s.
    pub min_discharge: f64,
    /// Exponent of the drained area in the access time.
    pub area_exponent: f64,
    /// Exponent γ of the basin slope in the access time.
    pub slope_exponent: f64,
}

impl Default for HydraulicParams {
    fn default() -> Self {
        Self {
            base_ratio: DEFAULT_BASE_RATIO,
            celerity_factor: DEFAULT_CELERITY_FACTOR,
            min_discharge: DEFAULT_MIN_DISCHARGE,
            area_exponent: DEFAULT_AREA_EXPONENT,
            slope_exponent: DEFAULT_SLOPE_EXPONENT,
        }
    }
}

impl HydraulicParams {
    /// Checks every field against its admissible range.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("base_ratio", self.base_ratio, "positive", |v| v > 0.0)?;
        check(
            "celerity_factor",
            self.celerity_factor,
            "within [1, 1.6]",
            |v| (1.0..=1.6).contains(&v),
        )?;
        check("min_discharge", self.min_discharge, "positive", |v| v > 0.0)?;
        check("area_exponent", self.area_exponent, "positive", |v| v > 0.0)?;
        check("slope_exponent", self.slope_exponent, "positive", |v| v > 0.0)
    }
}

/// How a pipe is aligned with the pipes draining into it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum AlignMode {
    /// Free surfaces meet at the junction.
    #[default]
    FreeSurface,
    /// Inverts meet at the junction.
    Invert,
}

/// Sorted list of commercially available section sizes in metres.
///
/// # Examples
/// ```
/// use sewernet_core::DiameterCatalog;
///
/// let catalog = DiameterCatalog::new(vec![0.5, 0.3, 0.4, 0.4])?;
/// assert_eq!(catalog.sizes(), &[0.3, 0.4, 0.5]);
/// let candidates: Vec<f64> = catalog.candidates(0.42, 0.07).collect();
/// assert_eq!(candidates, vec![0.4, 0.5]);
/// # Ok::<(), sewernet_core::ConfigError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DiameterCatalog {
    sizes: Vec<f64>,
}

impl DiameterCatalog {
    /// Sorts and deduplicates `sizes`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidCatalog`] when the list is empty or holds
    /// a non-positive or non-finite size.
    pub fn new(mut sizes: Vec<f64>) -> Result<Self, ConfigError> {
        if sizes.is_empty() {
            return Err(ConfigError::InvalidCatalog {
                reason: "no sizes given".to_owned(),
            });
        }
        if let Some(bad) = sizes.iter().find(|size| !(size.is_finite() && **size > 0.0)) {
            return Err(ConfigError::InvalidCatalog {
                reason: format!("size {bad} is not a positive length"),
            });
        }
        sizes.sort_by(f64::total_cmp);
        sizes.dedup();
        Ok(Self { sizes })
    }

    /// Available sizes in ascending order.
    #[must_use]
    pub fn sizes(&self) -> &[f64] {
        &self.sizes
    }

    /// Sizes not smaller than `(1 − tolerance)·size`, ascending.
    pub fn candidates(&self, size: f64, tolerance: f64) -> impl Iterator<Item = f64> + '_ {
        let floor = size * (1.0 - tolerance);
        self.sizes.iter().copied().filter(move |candidate| *candidate >= floor)
    }
}

/// Validated design-mode configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DesignParams {
    storm: StormCurve,
    design_fill: f64,
    tau: f64,
    align: AlignMode,
    minimum_depth: f64,
    freeboard: f64,
    epsilon: f64,
    min_fill: f64,
    tp_min: f64,
    tp_max: f64,
    tolerance: f64,
    catalog: Option<DiameterCatalog>,
    hydraulics: HydraulicParams,
}

impl DesignParams {
    /// Starts a builder for `storm`.
    #[must_use]
    pub fn builder(storm: StormCurve) -> DesignParamsBuilder {
        DesignParamsBuilder::new(storm)
    }

    /// Design storm curve.
    #[must_use]
    pub const fn storm(&self) -> &StormCurve {
        &self.storm
    }

    /// Target fill degree of a newly sized pipe.
    #[must_use]
    pub const fn design_fill(&self) -> f64 {
        self.design_fill
    }

    /// Self-cleaning shear stress threshold in Pa.
    #[must_use]
    pub const fn tau(&self) -> f64 {
        self.tau
    }

    /// Alignment mode at junctions.
    #[must_use]
    pub const fn align(&self) -> AlignMode {
        self.align
    }

    /// Minimum cover above circular pipes in metres.
    #[must_use]
    pub const fn minimum_depth(&self) -> f64 {
        self.minimum_depth
    }

    /// Freeboard of open channels in metres.
    #[must_use]
    pub const fn freeboard(&self) -> f64 {
        self.freeboard
    }

    /// Relative tolerance of the discharge/speed fixed point.
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Minimum fill degree below which a warning is recorded.
    #[must_use]
    pub const fn min_fill(&self) -> f64 {
        self.min_fill
    }

    /// Admissible rain durations in minutes.
    #[must_use]
    pub const fn rain_duration_range(&self) -> (f64, f64) {
        (self.tp_min, self.tp_max)
    }

    /// Commercial-size tolerance.
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Commercial sizes, if any.
    #[must_use]
    pub const fn catalog(&self) -> Option<&DiameterCatalog> {
        self.catalog.as_ref()
    }

    /// Shared hydraulic parameters.
    #[must_use]
    pub const fn hydraulics(&self) -> &HydraulicParams {
        &self.hydraulics
    }
}

/// Configures [`DesignParams`].
///
/// # Examples
/// ```
/// use sewernet_core::{AlignMode, DesignParams, StormCurve};
///
/// let params = DesignParams::builder(StormCurve::new(50.0, 0.3)?)
///     .with_design_fill(0.8)
///     .with_align(AlignMode::Invert)
///     .build()?;
/// assert_eq!(params.align(), AlignMode::Invert);
/// assert!(DesignParams::builder(StormCurve::new(50.0, 0.3)?)
///     .with_design_fill(1.2)
///     .build()
///     .is_err());
/// # Ok::<(), sewernet_core::ConfigError>(())
/// ```
#[derive(Clone, Debug)]
pub struct DesignParamsBuilder {
    storm: StormCurve,
    design_fill: f64,
    tau: f64,
    align: AlignMode,
    minimum_depth: f64,
    freeboard: f64,
    epsilon: f64,
    min_fill: f64,
    tp_min: f64,
    tp_max: f64,
    tolerance: f64,
    catalog: Option<DiameterCatalog>,
    hydraulics: HydraulicParams,
}

impl DesignParamsBuilder {
    /// Creates a builder with default values for everything but the storm.
    #[must_use]
    pub fn new(storm: StormCurve) -> Self {
        Self {
            storm,
            design_fill: 0.8,
            tau: 2.0,
            align: AlignMode::default(),
            minimum_depth: DEFAULT_MINIMUM_DEPTH,
            freeboard: DEFAULT_FREEBOARD,
            epsilon: DEFAULT_EPSILON,
            min_fill: DEFAULT_MIN_FILL,
            tp_min: DEFAULT_TP_MIN,
            tp_max: DEFAULT_TP_MAX,
            tolerance: DEFAULT_DIAMETER_TOLERANCE,
            catalog: None,
            hydraulics: HydraulicParams::default(),
        }
    }

    /// Sets the design fill degree, within `(0, 0.99]`.
    #[must_use]
    pub const fn with_design_fill(mut self, fill: f64) -> Self {
        self.design_fill = fill;
        self
    }

    /// Sets the self-cleaning shear stress in Pa.
    #[must_use]
    pub const fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    /// Sets the alignment mode.
    #[must_use]
    pub const fn with_align(mut self, align: AlignMode) -> Self {
        self.align = align;
        self
    }

    /// Sets the minimum cover of circular pipes in metres.
    #[must_use]
    pub const fn with_minimum_depth(mut self, depth: f64) -> Self {
        self.minimum_depth = depth;
        self
    }

    /// Sets the freeboard of open channels in metres.
    #[must_use]
    pub const fn with_freeboard(mut self, freeboard: f64) -> Self {
        self.freeboard = freeboard;
        self
    }

    /// Sets the fixed-point tolerance, within `(0, 1]`.
    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the minimum fill degree, within `(0, 0.1]`.
    #[must_use]
    pub const fn with_min_fill(mut self, fill: f64) -> Self {
        self.min_fill = fill;
        self
    }

    /// Sets the admissible rain durations in minutes.
    #[must_use]
    pub const fn with_rain_duration_range(mut self, min: f64, max: f64) -> Self {
        self.tp_min = min;
        self.tp_max = max;
        self
    }

    /// Sets the commercial-size tolerance, within `[0, 1)`.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Snaps sizes to `catalog`.
    #[must_use]
    pub fn with_catalog(mut self, catalog: DiameterCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Overrides the shared hydraulic parameters.
    #[must_use]
    pub const fn with_hydraulics(mut self, hydraulics: HydraulicParams) -> Self {
        self.hydraulics = hydraulics;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] for the first out-of-range
    /// value.
    pub fn build(self) -> Result<DesignParams, ConfigError> {
        check("design_fill", self.design_fill, "within (0, 0.99]", |v| {
            v > 0.0 && v <= 0.99
        })?;
        check("tau", self.tau, "positive", |v| v > 0.0)?;
        check("minimum_depth", self.minimum_depth, "positive", |v| v > 0.0)?;
        check("freeboard", self.freeboard, "positive", |v| v > 0.0)?;
        check("epsilon", self.epsilon, "within (0, 1]", |v| v > 0.0 && v <= 1.0)?;
        check("min_fill", self.min_fill, "within (0, 0.1]", |v| {
            v > 0.0 && v <= 0.1
        })?;
        check("tp_min", self.tp_min, "within (0, 5]", |v| v > 0.0 && v <= 5.0)?;
        check("tp_max", self.tp_max, "at least 30 minutes", |v| v >= 30.0)?;
        check("tolerance", self.tolerance, "within [0, 1)", |v| {
            (0.0..1.0).contains(&v)
        })?;
        self.hydraulics.validate()?;
        Ok(DesignParams {
            storm: self.storm,
            design_fill: self.design_fill,
            tau: self.tau,
            align: self.align,
            minimum_depth: self.minimum_depth,
            freeboard: self.freeboard,
            epsilon: self.epsilon,
            min_fill: self.min_fill,
            tp_min: self.tp_min,
            tp_max: self.tp_max,
            tolerance: self.tolerance,
            catalog: self.catalog,
            hydraulics: self.hydraulics,
        })
    }
}

/// Validated verification-mode configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationParams {
    observed: Option<RainfallSeries>,
    storm: Option<StormCurve>,
    time_step: Option<f64>,
    horizon: f64,
    rain_duration: Option<f64>,
    start: DateTime<Utc>,
    track_peak: bool,
    hydraulics: HydraulicParams,
}

impl CalibrationParams {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> CalibrationParamsBuilder {
        CalibrationParamsBuilder::default()
    }

    /// Observed rainfall, if supplied.
    #[must_use]
    pub const fn observed(&self) -> Option<&RainfallSeries> {
        self.observed.as_ref()
    }

    /// Storm curve used when no observed series is supplied.
    #[must_use]
    pub const fn storm(&self) -> Option<&StormCurve> {
        self.storm.as_ref()
    }

    /// Time step in minutes for synthesis.
    #[must_use]
    pub const fn time_step(&self) -> Option<f64> {
        self.time_step
    }

    /// Synthesis horizon in minutes.
    #[must_use]
    pub const fn horizon(&self) -> f64 {
        self.horizon
    }

    /// Active rain duration for synthesis in minutes.
    #[must_use]
    pub const fn rain_duration(&self) -> Option<f64> {
        self.rain_duration
    }

    /// Start time of a synthesized series.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Whether the outlet peak is tracked.
    #[must_use]
    pub const fn track_peak(&self) -> bool {
        self.track_peak
    }

    /// Shared hydraulic parameters.
    #[must_use]
    pub const fn hydraulics(&self) -> &HydraulicParams {
        &self.hydraulics
    }
}

/// Configures [`CalibrationParams`].
///
/// # Examples
/// ```
/// use sewernet_core::{CalibrationParams, StormCurve};
///
/// let params = CalibrationParams::builder()
///     .with_storm(StormCurve::new(50.0, 0.3)?)
///     .with_time_step(5.0)
///     .with_track_peak(true)
///     .build()?;
/// assert!(params.track_peak());
/// # Ok::<(), sewernet_core::ConfigError>(())
/// ```
#[derive(Clone, Debug)]
pub struct CalibrationParamsBuilder {
    observed: Option<RainfallSeries>,
    storm: Option<StormCurve>,
    time_step: Option<f64>,
    horizon: f64,
    rain_duration: Option<f64>,
    start: DateTime<Utc>,
    track_peak: bool,
    hydraulics: HydraulicParams,
}

impl Default for CalibrationParamsBuilder {
    fn default() -> Self {
        Self {
            observed: None,
            storm: None,
            time_step: None,
            horizon: DEFAULT_HORIZON,
            rain_duration: None,
            start: DateTime::<Utc>::UNIX_EPOCH,
            track_peak: false,
            hydraulics: HydraulicParams::default(),
        }
    }
}

impl CalibrationParamsBuilder {
    /// Uses an observed series; it takes precedence over a storm curve.
    #[must_use]
    pub fn with_observed(mut self, series: RainfallSeries) -> Self {
        self.observed = Some(series);
        self
    }

    /// Synthesizes rain from `storm` when no observed series is given.
    #[must_use]
    pub const fn with_storm(mut self, storm: StormCurve) -> Self {
        self.storm = Some(storm);
        self
    }

    /// Sets the synthesis time step in minutes.
    #[must_use]
    pub const fn with_time_step(mut self, minutes: f64) -> Self {
        self.time_step = Some(minutes);
        self
    }

    /// Sets the synthesis horizon in minutes.
    #[must_use]
    pub const fn with_horizon(mut self, minutes: f64) -> Self {
        self.horizon = minutes;
        self
    }

    /// Sets the active rain duration of a synthesized storm in minutes.
    #[must_use]
    pub const fn with_rain_duration(mut self, minutes: f64) -> Self {
        self.rain_duration = Some(minutes);
        self
    }

    /// Sets the start of a synthesized series.
    #[must_use]
    pub const fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Enables tracking of the outlet peak.
    #[must_use]
    pub const fn with_track_peak(mut self, track: bool) -> Self {
        self.track_peak = track;
        self
    }

    /// Overrides the shared hydraulic parameters.
    #[must_use]
    pub const fn with_hydraulics(mut self, hydraulics: HydraulicParams) -> Self {
        self.hydraulics = hydraulics;
        self
    }

    /// Validates the configuration.
    ///
    /// A missing rainfall source is not rejected here; the verification run
    /// reports it before its first step.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] for the first out-of-range
    /// value.
    pub fn build(self) -> Result<CalibrationParams, ConfigError> {
        if let Some(step) = self.time_step {
            check("time_step", step, "positive minutes", |v| v > 0.0)?;
        }
        check("horizon", self.horizon, "positive minutes", |v| v > 0.0)?;
        if let Some(duration) = self.rain_duration {
            check("rain_duration", duration, "non-negative minutes", |v| {
                v >= 0.0
            })?;
        }
        self.hydraulics.validate()?;
        Ok(CalibrationParams {
            observed: self.observed,
            storm: self.storm,
            time_step: self.time_step,
            horizon: self.horizon,
            rain_duration: self.rain_duration,
            start: self.start,
            track_peak: self.track_peak,
            hydraulics: self.hydraulics,
        })
    }
}
