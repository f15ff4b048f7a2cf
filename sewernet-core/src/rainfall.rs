//! Rainfall: the two-parameter storm curve, observed series, and synthesis.
//!
//! Intensities are in mm/min. Each sample is stamped with the *end* of the
//! interval it covers, so a series starting at `t0` with step `dt` has its
//! first sample at `t0 + dt`.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::{
    context::{RunContext, Warning},
    error::ConfigError,
};

/// Minutes per hour.
pub const HOUR_TO_MINUTES: f64 = 60.0;

/// Power-law storm curve `h = a·t^n` with `t` in hours and `h` in mm.
///
/// # Examples
/// ```
/// use sewernet_core::StormCurve;
///
/// let curve = StormCurve::new(50.0, 0.3)?;
/// // one-hour storm: 50 mm over 60 minutes
/// assert!((curve.intensity(60.0) - 50.0 / 60.0).abs() < 1e-12);
/// # Ok::<(), sewernet_core::ConfigError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StormCurve {
    a: f64,
    n: f64,
}

impl StormCurve {
    /// Validates `a > 0` and `0.05 ≤ n ≤ 0.95`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] naming the offending
    /// coefficient.
    pub fn new(a: f64, n: f64) -> Result<Self, ConfigError> {
        if !(a.is_finite() && a > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "a",
                value: a,
                expected: "positive",
            });
        }
        if !(0.05..=0.95).contains(&n) {
            return Err(ConfigError::InvalidParameter {
                name: "n",
                value: n,
                expected: "within [0.05, 0.95]",
            });
        }
        Ok(Self { a, n })
    }

    /// Intensity coefficient `a` in mm/h^n.
    #[must_use]
    pub const fn a(&self) -> f64 {
        self.a
    }

    /// Exponent `n`.
    #[must_use]
    pub const fn n(&self) -> f64 {
        self.n
    }

    /// Mean intensity in mm/min for a rain lasting `minutes`.
    #[must_use]
    pub fn intensity(&self, minutes: f64) -> f64 {
        self.a * (minutes / HOUR_TO_MINUTES).powf(self.n - 1.0) / HOUR_TO_MINUTES
    }
}

/// One timestamped row of intensities, one value per rain zone.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RainfallSample {
    /// End of the interval the intensities apply to.
    pub time: DateTime<Utc>,
    /// Intensity per zone in mm/min.
    pub intensities: Vec<f64>,
}

impl RainfallSample {
    /// Creates a sample.
    #[must_use]
    pub const fn new(time: DateTime<Utc>, intensities: Vec<f64>) -> Self {
        Self { time, intensities }
    }
}

/// Ordered, uniformly spaced, immutable rainfall series.
#[derive(Clone, Debug, PartialEq)]
pub struct RainfallSeries {
    samples: Vec<RainfallSample>,
    time_step: f64,
    zones: usize,
}

impl RainfallSeries {
    /// Builds a series and infers the time step from the sample spacing.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidRainfall`] when fewer than two samples
    /// are supplied or the series is malformed (see
    /// [`Self::from_samples_with_step`]).
    pub fn from_samples(samples: Vec<RainfallSample>) -> Result<Self, ConfigError> {
        let step = match samples.as_slice() {
            [first, second, ..] => minutes_between(first.time, second.time),
            _ => {
                return Err(invalid(
                    "at least two samples are needed to infer the time step",
                ));
            }
        };
        Self::from_samples_with_step(samples, step)
    }

    /// Builds a series with an explicit time step in minutes.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidRainfall`] when the series is empty,
    /// rows have differing or zero zone counts, intensities are negative or
    /// non-finite, timestamps are not strictly increasing, or the spacing
    /// differs from `time_step`.
    pub fn from_samples_with_step(
        samples: Vec<RainfallSample>,
        time_step: f64,
    ) -> Result<Self, ConfigError> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(invalid("time step must be positive"));
        }
        let Some(first) = samples.first() else {
            return Err(invalid("series is empty"));
        };
        let zones = first.intensities.len();
        if zones == 0 {
            return Err(invalid("samples carry no intensities"));
        }
        for sample in &samples {
            if sample.intensities.len() != zones {
                return Err(invalid(format!(
                    "sample at {} has {} zone(s), expected {zones}",
                    sample.time,
                    sample.intensities.len()
                )));
            }
            if let Some(value) = sample
                .intensities
                .iter()
                .find(|value| !(value.is_finite() && **value >= 0.0))
            {
                return Err(invalid(format!(
                    "sample at {} has invalid intensity {value}",
                    sample.time
                )));
            }
        }
        for pair in samples.windows(2) {
            let [earlier, later] = pair else { continue };
            let spacing = minutes_between(earlier.time, later.time);
            if spacing <= 0.0 {
                return Err(invalid(format!(
                    "timestamps must be strictly increasing at {}",
                    later.time
                )));
            }
            if (spacing - time_step).abs() > SPACING_TOLERANCE_MINUTES {
                return Err(invalid(format!(
                    "non-uniform spacing of {spacing} min at {}, expected {time_step} min",
                    later.time
                )));
            }
        }
        Ok(Self {
            samples,
            time_step,
            zones,
        })
    }

    /// Number of time steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; construction rejects empty series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time step in minutes.
    #[must_use]
    pub const fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Number of rain zones.
    #[must_use]
    pub const fn zones(&self) -> usize {
        self.zones
    }

    /// Samples in time order.
    #[must_use]
    pub fn samples(&self) -> &[RainfallSample] {
        &self.samples
    }

    /// Timestamp of `step`.
    #[must_use]
    pub fn time(&self, step: usize) -> Option<DateTime<Utc>> {
        self.samples.get(step).map(|sample| sample.time)
    }

    /// Intensity of `zone` at `step`, zero outside the series.
    #[must_use]
    pub fn intensity(&self, step: usize, zone: usize) -> f64 {
        self.samples
            .get(step)
            .and_then(|sample| sample.intensities.get(zone))
            .copied()
            .unwrap_or(0.0)
    }

    /// Minutes elapsed from the series start to the end of `step`.
    #[must_use]
    pub fn minutes_at(&self, step: usize) -> f64 {
        let step = u32::try_from(step + 1).unwrap_or(u32::MAX);
        f64::from(step) * self.time_step
    }

    /// Total rain depth of `zone` in mm.
    #[must_use]
    pub fn depth(&self, zone: usize) -> f64 {
        (0..self.len())
            .map(|step| self.intensity(step, zone) * self.time_step)
            .sum()
    }
}

const SPACING_TOLERANCE_MINUTES: f64 = 1.0 / 60.0;

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidRainfall {
        reason: reason.into(),
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "millisecond spans of rainfall series fit well within f64 precision"
)]
fn minutes_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 60_000.0
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "rainfall steps are bounded to whole milliseconds"
)]
fn minutes_to_delta(minutes: f64) -> Result<TimeDelta, ConfigError> {
    TimeDelta::try_milliseconds((minutes * 60_000.0).round() as i64)
        .ok_or_else(|| invalid(format!("time offset of {minutes} min is out of range")))
}

/// Builds a design-storm series from a [`StormCurve`].
///
/// Consumed by [`Self::synthesize`]; a run synthesizes at most once.
#[derive(Clone, Debug, PartialEq)]
pub struct RainfallSynthesizer {
    curve: StormCurve,
    time_step: f64,
    horizon: f64,
    rain_duration: Option<f64>,
    start: DateTime<Utc>,
}

impl RainfallSynthesizer {
    /// Creates a synthesizer with `time_step` and `horizon` in minutes.
    ///
    /// The rain lasts the whole horizon unless
    /// [`Self::with_rain_duration`] shortens it.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] when the time step is not
    /// positive or the horizon is shorter than one step.
    pub fn new(curve: StormCurve, time_step: f64, horizon: f64) -> Result<Self, ConfigError> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "time_step",
                value: time_step,
                expected: "positive minutes",
            });
        }
        if !(horizon.is_finite() && horizon >= time_step) {
            return Err(ConfigError::InvalidParameter {
                name: "horizon",
                value: horizon,
                expected: "at least one time step",
            });
        }
        Ok(Self {
            curve,
            time_step,
            horizon,
            rain_duration: None,
            start: DateTime::<Utc>::UNIX_EPOCH,
        })
    }

    /// Limits the active rain to `minutes`; intensities are zero afterwards.
    #[must_use]
    pub const fn with_rain_duration(mut self, minutes: f64) -> Self {
        self.rain_duration = Some(minutes);
        self
    }

    /// Sets the series start time.
    #[must_use]
    pub const fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Number of steps the series will contain.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "horizon and step are validated positive and finite"
    )]
    pub fn steps(&self) -> usize {
        ((self.horizon / self.time_step).round() as usize).max(1)
    }

    /// Index of the first dry step.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "duration is clamped to a non-negative finite value"
    )]
    pub fn cutoff(&self) -> usize {
        let duration = self
            .rain_duration
            .map_or(self.horizon, |duration| duration.clamp(0.0, self.horizon));
        (duration / self.time_step).floor() as usize
    }

    /// Produces the series, warning when the rain duration exceeds the
    /// horizon.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidRainfall`] when the timestamps overflow.
    #[expect(
        clippy::cast_precision_loss,
        reason = "step indices are far below 2^52"
    )]
    pub fn synthesize(self, ctx: &mut RunContext) -> Result<RainfallSeries, ConfigError> {
        if let Some(requested) = self.rain_duration
            && requested > self.horizon
        {
            ctx.warn(Warning::RainCutoffClamped {
                requested,
                horizon: self.horizon,
            });
        }
        let steps = self.steps();
        let cutoff = self.cutoff();
        let mut samples = Vec::with_capacity(steps);
        for step in 0..steps {
            let elapsed = (step + 1) as f64 * self.time_step;
            let midpoint = self.time_step / 2.0 + step as f64 * self.time_step;
            let value = if step < cutoff {
                self.curve.intensity(midpoint)
            } else {
                0.0
            };
            let time = self
                .start
                .checked_add_signed(minutes_to_delta(elapsed)?)
                .ok_or_else(|| invalid("synthesized timestamps overflow"))?;
            samples.push(RainfallSample::new(time, vec![value]));
        }
        debug!(steps, cutoff, "synthesized design storm");
        RainfallSeries::from_samples_with_step(samples, self.time_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::suite_proptest_config;
    use proptest::prelude::*;
    use rstest::rstest;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minutes)
    }

    #[rstest]
    #[case::zero_a(0.0, 0.3)]
    #[case::n_low(50.0, 0.01)]
    #[case::n_high(50.0, 0.99)]
    fn curve_rejects_out_of_range(#[case] a: f64, #[case] n: f64) {
        StormCurve::new(a, n).expect_err("curve must be rejected");
    }

    #[test]
    fn series_infers_time_step() {
        let series = RainfallSeries::from_samples(vec![
            RainfallSample::new(at(5), vec![0.2, 0.1]),
            RainfallSample::new(at(10), vec![0.4, 0.2]),
            RainfallSample::new(at(15), vec![0.0, 0.0]),
        ])
        .expect("valid series");
        assert!((series.time_step() - 5.0).abs() < 1e-12);
        assert_eq!(series.zones(), 2);
        assert!((series.minutes_at(1) - 10.0).abs() < 1e-12);
        assert!((series.depth(0) - 3.0).abs() < 1e-12);
    }

    #[rstest]
    #[case::single(vec![RainfallSample::new(at(5), vec![0.1])])]
    #[case::decreasing(vec![
        RainfallSample::new(at(10), vec![0.1]),
        RainfallSample::new(at(5), vec![0.1]),
    ])]
    #[case::non_uniform(vec![
        RainfallSample::new(at(5), vec![0.1]),
        RainfallSample::new(at(10), vec![0.1]),
        RainfallSample::new(at(20), vec![0.1]),
    ])]
    #[case::negative(vec![
        RainfallSample::new(at(5), vec![-0.1]),
        RainfallSample::new(at(10), vec![0.1]),
    ])]
    #[case::ragged(vec![
        RainfallSample::new(at(5), vec![0.1, 0.2]),
        RainfallSample::new(at(10), vec![0.1]),
    ])]
    fn malformed_series_rejected(#[case] samples: Vec<RainfallSample>) {
        let err = RainfallSeries::from_samples(samples).expect_err("series must be rejected");
        assert!(matches!(err, ConfigError::InvalidRainfall { .. }));
    }

    #[test]
    fn long_rain_duration_is_clamped_with_warning() {
        let curve = StormCurve::new(50.0, 0.3).expect("valid curve");
        let mut ctx = RunContext::default();
        let series = RainfallSynthesizer::new(curve, 5.0, 60.0)
            .expect("valid synthesizer")
            .with_rain_duration(90.0)
            .synthesize(&mut ctx)
            .expect("synthesis succeeds");
        assert_eq!(series.len(), 12);
        assert!(series.samples().iter().all(|s| s.intensities[0] > 0.0));
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn first_sample_uses_step_midpoint() {
        let curve = StormCurve::new(50.0, 0.3).expect("valid curve");
        let series = RainfallSynthesizer::new(curve, 10.0, 30.0)
            .expect("valid synthesizer")
            .synthesize(&mut RunContext::default())
            .expect("synthesis succeeds");
        assert!((series.intensity(0, 0) - curve.intensity(5.0)).abs() < 1e-12);
        assert_eq!(series.time(0), Some(at(10)));
    }

    proptest! {
        #![proptest_config(suite_proptest_config(64))]

        #[test]
        fn synthesized_series_respects_cutoff(
            a in 10.0_f64..120.0,
            n in 0.05_f64..0.95,
            step in 1_u32..15,
            horizon_steps in 1_u32..40,
            duration in 0.0_f64..300.0,
        ) {
            let curve = StormCurve::new(a, n).expect("valid curve");
            let time_step = f64::from(step);
            let horizon = time_step * f64::from(horizon_steps);
            let synthesizer = RainfallSynthesizer::new(curve, time_step, horizon)
                .expect("valid synthesizer")
                .with_rain_duration(duration);
            let cutoff = synthesizer.cutoff();
            let series = synthesizer
                .synthesize(&mut RunContext::default())
                .expect("synthesis succeeds");
            prop_assert_eq!(series.len(), horizon_steps as usize);
            for (index, sample) in series.samples().iter().enumerate() {
                let value = sample.intensities[0];
                prop_assert!(value >= 0.0);
                if index >= cutoff {
                    prop_assert!(value == 0.0);
                } else {
                    prop_assert!(value > 0.0);
                }
            }
            for pair in series.samples().windows(2) {
                prop_assert!(pair[1].intensities[0] <= pair[0].intensities[0]);
            }
        }
    }
}
