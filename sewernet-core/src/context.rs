//! Per-run context: progress sink, warning log, and cooperative cancellation.
//!
//! Each run owns its [`RunContext`], so concurrent runs never share mutable
//! state. The sink and cancellation token are reference-counted and may be
//! observed from other threads.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{error, info, warn};

use crate::pipe::PipeId;

/// Receives textual progress, warning, and error messages from a run.
pub trait ProgressSink: Send + Sync {
    /// A unit of work with `total` steps is starting.
    fn begin(&self, task: &str, total: usize);

    /// `done` steps of the current task have completed.
    fn worked(&self, done: usize);

    /// Informational message.
    fn message(&self, message: &str);

    /// A non-fatal anomaly was recorded.
    fn warning(&self, message: &str);

    /// A fatal error is about to be returned.
    fn error(&self, message: &str);
}

/// [`ProgressSink`] forwarding every message to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn begin(&self, task: &str, total: usize) {
        info!(task, total, "task started");
    }

    fn worked(&self, _done: usize) {}

    fn message(&self, message: &str) {
        info!("{message}");
    }

    fn warning(&self, _message: &str) {
        // RunContext::warn already emits a structured event.
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}

/// Shared flag checked between pipes and between time steps.
///
/// # Examples
/// ```
/// use sewernet_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A non-fatal anomaly recorded during a run.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Warning {
    /// The geometric slope was below the minimum, which was used instead.
    SlopeBelowMinimum {
        /// Affected pipe.
        pipe: PipeId,
        /// Slope computed from the elevations.
        slope: f64,
        /// Substituted minimum slope.
        minimum: f64,
    },
    /// A bisection hit its iteration cap before meeting the accuracy.
    BisectionNotConverged {
        /// Affected pipe.
        pipe: PipeId,
        /// Iterations performed.
        iterations: u32,
        /// Residual of the accepted estimate in m³/s.
        residual: f64,
    },
    /// The discharge/speed fixed point hit its iteration cap.
    DischargeNotConverged {
        /// Affected pipe.
        pipe: PipeId,
        /// Iterations performed.
        iterations: u32,
    },
    /// The computed discharge was below the minimum, which was used instead.
    DischargeBelowMinimum {
        /// Affected pipe.
        pipe: PipeId,
        /// Computed discharge in m³/s.
        discharge: f64,
        /// Substituted minimum in m³/s.
        minimum: f64,
    },
    /// No catalog size conveys the discharge; the continuous size was kept.
    CatalogExhausted {
        /// Affected pipe.
        pipe: PipeId,
        /// Continuous size in metres.
        size: f64,
    },
    /// Bed shear stress is below the self-cleaning threshold.
    SelfCleaningNotMet {
        /// Affected pipe.
        pipe: PipeId,
        /// Computed shear stress in Pa.
        shear: f64,
        /// Required shear stress in Pa.
        required: f64,
    },
    /// Fill degree is below the configured minimum.
    FillBelowMinimum {
        /// Affected pipe.
        pipe: PipeId,
        /// Computed fill degree.
        fill: f64,
        /// Configured minimum.
        minimum: f64,
    },
    /// The pipe ran full during verification.
    Surcharged {
        /// Affected pipe.
        pipe: PipeId,
        /// Minutes from series start of the first surcharged step.
        minutes: f64,
        /// Discharge that exceeded the capacity in m³/s.
        discharge: f64,
        /// Capacity of the pipe in m³/s.
        capacity: f64,
    },
    /// The critical rain duration was clamped to the admissible range.
    RainDurationClamped {
        /// Affected pipe.
        pipe: PipeId,
        /// Computed duration in minutes.
        computed: f64,
        /// Duration used in minutes.
        used: f64,
    },
    /// The requested rain duration exceeded the horizon and was clamped.
    RainCutoffClamped {
        /// Requested duration in minutes.
        requested: f64,
        /// Horizon in minutes.
        horizon: f64,
    },
}

impl Warning {
    /// Stable machine-readable identifier of the warning kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SlopeBelowMinimum { .. } => "slope_below_minimum",
            Self::BisectionNotConverged { .. } => "bisection_not_converged",
            Self::DischargeNotConverged { .. } => "discharge_not_converged",
            Self::DischargeBelowMinimum { .. } => "discharge_below_minimum",
            Self::CatalogExhausted { .. } => "catalog_exhausted",
            Self::SelfCleaningNotMet { .. } => "self_cleaning_not_met",
            Self::FillBelowMinimum { .. } => "fill_below_minimum",
            Self::Surcharged { .. } => "surcharged",
            Self::RainDurationClamped { .. } => "rain_duration_clamped",
            Self::RainCutoffClamped { .. } => "rain_cutoff_clamped",
        }
    }

    /// Pipe the warning refers to, if any.
    #[must_use]
    pub const fn pipe(&self) -> Option<PipeId> {
        match self {
            Self::SlopeBelowMinimum { pipe, .. }
            | Self::BisectionNotConverged { pipe, .. }
            | Self::DischargeNotConverged { pipe, .. }
            | Self::DischargeBelowMinimum { pipe, .. }
            | Self::CatalogExhausted { pipe, .. }
            | Self::SelfCleaningNotMet { pipe, .. }
            | Self::FillBelowMinimum { pipe, .. }
            | Self::Surcharged { pipe, .. }
            | Self::RainDurationClamped { pipe, .. } => Some(*pipe),
            Self::RainCutoffClamped { .. } => None,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlopeBelowMinimum {
                pipe,
                slope,
                minimum,
            } => write!(
                f,
                "pipe {pipe}: slope {slope:.5} below minimum, using {minimum:.5}"
            ),
            Self::BisectionNotConverged {
                pipe,
                iterations,
                residual,
            } => write!(
                f,
                "pipe {pipe}: bisection stopped after {iterations} iteration(s) with residual {residual:.3e} m³/s"
            ),
            Self::DischargeNotConverged { pipe, iterations } => write!(
                f,
                "pipe {pipe}: discharge did not settle after {iterations} iteration(s)"
            ),
            Self::DischargeBelowMinimum {
                pipe,
                discharge,
                minimum,
            } => write!(
                f,
                "pipe {pipe}: discharge {discharge:.5} m³/s below minimum, using {minimum:.5} m³/s"
            ),
            Self::CatalogExhausted { pipe, size } => write!(
                f,
                "pipe {pipe}: no commercial size fits, keeping {size:.3} m"
            ),
            Self::SelfCleaningNotMet {
                pipe,
                shear,
                required,
            } => write!(
                f,
                "pipe {pipe}: bed shear {shear:.2} Pa below self-cleaning threshold {required:.2} Pa"
            ),
            Self::FillBelowMinimum {
                pipe,
                fill,
                minimum,
            } => write!(
                f,
                "pipe {pipe}: fill degree {fill:.4} below minimum {minimum:.4}"
            ),
            Self::Surcharged {
                pipe,
                minutes,
                discharge,
                capacity,
            } => write!(
                f,
                "pipe {pipe}: surcharged at {minutes:.1} min ({discharge:.4} m³/s over capacity {capacity:.4} m³/s)"
            ),
            Self::RainDurationClamped {
                pipe,
                computed,
                used,
            } => write!(
                f,
                "pipe {pipe}: rain duration {computed:.2} min clamped to {used:.2} min"
            ),
            Self::RainCutoffClamped { requested, horizon } => write!(
                f,
                "rain duration {requested:.2} min exceeds the horizon, clamped to {horizon:.2} min"
            ),
        }
    }
}

/// Ordered collection of warnings accumulated by one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WarningLog {
    entries: Vec<Warning>,
}

impl WarningLog {
    /// Appends a warning.
    pub fn push(&mut self, warning: Warning) {
        self.entries.push(warning);
    }

    /// Recorded warnings in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    /// Number of recorded warnings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no warning was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Warnings concerning `pipe`.
    pub fn for_pipe(&self, pipe: PipeId) -> impl Iterator<Item = &Warning> {
        self.entries
            .iter()
            .filter(move |warning| warning.pipe() == Some(pipe))
    }

    /// Iterates over the warnings.
    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a WarningLog {
    type Item = &'a Warning;
    type IntoIter = std::slice::Iter<'a, Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Explicitly passed state for one run.
///
/// # Examples
/// ```
/// use sewernet_core::RunContext;
///
/// let mut ctx = RunContext::default();
/// assert!(ctx.warnings().is_empty());
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Clone)]
pub struct RunContext {
    sink: Arc<dyn ProgressSink>,
    cancellation: CancellationToken,
    warnings: WarningLog,
}

impl RunContext {
    /// Creates a context reporting to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            cancellation: CancellationToken::new(),
            warnings: WarningLog::default(),
        }
    }

    /// Uses `token` for cooperative cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// A context sharing this sink and cancellation token with an empty
    /// warning log.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            cancellation: self.cancellation.clone(),
            warnings: WarningLog::default(),
        }
    }

    /// The progress sink.
    #[must_use]
    pub fn sink(&self) -> &dyn ProgressSink {
        self.sink.as_ref()
    }

    /// Token observed by the runners.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Records a warning, logging it and forwarding it to the sink.
    pub fn warn(&mut self, warning: Warning) {
        let message = warning.to_string();
        warn!(
            kind = warning.kind(),
            pipe = warning.pipe().map(PipeId::get),
            "{message}"
        );
        #[cfg(feature = "metrics")]
        metrics::counter!("sewernet_warnings", "kind" => warning.kind()).increment(1);
        self.sink.warning(&message);
        self.warnings.push(warning);
    }

    /// Reports a fatal error to the sink before it is propagated.
    pub fn report_error(&self, error: &dyn std::error::Error) {
        self.sink.error(&error.to_string());
    }

    /// Warnings recorded so far.
    #[must_use]
    pub const fn warnings(&self) -> &WarningLog {
        &self.warnings
    }

    /// Takes the recorded warnings, leaving the log empty.
    pub fn take_warnings(&mut self) -> WarningLog {
        std::mem::take(&mut self.warnings)
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("cancelled", &self.is_cancelled())
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        warnings: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl ProgressSink for CollectingSink {
        fn begin(&self, _task: &str, _total: usize) {}
        fn worked(&self, _done: usize) {}
        fn message(&self, _message: &str) {}
        fn warning(&self, message: &str) {
            self.warnings.lock().expect("lock").push(message.to_owned());
        }
        fn error(&self, message: &str) {
            self.errors.lock().expect("lock").push(message.to_owned());
        }
    }

    fn pipe(raw: u32) -> PipeId {
        PipeId::new(raw).expect("non-zero id")
    }

    #[test]
    fn warnings_reach_sink_and_log() {
        let sink = Arc::new(CollectingSink::default());
        let mut ctx = RunContext::new(sink.clone());
        ctx.warn(Warning::SlopeBelowMinimum {
            pipe: pipe(3),
            slope: 0.0001,
            minimum: 0.002,
        });
        assert_eq!(ctx.warnings().len(), 1);
        let forwarded = sink.warnings.lock().expect("lock");
        assert_eq!(forwarded.len(), 1);
        assert!(forwarded[0].starts_with("pipe 3: slope"));
    }

    #[test]
    fn errors_are_reported_to_sink() {
        let sink = Arc::new(CollectingSink::default());
        let ctx = RunContext::new(sink.clone());
        ctx.report_error(&crate::ConfigError::MissingRainfall);
        assert_eq!(sink.errors.lock().expect("lock").len(), 1);
    }

    #[test]
    fn warnings_filter_by_pipe() {
        let mut log = WarningLog::default();
        log.push(Warning::CatalogExhausted {
            pipe: pipe(1),
            size: 2.0,
        });
        log.push(Warning::RainCutoffClamped {
            requested: 200.0,
            horizon: 120.0,
        });
        assert_eq!(log.for_pipe(pipe(1)).count(), 1);
        assert_eq!(log.for_pipe(pipe(2)).count(), 0);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let ctx = RunContext::default().with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn forked_context_starts_with_empty_log() {
        let token = CancellationToken::new();
        let mut ctx = RunContext::default().with_cancellation(token.clone());
        ctx.warn(Warning::CatalogExhausted {
            pipe: pipe(1),
            size: 2.0,
        });
        let fork = ctx.fork();
        assert!(fork.warnings().is_empty());
        token.cancel();
        assert!(fork.is_cancelled());
    }
}
