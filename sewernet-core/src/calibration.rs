//! Verification mode: route a rainfall series through fixed sections.
//!
//! Each sub-basin is a linear reservoir with constant access time. Pipe
//! outflow reaches the receiving pipe after its travel time at full-flow
//! speed, rounded to whole steps. Steps are processed in time order and,
//! within a step, pipes in drainage order.

use std::borrow::Cow;

use tracing::{debug, info, instrument};

use crate::{
    Result,
    context::{RunContext, Warning},
    design::{SubnetStats, access_time, effective_slope},
    error::{ConfigError, SewerNetError, SolverError},
    hydraulics::{CrossSection, FlowConditions, HydraulicSolver},
    network::NetworkGraph,
    params::CalibrationParams,
    pipe::{PipeId, PipeRecord},
    rainfall::{RainfallSeries, RainfallSynthesizer},
    result::{PeakDischarge, RunStatus, TimeSeriesMap},
};

/// Routes rainfall through a network with known section sizes.
#[derive(Clone, Copy, Debug)]
pub struct CalibrationNetworkRunner<'a> {
    params: &'a CalibrationParams,
    solver: HydraulicSolver,
}

/// Maps and counters returned by [`CalibrationNetworkRunner::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationRun {
    /// Discharge in m³/s per step and pipe.
    pub discharge: TimeSeriesMap,
    /// Fill degree per step and pipe.
    pub fill_degree: TimeSeriesMap,
    /// Outlet peak, when tracking was requested.
    pub peak: Option<PeakDischarge>,
    /// Completion status.
    pub status: RunStatus,
    /// Steps executed.
    pub steps_run: usize,
}

/// Per-pipe constants of a verification run.
#[derive(Clone, Copy, Debug)]
struct PipeModel {
    id: PipeId,
    receiver: Option<usize>,
    flow: FlowConditions,
    size: f64,
    capacity: f64,
    full_area: f64,
    retention: f64,
    inflow_rate: f64,
    zone: usize,
    lag: usize,
    subnet: SubnetStats,
}

/// Running state of one pipe.
#[derive(Clone, Copy, Debug, Default)]
struct PipeState {
    local: f64,
    peak_discharge: f64,
    peak_minutes: f64,
    peak_fill: f64,
    peak_speed: f64,
    surcharged: bool,
    unconverged: bool,
}

impl<'a> CalibrationNetworkRunner<'a> {
    /// Creates a runner.
    #[must_use]
    pub const fn new(params: &'a CalibrationParams, solver: HydraulicSolver) -> Self {
        Self { params, solver }
    }

    /// Uses the observed series when present, otherwise synthesizes one
    /// from the storm curve.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingRainfall`] when neither source is
    /// configured, and synthesis errors otherwise.
    pub fn establish_rainfall(&self, ctx: &mut RunContext) -> Result<Cow<'a, RainfallSeries>> {
        if let Some(series) = self.params.observed() {
            return Ok(Cow::Borrowed(series));
        }
        let (Some(storm), Some(step)) = (self.params.storm(), self.params.time_step()) else {
            return Err(ConfigError::MissingRainfall.into());
        };
        let mut synthesizer = RainfallSynthesizer::new(*storm, step, self.params.horizon())?
            .with_start(self.params.start());
        if let Some(duration) = self.params.rain_duration() {
            synthesizer = synthesizer.with_rain_duration(duration);
        }
        Ok(Cow::Owned(synthesizer.synthesize(ctx)?))
    }

    /// Establishes the rainfall and routes it through `network`.
    ///
    /// # Errors
    /// Returns the errors of [`Self::establish_rainfall`] and
    /// [`Self::run_with`].
    pub fn run(&self, network: &mut NetworkGraph, ctx: &mut RunContext) -> Result<CalibrationRun> {
        let rain = self.establish_rainfall(ctx)?;
        self.run_with(network, &rain, ctx)
    }

    /// Runs every time step of `rain`, recording discharge and fill degree
    /// per pipe.
    ///
    /// Missing sizes and unknown rain zones are reported before the first
    /// step. Each pipe's outputs end up holding its peak discharge with the
    /// fill degree, speed, and time of that peak.
    ///
    /// # Errors
    /// Returns [`SewerNetError::Config`] for configuration problems and
    /// [`SewerNetError::Numeric`] when a fill degree cannot be solved.
    #[instrument(name = "core.verify", err, skip_all, fields(pipes = network.len()))]
    pub fn run_with(
        &self,
        network: &mut NetworkGraph,
        rain: &RainfallSeries,
        ctx: &mut RunContext,
    ) -> Result<CalibrationRun> {
        let models = self.models(network, rain, ctx)?;
        let steps = rain.len();
        let order = network.drainage_order().to_vec();
        let mut states = vec![PipeState::default(); models.len()];
        let mut inflow = vec![vec![0.0_f64; steps]; models.len()];
        let mut run = CalibrationRun {
            discharge: TimeSeriesMap::new(),
            fill_degree: TimeSeriesMap::new(),
            peak: None,
            status: RunStatus::Completed,
            steps_run: 0,
        };
        let outlet = network.outlet();
        ctx.sink().begin("verification", steps);

        for step in 0..steps {
            if ctx.is_cancelled() {
                info!(steps_run = run.steps_run, "verification cancelled");
                run.status = RunStatus::Cancelled;
                break;
            }
            let Some(time) = rain.time(step) else { break };
            let minutes = rain.minutes_at(step);
            let mut discharge_row = std::collections::BTreeMap::new();
            let mut fill_row = std::collections::BTreeMap::new();
            for &index in &order {
                let (Some(model), Some(state)) = (models.get(index), states.get_mut(index)) else {
                    continue;
                };
                let rain_rate = model.inflow_rate * rain.intensity(step, model.zone);
                state.local = model.retention * state.local + (1.0 - model.retention) * rain_rate;
                let upstream = inflow
                    .get(index)
                    .and_then(|row| row.get(step))
                    .copied()
                    .unwrap_or(0.0);
                let discharge = state.local + upstream;
                let (fill, speed) = self
                    .fill_and_speed(model, state, discharge, minutes, ctx)
                    .map_err(|error| SewerNetError::Numeric {
                        pipe: model.id,
                        error,
                    })?;
                if discharge > state.peak_discharge {
                    state.peak_discharge = discharge;
                    state.peak_minutes = minutes;
                    state.peak_fill = fill;
                    state.peak_speed = speed;
                }
                if let Some(slot) = model
                    .receiver
                    .and_then(|receiver| inflow.get_mut(receiver))
                    .and_then(|row| row.get_mut(step + model.lag))
                {
                    *slot += discharge;
                }
                discharge_row.insert(model.id, discharge);
                fill_row.insert(model.id, fill);
                if index == outlet
                    && self.params.track_peak()
                    && run.peak.is_none_or(|peak| discharge > peak.discharge)
                {
                    run.peak = Some(PeakDischarge {
                        time,
                        minutes,
                        discharge,
                    });
                }
            }
            run.discharge.insert(time, discharge_row);
            run.fill_degree.insert(time, fill_row);
            run.steps_run += 1;
            record_step();
            ctx.sink().worked(run.steps_run);
        }

        for (index, (model, state)) in models.iter().zip(&states).enumerate() {
            if let Some(pipe) = network.pipe_mut(index) {
                write_outputs(pipe, model, state);
            }
        }
        info!(
            steps_run = run.steps_run,
            peak = run.peak.map(|peak| peak.discharge),
            warnings = ctx.warnings().len(),
            "verification completed"
        );
        Ok(run)
    }

    fn models(
        &self,
        network: &NetworkGraph,
        rain: &RainfallSeries,
        ctx: &mut RunContext,
    ) -> Result<Vec<PipeModel>> {
        for pipe in network.pipes() {
            if pipe.attributes.diameter.is_none() {
                return Err(ConfigError::MissingAttribute {
                    pipe: pipe.id(),
                    attribute: "diameter",
                }
                .into());
            }
            if pipe.attributes.rain_zone >= rain.zones() {
                return Err(ConfigError::RainZoneOutOfRange {
                    pipe: pipe.id(),
                    zone: pipe.attributes.rain_zone,
                    zones: rain.zones(),
                }
                .into());
            }
        }

        let hydraulics = self.params.hydraulics();
        let dt = rain.time_step();
        let mut stats = vec![SubnetStats::default(); network.len()];
        let mut models: Vec<Option<PipeModel>> = vec![None; network.len()];
        for &index in network.drainage_order() {
            let Some(pipe) = network.pipe(index) else {
                continue;
            };
            let access = access_time(
                &pipe.attributes,
                hydraulics.area_exponent,
                hydraulics.slope_exponent,
            );
            let upstream = network
                .upstream(index)
                .iter()
                .filter_map(|&u| stats.get(u).copied());
            let subnet = SubnetStats::accumulate(&pipe.attributes, access, upstream);
            if let Some(slot) = stats.get_mut(index) {
                *slot = subnet;
            }
            let model = self.model(pipe, access, subnet, dt, ctx);
            if let Some(slot) = models.get_mut(index) {
                *slot = Some(model);
            }
        }
        Ok(models.into_iter().flatten().collect())
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "lags are non-negative whole step counts"
    )]
    fn model(
        &self,
        pipe: &PipeRecord,
        access: f64,
        subnet: SubnetStats,
        dt: f64,
        ctx: &mut RunContext,
    ) -> PipeModel {
        let hydraulics = self.params.hydraulics();
        let slope = effective_slope(pipe, ctx);
        let section = CrossSection::from_type(pipe.attributes.section, hydraulics.base_ratio);
        let flow = FlowConditions {
            section,
            ks: pipe.attributes.ks,
            slope,
        };
        let size = pipe.attributes.diameter.unwrap_or_default();
        let capacity = self.solver.capacity(&flow, size);
        let full_area = section.full_area(size);
        let full_speed = if full_area > 0.0 {
            section.discharge(flow.ks, slope, size, section.full_parameter()) / full_area
        } else {
            0.0
        };
        let lag = if full_speed > 0.0 {
            let travel = pipe.attributes.length / (hydraulics.celerity_factor * full_speed * 60.0);
            (travel / dt).round().max(0.0) as usize
        } else {
            0
        };
        PipeModel {
            id: pipe.id(),
            receiver: pipe.drain_index(),
            flow,
            size,
            capacity,
            full_area,
            retention: if access > 0.0 { (-dt / access).exp() } else { 0.0 },
            inflow_rate: pipe.attributes.runoff_coefficient * pipe.attributes.drain_area / 6.0,
            zone: pipe.attributes.rain_zone,
            lag,
            subnet,
        }
    }

    fn fill_and_speed(
        &self,
        model: &PipeModel,
        state: &mut PipeState,
        discharge: f64,
        minutes: f64,
        ctx: &mut RunContext,
    ) -> core::result::Result<(f64, f64), SolverError> {
        if discharge <= self.params.hydraulics().min_discharge {
            return Ok((0.0, 0.0));
        }
        if discharge >= model.capacity {
            if !state.surcharged {
                state.surcharged = true;
                ctx.warn(Warning::Surcharged {
                    pipe: model.id,
                    minutes,
                    discharge,
                    capacity: model.capacity,
                });
            }
            let speed = if model.full_area > 0.0 {
                discharge / model.full_area
            } else {
                0.0
            };
            return Ok((1.0, speed));
        }
        let solved = self
            .solver
            .fill_for_discharge(&model.flow, model.size, discharge)?;
        if !solved.converged && !state.unconverged {
            state.unconverged = true;
            ctx.warn(Warning::BisectionNotConverged {
                pipe: model.id,
                iterations: solved.iterations,
                residual: solved.residual,
            });
        }
        let section = model.flow.section;
        let area = section.wetted_area(model.size, solved.value);
        let speed = if area > 0.0 { discharge / area } else { 0.0 };
        debug!(pipe = %model.id, minutes, discharge, "fill solved");
        Ok((section.fill_for_parameter(solved.value), speed))
    }
}

fn write_outputs(pipe: &mut PipeRecord, model: &PipeModel, state: &PipeState) {
    let subnet = &model.subnet;
    let outputs = &mut pipe.outputs;
    outputs.discharge = state.peak_discharge;
    outputs.specific_discharge = if subnet.area > 0.0 {
        state.peak_discharge * 1000.0 / subnet.area
    } else {
        0.0
    };
    outputs.residence_time = subnet.access_time;
    outputs.peak_time = state.peak_minutes;
    outputs.mean_speed = state.peak_speed;
    outputs.pipe_slope = model.flow.slope;
    outputs.diameter = model.size;
    outputs.fill_degree = state.peak_fill;
    outputs.total_subnet_area = subnet.area;
    outputs.mean_length_subnet = subnet.mean_length;
    outputs.variance_length_subnet = subnet.variance();
}

#[cfg(feature = "metrics")]
fn record_step() {
    metrics::counter!("sewernet_time_steps").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_step() {}
