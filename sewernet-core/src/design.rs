//! Design mode: size every pipe for the design storm in drainage order.

use tracing::{debug, info, instrument};

use crate::{
    Result,
    context::{RunContext, Warning},
    error::{ConfigError, SewerNetError, SolverError},
    hydraulics::{CrossSection, FlowConditions, HydraulicSolver, bed_shear_stress},
    network::NetworkGraph,
    params::{AlignMode, DesignParams},
    pipe::{HydraulicOutputs, PipeAttributes, PipeRecord},
    result::RunStatus,
};

/// Speed assumed before the first fixed-point iteration, in m/s.
const INITIAL_SPEED: f64 = 1.0;

/// Area-weighted statistics of the subnet draining through a pipe.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct SubnetStats {
    pub(crate) area: f64,
    pub(crate) mean_length: f64,
    pub(crate) second_moment: f64,
    pub(crate) runoff: f64,
    pub(crate) access_time: f64,
}

impl SubnetStats {
    /// Combines the local sub-basin of `attributes` with upstream subnets.
    ///
    /// Every upstream flow path is extended by this pipe's length.
    pub(crate) fn accumulate(
        attributes: &PipeAttributes,
        access_time: f64,
        upstream: impl IntoIterator<Item = Self>,
    ) -> Self {
        let length = attributes.length;
        let local = attributes.drain_area;
        let mut area = local;
        let mut length_sum = local * length;
        let mut square_sum = local * length * length;
        let mut runoff_sum = local * attributes.runoff_coefficient;
        let mut access_sum = local * access_time;
        for sub in upstream {
            area += sub.area;
            length_sum += sub.area * (sub.mean_length + length);
            square_sum +=
                sub.area * (sub.second_moment + 2.0 * sub.mean_length * length + length * length);
            runoff_sum += sub.area * sub.runoff;
            access_sum += sub.area * sub.access_time;
        }
        if area <= 0.0 {
            return Self {
                area: 0.0,
                mean_length: length,
                second_moment: length * length,
                runoff: attributes.runoff_coefficient,
                access_time,
            };
        }
        Self {
            area,
            mean_length: length_sum / area,
            second_moment: square_sum / area,
            runoff: runoff_sum / area,
            access_time: access_sum / area,
        }
    }

    pub(crate) fn variance(&self) -> f64 {
        (self.second_moment - self.mean_length * self.mean_length).max(0.0)
    }
}

/// Access time of a sub-basin in minutes: `τ·a^exponent·s^(−γ)`.
///
/// A basin without slope information keeps `τ·a^exponent`.
pub(crate) fn access_time(attributes: &PipeAttributes, area_exponent: f64, slope_exponent: f64) -> f64 {
    let base = attributes.average_residence_time * attributes.drain_area.powf(area_exponent);
    if attributes.average_slope > 0.0 {
        base * attributes.average_slope.powf(-slope_exponent)
    } else {
        base
    }
}

/// Geometric slope of a pipe, replaced by its minimum when flatter.
pub(crate) fn effective_slope(pipe: &PipeRecord, ctx: &mut RunContext) -> f64 {
    let attributes = &pipe.attributes;
    let slope = (attributes.initial_elevation - attributes.final_elevation) / attributes.length;
    if slope < attributes.minimum_slope {
        ctx.warn(Warning::SlopeBelowMinimum {
            pipe: pipe.id(),
            slope,
            minimum: attributes.minimum_slope,
        });
        attributes.minimum_slope
    } else {
        slope
    }
}

/// Sizes pipes for a design storm.
#[derive(Clone, Copy, Debug)]
pub struct DesignNetworkRunner<'a> {
    params: &'a DesignParams,
    solver: HydraulicSolver,
}

/// Counters returned by [`DesignNetworkRunner::run`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DesignProgress {
    /// Completion status.
    pub status: RunStatus,
    /// Pipes sized.
    pub processed: usize,
}

impl<'a> DesignNetworkRunner<'a> {
    /// Creates a runner, checking the design fill against the solver's
    /// maximum fill angle.
    ///
    /// # Errors
    /// Returns [`ConfigError::DesignFillAboveMaxAngle`] when the design fill
    /// of circular pipes needs a wider angle than the solver allows.
    pub fn new(params: &'a DesignParams, solver: HydraulicSolver) -> Result<Self> {
        let angle = CrossSection::Circular.parameter_for_fill(params.design_fill());
        let max = solver.params().max_theta();
        if angle > max {
            return Err(ConfigError::DesignFillAboveMaxAngle {
                fill: params.design_fill(),
                angle,
                max,
            }
            .into());
        }
        Ok(Self { params, solver })
    }

    /// Visits every pipe once in drainage order, writing its outputs.
    ///
    /// Cancellation is checked before each pipe; outputs of a pipe are
    /// written in one assignment.
    ///
    /// # Errors
    /// Returns [`SewerNetError::Numeric`] when sizing fails for a pipe.
    #[instrument(name = "core.design", err, skip_all, fields(pipes = network.len()))]
    pub fn run(&self, network: &mut NetworkGraph, ctx: &mut RunContext) -> Result<DesignProgress> {
        let order = network.drainage_order().to_vec();
        let mut stats = vec![SubnetStats::default(); network.len()];
        ctx.sink().begin("design", order.len());
        let mut processed = 0;
        for index in order {
            if ctx.is_cancelled() {
                info!(processed, "design cancelled");
                return Ok(DesignProgress {
                    status: RunStatus::Cancelled,
                    processed,
                });
            }
            let upstream: Vec<usize> = network.upstream(index).to_vec();
            let Some(pipe) = network.pipe(index) else {
                continue;
            };
            let upstream_stats = upstream.iter().filter_map(|&u| stats.get(u).copied());
            let hydraulics = self.params.hydraulics();
            let local_access = access_time(
                &pipe.attributes,
                hydraulics.area_exponent,
                hydraulics.slope_exponent,
            );
            let subnet = SubnetStats::accumulate(&pipe.attributes, local_access, upstream_stats);
            let upstream_outputs: Vec<&HydraulicOutputs> = upstream
                .iter()
                .filter_map(|&u| network.pipe(u).map(|p| &p.outputs))
                .collect();
            let outputs = self
                .design_pipe(pipe, &subnet, &upstream_outputs, ctx)
                .map_err(|error| SewerNetError::Numeric {
                    pipe: pipe.id(),
                    error,
                })?;
            if let Some(slot) = stats.get_mut(index) {
                *slot = subnet;
            }
            if let Some(target) = network.pipe_mut(index) {
                target.outputs = outputs;
            }
            processed += 1;
            ctx.sink().worked(processed);
        }
        info!(processed, warnings = ctx.warnings().len(), "design completed");
        Ok(DesignProgress {
            status: RunStatus::Completed,
            processed,
        })
    }

    #[instrument(
        name = "core.design_pipe",
        level = "debug",
        skip_all,
        fields(pipe = %pipe.id(), area = subnet.area),
    )]
    fn design_pipe(
        &self,
        pipe: &PipeRecord,
        subnet: &SubnetStats,
        upstream: &[&HydraulicOutputs],
        ctx: &mut RunContext,
    ) -> core::result::Result<HydraulicOutputs, SolverError> {
        let params = self.params;
        let hydraulics = params.hydraulics();
        let id = pipe.id();
        let slope = effective_slope(pipe, ctx);
        let section = CrossSection::from_type(pipe.attributes.section, hydraulics.base_ratio);
        let flow = FlowConditions {
            section,
            ks: pipe.attributes.ks,
            slope,
        };
        let design_parameter = section.parameter_for_fill(params.design_fill());
        let upstream_size = upstream
            .iter()
            .map(|out| out.diameter)
            .fold(0.0_f64, f64::max);
        let (tp_min, tp_max) = params.rain_duration_range();

        let mut speed = INITIAL_SPEED;
        let mut settled = false;
        let mut iterations = 0;
        let mut state = IterationState::default();
        while iterations < self.solver.params().max_iterations() {
            iterations += 1;
            let residence = subnet.access_time
                + subnet.mean_length / (hydraulics.celerity_factor * speed * 60.0);
            let duration = residence.clamp(tp_min, tp_max);
            let intensity = params.storm().intensity(duration);
            let computed = subnet.runoff * subnet.area * intensity / 6.0;
            let discharge = computed.max(hydraulics.min_discharge);
            let sized = self
                .solver
                .size_for_discharge(&flow, discharge, design_parameter)?;
            let size = self.select_size(&flow, sized.value, upstream_size, discharge);
            let parameter = self.fill_parameter(&flow, size.value, discharge)?;
            let area = section.wetted_area(size.value, parameter);
            let next_speed = if area > 0.0 { discharge / area } else { speed };
            state = IterationState {
                residence,
                duration,
                computed,
                discharge,
                sized_converged: sized.converged,
                sized_iterations: sized.iterations,
                sized_residual: sized.residual,
                catalog_exhausted: size.exhausted,
                size: size.value,
                parameter,
                speed: next_speed,
            };
            let change = (next_speed - speed).abs() / speed;
            speed = next_speed;
            if change <= params.epsilon() {
                settled = true;
                break;
            }
        }

        if !settled {
            ctx.warn(Warning::DischargeNotConverged { pipe: id, iterations });
        }
        if state.computed < hydraulics.min_discharge {
            ctx.warn(Warning::DischargeBelowMinimum {
                pipe: id,
                discharge: state.computed,
                minimum: hydraulics.min_discharge,
            });
        }
        if state.residence > tp_max {
            ctx.warn(Warning::RainDurationClamped {
                pipe: id,
                computed: state.residence,
                used: state.duration,
            });
        }
        if !state.sized_converged {
            ctx.warn(Warning::BisectionNotConverged {
                pipe: id,
                iterations: state.sized_iterations,
                residual: state.sized_residual,
            });
        }
        if state.catalog_exhausted {
            ctx.warn(Warning::CatalogExhausted {
                pipe: id,
                size: state.size,
            });
        }
        let fill = section.fill_for_parameter(state.parameter);
        let radius = section.hydraulic_radius(state.size, state.parameter);
        let shear = bed_shear_stress(radius, slope);
        if shear < params.tau() {
            ctx.warn(Warning::SelfCleaningNotMet {
                pipe: id,
                shear,
                required: params.tau(),
            });
        }
        if fill < params.min_fill() {
            ctx.warn(Warning::FillBelowMinimum {
                pipe: id,
                fill,
                minimum: params.min_fill(),
            });
        }

        let mut outputs = HydraulicOutputs {
            discharge: state.discharge,
            specific_discharge: if subnet.area > 0.0 {
                state.discharge * 1000.0 / subnet.area
            } else {
                0.0
            },
            residence_time: state.residence,
            rain_duration: state.duration,
            peak_time: state.duration,
            mean_speed: state.speed,
            pipe_slope: slope,
            diameter: state.size,
            fill_degree: fill,
            total_subnet_area: subnet.area,
            mean_length_subnet: subnet.mean_length,
            variance_length_subnet: subnet.variance(),
            ..HydraulicOutputs::default()
        };
        self.place(pipe, &mut outputs, upstream);
        debug!(
            discharge = outputs.discharge,
            diameter = outputs.diameter,
            fill = outputs.fill_degree,
            "pipe sized"
        );
        Ok(outputs)
    }

    /// Picks the adopted size: catalog snapping with tolerance, never smaller
    /// than any upstream pipe.
    fn select_size(
        &self,
        flow: &FlowConditions,
        continuous: f64,
        upstream_size: f64,
        discharge: f64,
    ) -> SizeChoice {
        let fallback = continuous.max(upstream_size);
        let Some(catalog) = self.params.catalog() else {
            return SizeChoice {
                value: fallback,
                exhausted: false,
            };
        };
        catalog
            .candidates(continuous, self.params.tolerance())
            .filter(|candidate| *candidate >= upstream_size)
            .find(|candidate| self.solver.capacity(flow, *candidate) >= discharge)
            .map_or(
                SizeChoice {
                    value: fallback,
                    exhausted: true,
                },
                |value| SizeChoice {
                    value,
                    exhausted: false,
                },
            )
    }

    fn fill_parameter(
        &self,
        flow: &FlowConditions,
        size: f64,
        discharge: f64,
    ) -> core::result::Result<f64, SolverError> {
        if discharge >= self.solver.capacity(flow, size) {
            return Ok(flow.section.max_parameter(self.solver.params().max_theta()));
        }
        Ok(self.solver.fill_for_discharge(flow, size, discharge)?.value)
    }

    /// Sets burial depths and free surfaces from cover and alignment.
    fn place(&self, pipe: &PipeRecord, outputs: &mut HydraulicOutputs, upstream: &[&HydraulicOutputs]) {
        let attributes = &pipe.attributes;
        let size = outputs.diameter;
        let water_depth = outputs.fill_degree * size;
        let required = if attributes.section.is_open() {
            size.max(water_depth + self.params.freeboard())
        } else {
            size + self.params.minimum_depth()
        };
        let mut invert_up = attributes.initial_elevation - required;
        for up in upstream {
            let limit = match self.params.align() {
                AlignMode::Invert => up.invert_final,
                AlignMode::FreeSurface => up.free_surface_final - water_depth,
            };
            invert_up = invert_up.min(limit);
        }
        let mut invert_down = invert_up - outputs.pipe_slope * attributes.length;
        let shortfall = required - (attributes.final_elevation - invert_down);
        if shortfall > 0.0 {
            invert_up -= shortfall;
            invert_down -= shortfall;
        }
        outputs.invert_initial = invert_up;
        outputs.invert_final = invert_down;
        outputs.depth_initial = attributes.initial_elevation - invert_up;
        outputs.depth_final = attributes.final_elevation - invert_down;
        outputs.free_surface_initial = invert_up + water_depth;
        outputs.free_surface_final = invert_down + water_depth;
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct IterationState {
    residence: f64,
    duration: f64,
    computed: f64,
    discharge: f64,
    sized_converged: bool,
    sized_iterations: u32,
    sized_residual: f64,
    catalog_exhausted: bool,
    size: f64,
    parameter: f64,
    speed: f64,
}

#[derive(Clone, Copy, Debug)]
struct SizeChoice {
    value: f64,
    exhausted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DiameterCatalog, StormCurve,
        network::{NetworkTopologyBuilder, TopologySource},
        pipe::PipeId,
        test_utils::linear_chain,
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn params() -> DesignParams {
        DesignParams::builder(StormCurve::new(50.0, 0.3).expect("valid curve"))
            .build()
            .expect("valid params")
    }

    fn chain(len: u32) -> NetworkGraph {
        NetworkGraph::assemble(
            linear_chain(len),
            TopologySource::Geometric {
                outlet: PipeId::new(len).expect("non-zero id"),
            },
            &NetworkTopologyBuilder::default(),
        )
        .expect("chain assembles")
    }

    #[test]
    fn subnet_stats_weight_by_area() {
        let attributes = PipeAttributes {
            length: 10.0,
            drain_area: 1.0,
            runoff_coefficient: 0.4,
            ..PipeAttributes::default()
        };
        let upstream = SubnetStats {
            area: 3.0,
            mean_length: 20.0,
            second_moment: 400.0,
            runoff: 0.8,
            access_time: 10.0,
        };
        let stats = SubnetStats::accumulate(&attributes, 2.0, [upstream]);
        assert!((stats.area - 4.0).abs() < 1e-12);
        assert!((stats.mean_length - (10.0 + 3.0 * 30.0) / 4.0).abs() < 1e-12);
        assert!((stats.runoff - 0.7).abs() < 1e-12);
        assert!((stats.access_time - 8.0).abs() < 1e-12);
        // lengths 10 (w 1) and 30 (w 3): mean 25, variance 75
        assert!((stats.variance() - 75.0).abs() < 1e-9);
    }

    #[rstest]
    fn sizes_never_decrease_downstream(params: DesignParams) {
        let mut network = chain(3);
        let mut ctx = RunContext::default();
        let runner = DesignNetworkRunner::new(&params, HydraulicSolver::default())
            .expect("valid runner");
        let progress = runner.run(&mut network, &mut ctx).expect("design succeeds");
        assert_eq!(progress.status, RunStatus::Completed);
        assert_eq!(progress.processed, 3);
        let sizes: Vec<f64> = network.pipes().iter().map(|p| p.outputs.diameter).collect();
        assert!(sizes[0] <= sizes[1] && sizes[1] <= sizes[2]);
        let outlet = &network.pipes()[2].outputs;
        assert!((outlet.total_subnet_area - 3.0).abs() < 1e-12);
    }

    #[rstest]
    fn catalog_sizes_are_adopted(params: DesignParams) {
        let catalog = DiameterCatalog::new(vec![0.2, 0.3, 0.4, 0.5, 0.6, 0.8, 1.0, 1.2, 1.5])
            .expect("valid catalog");
        let params = DesignParams::builder(*params.storm())
            .with_catalog(catalog.clone())
            .build()
            .expect("valid params");
        let mut network = chain(3);
        let runner = DesignNetworkRunner::new(&params, HydraulicSolver::default())
            .expect("valid runner");
        runner
            .run(&mut network, &mut RunContext::default())
            .expect("design succeeds");
        for pipe in network.pipes() {
            assert!(catalog.sizes().contains(&pipe.outputs.diameter));
        }
    }

    #[rstest]
    fn flat_ground_substitutes_minimum_slope(params: DesignParams) {
        let mut network = chain(2);
        let mut ctx = RunContext::default();
        DesignNetworkRunner::new(&params, HydraulicSolver::default())
            .expect("valid runner")
            .run(&mut network, &mut ctx)
            .expect("design succeeds");
        let flat = ctx
            .warnings()
            .iter()
            .filter(|w| matches!(w, Warning::SlopeBelowMinimum { .. }))
            .count();
        assert_eq!(flat, 0, "the chain fixture falls steeper than the minimum");
        let mut pipes = linear_chain(2);
        for pipe in &mut pipes {
            pipe.attributes.final_elevation = pipe.attributes.initial_elevation;
        }
        let mut network = NetworkGraph::assemble(
            pipes,
            TopologySource::Geometric {
                outlet: PipeId::new(2).expect("non-zero id"),
            },
            &NetworkTopologyBuilder::default(),
        )
        .expect("chain assembles");
        let mut ctx = RunContext::default();
        DesignNetworkRunner::new(&params, HydraulicSolver::default())
            .expect("valid runner")
            .run(&mut network, &mut ctx)
            .expect("design succeeds");
        assert_eq!(
            ctx.warnings()
                .iter()
                .filter(|w| matches!(w, Warning::SlopeBelowMinimum { .. }))
                .count(),
            2
        );
        for pipe in network.pipes() {
            assert!((pipe.outputs.pipe_slope - pipe.attributes.minimum_slope).abs() < 1e-12);
        }
    }

    #[rstest]
    fn cover_is_respected(params: DesignParams) {
        let mut network = chain(3);
        DesignNetworkRunner::new(&params, HydraulicSolver::default())
            .expect("valid runner")
            .run(&mut network, &mut RunContext::default())
            .expect("design succeeds");
        for pipe in network.pipes() {
            let out = &pipe.outputs;
            let required = out.diameter + params.minimum_depth();
            assert!(out.depth_initial >= required - 1e-9);
            assert!(out.depth_final >= required - 1e-9);
            assert!(out.free_surface_initial > out.invert_initial);
        }
    }

    #[rstest]
    #[case::invert(AlignMode::Invert)]
    #[case::free_surface(AlignMode::FreeSurface)]
    fn alignment_never_rises_above_upstream(#[case] align: AlignMode, params: DesignParams) {
        let params = DesignParams::builder(*params.storm())
            .with_align(align)
            .build()
            .expect("valid params");
        let mut network = chain(3);
        DesignNetworkRunner::new(&params, HydraulicSolver::default())
            .expect("valid runner")
            .run(&mut network, &mut RunContext::default())
            .expect("design succeeds");
        for (index, pipe) in network.pipes().iter().enumerate() {
            for &up in network.upstream(index) {
                let upstream = &network.pipes()[up].outputs;
                match align {
                    AlignMode::Invert => {
                        assert!(pipe.outputs.invert_initial <= upstream.invert_final + 1e-9);
                    }
                    AlignMode::FreeSurface => assert!(
                        pipe.outputs.free_surface_initial <= upstream.free_surface_final + 1e-9
                    ),
                }
            }
        }
    }

    #[rstest]
    fn cancellation_stops_before_first_pipe(params: DesignParams) {
        let mut network = chain(3);
        let ctx_token = crate::CancellationToken::new();
        ctx_token.cancel();
        let mut ctx = RunContext::default().with_cancellation(ctx_token);
        let progress = DesignNetworkRunner::new(&params, HydraulicSolver::default())
            .expect("valid runner")
            .run(&mut network, &mut ctx)
            .expect("cancellation is not an error");
        assert_eq!(progress.status, RunStatus::Cancelled);
        assert_eq!(progress.processed, 0);
        assert!(network.pipes().iter().all(|p| p.outputs == HydraulicOutputs::default()));
    }

    #[test]
    fn design_fill_above_max_angle_is_rejected() {
        let params = DesignParams::builder(StormCurve::new(50.0, 0.3).expect("valid curve"))
            .with_design_fill(0.95)
            .build()
            .expect("valid params");
        let solver = HydraulicSolver::new(
            crate::SolverParams::new(1e-5, 40, 4.0).expect("valid solver params"),
        );
        let err = DesignNetworkRunner::new(&params, solver).expect_err("angle too wide");
        assert!(matches!(
            err,
            SewerNetError::Config(ConfigError::DesignFillAboveMaxAngle { .. })
        ));
    }
}
