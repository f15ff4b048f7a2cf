//! Run orchestration for the sewernet engine.
//!
//! [`SewerNet`] assembles a validated [`NetworkGraph`] from pipe records and
//! hands it to the design or calibration runner. Fatal errors are reported
//! to the run's progress sink before they are returned.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::instrument;

use crate::{
    Result,
    calibration::CalibrationNetworkRunner,
    context::RunContext,
    design::DesignNetworkRunner,
    hydraulics::{HydraulicSolver, SolverParams},
    network::{NetworkGraph, NetworkTopologyBuilder, TopologySource},
    params::{CalibrationParams, DesignParams},
    pipe::{PipeId, PipeRecord},
    result::{CalibrationOutcome, DesignOutcome, reports},
};

/// Entry point for design and verification runs.
///
/// A `SewerNet` holds only validated settings; every run owns its records,
/// graph, and context, so one engine may serve many runs concurrently.
///
/// # Examples
/// ```
/// use sewernet_core::{
///     Coordinate, DesignParams, PipeAttributes, PipeId, PipeRecord, RunContext, SewerNetBuilder,
///     StormCurve,
/// };
///
/// let attrs = |top: f64| PipeAttributes {
///     initial_elevation: top,
///     final_elevation: top - 1.0,
///     ..PipeAttributes::default()
/// };
/// let pipes = vec![
///     PipeRecord::new(PipeId::new(1)?, Coordinate::new(0.0, 0.0), Coordinate::new(100.0, 0.0), attrs(10.0)),
///     PipeRecord::new(PipeId::new(2)?, Coordinate::new(100.0, 0.0), Coordinate::new(200.0, 0.0), attrs(9.0)),
/// ];
/// let engine = SewerNetBuilder::new().with_outlet(PipeId::new(2)?).build()?;
/// let params = DesignParams::builder(StormCurve::new(50.0, 0.3)?).build()?;
/// let outcome = engine.design(pipes, &params, &mut RunContext::default())?;
/// assert_eq!(outcome.processed, 2);
/// assert!(outcome.reports[1].diameter >= outcome.reports[0].diameter);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct SewerNet {
    topology: NetworkTopologyBuilder,
    outlet: Option<PipeId>,
    solver: HydraulicSolver,
}

impl SewerNet {
    pub(crate) fn new(
        topology: NetworkTopologyBuilder,
        outlet: Option<PipeId>,
        solver: SolverParams,
    ) -> Self {
        Self {
            topology,
            outlet,
            solver: HydraulicSolver::new(solver),
        }
    }

    /// Returns the configured junction limit.
    #[must_use]
    pub fn junction_limit(&self) -> usize {
        self.topology.junction_limit()
    }

    /// Returns the outlet used for geometric reconstruction, if any.
    #[must_use]
    pub fn outlet(&self) -> Option<PipeId> {
        self.outlet
    }

    /// Returns the solver used by every run.
    #[must_use]
    pub fn solver(&self) -> &HydraulicSolver {
        &self.solver
    }

    fn source(&self) -> TopologySource {
        self.outlet
            .map_or(TopologySource::Declared, |outlet| TopologySource::Geometric { outlet })
    }

    /// Resolves and validates the topology of `pipes`.
    ///
    /// # Errors
    /// Returns the configuration and topology errors of
    /// [`NetworkGraph::assemble`].
    pub fn assemble(&self, pipes: Vec<PipeRecord>) -> Result<NetworkGraph> {
        NetworkGraph::assemble(pipes, self.source(), &self.topology)
    }

    /// Sizes every pipe of `pipes` for the design storm of `params`.
    ///
    /// # Errors
    /// Returns configuration, topology, or numeric errors; each is reported
    /// to the sink of `ctx` first.
    #[instrument(name = "core.run_design", err, skip_all, fields(pipes = pipes.len()))]
    pub fn design(
        &self,
        pipes: Vec<PipeRecord>,
        params: &DesignParams,
        ctx: &mut RunContext,
    ) -> Result<DesignOutcome> {
        self.try_design(pipes, params, ctx).inspect_err(|err| ctx.report_error(err))
    }

    fn try_design(
        &self,
        pipes: Vec<PipeRecord>,
        params: &DesignParams,
        ctx: &mut RunContext,
    ) -> Result<DesignOutcome> {
        let runner = DesignNetworkRunner::new(params, self.solver)?;
        let mut network = self.assemble(pipes)?;
        let progress = runner.run(&mut network, ctx)?;
        Ok(DesignOutcome {
            reports: reports(&network),
            network,
            warnings: ctx.take_warnings(),
            status: progress.status,
            processed: progress.processed,
        })
    }

    /// Routes the rainfall of `params` through `pipes`, whose sizes are fixed.
    ///
    /// # Errors
    /// Returns configuration, topology, or numeric errors; each is reported
    /// to the sink of `ctx` first.
    #[instrument(name = "core.run_verify", err, skip_all, fields(pipes = pipes.len()))]
    pub fn verify(
        &self,
        pipes: Vec<PipeRecord>,
        params: &CalibrationParams,
        ctx: &mut RunContext,
    ) -> Result<CalibrationOutcome> {
        self.try_verify(pipes, params, ctx).inspect_err(|err| ctx.report_error(err))
    }

    fn try_verify(
        &self,
        pipes: Vec<PipeRecord>,
        params: &CalibrationParams,
        ctx: &mut RunContext,
    ) -> Result<CalibrationOutcome> {
        let runner = CalibrationNetworkRunner::new(params, self.solver);
        let rain = runner.establish_rainfall(ctx)?;
        let mut network = self.assemble(pipes)?;
        let run = runner.run_with(&mut network, &rain, ctx)?;
        Ok(CalibrationOutcome {
            network,
            discharge: run.discharge,
            fill_degree: run.fill_degree,
            peak: run.peak,
            warnings: ctx.take_warnings(),
            status: run.status,
            steps_run: run.steps_run,
        })
    }

    /// Designs independent networks, each with a fork of `ctx`.
    ///
    /// Results are returned in input order. With the `parallel` feature the
    /// runs execute on the rayon pool.
    #[must_use]
    pub fn design_batch(
        &self,
        networks: Vec<Vec<PipeRecord>>,
        params: &DesignParams,
        ctx: &RunContext,
    ) -> Vec<Result<DesignOutcome>> {
        let run = |pipes: Vec<PipeRecord>| self.design(pipes, params, &mut ctx.fork());
        #[cfg(feature = "parallel")]
        {
            networks.into_par_iter().map(run).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            networks.into_iter().map(run).collect()
        }
    }

    /// Verifies independent networks, each with a fork of `ctx`.
    ///
    /// Results are returned in input order. With the `parallel` feature the
    /// runs execute on the rayon pool.
    #[must_use]
    pub fn verify_batch(
        &self,
        networks: Vec<Vec<PipeRecord>>,
        params: &CalibrationParams,
        ctx: &RunContext,
    ) -> Vec<Result<CalibrationOutcome>> {
        let run = |pipes: Vec<PipeRecord>| self.verify(pipes, params, &mut ctx.fork());
        #[cfg(feature = "parallel")]
        {
            networks.into_par_iter().map(run).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            networks.into_iter().map(run).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConfigError, SewerNetBuilder, SewerNetError, StormCurve, TopologyViolation,
        pipe::DrainTarget, test_utils::linear_chain,
    };
    use rstest::{fixture, rstest};

    fn id(raw: u32) -> PipeId {
        PipeId::new(raw).expect("non-zero id")
    }

    #[fixture]
    fn design_params() -> DesignParams {
        DesignParams::builder(StormCurve::new(50.0, 0.3).expect("valid curve"))
            .build()
            .expect("valid params")
    }

    #[rstest]
    fn design_reports_every_pipe(design_params: DesignParams) {
        let engine = SewerNetBuilder::new()
            .with_outlet(id(3))
            .build()
            .expect("valid engine");
        let outcome = engine
            .design(linear_chain(3), &design_params, &mut RunContext::default())
            .expect("design succeeds");
        assert_eq!(outcome.reports.len(), 3);
        assert_eq!(outcome.reports[2].drains_to, 0);
        assert_eq!(outcome.reports[0].drains_to, 2);
    }

    #[rstest]
    fn missing_outlet_never_defaults(design_params: DesignParams) {
        let engine = SewerNetBuilder::new()
            .with_outlet(id(9))
            .build()
            .expect("valid engine");
        let err = engine
            .design(linear_chain(3), &design_params, &mut RunContext::default())
            .expect_err("outlet 9 does not exist");
        assert_eq!(
            err,
            SewerNetError::Config(ConfigError::MissingOutlet { outlet: id(9) })
        );
    }

    #[rstest]
    fn declared_topology_is_validated(design_params: DesignParams) {
        let mut pipes = linear_chain(2);
        pipes[0] = pipes[0].clone().with_drain_target(DrainTarget::Pipe(id(1)));
        pipes[1] = pipes[1].clone().with_drain_target(DrainTarget::Outlet);
        let engine = SewerNetBuilder::new().build().expect("valid engine");
        let err = engine
            .design(pipes, &design_params, &mut RunContext::default())
            .expect_err("self loop must fail");
        assert!(matches!(
            err,
            SewerNetError::Topology(TopologyViolation::SelfLoop { .. })
        ));
    }

    #[rstest]
    fn batch_preserves_input_order(design_params: DesignParams) {
        let engine = SewerNetBuilder::new()
            .with_outlet(id(2))
            .build()
            .expect("valid engine");
        let mut detached = linear_chain(3);
        detached[2] = crate::test_utils::pipe_between(3, (500.0, 500.0), (600.0, 500.0));
        let results = engine.design_batch(
            vec![linear_chain(2), linear_chain(1), detached],
            &design_params,
            &RunContext::default(),
        );
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err(), "outlet 2 is absent from a single pipe");
        assert_eq!(
            results[2].as_ref().err(),
            Some(&SewerNetError::Topology(TopologyViolation::Unresolved { pipe: id(3) }))
        );
    }
}
