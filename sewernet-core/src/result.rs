//! Run outcomes and the flat per-pipe report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    context::WarningLog,
    network::NetworkGraph,
    pipe::{PipeId, PipeRecord, SectionType},
};

/// How a run ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunStatus {
    /// Every pipe or time step was processed.
    Completed,
    /// Cancellation was requested; results are partial.
    Cancelled,
}

/// Flat, serialisable row of one pipe's identity, inputs, and outputs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PipeReport {
    /// Pipe identifier.
    pub id: u32,
    /// Receiving pipe, 0 for the outlet.
    pub drains_to: u32,
    /// Cross-section shape.
    pub section: SectionType,
    /// Pipe length in metres.
    pub length: f64,
    /// Local drained area in hectares.
    pub drain_area: f64,
    /// Peak discharge in m³/s.
    pub discharge: f64,
    /// Discharge per hectare in l/(s·ha).
    pub specific_discharge: f64,
    /// Concentration time in minutes.
    pub residence_time: f64,
    /// Critical rain duration in minutes.
    pub rain_duration: f64,
    /// Minutes to the peak discharge.
    pub peak_time: f64,
    /// Mean flow speed in m/s.
    pub mean_speed: f64,
    /// Pipe slope.
    pub pipe_slope: f64,
    /// Section size in metres.
    pub diameter: f64,
    /// Fill degree.
    pub fill_degree: f64,
    /// Invert depth at the upstream end in metres.
    pub depth_initial: f64,
    /// Invert depth at the downstream end in metres.
    pub depth_final: f64,
    /// Free-surface elevation at the upstream end.
    pub free_surface_initial: f64,
    /// Free-surface elevation at the downstream end.
    pub free_surface_final: f64,
    /// Cumulative drained area in hectares.
    pub total_subnet_area: f64,
    /// Mean flow-path length of the subnet in metres.
    pub mean_length_subnet: f64,
    /// Variance of the subnet flow-path length in m².
    pub variance_length_subnet: f64,
}

impl From<&PipeRecord> for PipeReport {
    fn from(pipe: &PipeRecord) -> Self {
        let out = &pipe.outputs;
        Self {
            id: pipe.id().get(),
            drains_to: pipe.drains_to().map_or(0, |target| target.raw()),
            section: pipe.attributes.section,
            length: pipe.attributes.length,
            drain_area: pipe.attributes.drain_area,
            discharge: out.discharge,
            specific_discharge: out.specific_discharge,
            residence_time: out.residence_time,
            rain_duration: out.rain_duration,
            peak_time: out.peak_time,
            mean_speed: out.mean_speed,
            pipe_slope: out.pipe_slope,
            diameter: out.diameter,
            fill_degree: out.fill_degree,
            depth_initial: out.depth_initial,
            depth_final: out.depth_final,
            free_surface_initial: out.free_surface_initial,
            free_surface_final: out.free_surface_final,
            total_subnet_area: out.total_subnet_area,
            mean_length_subnet: out.mean_length_subnet,
            variance_length_subnet: out.variance_length_subnet,
        }
    }
}

/// Builds one report row per pipe in input order.
#[must_use]
pub fn reports(network: &NetworkGraph) -> Vec<PipeReport> {
    network.pipes().iter().map(PipeReport::from).collect()
}

/// Result of a design run.
#[derive(Clone, Debug)]
pub struct DesignOutcome {
    /// Network with computed outputs.
    pub network: NetworkGraph,
    /// Flat rows for persistence.
    pub reports: Vec<PipeReport>,
    /// Accumulated warnings.
    pub warnings: WarningLog,
    /// Completion status.
    pub status: RunStatus,
    /// Number of pipes sized.
    pub processed: usize,
}

/// Per-step, per-pipe values keyed by step timestamp.
pub type TimeSeriesMap = BTreeMap<DateTime<Utc>, BTreeMap<PipeId, f64>>;

/// Largest outlet discharge of a verification run.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PeakDischarge {
    /// Timestamp of the step.
    pub time: DateTime<Utc>,
    /// Minutes from the series start.
    pub minutes: f64,
    /// Outlet discharge in m³/s.
    pub discharge: f64,
}

/// Result of a verification run.
#[derive(Clone, Debug)]
pub struct CalibrationOutcome {
    /// Network whose outputs hold each pipe's peak values.
    pub network: NetworkGraph,
    /// Discharge in m³/s per step and pipe.
    pub discharge: TimeSeriesMap,
    /// Fill degree per step and pipe.
    pub fill_degree: TimeSeriesMap,
    /// Outlet peak, when tracking was requested.
    pub peak: Option<PeakDischarge>,
    /// Accumulated warnings.
    pub warnings: WarningLog,
    /// Completion status.
    pub status: RunStatus,
    /// Number of time steps executed.
    pub steps_run: usize,
}

impl CalibrationOutcome {
    /// Flat rows for persistence.
    #[must_use]
    pub fn reports(&self) -> Vec<PipeReport> {
        reports(&self.network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        network::{NetworkTopologyBuilder, TopologySource},
        test_utils::linear_chain,
    };

    fn chain() -> NetworkGraph {
        NetworkGraph::assemble(
            linear_chain(2),
            TopologySource::Geometric {
                outlet: PipeId::new(2).expect("non-zero id"),
            },
            &NetworkTopologyBuilder::default(),
        )
        .expect("chain assembles")
    }

    #[test]
    fn reports_follow_input_order() {
        let rows = reports(&chain());
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].id, rows[0].drains_to), (1, 2));
        assert_eq!((rows[1].id, rows[1].drains_to), (2, 0));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn reports_serialise_flat() {
        let rows = reports(&chain());
        let json = serde_json::to_value(&rows[0]).expect("report serialises");
        assert_eq!(json["id"], 1);
        assert_eq!(json["section"], "circular");
        assert!(json["diameter"].is_number());
    }
}
