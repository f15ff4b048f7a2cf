//! Sewernet core library.
//!
//! Designs and verifies tree-shaped stormwater sewer networks: drain-target
//! reconstruction, topology validation, Gauckler–Strickler sizing by
//! bisection, design-storm synthesis, and linear-reservoir routing.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod calibration;
mod context;
mod design;
mod error;
mod hydraulics;
mod network;
mod params;
mod pipe;
mod rainfall;
mod result;
mod sewernet;
#[cfg(test)]
mod test_utils;

pub use crate::{
    builder::SewerNetBuilder,
    calibration::{CalibrationNetworkRunner, CalibrationRun},
    context::{CancellationToken, ProgressSink, RunContext, TracingSink, Warning, WarningLog},
    design::{DesignNetworkRunner, DesignProgress},
    error::{
        ConfigError, ConfigErrorCode, Result, SewerNetError, SewerNetErrorCode, SolverError,
        SolverErrorCode, TopologyErrorCode, TopologyViolation,
    },
    hydraulics::{
        Bisection, CrossSection, DEFAULT_ACCURACY, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_THETA,
        FlowConditions, HydraulicSolver, MAX_SECTION_SIZE, MIN_MAX_THETA, MIN_SECTION_SIZE,
        SolverParams, WATER_SPECIFIC_WEIGHT, bed_shear_stress, bisect,
    },
    network::{
        NetworkGraph, NetworkTopologyBuilder, NetworkValidator, TopologyInvariant, TopologySource,
    },
    params::{
        AlignMode, CalibrationParams, CalibrationParamsBuilder, DEFAULT_AREA_EXPONENT,
        DEFAULT_BASE_RATIO, DEFAULT_CELERITY_FACTOR, DEFAULT_DIAMETER_TOLERANCE, DEFAULT_EPSILON,
        DEFAULT_FREEBOARD, DEFAULT_HORIZON, DEFAULT_JUNCTION_LIMIT, DEFAULT_MIN_DISCHARGE,
        DEFAULT_MIN_FILL, DEFAULT_MINIMUM_DEPTH, DEFAULT_SLOPE_EXPONENT, DEFAULT_TP_MAX,
        DEFAULT_TP_MIN, DesignParams, DesignParamsBuilder, DiameterCatalog, ENDPOINT_TOLERANCE,
        HydraulicParams,
    },
    pipe::{
        Coordinate, DrainTarget, HydraulicOutputs, PipeAttributes, PipeId, PipeRecord, SectionType,
    },
    rainfall::{RainfallSample, RainfallSeries, RainfallSynthesizer, StormCurve},
    result::{
        CalibrationOutcome, DesignOutcome, PeakDischarge, PipeReport, RunStatus, TimeSeriesMap,
        reports,
    },
    sewernet::SewerNet,
};
