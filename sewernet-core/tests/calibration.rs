//! Verification runs through the `SewerNet` facade.

mod common;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use common::{id, pipe, three_pipe_line};
use rstest::{fixture, rstest};
use sewernet_core::{
    CalibrationParams, ConfigError, PipeRecord, ProgressSink, RainfallSample, RainfallSeries,
    RunContext, RunStatus, SewerNet, SewerNetBuilder, SewerNetError, StormCurve,
};
use sewernet_test_support::tracing::RecordingLayer;

#[fixture]
fn engine() -> SewerNet {
    SewerNetBuilder::new()
        .with_outlet(id(3))
        .build()
        .expect("valid engine")
}

#[fixture]
fn storm_params() -> CalibrationParams {
    CalibrationParams::builder()
        .with_storm(StormCurve::new(50.0, 0.3).expect("valid curve"))
        .with_time_step(5.0)
        .with_horizon(90.0)
        .with_rain_duration(30.0)
        .with_track_peak(true)
        .build()
        .expect("valid params")
}

/// Fixes the size of every pipe for verification.
fn sized(mut pipes: Vec<PipeRecord>, diameter: f64) -> Vec<PipeRecord> {
    for pipe in &mut pipes {
        pipe.attributes.diameter = Some(diameter);
    }
    pipes
}

fn at(minutes: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minutes)
}

#[derive(Default)]
struct ErrorSink(Mutex<Vec<String>>);

impl ProgressSink for ErrorSink {
    fn begin(&self, _task: &str, _total: usize) {}
    fn worked(&self, _done: usize) {}
    fn message(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, message: &str) {
        self.0.lock().expect("lock").push(message.to_owned());
    }
}

#[rstest]
fn missing_rain_fails_before_any_step(engine: SewerNet) {
    let params = CalibrationParams::builder().build().expect("valid params");
    let sink = Arc::new(ErrorSink::default());
    let mut ctx = RunContext::new(sink.clone());
    let (result, layer) = RecordingLayer::capture(|| {
        engine.verify(sized(three_pipe_line(), 0.6), &params, &mut ctx)
    });
    let err = result.expect_err("rain is required");
    assert_eq!(err, SewerNetError::Config(ConfigError::MissingRainfall));
    assert_eq!(sink.0.lock().expect("lock").len(), 1);
    assert!(
        layer.events().iter().all(|e| e.field("steps_run").is_none()),
        "no step may run"
    );
}

#[rstest]
fn missing_rain_is_reported_before_topology(engine: SewerNet) {
    let params = CalibrationParams::builder().build().expect("valid params");
    let mut pipes = sized(three_pipe_line(), 0.6);
    pipes[1] = pipe(2, (500.0, 500.0), (600.0, 500.0));
    let err = engine
        .verify(pipes, &params, &mut RunContext::default())
        .expect_err("rain is required");
    assert_eq!(err, SewerNetError::Config(ConfigError::MissingRainfall));
}

#[rstest]
fn storm_run_tracks_outlet_peak(engine: SewerNet, storm_params: CalibrationParams) {
    let outcome = engine
        .verify(sized(three_pipe_line(), 0.8), &storm_params, &mut RunContext::default())
        .expect("verification succeeds");
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.steps_run, 18);
    assert_eq!(outcome.discharge.len(), 18);
    assert_eq!(outcome.fill_degree.len(), 18);
    let peak = outcome.peak.expect("peak tracked");
    let outlet_series: Vec<f64> = outcome
        .discharge
        .values()
        .filter_map(|row| row.get(&id(3)).copied())
        .collect();
    let max = outlet_series.iter().copied().fold(0.0_f64, f64::max);
    assert!((peak.discharge - max).abs() < 1e-12);
    let outlet = &outcome.reports()[2];
    assert!((outlet.discharge - max).abs() < 1e-12);
    assert!((outlet.peak_time - peak.minutes).abs() < 1e-12);
}

#[rstest]
fn rain_stops_and_flow_recedes(engine: SewerNet, storm_params: CalibrationParams) {
    let outcome = engine
        .verify(sized(three_pipe_line(), 0.8), &storm_params, &mut RunContext::default())
        .expect("verification succeeds");
    let first = outcome
        .discharge
        .values()
        .next()
        .and_then(|row| row.get(&id(1)).copied())
        .expect("first step recorded");
    let last = outcome
        .discharge
        .values()
        .last()
        .and_then(|row| row.get(&id(1)).copied())
        .expect("last step recorded");
    assert!(first > 0.0);
    let peak = outcome.network.pipes()[0].outputs.discharge;
    assert!(last < peak);
}

#[rstest]
fn observed_zones_feed_their_pipes(engine: SewerNet) {
    let samples = (1..=12)
        .map(|k| RainfallSample::new(at(5 * k), if k <= 6 { vec![1.0, 0.0] } else { vec![0.0, 0.0] }))
        .collect();
    let series = RainfallSeries::from_samples(samples).expect("valid series");
    assert_eq!(series.time_step(), 5.0);
    let params = CalibrationParams::builder()
        .with_observed(series)
        .build()
        .expect("valid params");
    let mut pipes = sized(three_pipe_line(), 0.8);
    pipes[0].attributes.rain_zone = 1;
    let outcome = engine
        .verify(pipes, &params, &mut RunContext::default())
        .expect("verification succeeds");
    let dry = &outcome.network.pipes()[0].outputs;
    assert_eq!(dry.discharge, 0.0);
    assert_eq!(dry.fill_degree, 0.0);
    assert!(outcome.network.pipes()[2].outputs.discharge > 0.0);
    assert!(outcome.peak.is_none(), "peak tracking was not requested");
}

#[rstest]
fn verify_span_records_pipe_count(engine: SewerNet, storm_params: CalibrationParams) {
    let (outcome, layer) = RecordingLayer::capture(|| {
        engine.verify(sized(three_pipe_line(), 0.8), &storm_params, &mut RunContext::default())
    });
    outcome.expect("verification succeeds");
    let span = layer.span("core.verify").expect("verify span");
    assert_eq!(span.field("pipes"), Some("3"));
}

#[rstest]
fn batch_verification_keeps_order(engine: SewerNet, storm_params: CalibrationParams) {
    let results = engine.verify_batch(
        vec![sized(three_pipe_line(), 0.8), three_pipe_line()],
        &storm_params,
        &RunContext::default(),
    );
    assert!(results[0].is_ok());
    let err = results[1].as_ref().expect_err("sizes are required");
    assert_eq!(err.detail_code(), "SEWERNET_CONFIG_MISSING_ATTRIBUTE");
}
