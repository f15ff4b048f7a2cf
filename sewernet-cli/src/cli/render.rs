//! Summary rendering for terminals and machine consumers.

use std::io::{self, Write};

use serde::Serialize;
use sewernet_core::{PeakDischarge, PipeReport, RunStatus, WarningLog};

use super::commands::{ExecutionSummary, OutputFormat, RunSummary};

#[derive(Serialize)]
struct WarningRow {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipe: Option<u32>,
    message: String,
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    network: &'a str,
    mode: &'static str,
    status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    steps_run: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak: Option<PeakDischarge>,
    warnings: Vec<WarningRow>,
    pipes: Vec<PipeReport>,
}

impl<'a> JsonSummary<'a> {
    fn new(summary: &'a ExecutionSummary) -> Self {
        let base = |mode, status, warnings: &WarningLog, pipes| Self {
            network: &summary.network,
            mode,
            status,
            processed: None,
            steps_run: None,
            peak: None,
            warnings: warnings
                .iter()
                .map(|warning| WarningRow {
                    kind: warning.kind(),
                    pipe: warning.pipe().map(u32::from),
                    message: warning.to_string(),
                })
                .collect(),
            pipes,
        };
        match &summary.outcome {
            RunSummary::Design(outcome) => Self {
                processed: Some(outcome.processed),
                ..base(
                    "design",
                    outcome.status,
                    &outcome.warnings,
                    outcome.reports.clone(),
                )
            },
            RunSummary::Verify(outcome) => Self {
                steps_run: Some(outcome.steps_run),
                peak: outcome.peak,
                ..base(
                    "verify",
                    outcome.status,
                    &outcome.warnings,
                    outcome.reports(),
                )
            },
        }
    }
}

/// Renders `summary` to `writer` in its requested format.
///
/// Text output lists the run header, one line per warning, and a
/// tab-separated row per pipe. JSON output is a single document holding the
/// same data with every [`PipeReport`] field.
///
/// # Errors
/// Returns [`io::Error`] if writing or serialising fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    match summary.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &JsonSummary::new(summary))?;
            writeln!(writer)
        }
        OutputFormat::Text => render_text(summary, writer),
    }
}

fn render_text(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "network: {}", summary.network)?;
    let (status, warnings, reports) = match &summary.outcome {
        RunSummary::Design(outcome) => {
            writeln!(writer, "mode: design")?;
            writeln!(writer, "pipes sized: {}", outcome.processed)?;
            (outcome.status, &outcome.warnings, outcome.reports.clone())
        }
        RunSummary::Verify(outcome) => {
            writeln!(writer, "mode: verify")?;
            writeln!(writer, "time steps: {}", outcome.steps_run)?;
            if let Some(peak) = outcome.peak {
                writeln!(
                    writer,
                    "outlet peak: {:.4} m3/s at {:.1} min ({})",
                    peak.discharge,
                    peak.minutes,
                    peak.time.to_rfc3339()
                )?;
            }
            (outcome.status, &outcome.warnings, outcome.reports())
        }
    };
    writeln!(writer, "status: {}", status_label(status))?;
    writeln!(writer, "warnings: {}", warnings.len())?;
    for warning in warnings.iter() {
        writeln!(writer, "  [{}] {warning}", warning.kind())?;
    }
    writeln!(
        writer,
        "id\tdrains_to\tdiameter\tdischarge\tfill\tspeed\tslope\tpeak_time"
    )?;
    for report in &reports {
        writeln!(
            writer,
            "{}\t{}\t{:.3}\t{:.4}\t{:.3}\t{:.3}\t{:.5}\t{:.1}",
            report.id,
            report.drains_to,
            report.diameter,
            report.discharge,
            report.fill_degree,
            report.mean_speed,
            report.pipe_slope,
            report.peak_time,
        )?;
    }
    Ok(())
}

const fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Completed => "completed",
        RunStatus::Cancelled => "cancelled",
    }
}
