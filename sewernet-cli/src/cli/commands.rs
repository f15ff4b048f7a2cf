//! Command implementations and argument parsing for the sewernet CLI.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use sewernet_core::{
    AlignMode, CalibrationOutcome, CalibrationParams, ConfigError, DEFAULT_JUNCTION_LIMIT,
    DesignOutcome, DesignParams, PipeId, RunContext, SewerNet, SewerNetBuilder, SewerNetError,
    StormCurve,
};
use sewernet_providers_text::{PipeTable, TextProviderError, read_diameters, read_rainfall};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "sewernet",
    about = "Design or verify a tree-shaped stormwater sewer network."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Size every pipe of a network for a design storm.
    Design(DesignCommand),
    /// Route rainfall through a network whose sizes are known.
    Verify(VerifyCommand),
}

/// Options shared by every command that reads a pipe table.
#[derive(Debug, Args, Clone)]
pub struct NetworkArgs {
    /// Pipe table, comma or whitespace delimited with a header row.
    pub pipes: PathBuf,

    /// Outlet pipe used to reconstruct drain targets from coordinates.
    ///
    /// Required unless the table carries a `drain_to` column.
    #[arg(long, value_parser = parse_pipe_id)]
    pub outlet: Option<PipeId>,

    /// Maximum number of pipes joining at one point.
    #[arg(long = "junction-limit", default_value_t = DEFAULT_JUNCTION_LIMIT)]
    pub junction_limit: usize,

    /// Override name for the network (defaults to the file name).
    #[arg(long)]
    pub name: Option<String>,

    /// Output format written to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Options accepted by the `design` command.
#[derive(Debug, Args, Clone)]
pub struct DesignCommand {
    /// Network input.
    #[command(flatten)]
    pub network: NetworkArgs,

    /// List of commercial section sizes in metres.
    #[arg(long)]
    pub diameters: PathBuf,

    /// Storm curve coefficient `a` in mm/h^n.
    #[arg(long = "a")]
    pub a: f64,

    /// Storm curve exponent `n`.
    #[arg(long = "n")]
    pub n: f64,

    /// Minimum bed shear stress for self-cleaning in Pa.
    #[arg(long)]
    pub tau: f64,

    /// Design fill degree in (0, 0.99].
    #[arg(long)]
    pub fill: f64,

    /// Junction alignment rule.
    #[arg(long, value_enum, default_value_t = AlignArg::FreeSurface)]
    pub align: AlignArg,
}

/// Options accepted by the `verify` command.
#[derive(Debug, Args, Clone)]
pub struct VerifyCommand {
    /// Network input; the table must carry a `diameter` column.
    #[command(flatten)]
    pub network: NetworkArgs,

    /// Observed rainfall table; takes precedence over a storm curve.
    #[arg(long)]
    pub rain: Option<PathBuf>,

    /// Storm curve coefficient `a` for a synthesized hyetograph.
    #[arg(long = "a", requires = "n")]
    pub a: Option<f64>,

    /// Storm curve exponent `n` for a synthesized hyetograph.
    #[arg(long = "n", requires = "a")]
    pub n: Option<f64>,

    /// Simulation time step in minutes.
    #[arg(long = "time-step")]
    pub time_step: Option<f64>,

    /// Simulated period in minutes.
    #[arg(long)]
    pub horizon: Option<f64>,

    /// Duration of the synthesized rain in minutes.
    #[arg(long = "rain-duration")]
    pub rain_duration: Option<f64>,

    /// Record the peak outlet discharge.
    #[arg(long = "track-peak")]
    pub track_peak: bool,
}

/// Output formats for the run summary.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated table for terminals.
    #[default]
    Text,
    /// Single JSON document.
    Json,
}

/// Junction alignment rules accepted on the command line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum AlignArg {
    /// Free surfaces meet at the junction.
    FreeSurface,
    /// Inverts meet at the junction.
    Invert,
}

impl From<AlignArg> for AlignMode {
    fn from(value: AlignArg) -> Self {
        match value {
            AlignArg::FreeSurface => Self::FreeSurface,
            AlignArg::Invert => Self::Invert,
        }
    }
}

/// Errors surfaced while executing CLI commands.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CliError {
    /// An input file could not be opened.
    #[error("failed to open `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// Neither `--outlet` nor a `drain_to` column identifies the outlet.
    #[error("`{path}` has no `drain_to` column; pass --outlet to reconstruct drain targets")]
    OutletRequired {
        /// Pipe table path.
        path: PathBuf,
    },
    /// Reading a table failed.
    #[error("failed to read `{path}`: {source}")]
    Text {
        /// Table path.
        path: PathBuf,
        /// Provider failure.
        #[source]
        source: TextProviderError,
    },
    /// A command-line value was rejected by the model.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The engine rejected the network or failed while running.
    #[error(transparent)]
    Core(#[from] SewerNetError),
}

impl CliError {
    /// Stable machine-readable code of the underlying model error, if any.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Config(error) => Some(error.code().as_str()),
            Self::Core(error) => Some(error.detail_code()),
            Self::Text {
                source: TextProviderError::Model(error) | TextProviderError::Record { source: error, .. },
                ..
            } => Some(error.code().as_str()),
            _ => None,
        }
    }
}

/// Outcome of a command.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Network name, derived from the pipe table unless overridden.
    pub network: String,
    /// Requested output format.
    pub format: OutputFormat,
    /// Engine result.
    pub outcome: RunSummary,
}

/// Engine result of either command.
#[derive(Debug, Clone)]
pub enum RunSummary {
    /// Result of `design`.
    Design(DesignOutcome),
    /// Result of `verify`.
    Verify(CalibrationOutcome),
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when an input cannot be read or the engine fails.
#[instrument(name = "cli.run", err, skip(cli), fields(command = field::Empty))]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    let span = Span::current();
    match cli.command {
        Command::Design(command) => {
            span.record("command", "design");
            run_design(command)
        }
        Command::Verify(command) => {
            span.record("command", "verify");
            run_verify(command)
        }
    }
}

#[instrument(
    name = "cli.design",
    err,
    skip(command),
    fields(path = %command.network.pipes.display(), fill = command.fill, tau = command.tau),
)]
pub(super) fn run_design(command: DesignCommand) -> Result<ExecutionSummary, CliError> {
    let catalog = read_diameters(open_reader(&command.diameters)?).map_err(|source| {
        CliError::Text {
            path: command.diameters.clone(),
            source,
        }
    })?;
    let params = DesignParams::builder(StormCurve::new(command.a, command.n)?)
        .with_design_fill(command.fill)
        .with_tau(command.tau)
        .with_align(command.align.into())
        .with_catalog(catalog)
        .build()?;
    let (network, engine, pipes) = load_network(&command.network)?;
    let outcome = engine.design(pipes.into_records(), &params, &mut RunContext::default())?;
    info!(
        network = network.as_str(),
        pipes = outcome.processed,
        warnings = outcome.warnings.len(),
        "design completed"
    );
    Ok(ExecutionSummary {
        network,
        format: command.network.format,
        outcome: RunSummary::Design(outcome),
    })
}

#[instrument(
    name = "cli.verify",
    err,
    skip(command),
    fields(path = %command.network.pipes.display(), rain = field::Empty),
)]
pub(super) fn run_verify(command: VerifyCommand) -> Result<ExecutionSummary, CliError> {
    let mut builder = CalibrationParams::builder().with_track_peak(command.track_peak);
    if let Some(path) = &command.rain {
        Span::current().record("rain", field::display(path.display()));
        let series = read_rainfall(open_reader(path)?).map_err(|source| CliError::Text {
            path: path.clone(),
            source,
        })?;
        builder = builder.with_observed(series);
    }
    if let (Some(a), Some(n)) = (command.a, command.n) {
        builder = builder.with_storm(StormCurve::new(a, n)?);
    }
    if let Some(minutes) = command.time_step {
        builder = builder.with_time_step(minutes);
    }
    if let Some(minutes) = command.horizon {
        builder = builder.with_horizon(minutes);
    }
    if let Some(minutes) = command.rain_duration {
        builder = builder.with_rain_duration(minutes);
    }
    let params = builder.build()?;
    let (network, engine, pipes) = load_network(&command.network)?;
    let outcome = engine.verify(pipes.into_records(), &params, &mut RunContext::default())?;
    info!(
        network = network.as_str(),
        steps = outcome.steps_run,
        warnings = outcome.warnings.len(),
        "verification completed"
    );
    Ok(ExecutionSummary {
        network,
        format: command.network.format,
        outcome: RunSummary::Verify(outcome),
    })
}

/// Reads the pipe table and configures an engine for its topology source.
fn load_network(args: &NetworkArgs) -> Result<(String, SewerNet, PipeTable), CliError> {
    let name = derive_network_name(&args.pipes, args.name.as_deref());
    let table =
        PipeTable::try_from_reader(&name, open_reader(&args.pipes)?).map_err(|source| {
            CliError::Text {
                path: args.pipes.clone(),
                source,
            }
        })?;
    let mut builder = SewerNetBuilder::new().with_junction_limit(args.junction_limit);
    match args.outlet {
        Some(outlet) => builder = builder.with_outlet(outlet),
        None if table.declares_targets() => {}
        None => {
            return Err(CliError::OutletRequired {
                path: args.pipes.clone(),
            });
        }
    }
    Ok((name, builder.build()?, table))
}

#[instrument(name = "cli.open_reader", err, fields(path = %path.display()))]
pub(super) fn open_reader(path: &Path) -> Result<BufReader<File>, CliError> {
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

pub(super) fn derive_network_name(path: &Path, override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_owned();
    }

    path.file_stem()
        .and_then(|value| value.to_str())
        .map_or_else(|| "network".to_owned(), ToOwned::to_owned)
}

fn parse_pipe_id(raw: &str) -> Result<PipeId, String> {
    let value = raw
        .parse::<u32>()
        .map_err(|err| format!("`{raw}` is not a pipe id: {err}"))?;
    PipeId::new(value).map_err(|err| err.to_string())
}
