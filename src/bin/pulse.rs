//! Pulse CLI - Command-line interface for Synheart Pulse
//!
//! Commands:
//! - generate: Populate a store and print its snapshot
//! - watch: Run the live refresh loop and print dashboard lines
//! - trend: Classify a glucose value
//! - tir: Compute time-in-range for a list of values
//! - config: Print the default configuration

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use chrono::Utc;
use synheart_pulse::metrics::{compute_time_in_range, derive_trend};
use synheart_pulse::types::TimeSeriesPoint;
use synheart_pulse::{
    DashboardEncoder, PulseError, RefreshTask, StoreConfig, TelemetryStore, PULSE_VERSION,
};

/// Pulse - Mock telemetry store for glucose and insulin dashboards
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author = "Synheart AI Inc")]
#[command(version = PULSE_VERSION)]
#[command(about = "Generate and stream mock health telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that build a store
#[derive(clap::Args)]
struct StoreArgs {
    /// Load configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Days of history to generate
    #[arg(long)]
    window_days: Option<u32>,

    /// Minutes between historical samples
    #[arg(long)]
    interval: Option<u32>,

    /// Fixed RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate a store and print its snapshot as JSON
    Generate {
        #[command(flatten)]
        store: StoreArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Pretty-print JSON
        #[arg(long)]
        pretty: bool,

        /// Shuffle all values once before printing
        #[arg(long)]
        shuffle: bool,
    },

    /// Run the live refresh loop and print one dashboard line per refresh
    Watch {
        #[command(flatten)]
        store: StoreArgs,

        /// Number of refreshes before exiting
        #[arg(long, default_value = "10")]
        ticks: u64,

        /// Seconds between refreshes (defaults to the configured interval)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Emit full dashboard JSON instead of a summary line
        #[arg(long)]
        json: bool,
    },

    /// Print the trend label of a glucose value
    Trend {
        /// Glucose value (mmol/L)
        value: f64,
    },

    /// Print time-in-range for a list of glucose values
    Tir {
        /// Lower bound of the target band
        #[arg(long, default_value = "4.0")]
        low: f64,

        /// Upper bound of the target band
        #[arg(long, default_value = "10.0")]
        high: f64,

        /// Glucose values (mmol/L)
        #[arg(allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// Print the default configuration as JSON
    Config,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Generate {
            store,
            output,
            pretty,
            shuffle,
        } => cmd_generate(&store, &output, pretty, shuffle),

        Commands::Watch {
            store,
            ticks,
            interval_secs,
            json,
        } => cmd_watch(&store, ticks, interval_secs, json),

        Commands::Trend { value } => {
            let trend = derive_trend(value);
            println!("{} {}", trend.arrow(), trend.as_str());
            Ok(())
        }

        Commands::Tir { low, high, values } => cmd_tir(low, high, &values),

        Commands::Config => {
            println!("{}", StoreConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn build_config(args: &StoreArgs) -> Result<StoreConfig, PulseCliError> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(days) = args.window_days {
        config.window_days = days;
    }
    if let Some(interval) = args.interval {
        config.sample_interval_minutes = interval;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_generate(
    args: &StoreArgs,
    output: &PathBuf,
    pretty: bool,
    shuffle: bool,
) -> Result<(), PulseCliError> {
    let store = TelemetryStore::with_config(build_config(args)?)?;
    if shuffle {
        store.shuffle_all()?;
    }

    let snapshot = store.snapshot();
    let json = if pretty {
        serde_json::to_string_pretty(&*snapshot)?
    } else {
        serde_json::to_string(&*snapshot)?
    };

    if output.to_string_lossy() == "-" {
        println!("{json}");
    } else {
        fs::write(output, json)?;
    }
    Ok(())
}

fn cmd_watch(
    args: &StoreArgs,
    ticks: u64,
    interval_secs: Option<u64>,
    json: bool,
) -> Result<(), PulseCliError> {
    let config = build_config(args)?;
    let interval = Duration::from_secs(interval_secs.unwrap_or(config.refresh_interval_secs));
    let store = TelemetryStore::with_config(config)?;
    let encoder = DashboardEncoder::new(store.config());

    // Colors only make sense on a terminal
    let decorate = atty::is(atty::Stream::Stdout);

    let events = store.subscribe();
    let mut task = RefreshTask::spawn(&store, interval)?;

    let mut seen = 0;
    while seen < ticks {
        match events.recv_timeout(event_timeout(interval)) {
            Ok(_) => {
                seen += 1;
                let snapshot = store.snapshot();
                if json {
                    println!("{}", encoder.encode_to_json(&snapshot)?);
                } else {
                    let payload = encoder.encode(&snapshot);
                    let arrow = payload.trend_arrow.unwrap_or_default();
                    let line = format!(
                        "[{}] rev {:>4}  glucose {:>5.2} mmol/L {}  tir {:>5.1}%  iob {:.2} U  cob {:.1} g",
                        Utc::now().format("%H:%M:%S"),
                        payload.revision,
                        payload.summary.current_value,
                        arrow,
                        payload.time_in_range_pct,
                        payload.summary.active_quantity,
                        payload.summary.on_board_quantity,
                    );
                    if decorate {
                        println!("\x1b[1m{line}\x1b[0m");
                    } else {
                        println!("{line}");
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    task.stop();
    Ok(())
}

/// How long to wait for a refresh event before polling again
fn event_timeout(interval: Duration) -> Duration {
    interval.saturating_mul(2)
}

fn cmd_tir(low: f64, high: f64, values: &[f64]) -> Result<(), PulseCliError> {
    if low > high {
        return Err(PulseCliError::InvalidBand(low, high));
    }
    let now = Utc::now();
    let points: Vec<TimeSeriesPoint> = values
        .iter()
        .map(|v| TimeSeriesPoint::new(now, *v))
        .collect();
    println!("{:.1}", compute_time_in_range(&points, low, high));
    Ok(())
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(std::io::Error),
    Pulse(PulseError),
    Json(serde_json::Error),
    InvalidBand(f64, f64),
}

impl From<std::io::Error> for PulseCliError {
    fn from(e: std::io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<PulseError> for PulseCliError {
    fn from(e: PulseError) -> Self {
        PulseCliError::Pulse(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Pulse(PulseError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'pulse config' to see a valid configuration".to_string()),
            },
            PulseCliError::Pulse(e) => CliError {
                code: "STORE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::InvalidBand(low, high) => CliError {
                code: "INVALID_BAND".to_string(),
                message: format!("Lower bound {low} exceeds upper bound {high}"),
                hint: Some("Swap --low and --high".to_string()),
            },
        }
    }
}
