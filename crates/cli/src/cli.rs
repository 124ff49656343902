//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sensor HDI - driver connection manager and stream listener toolkit
#[derive(Parser, Debug)]
#[command(
    name = "sensor-hdi",
    author,
    version,
    about = "Sensor HDI driver connection manager",
    long_about = "Tools around the sensor hardware driver interface connection manager.\n\n\
                  Validates and inspects service configuration, and simulates a driver\n\
                  session (connect, configure, stream, driver death and recovery)\n\
                  against an in-process mock driver."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SENSOR_HDI_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SENSOR_HDI_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level implied by -v/-q
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration file
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Run a session against the mock driver
    Simulate(SimulateArgs),
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "sensor_hdi.toml", env = "SENSOR_HDI_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "sensor_hdi.toml", env = "SENSOR_HDI_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `simulate` command
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, env = "SENSOR_HDI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of sensors exposed by the mock driver
    #[arg(long, default_value = "3")]
    pub sensors: usize,

    /// Events emitted per enabled sensor in each phase
    #[arg(long, default_value = "5")]
    pub events: usize,

    /// Kill the mock driver mid-session to exercise recovery
    #[arg(long)]
    pub kill_driver: bool,

    /// Bytes pushed through the stream listener socket pair
    #[arg(long, default_value = "1024")]
    pub stream_bytes: usize,

    /// Metrics server port (overrides configuration, 0 = disabled)
    #[arg(long, env = "SENSOR_HDI_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => contracts::LogFormat::Json,
            LogFormat::Pretty => contracts::LogFormat::Pretty,
            LogFormat::Compact => contracts::LogFormat::Compact,
        }
    }
}
