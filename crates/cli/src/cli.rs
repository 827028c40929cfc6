//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// SSL Quality Inspector - live quality statistics of an SSL vision feed
#[derive(Parser, Debug)]
#[command(
    name = "ssl-quality-inspector",
    author,
    version,
    about = "Live quality statistics of an SSL vision feed",
    long_about = "Listens to the SSL vision multicast feed and reports per-camera frame \n\
                  quality, latencies, tracked objects, data losses and the clock offsets \n\
                  of the vision hosts."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SSL_INSPECTOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (logs go to stderr)
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "SSL_INSPECTOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the vision feed and render the report
    ///
    /// Datagrams are decoded as JSON detection packets (coordinates in mm).
    /// The protobuf wire format of SSL-Vision is not read by this build; feed
    /// it through a converter that emits the JSON packets.
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply without one
    #[arg(short, long, env = "SSL_INSPECTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the vision multicast address (`group:port`)
    #[arg(long, env = "SSL_VISION_ADDRESS")]
    pub vision_address: Option<String>,

    /// Override the receive timeout after which the feed counts as silent
    #[arg(long, env = "SSL_INSPECTOR_RECEIVE_TIMEOUT_MS")]
    pub receive_timeout_ms: Option<u64>,

    /// Do not sample the clocks of the vision hosts
    #[arg(long)]
    pub no_clock: bool,

    /// Override the report refresh interval
    #[arg(long, env = "SSL_INSPECTOR_RENDER_INTERVAL_MS")]
    pub render_interval_ms: Option<u64>,

    /// Override the number of event log lines shown
    #[arg(long)]
    pub log_tail: Option<usize>,

    /// Append reports instead of redrawing the screen
    #[arg(long)]
    pub no_clear: bool,

    /// Override the Prometheus port (0 = disabled)
    #[arg(long, env = "SSL_INSPECTOR_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Stop after this many seconds (0 = until interrupted)
    #[arg(long, default_value = "0", env = "SSL_INSPECTOR_DURATION")]
    pub duration: u64,

    /// Channel buffer size between receiver and quality engine
    #[arg(long, default_value = "256")]
    pub buffer_size: usize,

    /// Use a generated feed instead of the network
    #[arg(long)]
    pub mock: bool,

    /// Cameras of the generated feed
    #[arg(long, default_value = "2", requires = "mock")]
    pub mock_cameras: u32,

    /// Withhold every n-th frame of the generated feed
    #[arg(long, requires = "mock")]
    pub mock_drop_every: Option<u32>,

    /// Validate the configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; defaults are shown without one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: InfoFormat,
}

/// Output format of the `info` command
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InfoFormat {
    /// Human-readable overview
    #[default]
    Text,
    /// Full configuration as TOML
    Toml,
    /// Full configuration as JSON
    Json,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
