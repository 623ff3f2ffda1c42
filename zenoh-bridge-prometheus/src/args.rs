//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Default configuration file name.
pub const DEFAULT_CONFIG: &str = "prometheus.json5";

/// Zenoh bridge scraping Prometheus exposition endpoints.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct BridgeArgs {
    /// Path to configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run a single poll cycle, then exit.
    #[arg(long)]
    pub once: bool,

    /// Print events as JSON lines instead of publishing them. Implies `--once`.
    #[arg(long)]
    pub dry_run: bool,
}
