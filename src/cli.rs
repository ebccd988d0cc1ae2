use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Bare integers are seconds; anything else goes through humantime (`30s`, `2m`).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| format!("'{}' is not a valid duration: {}", s, e))
}

#[derive(Parser, Debug)]
#[command(
    name = "surge",
    author,
    version,
    about = "Rate-controlled HTTP load generator with automatic method detection",
    long_about = "surge sends a fixed-rate stream of HTTP requests at a single URL from a pool \
                  of workers.\n\n\
                  When no method is given it asks the target with OPTIONS (falling back to \
                  HEAD, GET and POST probes) and spreads requests over the supported methods."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a load test against a URL
    #[command(name = "run")]
    Run(Box<RunArgs>),

    /// Generate a starter config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Target URL to load test
    #[arg(required_unless_present = "config")]
    pub url: Option<String>,

    /// HTTP method (empty = detect from the target)
    #[arg(short = 'm', long, default_value = "")]
    pub method: String,

    /// Request body, sent with POST, PUT and PATCH
    #[arg(short = 'b', long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Request body from file
    #[arg(long, value_name = "FILE")]
    pub body_file: Option<PathBuf>,

    /// Test duration (e.g., 10, 30s, 2m) [default: 10s]
    #[arg(short = 'd', long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Number of concurrent workers [default: 10]
    #[arg(short = 'w', long)]
    pub workers: Option<u32>,

    /// Dispatch ticks per second; each tick offers one token per worker [default: 10]
    #[arg(short = 'r', long)]
    pub rps: Option<u32>,

    /// Config file path (TOML)
    #[arg(short = 'f', long = "config")]
    pub config: Option<PathBuf>,

    /// Write the JSON summary to this file
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Print the JSON summary to stdout (implies --quiet)
    #[arg(long)]
    pub json: bool,

    /// Suppress per-request status lines
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Print live counters to stderr once per second
    #[arg(long)]
    pub progress: bool,

    /// Validate config and exit without sending anything
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output file path (default: surge.toml)
    #[arg(short, long, default_value = "surge.toml")]
    pub output: PathBuf,

    /// Target URL to include in config
    #[arg(short, long)]
    pub url: Option<String>,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "surge", &mut std::io::stdout());
}
