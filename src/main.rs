mod cli;
mod config;
mod engine;
mod error;
mod http;
mod output;
mod types;

use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use config::{load_config, merge_config};
use engine::{DispatchState, Engine};
use output::{print_json, print_summary, write_json};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use types::{LoadConfig, RunPhase, StatsSnapshot};

/// Every attempt failed before a response arrived.
const EXIT_TARGET_UNREACHED: i32 = 3;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Run(args) => args.verbose,
        _ => 0,
    };
    init_tracing(verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32, String> {
    match cli.command {
        Commands::Run(args) => run_load_test(&args).await,
        Commands::Init(args) => run_init(&args),
        Commands::Completions(args) => {
            cli::generate_completions(args.shell);
            Ok(0)
        }
    }
}

fn run_init(args: &cli::InitArgs) -> Result<i32, String> {
    use std::fs;

    if args.output.exists() && !args.force {
        return Err(format!(
            "File '{}' already exists. Use --force to overwrite.",
            args.output.display()
        ));
    }

    let url = args.url.as_deref().unwrap_or("http://localhost:8080/");

    let config = format!(
        r#"# surge load test configuration

[target]
url = "{url}"
# Leave unset to detect methods from the target (OPTIONS, then HEAD/GET/POST probes)
# method = "POST"

# Request body, sent with POST, PUT and PATCH
# body = '{{"key": "value"}}'
# body_file = "payload.json"

[load]
duration = "10s"
workers = 10
# Dispatch ticks per second; every tick offers one token per worker
rps = 10

# Environment variables are expanded before parsing:
#   url = "https://${{API_HOST:-localhost:8080}}/health"
"#,
        url = url
    );

    fs::write(&args.output, config).map_err(|e| format!("Failed to write config file: {}", e))?;

    eprintln!("Created config file: {}", args.output.display());
    eprintln!("\nRun with: surge run -f {}", args.output.display());

    Ok(0)
}

async fn run_load_test(args: &RunArgs) -> Result<i32, String> {
    let toml_config = match &args.config {
        Some(path) => Some(load_config(path).map_err(|e| e.to_string())?),
        None => None,
    };

    let config = merge_config(args, toml_config).map_err(|e| e.to_string())?;

    if args.dry_run {
        print_plan(&config);
        return Ok(0);
    }

    let quiet = args.quiet || args.json;
    let engine = Engine::new(config.clone()).with_status_lines(!quiet);
    let cancel_token = engine.cancel_token();

    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping dispatch");
        signal_token.cancel();
    });

    let phase_handle = (!args.json).then(|| tokio::spawn(report_phase(engine.phase_rx())));
    let progress_handle = args
        .progress
        .then(|| tokio::spawn(report_progress(engine.snapshot_rx(), engine.state_rx())));

    let summary = engine.run().await.map_err(|e| e.to_string())?;

    // Both watchers end once the engine's senders are dropped.
    if let Some(handle) = phase_handle {
        let _ = handle.await;
    }
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    if args.json {
        print_json(&summary, &config).map_err(|e| format!("Failed to write JSON: {}", e))?;
    } else {
        print_summary(&summary, &config);
    }

    if let Some(path) = &args.output {
        write_json(&summary, &config, path)
            .map_err(|e| format!("Failed to write output file: {}", e))?;
        if !quiet {
            eprintln!("Results written to: {}", path.display());
        }
    }

    if summary.target_never_reached() {
        Ok(EXIT_TARGET_UNREACHED)
    } else {
        Ok(0)
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM. Never resolves if no handler
/// could be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn print_plan(config: &LoadConfig) {
    eprintln!("Configuration validated successfully!\n");
    eprintln!("Target:      {}", config.target.url);
    match &config.target.method {
        Some(method) => eprintln!("Method:      {}", method),
        None => eprintln!("Method:      auto-detect"),
    }
    eprintln!("Duration:    {:?}", config.duration);
    eprintln!("Workers:     {}", config.workers);
    eprintln!("RPS:         {}", config.rps);
    if config.target.body.is_some() {
        eprintln!("Body:        present");
    }
}

async fn report_phase(mut phase_rx: watch::Receiver<RunPhase>) {
    while phase_rx.changed().await.is_ok() {
        let phase = phase_rx.borrow_and_update().clone();
        match phase {
            RunPhase::Dispatching(resolution) => {
                eprintln!(
                    "Suggested method: {} ({})",
                    resolution.chosen,
                    resolution.source.as_str()
                );
                eprintln!("Supported methods: {}", resolution.supported.join(", "));
            }
            RunPhase::Finished => break,
            RunPhase::Resolving => {}
        }
    }
}

async fn report_progress(
    mut snapshot_rx: watch::Receiver<StatsSnapshot>,
    mut state_rx: watch::Receiver<DispatchState>,
) {
    let mut state_open = true;

    loop {
        tokio::select! {
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshot_rx.borrow_and_update().clone();
                eprintln!(
                    "[{:>5.1}s] attempted {} | successful {} | unreachable {} | dropped {}",
                    snapshot.elapsed.as_secs_f64(),
                    snapshot.total_attempted,
                    snapshot.successful,
                    snapshot.unreachable,
                    snapshot.dropped
                );
            }
            changed = state_rx.changed(), if state_open => {
                if changed.is_err() {
                    state_open = false;
                    continue;
                }
                let state = *state_rx.borrow_and_update();
                if state == DispatchState::Draining {
                    eprintln!("Dispatch closed, waiting for in-flight requests");
                }
            }
        }
    }
}
