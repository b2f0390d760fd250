/*
macrolens - single-binary main.rs
This binary starts the Rocket HTTP server that serves the front-end and drives the
Scout -> Verification -> Analysis pipeline, or runs the pipeline once headless.
*/

use anyhow::Result;
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use macrolens::export;
use macrolens::llm::factory::create_step_providers;
use macrolens::server::{launch_rocket, AppState};

#[derive(Parser, Debug)]
#[command(name = "macrolens", about = "MacroLens macroeconomic news analysis server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run a single analysis without starting the HTTP server
    #[arg(long)]
    once: bool,

    /// Where `--once` writes the result (defaults to the configured download filename)
    #[arg(long, value_name = "FILE", requires = "once")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = load_config(args.config.as_ref()).await?;

    let providers = match create_step_providers(&config.llm) {
        Ok(p) => p,
        Err(e) => {
            error!("failed to initialize LLM providers: {:#}", e);
            return Err(e);
        }
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.download_filename));
    let state = AppState::new(config, providers);

    if args.once {
        return run_once(state, output).await;
    }

    // Launch the Rocket server (blocking until Rocket shuts down)
    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(state).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolve `config.default.toml` + override and load them.
async fn load_config(explicit: Option<&PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p.clone())
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    // Load configuration with defaults
    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

/// Headless mode: one run, progress to the log, result to `output`.
async fn run_once(state: AppState, output: PathBuf) -> Result<()> {
    let guard = state
        .runs
        .try_begin()
        .ok_or_else(|| anyhow::anyhow!("an analysis run is already in progress"))?;
    let on_status = |message: &str| info!("{}", message);

    match guard.execute(&state.orchestrator, &on_status).await {
        Ok(result) => {
            export::write_download(&output, &result).await?;
            info!(items = result.len(), path = %output.display(), "analysis written");
            Ok(())
        }
        Err(e) => {
            error!(kind = e.kind(), "analysis failed: {}", e);
            Err(e.into())
        }
    }
}
