//! LabNote - AI-assisted clinical lab report review
//!
//! Fetches pending lab reports, has a language model interpret each one
//! against the hospital policy, and writes a clinical note per report.
//! Runs either as a one-shot batch over the pending queue or as an HTTP
//! service with a live log stream.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid arguments, config, server startup, etc.)

mod agent;
mod cli;
mod config;
mod models;
mod note;
mod pipeline;
mod policy;
mod server;
mod store;

use agent::{AnalysisEngine, ClientConfig, OllamaClient};
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use note::composer::{constrained_environment, select_output_dir};
use note::{NoopNotifier, NoteComposer, Notifier, SimulatedPager};
use pipeline::progress::{ConsoleSink, Pacing, ProgressSink};
use pipeline::Pipeline;
use policy::PolicyProvider;
use server::{AppState, LogStream};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use store::ReportStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("LabNote v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = if args.serve {
        run_service(&args).await
    } else {
        run_batch(&args).await
    };

    if let Err(e) = result {
        error!("LabNote failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .labnote.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, policy document and output directory.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        Config::load(config_path)?
    } else {
        match Config::load_default() {
            Ok(Some(config)) => {
                info!("Loaded default config from {}", CONFIG_FILE_NAME);
                config
            }
            Ok(None) => {
                debug!("No config file found, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!("Failed to load config: {:#}", e);
                Config::default()
            }
        }
    };

    config.merge_with_args(args);
    if config.general.verbose {
        debug!("Effective configuration: {:?}", config);
    }
    Ok(config)
}

/// Assemble the pipeline around the given progress sink.
fn build_pipeline(config: &Config, progress: Arc<dyn ProgressSink>) -> Result<Pipeline> {
    let client = OllamaClient::new(ClientConfig {
        ollama_url: config.model.ollama_url.clone(),
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
    })
    .context("Failed to create model client")?;

    let output_dir = select_output_dir(
        Path::new(&config.general.output_dir),
        constrained_environment(),
    );
    info!("Clinical notes will be written to {}", output_dir.display());

    let pacing = Pacing::new(config.general.simulate_delays);
    let notifier: Arc<dyn Notifier> = if config.general.simulated_paging {
        Arc::new(SimulatedPager::new(progress.clone(), pacing))
    } else {
        Arc::new(NoopNotifier)
    };

    Ok(Pipeline::new(
        AnalysisEngine::new(Arc::new(client)),
        PolicyProvider::new(&config.general.policy_path),
        NoteComposer::new(output_dir),
        notifier,
        progress,
        pacing,
    ))
}

/// Process every pending report once and exit.
async fn run_batch(args: &Args) -> Result<()> {
    let start_time = Instant::now();
    let config = load_config(args)?;

    if !args.quiet {
        println!("🩺 LABNOTE CLINICAL REVIEW v{}", env!("CARGO_PKG_VERSION"));
        println!("   Model: {}", config.model.name);
        println!("   Ollama: {}", config.model.ollama_url);
        println!("   Policy: {}", config.general.policy_path);
    }

    let console = Arc::new(ConsoleSink::new(args.quiet));
    let pipeline = build_pipeline(&config, console)?;
    let mut store = ReportStore::seeded();

    let summary = pipeline.run_batch(&mut store).await;

    let duration = start_time.elapsed().as_secs_f64();
    println!("\n📊 Review Summary:");
    println!("   Reports processed: {}", summary.processed);
    println!("   Notes written: {}", summary.notes.len());
    if summary.failures > 0 {
        println!("   Notes failed: {}", summary.failures);
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ ALL TASKS COMPLETED");

    Ok(())
}

/// Serve the HTTP API until the process is stopped.
async fn run_service(args: &Args) -> Result<()> {
    let config = load_config(args)?;

    let logs = LogStream::new(config.server.stream_capacity);
    let pipeline = build_pipeline(&config, Arc::new(logs.clone()))?;
    let state = AppState::new(ReportStore::new(), pipeline, logs);

    let addr = config.server.bind_addr();
    println!("🚀 Starting clinical review service on http://{}", addr);
    server::serve(&addr, state).await
}
