//! run-task: run one batch of a task type
//!
//! Exit status is nonzero only when the batch itself could not run
//! (store unreachable, bad configuration, unknown subject). Per-subject
//! failures are recorded on their task rows and reported in the summary.

use anyhow::{Context, Result};
use clap::Parser;
use karaoke_common::config::{
    load_toml_config, resolve_config_path, resolve_database_path, LoggingConfig, TomlConfig,
};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use karaoke_tasks::engine::{BatchOrchestrator, RunOptions};
use karaoke_tasks::models::TaskType;
use karaoke_tasks::task_types::build_registry;

/// Command-line arguments for run-task
#[derive(Parser, Debug)]
#[command(name = "run-task")]
#[command(about = "Run one batch of a karaoke processing task")]
#[command(version)]
struct Args {
    /// Task type to run (align, separate)
    task_type: TaskType,

    /// Maximum subjects in this batch (default from config)
    #[arg(long)]
    limit: Option<usize>,

    /// Process only this subject
    #[arg(long)]
    id: Option<String>,

    /// Do not recompute the track stage after completion
    #[arg(long)]
    skip_stage_update: bool,

    /// Reset the task row for --id to pending instead of running a batch
    #[arg(long, requires = "id")]
    reset: bool,

    /// Config file (overrides KARAOKE_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides KARAOKE_DATABASE)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = match &config_path {
        Some(path) => load_toml_config(path)?,
        None => TomlConfig::default(),
    };
    config.apply_env_overrides();

    init_tracing(&config.logging)?;

    // Log build identification immediately after tracing init
    info!(
        "Starting run-task v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_path {
        Some(path) if path.exists() => info!("Config: {}", path.display()),
        Some(path) => info!("Config: {} (not found, using defaults)", path.display()),
        None => info!("Config: compiled defaults"),
    }
    config.engine.validate()?;

    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Database: {}", db_path.display());
    let pool = karaoke_common::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let registry = build_registry(&config, &[args.task_type])
        .with_context(|| format!("Failed to configure task type '{}'", args.task_type))?;
    let orchestrator = BatchOrchestrator::new(pool.clone(), registry, &config.engine);

    if args.reset {
        let id = args.id.as_deref().context("--reset requires --id")?;
        let subject = orchestrator.reset(args.task_type, id).await?;
        println!("Reset {} task for {}", args.task_type, subject);
        pool.close().await;
        return Ok(());
    }

    let options = RunOptions {
        limit: args.limit.unwrap_or(config.engine.default_limit),
        single_subject_id: args.id,
        skip_stage_update: args.skip_stage_update,
    };

    let summary = orchestrator.run(args.task_type, &options).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    pool.close().await;
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?,
    };

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}
