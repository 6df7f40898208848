//! `flux` — a thin command-line front end for the workflow execution engine.
//!
//! Exercises `EngineFacade` end to end against the in-process port
//! implementations in [`store`]: load a workflow definition from a JSON
//! file, validate it, run it to completion, and print its results. No part
//! of this binary is the engine itself; it is a driver for it.

mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flux_core::UserId;
use flux_engine::{EngineConfig, EngineFacade};
use flux_eventbus::EventBus;
use flux_execution::ExecutionContext;
use flux_workflow::{Validator, Workflow};

use store::{EchoRunner, LocalFileStorage, LocalInteractionRepository, LocalWorkflowRepository, TokioBackgroundQueue};

#[derive(Parser)]
#[command(name = "flux", version, about = "Workflow execution engine CLI")]
struct Cli {
    /// Path to a layered TOML config file; falls back to defaults and
    /// `FLUX_`-prefixed environment overrides when absent.
    #[arg(long, global = true, default_value = "flux.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run structural validation over a workflow definition, without executing it.
    Validate {
        /// Path to a workflow definition, as JSON.
        workflow: PathBuf,
    },
    /// Run a workflow definition to completion and print its results.
    Run {
        /// Path to a workflow definition, as JSON.
        workflow: PathBuf,
        /// Directory output files are served from.
        #[arg(long, default_value = ".")]
        files_dir: PathBuf,
    },
}

fn load_workflow(path: &PathBuf) -> Result<Workflow> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing workflow definition at {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = EngineConfig::load(&cli.config).unwrap_or_else(|e| {
        tracing::warn!(error = %e, path = %cli.config.display(), "falling back to default config");
        EngineConfig::default()
    });

    match cli.command {
        Command::Validate { workflow } => validate(&workflow),
        Command::Run { workflow, files_dir } => run(&workflow, files_dir, &config).await,
    }
}

fn validate(path: &PathBuf) -> Result<()> {
    let workflow = load_workflow(path)?;
    let result = Validator::new().validate(&workflow);

    for finding in &result.errors {
        println!("error   [{}] {}", finding.code, finding.message);
    }
    for finding in &result.warnings {
        println!("warning [{}] {}", finding.code, finding.message);
    }
    for finding in &result.info {
        println!("info    [{}] {}", finding.code, finding.message);
    }
    if let Some(metrics) = result.metrics {
        println!(
            "{} nodes, {} edges, depth {}, max width {}",
            metrics.node_count, metrics.edge_count, metrics.depth, metrics.max_width
        );
    }

    if result.is_valid() {
        println!("workflow is valid");
        Ok(())
    } else {
        anyhow::bail!("workflow failed validation with {} error(s)", result.errors.len());
    }
}

async fn run(path: &PathBuf, files_dir: PathBuf, config: &EngineConfig) -> Result<()> {
    let workflow = load_workflow(path)?;
    let workflow_id = workflow.id;

    let repository = Arc::new(LocalWorkflowRepository::default());
    repository.insert(workflow);

    let facade = EngineFacade::new(
        repository,
        Arc::new(EchoRunner),
        Arc::new(LocalFileStorage::new(files_dir)),
        Arc::new(LocalInteractionRepository::default()),
        Arc::new(EventBus::default()),
        Arc::new(TokioBackgroundQueue),
        config.max_concurrent_executions,
        Duration::from_secs(u64::from(config.default_timeout_minutes) * 60),
    );

    let user_id = UserId::v4();
    let execution_id = facade.execute(workflow_id, user_id, ExecutionContext::default()).await?;
    println!("execution {execution_id} admitted");

    loop {
        if facade.is_execution_complete(execution_id).await? {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let state = facade.get_execution_status(execution_id).await?;
    println!("execution finished: {}", state.status);
    if let Some(results) = facade.get_results(execution_id).await? {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    facade.cleanup_execution(execution_id).await?;
    Ok(())
}
