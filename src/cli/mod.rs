//! CLI module for PMP LLM Orchestrator
//!
//! Every subcommand loads configuration, initializes tracing, builds the
//! orchestrator and prints JSON to stdout:
//! - `validate`, `health`: operator checks
//! - `complete`, `stream`, `embed`: one request through the orchestrator
//! - `assign`, `ab-test`, `summary`: experiments

pub mod admin;
pub mod experiment;
pub mod request;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::{ConfigurationSource, FileConfigurationSource};
use crate::infrastructure::observability::{init_metrics, init_tracing, shutdown_tracing};

/// PMP LLM Orchestrator - resilient routing across LLM providers
#[derive(Parser)]
#[command(name = "pmp-llm-orchestrator")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file layered over config/default.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate configuration and credentials
    Validate,

    /// Probe every provider and report system health
    Health,

    /// Run a completion
    Complete(request::CompleteArgs),

    /// Stream a completion to stdout
    Stream(request::CompleteArgs),

    /// Embed one or more texts
    Embed(request::EmbedArgs),

    /// Show a user's variant assignment
    Assign(experiment::AssignArgs),

    /// Run a completion under a user's experiment variant
    AbTest(experiment::AbTestArgs),

    /// List experiments, or summarize one
    Summary(experiment::SummaryArgs),
}

/// Load configuration, wire the application and execute `cli.command`
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let source = match &cli.config {
        Some(path) => FileConfigurationSource::with_path(path),
        None => FileConfigurationSource::new(),
    };
    let config = source.load().await?;

    init_tracing(&config.logging, &config.observability.tracing);
    let metrics = init_metrics(&config.observability.metrics);

    let app = crate::create_app(&config, Arc::new(source)).await?;

    let result = match cli.command {
        Command::Validate => admin::validate(&app).await,
        Command::Health => admin::health(&app).await,
        Command::Complete(args) => request::complete(&app, args).await,
        Command::Stream(args) => request::stream(&app, args).await,
        Command::Embed(args) => request::embed(&app, args).await,
        Command::Assign(args) => experiment::assign(&app, args).await,
        Command::AbTest(args) => experiment::ab_test(&app, args).await,
        Command::Summary(args) => experiment::summary(&app, args).await,
    };

    if cli.print_metrics {
        if let Some(metrics) = &metrics {
            eprintln!("{}", metrics.render());
        }
    }

    shutdown_tracing();
    result
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
