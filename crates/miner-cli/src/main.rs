use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use miner_core::app::AppBuilder;
use miner_core::config::MinerConfig;
use miner_core::impls::{EchoDelegate, InMemoryChain, LoggingSubmitter};
use miner_core::registry::ModelRegistry;

#[derive(Parser)]
#[command(name = "miner")]
#[command(about = "Off-chain task miner: discover, queue, execute, submit", long_about = None)]
struct Cli {
    /// Verbosity level (can be repeated)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the miner against an in-memory chain
    Run {
        /// Model templates, `{ "<model id>": template }`
        #[arg(short, long, value_name = "FILE")]
        models: PathBuf,

        /// Tasks to seed the chain with, `[ { task_id, model_id, ... } ]`
        #[arg(short, long, value_name = "FILE")]
        tasks: Option<PathBuf>,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        for_secs: Option<u64>,

        /// Simulated inference time of the echo model
        #[arg(long, default_value = "1000")]
        echo_delay_ms: u64,
    },

    /// List the models a template file provides
    Models {
        #[arg(short, long, value_name = "FILE")]
        models: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("miner={level},miner_core={level}"));
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            models,
            tasks,
            for_secs,
            echo_delay_ms,
        } => run(models, tasks, for_secs, echo_delay_ms).await,
        Commands::Models { models } => list_models(models),
        Commands::Config => print_config(),
    }
}

async fn run(
    models: PathBuf,
    tasks: Option<PathBuf>,
    for_secs: Option<u64>,
    echo_delay_ms: u64,
) -> Result<()> {
    let config = MinerConfig::from_env().context("invalid configuration")?;
    let registry = ModelRegistry::from_json_file(&models)
        .with_context(|| format!("failed to load models from {}", models.display()))?;
    let model_ids = registry.model_ids();
    info!(models = model_ids.len(), "model registry loaded");

    let chain = match &tasks {
        Some(path) => InMemoryChain::from_json_file(path)
            .with_context(|| format!("failed to load tasks from {}", path.display()))?,
        None => InMemoryChain::new(),
    };
    info!(tasks = chain.len(), "in-memory chain seeded");

    let app = AppBuilder::new(config)
        .registry(registry)
        .delegate(Arc::new(EchoDelegate::new(Duration::from_millis(echo_delay_ms))))
        .chain(Arc::new(chain))
        .submitter(Arc::new(LoggingSubmitter))
        .expect_models(&model_ids)
        .build()?;

    let mut events = app.queue().subscribe();
    app.start();

    let stop = async {
        match for_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
            }
        }
    };
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            event = events.recv() => match event {
                Ok(event) => info!(
                    job_id = %event.job_id,
                    task_id = %event.task_id,
                    attempt = event.attempt,
                    event = event.name(),
                    "job event"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    info!("shutting down");
    app.shutdown().await;

    let queue = app.queue_stats().await;
    let orchestrator = app.orchestrator_stats();
    println!("queue:        {}", serde_json::to_string(&queue)?);
    println!("orchestrator: {}", serde_json::to_string(&orchestrator)?);
    Ok(())
}

fn list_models(models: PathBuf) -> Result<()> {
    let registry = ModelRegistry::from_json_file(&models)
        .with_context(|| format!("failed to load models from {}", models.display()))?;
    for model_id in registry.model_ids() {
        if let Some(template) = registry.lookup(&model_id) {
            let inputs: Vec<&str> = template
                .input
                .iter()
                .map(|field| field.variable.as_str())
                .collect();
            println!(
                "{model_id}  {} v{}  inputs: {}",
                template.meta.title,
                template.meta.version,
                inputs.join(", ")
            );
        }
    }
    Ok(())
}

fn print_config() -> Result<()> {
    let config = MinerConfig::from_env()?;
    for (key, value) in config.entries() {
        println!("{key}={value}");
    }
    Ok(())
}
