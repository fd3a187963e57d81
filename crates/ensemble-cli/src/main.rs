mod config;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use config::EnsembleConfig;
use ensemble_bus::{QueueClient, RedisQueue};
use ensemble_core::{IncomingTask, TaskId};
use ensemble_orchestrator::{
    FileArtifactStore, FileTaskStore, Orchestrator, ReasoningJudge, ReasoningPlanner, TaskStore,
};
use ensemble_reasoning::ReasoningClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ensemble", about = "Ensemble: multi-agent task orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ensemble.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator loop until Ctrl-C
    Run,
    /// Push a task onto the incoming queue
    Submit {
        /// Task id (defaults to a random UUID)
        #[arg(long)]
        id: Option<String>,
        /// Task payload as JSON
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Print the ledger record of a task
    Status {
        /// Task id
        id: String,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = EnsembleConfig::load(&cli.config).await?;
    config.apply_env(|key| std::env::var(key).ok());

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Submit { id, payload } => submit(config, id, &payload).await,
        Commands::Status { id } => status(config, id).await,
    }
}

async fn connect(config: &EnsembleConfig) -> anyhow::Result<Arc<RedisQueue>> {
    let queue = RedisQueue::connect(&config.bus.redis_url)
        .await
        .with_context(|| format!("Failed to connect to queue backend at {}", config.bus.redis_url))?;
    Ok(Arc::new(queue))
}

async fn run(config: EnsembleConfig) -> anyhow::Result<()> {
    let backend = connect(&config).await?;
    let reasoning = Arc::new(
        ReasoningClient::new(config.model.clone()).context("Invalid [model] configuration")?,
    );
    info!(
        provider = ?config.model.provider,
        model = %config.model.model_id,
        base_url = %config.model.base_url(),
        "Reasoning backend configured"
    );

    let artifacts = FileArtifactStore::new(config.artifacts_dir())
        .await
        .context("Failed to open artifact directory")?;
    let ledger = FileTaskStore::new(config.tasks_dir())
        .await
        .context("Failed to open task ledger")?;

    let orchestrator = Orchestrator::builder(
        backend,
        Arc::new(ReasoningPlanner::new(reasoning.clone())),
        Arc::new(ReasoningJudge::new(reasoning)),
    )
    .config(config.orchestrator.clone())
    .artifacts(Arc::new(artifacts))
    .ledger(Arc::new(ledger))
    .build();

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C, shutting down"),
        }
        signal.cancel();
    });

    orchestrator
        .run(shutdown)
        .await
        .context("Orchestrator stopped with an error")?;

    let metrics = orchestrator.tracker().metrics().await;
    info!(
        started = metrics.started,
        approved = metrics.approved,
        failed = metrics.failed,
        partial = metrics.partial,
        "Final task counts"
    );
    Ok(())
}

async fn submit(config: EnsembleConfig, id: Option<String>, payload: &str) -> anyhow::Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("--payload must be valid JSON")?;
    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let backend = connect(&config).await?;
    let client = QueueClient::new(backend, config.orchestrator.queues.clone());
    let task = IncomingTask {
        id: TaskId::new(id),
        payload,
    };
    client
        .send(&client.names().incoming, &task)
        .await
        .context("Failed to submit task")?;

    info!(task_id = %task.id, queue = %client.names().incoming, "Task submitted");
    println!("{}", task.id);
    Ok(())
}

async fn status(config: EnsembleConfig, id: String) -> anyhow::Result<()> {
    let ledger = FileTaskStore::new(config.tasks_dir())
        .await
        .context("Failed to open task ledger")?;
    let id = TaskId::new(id);
    let record = ledger
        .get(&id)
        .await?
        .with_context(|| format!("Unknown task '{id}'"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
