use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use connectors::{ConnectorRegistry, ModerationOutcome, ModerationRequest};
use dispatch_engine::{ActionExecutor, ExecutorConfig};
use platform_client::SimulationConfig;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Execute Shield moderation actions across platforms")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a batch of moderation requests
    Run {
        /// JSON file holding an array of moderation requests
        requests: PathBuf,

        /// Executor config file (circuit breaker and retry settings)
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Send actions to simulated or live platforms
        #[arg(short = 'm', long, value_enum, default_value_t = Mode::Simulated)]
        mode: Mode,

        /// Fraction of simulated calls that fail
        #[arg(long, default_value_t = 0.0)]
        failure_rate: f64,
    },
    /// Print what each platform supports
    Capabilities,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// In-process platforms with simulated latency
    Simulated,
    /// Real platform APIs, credentials from the environment
    Live,
}

/// One line of batch output
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchLine<'a> {
    index: usize,
    request: &'a ModerationRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a ModerationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Run {
            requests,
            config,
            mode,
            failure_rate,
        } => run(requests, config, mode, failure_rate).await,
        Command::Capabilities => {
            let (registry, _) = ConnectorRegistry::simulated(SimulationConfig::instant());
            println!("{}", serde_json::to_string_pretty(&registry.capabilities())?);
            Ok(())
        }
    }
}

async fn run(
    requests: PathBuf,
    config: Option<PathBuf>,
    mode: Mode,
    failure_rate: f64,
) -> Result<()> {
    let text = std::fs::read_to_string(&requests)
        .with_context(|| format!("failed to read requests from {}", requests.display()))?;
    let batch: Vec<ModerationRequest> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of requests", requests.display()))?;

    let config = match config {
        Some(path) => ExecutorConfig::from_file(&path)
            .with_context(|| format!("failed to load executor config from {}", path.display()))?,
        None => ExecutorConfig::default(),
    };

    let registry = match mode {
        Mode::Simulated => {
            let simulation = SimulationConfig::default().with_failure_rate(failure_rate);
            ConnectorRegistry::simulated(simulation).0
        }
        Mode::Live => {
            ConnectorRegistry::from_env().context("failed to configure platform connectors")?
        }
    };

    tracing::info!(requests = batch.len(), mode = ?mode, "Starting Shield batch");
    let executor = Arc::new(ActionExecutor::new(registry, config));

    let handles: Vec<_> = batch
        .into_iter()
        .map(|request| {
            let executor = executor.clone();
            tokio::spawn(async move {
                let result = executor.execute(&request).await;
                (request, result)
            })
        })
        .collect();

    for (index, handle) in handles.into_iter().enumerate() {
        let (request, result) = handle.await.context("action task panicked")?;
        let line = match &result {
            Ok(outcome) => BatchLine {
                index,
                request: &request,
                outcome: Some(outcome),
                error: None,
                error_kind: None,
            },
            Err(err) => BatchLine {
                index,
                request: &request,
                outcome: None,
                error: Some(err.to_string()),
                error_kind: Some(err.kind()),
            },
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    println!("{}", serde_json::to_string_pretty(&executor.metrics())?);
    println!("{}", serde_json::to_string_pretty(&executor.circuit_breaker_status())?);
    Ok(())
}
