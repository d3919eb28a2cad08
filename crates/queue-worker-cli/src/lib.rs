//! # Queue Worker CLI
//!
//! Command-line interface for the queue worker.
//!
//! This module provides CLI commands for:
//! - Running a consumer against a configured queue
//! - Publishing JSON messages and Celery tasks
//! - Showing the resolved configuration
//! - Generating shell completions

use clap::{CommandFactory, Parser, Subcommand};
use queue_worker_core::{Consumer, ConsumerError, ConsumerReport};
use queue_worker_runtime::{
    MessageGroupId, QueueError, QueueName, QueueProvider, QueueProviderFactory, QueueSender,
    ValidationError,
};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod handler;
pub mod settings;

pub use settings::{load_configuration, ConfigError, ConfigFormat, WorkerConfig};
pub use handler::LogPayloadHandler;

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue worker - runs task handlers against a message queue
#[derive(Parser)]
#[command(name = "queue-worker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Consume and publish tasks on a message queue")]
#[command(
    long_about = "Pulls tasks from a visibility-timeout queue and runs them with bounded concurrency"
)]
pub struct Cli {
    /// Configuration file path, applied after the file named by QW_CONFIG_FILE
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Logging level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Consume messages until interrupted or the iteration limit is reached
    Consume {
        /// Queue name or URL, overriding the configured queue
        #[arg(short, long)]
        queue: Option<QueueName>,

        /// Stop after this many polls
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Maximum number of tasks running at once
        #[arg(long)]
        max_concurrent_tasks: Option<usize>,
    },

    /// Send a JSON message
    Send {
        /// Queue name or URL
        #[arg(short, long)]
        queue: QueueName,

        /// Message body; must be valid JSON
        #[arg(short, long)]
        body: String,

        /// Message group for FIFO queues
        #[arg(short, long)]
        group_id: Option<String>,
    },

    /// Send a Celery task
    SendTask {
        /// Queue name or URL
        #[arg(short, long)]
        queue: QueueName,

        /// Registered task name
        #[arg(short, long)]
        name: String,

        /// Positional arguments as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,

        /// Keyword arguments as a JSON object
        #[arg(long, default_value = "{}")]
        kwargs: String,
    },

    /// Show the resolved configuration
    Config {
        /// Output format for configuration
        #[arg(short = 'f', long, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Consumer error: {0}")]
    Consumer(#[from] ConsumerError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 3,
            Self::Consumer(ConsumerError::Config(_)) => 3,
            Self::Consumer(ConsumerError::Startup { .. }) => 4,
            Self::Queue(_) => 5,
            Self::InvalidArgument { .. } => 2,
            Self::CommandFailed { .. } => 1,
            Self::Io(_) => 1,
        }
    }
}

fn invalid_argument(arg: &str, message: impl ToString) -> CliError {
    CliError::InvalidArgument {
        arg: arg.to_string(),
        message: message.to_string(),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    execute(cli).await
}

/// Execute a parsed command line
pub async fn execute(cli: Cli) -> Result<(), CliError> {
    if let Commands::Completions { shell } = cli.command {
        return execute_completions_command(shell);
    }

    let config = load_configuration(cli.config.as_deref())?;

    match cli.command {
        Commands::Consume {
            queue,
            max_iterations,
            max_concurrent_tasks,
        } => execute_consume_command(config, queue, max_iterations, max_concurrent_tasks)
            .await
            .map(|_| ()),
        Commands::Send {
            queue,
            body,
            group_id,
        } => execute_send_command(&config, queue, body, group_id).await,
        Commands::SendTask {
            queue,
            name,
            args,
            kwargs,
        } => execute_send_task_command(&config, queue, &name, &args, &kwargs).await,
        Commands::Config { format } => execute_config_command(&config, format),
        Commands::Completions { shell } => execute_completions_command(shell),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging based on CLI arguments
///
/// `RUST_LOG` wins over `--log-level` when set.
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("queue_worker={},warn", cli.log_level))
            .map_err(|e| invalid_argument("log-level", e))
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("failed to initialize logging: {e}"),
    })
}

/// Run a consumer with the payload-logging handler
pub async fn execute_consume_command(
    mut config: WorkerConfig,
    queue: Option<QueueName>,
    max_iterations: Option<u64>,
    max_concurrent_tasks: Option<usize>,
) -> Result<ConsumerReport, CliError> {
    if let Some(queue) = queue {
        config.consumer.queue = Some(queue);
    }
    if let Some(max_iterations) = max_iterations {
        config.consumer.max_iterations = Some(max_iterations);
    }
    if let Some(max_concurrent_tasks) = max_concurrent_tasks {
        config.consumer.max_concurrent_tasks = max_concurrent_tasks;
    }

    let provider = QueueProviderFactory::create_provider(&config.provider)?;
    let consumer = Consumer::new(provider, config.consumer, LogPayloadHandler)?;

    info!(queue = %consumer.queue_name(), "Starting consumer");
    let report = consumer.run_until(shutdown_signal()).await?;

    println!("{report}");
    Ok(report)
}

/// Publish one JSON message
async fn execute_send_command(
    config: &WorkerConfig,
    queue: QueueName,
    body: String,
    group_id: Option<String>,
) -> Result<(), CliError> {
    serde_json::from_str::<Value>(&body).map_err(|e| invalid_argument("body", e))?;

    let group_id = group_id
        .map(MessageGroupId::new)
        .transpose()
        .map_err(|e: ValidationError| invalid_argument("group-id", e))?;

    let provider = QueueProviderFactory::create_provider(&config.provider)?;
    let sender = QueueSender::new(provider.clone(), queue);
    let message_id = sender.send_text(body, group_id).await?;
    provider.close().await?;

    info!(queue = %sender.queue(), message_id = %message_id, "Message sent");
    println!("{message_id}");
    Ok(())
}

/// Publish one Celery task
async fn execute_send_task_command(
    config: &WorkerConfig,
    queue: QueueName,
    name: &str,
    args: &str,
    kwargs: &str,
) -> Result<(), CliError> {
    let args: Vec<Value> = serde_json::from_str(args).map_err(|e| invalid_argument("args", e))?;
    let kwargs: Map<String, Value> =
        serde_json::from_str(kwargs).map_err(|e| invalid_argument("kwargs", e))?;

    let provider = QueueProviderFactory::create_provider(&config.provider)?;
    let sender = QueueSender::new(provider.clone(), queue);
    let task_id = sender.send_task(name, &args, &kwargs).await?;
    provider.close().await?;

    info!(queue = %sender.queue(), task = %name, task_id = %task_id, "Task sent");
    println!("{task_id}");
    Ok(())
}

/// Print the resolved configuration
fn execute_config_command(config: &WorkerConfig, format: ConfigFormat) -> Result<(), CliError> {
    let rendered = settings::render(&config.redacted(), format)?;
    println!("{rendered}");
    Ok(())
}

/// Print shell completions to stdout
fn execute_completions_command(shell: clap_complete::Shell) -> Result<(), CliError> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
    Ok(())
}

/// Completes on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), finishing in-flight tasks");
        },
        _ = terminate => {
            info!("Received SIGTERM, finishing in-flight tasks");
        },
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
