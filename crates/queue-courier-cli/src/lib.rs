//! # Queue Courier CLI
//!
//! Command-line front end for Queue Courier.
//!
//! This module provides CLI commands for:
//! - Creating, resolving and deleting queues
//! - Sending plain messages and packed location records
//! - Receiving (and optionally acknowledging) messages, once or continuously
//! - Validating and printing the resolved configuration

use clap::{CommandFactory, Parser, Subcommand};
use queue_courier_core::{
    codec, AckMode, AttributeValue, ClientConfig, ConfigurationError, OutboundMessage,
    QueueAttributes, QueueClient, QueueError, QueueName, ReceiveOptions, ReceivedMessage,
    SendError,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "QC";

/// Longest wait a single receive may long-poll for
const MAX_WAIT_SECONDS: u64 = 20;

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue Courier CLI - send and receive messages on SQS-compatible queues
#[derive(Parser)]
#[command(name = "queue-courier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send and receive messages on SQS-compatible queues")]
#[command(
    long_about = "Queue Courier sends, receives and acknowledges messages on SQS-compatible \
                  queues with at-least-once delivery"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "QUEUE_COURIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, overriding the configured one
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a queue, or confirm an identical one exists
    CreateQueue {
        /// Queue name
        name: String,

        /// Queue attribute as KEY=VALUE
        #[arg(short = 'a', long = "attribute", value_parser = parse_key_value)]
        attributes: Vec<(String, String)>,
    },

    /// Print the URL of a queue
    Resolve {
        /// Queue name (defaults to the configured default queue)
        name: Option<String>,
    },

    /// Delete a queue and its messages
    DeleteQueue {
        /// Queue name (defaults to the configured default queue)
        name: Option<String>,
    },

    /// Send a message
    Send {
        /// Target queue (defaults to the configured default queue)
        #[arg(short, long)]
        queue: Option<String>,

        /// Message body
        body: String,

        /// String attribute as KEY=VALUE
        #[arg(short = 's', long = "string", value_parser = parse_key_value)]
        strings: Vec<(String, String)>,

        /// Number attribute as KEY=NUMBER
        #[arg(short = 'n', long = "number", value_parser = parse_key_value)]
        numbers: Vec<(String, String)>,

        /// FIFO message group
        #[arg(long)]
        group_id: Option<String>,

        /// FIFO deduplication id
        #[arg(long)]
        dedup_id: Option<String>,

        /// Delivery delay in seconds
        #[arg(long)]
        delay_seconds: Option<u64>,
    },

    /// Send a record carrying a source path and line number
    SendRecord {
        /// Target queue (defaults to the configured default queue)
        #[arg(short, long)]
        queue: Option<String>,

        /// Source path
        #[arg(long)]
        path: String,

        /// Line number
        #[arg(long)]
        line: u64,

        /// Record text
        body: String,
    },

    /// Receive messages
    Receive {
        /// Source queue (defaults to the configured default queue)
        #[arg(short, long)]
        queue: Option<String>,

        /// Maximum number of messages per receive (1-10)
        #[arg(short, long, default_value = "1")]
        max: u32,

        /// Long-poll wait in seconds (0-20); 20 when following
        #[arg(short, long)]
        wait: Option<u64>,

        /// Visibility timeout in seconds for received messages
        #[arg(long)]
        visibility: Option<u64>,

        /// Acknowledge each message after printing it
        #[arg(long, conflicts_with = "auto_ack")]
        ack: bool,

        /// Delete messages as soon as they are received
        #[arg(long)]
        auto_ack: bool,

        /// Decode messages as path/line records
        #[arg(short, long)]
        records: bool,

        /// Keep receiving until interrupted
        #[arg(short, long)]
        follow: bool,
    },

    /// Validate configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// One JSON document per result
    Json,
}

/// Parse a `KEY=VALUE` argument
fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", arg))?;

    if key.is_empty() {
        return Err(format!("missing key in '{}'", arg));
    }

    Ok((key.to_string(), value.to_string()))
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Queue(_) => 2,
            Self::InvalidArgument { .. } => 3,
            Self::Io(_) => 4,
            Self::Logging { .. } => 5,
        }
    }
}

impl From<SendError> for CliError {
    fn from(error: SendError) -> Self {
        Self::Queue(error.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Io(error.into())
    }
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidFormat(#[from] config::ConfigError),

    #[error("Could not render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ConfigurationError),

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },
}

// ============================================================================
// Configuration Types
// ============================================================================

/// CLI configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// Queue used when a command does not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_queue: Option<String>,

    /// Queue service connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ClientConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Connection settings, or an error naming the missing section
    pub fn connection(&self) -> Result<&ClientConfig, ConfigError> {
        self.connection
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "connection".to_string(),
            })
    }

    /// Name of the queue to use, falling back to `default_queue`
    pub fn queue_name(&self, requested: Option<&str>) -> Result<QueueName, CliError> {
        let name = requested
            .or(self.default_queue.as_deref())
            .ok_or_else(|| CliError::InvalidArgument {
                arg: "queue".to_string(),
                message: "no queue given and no default_queue configured".to_string(),
            })?;

        QueueName::new(name.to_string()).map_err(|e| CliError::InvalidArgument {
            arg: "queue".to_string(),
            message: e.to_string(),
        })
    }

    /// Validate the configuration as a whole
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection()?.validate()?;

        if let Some(queue) = &self.default_queue {
            QueueName::new(queue.clone()).map_err(|e| ConfigurationError::Invalid {
                message: format!("default_queue: {}", e),
            })?;
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum LogFormat {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "json")]
    Json,
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_configuration(cli.config.as_deref())?;

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let json = cli.json_logs || config.logging.format == LogFormat::Json;
    initialize_logging(level, json)?;

    let mut out = std::io::stdout();

    // Execute command
    match cli.command {
        Commands::Config { show } => execute_config_command(&config, show, cli.output, &mut out),
        Commands::Completions { shell } => execute_completions_command(shell, &mut out),
        command => {
            let auto_ack = matches!(command, Commands::Receive { auto_ack: true, .. });
            let client = connect(&config, auto_ack).await?;
            let shutdown = shutdown_on_ctrl_c();
            execute_queue_command(&client, &config, command, cli.output, shutdown, &mut out).await
        }
    }
}

/// Initialize logging to stderr
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn initialize_logging(level: &str, json: bool) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CliError::Logging {
            message: format!("invalid log level '{}': {}", level, e),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Load configuration
///
/// Sources, later ones overriding earlier ones:
/// 1. The file given by `path`, or else the optional user file
///    `<config dir>/queue-courier/config.toml`
/// 2. Environment variables prefixed `QC__` with `__` as the separator,
///    e.g. `QC__CONNECTION__PROVIDER__REGION=eu-west-1`
pub fn load_configuration(path: Option<&Path>) -> Result<CliConfig, ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }
        None => {
            if let Some(user_file) = user_config_path() {
                builder = builder.add_source(
                    config::File::from(user_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }
    }

    let config = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("queue-courier").join("config.toml"))
}

/// Build a client for the configured connection
pub async fn connect(config: &CliConfig, auto_ack: bool) -> Result<QueueClient, CliError> {
    let mut connection = config.connection()?.clone();
    if auto_ack {
        connection.ack_mode = AckMode::AutoAcknowledge;
    }

    let client = QueueClient::connect(connection).await?;
    debug!(service = %client.service_kind(), "Connected to queue service");
    Ok(client)
}

/// Shutdown signal that flips to `true` on Ctrl-C
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; stopping");
            let _ = tx.send(true);
        }
    });
    rx
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Execute a command that talks to the queue service
pub async fn execute_queue_command<W: Write>(
    client: &QueueClient,
    config: &CliConfig,
    command: Commands,
    format: OutputFormat,
    shutdown: watch::Receiver<bool>,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        Commands::CreateQueue { name, attributes } => {
            let name = config.queue_name(Some(&name))?;
            let attributes = attributes
                .into_iter()
                .fold(QueueAttributes::new(), |attrs, (k, v)| attrs.with(k, v));

            let handle = client.ensure(&name, &attributes).await?;
            print_queue(out, format, handle.name().as_str(), handle.url())
        }
        Commands::Resolve { name } => {
            let name = config.queue_name(name.as_deref())?;
            let handle = client.resolve(&name).await?;
            print_queue(out, format, handle.name().as_str(), handle.url())
        }
        Commands::DeleteQueue { name } => {
            let name = config.queue_name(name.as_deref())?;
            let handle = client.resolve(&name).await?;
            client.delete_queue(&handle).await?;

            match format {
                OutputFormat::Text => writeln!(out, "Deleted queue {}", name)?,
                OutputFormat::Json => {
                    writeln!(out, "{}", serde_json::json!({ "deleted": name.as_str() }))?
                }
            }
            Ok(())
        }
        Commands::Send {
            queue,
            body,
            strings,
            numbers,
            group_id,
            dedup_id,
            delay_seconds,
        } => {
            let name = config.queue_name(queue.as_deref())?;

            let mut message = OutboundMessage::new(body);
            for (key, value) in strings {
                message = message.with_string_attribute(key, value);
            }
            for (key, value) in numbers {
                message = message.with_attribute(key, AttributeValue::Number(value));
            }
            if let Some(group_id) = group_id {
                message = message.with_group_id(group_id);
            }
            if let Some(dedup_id) = dedup_id {
                message = message.with_deduplication_id(dedup_id);
            }
            if let Some(delay) = delay_seconds {
                message = message.with_delay(Duration::from_secs(delay));
            }

            send(client, &name, message, format, out).await
        }
        Commands::SendRecord {
            queue,
            path,
            line,
            body,
        } => {
            let name = config.queue_name(queue.as_deref())?;
            send(client, &name, codec::pack(path, body, line), format, out).await
        }
        Commands::Receive {
            queue,
            max,
            wait,
            visibility,
            ack,
            auto_ack: _,
            records,
            follow,
        } => {
            let name = config.queue_name(queue.as_deref())?;
            let default_wait = if follow { MAX_WAIT_SECONDS } else { 0 };

            let mut options = ReceiveOptions::new()
                .with_max_messages(max)
                .with_wait(Duration::from_secs(wait.unwrap_or(default_wait)));
            if let Some(visibility) = visibility {
                options = options.with_visibility_timeout(Duration::from_secs(visibility));
            }
            options.validate().map_err(|e| CliError::InvalidArgument {
                arg: "receive".to_string(),
                message: e.to_string(),
            })?;

            let receive = ReceiveCommand {
                options,
                acknowledge: ack,
                records,
                follow,
                format,
            };
            execute_receive_command(client, &name, &receive, shutdown, out).await
        }
        Commands::Config { .. } | Commands::Completions { .. } => {
            Err(CliError::InvalidArgument {
                arg: "command".to_string(),
                message: "command does not use a queue connection".to_string(),
            })
        }
    }
}

async fn send<W: Write>(
    client: &QueueClient,
    name: &QueueName,
    message: OutboundMessage,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), CliError> {
    let handle = client.resolve(name).await?;
    let message_id = client.send(&handle, message).await?;

    match format {
        OutputFormat::Text => writeln!(out, "{}", message_id)?,
        OutputFormat::Json => writeln!(
            out,
            "{}",
            serde_json::json!({ "queue": name.as_str(), "message_id": message_id.as_str() })
        )?,
    }
    Ok(())
}

fn print_queue<W: Write>(
    out: &mut W,
    format: OutputFormat,
    name: &str,
    url: &str,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", url)?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::json!({ "name": name, "url": url }))?,
    }
    Ok(())
}

/// Options of a `receive` invocation
#[derive(Debug, Clone)]
pub struct ReceiveCommand {
    pub options: ReceiveOptions,
    /// Acknowledge each message once it has been printed
    pub acknowledge: bool,
    /// Decode bodies as packed records
    pub records: bool,
    /// Keep receiving until `shutdown` flips to `true`
    pub follow: bool,
    pub format: OutputFormat,
}

/// Receive, print and optionally acknowledge messages
///
/// Returns once a single receive completes, or when following, once the
/// shutdown signal is raised. Messages that fail to decode as records are
/// reported and left unacknowledged. A failed automatic acknowledgement is
/// returned as an error once its batch has been printed.
pub async fn execute_receive_command<W: Write>(
    client: &QueueClient,
    name: &QueueName,
    command: &ReceiveCommand,
    shutdown: watch::Receiver<bool>,
    out: &mut W,
) -> Result<(), CliError> {
    let handle = client.resolve(name).await?;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let mut signal = shutdown.clone();
        let batch = client
            .receive_batch_until(&handle, &command.options, async move {
                let _ = signal.wait_for(|stopped| *stopped).await;
            })
            .await?;
        let messages = batch.messages;

        for message in &messages {
            if !print_message(out, message, command)? {
                continue;
            }
            if command.acknowledge {
                client.acknowledge(message).await?;
            }
        }
        out.flush()?;

        // Printed messages that --auto-ack could not delete will come back
        if let Some((_, error)) = batch.acknowledge_failures.into_iter().next() {
            return Err(error.into());
        }

        if !command.follow {
            break;
        }
        if messages.is_empty() && shutdown.has_changed().is_err() {
            // The shutdown signal can no longer be raised
            break;
        }
    }

    Ok(())
}

/// Print one message; returns false if it could not be decoded
fn print_message<W: Write>(
    out: &mut W,
    message: &ReceivedMessage,
    command: &ReceiveCommand,
) -> Result<bool, CliError> {
    if command.records {
        let record = match codec::unpack(message) {
            Ok(record) => record,
            Err(e) => {
                warn!(message_id = %message.message_id, error = %e, "Message is not a record");
                return Ok(false);
            }
        };

        match command.format {
            OutputFormat::Text => writeln!(out, "{}:{}: {}", record.path, record.line, record.body)?,
            OutputFormat::Json => writeln!(
                out,
                "{}",
                serde_json::json!({
                    "message_id": message.message_id.as_str(),
                    "receive_count": message.receive_count,
                    "path": record.path,
                    "line": record.line,
                    "body": record.body,
                })
            )?,
        }
        return Ok(true);
    }

    match command.format {
        OutputFormat::Text => {
            writeln!(
                out,
                "{} (receive #{})",
                message.message_id, message.receive_count
            )?;
            for (key, value) in &message.attributes {
                match value {
                    AttributeValue::Binary(bytes) => {
                        writeln!(out, "  {}: <{} bytes>", key, bytes.len())?
                    }
                    _ => writeln!(out, "  {}: {}", key, value.as_text().unwrap_or_default())?,
                }
            }
            writeln!(out, "{}", message.body)?;
        }
        OutputFormat::Json => writeln!(
            out,
            "{}",
            serde_json::json!({
                "message_id": message.message_id.as_str(),
                "receive_count": message.receive_count,
                "group_id": message.group_id,
                "attributes": serde_json::to_value(&message.attributes)?,
                "body": message.body,
            })
        )?,
    }
    Ok(true)
}

/// Execute config command
pub fn execute_config_command<W: Write>(
    config: &CliConfig,
    show: bool,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), CliError> {
    if show {
        match format {
            OutputFormat::Text => {
                let rendered = toml::to_string_pretty(config).map_err(ConfigError::from)?;
                write!(out, "{}", rendered)?;
            }
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(config)?)?,
        }
    }

    config.validate()?;
    if !show {
        writeln!(out, "Configuration is valid")?;
    }
    Ok(())
}

/// Execute completions command
pub fn execute_completions_command<W: Write>(
    shell: clap_complete::Shell,
    out: &mut W,
) -> Result<(), CliError> {
    info!(shell = ?shell, "Generating shell completions");

    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "queue-courier", out);
    Ok(())
}
