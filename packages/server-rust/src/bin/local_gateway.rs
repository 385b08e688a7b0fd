//! Development gateway with in-process handlers.
//!
//! Serves the route surface over HTTP, or with `--batch-file` runs one SQS
//! trigger event through the queue handler and prints the batch response.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use tunnel_server::network::{NetworkConfig, NetworkModule};
use tunnel_server::queue::{BodyEncoding, MemoryQueueClient, QueueHandler, SqsEvent};
use tunnel_server::service::{BatchModes, Dispatcher, GatewayConfig, LocalInvoker};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Encoding {
    Base64,
    Raw,
}

#[derive(Debug, Parser)]
#[command(name = "local-gateway", version, about = "Local tunnel gateway")]
struct Cli {
    #[arg(long, env = "TUNNEL_HOST", default_value = "127.0.0.1")]
    host: String,
    #[arg(long, env = "TUNNEL_PORT", default_value_t = 8080)]
    port: u16,
    /// Request timeout in seconds.
    #[arg(long, env = "TUNNEL_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    /// Report per-message failures instead of failing the whole delivery.
    #[arg(long, env = "TUNNEL_BATCH_MODE", default_value_t = true, action = ArgAction::Set)]
    batch_mode: bool,
    /// Abort a delivery at its first failed message.
    #[arg(long, env = "TUNNEL_SUSPEND_MODE", default_value_t = false, action = ArgAction::Set)]
    suspend_mode: bool,
    /// Send replies for messages that request them.
    #[arg(long, env = "TUNNEL_REPLY_MODE", default_value_t = true, action = ArgAction::Set)]
    reply_mode: bool,
    #[arg(long, env = "TUNNEL_HEALTH_TEXT", default_value = "OK")]
    health_text: String,
    #[arg(long, env = "TUNNEL_BODY_ENCODING", value_enum, default_value = "base64")]
    body_encoding: Encoding,

    /// Process this SQS event JSON file and exit instead of serving HTTP.
    #[arg(long, env = "TUNNEL_BATCH_FILE")]
    batch_file: Option<PathBuf>,
    /// Emit logs as JSON lines.
    #[arg(long, env = "TUNNEL_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            modes: BatchModes {
                batch: self.batch_mode,
                suspend: self.suspend_mode,
                reply: self.reply_mode,
            },
            health_text: self.health_text.clone(),
            body_encoding: match self.body_encoding {
                Encoding::Base64 => BodyEncoding::Base64,
                Encoding::Raw => BodyEncoding::Raw,
            },
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn local_handlers() -> LocalInvoker {
    LocalInvoker::new()
        .with_handler("echo", |_, payload| Ok(payload.to_string()))
        .with_handler("print", |path, payload| {
            println!("{path} received {} bytes", payload.len());
            Ok(payload.to_string())
        })
        .with_handler("fail", |path, _| Err(format!("{path} always fails")))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cli.gateway_config();
    let invoker = Arc::new(local_handlers());
    tracing::info!(handlers = ?invoker.handler_names(), "local handlers registered");
    let dispatcher = Dispatcher::standard(invoker, &config)?;

    if let Some(path) = &cli.batch_file {
        return run_batch_file(path, dispatcher, &config).await;
    }

    let mut module = NetworkModule::new(cli.network_config(), dispatcher);
    let port = module.start().await?;
    tracing::info!(port, "local gateway listening");
    module
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
}

async fn run_batch_file(
    path: &Path,
    dispatcher: Dispatcher,
    config: &GatewayConfig,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let event: SqsEvent = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing SQS event from {}", path.display()))?;

    let client = Arc::new(MemoryQueueClient::new());
    let handler = QueueHandler::new(dispatcher, client.clone(), config);
    let response = handler.handle_event(event).await?;

    for reply in client.sent() {
        tracing::info!(
            destination = %reply.destination_queue_id,
            bytes = reply.body.len(),
            "reply captured"
        );
    }
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
