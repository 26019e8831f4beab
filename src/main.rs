//! liveline - MCP server for Ableton Live
//!
//! Speaks JSON-RPC on stdin/stdout and talks to AbletonOSC over UDP. All
//! logging goes to stderr.
//!
//! Usage: liveline [--host HOST] [--send-port PORT] [--receive-port PORT]
//!                 [--index-path PATH] [--read-only] [--log-json]

use clap::Parser;
use liveline::prelude::*;
use liveline::samples::DEFAULT_INDEX_PATH;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "liveline", version, about = "MCP server for Ableton Live over AbletonOSC")]
struct Cli {
    /// AbletonOSC host (defaults to OSC_HOST, then 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Port AbletonOSC listens on (defaults to OSC_SEND_PORT, then 11001)
    #[arg(long)]
    send_port: Option<u16>,

    /// Local port for replies (defaults to OSC_RECEIVE_PORT, then 11000)
    #[arg(long)]
    receive_port: Option<u16>,

    /// Sample index file
    #[arg(long, env = "SAMPLE_INDEX_PATH", default_value = DEFAULT_INDEX_PATH)]
    index_path: PathBuf,

    /// Start with write tools blocked
    #[arg(
        long,
        env = "LIVELINE_READ_ONLY",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    read_only: bool,

    /// Log JSON lines instead of text
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn osc_config(&self) -> OscConfig {
        let mut config = OscConfig::from_env();
        if let Some(host) = &self.host {
            config = config.with_host(host.clone());
        }
        if let Some(port) = self.send_port {
            config = config.with_send_port(port);
        }
        if let Some(port) = self.receive_port {
            config = config.with_receive_port(port);
        }
        config
    }
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL` (error|warn|info|debug), default info.
fn log_filter() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| matches!(l.as_str(), "error" | "warn" | "info" | "debug"))
        .unwrap_or_else(|| "info".to_string());
    EnvFilter::new(level)
}

fn init_logging(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> liveline::Result<()> {
    let osc = cli.osc_config();
    tracing::info!(
        host = %osc.host,
        send_port = osc.send_port,
        receive_port = osc.receive_port,
        index_path = %cli.index_path.display(),
        read_only = cli.read_only,
        "Starting liveline"
    );

    let session = Arc::new(OscSession::new(SessionConfig::new(osc)));
    let samples = Arc::new(SampleLibrary::new(cli.index_path.clone()));
    let ctx = ToolContext::new(session, samples).with_read_only(cli.read_only);
    let server = Server::new(ToolRegistry::new(Arc::new(ctx)));

    tracing::info!(
        tools = server.registry().definitions().len(),
        "liveline MCP server running on stdio"
    );
    server.serve(tokio::io::stdin(), tokio::io::stdout()).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(cli).await {
        Ok(()) => {
            tracing::info!("liveline stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
