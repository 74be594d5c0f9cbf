//! OpenCiv Session Server

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use openciv_protocol::WireFormat;
use tracing_subscriber::EnvFilter;

use openciv_server::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "openciv-server")]
#[command(about = "Authoritative session server for OpenCiv", version)]
struct Cli {
    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Civilization catalog to load instead of the built-in one
    #[arg(long)]
    civilizations: Option<PathBuf>,

    #[arg(long, value_enum)]
    wire_format: Option<FormatArg>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Msgpack,
    Json,
}

impl From<FormatArg> for WireFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Msgpack => WireFormat::MessagePack,
            FormatArg::Json => WireFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("openciv_server=info"));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(path) = cli.civilizations {
        config.civilizations = Some(path);
    }
    if let Some(format) = cli.wire_format {
        config.wire_format = format.into();
    }

    openciv_server::run(config).await
}
