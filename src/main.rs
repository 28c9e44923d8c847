use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_aggregator::{
    config::Config,
    sources::SourceRegistry,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "stream-aggregator")]
#[command(version)]
#[command(about = "Aggregates, filters, ranks and proxies addon streams")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("stream_aggregator={},tower_http=trace", cli.log_level)
    } else {
        format!("stream_aggregator={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stream Aggregator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let registry = SourceRegistry::default();
    for source in config.sources.iter().filter(|s| s.enabled) {
        if !registry.is_supported(&source.source_type) {
            tracing::warn!(
                "Source '{}' has unknown type '{}', using the generic parser",
                source.name,
                source.source_type
            );
        }
    }
    info!(
        "{} sources configured, proxy {}",
        config.sources.len(),
        if config.profile.proxy.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    let web_server = WebServer::new(AppState::new(config)?)?;
    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve().await?;

    Ok(())
}
