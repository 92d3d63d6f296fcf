mod api;
mod config;
mod provider;
mod validate;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use crate::config::{SourceIpMode, TargetMode};
use crate::provider::route53::Route53Store;

#[derive(Parser, Debug)]
#[command(name = "route53-ddns")]
#[command(about = "A dynamic DNS update endpoint backed by Amazon Route 53")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration first (before logger init)
    let config = config::Config::load(&args.config)?;

    // Initialize logger with config log level (env var takes precedence)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.server.log_level)
    ).init();

    info!("Loading configuration from: {}", args.config);
    match config.target_mode() {
        TargetMode::Fixed { hosted_zone, hostname } => {
            info!("Target pinned to {} in hosted zone {}", hostname, hosted_zone)
        }
        TargetMode::RequestSupplied => info!("Target zone and hostname taken from each request"),
    }
    if config.server.source_ip == SourceIpMode::Forwarded {
        warn!("Caller identity is taken from X-Forwarded-For; only expose this behind a trusted proxy");
    }

    let store = Route53Store::from_config(&config.route53).await;
    info!("Route 53 calls time out after {:?}", config.route53.timeout());

    // Create router
    let app = api::create_router(api::AppState::new(&config, Arc::new(store)));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server listening on http://{}", addr);
    info!("DDNS endpoint: POST /update");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
