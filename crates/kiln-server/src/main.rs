//! Web server for hosting the Kiln pipeline over HTTP
//!
//! This binary wires configuration, logging and the pipeline together and
//! serves the JSON endpoints. Deployments put a chat frontend in front of
//! it; this process only owns the generate/filter/execute/collect path.

use anyhow::Result;
use clap::Parser;
use kiln_core::{ConfigLoader, Pipeline};
use kiln_server::{build_router, shutdown_signal, AppState};
use log::LevelFilter;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Kiln Server - run the code-execution pipeline service")]
struct Cli {
    #[clap(long, short, default_value = "kiln.yaml", help = "Path to the YAML configuration file")]
    config: String,

    #[clap(long, default_value = "127.0.0.1:3001")]
    bind_addr: String,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    log::info!("Loading configuration from: {}", cli.config);
    let config = ConfigLoader::from_file(&cli.config).await?;

    let pipeline = Pipeline::from_config(&config)?;
    log::info!(
        "Pipeline ready (model: {}, timeout: {}s)",
        config.llm.model,
        config.execution.timeout_secs
    );

    let bind_socket_addr: SocketAddr = cli
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", cli.bind_addr, e))?;

    let router = build_router(AppState::new(Arc::new(pipeline)));
    let listener = tokio::net::TcpListener::bind(bind_socket_addr).await?;
    log::info!("Starting Kiln server on {}...", bind_socket_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Kiln server shut down gracefully.");
    Ok(())
}
