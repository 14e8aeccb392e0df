//! Sideline Edge: CLI entry point.
//!
//! Builds the runtime context, starts the background poll/strategy loops,
//! and serves the HTTP control surface until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sideline_edge::config::Config;
use sideline_edge::Runtime;

#[derive(Parser, Debug)]
#[command(name = "sideline-edge", about = "Real-time paper-trading engine for NBA prediction markets")]
struct Cli {
    /// Override the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(port) = cli.port {
        config.http_port = port;
    }
    init_tracing(&config.log_level);

    let http_port = config.http_port;
    let runtime = Runtime::build(config)?;
    runtime.start();

    let app = sideline_edge::api::router(Arc::clone(&runtime));
    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let serve = axum::serve(listener, app.into_make_service());

    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                tracing::error!(error = %e, "http server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    runtime.stop().await;
    Ok(())
}
