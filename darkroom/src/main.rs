#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use anyhow::Context;
use args::Args;
use clap::Parser;
use darkroom_config::Config;
use darkroom_server::Server;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let _telemetry_guard = darkroom_telemetry::init(&config.telemetry)?;
    log_startup(&args, &config);

    let server = Server::new(&config)?;
    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    server.serve(shutdown).await?;

    tracing::info!("darkroom stopped");
    Ok(())
}

/// Read the config file (or defaults) and apply command line overrides
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("invalid configuration in {}", args.config.display()))?;

    if let Some(listen) = args.listen {
        config.server.listen_address = Some(listen);
    }

    Ok(config)
}

fn log_startup(args: &Args, config: &Config) {
    let models = &config.replicate.models;

    tracing::info!(
        config_path = %args.config.display(),
        config_found = args.config.exists(),
        listen = %config.server.listen_address(),
        public_url = %config.server.public_url,
        "starting darkroom"
    );
    tracing::info!(
        nano_banana = %models.nano_banana,
        seedream = %models.seedream,
        imagen = %models.imagen,
        max_attempts = config.replicate.retry.max_attempts,
        "replicate models"
    );
    tracing::info!(
        capacity = config.temp_images.capacity,
        max_bytes = config.temp_images.max_bytes,
        ttl = ?config.temp_images.ttl,
        fetch_max_bytes = config.fetch.max_bytes,
        "temp image store"
    );

    if config.replicate.api_token.is_none() {
        tracing::warn!("REPLICATE_API_TOKEN is not set; model routes will answer 500 until it is");
    }
}

/// Cancel `token` once `SIGINT` or `SIGTERM` arrives
async fn cancel_on_signal(token: CancellationToken) {
    match wait_for_signal().await {
        Ok(signal) => {
            tracing::info!(signal, "shutdown signal received");
            token.cancel();
        }
        Err(e) => tracing::error!(error = %e, "cannot listen for shutdown signals"),
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;

    #[test]
    fn missing_file_loads_defaults_with_listen_override() {
        let args = Args::parse_from([
            "darkroom",
            "--config",
            "/nonexistent/darkroom.toml",
            "--listen",
            "127.0.0.1:9090",
        ]);

        let config = load_config(&args).unwrap();
        assert_eq!(config.server.listen_address(), SocketAddr::from(([127, 0, 0, 1], 9090)));
        assert_eq!(config.temp_images.capacity, 500);
    }
}
