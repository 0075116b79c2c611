use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use duel_core::{MatchEngine, WordValidator};
use duel_persistence::{MatchRepository, connect_and_migrate};
use duel_server::{
    config::Config, create_routes, idle_sweep::IdleSweep, match_controller::MatchController,
    session::SessionService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Word Duel server...");

    let config = Config::from_env().context("reading configuration")?;
    if config.uses_dev_secret() {
        warn!("SESSION_SECRET is not set; using the development secret");
    }

    let words = match &config.words_file {
        Some(path) => {
            info!("Loading secret words from {}", path);
            WordValidator::from_file(path)?
        }
        None => WordValidator::builtin(),
    };
    info!("{} secret words available", words.secret_count());

    // Initialize database connection and run migrations
    let db = connect_and_migrate(&config.database_url)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;

    let controller = MatchController::new(
        MatchRepository::new(db),
        MatchEngine::new(config.match_rules()),
        Arc::new(words),
    )
    .with_retry_policy(config.retry_policy());

    let sessions = Arc::new(SessionService::new(
        &config.session_secret,
        config.session_ttl_secs,
    ));

    // Start idle sweep
    let sweep = IdleSweep::new(controller.clone(), config.sweep_policy()).spawn();

    let routes = create_routes(controller, sessions);

    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid HOST {:?}", config.host))?;

    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown((host, config.port), shutdown_signal())
        .context("binding HTTP listener")?;

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;

    sweep.abort();
    info!("Server shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    // Wait for SIGINT (Ctrl+C) or SIGTERM
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received SIGINT, shutting down gracefully...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down gracefully...");
                    }
                }
            }
            Err(e) => {
                warn!("Could not listen for SIGTERM: {}", e);
                let _ = signal::ctrl_c().await;
                info!("Received SIGINT, shutting down gracefully...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down gracefully...");
    }
}
