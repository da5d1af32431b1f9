mod bootstrap;
mod health;
mod http;
mod rpc;

use std::time::Duration;

use anyhow::{Context, Result};
use prodcat_core::config::{AppConfig, LoadOptions, TransportMode};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use prodcat_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    let http_address = app.config.http_address();
    let mut web = health::router(app.db_pool.clone());
    if app.config.transport.mode == TransportMode::Http {
        web = web.merge(http::router(app.catalog.clone()));
    }
    let listener = tokio::net::TcpListener::bind(&http_address)
        .await
        .with_context(|| format!("failed to bind http listener on {http_address}"))?;
    let mut http_shutdown = shutdown_rx.clone();
    tasks.spawn(async move {
        axum::serve(listener, web)
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.changed().await;
            })
            .await
            .context("http server terminated")
    });
    tracing::info!(
        event_name = "system.http.start",
        correlation_id = "bootstrap",
        bind_address = %http_address,
        "http listener started"
    );

    if app.config.transport.mode == TransportMode::Rpc {
        let dispatcher = rpc::RpcDispatcher::new(app.catalog.clone());
        for address in app.config.transport.rpc_socket_addresses()? {
            let dispatcher = dispatcher.clone();
            let rpc_shutdown = shutdown_rx.clone();
            tasks.spawn(async move {
                rpc::serve(address.clone(), dispatcher, rpc_shutdown)
                    .await
                    .with_context(|| format!("rpc endpoint {address} terminated"))
            });
        }
    }

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport_mode = ?app.config.transport.mode,
        "prodcat-server started"
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal?,
        Some(joined) = tasks.join_next() => {
            // A listener ending on its own is fatal; surface its error.
            joined.context("server task panicked")??;
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "prodcat-server stopping"
    );
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Err(error)) => tracing::warn!(error = %error, "task failed during shutdown"),
                Err(error) => tracing::warn!(error = %error, "task panicked during shutdown"),
                Ok(Ok(())) => {}
            }
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            grace_secs = app.config.server.graceful_shutdown_secs,
            "listeners did not drain in time"
        );
        tasks.abort_all();
    }

    app.db_pool.close().await;
    Ok(())
}
