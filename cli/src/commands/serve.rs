// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `clyde serve`: run the HTTP gateway until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use clyde_core::domain::gateway_config::GatewayConfigManifest;
use clyde_core::presentation::api::{app, AppState};

use crate::runtime::build_orchestrator;
use crate::telemetry::init_metrics;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(long)]
    pub host: Option<String>,
}

pub async fn run(args: ServeArgs, mut config: GatewayConfigManifest) -> Result<()> {
    if let Some(port) = args.port {
        config.spec.server.port = port;
    }
    if let Some(host) = args.host {
        config.spec.server.bind_address = host;
    }

    let server = &config.spec.server;
    init_metrics(&config.spec.observability.metrics, &server.bind_address)?;

    let orchestrator = build_orchestrator(&config.spec)?;

    let shutdown = CancellationToken::new();
    let state = AppState::new(orchestrator, server.redirect_url.clone()).with_shutdown(shutdown.clone());

    let addr = format!("{}:{}", server.bind_address, server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Clyde gateway '{}' listening on {}", config.metadata.name, addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Abandon in-flight provider calls so draining does not wait on slow backends.
            shutdown.cancel();
        })
        .await
        .context("HTTP server failed")?;

    info!("Gateway shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
