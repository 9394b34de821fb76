// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Logging and metrics setup

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

use clyde_core::domain::gateway_config::MetricsConfig;

/// Initialize tracing subscriber for logging.
///
/// `RUST_LOG` wins over `level` when set. `format` is "json" or "text".
pub fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

/// Run `f` with a compact stderr subscriber scoped to the current thread.
///
/// Configuration discovery logs before the global subscriber exists, because
/// the global one is shaped by the loaded configuration.
pub fn with_bootstrap_logging<T>(level: &str, f: impl FnOnce() -> T) -> T {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::with_default(subscriber, f)
}

/// Install the Prometheus exporter when enabled. Without it the metric
/// macros are no-ops.
pub fn init_metrics(config: &MetricsConfig, bind_address: &str) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = format!("{}:{}", bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid metrics address {}:{}", bind_address, config.port))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics exposed on http://{}/metrics", addr);
    Ok(())
}
