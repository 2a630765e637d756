//! version-checker
//!
//! Hosts the registry digest resolver and the Prometheus exporter that the
//! container watch loop reports into.
//!
//! ## Lifecycle
//!
//! - **Metrics**: `/metrics` is served from startup until shutdown
//! - **Probe**: optionally resolves one image at startup to verify registry
//!   access and credentials
//! - **Shutdown**: Ctrl+C cancels in-flight lookups, then drains the scrape
//!   endpoint

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vc_metrics::Metrics;
use vc_registry::{CancellationToken, DigestResolver, DockerClient, ImageRef};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to VERSION_CHECKER_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting version-checker");
    info!(
        metrics_addr = %config.metrics_addr,
        registry_auth = config.registry_username.is_some(),
        "Configuration loaded"
    );

    let resolver =
        DockerClient::new(config.docker_config()).context("Failed to create registry client")?;

    let metrics = Metrics::new().context("Failed to register metrics")?;
    let addr = metrics
        .run(config.metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", config.metrics_addr))?;
    info!(addr = %addr, "Metrics server started");

    let cancel = CancellationToken::new();

    let probe_handle = config.probe_image.clone().map(|reference| {
        let cancel = cancel.clone();
        tokio::spawn(async move { probe(&resolver, &cancel, &reference).await })
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    // Abort any registry request still in flight
    cancel.cancel();
    if let Some(handle) = probe_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Registry probe task panicked");
        }
    }

    metrics.shutdown().await?;

    info!("version-checker shutdown complete");
    Ok(())
}

/// Resolve one image and log the outcome.
async fn probe(resolver: &dyn DigestResolver, cancel: &CancellationToken, reference: &ImageRef) {
    match resolver.digest_for(cancel, reference).await {
        Ok(digest) if digest.is_empty() => {
            warn!(image = %reference, "Registry probe returned no digest");
        }
        Ok(digest) => {
            info!(image = %reference, digest = %digest, "Registry probe succeeded");
        }
        Err(e) if e.is_cancelled() => {
            debug!(image = %reference, "Registry probe cancelled");
        }
        Err(e) => {
            warn!(
                image = %reference,
                error = %e,
                auth_failure = e.is_auth_failure(),
                "Registry probe failed"
            );
        }
    }
}
