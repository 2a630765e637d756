//! Configuration for the version-checker service.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use vc_registry::{DockerConfig, ImageRef};

/// Service configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the `/metrics` endpoint listens on.
    pub metrics_addr: SocketAddr,

    /// Registry username for token requests.
    pub registry_username: Option<String>,

    /// Registry password for token requests.
    pub registry_password: Option<String>,

    /// Per-request registry timeout.
    pub registry_timeout: Duration,

    /// Image resolved once at startup to check registry connectivity.
    pub probe_image: Option<ImageRef>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let metrics_addr: SocketAddr = var("VERSION_CHECKER_METRICS_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("VERSION_CHECKER_METRICS_ADDR must be a socket address (host:port).")?;

        let registry_username = var("VERSION_CHECKER_REGISTRY_USERNAME").filter(|v| !v.is_empty());
        let registry_password = var("VERSION_CHECKER_REGISTRY_PASSWORD").filter(|v| !v.is_empty());

        let timeout_secs: u64 = var("VERSION_CHECKER_REGISTRY_TIMEOUT_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("VERSION_CHECKER_REGISTRY_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(5);
        let registry_timeout = Duration::from_secs(timeout_secs.max(1));

        let probe_image = var("VERSION_CHECKER_PROBE_IMAGE")
            .filter(|v| !v.is_empty())
            .map(|v| v.parse::<ImageRef>())
            .transpose()
            .context("VERSION_CHECKER_PROBE_IMAGE must look like repository/image:tag.")?;

        let log_level = var("VERSION_CHECKER_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            metrics_addr,
            registry_username,
            registry_password,
            registry_timeout,
            probe_image,
            log_level,
        })
    }

    /// Registry client configuration for Docker Hub.
    pub fn docker_config(&self) -> DockerConfig {
        DockerConfig {
            username: self.registry_username.clone(),
            password: self.registry_password.clone(),
            timeout: self.registry_timeout,
            ..Default::default()
        }
    }
}
