//! Docker Hub digest client.
//!
//! Implements the token + manifest `HEAD` exchange of the Docker Registry
//! HTTP API v2.
//!
//! Reference: https://distribution.github.io/distribution/spec/auth/token/

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::error::{RegistryError, NOT_PRESENT};
use crate::reference::ImageRef;
use crate::DigestResolver;

/// Docker Hub token issuance endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://auth.docker.io/token";

/// Docker Hub registry base URL.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.hub.docker.com";

/// Service name the token is issued for.
pub const DEFAULT_SERVICE: &str = "registry.docker.io";

/// Per-request client timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Response header carrying the manifest digest.
pub const DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Manifest formats offered on every lookup: single-arch v2, multi-arch
/// manifest list, and legacy v1. Each is sent as its own `Accept` line.
pub const MANIFEST_MEDIA_TYPES: [&str; 3] = [
    "application/vnd.docker.distribution.manifest.v2+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
    "application/vnd.docker.distribution.manifest.v1+json",
];

/// Configuration for [`DockerClient`].
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Token endpoint (e.g., "https://auth.docker.io/token").
    pub token_url: String,
    /// Registry base URL; `/v2/...` is appended.
    pub registry_url: String,
    /// `service` query parameter for the token request.
    pub service: String,
    /// Optional username for Basic auth on the token request.
    pub username: Option<String>,
    /// Optional password for Basic auth on the token request.
    pub password: Option<String>,
    /// Timeout applied to each HTTP request.
    pub timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            username: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DockerConfig {
    /// Basic auth credentials, when both halves are configured.
    fn basic_credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username, password))
            }
            _ => None,
        }
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

/// Build the pull scope requested for `repository/image`.
pub fn auth_scope(repository: &str, image: &str) -> String {
    format!("repository:{repository}/{image}:pull")
}

/// Digest client for Docker Hub (or any registry speaking the same token
/// protocol).
#[derive(Debug, Clone)]
pub struct DockerClient {
    config: DockerConfig,
    client: Client,
}

impl DockerClient {
    /// Create a new client.
    pub fn new(config: DockerConfig) -> Result<Self, RegistryError> {
        Url::parse(&config.token_url)?;
        Url::parse(&config.registry_url)?;

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { config, client })
    }

    /// Token request URL for `repository/image`.
    pub fn token_url(&self, repository: &str, image: &str) -> Result<Url, RegistryError> {
        let mut url = Url::parse(&self.config.token_url)?;
        url.query_pairs_mut()
            .append_pair("service", &self.config.service)
            .append_pair("scope", &auth_scope(repository, image));
        Ok(url)
    }

    /// Manifest URL for `repository/image:tag`.
    pub fn manifest_url(&self, repository: &str, image: &str, tag: &str) -> String {
        format!(
            "{}/v2/{}/{}/manifests/{}",
            self.config.registry_url.trim_end_matches('/'),
            repository,
            image,
            tag
        )
    }

    /// Request a fresh pull token.
    async fn auth_token(
        &self,
        cancel: &CancellationToken,
        reference: &ImageRef,
    ) -> Result<String, RegistryError> {
        let url = self.token_url(reference.repository(), reference.image())?;

        debug!(url = %url, "Requesting registry token");

        let mut request = self.client.get(url);
        if let Some((username, password)) = self.config.basic_credentials() {
            request = request.basic_auth(username, Some(password));
        }

        let response = until_cancelled(cancel, request.send()).await?;
        let status = response.status();
        let body = until_cancelled(cancel, response.text()).await?;

        if status != StatusCode::OK {
            return Err(RegistryError::Auth { status, body });
        }

        let auth: AuthResponse = serde_json::from_str(&body)?;
        Ok(auth.token)
    }

    /// `HEAD` the manifest and read its digest header.
    async fn manifest_digest(
        &self,
        cancel: &CancellationToken,
        reference: &ImageRef,
        token: &str,
    ) -> Result<String, RegistryError> {
        let url = self.manifest_url(reference.repository(), reference.image(), reference.tag());

        debug!(url = %url, "Doing a HEAD request to fetch a digest");

        let mut request = self
            .client
            .head(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"));
        for media_type in MANIFEST_MEDIA_TYPES {
            request = request.header(ACCEPT, media_type);
        }

        let response = until_cancelled(cancel, request.send()).await?;
        let status = response.status();

        if status != StatusCode::OK {
            let www_authenticate = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .unwrap_or(NOT_PRESENT)
                .to_string();

            return Err(RegistryError::Manifest {
                url,
                status,
                www_authenticate,
            });
        }

        let digest = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if digest.is_empty() {
            warn!(url = %url, "Registry response carried no digest header");
        } else {
            debug!(digest = %digest, "Retrieved digest");
        }

        Ok(digest)
    }
}

#[async_trait]
impl DigestResolver for DockerClient {
    async fn digest(
        &self,
        cancel: &CancellationToken,
        repository: &str,
        image: &str,
        tag: &str,
    ) -> Result<String, RegistryError> {
        let reference = ImageRef::new(repository, image, tag)?;

        let token = self.auth_token(cancel, &reference).await?;
        self.manifest_digest(cancel, &reference, &token).await
    }
}

/// Drive `fut` unless `cancel` fires first. On cancellation the future is
/// dropped, which tears down any in-flight connection.
async fn until_cancelled<F, T, E>(cancel: &CancellationToken, fut: F) -> Result<T, RegistryError>
where
    F: Future<Output = Result<T, E>>,
    RegistryError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RegistryError::Cancelled),
        result = fut => result.map_err(RegistryError::from),
    }
}
