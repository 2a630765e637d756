//! # vc-registry
//!
//! Resolves the content digest a container registry currently serves for an
//! image tag.
//!
//! ## Protocol
//!
//! Every lookup is two sequential round trips:
//!
//! 1. A pull-scoped bearer token is requested from the registry's auth
//!    service (`repository:{repository}/{image}:pull`).
//! 2. A `HEAD` request against the tag's manifest returns the digest in the
//!    `Docker-Content-Digest` response header.
//!
//! Tokens are never cached; each lookup authenticates from scratch.
//!
//! ## Cancellation
//!
//! Callers pass a [`CancellationToken`]. When it fires, whichever request is
//! in flight is dropped (closing its connection) and the lookup fails with
//! [`RegistryError::Cancelled`]. A deadline is a token cancelled by a timer.

mod docker;
mod error;
mod reference;

use async_trait::async_trait;

pub use docker::{
    auth_scope, DockerClient, DockerConfig, DEFAULT_REGISTRY_URL, DEFAULT_SERVICE,
    DEFAULT_TIMEOUT, DEFAULT_TOKEN_URL, DIGEST_HEADER, MANIFEST_MEDIA_TYPES,
};
pub use error::{RegistryError, NOT_PRESENT};
pub use reference::ImageRef;
pub use tokio_util::sync::CancellationToken;

/// A registry provider that can resolve an image tag to its content digest.
///
/// Implementations hold no per-call state, so a single instance can serve
/// concurrent lookups.
#[async_trait]
pub trait DigestResolver: Send + Sync {
    /// Resolve `repository/image:tag` to the digest the registry serves.
    ///
    /// An empty string is returned when the registry answers successfully
    /// but omits the digest header.
    async fn digest(
        &self,
        cancel: &CancellationToken,
        repository: &str,
        image: &str,
        tag: &str,
    ) -> Result<String, RegistryError>;

    /// Resolve a parsed [`ImageRef`].
    async fn digest_for(
        &self,
        cancel: &CancellationToken,
        reference: &ImageRef,
    ) -> Result<String, RegistryError> {
        self.digest(
            cancel,
            reference.repository(),
            reference.image(),
            reference.tag(),
        )
        .await
    }
}
