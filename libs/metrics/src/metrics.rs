//! The version-check gauge and its per-container cache.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use prometheus::{GaugeVec, Opts, Registry};
use tokio::net::ToSocketAddrs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{label_values, CacheItem, ContainerKey, Entry};
use crate::error::MetricsError;
use crate::server::MetricsServer;

/// Fully qualified gauge name.
pub const METRIC_NAME: &str = "version_checker_is_latest_version";

/// Gauge labels, in registration order.
pub const LABELS: [&str; 8] = [
    "namespace",
    "pod",
    "container",
    "image",
    "current_version",
    "latest_version",
    "architecture",
    "os",
];

/// How long `shutdown` waits for in-flight scrapes to drain.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Container image version metrics.
///
/// All series mutation goes through one lock that also guards the cache,
/// so a replace (delete old series, set new one) is atomic with respect to
/// other `add_image`/`remove_image` calls. Scrapes read the registry
/// directly and never take this lock.
pub struct Metrics {
    registry: Registry,
    is_latest_version: GaugeVec,
    /// Last published labels per container.
    containers: Mutex<HashMap<ContainerKey, CacheItem>>,
    server: Mutex<Option<MetricsServer>>,
}

impl Metrics {
    /// Create the registry and register the gauge.
    pub fn new() -> Result<Self, MetricsError> {
        let is_latest_version = GaugeVec::new(
            Opts::new(
                "is_latest_version",
                "Where the container in use is using the latest upstream registry version",
            )
            .namespace("version_checker"),
            &LABELS,
        )?;

        let registry = Registry::new();
        registry.register(Box::new(is_latest_version.clone()))?;

        Ok(Self {
            registry,
            is_latest_version,
            containers: Mutex::new(HashMap::new()),
            server: Mutex::new(None),
        })
    }

    /// The registry backing the scrape endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Publish `entry`, replacing any series previously published for the
    /// same container.
    pub async fn add_image(&self, entry: &Entry) {
        let key = entry.key();
        let item = entry.cache_item();

        let mut containers = self.containers.lock().await;

        if let Some(previous) = containers.remove(&key) {
            self.delete_series(&key, &previous);
        }

        let value = if entry.is_latest { 1.0 } else { 0.0 };
        self.is_latest_version
            .with_label_values(&label_values(&key, &item))
            .set(value);

        debug!(
            namespace = %key.namespace,
            pod = %key.pod,
            container = %key.container,
            image = %item.image,
            current_version = %item.current_version,
            latest_version = %item.latest_version,
            is_latest = entry.is_latest,
            "Published image version"
        );

        containers.insert(key, item);
    }

    /// Delete the series published for a container. Unknown containers are
    /// ignored.
    pub async fn remove_image(&self, namespace: &str, pod: &str, container: &str) {
        let key = ContainerKey::new(namespace, pod, container);

        let mut containers = self.containers.lock().await;

        if let Some(item) = containers.remove(&key) {
            self.delete_series(&key, &item);
            debug!(
                namespace = %namespace,
                pod = %pod,
                container = %container,
                "Removed image version"
            );
        }
    }

    /// Number of containers with a published series.
    pub async fn tracked_containers(&self) -> usize {
        self.containers.lock().await.len()
    }

    /// Whether a series is published for the container.
    pub async fn is_tracked(&self, namespace: &str, pod: &str, container: &str) -> bool {
        self.containers
            .lock()
            .await
            .contains_key(&ContainerKey::new(namespace, pod, container))
    }

    /// Start serving `/metrics` on `addr`.
    ///
    /// The listener is bound before returning, so bind errors surface here;
    /// requests are then served in the background. Returns the bound
    /// address.
    pub async fn run<A: ToSocketAddrs>(&self, addr: A) -> io::Result<SocketAddr> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "metrics server already running",
            ));
        }

        let started = MetricsServer::bind(addr, self.registry.clone()).await?;
        let local_addr = started.local_addr();
        *server = Some(started);

        Ok(local_addr)
    }

    /// Gracefully stop the scrape endpoint. A no-op if it was never started.
    pub async fn shutdown(&self) -> Result<(), MetricsError> {
        let Some(server) = self.server.lock().await.take() else {
            return Ok(());
        };

        info!("Shutting down prometheus metrics server");
        server.shutdown(SHUTDOWN_TIMEOUT).await?;
        info!("Prometheus metrics server gracefully stopped");

        Ok(())
    }

    /// Caller must hold the `containers` lock.
    fn delete_series(&self, key: &ContainerKey, item: &CacheItem) {
        if let Err(e) = self
            .is_latest_version
            .remove_label_values(&label_values(key, item))
        {
            warn!(
                namespace = %key.namespace,
                pod = %key.pod,
                container = %key.container,
                error = %e,
                "Cached series was not registered"
            );
        }
    }
}
