//! # vc-metrics
//!
//! Exposes container image version checks as Prometheus metrics.
//!
//! Each monitored container, identified by `(namespace, pod, container)`,
//! owns exactly one series of the `version_checker_is_latest_version` gauge.
//! The series value is `1` when the container runs the latest upstream
//! version and `0` otherwise.
//!
//! ## Invariants
//!
//! - At most one series and one cache entry exist per container identity.
//! - Replacing an entry deletes the old label set before setting the new one,
//!   under the same lock, so scrapers never see a stale series linger.
//! - Entries are only removed explicitly; nothing expires on a timer.
//!
//! ## Lifecycle
//!
//! ```text
//! Metrics::new() → run(addr) → add_image / remove_image ... → shutdown()
//! ```

mod entry;
mod error;
mod metrics;
mod server;

pub use entry::Entry;
pub use error::MetricsError;
pub use metrics::{Metrics, LABELS, METRIC_NAME, SHUTDOWN_TIMEOUT};
