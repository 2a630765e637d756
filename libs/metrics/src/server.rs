//! HTTP scrape endpoint.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::MetricsError;

/// Upper bound on serving a single scrape.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// A running `/metrics` server.
pub(crate) struct MetricsServer {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<io::Result<()>>,
}

impl MetricsServer {
    /// Bind `addr` and serve `registry` in a background task.
    pub(crate) async fn bind<A: ToSocketAddrs>(addr: A, registry: Registry) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let app = router(registry);

        info!(addr = %local_addr, "Serving metrics on /metrics");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    loop {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                        if shutdown_rx.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await;

            if let Err(e) = &result {
                error!(error = %e, "Failed to serve prometheus metrics");
            }
            result
        });

        Ok(Self {
            local_addr,
            shutdown_tx,
            handle,
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal shutdown and wait up to `timeout` for open requests to drain.
    pub(crate) async fn shutdown(mut self, timeout: Duration) -> Result<(), MetricsError> {
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(MetricsError::Server(e.to_string())),
            Ok(Err(e)) => Err(MetricsError::Server(e.to_string())),
            Err(_) => {
                self.handle.abort();
                Err(MetricsError::ShutdownTimeout(timeout))
            }
        }
    }
}

fn router(registry: Registry) -> Router {
    let routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry);
    with_middleware(routes, REQUEST_TIMEOUT)
}

/// Request tracing plus a per-request deadline answered with `408`.
fn with_middleware(routes: Router, request_timeout: Duration) -> Router {
    routes
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

async fn metrics_handler(State(registry): State<Registry>) -> Response {
    let encoder = TextEncoder::new();

    let mut metrics_text = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut metrics_text) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        metrics_text,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slow_request_answers_request_timeout() {
        let routes = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let app = with_middleware(routes, Duration::from_millis(100));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let response = reqwest::get(format!("http://{addr}/slow")).await.unwrap();
        assert_eq!(response.status().as_u16(), 408);

        server.abort();
    }
}
