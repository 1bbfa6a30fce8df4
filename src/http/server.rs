//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every handler
//! - Wire up middleware (request id, tracing, timeout)
//! - Spawn the health monitor alongside the server
//! - Drain on the shutdown broadcast

use axum::{
    routing::{any, delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::handlers;
use crate::http::request::MakeRequestUuid;
use crate::lifecycle::Gateway;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    gateway: Arc<Gateway>,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let router = Self::build_router(gateway.clone());
        Self { router, gateway }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(gateway: Arc<Gateway>) -> Router {
        let timeout = Duration::from_secs(gateway.config.listener.request_timeout_secs);
        let state = AppState { gateway };

        Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/status", get(handlers::status))
            .route("/r/{code}", get(handlers::redirect))
            .route("/links", post(handlers::create_link))
            .route("/links/{code}", delete(handlers::delete_link))
            .route("/api/{service}/{*path}", any(handlers::forward))
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving on a custom listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, running the health monitor meanwhile.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let monitor = self.gateway.monitor();
        let monitor_handle = tokio::spawn(monitor.run(shutdown.resubscribe()));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal, draining");
            })
            .await?;

        if let Err(e) = monitor_handle.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
