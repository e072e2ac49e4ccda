//! Consumer HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the `/consumer` handlers
//! - Wire up middleware (tracing, request timeout)
//! - Serve on a listener until shutdown

use std::future::Future;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::handlers;
use crate::service::ConsumerServices;

/// HTTP server exposing the consumer endpoints.
pub struct ConsumerServer {
    router: Router,
}

impl ConsumerServer {
    pub fn new(services: ConsumerServices, config: &ServerConfig) -> Self {
        Self {
            router: Self::build_router(services, config),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(services: ConsumerServices, config: &ServerConfig) -> Router {
        Router::new()
            .route("/consumer/hello", get(handlers::hello))
            .route("/consumer/users", get(handlers::find_all))
            .route("/consumer/users/collapsed", get(handlers::find_collapsed))
            .route("/consumer/users/{id}", get(handlers::get_user))
            .route("/consumer/users/{id}/async", get(handlers::get_user_async))
            .route("/consumer/users/{id}/collapsed", get(handlers::get_user_collapsed))
            .route("/consumer/circuits", get(handlers::circuits))
            .with_state(services)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Serve until `shutdown` completes, then drain in-flight requests.
    pub async fn run_until<S>(self, listener: TcpListener, shutdown: S) -> Result<(), std::io::Error>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C).
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
