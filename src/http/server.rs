//! Admin HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the admin handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and stop on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin::{admin_router, AdminState};
use crate::config::AdminConfig;
use crate::http::request::{request_id, UuidRequestId};
use crate::lifecycle::Shutdown;

/// HTTP server for the admin API.
pub struct AdminServer {
    router: Router,
}

impl AdminServer {
    pub fn new(config: &AdminConfig, state: AdminState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &AdminConfig, state: AdminState) -> Router {
        admin_router(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "admin_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request),
                )
            }))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: Arc<Shutdown>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin API starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("Admin API stopped");
        Ok(())
    }
}
