//! Admin API.
//!
//! Read access to the published resolution plus two data-plane hooks:
//! dispatching a described request and reporting active probe results.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::controller::Publisher;
use crate::routing::Dispatcher;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AdminState {
    pub publisher: Arc<Publisher>,
    pub dispatcher: Dispatcher,
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(publisher: Arc<Publisher>, api_key: Option<String>) -> Self {
        Self {
            dispatcher: Dispatcher::new(publisher.clone()),
            publisher,
            api_key: api_key.map(Arc::from),
        }
    }
}

/// `/healthz` is always open; everything under `/api` honors the API key.
pub fn admin_router(state: AdminState) -> Router {
    let api = Router::new()
        .route("/api/status", get(list_status))
        .route("/api/status/{namespace}/{name}", get(get_fragment_status))
        .route("/api/routes", get(list_routes))
        .route("/api/routes/{fqdn}", get(get_route_table))
        .route("/api/dispatch", post(dispatch))
        .route("/api/probes", post(report_probe))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(api)
        .with_state(state)
}
