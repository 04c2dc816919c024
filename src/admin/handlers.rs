use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admin::AdminState;
use crate::health::HealthState;
use crate::model::ObjectKey;
use crate::resolver::{FragmentStatus, RouteTable};
use crate::routing::{Dispatch, DispatchRequest, ProbeError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) | ApiError::Probe(ProbeError::UnknownRoute(_)) => StatusCode::NOT_FOUND,
            ApiError::Probe(ProbeError::NoHealthCheck(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub version: &'static str,
    pub generation: u64,
}

#[derive(Serialize)]
pub struct StatusReport {
    pub generation: u64,
    pub fragments: Vec<FragmentStatus>,
}

#[derive(Serialize)]
pub struct RouteReport {
    pub generation: u64,
    pub virtual_hosts: BTreeMap<String, RouteTable>,
}

#[derive(Debug, Deserialize)]
pub struct ProbeReport {
    pub route_id: String,
    pub healthy: bool,
}

#[derive(Serialize)]
pub struct ProbeResult {
    pub route_id: String,
    pub state: HealthState,
}

pub async fn healthz(State(state): State<AdminState>) -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        generation: state.publisher.generation(),
    })
}

pub async fn list_status(State(state): State<AdminState>) -> Json<StatusReport> {
    let published = state.publisher.load();
    Json(StatusReport {
        generation: published.generation,
        fragments: published.resolution.statuses.clone(),
    })
}

pub async fn get_fragment_status(
    State(state): State<AdminState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<FragmentStatus>, ApiError> {
    let key = ObjectKey::new(namespace, name);
    state
        .publisher
        .load()
        .resolution
        .status(&key)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("fragment {}", key)))
}

pub async fn list_routes(State(state): State<AdminState>) -> Json<RouteReport> {
    let published = state.publisher.load();
    Json(RouteReport {
        generation: published.generation,
        virtual_hosts: published.resolution.tables.clone(),
    })
}

pub async fn get_route_table(
    State(state): State<AdminState>,
    Path(fqdn): Path<String>,
) -> Result<Json<RouteTable>, ApiError> {
    state
        .publisher
        .load()
        .resolution
        .table(&fqdn)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("virtual host {:?}", fqdn)))
}

/// Route a described request and answer with the data-plane status code.
pub async fn dispatch(
    State(state): State<AdminState>,
    Json(request): Json<DispatchRequest>,
) -> Response {
    let decision = state.dispatcher.dispatch(&request);
    let status = StatusCode::from_u16(decision.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let location = match &decision {
        Dispatch::Redirect { location } => Some(location.clone()),
        _ => None,
    };
    match location {
        Some(location) => (status, [(header::LOCATION, location)], Json(decision)).into_response(),
        None => (status, Json(decision)).into_response(),
    }
}

pub async fn report_probe(
    State(state): State<AdminState>,
    Json(report): Json<ProbeReport>,
) -> Result<Json<ProbeResult>, ApiError> {
    let state = state.dispatcher.report_probe(&report.route_id, report.healthy)?;
    Ok(Json(ProbeResult {
        route_id: report.route_id,
        state,
    }))
}
