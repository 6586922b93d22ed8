//! Request handlers.

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::http::server::AppState;

/// Body of `POST /api/v1/check` and query of `GET /api/v1/check`.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub sources: usize,
    pub cache_entries: usize,
    pub tracked_clients: usize,
}

/// Identify the caller: the peer IP, unless a trusted client header is
/// configured and present on the request.
fn client_key(trusted_header: Option<&str>, headers: &HeaderMap, addr: SocketAddr) -> String {
    trusted_header
        .and_then(|name| headers.get(name))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| addr.ip().to_string())
}

async fn run_check(state: &AppState, client: String, url: &str) -> Response {
    match state.service.check(&client, url).await {
        Ok(outcome) => {
            tracing::info!(
                client = %client,
                domain = %outcome.result.domain,
                level = %outcome.result.risk_level,
                cached = outcome.cached,
                latency_ms = outcome.latency_ms,
                "Check served"
            );
            Json(outcome).into_response()
        }
        Err(e) => {
            tracing::info!(client = %client, error = %e, "Check rejected");
            e.into_response()
        }
    }
}

pub async fn check_post(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<CheckRequest>,
) -> Response {
    let client = client_key(state.client_header.as_deref(), &headers, addr);
    run_check(&state, client, &request.url).await
}

pub async fn check_get(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(request): Query<CheckRequest>,
) -> Response {
    let client = client_key(state.client_header.as_deref(), &headers, addr);
    run_check(&state, client, &request.url).await
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sources: state.service.source_count(),
        cache_entries: state.service.cache().len(),
        tracked_clients: state
            .service
            .limiter()
            .map(|l| l.tracked_clients())
            .unwrap_or(0),
    })
}
