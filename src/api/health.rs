// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests.
    pub status: String,
    /// Identity provider mode ("hosted" or "development").
    pub auth_mode: String,
    /// Whether the initial session fetch has settled.
    pub session_ready: bool,
    pub uptime_seconds: u64,
}

/// Liveness check handler.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        auth_mode: state.provider.mode().to_string(),
        session_ready: !state.session.is_loading(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
