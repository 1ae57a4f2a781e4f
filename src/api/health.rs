// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Liveness response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Trackers and watchers currently running.
    pub background_tasks: usize,
    /// Whether the Ethereum watcher loop runs in this process.
    pub eth_watcher: bool,
}

/// Health check endpoint handler.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let supervisor = state.lifecycle.supervisor();
    Json(HealthResponse {
        status: if supervisor.is_shutting_down() {
            "shutting_down"
        } else {
            "ok"
        }
        .to_string(),
        background_tasks: supervisor.active(),
        eth_watcher: state.watchers.registry().eth_running(),
    })
}
