// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{auth::Auth, error::ApiError, state::AppState, watcher::WatchOutcome};

/// Watch the caller's address on `token` for inbound transfers.
///
/// Ethereum registrations last two minutes and are refreshed by every call.
/// Tron watchers poll for five minutes.
#[utoipa::path(
    post,
    path = "/v1/watchers/{token}",
    tag = "Watchers",
    security(("bearer_auth" = [])),
    params(("token" = String, Path, description = "`eth` or `trx`")),
    responses(
        (status = 202, description = "Address watched", body = WatchOutcome),
        (status = 400, description = "Unsupported token"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn trigger_watcher(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<WatchOutcome>), ApiError> {
    let outcome = state.watchers.trigger(&token, &user.email).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}
