// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Inbound BlockCypher callbacks. Unauthenticated.

use axum::{extract::State, Json};

use crate::{
    blockchain::BcyTx,
    error::ApiError,
    models::Transaction,
    state::AppState,
};

/// `tx-confirmation` hook target.
#[utoipa::path(
    post,
    path = "/v1/btc/webhook/transaction",
    tag = "Webhooks",
    request_body = BcyTx,
    responses(
        (status = 200, description = "Transaction recorded", body = Transaction),
        (status = 400, description = "Payload without hash")
    )
)]
pub async fn bitcoin_webhook(
    State(state): State<AppState>,
    Json(payload): Json<BcyTx>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.lifecycle.record_bitcoin_webhook(&payload).await?))
}
