// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    models::{SendTokenRequest, Transaction},
    state::AppState,
};

/// Transfer from the caller's wallet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendTokenBody {
    pub receiver_address: String,
    /// Base units (satoshi, wei or sun)
    pub amount: u128,
    /// `btc`, `eth` or `trx`
    pub token_symbol: String,
}

/// Sign and broadcast a native transfer.
///
/// Returns the `pending` record. Confirmation is tracked in the background;
/// poll the transaction endpoint for progress.
#[utoipa::path(
    post,
    path = "/v1/transactions/send",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    request_body = SendTokenBody,
    responses(
        (status = 202, description = "Broadcast, tracking started", body = Transaction),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found"),
        (status = 422, description = "Insufficient funds"),
        (status = 502, description = "Broadcast rejected"),
        (status = 503, description = "Chain unavailable")
    )
)]
pub async fn send_token(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(body): Json<SendTokenBody>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let request = SendTokenRequest {
        sender_email: user.email,
        receiver_address: body.receiver_address,
        amount: body.amount,
        token_symbol: body.token_symbol,
    };
    let tx = state.lifecycle.send_token(request).await?;
    Ok((StatusCode::ACCEPTED, Json(tx)))
}

/// Look up a tracked transaction.
#[utoipa::path(
    get,
    path = "/v1/transactions/{token}/{id}",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    params(
        ("token" = String, Path, description = "Chain token symbol"),
        ("id" = String, Path, description = "Native transaction id")
    ),
    responses(
        (status = 200, description = "Transaction", body = Transaction),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn get_transaction(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path((token, id)): Path<(String, String)>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.lifecycle.get_transaction(&token, &id).await?))
}
