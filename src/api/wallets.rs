// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet endpoints. The owner is the `email` claim of the bearer token.

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{WalletBalances, WalletProfile},
    state::AppState,
};

/// Create the caller's wallet.
///
/// Generates a mnemonic, derives the Bitcoin, Ethereum and Tron addresses and
/// stores the mnemonic encrypted. The mnemonic is never returned.
#[utoipa::path(
    post,
    path = "/v1/wallets",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Wallet created", body = WalletProfile),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "wallet already exist")
    )
)]
pub async fn create_wallet(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<WalletProfile>), ApiError> {
    let profile = state.lifecycle.create_wallet(&user.email).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Native balances of the caller's wallet in base units.
#[utoipa::path(
    get,
    path = "/v1/wallets/balance",
    tag = "Wallets",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Balances", body = WalletBalances),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found"),
        (status = 503, description = "Chain unavailable")
    )
)]
pub async fn get_balance(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<WalletBalances>, ApiError> {
    Ok(Json(state.lifecycle.balances(&user.email).await?))
}
