// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::btc::{BcyTx, BcyTxInput, BcyTxOutput},
    models::{Chain, Transaction, TxStatus, WalletBalances, WalletProfile},
    state::AppState,
    watcher::WatchOutcome,
};

pub mod health;
pub mod transactions;
pub mod wallets;
pub mod watchers;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/wallets", post(wallets::create_wallet))
        .route("/wallets/balance", get(wallets::get_balance))
        .route("/transactions/send", post(transactions::send_token))
        .route("/transactions/{token}/{id}", get(transactions::get_transaction))
        .route("/watchers/{token}", post(watchers::trigger_watcher))
        .route("/btc/webhook/transaction", post(webhook::bitcoin_webhook));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        wallets::create_wallet,
        wallets::get_balance,
        transactions::send_token,
        transactions::get_transaction,
        watchers::trigger_watcher,
        webhook::bitcoin_webhook
    ),
    components(
        schemas(
            health::HealthResponse,
            Chain,
            WalletProfile,
            WalletBalances,
            Transaction,
            TxStatus,
            transactions::SendTokenBody,
            WatchOutcome,
            BcyTx,
            BcyTxInput,
            BcyTxOutput
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Wallets", description = "Wallet creation and balances"),
        (name = "Transactions", description = "Native transfers and their lifecycle"),
        (name = "Watchers", description = "Inbound transfer detection"),
        (name = "Webhooks", description = "Provider callbacks")
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
