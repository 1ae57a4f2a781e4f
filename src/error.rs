// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error types shared by the wallet core and the HTTP layer.
//!
//! [`WalletError`] is the taxonomy every core operation returns. The API layer
//! converts it into [`ApiError`], which renders as `{"error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

// =============================================================================
// Core Error Taxonomy
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// Missing or malformed request data.
    #[error("{0}")]
    Validation(String),

    /// Wallet or transaction absent (on-chain or in a store).
    #[error("{0} not found")]
    NotFound(String),

    /// Resource already exists, e.g. a second wallet for one owner.
    #[error("{0} already exist")]
    Duplicate(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Transport failure talking to a chain endpoint.
    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    /// The node accepted the request but refused the signed transaction.
    #[error("broadcast rejected: {0}")]
    Broadcast(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("not enough balance: have {balance}, need {required}")]
    InsufficientFunds { balance: String, required: String },

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl WalletError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn chain_unavailable(err: impl std::fmt::Display) -> Self {
        Self::ChainUnavailable(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// =============================================================================
// HTTP Error
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        let status = match &err {
            WalletError::Validation(_) => StatusCode::BAD_REQUEST,
            WalletError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            WalletError::NotFound(_) => StatusCode::NOT_FOUND,
            WalletError::Duplicate(_) => StatusCode::CONFLICT,
            WalletError::InsufficientFunds { .. } | WalletError::InvalidMnemonic(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            WalletError::Broadcast(_) => StatusCode::BAD_GATEWAY,
            WalletError::ChainUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            WalletError::Crypto(_) | WalletError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Internal details stay in the logs.
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %err, "Internal error while handling request");
                "internal error".to_string()
            }
            _ => err.to_string(),
        };

        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
