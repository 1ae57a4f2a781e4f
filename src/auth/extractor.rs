// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated wallet owners.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user.email identifies the wallet owner
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::AuthenticatedUser;
use crate::error::{ApiError, WalletError};
use crate::state::AppState;

pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| WalletError::Unauthenticated("missing authorization header".into()))?
            .to_str()
            .map_err(|_| WalletError::Unauthenticated("invalid authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| WalletError::Unauthenticated("invalid authorization header".into()))?;

        let user = state.auth.verify(token.trim())?;
        Ok(Auth(user))
    }
}
