// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer-token authentication for the wallet API.
//!
//! ## Auth Flow
//!
//! 1. The client sends `Authorization: Bearer <JWT>`
//! 2. The server verifies the HS256 signature with `JWT_SECRET` and the expiry
//! 3. The `email` claim identifies the wallet owner
//!
//! Every failure is reported as `Unauthenticated` (HTTP 401).

pub mod claims;
pub mod extractor;

pub use claims::{AuthenticatedUser, JwtAuth, TokenClaims};
pub use extractor::Auth;
