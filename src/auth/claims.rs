// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and HS256 verification.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Claims carried by an API token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Wallet owner
    pub email: String,
    /// Expiration timestamp
    pub exp: i64,
}

/// Caller identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub email: String,
    pub expires_at: i64,
}

/// HS256 signer and verifier.
#[derive(Clone)]
pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuth {
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify signature and expiry, then require a non-empty `email` claim.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, WalletError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "token expired",
                ErrorKind::InvalidSignature => "invalid signature",
                _ => "malformed token",
            };
            WalletError::Unauthenticated(reason.into())
        })?;

        let email = data.claims.email.trim();
        if email.is_empty() {
            return Err(WalletError::Unauthenticated("missing email".into()));
        }

        Ok(AuthenticatedUser {
            email: email.to_string(),
            expires_at: data.claims.exp,
        })
    }

    /// Sign a token for `email` valid for `ttl`.
    pub fn issue(&self, email: &str, ttl: Duration) -> Result<String, WalletError> {
        let ttl = i64::try_from(ttl.as_secs())
            .map_err(|_| WalletError::validation("token lifetime too long"))?;
        let claims = TokenClaims {
            email: email.to_string(),
            exp: Utc::now().timestamp() + ttl,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| WalletError::Crypto(format!("token signing failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let auth = JwtAuth::from_secret("secret");
        let token = auth.issue("alice@example.com", Duration::from_secs(600)).unwrap();

        let user = auth.verify(&token).unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert!(user.expires_at > Utc::now().timestamp());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = JwtAuth::from_secret("secret")
            .issue("alice@example.com", Duration::from_secs(600))
            .unwrap();
        assert_eq!(
            JwtAuth::from_secret("other").verify(&token).unwrap_err(),
            WalletError::Unauthenticated("invalid signature".into())
        );
    }

    #[test]
    fn expired_and_malformed_tokens_are_rejected() {
        let auth = JwtAuth::from_secret("secret");
        let claims = TokenClaims {
            email: "alice@example.com".into(),
            exp: Utc::now().timestamp() - 3_600,
        };
        let expired = encode(&Header::new(Algorithm::HS256), &claims, &auth.encoding).unwrap();
        assert_eq!(
            auth.verify(&expired).unwrap_err(),
            WalletError::Unauthenticated("token expired".into())
        );

        assert!(matches!(
            auth.verify("not.a.jwt"),
            Err(WalletError::Unauthenticated(_))
        ));
    }

    #[test]
    fn empty_email_is_rejected() {
        let auth = JwtAuth::from_secret("secret");
        let token = auth.issue("  ", Duration::from_secs(60)).unwrap();
        assert_eq!(
            auth.verify(&token).unwrap_err(),
            WalletError::Unauthenticated("missing email".into())
        );
    }
}
