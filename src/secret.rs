// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Seed-phrase encryption at rest.
//!
//! AES-GCM keyed directly by the configured key bytes (16, 24 or 32 bytes select
//! AES-128, AES-192 or AES-256). Output layout:
//!
//! ```text
//! nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};

use crate::error::WalletError;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// GCM standard nonce size.
pub const NONCE_SIZE: usize = 12;

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, WalletError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(crypto)?
            .encrypt(&nonce, plaintext),
        24 => Aes192Gcm::new_from_slice(key)
            .map_err(crypto)?
            .encrypt(&nonce, plaintext),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(crypto)?
            .encrypt(&nonce, plaintext),
        n => return Err(invalid_key_length(n)),
    }
    .map_err(crypto)?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt a `nonce || ciphertext` blob produced by [`encrypt`].
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, WalletError> {
    if ![16, 24, 32].contains(&key.len()) {
        return Err(invalid_key_length(key.len()));
    }
    if ciphertext.len() < NONCE_SIZE {
        return Err(WalletError::Crypto("ciphertext too short".into()));
    }

    let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce);

    match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(crypto)?
            .decrypt(nonce, sealed),
        24 => Aes192Gcm::new_from_slice(key)
            .map_err(crypto)?
            .decrypt(nonce, sealed),
        _ => Aes256Gcm::new_from_slice(key)
            .map_err(crypto)?
            .decrypt(nonce, sealed),
    }
    .map_err(|_| WalletError::Crypto("message authentication failed".into()))
}

/// Encrypt a seed phrase and hex-encode it for storage.
pub fn seal_seed_phrase(mnemonic: &str, key: &str) -> Result<String, WalletError> {
    encrypt(mnemonic.as_bytes(), key.as_bytes()).map(alloy::hex::encode)
}

/// Reverse of [`seal_seed_phrase`].
pub fn open_seed_phrase(sealed: &str, key: &str) -> Result<String, WalletError> {
    let bytes = alloy::hex::decode(sealed)
        .map_err(|e| WalletError::Crypto(format!("malformed ciphertext: {e}")))?;
    let plain = decrypt(&bytes, key.as_bytes())?;
    String::from_utf8(plain).map_err(|_| WalletError::Crypto("seed phrase is not utf-8".into()))
}

/// Reject keys AES cannot use.
pub fn validate_key(key: &str) -> Result<(), WalletError> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        n => Err(invalid_key_length(n)),
    }
}

fn invalid_key_length(len: usize) -> WalletError {
    WalletError::Crypto(format!(
        "invalid key length {len}, expected 16, 24 or 32 bytes"
    ))
}

fn crypto(err: impl std::fmt::Display) -> WalletError {
    WalletError::Crypto(err.to_string())
}
