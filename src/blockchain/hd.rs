// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HD key derivation for every supported chain.
//!
//! All derivers are pure: mnemonic in, keypair and address out. The BIP-39 seed
//! always uses an empty passphrase.
//!
//! | Chain    | Key                          | Address                                  |
//! |----------|------------------------------|------------------------------------------|
//! | Bitcoin  | BIP-32 master key            | P2PKH of the compressed public key       |
//! | Ethereum | `m/44'/60'/0'/0/0`           | EIP-55 checksum hex                      |
//! | Tron     | `m/44'/195'/0'/0/0`          | `0x41 ‖ keccak(pub)[12..]`, Base58Check  |
//!
//! Keypairs are never cached; callers derive them per operation and drop them.

use std::str::FromStr;

use alloy::primitives::{keccak256, Address as EthAddress};
use alloy::signers::local::PrivateKeySigner;
use bip39::{Language, Mnemonic};
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Address, CompressedPublicKey, Network, PrivateKey};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::WalletError;

/// BIP-44 account path for Ethereum.
pub const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// BIP-44 account path for Tron (coin type 195).
pub const TRX_DERIVATION_PATH: &str = "m/44'/195'/0'/0/0";

/// Version byte of every Tron mainnet/testnet address.
pub const TRON_ADDRESS_PREFIX: u8 = 0x41;

/// Raw Tron address length (prefix + 20-byte hash).
pub const TRON_RAW_ADDRESS_LEN: usize = 21;

// =============================================================================
// Mnemonic
// =============================================================================

/// Generate a fresh 12-word English mnemonic from 128 bits of OS entropy.
pub fn generate_mnemonic() -> Result<String, WalletError> {
    let mut entropy = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| WalletError::Crypto(format!("mnemonic generation failed: {e}")))?;
    Ok(mnemonic.to_string())
}

fn seed_from_mnemonic(phrase: &str) -> Result<[u8; 64], WalletError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase.trim())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.to_seed(""))
}

fn derive_child_secret(seed: &[u8], path: &str) -> Result<[u8; 32], WalletError> {
    let secp = Secp256k1::new();
    let master = Xpriv::new_master(Network::Bitcoin, seed).map_err(derivation)?;
    let path = DerivationPath::from_str(path).map_err(derivation)?;
    let child = master.derive_priv(&secp, &path).map_err(derivation)?;
    Ok(child.private_key.secret_bytes())
}

fn derivation(err: impl std::fmt::Display) -> WalletError {
    WalletError::Crypto(format!("key derivation failed: {err}"))
}

// =============================================================================
// Bitcoin
// =============================================================================

/// Bitcoin keypair derived from the BIP-32 master key.
pub struct BtcHdWallet {
    pub address: String,
    /// Compressed SEC1 public key, hex
    pub public_key: String,
    wif: String,
    secret_key: SecretKey,
}

impl BtcHdWallet {
    pub fn from_mnemonic(phrase: &str, network: Network) -> Result<Self, WalletError> {
        let seed = seed_from_mnemonic(phrase)?;
        let master = Xpriv::new_master(network, &seed).map_err(derivation)?;

        let secp = Secp256k1::new();
        let private_key = PrivateKey::new(master.private_key, network);
        let public_key =
            CompressedPublicKey::from_private_key(&secp, &private_key).map_err(derivation)?;
        let address = Address::p2pkh(public_key.pubkey_hash(), network);

        Ok(Self {
            address: address.to_string(),
            public_key: alloy::hex::encode(public_key.to_bytes()),
            wif: private_key.to_wif(),
            secret_key: master.private_key,
        })
    }

    /// Wallet-Import-Format private key (compressed).
    pub fn wif(&self) -> &str {
        &self.wif
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }
}

impl std::fmt::Debug for BtcHdWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtcHdWallet")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Ethereum
// =============================================================================

/// Ethereum account `m/44'/60'/0'/0/0`.
pub struct EthHdWallet {
    pub address: String,
    signer: PrivateKeySigner,
}

impl EthHdWallet {
    pub fn from_mnemonic(phrase: &str) -> Result<Self, WalletError> {
        let seed = seed_from_mnemonic(phrase)?;
        let secret = derive_child_secret(&seed, ETH_DERIVATION_PATH)?;
        let signer = PrivateKeySigner::from_slice(&secret).map_err(derivation)?;

        Ok(Self {
            address: signer.address().to_checksum(None),
            signer,
        })
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn eth_address(&self) -> EthAddress {
        self.signer.address()
    }
}

impl std::fmt::Debug for EthHdWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthHdWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tron
// =============================================================================

/// Tron account `m/44'/195'/0'/0/0`.
pub struct TrxHdWallet {
    pub address: String,
    /// Uncompressed SEC1 public key (`04 ‖ x ‖ y`), hex
    pub public_key: String,
    signing_key: SigningKey,
}

impl TrxHdWallet {
    pub fn from_mnemonic(phrase: &str) -> Result<Self, WalletError> {
        let seed = seed_from_mnemonic(phrase)?;
        let secret = derive_child_secret(&seed, TRX_DERIVATION_PATH)?;
        let signing_key = SigningKey::from_slice(&secret).map_err(derivation)?;

        let point = signing_key.verifying_key().as_affine().to_encoded_point(false);
        let raw = tron_raw_address(&point.as_bytes()[1..]);

        Ok(Self {
            address: tron_base58check(&raw),
            public_key: alloy::hex::encode(point.as_bytes()),
            signing_key,
        })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn private_key_hex(&self) -> String {
        alloy::hex::encode(self.signing_key.to_bytes())
    }
}

impl std::fmt::Debug for TrxHdWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrxHdWallet")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// `0x41 ‖ keccak256(x ‖ y)[12..]` for a 64-byte uncompressed public key body.
pub fn tron_raw_address(public_key_xy: &[u8]) -> [u8; TRON_RAW_ADDRESS_LEN] {
    let hash = keccak256(public_key_xy);
    let mut raw = [0u8; TRON_RAW_ADDRESS_LEN];
    raw[0] = TRON_ADDRESS_PREFIX;
    raw[1..].copy_from_slice(&hash[12..]);
    raw
}

/// Base58 encoding of `payload ‖ sha256(sha256(payload))[..4]`.
pub fn tron_base58check(payload: &[u8]) -> String {
    let checksum = Sha256::digest(Sha256::digest(payload));
    let mut buf = Vec::with_capacity(payload.len() + 4);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum[..4]);
    bs58::encode(buf).into_string()
}

/// Decode a Base58Check Tron address, verifying checksum and prefix.
pub fn tron_decode_base58check(address: &str) -> Result<[u8; TRON_RAW_ADDRESS_LEN], WalletError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| WalletError::validation(format!("invalid base58 address: {e}")))?;
    if bytes.len() != TRON_RAW_ADDRESS_LEN + 4 {
        return Err(WalletError::validation("invalid tron address length"));
    }

    let (payload, checksum) = bytes.split_at(TRON_RAW_ADDRESS_LEN);
    let expected = Sha256::digest(Sha256::digest(payload));
    if checksum != &expected[..4] {
        return Err(WalletError::validation("tron address checksum mismatch"));
    }
    if payload[0] != TRON_ADDRESS_PREFIX {
        return Err(WalletError::validation("tron address prefix mismatch"));
    }

    let mut raw = [0u8; TRON_RAW_ADDRESS_LEN];
    raw.copy_from_slice(payload);
    Ok(raw)
}

/// Convert the hex form used by the Tron HTTP API (`41…`) to Base58Check.
pub fn tron_hex_to_base58(hex_address: &str) -> Result<String, WalletError> {
    let bytes = alloy::hex::decode(hex_address.trim_start_matches("0x"))
        .map_err(|e| WalletError::validation(format!("invalid hex address: {e}")))?;
    if bytes.len() != TRON_RAW_ADDRESS_LEN || bytes[0] != TRON_ADDRESS_PREFIX {
        return Err(WalletError::validation("invalid tron hex address"));
    }
    Ok(tron_base58check(&bytes))
}
