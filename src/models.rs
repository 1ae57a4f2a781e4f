// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Domain Models
//!
//! Wallets, transactions and the send command shared by the lifecycle manager,
//! the stores and the REST API.
//!
//! ## Model Categories
//!
//! - **Chain**: token-symbol dispatch (`btc`, `eth`, `trx`)
//! - **Wallet**: owner record holding the mnemonic and the three derived addresses
//! - **Transaction**: lifecycle record keyed by the chain's native transaction id
//! - **SendTokenRequest**: ephemeral transfer command

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::WalletError;

// =============================================================================
// Chain
// =============================================================================

/// Supported settlement chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[serde(rename = "btc")]
    Bitcoin,
    #[serde(rename = "eth")]
    Ethereum,
    #[serde(rename = "trx")]
    Tron,
}

impl Chain {
    /// Resolve a transfer token symbol (`btc`/`bitcoin`, `eth`/`ethereum`,
    /// `trx`/`tron`, case-insensitive).
    pub fn from_token_symbol(symbol: &str) -> Result<Self, WalletError> {
        match symbol.trim().to_ascii_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(Self::Bitcoin),
            "eth" | "ethereum" => Ok(Self::Ethereum),
            "trx" | "tron" => Ok(Self::Tron),
            _ => Err(WalletError::validation("invalid transfer token")),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Bitcoin => "btc",
            Self::Ethereum => "eth",
            Self::Tron => "trx",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

// =============================================================================
// Wallet
// =============================================================================

/// Custodial wallet with its plaintext mnemonic.
///
/// Only exists in memory; stores persist the mnemonic encrypted. Addresses are
/// derived from the mnemonic at creation and never edited independently.
#[derive(Clone)]
pub struct Wallet {
    pub id: String,
    pub owner_email: String,
    pub mnemonic: String,
    pub btc_address: String,
    pub eth_address: String,
    pub trx_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Public view without the mnemonic.
    pub fn profile(&self) -> WalletProfile {
        WalletProfile {
            id: self.id.clone(),
            owner_email: self.owner_email.clone(),
            btc_address: self.btc_address.clone(),
            eth_address: self.eth_address.clone(),
            trx_address: self.trx_address.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn address_for(&self, chain: Chain) -> &str {
        match chain {
            Chain::Bitcoin => &self.btc_address,
            Chain::Ethereum => &self.eth_address,
            Chain::Tron => &self.trx_address,
        }
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.id)
            .field("owner_email", &self.owner_email)
            .field("mnemonic", &"[REDACTED]")
            .field("btc_address", &self.btc_address)
            .field("eth_address", &self.eth_address)
            .field("trx_address", &self.trx_address)
            .finish()
    }
}

/// Wallet as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct WalletProfile {
    pub id: String,
    pub owner_email: String,
    pub btc_address: String,
    pub eth_address: String,
    pub trx_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wallet lookup key. Exactly one field is expected to be set.
#[derive(Debug, Clone, Default)]
pub struct WalletFilter {
    pub id: Option<String>,
    pub email: Option<String>,
}

impl WalletFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            email: None,
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            id: None,
            email: Some(email.into()),
        }
    }
}

/// Partial wallet update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct WalletUpdate {
    pub btc_address: Option<String>,
    pub eth_address: Option<String>,
    pub trx_address: Option<String>,
}

/// Native balances of one wallet, in base units.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct WalletBalances {
    /// Satoshi
    pub btc: u128,
    /// Wei
    pub eth: u128,
    /// Sun
    pub trx: u128,
}

// =============================================================================
// Transaction
// =============================================================================

/// Lifecycle status of a tracked transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Broadcast or sighted, not yet deep enough
    Pending,
    /// Confirmed past the chain's threshold
    Success,
    /// Mined past the threshold but reverted (Ethereum only)
    Failed,
}

impl Default for TxStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Transfer record keyed by the chain's native transaction id.
///
/// Amounts and fees are in base units (satoshi, wei, sun).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub sender_address: Vec<String>,
    #[serde(default)]
    pub receiver_address: Vec<String>,
    #[serde(default)]
    pub amount: u128,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    #[serde(default)]
    pub confirmation: u64,
    #[serde(default)]
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// New `pending` record with zero confirmations.
    pub fn pending(
        id: impl Into<String>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: u128,
    ) -> Self {
        Self {
            id: id.into(),
            sender_address: vec![sender.into()],
            receiver_address: vec![receiver.into()],
            amount,
            fee: None,
            block: None,
            confirmation: 0,
            status: TxStatus::Pending,
            received_at: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Fold an incoming write over the stored record.
    ///
    /// Mutable fields come from `self`, except that confirmation never drops,
    /// a terminal status is never reverted, and timestamps already known are
    /// kept when the incoming write lacks them.
    pub fn merged_over(mut self, stored: &Transaction) -> Transaction {
        self.confirmation = self.confirmation.max(stored.confirmation);
        if stored.status.is_terminal() && !self.status.is_terminal() {
            self.status = stored.status;
        }
        if self.received_at.is_none() {
            self.received_at = stored.received_at;
        }
        if self.completed_at.is_none() {
            self.completed_at = stored.completed_at;
        }
        if self.fee.is_none() {
            self.fee = stored.fee;
        }
        if self.block.is_none() {
            self.block = stored.block;
        }
        self.updated_at = Utc::now();
        self
    }
}

/// Transaction lookup. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub id: Option<String>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub status: Option<TxStatus>,
}

impl TransactionFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.id.as_ref().is_none_or(|id| &tx.id == id)
            && self
                .sender
                .as_ref()
                .is_none_or(|s| tx.sender_address.iter().any(|a| a.eq_ignore_ascii_case(s)))
            && self
                .receiver
                .as_ref()
                .is_none_or(|r| tx.receiver_address.iter().any(|a| a.eq_ignore_ascii_case(r)))
            && self.status.is_none_or(|status| tx.status == status)
    }
}

// =============================================================================
// Send Command
// =============================================================================

/// Transfer command; validated and consumed, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendTokenRequest {
    pub sender_email: String,
    pub receiver_address: String,
    /// Base units of the chosen token
    pub amount: u128,
    /// `btc`, `eth` or `trx` (long names accepted)
    pub token_symbol: String,
}

impl SendTokenRequest {
    /// Check that every field is present.
    pub fn validate(&self) -> Result<(), WalletError> {
        if self.sender_email.trim().is_empty()
            || self.receiver_address.trim().is_empty()
            || self.token_symbol.trim().is_empty()
            || self.amount == 0
        {
            return Err(WalletError::validation("all fields required"));
        }
        Ok(())
    }
}
