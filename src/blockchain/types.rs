// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants shared by the chain clients.

use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

use crate::error::WalletError;
use crate::models::{Transaction, TxStatus};

/// Depth past which an Ethereum transfer is considered final.
pub const ETH_SUCCESS_DEPTH: u64 = 12;

/// Default number of BlockCypher confirmations that mark a Bitcoin transfer final.
pub const DEFAULT_BTC_MIN_CONFIRMATIONS: u64 = 6;

/// BlockCypher chain selector and its address network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitcoinNetwork {
    /// Path segment used by BlockCypher (`main`, `test3`, ...)
    pub chain: &'static str,
    pub network: bitcoin::Network,
}

/// Bitcoin mainnet.
pub const BTC_MAINNET: BitcoinNetwork = BitcoinNetwork {
    chain: "main",
    network: bitcoin::Network::Bitcoin,
};

/// Bitcoin testnet3 (BlockCypher default).
pub const BTC_TESTNET: BitcoinNetwork = BitcoinNetwork {
    chain: "test3",
    network: bitcoin::Network::Testnet,
};

impl BitcoinNetwork {
    /// Resolve a configured chain name. `main` is mainnet, `test3`, `test4` and
    /// `test` are testnet.
    pub fn from_chain(chain: &str) -> Result<Self, WalletError> {
        match chain.trim().to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(BTC_MAINNET),
            "test3" | "test" | "testnet" => Ok(BTC_TESTNET),
            "test4" => Ok(BitcoinNetwork {
                chain: "test4",
                network: bitcoin::Network::Testnet,
            }),
            other => Err(WalletError::validation(format!(
                "unsupported bitcoin chain `{other}`"
            ))),
        }
    }

    pub fn is_mainnet(&self) -> bool {
        self.network == bitcoin::Network::Bitcoin
    }
}

// =============================================================================
// Ethereum
// =============================================================================

/// Network-wide pending transaction seen on the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// `0x`-prefixed hash
    pub hash: String,
    /// Checksum recipient, `None` for contract creation
    pub to: Option<String>,
}

/// Push stream of pending transactions. Ends when the subscription drops.
pub type PendingTxStream = BoxStream<'static, PendingTransaction>;

/// Result of a by-hash lookup: the transfer and whether it is still in the mempool.
#[derive(Debug, Clone)]
pub struct PendingLookup {
    pub transaction: Transaction,
    pub is_pending: bool,
}

/// Inclusion data for a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInformation {
    pub block: u64,
    pub received_at: Option<DateTime<Utc>>,
    /// `head - block`
    pub confirmation: u64,
    pub status: TxStatus,
}

// =============================================================================
// Tron
// =============================================================================

/// Execution info for a Tron transaction (`gettransactioninfobyid`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TronTxInfo {
    pub id: String,
    /// Sun
    pub fee: u64,
    pub block_number: u64,
    /// Milliseconds since epoch
    pub block_timestamp: i64,
}

/// Convert a Tron millisecond timestamp.
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
