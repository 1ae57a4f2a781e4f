// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for Bitcoin, Ethereum and Tron.
//!
//! Each chain sits behind a capability trait so the lifecycle manager, the
//! trackers and the watchers can be driven by fakes in tests:
//!
//! - [`BitcoinService`] - BlockCypher REST (skeleton send, confirmation hook)
//! - [`EthereumService`] - JSON-RPC over HTTP, pending-tx subscription over websocket
//! - [`TronService`] - TronGrid REST (account history with fingerprint paging)
//!
//! Key derivation lives in [`hd`] and is shared by all three.

pub mod btc;
pub mod eth;
pub mod hd;
pub mod trx;
pub mod types;

use async_trait::async_trait;

use crate::error::WalletError;
use crate::models::Transaction;

pub use btc::{BcyHook, BcyTx, BitcoinClient};
pub use eth::EthereumClient;
pub use hd::{BtcHdWallet, EthHdWallet, TrxHdWallet};
pub use trx::{AccountTx, AccountTxPage, AccountTxQuery, TronClient};
pub use types::*;

#[async_trait]
pub trait BitcoinService: Send + Sync {
    /// Network-aware address validation.
    fn check_address(&self, address: &str) -> Result<bool, WalletError>;

    /// Confirmed balance in satoshi.
    async fn get_balance(&self, address: &str) -> Result<u128, WalletError>;

    async fn get_tx(&self, hash: &str) -> Result<Transaction, WalletError>;

    async fn get_current_block(&self) -> Result<u64, WalletError>;

    /// Build with "low" fee preference, sign locally, broadcast once.
    async fn send_tx(
        &self,
        wallet: &BtcHdWallet,
        to: &str,
        amount: u128,
    ) -> Result<Transaction, WalletError>;

    /// Replace every registered hook with one confirmation hook for `address`.
    async fn create_confirmation_hook(&self, address: &str) -> Result<BcyHook, WalletError>;

    /// Map an inbound webhook payload to a lifecycle record.
    fn transaction_from_payload(&self, payload: &BcyTx) -> Transaction;
}

#[async_trait]
pub trait EthereumService: Send + Sync {
    /// `0x` + 40 hex, EIP-55 enforced on mixed case.
    fn check_address(&self, address: &str) -> Result<bool, WalletError>;

    /// Balance in wei.
    async fn get_balance(&self, address: &str) -> Result<u128, WalletError>;

    async fn get_current_block(&self) -> Result<u64, WalletError>;

    async fn send_tx(
        &self,
        wallet: &EthHdWallet,
        to: &str,
        amount: u128,
    ) -> Result<Transaction, WalletError>;

    /// Look a transaction up by hash and report whether it is still pending.
    async fn get_transaction_pending(&self, hash: &str) -> Result<PendingLookup, WalletError>;

    /// Receipt block, block time and confirmation depth of a mined transaction.
    async fn get_block_information(&self, hash: &str) -> Result<BlockInformation, WalletError>;

    /// Open a full pending-transaction subscription.
    async fn subscribe_pending_transactions(&self) -> Result<PendingTxStream, WalletError>;
}

#[async_trait]
pub trait TronService: Send + Sync {
    /// Base58Check with the `0x41` prefix.
    fn check_address(&self, address: &str) -> Result<bool, WalletError>;

    /// Balance in sun.
    async fn get_balance(&self, address: &str) -> Result<u128, WalletError>;

    /// `NotFound` until the node has execution info for `id`.
    async fn get_tx(&self, id: &str) -> Result<TronTxInfo, WalletError>;

    async fn get_current_block(&self) -> Result<u64, WalletError>;

    async fn send_tx(
        &self,
        wallet: &TrxHdWallet,
        to: &str,
        amount: u128,
    ) -> Result<Transaction, WalletError>;

    /// One page of account history.
    async fn get_tx_by_account_address(
        &self,
        address: &str,
        query: &AccountTxQuery,
    ) -> Result<AccountTxPage, WalletError>;
}
