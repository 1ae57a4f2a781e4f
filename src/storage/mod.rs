// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage
//!
//! Persistence behind three narrow interfaces:
//!
//! - [`WalletStore`] - wallets keyed by id with a unique owner email; the
//!   mnemonic is sealed with the key supplied on each call
//! - [`TransactionStore`] - one per chain, keyed by the native transaction id;
//!   writes fold over the stored record so confirmation never drops and a
//!   terminal status is never reverted
//! - [`ListCache`] - string values and TTL'd lists for the watch registry
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   wallets.redb        # wallets, wallet_emails
//!   transactions.redb   # btc_transactions, eth_transactions, trx_transactions
//! ```
//!
//! redb is synchronous; every call from async code goes through
//! [`run_blocking`].

pub mod cache;
pub mod tx_database;
pub mod wallet_database;

use async_trait::async_trait;

use crate::error::WalletError;
use crate::models::{Transaction, TransactionFilter, Wallet, WalletFilter, WalletProfile, WalletUpdate};

pub use cache::{CacheError, ListCache, MemoryListCache, RedisListCache};
pub use tx_database::{ChainTxStore, TxDatabase, TxDbError, TxDbResult};
pub use wallet_database::WalletDatabase;

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Persist a new wallet. `Duplicate("wallet")` if the owner already has one.
    async fn add(&self, wallet: Wallet, key: &str) -> Result<Wallet, WalletError>;

    /// Load a wallet and decrypt its mnemonic with `key`.
    async fn get(&self, filter: &WalletFilter, key: &str) -> Result<Wallet, WalletError>;

    async fn update(&self, id: &str, update: WalletUpdate) -> Result<WalletProfile, WalletError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert; `Duplicate("transaction")` if the id exists.
    async fn add(&self, tx: Transaction) -> Result<Transaction, WalletError>;

    /// Overwrite an existing record; `NotFound("transaction")` if absent.
    async fn update(&self, tx: Transaction) -> Result<Transaction, WalletError>;

    /// Insert or fold over the existing record. Returns what was stored.
    async fn upsert(&self, tx: Transaction) -> Result<Transaction, WalletError>;

    /// First record matching every set field of `filter`.
    async fn get(&self, filter: &TransactionFilter) -> Result<Transaction, WalletError>;

    async fn list_pending(&self) -> Result<Vec<Transaction>, WalletError>;
}

/// Run a synchronous redb call on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, WalletError>
where
    F: FnOnce() -> TxDbResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WalletError::Storage(format!("storage task failed: {e}")))?
        .map_err(WalletError::from)
}
