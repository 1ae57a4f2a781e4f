// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded transaction database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `btc_transactions`: tx hash → serialized Transaction
//! - `eth_transactions`: tx hash → serialized Transaction
//! - `trx_transactions`: tx id → serialized Transaction
//!
//! Every write runs read-merge-insert inside one write transaction, so
//! concurrent upserts for the same id serialize on redb's single writer.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{run_blocking, TransactionStore};
use crate::error::WalletError;
use crate::models::{Chain, Transaction, TransactionFilter, TxStatus};

// =============================================================================
// Table Definitions
// =============================================================================

const BTC_TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("btc_transactions");
const ETH_TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("eth_transactions");
const TRX_TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("trx_transactions");

fn table_for(chain: Chain) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match chain {
        Chain::Bitcoin => BTC_TRANSACTIONS,
        Chain::Ethereum => ETH_TRANSACTIONS,
        Chain::Tron => TRX_TRANSACTIONS,
    }
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TxDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),
}

pub type TxDbResult<T> = Result<T, TxDbError>;

impl From<TxDbError> for WalletError {
    fn from(err: TxDbError) -> Self {
        match err {
            TxDbError::NotFound(what) => WalletError::NotFound(what),
            TxDbError::Duplicate(what) => WalletError::Duplicate(what),
            other => WalletError::Storage(other.to_string()),
        }
    }
}

// =============================================================================
// TxDatabase
// =============================================================================

/// Embedded ACID transaction database shared by the per-chain stores.
#[derive(Clone)]
pub struct TxDatabase {
    db: Arc<Database>,
}

impl TxDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> TxDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BTC_TRANSACTIONS)?;
            let _ = write_txn.open_table(ETH_TRANSACTIONS)?;
            let _ = write_txn.open_table(TRX_TRANSACTIONS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Store view for one chain.
    pub fn store(&self, chain: Chain) -> ChainTxStore {
        ChainTxStore {
            db: self.clone(),
            chain,
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a new record; fails if the id is already stored.
    pub fn insert_new(&self, chain: Chain, tx: &Transaction) -> TxDbResult<()> {
        let json = serde_json::to_vec(tx)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_for(chain))?;
            if table.get(tx.id.as_str())?.is_some() {
                return Err(TxDbError::Duplicate("transaction".into()));
            }
            table.insert(tx.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Fold `tx` over the stored record, inserting it if none exists.
    ///
    /// With `must_exist`, a missing record is `NotFound` instead.
    pub fn merge(&self, chain: Chain, tx: Transaction, must_exist: bool) -> TxDbResult<Transaction> {
        let write_txn = self.db.begin_write()?;
        let stored = {
            let mut table = write_txn.open_table(table_for(chain))?;

            let existing: Option<Transaction> = match table.get(tx.id.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            let merged = match existing {
                Some(existing) => tx.merged_over(&existing),
                None if must_exist => {
                    return Err(TxDbError::NotFound("transaction".into()));
                }
                None => tx,
            };

            let json = serde_json::to_vec(&merged)?;
            table.insert(merged.id.as_str(), json.as_slice())?;
            merged
        };
        write_txn.commit()?;
        Ok(stored)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up a single record by id.
    pub fn get_transaction(&self, chain: Chain, id: &str) -> TxDbResult<Option<Transaction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(chain))?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All records matching `filter`, in key order.
    pub fn find(&self, chain: Chain, filter: &TransactionFilter) -> TxDbResult<Vec<Transaction>> {
        if let Some(id) = &filter.id {
            return Ok(self
                .get_transaction(chain, id)?
                .into_iter()
                .filter(|tx| filter.matches(tx))
                .collect());
        }

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(chain))?;
        let mut results = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let tx: Transaction = serde_json::from_slice(value.value())?;
            if filter.matches(&tx) {
                results.push(tx);
            }
        }
        Ok(results)
    }
}

// =============================================================================
// Per-chain Store
// =============================================================================

/// [`TransactionStore`] over one chain's table.
#[derive(Clone)]
pub struct ChainTxStore {
    db: TxDatabase,
    chain: Chain,
}

impl ChainTxStore {
    pub fn chain(&self) -> Chain {
        self.chain
    }
}

#[async_trait]
impl TransactionStore for ChainTxStore {
    async fn add(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        let (db, chain) = (self.db.clone(), self.chain);
        run_blocking(move || {
            db.insert_new(chain, &tx)?;
            Ok(tx)
        })
        .await
    }

    async fn update(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        let (db, chain) = (self.db.clone(), self.chain);
        run_blocking(move || db.merge(chain, tx, true)).await
    }

    async fn upsert(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        let (db, chain) = (self.db.clone(), self.chain);
        let stored = run_blocking(move || db.merge(chain, tx, false)).await?;

        tracing::debug!(
            chain = %self.chain,
            tx_id = %stored.id,
            confirmation = stored.confirmation,
            status = ?stored.status,
            "Transaction upserted"
        );
        Ok(stored)
    }

    async fn get(&self, filter: &TransactionFilter) -> Result<Transaction, WalletError> {
        let (db, chain, filter) = (self.db.clone(), self.chain, filter.clone());
        run_blocking(move || {
            db.find(chain, &filter)?
                .into_iter()
                .next()
                .ok_or_else(|| TxDbError::NotFound("transaction".into()))
        })
        .await
    }

    async fn list_pending(&self) -> Result<Vec<Transaction>, WalletError> {
        let (db, chain) = (self.db.clone(), self.chain);
        let filter = TransactionFilter {
            status: Some(TxStatus::Pending),
            ..Default::default()
        };
        run_blocking(move || db.find(chain, &filter)).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_db() -> (TxDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = TxDatabase::open(&dir.path().join("transactions.redb")).unwrap();
        (db, dir)
    }

    fn sample_tx(id: &str) -> Transaction {
        Transaction::pending(
            id,
            "0x1111111111111111111111111111111111111111",
            "0x2222222222222222222222222222222222222222",
            1_000_000_000_000_000_000,
        )
    }

    #[test]
    fn insert_and_get_transaction() {
        let (db, _dir) = temp_db();
        db.insert_new(Chain::Ethereum, &sample_tx("0xaaa")).unwrap();

        let retrieved = db.get_transaction(Chain::Ethereum, "0xaaa").unwrap().unwrap();
        assert_eq!(retrieved.amount, 1_000_000_000_000_000_000);
        assert_eq!(retrieved.status, TxStatus::Pending);

        // Tables are per chain.
        assert!(db.get_transaction(Chain::Tron, "0xaaa").unwrap().is_none());
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let (db, _dir) = temp_db();
        db.insert_new(Chain::Bitcoin, &sample_tx("abc")).unwrap();
        assert!(matches!(
            db.insert_new(Chain::Bitcoin, &sample_tx("abc")),
            Err(TxDbError::Duplicate(_))
        ));
    }

    #[test]
    fn merge_ignores_lower_confirmation() {
        let (db, _dir) = temp_db();
        let mut tx = sample_tx("0xbbb");
        tx.confirmation = 8;
        db.merge(Chain::Ethereum, tx.clone(), false).unwrap();

        tx.confirmation = 3;
        let stored = db.merge(Chain::Ethereum, tx, false).unwrap();
        assert_eq!(stored.confirmation, 8);

        let reread = db.get_transaction(Chain::Ethereum, "0xbbb").unwrap().unwrap();
        assert_eq!(reread.confirmation, 8);
    }

    #[test]
    fn merge_keeps_terminal_status() {
        let (db, _dir) = temp_db();
        let mut tx = sample_tx("0xccc");
        tx.status = TxStatus::Success;
        tx.completed_at = Some(Utc::now());
        tx.confirmation = 13;
        db.merge(Chain::Ethereum, tx, false).unwrap();

        let stale = sample_tx("0xccc");
        let stored = db.merge(Chain::Ethereum, stale, false).unwrap();
        assert_eq!(stored.status, TxStatus::Success);
        assert_eq!(stored.confirmation, 13);
        assert!(stored.completed_at.is_some());
    }

    #[test]
    fn update_requires_existing_record() {
        let (db, _dir) = temp_db();
        assert!(matches!(
            db.merge(Chain::Tron, sample_tx("missing"), true),
            Err(TxDbError::NotFound(_))
        ));
    }

    #[test]
    fn find_filters_by_status_and_address() {
        let (db, _dir) = temp_db();
        db.insert_new(Chain::Tron, &sample_tx("t1")).unwrap();
        let mut done = sample_tx("t2");
        done.status = TxStatus::Success;
        done.receiver_address = vec!["TReceiver".into()];
        db.insert_new(Chain::Tron, &done).unwrap();

        let pending = db
            .find(
                Chain::Tron,
                &TransactionFilter {
                    status: Some(TxStatus::Pending),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "t1");

        let by_receiver = db
            .find(
                Chain::Tron,
                &TransactionFilter {
                    receiver: Some("treceiver".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(by_receiver.len(), 1);
        assert_eq!(by_receiver[0].id, "t2");
    }

    #[tokio::test]
    async fn chain_store_round_trip() {
        let (db, _dir) = temp_db();
        let store = db.store(Chain::Ethereum);

        store.add(sample_tx("0xddd")).await.unwrap();
        assert!(matches!(
            store.add(sample_tx("0xddd")).await,
            Err(WalletError::Duplicate(_))
        ));

        let mut mined = sample_tx("0xddd");
        mined.confirmation = 2;
        mined.block = Some(100);
        store.upsert(mined).await.unwrap();

        let fetched = store.get(&TransactionFilter::by_id("0xddd")).await.unwrap();
        assert_eq!(fetched.block, Some(100));
        assert_eq!(store.list_pending().await.unwrap().len(), 1);

        assert!(matches!(
            store.get(&TransactionFilter::by_id("0xeee")).await,
            Err(WalletError::NotFound(_))
        ));
        assert!(matches!(
            store.update(sample_tx("0xeee")).await,
            Err(WalletError::NotFound(_))
        ));
    }
}
