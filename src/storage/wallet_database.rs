// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet database backed by redb.
//!
//! ## Table Layout
//!
//! - `wallets`: wallet id → serialized [`StoredWallet`]
//! - `wallet_emails`: lowercase owner email → wallet id (uniqueness index)
//!
//! The mnemonic is stored AES-GCM sealed and hex-encoded. The key is never held
//! by the database; callers pass it per operation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::{run_blocking, TxDbError, TxDbResult, WalletStore};
use crate::error::WalletError;
use crate::models::{Wallet, WalletFilter, WalletProfile, WalletUpdate};
use crate::secret;

const WALLETS: TableDefinition<&str, &[u8]> = TableDefinition::new("wallets");
const WALLET_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("wallet_emails");

/// Wallet as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWallet {
    pub id: String,
    pub owner_email: String,
    /// Hex of `nonce || ciphertext || tag`
    pub sealed_mnemonic: String,
    pub btc_address: String,
    pub eth_address: String,
    pub trx_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredWallet {
    fn seal(wallet: &Wallet, key: &str) -> Result<Self, WalletError> {
        Ok(Self {
            id: wallet.id.clone(),
            owner_email: wallet.owner_email.clone(),
            sealed_mnemonic: secret::seal_seed_phrase(&wallet.mnemonic, key)?,
            btc_address: wallet.btc_address.clone(),
            eth_address: wallet.eth_address.clone(),
            trx_address: wallet.trx_address.clone(),
            created_at: wallet.created_at,
            updated_at: wallet.updated_at,
        })
    }

    fn open(self, key: &str) -> Result<Wallet, WalletError> {
        let mnemonic = secret::open_seed_phrase(&self.sealed_mnemonic, key)?;
        Ok(Wallet {
            id: self.id,
            owner_email: self.owner_email,
            mnemonic,
            btc_address: self.btc_address,
            eth_address: self.eth_address,
            trx_address: self.trx_address,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn profile(&self) -> WalletProfile {
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
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// redb-backed [`WalletStore`].
#[derive(Clone)]
pub struct WalletDatabase {
    db: Arc<Database>,
}

impl WalletDatabase {
    pub fn open(path: &Path) -> TxDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(WALLETS)?;
            let _ = write_txn.open_table(WALLET_EMAILS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Insert a wallet and claim its email in one write transaction.
    pub fn insert(&self, wallet: &StoredWallet) -> TxDbResult<()> {
        let json = serde_json::to_vec(wallet)?;
        let email = email_key(&wallet.owner_email);

        let write_txn = self.db.begin_write()?;
        {
            let mut emails = write_txn.open_table(WALLET_EMAILS)?;
            if emails.get(email.as_str())?.is_some() {
                return Err(TxDbError::Duplicate("wallet".into()));
            }
            let mut wallets = write_txn.open_table(WALLETS)?;
            if wallets.get(wallet.id.as_str())?.is_some() {
                return Err(TxDbError::Duplicate("wallet".into()));
            }

            wallets.insert(wallet.id.as_str(), json.as_slice())?;
            emails.insert(email.as_str(), wallet.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> TxDbResult<Option<StoredWallet>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WALLETS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_by_email(&self, email: &str) -> TxDbResult<Option<StoredWallet>> {
        let id = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(WALLET_EMAILS)?;
            match table.get(email_key(email).as_str())? {
                Some(value) => value.value().to_string(),
                None => return Ok(None),
            }
        };
        self.get_by_id(&id)
    }

    pub fn find(&self, filter: &WalletFilter) -> TxDbResult<StoredWallet> {
        let found = match (&filter.id, &filter.email) {
            (Some(id), _) => self.get_by_id(id)?.filter(|w| {
                filter
                    .email
                    .as_deref()
                    .is_none_or(|e| email_key(e) == email_key(&w.owner_email))
            }),
            (None, Some(email)) => self.get_by_email(email)?,
            (None, None) => None,
        };
        found.ok_or_else(|| TxDbError::NotFound("wallet".into()))
    }

    /// Apply a partial update. Returns the stored wallet after the write.
    pub fn apply_update(&self, id: &str, update: WalletUpdate) -> TxDbResult<StoredWallet> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(WALLETS)?;

            let mut wallet: StoredWallet = {
                let existing = table
                    .get(id)?
                    .ok_or_else(|| TxDbError::NotFound("wallet".into()))?;
                serde_json::from_slice(existing.value())?
            };

            if let Some(address) = update.btc_address {
                wallet.btc_address = address;
            }
            if let Some(address) = update.eth_address {
                wallet.eth_address = address;
            }
            if let Some(address) = update.trx_address {
                wallet.trx_address = address;
            }
            wallet.updated_at = Utc::now();

            let json = serde_json::to_vec(&wallet)?;
            table.insert(id, json.as_slice())?;
            wallet
        };
        write_txn.commit()?;
        Ok(updated)
    }
}

#[async_trait]
impl WalletStore for WalletDatabase {
    async fn add(&self, wallet: Wallet, key: &str) -> Result<Wallet, WalletError> {
        let stored = StoredWallet::seal(&wallet, key)?;
        let db = self.clone();
        run_blocking(move || db.insert(&stored)).await?;

        tracing::info!(wallet_id = %wallet.id, "Wallet stored");
        Ok(wallet)
    }

    async fn get(&self, filter: &WalletFilter, key: &str) -> Result<Wallet, WalletError> {
        let (db, filter) = (self.clone(), filter.clone());
        let stored = run_blocking(move || db.find(&filter)).await?;
        stored.open(key)
    }

    async fn update(&self, id: &str, update: WalletUpdate) -> Result<WalletProfile, WalletError> {
        let (db, id) = (self.clone(), id.to_string());
        let stored = run_blocking(move || db.apply_update(&id, update)).await?;
        Ok(stored.profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";
    const MNEMONIC: &str =
        "yellow dolphin robot express road develop repair neutral rate tide economy section";

    fn temp_db() -> (WalletDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = WalletDatabase::open(&dir.path().join("wallets.redb")).unwrap();
        (db, dir)
    }

    fn sample_wallet(id: &str, email: &str) -> Wallet {
        let now = Utc::now();
        Wallet {
            id: id.into(),
            owner_email: email.into(),
            mnemonic: MNEMONIC.into(),
            btc_address: "myAJasLvCqJJLkW2WzGr3S6Xkp4GKMTGPa".into(),
            eth_address: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".into(),
            trx_address: "TNjq63hm9JfqQYRRwVAtS84PRy1Ty6CU5U".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn add_and_get_decrypts_mnemonic() {
        let (db, _dir) = temp_db();
        db.add(sample_wallet("w1", "alice@example.com"), KEY).await.unwrap();

        let by_email = db
            .get(&WalletFilter::by_email("Alice@Example.com"), KEY)
            .await
            .unwrap();
        assert_eq!(by_email.id, "w1");
        assert_eq!(by_email.mnemonic, MNEMONIC);

        let by_id = db.get(&WalletFilter::by_id("w1"), KEY).await.unwrap();
        assert_eq!(by_id.owner_email, "alice@example.com");
    }

    #[tokio::test]
    async fn mnemonic_is_sealed_at_rest() {
        let (db, _dir) = temp_db();
        db.add(sample_wallet("w1", "alice@example.com"), KEY).await.unwrap();

        let stored = db.get_by_id("w1").unwrap().unwrap();
        assert!(!stored.sealed_mnemonic.contains("dolphin"));
        assert!(matches!(
            db.get(&WalletFilter::by_id("w1"), "fedcba9876543210fedcba9876543210").await,
            Err(WalletError::Crypto(_))
        ));
    }

    #[tokio::test]
    async fn second_wallet_for_same_email_is_rejected() {
        let (db, _dir) = temp_db();
        db.add(sample_wallet("w1", "alice@example.com"), KEY).await.unwrap();

        let err = db
            .add(sample_wallet("w2", "ALICE@example.com"), KEY)
            .await
            .unwrap_err();
        assert_eq!(err, WalletError::Duplicate("wallet".into()));
        assert_eq!(err.to_string(), "wallet already exist");
        assert!(db.get_by_id("w2").unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_wallet_is_not_found() {
        let (db, _dir) = temp_db();
        assert!(matches!(
            db.get(&WalletFilter::by_email("nobody@example.com"), KEY).await,
            Err(WalletError::NotFound(_))
        ));
        assert!(matches!(
            db.get(&WalletFilter::default(), KEY).await,
            Err(WalletError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let (db, _dir) = temp_db();
        db.add(sample_wallet("w1", "alice@example.com"), KEY).await.unwrap();

        let profile = db
            .update(
                "w1",
                WalletUpdate {
                    trx_address: Some("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(profile.trx_address, "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t");
        assert_eq!(profile.btc_address, "myAJasLvCqJJLkW2WzGr3S6Xkp4GKMTGPa");

        assert!(matches!(
            db.update("w9", WalletUpdate::default()).await,
            Err(WalletError::NotFound(_))
        ));
    }
}
