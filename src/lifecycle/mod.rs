// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Lifecycle Manager
//!
//! Wallet creation, sends, inbound Bitcoin webhooks and the confirmation
//! trackers, over the chain and store traits.
//!
//! ## Send Flow
//!
//! ```text
//! validated → wallet-loaded → keys-derived → signed-and-broadcast
//!           → persisted-pending → tracking
//! ```
//!
//! Ethereum and Tron sends are followed by a confirmation tracker spawned on
//! the [`TaskSupervisor`]. Bitcoin confirmation arrives through the
//! BlockCypher hook, which is registered in the background after the send.
//!
//! ## Resumption
//!
//! [`LifecycleManager::resume_tracking`] re-spawns trackers for every pending
//! Ethereum and Tron record at startup.

mod send;
pub mod tracker;
mod wallets;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing::info;

use crate::blockchain::{BitcoinService, EthereumService, TronService};
use crate::config::TrackingConfig;
use crate::error::WalletError;
use crate::models::{Chain, Transaction};
use crate::storage::{TransactionStore, WalletStore};
use crate::tasks::TaskSupervisor;

use self::tracker::{EthTracker, TronTracker};

/// Chain clients, one per supported chain.
#[derive(Clone)]
pub struct ChainServices {
    pub bitcoin: Arc<dyn BitcoinService>,
    pub ethereum: Arc<dyn EthereumService>,
    pub tron: Arc<dyn TronService>,
}

/// Transaction stores, one per supported chain.
#[derive(Clone)]
pub struct TransactionStores {
    pub bitcoin: Arc<dyn TransactionStore>,
    pub ethereum: Arc<dyn TransactionStore>,
    pub tron: Arc<dyn TransactionStore>,
}

impl TransactionStores {
    pub fn for_chain(&self, chain: Chain) -> &Arc<dyn TransactionStore> {
        match chain {
            Chain::Bitcoin => &self.bitcoin,
            Chain::Ethereum => &self.ethereum,
            Chain::Tron => &self.tron,
        }
    }
}

/// Settings the manager needs beyond its collaborators.
#[derive(Clone)]
pub struct LifecycleSettings {
    /// AES key used to seal and open mnemonics
    pub seed_phrase_key: String,
    pub bitcoin_network: bitcoin::Network,
    pub tracking: TrackingConfig,
}

pub struct LifecycleManager {
    chains: ChainServices,
    stores: TransactionStores,
    wallets: Arc<dyn WalletStore>,
    settings: LifecycleSettings,
    supervisor: TaskSupervisor,
}

impl LifecycleManager {
    pub fn new(
        chains: ChainServices,
        stores: TransactionStores,
        wallets: Arc<dyn WalletStore>,
        settings: LifecycleSettings,
        supervisor: TaskSupervisor,
    ) -> Self {
        Self {
            chains,
            stores,
            wallets,
            settings,
            supervisor,
        }
    }

    pub fn chains(&self) -> &ChainServices {
        &self.chains
    }

    pub fn stores(&self) -> &TransactionStores {
        &self.stores
    }

    pub fn supervisor(&self) -> &TaskSupervisor {
        &self.supervisor
    }

    pub fn tracking(&self) -> &TrackingConfig {
        &self.settings.tracking
    }

    /// Look a stored transaction up by chain token and native id.
    pub async fn get_transaction(&self, token_symbol: &str, id: &str) -> Result<Transaction, WalletError> {
        let chain = Chain::from_token_symbol(token_symbol)?;
        if id.trim().is_empty() {
            return Err(WalletError::validation("transaction id required"));
        }
        self.stores
            .for_chain(chain)
            .get(&crate::models::TransactionFilter::by_id(id.trim()))
            .await
    }

    // =========================================================================
    // Trackers
    // =========================================================================

    /// Track an Ethereum transaction until it is final.
    pub fn spawn_eth_tracker(&self, hash: String) {
        let tracker = EthTracker::new(
            self.chains.ethereum.clone(),
            self.stores.ethereum.clone(),
            &self.settings.tracking,
        );
        self.supervisor
            .spawn(format!("eth-tracker:{hash}"), move |token| tracker.run(hash, token));
    }

    /// Track a Tron transfer until it shows in the sender's confirmed history.
    pub fn spawn_tron_tracker(&self, tx: Transaction) {
        let tracker = TronTracker::new(
            self.chains.tron.clone(),
            self.stores.tron.clone(),
            &self.settings.tracking,
        );
        self.supervisor
            .spawn(format!("trx-tracker:{}", tx.id), move |token| tracker.run(tx, token));
    }

    /// Re-spawn trackers for every pending Ethereum and Tron record.
    ///
    /// Returns the number of trackers started.
    pub async fn resume_tracking(&self) -> Result<usize, WalletError> {
        let eth_pending = self.stores.ethereum.list_pending().await?;
        let trx_pending = self.stores.tron.list_pending().await?;
        let resumed = eth_pending.len() + trx_pending.len();

        for tx in eth_pending {
            self.spawn_eth_tracker(tx.id);
        }
        for tx in trx_pending {
            self.spawn_tron_tracker(tx);
        }

        info!(resumed, "Resumed confirmation tracking");
        Ok(resumed)
    }
}
