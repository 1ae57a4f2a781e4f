// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory fakes of the chain and store traits, recording their calls.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;

use super::{ChainServices, LifecycleManager, LifecycleSettings, TransactionStores};
use crate::blockchain::btc::transaction_from_bcy;
use crate::blockchain::eth::is_valid_address;
use crate::blockchain::hd::tron_decode_base58check;
use crate::blockchain::{
    AccountTxPage, AccountTxQuery, BcyHook, BcyTx, BitcoinService, BlockInformation, BtcHdWallet,
    EthHdWallet, EthereumService, PendingLookup, PendingTransaction, PendingTxStream, TronService,
    TronTxInfo, TrxHdWallet, AccountTx,
};
use crate::config::TrackingConfig;
use crate::error::WalletError;
use crate::models::{
    Transaction, TransactionFilter, TxStatus, Wallet, WalletFilter, WalletProfile, WalletUpdate,
};
use crate::storage::{TransactionStore, WalletStore};
use crate::tasks::TaskSupervisor;

pub const ALICE: &str = "alice@example.com";
pub const MNEMONIC: &str =
    "yellow dolphin robot express road develop repair neutral rate tide economy section";
pub const SEED_KEY: &str = "0123456789abcdef0123456789abcdef";

pub const BTC_RECEIVER: &str = "myAJasLvCqJJLkW2WzGr3S6Xkp4GKMTGPa";
pub const ETH_SENDER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const ETH_RECEIVER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const TRX_SENDER: &str = "TNjq63hm9JfqQYRRwVAtS84PRy1Ty6CU5U";
pub const TRX_RECEIVER: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

// =============================================================================
// Stores
// =============================================================================

/// Transaction store applying the same merge rules as the redb store.
#[derive(Default)]
pub struct MemoryTxStore {
    records: Mutex<HashMap<String, Transaction>>,
    upserts: Mutex<Vec<Transaction>>,
}

impl MemoryTxStore {
    pub fn upserts(&self) -> Vec<Transaction> {
        lock(&self.upserts).clone()
    }

    pub fn stored(&self, id: &str) -> Option<Transaction> {
        lock(&self.records).get(id).cloned()
    }
}

#[async_trait]
impl TransactionStore for MemoryTxStore {
    async fn add(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        let mut records = lock(&self.records);
        if records.contains_key(&tx.id) {
            return Err(WalletError::Duplicate("transaction".into()));
        }
        records.insert(tx.id.clone(), tx.clone());
        Ok(tx)
    }

    async fn update(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        let mut records = lock(&self.records);
        let stored = records
            .get(&tx.id)
            .ok_or_else(|| WalletError::not_found("transaction"))?;
        let merged = tx.merged_over(stored);
        records.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }

    async fn upsert(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        lock(&self.upserts).push(tx.clone());
        let mut records = lock(&self.records);
        let merged = match records.get(&tx.id) {
            Some(stored) => tx.merged_over(stored),
            None => tx,
        };
        records.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }

    async fn get(&self, filter: &TransactionFilter) -> Result<Transaction, WalletError> {
        lock(&self.records)
            .values()
            .find(|tx| filter.matches(tx))
            .cloned()
            .ok_or_else(|| WalletError::not_found("transaction"))
    }

    async fn list_pending(&self) -> Result<Vec<Transaction>, WalletError> {
        Ok(lock(&self.records)
            .values()
            .filter(|tx| tx.status == TxStatus::Pending)
            .cloned()
            .collect())
    }
}

/// Wallet store keyed by lowercase email. The key argument is ignored.
#[derive(Default)]
pub struct MemoryWalletStore {
    wallets: Mutex<HashMap<String, Wallet>>,
}

impl MemoryWalletStore {
    pub fn stored(&self, email: &str) -> Option<Wallet> {
        lock(&self.wallets).get(&email.to_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.wallets).len()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn add(&self, wallet: Wallet, _key: &str) -> Result<Wallet, WalletError> {
        let mut wallets = lock(&self.wallets);
        let email = wallet.owner_email.to_lowercase();
        if wallets.contains_key(&email) {
            return Err(WalletError::Duplicate("wallet".into()));
        }
        wallets.insert(email, wallet.clone());
        Ok(wallet)
    }

    async fn get(&self, filter: &WalletFilter, _key: &str) -> Result<Wallet, WalletError> {
        let wallets = lock(&self.wallets);
        let found = match (&filter.id, &filter.email) {
            (_, Some(email)) => wallets.get(&email.to_lowercase()),
            (Some(id), None) => wallets.values().find(|w| &w.id == id),
            (None, None) => None,
        };
        found.cloned().ok_or_else(|| WalletError::not_found("wallet"))
    }

    async fn update(&self, id: &str, update: WalletUpdate) -> Result<WalletProfile, WalletError> {
        let mut wallets = lock(&self.wallets);
        let wallet = wallets
            .values_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| WalletError::not_found("wallet"))?;
        if let Some(address) = update.btc_address {
            wallet.btc_address = address;
        }
        if let Some(address) = update.eth_address {
            wallet.eth_address = address;
        }
        if let Some(address) = update.trx_address {
            wallet.trx_address = address;
        }
        Ok(wallet.profile())
    }
}

// =============================================================================
// Chains
// =============================================================================

#[derive(Default)]
pub struct FakeBitcoin {
    balance: AtomicU64,
    sends: AtomicUsize,
    hooks: Mutex<Vec<String>>,
}

impl FakeBitcoin {
    pub fn set_balance(&self, sat: u64) {
        self.balance.store(sat, Ordering::SeqCst);
    }

    pub fn hooks(&self) -> Vec<String> {
        lock(&self.hooks).clone()
    }
}

#[async_trait]
impl BitcoinService for FakeBitcoin {
    fn check_address(&self, address: &str) -> Result<bool, WalletError> {
        Ok(address.starts_with(['m', 'n', '2']) || address.starts_with("tb1"))
    }

    async fn get_balance(&self, _address: &str) -> Result<u128, WalletError> {
        Ok(u128::from(self.balance.load(Ordering::SeqCst)))
    }

    async fn get_tx(&self, _hash: &str) -> Result<Transaction, WalletError> {
        Err(WalletError::not_found("transaction"))
    }

    async fn get_current_block(&self) -> Result<u64, WalletError> {
        Ok(2_500_000)
    }

    async fn send_tx(
        &self,
        wallet: &BtcHdWallet,
        to: &str,
        amount: u128,
    ) -> Result<Transaction, WalletError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(Transaction::pending(format!("btc-{n}"), wallet.address.clone(), to, amount))
    }

    async fn create_confirmation_hook(&self, address: &str) -> Result<BcyHook, WalletError> {
        lock(&self.hooks).push(address.to_string());
        Ok(BcyHook {
            id: Some("hook-1".into()),
            event: "tx-confirmation".into(),
            address: Some(address.to_string()),
            url: "https://wallet.example.com/v1/btc/webhook/transaction".into(),
            confirmations: Some(6),
        })
    }

    fn transaction_from_payload(&self, payload: &BcyTx) -> Transaction {
        transaction_from_bcy(payload, 6)
    }
}

/// Ethereum fake: lookups report `pending` a configurable number of times,
/// then mined; block information is served from a queue.
#[derive(Default)]
pub struct FakeEthereum {
    balance: Mutex<u128>,
    pending_polls: AtomicUsize,
    fail_lookups: std::sync::atomic::AtomicBool,
    lookups: Mutex<Vec<String>>,
    block_infos: Mutex<VecDeque<Result<BlockInformation, WalletError>>>,
    sends: AtomicUsize,
    subscribes: AtomicUsize,
    feed: Mutex<Vec<PendingTransaction>>,
}

impl FakeEthereum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, wei: u128) {
        *lock(&self.balance) = wei;
    }

    pub fn set_pending_polls(&self, polls: usize) {
        self.pending_polls.store(polls, Ordering::SeqCst);
    }

    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }

    pub fn push_block_info(&self, info: Result<BlockInformation, WalletError>) {
        lock(&self.block_infos).push_back(info);
    }

    /// Pending transactions emitted by the next subscription.
    pub fn set_feed(&self, feed: Vec<PendingTransaction>) {
        *lock(&self.feed) = feed;
    }

    pub fn lookups(&self) -> usize {
        lock(&self.lookups).len()
    }

    pub fn lookups_for(&self, hash: &str) -> usize {
        lock(&self.lookups).iter().filter(|h| *h == hash).count()
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EthereumService for FakeEthereum {
    fn check_address(&self, address: &str) -> Result<bool, WalletError> {
        Ok(is_valid_address(address))
    }

    async fn get_balance(&self, _address: &str) -> Result<u128, WalletError> {
        Ok(*lock(&self.balance))
    }

    async fn get_current_block(&self) -> Result<u64, WalletError> {
        Ok(1_000)
    }

    async fn send_tx(
        &self,
        wallet: &EthHdWallet,
        to: &str,
        amount: u128,
    ) -> Result<Transaction, WalletError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        let mut tx = Transaction::pending(format!("0x{n:064x}"), wallet.address.clone(), to, amount);
        tx.fee = Some(21_000);
        Ok(tx)
    }

    async fn get_transaction_pending(&self, hash: &str) -> Result<PendingLookup, WalletError> {
        lock(&self.lookups).push(hash.to_string());
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(WalletError::not_found("transaction"));
        }

        let is_pending = self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(PendingLookup {
            transaction: Transaction::pending(hash, ETH_SENDER, ETH_RECEIVER, 1),
            is_pending,
        })
    }

    async fn get_block_information(&self, _hash: &str) -> Result<BlockInformation, WalletError> {
        lock(&self.block_infos)
            .pop_front()
            .unwrap_or_else(|| Err(WalletError::not_found("receipt")))
    }

    async fn subscribe_pending_transactions(&self) -> Result<PendingTxStream, WalletError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let feed = std::mem::take(&mut *lock(&self.feed));
        Ok(futures_util::stream::iter(feed)
            .chain(futures_util::stream::pending())
            .boxed())
    }
}

/// Tron fake. Execution info appears after a number of `NotFound` polls;
/// the tracked id stays in unconfirmed history for a number of polls and is
/// then reported confirmed. Inbound history pages are served from a queue.
#[derive(Default)]
pub struct FakeTron {
    balance: AtomicU64,
    head: AtomicU64,
    tx_info: Mutex<Option<TronTxInfo>>,
    not_found_polls: AtomicUsize,
    tx_info_polls: AtomicUsize,
    unconfirmed_polls: AtomicUsize,
    sends: AtomicUsize,
    send_error: Mutex<Option<WalletError>>,
    inbound: Mutex<VecDeque<Result<AccountTxPage, WalletError>>>,
    inbound_queries: Mutex<Vec<AccountTxQuery>>,
}

impl FakeTron {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, sun: u64) {
        self.balance.store(sun, Ordering::SeqCst);
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn set_tx_info(&self, info: TronTxInfo, not_found_polls: usize) {
        *lock(&self.tx_info) = Some(info);
        self.not_found_polls.store(not_found_polls, Ordering::SeqCst);
    }

    pub fn set_unconfirmed_polls(&self, polls: usize) {
        self.unconfirmed_polls.store(polls, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, err: WalletError) {
        *lock(&self.send_error) = Some(err);
    }

    pub fn push_inbound(&self, page: Result<AccountTxPage, WalletError>) {
        lock(&self.inbound).push_back(page);
    }

    pub fn inbound_queries(&self) -> Vec<AccountTxQuery> {
        lock(&self.inbound_queries).clone()
    }

    pub fn tx_info_polls(&self) -> usize {
        self.tx_info_polls.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    fn page_with(&self, tx_id: Option<String>) -> AccountTxPage {
        AccountTxPage {
            data: tx_id
                .map(|tx_id| AccountTx {
                    tx_id,
                    ..Default::default()
                })
                .into_iter()
                .collect(),
            success: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TronService for FakeTron {
    fn check_address(&self, address: &str) -> Result<bool, WalletError> {
        Ok(tron_decode_base58check(address).is_ok())
    }

    async fn get_balance(&self, _address: &str) -> Result<u128, WalletError> {
        Ok(u128::from(self.balance.load(Ordering::SeqCst)))
    }

    async fn get_tx(&self, _id: &str) -> Result<TronTxInfo, WalletError> {
        self.tx_info_polls.fetch_add(1, Ordering::SeqCst);
        let waiting = self
            .not_found_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        match lock(&self.tx_info).clone() {
            Some(info) if !waiting => Ok(info),
            _ => Err(WalletError::not_found("transaction info")),
        }
    }

    async fn get_current_block(&self) -> Result<u64, WalletError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn send_tx(
        &self,
        wallet: &TrxHdWallet,
        to: &str,
        amount: u128,
    ) -> Result<Transaction, WalletError> {
        if let Some(err) = lock(&self.send_error).clone() {
            return Err(err);
        }
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(Transaction::pending(format!("{n:064x}"), wallet.address.clone(), to, amount))
    }

    async fn get_tx_by_account_address(
        &self,
        _address: &str,
        query: &AccountTxQuery,
    ) -> Result<AccountTxPage, WalletError> {
        if query.only_to {
            lock(&self.inbound_queries).push(query.clone());
            return lock(&self.inbound)
                .pop_front()
                .unwrap_or_else(|| Ok(self.page_with(None)));
        }

        let tracked = lock(&self.tx_info).as_ref().map(|info| info.id.clone());
        if query.only_unconfirmed {
            let still_unconfirmed = self
                .unconfirmed_polls
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            return Ok(self.page_with(tracked.filter(|_| still_unconfirmed)));
        }
        Ok(self.page_with(tracked))
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct MemoryStores {
    pub bitcoin: Arc<MemoryTxStore>,
    pub ethereum: Arc<MemoryTxStore>,
    pub tron: Arc<MemoryTxStore>,
}

/// A [`LifecycleManager`] over fakes, with Alice's wallet already stored.
pub struct Harness {
    pub manager: Arc<LifecycleManager>,
    pub supervisor: TaskSupervisor,
    pub btc: Arc<FakeBitcoin>,
    pub eth: Arc<FakeEthereum>,
    pub tron: Arc<FakeTron>,
    pub wallets: Arc<MemoryWalletStore>,
    pub stores: MemoryStores,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tracking(TrackingConfig::default())
    }

    pub fn with_tracking(tracking: TrackingConfig) -> Self {
        let btc = Arc::new(FakeBitcoin::default());
        let eth = Arc::new(FakeEthereum::new());
        let tron = Arc::new(FakeTron::new());
        let wallets = Arc::new(MemoryWalletStore::default());
        let stores = MemoryStores {
            bitcoin: Arc::new(MemoryTxStore::default()),
            ethereum: Arc::new(MemoryTxStore::default()),
            tron: Arc::new(MemoryTxStore::default()),
        };

        let network = bitcoin::Network::Testnet;
        let alice = Wallet {
            id: "wallet-alice".into(),
            owner_email: ALICE.into(),
            mnemonic: MNEMONIC.into(),
            btc_address: BtcHdWallet::from_mnemonic(MNEMONIC, network)
                .map(|w| w.address)
                .unwrap(),
            eth_address: EthHdWallet::from_mnemonic(MNEMONIC).map(|w| w.address).unwrap(),
            trx_address: TRX_SENDER.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        lock(&wallets.wallets).insert(ALICE.into(), alice);

        let supervisor = TaskSupervisor::new();
        let manager = LifecycleManager::new(
            ChainServices {
                bitcoin: btc.clone(),
                ethereum: eth.clone(),
                tron: tron.clone(),
            },
            TransactionStores {
                bitcoin: stores.bitcoin.clone(),
                ethereum: stores.ethereum.clone(),
                tron: stores.tron.clone(),
            },
            wallets.clone(),
            LifecycleSettings {
                seed_phrase_key: SEED_KEY.into(),
                bitcoin_network: network,
                tracking,
            },
            supervisor.clone(),
        );

        Self {
            manager: Arc::new(manager),
            supervisor,
            btc,
            eth,
            tron,
            wallets,
            stores,
        }
    }
}
