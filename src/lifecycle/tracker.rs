// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Confirmation trackers.
//!
//! Both trackers run in two phases: a fast poll until the transaction is
//! mined, then a slow poll until it is final. In the slow phase up to
//! [`MAX_SLOW_POLL_ERRORS`] consecutive query errors are tolerated.
//!
//! Writes are upserts keyed on the transaction id. A tracker only writes when
//! confirmation rose past the last value it persisted or a terminal status
//! was reached, and it stops at the first terminal write.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blockchain::{from_millis, AccountTxQuery, EthereumService, TronService};
use crate::config::TrackingConfig;
use crate::error::WalletError;
use crate::models::{Transaction, TxStatus};
use crate::storage::TransactionStore;
use crate::tasks::sleep_or_cancel;

/// Consecutive slow-phase errors after which a tracker gives up.
pub const MAX_SLOW_POLL_ERRORS: u32 = 3;

/// Counts consecutive failures; any success resets it.
#[derive(Debug, Default)]
struct ErrorBudget {
    consecutive: u32,
}

impl ErrorBudget {
    fn success(&mut self) {
        self.consecutive = 0;
    }

    /// Record a failure. Returns the error once the budget is spent.
    fn failure(&mut self, err: WalletError, tx_id: &str) -> Result<(), WalletError> {
        self.consecutive += 1;
        if self.consecutive >= MAX_SLOW_POLL_ERRORS {
            return Err(err);
        }
        warn!(
            tx_id = %tx_id,
            error = %err,
            attempt = self.consecutive,
            "Confirmation poll failed, retrying"
        );
        Ok(())
    }
}

// =============================================================================
// Ethereum
// =============================================================================

pub struct EthTracker {
    service: Arc<dyn EthereumService>,
    store: Arc<dyn TransactionStore>,
    fast_poll: Duration,
    slow_poll: Duration,
}

impl EthTracker {
    pub fn new(
        service: Arc<dyn EthereumService>,
        store: Arc<dyn TransactionStore>,
        timing: &TrackingConfig,
    ) -> Self {
        Self {
            service,
            store,
            fast_poll: timing.fast_poll,
            slow_poll: timing.slow_poll,
        }
    }

    pub async fn run(self, hash: String, token: CancellationToken) -> Result<(), WalletError> {
        // Phase 1: wait for the transaction to leave the mempool.
        let mined = loop {
            let lookup = self.service.get_transaction_pending(&hash).await?;
            if !lookup.is_pending {
                break lookup.transaction;
            }
            if !sleep_or_cancel(&token, self.fast_poll).await {
                return Ok(());
            }
        };
        debug!(tx_hash = %hash, "Ethereum transaction mined");

        // Phase 2: follow confirmation depth until the status is terminal.
        let mut budget = ErrorBudget::default();
        let mut persisted: Option<u64> = None;
        loop {
            match self.service.get_block_information(&hash).await {
                Ok(info) => {
                    budget.success();
                    let terminal = info.status.is_terminal();

                    if terminal || persisted.is_none_or(|last| info.confirmation > last) {
                        let mut record = mined.clone();
                        record.block = Some(info.block);
                        record.received_at = info.received_at;
                        record.confirmation = info.confirmation;
                        record.status = info.status;
                        if terminal {
                            record.completed_at = Some(Utc::now());
                        }
                        self.store.upsert(record).await?;
                        persisted = Some(info.confirmation);
                    }

                    if terminal {
                        info!(
                            tx_hash = %hash,
                            status = ?info.status,
                            confirmation = info.confirmation,
                            "Ethereum transaction final"
                        );
                        return Ok(());
                    }
                }
                Err(e) => budget.failure(e, &hash)?,
            }

            if !sleep_or_cancel(&token, self.slow_poll).await {
                return Ok(());
            }
        }
    }
}

// =============================================================================
// Tron
// =============================================================================

enum HistoryCheck {
    /// Still listed as unconfirmed outgoing
    Unconfirmed,
    /// In neither list yet
    Missing,
    Confirmed { head: u64 },
}

pub struct TronTracker {
    service: Arc<dyn TronService>,
    store: Arc<dyn TransactionStore>,
    fast_poll: Duration,
    slow_poll: Duration,
}

impl TronTracker {
    pub fn new(
        service: Arc<dyn TronService>,
        store: Arc<dyn TransactionStore>,
        timing: &TrackingConfig,
    ) -> Self {
        Self {
            service,
            store,
            fast_poll: timing.fast_poll,
            slow_poll: timing.slow_poll,
        }
    }

    async fn check_history(
        &self,
        sender: &str,
        tx_id: &str,
        unconfirmed: &AccountTxQuery,
        confirmed: &AccountTxQuery,
    ) -> Result<HistoryCheck, WalletError> {
        let page = self
            .service
            .get_tx_by_account_address(sender, unconfirmed)
            .await?;
        if page.contains(tx_id) {
            return Ok(HistoryCheck::Unconfirmed);
        }

        let page = self
            .service
            .get_tx_by_account_address(sender, confirmed)
            .await?;
        if !page.contains(tx_id) {
            return Ok(HistoryCheck::Missing);
        }

        let head = self.service.get_current_block().await?;
        Ok(HistoryCheck::Confirmed { head })
    }

    /// Track `tx`, a pending record carrying the sender address.
    pub async fn run(self, mut tx: Transaction, token: CancellationToken) -> Result<(), WalletError> {
        let sender = tx
            .sender_address
            .first()
            .cloned()
            .ok_or_else(|| WalletError::validation("tron transaction without sender"))?;

        // Phase 1: wait for execution info.
        let info = loop {
            match self.service.get_tx(&tx.id).await {
                Ok(info) => break info,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            if !sleep_or_cancel(&token, self.fast_poll).await {
                return Ok(());
            }
        };

        let head = self.service.get_current_block().await?;
        tx.fee = Some(u128::from(info.fee));
        tx.received_at = from_millis(info.block_timestamp);
        tx.block = Some(info.block_number);
        tx.confirmation = head.saturating_sub(info.block_number);
        let mut persisted = self.store.upsert(tx.clone()).await?.confirmation;
        debug!(tx_id = %tx.id, block = info.block_number, "Tron transaction included");

        // Phase 2: wait for the transfer to show in confirmed history.
        let unconfirmed = AccountTxQuery {
            only_unconfirmed: true,
            only_from: true,
            ..Default::default()
        };
        let confirmed = AccountTxQuery {
            only_confirmed: true,
            only_from: true,
            ..Default::default()
        };

        let mut budget = ErrorBudget::default();
        let mut wait = self.slow_poll;
        loop {
            if !sleep_or_cancel(&token, wait).await {
                return Ok(());
            }
            wait = self.slow_poll;

            match self.check_history(&sender, &tx.id, &unconfirmed, &confirmed).await {
                Ok(HistoryCheck::Unconfirmed) => {
                    budget.success();
                    wait = self.fast_poll;
                }
                Ok(HistoryCheck::Missing) => budget.success(),
                Ok(HistoryCheck::Confirmed { head }) => {
                    tx.confirmation = head.saturating_sub(info.block_number);
                    tx.status = TxStatus::Success;
                    tx.completed_at = Some(Utc::now());
                    let stored = self.store.upsert(tx.clone()).await?;
                    persisted = persisted.max(stored.confirmation);
                    info!(
                        tx_id = %tx.id,
                        confirmation = persisted,
                        "Tron transaction final"
                    );
                    return Ok(());
                }
                Err(e) => budget.failure(e, &tx.id)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::blockchain::{BlockInformation, TronTxInfo};

    fn timing() -> TrackingConfig {
        TrackingConfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn eth_tracker_writes_once_at_terminal_depth() {
        let eth = Arc::new(FakeEthereum::new());
        eth.set_pending_polls(2);
        eth.push_block_info(Ok(BlockInformation {
            block: 100,
            received_at: None,
            confirmation: 13,
            status: TxStatus::Success,
        }));
        let store = Arc::new(MemoryTxStore::default());

        EthTracker::new(eth.clone(), store.clone(), &timing())
            .run("0xabc".into(), CancellationToken::new())
            .await
            .unwrap();

        let upserts = store.upserts();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].status, TxStatus::Success);
        assert!(upserts[0].confirmation > 12);
        assert_eq!(upserts[0].block, Some(100));
        assert!(upserts[0].completed_at.is_some());
        assert_eq!(eth.lookups(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn eth_tracker_persists_only_rising_confirmation() {
        let eth = Arc::new(FakeEthereum::new());
        for (confirmation, status) in [
            (3, TxStatus::Pending),
            (3, TxStatus::Pending),
            (8, TxStatus::Pending),
            (14, TxStatus::Failed),
        ] {
            eth.push_block_info(Ok(BlockInformation {
                block: 50,
                received_at: None,
                confirmation,
                status,
            }));
        }
        let store = Arc::new(MemoryTxStore::default());

        EthTracker::new(eth, store.clone(), &timing())
            .run("0xdef".into(), CancellationToken::new())
            .await
            .unwrap();

        let confirmations: Vec<_> = store.upserts().iter().map(|tx| tx.confirmation).collect();
        assert_eq!(confirmations, vec![3, 8, 14]);
        assert_eq!(store.stored("0xdef").unwrap().status, TxStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn eth_tracker_gives_up_after_consecutive_errors() {
        let eth = Arc::new(FakeEthereum::new());
        for _ in 0..MAX_SLOW_POLL_ERRORS {
            eth.push_block_info(Err(WalletError::chain_unavailable("timeout")));
        }
        let store = Arc::new(MemoryTxStore::default());

        let result = EthTracker::new(eth, store.clone(), &timing())
            .run("0x123".into(), CancellationToken::new())
            .await;

        assert!(matches!(result, Err(WalletError::ChainUnavailable(_))));
        assert!(store.upserts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn eth_tracker_tolerates_transient_errors() {
        let eth = Arc::new(FakeEthereum::new());
        eth.push_block_info(Err(WalletError::chain_unavailable("timeout")));
        eth.push_block_info(Err(WalletError::chain_unavailable("timeout")));
        eth.push_block_info(Ok(BlockInformation {
            block: 1,
            received_at: None,
            confirmation: 20,
            status: TxStatus::Success,
        }));
        let store = Arc::new(MemoryTxStore::default());

        EthTracker::new(eth, store.clone(), &timing())
            .run("0x456".into(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.upserts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn eth_tracker_lookup_error_ends_task() {
        let eth = Arc::new(FakeEthereum::new());
        eth.fail_lookups();
        let store = Arc::new(MemoryTxStore::default());

        let result = EthTracker::new(eth, store.clone(), &timing())
            .run("0x789".into(), CancellationToken::new())
            .await;
        assert!(result.is_err());
        assert!(store.upserts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tron_tracker_follows_inclusion_then_history() {
        let tron = Arc::new(FakeTron::new());
        tron.set_head(120);
        tron.set_tx_info(
            TronTxInfo {
                id: "t1".into(),
                fee: 1_100,
                block_number: 100,
                block_timestamp: 1_700_000_000_000,
            },
            2,
        );
        tron.set_unconfirmed_polls(1);
        let store = Arc::new(MemoryTxStore::default());

        let tx = Transaction::pending("t1", TRX_SENDER, TRX_RECEIVER, 5_000_000);
        TronTracker::new(tron.clone(), store.clone(), &timing())
            .run(tx, CancellationToken::new())
            .await
            .unwrap();

        let upserts = store.upserts();
        assert_eq!(upserts.len(), 2);
        assert_eq!(upserts[0].status, TxStatus::Pending);
        assert_eq!(upserts[0].fee, Some(1_100));
        assert_eq!(upserts[0].block, Some(100));
        assert_eq!(upserts[0].confirmation, 20);
        assert_eq!(
            upserts[0].received_at.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(upserts[1].status, TxStatus::Success);
        assert!(upserts[1].completed_at.is_some());
        assert_eq!(tron.tx_info_polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn tron_tracker_stops_on_cancel() {
        let tron = Arc::new(FakeTron::new());
        let store = Arc::new(MemoryTxStore::default());
        let token = CancellationToken::new();

        let tx = Transaction::pending("missing", TRX_SENDER, TRX_RECEIVER, 1);
        let handle = tokio::spawn(
            TronTracker::new(tron, store.clone(), &timing()).run(tx, token.clone()),
        );
        tokio::time::sleep(Duration::from_secs(30)).await;
        token.cancel();

        assert!(handle.await.unwrap().is_ok());
        assert!(store.upserts().is_empty());
    }
}
