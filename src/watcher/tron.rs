// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tron watcher: bounded polling of an address's confirmed inbound history.
//!
//! ## Cycle
//!
//! 1. Query confirmed `only_to` history ordered `block_timestamp,asc` from
//!    the cycle's start timestamp.
//! 2. Upsert every native transfer as `success`; advance the cursor past the
//!    newest `block_timestamp`.
//! 3. Follow `meta.fingerprint` immediately while there is one.
//! 4. On the last page sleep the idle interval and start a new cycle from
//!    the cursor.
//!
//! Any error drops the fingerprint and restarts the cycle after
//! [`ERROR_BACKOFF`]. The lifetime timeout and cancellation end the loop
//! wherever it is.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blockchain::hd::tron_hex_to_base58;
use crate::blockchain::{from_millis, AccountTx, AccountTxPage, AccountTxQuery, TronService};
use crate::config::TrackingConfig;
use crate::error::WalletError;
use crate::models::{Transaction, TxStatus};
use crate::storage::TransactionStore;
use crate::tasks::sleep_or_cancel;

/// Pause before a cycle restarts after an error.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

const ORDER_BY: &str = "block_timestamp,asc";

pub struct TronWatcher {
    service: Arc<dyn TronService>,
    store: Arc<dyn TransactionStore>,
    timeout: Duration,
    idle: Duration,
}

/// Where the next query starts.
#[derive(Debug)]
struct Cursor {
    /// `min_timestamp` of the current cycle
    cycle_start: i64,
    /// One past the newest transfer recorded so far
    next_start: i64,
    fingerprint: Option<String>,
}

impl TronWatcher {
    pub fn new(
        service: Arc<dyn TronService>,
        store: Arc<dyn TransactionStore>,
        timing: &TrackingConfig,
    ) -> Self {
        Self {
            service,
            store,
            timeout: timing.tron_watch_timeout,
            idle: timing.tron_watch_idle,
        }
    }

    pub async fn run(self, address: &str, token: CancellationToken) -> Result<(), WalletError> {
        tokio::select! {
            _ = self.poll(address, &token) => {}
            _ = tokio::time::sleep(self.timeout) => {
                info!(address = %address, "Tron watcher timed out");
            }
        }
        Ok(())
    }

    async fn poll(&self, address: &str, token: &CancellationToken) {
        let now = Utc::now().timestamp_millis();
        let mut cursor = Cursor {
            cycle_start: now,
            next_start: now,
            fingerprint: None,
        };

        loop {
            let query = AccountTxQuery {
                only_confirmed: true,
                only_to: true,
                order_by: Some(ORDER_BY.to_string()),
                min_timestamp: Some(cursor.cycle_start),
                fingerprint: cursor.fingerprint.take(),
                ..Default::default()
            };

            let wait = match self.page(address, &query).await {
                Ok((page, latest)) => {
                    if let Some(ts) = latest {
                        cursor.next_start = cursor.next_start.max(ts + 1);
                    }
                    match page.next_fingerprint() {
                        Some(fingerprint) => {
                            cursor.fingerprint = Some(fingerprint.to_string());
                            continue;
                        }
                        None => self.idle,
                    }
                }
                Err(e) => {
                    warn!(address = %address, error = %e, "Tron history poll failed");
                    ERROR_BACKOFF
                }
            };

            if !sleep_or_cancel(token, wait).await {
                debug!(address = %address, "Tron watcher cancelled");
                return;
            }
            cursor.cycle_start = cursor.next_start;
        }
    }

    /// Fetch one page and record its transfers. Returns the page and the
    /// newest block timestamp recorded.
    async fn page(
        &self,
        address: &str,
        query: &AccountTxQuery,
    ) -> Result<(AccountTxPage, Option<i64>), WalletError> {
        let page = self.service.get_tx_by_account_address(address, query).await?;

        let transfers: Vec<&AccountTx> = page
            .data
            .iter()
            .filter(|tx| tx.transfer().is_some() && tx.succeeded())
            .collect();
        if transfers.is_empty() {
            return Ok((page, None));
        }

        let head = self.service.get_current_block().await?;
        let mut latest = None;
        for item in transfers {
            let tx = inbound_transaction(item, head)?;
            self.store.upsert(tx).await?;
            latest = latest.max(Some(item.block_timestamp));
            debug!(tx_id = %item.tx_id, address = %address, "Inbound Tron transfer recorded");
        }
        Ok((page, latest))
    }
}

/// Confirmed inbound transfer as a final lifecycle record.
fn inbound_transaction(item: &AccountTx, head: u64) -> Result<Transaction, WalletError> {
    let transfer = item
        .transfer()
        .ok_or_else(|| WalletError::validation("not a transfer"))?;
    let at = from_millis(item.block_timestamp);

    Ok(Transaction {
        id: item.tx_id.clone(),
        sender_address: vec![tron_hex_to_base58(&transfer.owner_address)?],
        receiver_address: vec![tron_hex_to_base58(&transfer.to_address)?],
        amount: u128::from(transfer.amount),
        fee: Some(u128::from(item.net_fee)),
        block: Some(item.block_number),
        confirmation: head.saturating_sub(item.block_number),
        status: TxStatus::Success,
        received_at: at,
        completed_at: at,
        updated_at: Utc::now(),
    })
}
