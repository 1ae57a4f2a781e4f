// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ethereum watcher: one pending-transaction subscription per process.
//!
//! ```text
//! subscribe ──► pending tx ──► `to` watched? ──► seen before? ──► spawn tracker
//!     ▲
//!     └── backoff ◄── stream error / end
//! ```
//!
//! The watch list is re-read from the cache at most every
//! [`REFRESH_INTERVAL`]. When it is found empty the loop releases the guard
//! and exits, unless a registration raced in and the guard can be re-claimed.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use lru::LruCache;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::WatchRegistry;
use crate::blockchain::PendingTransaction;
use crate::error::WalletError;
use crate::lifecycle::LifecycleManager;
use crate::tasks::sleep_or_cancel;

/// Minimum time between two reads of the watch list.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Delay before resubscribing after the subscription failed or ended.
pub const RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(5);

/// Recently tracked hashes remembered to avoid double tracking.
const SEEN_CAPACITY: usize = 4096;

pub struct EthWatcher {
    lifecycle: Arc<LifecycleManager>,
    registry: Arc<WatchRegistry>,
    watched: HashSet<String>,
    seen: LruCache<String, ()>,
}

impl EthWatcher {
    pub fn new(lifecycle: Arc<LifecycleManager>, registry: Arc<WatchRegistry>) -> Self {
        let capacity = NonZeroUsize::new(SEEN_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            lifecycle,
            registry,
            watched: HashSet::new(),
            seen: LruCache::new(capacity),
        }
    }

    /// Run until the watch list empties or `token` fires. The loop guard is
    /// released on every exit path.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), WalletError> {
        let result = self.watch(&token).await;
        self.registry.release_eth();
        info!("Ethereum watcher stopped");
        result
    }

    async fn watch(&mut self, token: &CancellationToken) -> Result<(), WalletError> {
        let service = self.lifecycle.chains().ethereum.clone();

        loop {
            if self.refresh().await && self.idle().await {
                return Ok(());
            }

            let mut stream = match service.subscribe_pending_transactions().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "Pending transaction subscription failed");
                    if !sleep_or_cancel(token, RESUBSCRIBE_BACKOFF).await {
                        return Ok(());
                    }
                    continue;
                }
            };
            debug!(watched = self.watched.len(), "Subscribed to pending transactions");

            let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    _ = ticker.tick() => {
                        if self.refresh().await && self.idle().await {
                            return Ok(());
                        }
                    }
                    next = stream.next() => match next {
                        Some(pending) => self.handle(pending),
                        None => {
                            warn!("Pending transaction subscription ended");
                            break;
                        }
                    },
                }
            }

            if !sleep_or_cancel(token, RESUBSCRIBE_BACKOFF).await {
                return Ok(());
            }
        }
    }

    /// Re-read the watch list. Returns `true` if it is empty. A cache error
    /// keeps the previous list.
    async fn refresh(&mut self) -> bool {
        match self.registry.watched_eth().await {
            Ok(watched) => self.watched = watched,
            Err(e) => warn!(error = %e, "Failed to read Ethereum watch list"),
        }
        self.watched.is_empty()
    }

    /// Release the guard on an empty list. Returns `true` if the loop should
    /// exit, `false` if a registration raced in and the guard was re-claimed.
    async fn idle(&mut self) -> bool {
        self.registry.release_eth();
        if self.refresh().await {
            return true;
        }
        if self.registry.claim_eth() {
            debug!("Watch registration raced the shutdown, continuing");
            return false;
        }
        // Another loop claimed the guard in between.
        true
    }

    fn handle(&mut self, pending: PendingTransaction) {
        let Some(to) = pending.to.as_deref() else {
            return;
        };
        if !self.watched.contains(&to.to_lowercase()) {
            return;
        }
        if self.seen.put(pending.hash.clone(), ()).is_some() {
            return;
        }

        info!(tx_hash = %pending.hash, to = %to, "Inbound Ethereum transaction sighted");
        self.lifecycle.spawn_eth_tracker(pending.hash);
    }
}
