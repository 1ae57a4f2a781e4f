// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Address Watchers
//!
//! Inbound transfer detection for wallet addresses.
//!
//! - **Ethereum**: addresses are appended to a TTL'd list in the
//!   [`ListCache`] under [`ETH_WATCH_KEY`]. One subscription loop per process
//!   matches pending transactions against that list and hands hits to the
//!   Ethereum confirmation tracker. The loop exits once the list expires.
//! - **Tron**: every trigger starts a bounded polling loop over the address's
//!   confirmed inbound history.
//!
//! ## Loop Gating
//!
//! The Ethereum loop is guarded by a compare-and-swap flag in the
//! [`WatchRegistry`]. Concurrent triggers start at most one loop.

pub mod eth;
pub mod tron;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::WalletError;
use crate::lifecycle::LifecycleManager;
use crate::models::Chain;
use crate::storage::ListCache;

use self::eth::EthWatcher;
use self::tron::TronWatcher;

/// Cache key of the Ethereum watch list.
pub const ETH_WATCH_KEY: &str = "eth-watch-addresses";

/// Result of a watch trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct WatchOutcome {
    pub chain: Chain,
    pub address: String,
    /// `true` when this trigger started a new watcher loop
    pub watcher_started: bool,
}

// =============================================================================
// Registry
// =============================================================================

/// Shared watch list plus the per-process loop guard.
pub struct WatchRegistry {
    cache: Arc<dyn ListCache>,
    ttl: Duration,
    eth_running: AtomicBool,
}

impl WatchRegistry {
    pub fn new(cache: Arc<dyn ListCache>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            eth_running: AtomicBool::new(false),
        }
    }

    /// Add `address` to the Ethereum watch list and refresh its TTL.
    ///
    /// Returns `true` if the caller claimed the loop and must start it.
    pub async fn register_eth(&self, address: &str) -> Result<bool, WalletError> {
        let len = self
            .cache
            .set_list(ETH_WATCH_KEY, &address.to_lowercase(), self.ttl)
            .await?;
        debug!(address = %address, watched = len, "Ethereum address registered");
        Ok(self.claim_eth())
    }

    /// Watched addresses, lowercase, deduplicated.
    pub async fn watched_eth(&self) -> Result<HashSet<String>, WalletError> {
        let list = self.cache.get_list(ETH_WATCH_KEY).await?;
        Ok(list.into_iter().map(|a| a.to_lowercase()).collect())
    }

    pub fn claim_eth(&self) -> bool {
        self.eth_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release_eth(&self) {
        self.eth_running.store(false, Ordering::Release);
    }

    pub fn eth_running(&self) -> bool {
        self.eth_running.load(Ordering::Acquire)
    }
}

// =============================================================================
// Engine
// =============================================================================

pub struct WatcherEngine {
    lifecycle: Arc<LifecycleManager>,
    registry: Arc<WatchRegistry>,
    /// Tron addresses with a live polling loop
    tron_active: Arc<Mutex<HashSet<String>>>,
}

impl WatcherEngine {
    pub fn new(lifecycle: Arc<LifecycleManager>, cache: Arc<dyn ListCache>) -> Self {
        let ttl = lifecycle.tracking().watch_ttl;
        Self {
            lifecycle,
            registry: Arc::new(WatchRegistry::new(cache, ttl)),
            tron_active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    /// Dispatch on a token symbol.
    pub async fn trigger(&self, token_symbol: &str, email: &str) -> Result<WatchOutcome, WalletError> {
        match Chain::from_token_symbol(token_symbol)? {
            Chain::Ethereum => self.trigger_watcher_eth(email).await,
            Chain::Tron => self.trigger_watcher_trx(email).await,
            Chain::Bitcoin => Err(WalletError::validation(
                "bitcoin is watched through confirmation hooks",
            )),
        }
    }

    /// Watch the owner's Ethereum address, starting the loop if none runs.
    pub async fn trigger_watcher_eth(&self, email: &str) -> Result<WatchOutcome, WalletError> {
        let profile = self.lifecycle.wallet_profile(email).await?;
        let started = self.registry.register_eth(&profile.eth_address).await?;

        if started {
            let watcher = EthWatcher::new(self.lifecycle.clone(), self.registry.clone());
            self.lifecycle
                .supervisor()
                .spawn("eth-watcher", move |token| watcher.run(token));
            info!(address = %profile.eth_address, "Ethereum watcher started");
        }

        Ok(WatchOutcome {
            chain: Chain::Ethereum,
            address: profile.eth_address,
            watcher_started: started,
        })
    }

    /// Poll the owner's Tron address for inbound transfers for a bounded time.
    pub async fn trigger_watcher_trx(&self, email: &str) -> Result<WatchOutcome, WalletError> {
        let profile = self.lifecycle.wallet_profile(email).await?;
        let address = profile.trx_address;

        let claimed = self
            .tron_active
            .lock()
            .map_err(|_| WalletError::Storage("watcher lock poisoned".into()))?
            .insert(address.clone());

        if claimed {
            let watcher = TronWatcher::new(
                self.lifecycle.chains().tron.clone(),
                self.lifecycle.stores().tron.clone(),
                self.lifecycle.tracking(),
            );
            let active = self.tron_active.clone();
            let watched = address.clone();
            self.lifecycle
                .supervisor()
                .spawn(format!("trx-watcher:{address}"), move |token| async move {
                    let result = watcher.run(&watched, token).await;
                    if let Ok(mut active) = active.lock() {
                        active.remove(&watched);
                    }
                    result
                });
            info!(address = %address, "Tron watcher started");
        } else {
            debug!(address = %address, "Tron watcher already running");
        }

        Ok(WatchOutcome {
            chain: Chain::Tron,
            address,
            watcher_started: claimed,
        })
    }
}
