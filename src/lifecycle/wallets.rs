// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet creation and lookups.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::LifecycleManager;
use crate::blockchain::hd::generate_mnemonic;
use crate::blockchain::{BtcHdWallet, EthHdWallet, TrxHdWallet};
use crate::error::WalletError;
use crate::models::{Wallet, WalletBalances, WalletFilter, WalletProfile};

impl LifecycleManager {
    /// Create the owner's wallet: a fresh mnemonic and its three addresses.
    ///
    /// `Duplicate("wallet")` if the owner already has one.
    pub async fn create_wallet(&self, email: &str) -> Result<WalletProfile, WalletError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(WalletError::validation("email required"));
        }

        match self.load_wallet(email).await {
            Ok(_) => return Err(WalletError::Duplicate("wallet".into())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let mnemonic = generate_mnemonic()?;
        let btc = BtcHdWallet::from_mnemonic(&mnemonic, self.settings.bitcoin_network)?;
        let eth = EthHdWallet::from_mnemonic(&mnemonic)?;
        let trx = TrxHdWallet::from_mnemonic(&mnemonic)?;

        let now = Utc::now();
        let wallet = Wallet {
            id: Uuid::new_v4().to_string(),
            owner_email: email.to_string(),
            mnemonic,
            btc_address: btc.address.clone(),
            eth_address: eth.address.clone(),
            trx_address: trx.address.clone(),
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .wallets
            .add(wallet, &self.settings.seed_phrase_key)
            .await?;

        info!(
            wallet_id = %stored.id,
            btc_address = %stored.btc_address,
            eth_address = %stored.eth_address,
            trx_address = %stored.trx_address,
            "Wallet created"
        );
        Ok(stored.profile())
    }

    /// Public view of the owner's wallet.
    pub async fn wallet_profile(&self, email: &str) -> Result<WalletProfile, WalletError> {
        Ok(self.load_wallet(email).await?.profile())
    }

    /// Native balances on all three chains, queried concurrently.
    pub async fn balances(&self, email: &str) -> Result<WalletBalances, WalletError> {
        let wallet = self.load_wallet(email).await?;
        let (btc, eth, trx) = tokio::try_join!(
            self.chains.bitcoin.get_balance(&wallet.btc_address),
            self.chains.ethereum.get_balance(&wallet.eth_address),
            self.chains.tron.get_balance(&wallet.trx_address),
        )?;
        Ok(WalletBalances { btc, eth, trx })
    }

    pub(super) async fn load_wallet(&self, email: &str) -> Result<Wallet, WalletError> {
        self.wallets
            .get(
                &WalletFilter::by_email(email.trim()),
                &self.settings.seed_phrase_key,
            )
            .await
    }
}
