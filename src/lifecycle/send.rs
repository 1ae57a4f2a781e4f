// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Send pipeline and inbound Bitcoin webhooks.

use tracing::{info, warn};

use super::LifecycleManager;
use crate::blockchain::{BcyTx, BtcHdWallet, EthHdWallet, TrxHdWallet};
use crate::error::WalletError;
use crate::models::{Chain, SendTokenRequest, Transaction};

impl LifecycleManager {
    /// Sign and broadcast a native transfer, persist it as `pending` and start
    /// tracking it.
    ///
    /// Every failure up to and including the broadcast is returned to the
    /// caller and nothing is persisted. Nothing here is retried.
    pub async fn send_token(&self, request: SendTokenRequest) -> Result<Transaction, WalletError> {
        request.validate()?;
        let chain = Chain::from_token_symbol(&request.token_symbol)?;
        let receiver = request.receiver_address.trim();

        let valid = match chain {
            Chain::Bitcoin => self.chains.bitcoin.check_address(receiver),
            Chain::Ethereum => self.chains.ethereum.check_address(receiver),
            Chain::Tron => self.chains.tron.check_address(receiver),
        };
        if !matches!(valid, Ok(true)) {
            return Err(WalletError::validation("invalid receiver address"));
        }

        let wallet = self.load_wallet(&request.sender_email).await?;

        let sent = match chain {
            Chain::Bitcoin => {
                let keys = BtcHdWallet::from_mnemonic(&wallet.mnemonic, self.settings.bitcoin_network)?;
                self.chains
                    .bitcoin
                    .send_tx(&keys, receiver, request.amount)
                    .await?
            }
            Chain::Ethereum => {
                let keys = EthHdWallet::from_mnemonic(&wallet.mnemonic)?;
                self.chains
                    .ethereum
                    .send_tx(&keys, receiver, request.amount)
                    .await?
            }
            Chain::Tron => {
                let keys = TrxHdWallet::from_mnemonic(&wallet.mnemonic)?;
                self.chains
                    .tron
                    .send_tx(&keys, receiver, request.amount)
                    .await?
            }
        };

        let stored = self.stores.for_chain(chain).upsert(sent).await?;
        info!(
            chain = %chain,
            tx_id = %stored.id,
            wallet_id = %wallet.id,
            amount = %stored.amount,
            "Transfer broadcast, tracking confirmation"
        );

        match chain {
            Chain::Ethereum => self.spawn_eth_tracker(stored.id.clone()),
            Chain::Tron => self.spawn_tron_tracker(stored.clone()),
            Chain::Bitcoin => {
                let bitcoin = self.chains.bitcoin.clone();
                let address = wallet.btc_address.clone();
                self.supervisor
                    .spawn(format!("btc-hook:{address}"), move |_| async move {
                        let hook = bitcoin.create_confirmation_hook(&address).await?;
                        info!(hook_id = ?hook.id, address = %address, "Bitcoin confirmation hook registered");
                        Ok(())
                    });
            }
        }

        Ok(stored)
    }

    /// Upsert the transaction carried by a BlockCypher `tx-confirmation` callback.
    pub async fn record_bitcoin_webhook(&self, payload: &BcyTx) -> Result<Transaction, WalletError> {
        if payload.hash.trim().is_empty() {
            return Err(WalletError::validation("transaction hash required"));
        }

        let tx = self.chains.bitcoin.transaction_from_payload(payload);
        let stored = self.stores.bitcoin.upsert(tx).await?;
        if stored.status.is_terminal() {
            info!(tx_hash = %stored.id, confirmation = stored.confirmation, "Bitcoin transaction final");
        } else if stored.confirmation == 0 {
            warn!(tx_hash = %stored.id, "Bitcoin webhook without confirmations");
        }
        Ok(stored)
    }
}
