// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ethereum client.
//!
//! Reads go through a shared HTTP provider. Each send builds a short-lived
//! provider with the sender's wallet attached, so no signer outlives the call.
//! The pending-transaction subscription opens its own websocket connection.

use std::str::FromStr;
use std::sync::LazyLock;

use alloy::consensus::Transaction as ConsensusTx;
use alloy::network::{EthereumWallet, TransactionResponse};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use chrono::DateTime;
use futures_util::StreamExt;
use regex::Regex;

use super::{
    BlockInformation, EthHdWallet, EthereumService, PendingLookup, PendingTransaction,
    PendingTxStream, ETH_SUCCESS_DEPTH,
};
use crate::config::EthereumConfig;
use crate::error::WalletError;
use crate::models::{Transaction, TxStatus};

static ETH_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex"));

/// Ethereum JSON-RPC client.
pub struct EthereumClient {
    rpc_url: url::Url,
    ws_url: Option<String>,
    provider: DynProvider,
}

impl EthereumClient {
    pub fn new(config: &EthereumConfig) -> Result<Self, WalletError> {
        let rpc_url: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| WalletError::validation(format!("invalid ETH_RPC_URL: {e}")))?;

        let provider = ProviderBuilder::new()
            .connect_http(rpc_url.clone())
            .erased();

        Ok(Self {
            rpc_url,
            ws_url: config.ws_url.clone(),
            provider,
        })
    }

    /// Whether a websocket endpoint is configured for subscriptions.
    pub fn has_websocket(&self) -> bool {
        self.ws_url.is_some()
    }
}

#[async_trait]
impl EthereumService for EthereumClient {
    fn check_address(&self, address: &str) -> Result<bool, WalletError> {
        Ok(is_valid_address(address))
    }

    async fn get_balance(&self, address: &str) -> Result<u128, WalletError> {
        let addr = parse_address(address)?;
        let balance = self.provider.get_balance(addr).await.map_err(rpc)?;
        Ok(wei_to_u128(balance))
    }

    async fn get_current_block(&self) -> Result<u64, WalletError> {
        self.provider.get_block_number().await.map_err(rpc)
    }

    async fn send_tx(
        &self,
        wallet: &EthHdWallet,
        to: &str,
        amount: u128,
    ) -> Result<Transaction, WalletError> {
        let to_addr = parse_address(to)?;
        let from = wallet.eth_address();
        let value = U256::from(amount);

        let balance = self.provider.get_balance(from).await.map_err(rpc)?;
        if balance < value {
            return Err(WalletError::InsufficientFunds {
                balance: balance.to_string(),
                required: value.to_string(),
            });
        }

        let nonce = self
            .provider
            .get_transaction_count(from)
            .pending()
            .await
            .map_err(rpc)?;

        let request = TransactionRequest::default()
            .from(from)
            .to(to_addr)
            .value(value);

        let gas_limit = self
            .provider
            .estimate_gas(request.clone())
            .await
            .map_err(rpc)?;
        let gas_price = self.provider.get_gas_price().await.map_err(rpc)?;

        let fee = u128::from(gas_limit).saturating_mul(gas_price);
        let required = value.saturating_add(U256::from(fee));
        if balance < required {
            return Err(WalletError::InsufficientFunds {
                balance: balance.to_string(),
                required: required.to_string(),
            });
        }

        let request = request
            .nonce(nonce)
            .gas_limit(gas_limit)
            .max_fee_per_gas(gas_price)
            .max_priority_fee_per_gas(gas_price);

        let signing_provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(wallet.signer().clone()))
            .connect_http(self.rpc_url.clone());

        let pending = signing_provider
            .send_transaction(request)
            .await
            .map_err(|e| WalletError::Broadcast(e.to_string()))?;
        let tx_hash = format!("{:?}", pending.tx_hash());

        tracing::info!(
            tx_hash = %tx_hash,
            from = %wallet.address,
            to = %to_addr,
            nonce,
            gas_limit,
            gas_price,
            "Ethereum transaction broadcast"
        );

        let mut record = Transaction::pending(
            tx_hash,
            wallet.address.clone(),
            to_addr.to_checksum(None),
            amount,
        );
        record.fee = Some(fee);
        Ok(record)
    }

    async fn get_transaction_pending(&self, hash: &str) -> Result<PendingLookup, WalletError> {
        let tx_hash = parse_hash(hash)?;
        let tx = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(rpc)?
            .ok_or_else(|| WalletError::not_found("transaction"))?;

        let gas_price = tx
            .effective_gas_price
            .unwrap_or_else(|| ConsensusTx::max_fee_per_gas(&tx));
        let fee = u128::from(ConsensusTx::gas_limit(&tx)).saturating_mul(gas_price);

        let mut transaction = Transaction::pending(
            format!("{:?}", TransactionResponse::tx_hash(&tx)),
            TransactionResponse::from(&tx).to_checksum(None),
            ConsensusTx::to(&tx)
                .map(|to| to.to_checksum(None))
                .unwrap_or_default(),
            wei_to_u128(ConsensusTx::value(&tx)),
        );
        transaction.fee = Some(fee);
        transaction.block = tx.block_number;

        Ok(PendingLookup {
            transaction,
            is_pending: tx.block_number.is_none(),
        })
    }

    async fn get_block_information(&self, hash: &str) -> Result<BlockInformation, WalletError> {
        let tx_hash = parse_hash(hash)?;
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(rpc)?
            .ok_or_else(|| WalletError::not_found("transaction receipt"))?;

        let block = receipt
            .block_number
            .ok_or_else(|| WalletError::not_found("receipt block"))?;

        let received_at = match receipt.block_hash {
            Some(block_hash) => self
                .provider
                .get_block_by_hash(block_hash)
                .await
                .map_err(rpc)?
                .and_then(|b| DateTime::from_timestamp(b.header.timestamp as i64, 0)),
            None => None,
        };

        let head = self.provider.get_block_number().await.map_err(rpc)?;
        let confirmation = head.saturating_sub(block);

        Ok(BlockInformation {
            block,
            received_at,
            confirmation,
            status: status_for_depth(confirmation, receipt.status()),
        })
    }

    async fn subscribe_pending_transactions(&self) -> Result<PendingTxStream, WalletError> {
        let ws_url = self
            .ws_url
            .as_deref()
            .ok_or_else(|| WalletError::chain_unavailable("ETH_WS_URL not configured"))?;

        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(ws_url))
            .await
            .map_err(WalletError::chain_unavailable)?;
        let subscription = provider
            .subscribe_full_pending_transactions()
            .await
            .map_err(WalletError::chain_unavailable)?;

        tracing::debug!("Subscribed to full pending transactions");

        let stream = subscription
            .into_stream()
            .map(move |tx| {
                // The websocket lives as long as the stream.
                let _ = &provider;
                PendingTransaction {
                    hash: format!("{:?}", TransactionResponse::tx_hash(&tx)),
                    to: ConsensusTx::to(&tx).map(|to| to.to_checksum(None)),
                }
            })
            .boxed();
        Ok(stream)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// `0x` + 40 hex digits. Mixed-case input must carry a valid EIP-55 checksum.
pub fn is_valid_address(address: &str) -> bool {
    if !ETH_ADDRESS.is_match(address) {
        return false;
    }

    let body = &address[2..];
    let single_case = !body.chars().any(|c| c.is_ascii_uppercase())
        || !body.chars().any(|c| c.is_ascii_lowercase());
    single_case || Address::parse_checksummed(address, None).is_ok()
}

/// Mined transactions become final past [`ETH_SUCCESS_DEPTH`]; a reverted
/// receipt at that depth is `failed`.
pub fn status_for_depth(confirmation: u64, succeeded: bool) -> TxStatus {
    if confirmation <= ETH_SUCCESS_DEPTH {
        TxStatus::Pending
    } else if succeeded {
        TxStatus::Success
    } else {
        TxStatus::Failed
    }
}

fn parse_address(address: &str) -> Result<Address, WalletError> {
    Address::from_str(address)
        .map_err(|e| WalletError::validation(format!("invalid ethereum address: {e}")))
}

fn parse_hash(hash: &str) -> Result<B256, WalletError> {
    B256::from_str(hash)
        .map_err(|e| WalletError::validation(format!("invalid transaction hash: {e}")))
}

fn wei_to_u128(value: U256) -> u128 {
    u128::try_from(value).unwrap_or(u128::MAX)
}

fn rpc(err: impl std::fmt::Display) -> WalletError {
    WalletError::ChainUnavailable(format!("ethereum rpc: {err}"))
}
