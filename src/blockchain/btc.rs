// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bitcoin client over the BlockCypher REST API.
//!
//! ## Send Flow
//!
//! 1. `POST /txs/new` with the sender/receiver and `preference = low`; BlockCypher
//!    selects inputs and returns a skeleton with one `tosign` digest per input.
//! 2. Every digest is signed locally (DER ECDSA) and the compressed public key is
//!    attached.
//! 3. `POST /txs/send` broadcasts the completed skeleton. There is no retry.
//!
//! ## Confirmations
//!
//! Bitcoin transfers are not polled. A single `tx-confirmation` hook posts the
//! transaction payload back to `{webhook_url}/webhook/transaction`, which is
//! mapped with [`transaction_from_bcy`] and upserted.

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::secp256k1::{Message, Secp256k1};
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::{BitcoinNetwork, BitcoinService, BtcHdWallet};
use crate::config::BitcoinConfig;
use crate::error::WalletError;
use crate::models::{Transaction, TxStatus};

/// Fee priority requested from BlockCypher.
const FEE_PREFERENCE: &str = "low";

/// Hook event fired on every new confirmation up to the requested depth.
const CONFIRMATION_EVENT: &str = "tx-confirmation";

/// Path appended to the configured webhook base URL.
pub const WEBHOOK_PATH: &str = "/webhook/transaction";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static TESTNET_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(tb1|[mn2])[a-km-zA-HJ-NP-Z0-9]{25,39}$").expect("static regex")
});

static MAINNET_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(bc1[ac-hj-np-z02-9]{25,39}|[13][a-km-zA-HJ-NP-Z1-9]{25,34})$")
        .expect("static regex")
});

// =============================================================================
// BlockCypher Payloads
// =============================================================================

/// BlockCypher transaction object (also the webhook payload).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BcyTx {
    #[serde(default)]
    pub hash: String,
    /// `-1` while unconfirmed
    #[serde(default = "unconfirmed_height")]
    pub block_height: i64,
    /// Satoshi moved by the outputs
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub fees: u64,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default)]
    pub received: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confirmed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub inputs: Vec<BcyTxInput>,
    #[serde(default)]
    pub outputs: Vec<BcyTxOutput>,
}

fn unconfirmed_height() -> i64 {
    -1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BcyTxInput {
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    #[serde(default)]
    pub output_value: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BcyTxOutput {
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    #[serde(default)]
    pub value: u64,
}

/// Unsigned transaction returned by `txs/new`.
///
/// `tx` is kept as raw JSON so `txs/send` receives exactly what BlockCypher built.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TxSkeleton {
    tx: serde_json::Value,
    #[serde(default)]
    tosign: Vec<String>,
    #[serde(default)]
    signatures: Vec<String>,
    #[serde(default)]
    pubkeys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    errors: Vec<serde_json::Value>,
}

/// Webhook registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BcyHook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChainInfo {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct AddressBalance {
    #[serde(default)]
    balance: u64,
}

// =============================================================================
// Client
// =============================================================================

/// BlockCypher client for one chain (`main` or a testnet).
pub struct BitcoinClient {
    http: Client,
    base_url: String,
    token: String,
    network: BitcoinNetwork,
    webhook_url: Option<String>,
    min_confirmations: u64,
}

impl BitcoinClient {
    pub fn new(config: &BitcoinConfig) -> Result<Self, WalletError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(WalletError::chain_unavailable)?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/v1/btc/{}",
                config.api_url.trim_end_matches('/'),
                config.network.chain
            ),
            token: config.token.clone(),
            network: config.network,
            webhook_url: config.webhook_url.clone(),
            min_confirmations: config.min_confirmations,
        })
    }

    pub fn network(&self) -> BitcoinNetwork {
        self.network
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token_query(&self) -> Vec<(&'static str, &str)> {
        if self.token.is_empty() {
            Vec::new()
        } else {
            vec![("token", self.token.as_str())]
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T, WalletError> {
        let response = self
            .http
            .get(self.url(path))
            .query(&self.token_query())
            .send()
            .await
            .map_err(WalletError::chain_unavailable)?;
        read_json(response, what).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<T, WalletError> {
        let response = self
            .http
            .post(self.url(path))
            .query(&self.token_query())
            .json(body)
            .send()
            .await
            .map_err(WalletError::chain_unavailable)?;
        read_json(response, what).await
    }

    async fn delete(&self, path: &str, what: &str) -> Result<(), WalletError> {
        let response = self
            .http
            .delete(self.url(path))
            .query(&self.token_query())
            .send()
            .await
            .map_err(WalletError::chain_unavailable)?;
        check_status(response, what).await.map(|_| ())
    }

    fn hook_url(&self) -> Result<String, WalletError> {
        let base = self
            .webhook_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| WalletError::validation("bitcoin webhook url not configured"))?;
        Ok(format!("{}{}", base.trim_end_matches('/'), WEBHOOK_PATH))
    }
}

#[async_trait]
impl BitcoinService for BitcoinClient {
    fn check_address(&self, address: &str) -> Result<bool, WalletError> {
        let pattern = if self.network.is_mainnet() {
            &MAINNET_ADDRESS
        } else {
            &TESTNET_ADDRESS
        };
        if !pattern.is_match(address) {
            return Ok(false);
        }

        Ok(bitcoin::Address::from_str(address)
            .map(|parsed| parsed.is_valid_for_network(self.network.network))
            .unwrap_or(false))
    }

    async fn get_balance(&self, address: &str) -> Result<u128, WalletError> {
        let balance: AddressBalance = self
            .get_json(&format!("/addrs/{address}/balance"), "address")
            .await?;
        Ok(u128::from(balance.balance))
    }

    async fn get_tx(&self, hash: &str) -> Result<Transaction, WalletError> {
        let tx: BcyTx = self.get_json(&format!("/txs/{hash}"), "transaction").await?;
        Ok(self.transaction_from_payload(&tx))
    }

    async fn get_current_block(&self) -> Result<u64, WalletError> {
        let info: ChainInfo = self.get_json("", "chain").await?;
        Ok(info.height)
    }

    async fn send_tx(
        &self,
        wallet: &BtcHdWallet,
        to: &str,
        amount: u128,
    ) -> Result<Transaction, WalletError> {
        let amount = u64::try_from(amount)
            .map_err(|_| WalletError::validation("amount exceeds bitcoin supply"))?;

        let request = json!({
            "inputs": [{ "addresses": [wallet.address] }],
            "outputs": [{ "addresses": [to], "value": amount }],
            "preference": FEE_PREFERENCE,
        });

        let mut skeleton: TxSkeleton = self
            .post_json("/txs/new", &request, "transaction skeleton")
            .await
            .map_err(into_broadcast)?;
        if !skeleton.errors.is_empty() {
            return Err(WalletError::Broadcast(skeleton_errors(&skeleton.errors)));
        }

        sign_skeleton(&mut skeleton, wallet)?;

        let sent: TxSkeleton = self
            .post_json("/txs/send", &skeleton, "transaction broadcast")
            .await
            .map_err(into_broadcast)?;
        if !sent.errors.is_empty() {
            return Err(WalletError::Broadcast(skeleton_errors(&sent.errors)));
        }

        let tx: BcyTx = serde_json::from_value(sent.tx)
            .map_err(|e| WalletError::ChainUnavailable(format!("malformed send response: {e}")))?;

        tracing::info!(
            tx_hash = %tx.hash,
            from = %wallet.address,
            to = %to,
            amount,
            "Bitcoin transaction broadcast"
        );

        Ok(self.transaction_from_payload(&tx))
    }

    async fn create_confirmation_hook(&self, address: &str) -> Result<BcyHook, WalletError> {
        let url = self.hook_url()?;

        let existing: Vec<BcyHook> = self.get_json("/hooks", "hooks").await?;
        for hook in existing {
            if let Some(id) = hook.id {
                self.delete(&format!("/hooks/{id}"), "hook").await?;
                tracing::debug!(hook_id = %id, "Deleted BlockCypher hook");
            }
        }

        let hook = BcyHook {
            id: None,
            event: CONFIRMATION_EVENT.to_string(),
            address: Some(address.to_string()),
            url,
            confirmations: Some(self.min_confirmations),
        };
        let created: BcyHook = self.post_json("/hooks", &hook, "hook").await?;

        tracing::info!(
            address = %address,
            hook_id = ?created.id,
            confirmations = self.min_confirmations,
            "Registered BlockCypher confirmation hook"
        );
        Ok(created)
    }

    fn transaction_from_payload(&self, payload: &BcyTx) -> Transaction {
        transaction_from_bcy(payload, self.min_confirmations)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Map a BlockCypher transaction to a lifecycle record.
///
/// `success` once `confirmations >= min_confirmations`.
pub fn transaction_from_bcy(tx: &BcyTx, min_confirmations: u64) -> Transaction {
    let success = tx.confirmations >= min_confirmations;

    Transaction {
        id: tx.hash.clone(),
        sender_address: tx
            .inputs
            .iter()
            .flat_map(|input| input.addresses.iter().flatten())
            .cloned()
            .collect(),
        receiver_address: tx
            .outputs
            .iter()
            .flat_map(|output| output.addresses.iter().flatten())
            .cloned()
            .collect(),
        amount: u128::from(tx.total),
        fee: Some(u128::from(tx.fees)),
        block: u64::try_from(tx.block_height).ok(),
        confirmation: tx.confirmations,
        status: if success {
            TxStatus::Success
        } else {
            TxStatus::Pending
        },
        received_at: tx.received,
        completed_at: if success {
            tx.confirmed.or_else(|| Some(Utc::now()))
        } else {
            None
        },
        updated_at: Utc::now(),
    }
}

fn sign_skeleton(skeleton: &mut TxSkeleton, wallet: &BtcHdWallet) -> Result<(), WalletError> {
    let secp = Secp256k1::signing_only();
    skeleton.signatures.clear();
    skeleton.pubkeys.clear();

    for digest_hex in &skeleton.tosign {
        let digest = alloy::hex::decode(digest_hex)
            .map_err(|e| WalletError::Crypto(format!("invalid tosign digest: {e}")))?;
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| WalletError::Crypto(format!("invalid tosign digest: {e}")))?;
        let signature = secp.sign_ecdsa(&message, wallet.secret_key());

        skeleton
            .signatures
            .push(alloy::hex::encode(&*signature.serialize_der()));
        skeleton.pubkeys.push(wallet.public_key.clone());
    }
    Ok(())
}

fn skeleton_errors(errors: &[serde_json::Value]) -> String {
    errors
        .iter()
        .map(|e| {
            e.get("error")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string())
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Node-side rejections on the send path are broadcast failures.
fn into_broadcast(err: WalletError) -> WalletError {
    match err {
        WalletError::Validation(msg) => WalletError::Broadcast(msg),
        other => other,
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response, WalletError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(WalletError::not_found(what));
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(WalletError::ChainUnavailable(format!(
            "{what}: HTTP {status}: {body}"
        )))
    } else {
        Err(WalletError::Validation(format!(
            "{what} rejected: HTTP {status}: {body}"
        )))
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, WalletError> {
    let response = check_status(response, what).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| WalletError::ChainUnavailable(format!("malformed {what} response: {e}")))
}
