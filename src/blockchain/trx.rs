// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tron client over the TronGrid HTTP API.
//!
//! Node calls (`/wallet/*`) use Base58 addresses (`visible = true`). Account
//! history comes from the TronGrid v1 index, which pages with an opaque
//! `fingerprint` and reports contract addresses in hex (`41…`).
//!
//! Transfers are created by the node, verified locally (`txID` must equal
//! `sha256(raw_data)`), signed with a recoverable secp256k1 signature and
//! broadcast once.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::hd::tron_decode_base58check;
use super::{TronService, TronTxInfo, TrxHdWallet};
use crate::config::TronConfig;
use crate::error::WalletError;
use crate::models::Transaction;

/// Header carrying the TronGrid API key (`TRON-PRO-API-KEY`).
const API_KEY_HEADER: &str = "tron-pro-api-key";

/// Contract type of a native TRX transfer.
pub const TRANSFER_CONTRACT: &str = "TransferContract";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static TRON_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^T[1-9A-HJ-NP-Za-km-z]{33}$").expect("static regex"));

// =============================================================================
// Account History
// =============================================================================

/// Filters for `GET /v1/accounts/{address}/transactions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountTxQuery {
    pub only_confirmed: bool,
    pub only_unconfirmed: bool,
    pub only_to: bool,
    pub only_from: bool,
    pub limit: Option<u32>,
    pub fingerprint: Option<String>,
    /// e.g. `block_timestamp,asc`
    pub order_by: Option<String>,
    /// Milliseconds
    pub min_timestamp: Option<i64>,
    pub max_timestamp: Option<i64>,
}

impl AccountTxQuery {
    /// Query-string pairs. Unset filters are omitted.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        for (key, set) in [
            ("only_confirmed", self.only_confirmed),
            ("only_unconfirmed", self.only_unconfirmed),
            ("only_to", self.only_to),
            ("only_from", self.only_from),
        ] {
            if set {
                pairs.push((key, "true".to_string()));
            }
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(fingerprint) = &self.fingerprint {
            pairs.push(("fingerprint", fingerprint.clone()));
        }
        if let Some(order_by) = &self.order_by {
            pairs.push(("order_by", order_by.clone()));
        }
        if let Some(min) = self.min_timestamp {
            pairs.push(("min_timestamp", min.to_string()));
        }
        if let Some(max) = self.max_timestamp {
            pairs.push(("max_timestamp", max.to_string()));
        }
        pairs
    }
}

/// One page of account history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountTxPage {
    #[serde(default)]
    pub data: Vec<AccountTx>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub meta: PageMeta,
}

impl AccountTxPage {
    pub fn contains(&self, tx_id: &str) -> bool {
        self.data.iter().any(|tx| tx.tx_id.eq_ignore_ascii_case(tx_id))
    }

    /// Cursor for the next page; `None` on the last page.
    pub fn next_fingerprint(&self) -> Option<&str> {
        self.meta.fingerprint.as_deref().filter(|f| !f.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub at: i64,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountTx {
    #[serde(rename = "txID")]
    pub tx_id: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: u64,
    /// Milliseconds
    #[serde(default)]
    pub block_timestamp: i64,
    /// Bandwidth fee in sun
    #[serde(default)]
    pub net_fee: u64,
    #[serde(default)]
    pub ret: Vec<TxResult>,
    #[serde(default)]
    pub raw_data: RawData,
}

impl AccountTx {
    /// The transfer carried by this transaction, if it is a native TRX transfer.
    pub fn transfer(&self) -> Option<&TransferValue> {
        self.raw_data
            .contract
            .first()
            .filter(|c| c.contract_type == TRANSFER_CONTRACT)
            .map(|c| &c.parameter.value)
    }

    /// `true` unless the node reported a non-success contract result.
    pub fn succeeded(&self) -> bool {
        self.ret
            .iter()
            .all(|r| r.contract_ret.as_deref().is_none_or(|c| c == "SUCCESS"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxResult {
    #[serde(rename = "contractRet", default)]
    pub contract_ret: Option<String>,
    #[serde(default)]
    pub fee: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawData {
    #[serde(default)]
    pub contract: Vec<Contract>,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Contract {
    #[serde(rename = "type", default)]
    pub contract_type: String,
    #[serde(default)]
    pub parameter: ContractParameter,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractParameter {
    #[serde(default)]
    pub value: TransferValue,
}

/// `TransferContract` body. Addresses are hex (`41…`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferValue {
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub to_address: String,
}

// =============================================================================
// Node Payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    balance: u64,
}

#[derive(Debug, Deserialize)]
struct TxInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    fee: u64,
    #[serde(rename = "blockNumber", default)]
    block_number: u64,
    #[serde(rename = "blockTimeStamp", default)]
    block_timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct NowBlock {
    block_header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    raw_data: BlockRawData,
}

#[derive(Debug, Deserialize)]
struct BlockRawData {
    #[serde(default)]
    number: u64,
}

/// Node-built transaction; `raw_data` is passed back verbatim on broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnsignedTx {
    #[serde(rename = "txID", default)]
    tx_id: String,
    #[serde(default)]
    raw_data: serde_json::Value,
    #[serde(default)]
    raw_data_hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    signature: Vec<String>,
    #[serde(rename = "Error", default, skip_serializing)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BroadcastResult {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    code: Option<String>,
    /// Hex-encoded UTF-8
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

pub struct TronClient {
    http: Client,
    base_url: String,
}

impl TronClient {
    pub fn new(config: &TronConfig) -> Result<Self, WalletError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(key)
                .map_err(|e| WalletError::validation(format!("invalid TRON_API_KEY: {e}")))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(WalletError::chain_unavailable)?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<T, WalletError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(WalletError::chain_unavailable)?;
        read_json(response, what).await
    }
}

#[async_trait]
impl TronService for TronClient {
    fn check_address(&self, address: &str) -> Result<bool, WalletError> {
        Ok(TRON_ADDRESS.is_match(address) && tron_decode_base58check(address).is_ok())
    }

    async fn get_balance(&self, address: &str) -> Result<u128, WalletError> {
        let account: Account = self
            .post(
                "/wallet/getaccount",
                &json!({ "address": address, "visible": true }),
                "account",
            )
            .await?;
        Ok(u128::from(account.balance))
    }

    async fn get_tx(&self, id: &str) -> Result<TronTxInfo, WalletError> {
        let info: TxInfo = self
            .post(
                "/wallet/gettransactioninfobyid",
                &json!({ "value": id }),
                "transaction info",
            )
            .await?;

        match info.id {
            Some(found) if !found.is_empty() => Ok(TronTxInfo {
                id: found,
                fee: info.fee,
                block_number: info.block_number,
                block_timestamp: info.block_timestamp,
            }),
            _ => Err(WalletError::not_found("transaction info")),
        }
    }

    async fn get_current_block(&self) -> Result<u64, WalletError> {
        let block: NowBlock = self
            .post("/wallet/getnowblock", &json!({}), "block")
            .await?;
        Ok(block.block_header.raw_data.number)
    }

    async fn send_tx(
        &self,
        wallet: &TrxHdWallet,
        to: &str,
        amount: u128,
    ) -> Result<Transaction, WalletError> {
        let sun = i64::try_from(amount)
            .map_err(|_| WalletError::validation("amount exceeds tron supply"))?;

        let mut unsigned: UnsignedTx = self
            .post(
                "/wallet/createtransaction",
                &json!({
                    "owner_address": wallet.address,
                    "to_address": to,
                    "amount": sun,
                    "visible": true,
                }),
                "transaction",
            )
            .await?;
        if let Some(error) = unsigned.error.take() {
            return Err(WalletError::Broadcast(error));
        }

        sign_transaction(&mut unsigned, wallet)?;

        let result: BroadcastResult = self
            .post("/wallet/broadcasttransaction", &unsigned, "broadcast")
            .await?;
        if !result.result {
            return Err(WalletError::Broadcast(broadcast_message(&result)));
        }

        tracing::info!(
            tx_id = %unsigned.tx_id,
            from = %wallet.address,
            to = %to,
            amount = sun,
            "Tron transaction broadcast"
        );

        Ok(Transaction::pending(
            unsigned.tx_id,
            wallet.address.clone(),
            to,
            amount,
        ))
    }

    async fn get_tx_by_account_address(
        &self,
        address: &str,
        query: &AccountTxQuery,
    ) -> Result<AccountTxPage, WalletError> {
        let response = self
            .http
            .get(format!("{}/v1/accounts/{}/transactions", self.base_url, address))
            .query(&query.to_pairs())
            .send()
            .await
            .map_err(WalletError::chain_unavailable)?;
        read_json(response, "account transactions").await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn sign_transaction(tx: &mut UnsignedTx, wallet: &TrxHdWallet) -> Result<(), WalletError> {
    let raw = alloy::hex::decode(&tx.raw_data_hex)
        .map_err(|e| WalletError::Crypto(format!("invalid raw_data_hex: {e}")))?;
    let digest = Sha256::digest(&raw);

    if !alloy::hex::encode(digest).eq_ignore_ascii_case(&tx.tx_id) {
        return Err(WalletError::Crypto(
            "transaction id does not match raw data".into(),
        ));
    }

    let (signature, recovery_id) = wallet
        .signing_key()
        .sign_prehash_recoverable(&digest)
        .map_err(|e| WalletError::Crypto(e.to_string()))?;

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte());
    tx.signature = vec![alloy::hex::encode(bytes)];
    Ok(())
}

fn broadcast_message(result: &BroadcastResult) -> String {
    let message = result
        .message
        .as_deref()
        .map(|m| {
            alloy::hex::decode(m)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .unwrap_or_else(|| m.to_string())
        })
        .unwrap_or_default();

    match &result.code {
        Some(code) if message.is_empty() => code.clone(),
        Some(code) => format!("{code}: {message}"),
        None => message,
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, WalletError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(WalletError::not_found(what));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WalletError::ChainUnavailable(format!(
            "{what}: HTTP {status}: {body}"
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| WalletError::ChainUnavailable(format!("malformed {what} response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    const MNEMONIC: &str =
        "yellow dolphin robot express road develop repair neutral rate tide economy section";

    fn client() -> TronClient {
        TronClient::new(&TronConfig {
            api_url: "https://api.shasta.trongrid.io/".into(),
            api_key: Some("key".into()),
        })
        .unwrap()
    }

    #[test]
    fn address_validation() {
        let tron = client();
        assert!(tron.check_address("TNjq63hm9JfqQYRRwVAtS84PRy1Ty6CU5U").unwrap());
        assert!(tron.check_address("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t").unwrap());
        assert!(!tron.check_address("TNjq63hm9JfqQYRRwVKtS84PRy1Ty6CU5U").unwrap());
        assert!(!tron.check_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap());
        assert!(!tron.check_address("TNjq63hm9JfqQYRRwVAtS84PRy1Ty6CU5").unwrap());
    }

    #[test]
    fn query_pairs_skip_unset_filters() {
        let query = AccountTxQuery {
            only_confirmed: true,
            only_to: true,
            min_timestamp: Some(1_700_000_000_000),
            order_by: Some("block_timestamp,asc".into()),
            fingerprint: Some("abc".into()),
            ..Default::default()
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("only_confirmed", "true".to_string()),
                ("only_to", "true".to_string()),
                ("fingerprint", "abc".to_string()),
                ("order_by", "block_timestamp,asc".to_string()),
                ("min_timestamp", "1700000000000".to_string()),
            ]
        );
        assert!(AccountTxQuery::default().to_pairs().is_empty());
    }

    #[test]
    fn account_page_parses() {
        let page: AccountTxPage = serde_json::from_value(json!({
            "data": [{
                "ret": [{ "contractRet": "SUCCESS", "fee": 0 }],
                "txID": "5AB7D1EC5BC1B0BC4A0F6F1B3C6DB2E4A4A3C7D0E4CC2B6C0E50B5A9B1C8D0E1",
                "net_fee": 267000,
                "blockNumber": 40123456,
                "block_timestamp": 1700000000000i64,
                "raw_data": {
                    "contract": [{
                        "parameter": {
                            "value": {
                                "amount": 1000000,
                                "owner_address": "418c11ef4f7006a1c885cd62209f0b996b51030049",
                                "to_address": "41a614f803b6fd780986a42c78ec9c7f77e6ded13c"
                            },
                            "type_url": "type.googleapis.com/protocol.TransferContract"
                        },
                        "type": "TransferContract"
                    }],
                    "timestamp": 1699999999000i64
                }
            }, {
                "txID": "aa",
                "raw_data": { "contract": [{ "type": "TriggerSmartContract" }] }
            }],
            "success": true,
            "meta": { "at": 1700000001000i64, "fingerprint": "next", "page_size": 2 }
        }))
        .unwrap();

        assert_eq!(page.next_fingerprint(), Some("next"));
        assert!(page.contains(
            "5ab7d1ec5bc1b0bc4a0f6f1b3c6db2e4a4a3c7d0e4cc2b6c0e50b5a9b1c8d0e1"
        ));
        assert!(!page.contains("bb"));

        let transfer = page.data[0].transfer().unwrap();
        assert_eq!(transfer.amount, 1_000_000);
        assert_eq!(page.data[0].net_fee, 267_000);
        assert!(page.data[0].succeeded());
        assert!(page.data[1].transfer().is_none());
    }

    #[test]
    fn empty_fingerprint_ends_paging() {
        let page: AccountTxPage =
            serde_json::from_value(json!({ "data": [], "meta": { "fingerprint": "" } })).unwrap();
        assert_eq!(page.next_fingerprint(), None);
    }

    #[test]
    fn signature_recovers_sender_key() {
        let wallet = TrxHdWallet::from_mnemonic(MNEMONIC).unwrap();
        let raw = alloy::hex::decode("0a0217d82208d0a2b0c3f6e4a1b040f8c6e1c3b8315a67").unwrap();
        let mut tx = UnsignedTx {
            tx_id: alloy::hex::encode(Sha256::digest(&raw)),
            raw_data: json!({}),
            raw_data_hex: alloy::hex::encode(&raw),
            visible: Some(true),
            signature: Vec::new(),
            error: None,
        };

        sign_transaction(&mut tx, &wallet).unwrap();
        let sig = alloy::hex::decode(&tx.signature[0]).unwrap();
        assert_eq!(sig.len(), 65);

        let signature = Signature::from_slice(&sig[..64]).unwrap();
        let recovery_id = RecoveryId::from_byte(sig[64]).unwrap();
        let recovered =
            VerifyingKey::recover_from_prehash(&Sha256::digest(&raw), &signature, recovery_id)
                .unwrap();
        assert_eq!(&recovered, wallet.signing_key().verifying_key());
    }

    #[test]
    fn mismatched_tx_id_is_refused() {
        let wallet = TrxHdWallet::from_mnemonic(MNEMONIC).unwrap();
        let mut tx = UnsignedTx {
            tx_id: "00".repeat(32),
            raw_data: json!({}),
            raw_data_hex: "0a0217d8".into(),
            visible: Some(true),
            signature: Vec::new(),
            error: None,
        };
        assert!(matches!(
            sign_transaction(&mut tx, &wallet),
            Err(WalletError::Crypto(_))
        ));
        assert!(tx.signature.is_empty());
    }

    #[test]
    fn broadcast_message_is_hex_decoded() {
        let result = BroadcastResult {
            result: false,
            code: Some("CONTRACT_VALIDATE_ERROR".into()),
            message: Some(alloy::hex::encode("balance is not sufficient")),
        };
        assert_eq!(
            broadcast_message(&result),
            "CONTRACT_VALIDATE_ERROR: balance is not sufficient"
        );
    }
}
