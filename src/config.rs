// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once from the environment at startup and passed
//! explicitly into every constructor.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory for the redb files | `./data` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `SEED_PHRASE_ENCRYPTION_KEY` | AES key for mnemonics (16/24/32 bytes) | Required |
//! | `JWT_SECRET` | HS256 secret for bearer tokens | Required |
//! | `BTC_CHAIN` | BlockCypher chain (`main`, `test3`, `test4`, `test`) | `test3` |
//! | `BTC_API_URL` | BlockCypher base URL | `https://api.blockcypher.com` |
//! | `BTC_TOKEN` | BlockCypher token | empty |
//! | `BTC_WEBHOOK_URL` | Public base URL of this service's `/v1/btc` routes | empty (hooks skipped) |
//! | `BTC_MIN_CONFIRMATIONS` | Confirmations marking a Bitcoin transfer final | `6` |
//! | `ETH_RPC_URL` | Ethereum JSON-RPC endpoint | Required |
//! | `ETH_WS_URL` | Ethereum websocket endpoint (watcher) | unset |
//! | `TRON_API_URL` | TronGrid base URL | `https://api.shasta.trongrid.io` |
//! | `TRON_API_KEY` | TronGrid API key | unset |
//! | `REDIS_URL` | Watch-list store | unset (in-process cache) |
//! | `TRACKER_FAST_POLL_SECS` / `TRACKER_SLOW_POLL_SECS` | Tracker intervals | `5` / `60` |
//! | `WATCH_TTL_SECS` | Watch registration TTL | `120` |
//! | `TRON_WATCH_TIMEOUT_SECS` | Lifetime of a Tron watcher | `300` |
//! | `TRON_WATCH_IDLE_SECS` | Tron watcher sleep after the last page | `60` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::{BitcoinNetwork, DEFAULT_BTC_MIN_CONFIRMATIONS};
use crate::secret;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_BTC_CHAIN: &str = "test3";
const DEFAULT_BTC_API_URL: &str = "https://api.blockcypher.com";
const DEFAULT_TRON_API_URL: &str = "https://api.shasta.trongrid.io";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub log_format: LogFormat,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub seed_phrase_key: String,
    pub jwt_secret: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("seed_phrase_key", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BitcoinConfig {
    pub api_url: String,
    pub network: BitcoinNetwork,
    pub token: String,
    /// Base URL the confirmation hook posts to; `None` disables hooks
    pub webhook_url: Option<String>,
    pub min_confirmations: u64,
}

#[derive(Debug, Clone)]
pub struct EthereumConfig {
    pub rpc_url: String,
    pub ws_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TronConfig {
    pub api_url: String,
    pub api_key: Option<String>,
}

/// Timing of trackers and watchers.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub fast_poll: Duration,
    pub slow_poll: Duration,
    pub watch_ttl: Duration,
    pub tron_watch_timeout: Duration,
    pub tron_watch_idle: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            fast_poll: Duration::from_secs(5),
            slow_poll: Duration::from_secs(60),
            watch_ttl: Duration::from_secs(120),
            tron_watch_timeout: Duration::from_secs(300),
            tron_watch_idle: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub bitcoin: BitcoinConfig,
    pub ethereum: EthereumConfig,
    pub tron: TronConfig,
    pub redis_url: Option<String>,
    pub tracking: TrackingConfig,
}

// =============================================================================
// Loading
// =============================================================================

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| invalid("HOST", e))?;

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid("LOG_FORMAT", format!("unknown format `{other}`"))),
        };

        let seed_phrase_key = required("SEED_PHRASE_ENCRYPTION_KEY")?;
        secret::validate_key(&seed_phrase_key)
            .map_err(|e| invalid("SEED_PHRASE_ENCRYPTION_KEY", e))?;

        let network = BitcoinNetwork::from_chain(
            &get("BTC_CHAIN").unwrap_or_else(|| DEFAULT_BTC_CHAIN.to_string()),
        )
        .map_err(|e| invalid("BTC_CHAIN", e))?;

        let defaults = TrackingConfig::default();
        let secs = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            let value: u64 = parse_or(name, get(name), default.as_secs())?;
            if value == 0 {
                return Err(invalid(name, "must be greater than zero"));
            }
            Ok(Duration::from_secs(value))
        };

        Ok(Self {
            server: ServerConfig {
                bind_addr,
                data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
                log_format,
            },
            security: SecurityConfig {
                seed_phrase_key,
                jwt_secret: required("JWT_SECRET")?,
            },
            bitcoin: BitcoinConfig {
                api_url: get("BTC_API_URL").unwrap_or_else(|| DEFAULT_BTC_API_URL.to_string()),
                network,
                token: get("BTC_TOKEN").unwrap_or_default(),
                webhook_url: get("BTC_WEBHOOK_URL"),
                min_confirmations: parse_or(
                    "BTC_MIN_CONFIRMATIONS",
                    get("BTC_MIN_CONFIRMATIONS"),
                    DEFAULT_BTC_MIN_CONFIRMATIONS,
                )?,
            },
            ethereum: EthereumConfig {
                rpc_url: required("ETH_RPC_URL")?,
                ws_url: get("ETH_WS_URL"),
            },
            tron: TronConfig {
                api_url: get("TRON_API_URL").unwrap_or_else(|| DEFAULT_TRON_API_URL.to_string()),
                api_key: get("TRON_API_KEY"),
            },
            redis_url: get("REDIS_URL"),
            tracking: TrackingConfig {
                fast_poll: secs("TRACKER_FAST_POLL_SECS", defaults.fast_poll)?,
                slow_poll: secs("TRACKER_SLOW_POLL_SECS", defaults.slow_poll)?,
                watch_ttl: secs("WATCH_TTL_SECS", defaults.watch_ttl)?,
                tron_watch_timeout: secs("TRON_WATCH_TIMEOUT_SECS", defaults.tron_watch_timeout)?,
                tron_watch_idle: secs("TRON_WATCH_IDLE_SECS", defaults.tron_watch_idle)?,
            },
        })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e| invalid(name, e)),
        None => Ok(default),
    }
}
