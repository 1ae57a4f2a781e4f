// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Multichain Wallet - Custodial BTC / ETH / TRX Wallet Service
//!
//! One encrypted BIP-39 mnemonic per owner yields a Bitcoin, an Ethereum and
//! a Tron address. The service sends native transfers, tracks them to
//! finality and watches owner addresses for inbound transfers.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - HS256 bearer token verification
//! - `blockchain` - HD derivation and the BlockCypher, JSON-RPC and TronGrid clients
//! - `lifecycle` - Wallet creation, send pipeline and confirmation trackers
//! - `storage` - redb wallet/transaction stores and the watch-list cache
//! - `watcher` - Inbound transfer watchers
//! - `tasks` - Supervised background tasks

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod secret;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod watcher;
