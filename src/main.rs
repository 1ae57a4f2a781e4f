// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relational_multichain_wallet::{
    api::router,
    auth::JwtAuth,
    blockchain::{BitcoinClient, EthereumClient, TronClient},
    config::{AppConfig, LogFormat},
    lifecycle::{ChainServices, LifecycleManager, LifecycleSettings, TransactionStores},
    models::Chain,
    state::AppState,
    storage::{ListCache, MemoryListCache, RedisListCache, TxDatabase, WalletDatabase},
    tasks::TaskSupervisor,
    watcher::WatcherEngine,
};

/// Grace period for background tasks after the server stopped.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::from_env()?;
    init_tracing(config.server.log_format);

    info!(
        bind = %config.server.bind_addr,
        data_dir = %config.server.data_dir.display(),
        btc_chain = config.bitcoin.network.chain,
        "Starting multichain wallet service"
    );

    // Storage
    let wallets = WalletDatabase::open(&config.server.data_dir.join("wallets.redb"))?;
    let txs = TxDatabase::open(&config.server.data_dir.join("transactions.redb"))?;
    let stores = TransactionStores {
        bitcoin: Arc::new(txs.store(Chain::Bitcoin)),
        ethereum: Arc::new(txs.store(Chain::Ethereum)),
        tron: Arc::new(txs.store(Chain::Tron)),
    };

    // Chain clients
    let chains = ChainServices {
        bitcoin: Arc::new(BitcoinClient::new(&config.bitcoin)?),
        ethereum: Arc::new(EthereumClient::new(&config.ethereum)?),
        tron: Arc::new(TronClient::new(&config.tron)?),
    };

    let cache: Arc<dyn ListCache> = match config.redis_url.as_deref() {
        Some(url) => {
            let cache = RedisListCache::connect(url).await?;
            info!("Watch list stored in Redis");
            Arc::new(cache)
        }
        None => {
            warn!("REDIS_URL not set, watch list kept in process");
            Arc::new(MemoryListCache::default())
        }
    };

    let supervisor = TaskSupervisor::new();
    let lifecycle = Arc::new(LifecycleManager::new(
        chains,
        stores,
        Arc::new(wallets),
        LifecycleSettings {
            seed_phrase_key: config.security.seed_phrase_key.clone(),
            bitcoin_network: config.bitcoin.network.network,
            tracking: config.tracking.clone(),
        },
        supervisor.clone(),
    ));
    let watchers = Arc::new(WatcherEngine::new(lifecycle.clone(), cache));

    match lifecycle.resume_tracking().await {
        Ok(resumed) => info!(resumed, "Resumed confirmation tracking"),
        Err(e) => error!(error = %e, "Failed to resume confirmation tracking"),
    }

    let state = AppState::new(
        lifecycle,
        watchers,
        JwtAuth::from_secret(&config.security.jwt_secret),
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr).await?;
    info!(addr = %config.server.bind_addr, "Listening (Swagger UI at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.shutdown(SHUTDOWN_TIMEOUT).await;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
