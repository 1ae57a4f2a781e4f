// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Task Supervisor
//!
//! Owner of every background task: confirmation trackers, the Ethereum
//! watcher loop and Tron watcher loops.
//!
//! Each task receives a child [`CancellationToken`] and runs on a shared
//! [`TaskTracker`]. The outcome of every task is logged here, so task bodies
//! just return `Result` and never report errors to a caller.
//!
//! ## Shutdown
//!
//! [`TaskSupervisor::shutdown`] cancels the root token and waits for every
//! task to finish.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::WalletError;

#[derive(Clone, Default)]
pub struct TaskSupervisor {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a named background task with its own child token.
    ///
    /// Tasks spawned after shutdown started are dropped without running.
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), WalletError>> + Send + 'static,
    {
        let name = name.into();
        if self.cancel.is_cancelled() {
            debug!(task = %name, "Supervisor shutting down, task not started");
            return;
        }

        let token = self.cancel.child_token();
        let fut = task(token);
        self.tracker.spawn(async move {
            debug!(task = %name, "Background task started");
            match fut.await {
                Ok(()) => debug!(task = %name, "Background task finished"),
                Err(e) => warn!(task = %name, error = %e, "Background task failed"),
            }
        });
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tasks currently running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel every task and wait for them to drain, up to `timeout`.
    pub async fn shutdown(&self, timeout: Duration) {
        info!(active = self.tracker.len(), "Stopping background tasks");
        self.cancel.cancel();
        self.tracker.close();

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(
                remaining = self.tracker.len(),
                "Background tasks did not drain before timeout"
            );
        } else {
            info!("Background tasks drained");
        }
    }
}

/// Sleep for `period`, returning `false` if `token` fired first.
pub async fn sleep_or_cancel(token: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => true,
        _ = token.cancelled() => false,
    }
}
