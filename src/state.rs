// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::JwtAuth;
use crate::lifecycle::LifecycleManager;
use crate::watcher::WatcherEngine;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleManager>,
    pub watchers: Arc<WatcherEngine>,
    pub auth: Arc<JwtAuth>,
}

impl AppState {
    pub fn new(lifecycle: Arc<LifecycleManager>, watchers: Arc<WatcherEngine>, auth: JwtAuth) -> Self {
        Self {
            lifecycle,
            watchers,
            auth: Arc::new(auth),
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State over in-memory fakes. The harness gives access to the fakes.
    pub fn for_tests() -> (Self, crate::lifecycle::testing::Harness) {
        let harness = crate::lifecycle::testing::Harness::new();
        let watchers = WatcherEngine::new(
            harness.manager.clone(),
            Arc::new(crate::storage::MemoryListCache::default()),
        );
        let state = Self::new(
            harness.manager.clone(),
            Arc::new(watchers),
            JwtAuth::from_secret("test-secret"),
        );
        (state, harness)
    }
}
