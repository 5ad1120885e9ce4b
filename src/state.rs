//! Application state management

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::store::Store;
use crate::sync::SyncEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<dyn Store>,
    verifier: Arc<dyn TokenVerifier>,
    sync: SyncEngine,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, store: Arc<dyn Store>, verifier: Arc<dyn TokenVerifier>) -> Self {
        let sync = SyncEngine::new(store.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                verifier,
                sync,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the tabular store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Get the token verifier
    pub fn verifier(&self) -> &Arc<dyn TokenVerifier> {
        &self.inner.verifier
    }

    /// Get the sync engine
    pub fn sync(&self) -> &SyncEngine {
        &self.inner.sync
    }
}
