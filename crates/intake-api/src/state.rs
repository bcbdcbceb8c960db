//! Application state shared by every handler.

use crate::services::{CompletionNotifier, LogNotifier, SessionIdentityManager, UploadService};
use intake_core::Config;
use intake_db::IdentityStore;
use intake_infra::AdmissionControl;
use intake_storage::Storage;
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn IdentityStore>,
    pub storage: Arc<dyn Storage>,
    pub admission: Arc<AdmissionControl>,
    pub identity: SessionIdentityManager,
    pub uploads: UploadService,
}

impl AppState {
    /// Wire services from configuration with the logging completion notifier.
    pub fn new(config: Config, store: Arc<dyn IdentityStore>, storage: Arc<dyn Storage>) -> Self {
        Self::with_notifier(config, store, storage, Arc::new(LogNotifier))
    }

    pub fn with_notifier(
        config: Config,
        store: Arc<dyn IdentityStore>,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        let store_timeout = Duration::from_secs(config.store_timeout_secs());
        let storage_timeout = Duration::from_secs(config.storage_timeout_secs());

        let admission = Arc::new(AdmissionControl::with_shards(
            config.admission_limit(),
            Duration::from_secs(config.admission_window_secs()),
            config.rate_limiter_shard_count(),
        ));

        let identity = SessionIdentityManager::new(store.clone(), storage.clone())
            .with_notifier(notifier)
            .with_max_attempts(config.mint_max_attempts())
            .with_timeouts(store_timeout, storage_timeout);

        let uploads = UploadService::new(store.clone(), storage.clone())
            .with_timeouts(store_timeout, storage_timeout);

        Self {
            config,
            store,
            storage,
            admission,
            identity,
            uploads,
        }
    }

    /// Replace the identity manager, e.g. to inject a deterministic id generator.
    pub fn with_identity(mut self, identity: SessionIdentityManager) -> Self {
        self.identity = identity;
        self
    }
}
