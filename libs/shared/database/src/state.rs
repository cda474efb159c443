use std::sync::Arc;
use tracing::info;

use shared_config::{AppConfig, StoreBackend};

use crate::memory::InMemoryStore;
use crate::store::{ClinicStore, StoreError};
use crate::supabase::SupabaseStore;

/// Handle shared by every router: configuration plus the data store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ClinicStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn ClinicStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn from_config(config: AppConfig) -> Result<Self, StoreError> {
        if !config.is_configured() {
            return Err(StoreError::Unavailable(format!(
                "{} store backend is not configured",
                config.store_backend
            )));
        }

        let store: Arc<dyn ClinicStore> = match config.store_backend {
            StoreBackend::Memory => Arc::new(InMemoryStore::new()),
            StoreBackend::Supabase => Arc::new(SupabaseStore::new(&config)),
        };
        info!("Using {} store backend", config.store_backend);

        Ok(Self::new(config, store))
    }
}
