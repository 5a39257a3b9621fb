use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Config, StorageBackend};
use crate::store::Store;
use crate::store::memory::MemoryStore;
use crate::store::mysql::MySqlStore;

pub async fn init_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.storage {
        StorageBackend::MySql => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when STORAGE_BACKEND is mysql")?;
            let store = MySqlStore::connect(url)
                .await
                .context("Failed to connect to database")?;
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
