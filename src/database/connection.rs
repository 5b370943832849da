use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::StorageConfig;
use crate::database::kv::KeyValueStore;
use crate::database::postgres::PostgresStore;
use crate::database::sqlite::SqliteStore;
use crate::database::store::{Backend, Store};

#[derive(Clone)]
pub struct DatabaseManager {
    pub store: Arc<dyn Store>,
}

impl DatabaseManager {
    /// Builds the one backend this process will use for its whole lifetime.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let store: Arc<dyn Store> = match config {
            StorageConfig::Sqlite { url } => {
                info!("Using SQLite storage at {}", url);
                Arc::new(SqliteStore::connect(url).await?)
            }
            StorageConfig::Postgres { url, max_connections } => {
                info!("Using PostgreSQL storage (max {} connections)", max_connections);
                Arc::new(PostgresStore::connect(url, *max_connections)?)
            }
            StorageConfig::KeyValue { url } => {
                info!("Using key-value storage at {}", url);
                Arc::new(KeyValueStore::new(url)?)
            }
        };

        Ok(Self { store })
    }

    pub fn from_store(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations for {}", self.backend().as_str());
        self.store.migrate().await?;
        Ok(())
    }

    pub fn backend(&self) -> Backend {
        self.store.backend()
    }
}
