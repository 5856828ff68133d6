//! Store backend factory

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::postgres::PostgresPool;

use super::log_store::NotificationLogStore;
use super::memory::{MemoryLogStore, MemoryRecordStore};
use super::postgres::{PostgresLogStore, PostgresRecordStore};
use super::records::RecordStore;

/// The pair of datastore collaborators handed to the dispatcher
#[derive(Clone)]
pub struct Stores {
    pub records: Arc<dyn RecordStore>,
    pub log: Arc<dyn NotificationLogStore>,
}

/// Create record and log stores based on configuration.
///
/// - `"postgres"`: PostgreSQL stores if a pool is provided
/// - `"memory"` (default): in-process stores
pub fn create_stores(settings: &StoreConfig, postgres_pool: Option<&PostgresPool>) -> Stores {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL stores");
                Stores {
                    records: Arc::new(PostgresRecordStore::new(pool.pool().clone())),
                    log: Arc::new(PostgresLogStore::new(pool.pool().clone())),
                }
            } else {
                tracing::warn!(
                    "PostgreSQL store backend requested but no pool provided, falling back to memory"
                );
                memory_stores()
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory stores");
            memory_stores()
        }
    }
}

fn memory_stores() -> Stores {
    Stores {
        records: Arc::new(MemoryRecordStore::new()),
        log: Arc::new(MemoryLogStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_is_default() {
        let stores = create_stores(&StoreConfig::default(), None);
        assert_eq!(stores.records.backend_type(), "memory");
        assert_eq!(stores.log.backend_type(), "memory");
    }

    #[test]
    fn test_postgres_without_pool_falls_back() {
        let config = StoreConfig {
            backend: "postgres".to_string(),
        };
        let stores = create_stores(&config, None);
        assert_eq!(stores.records.backend_type(), "memory");
    }
}
