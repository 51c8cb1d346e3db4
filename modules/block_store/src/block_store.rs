//! Block store for the timestamp chain VM
//! Persists decided blocks and the pointer to the last accepted block

pub mod stores;

use std::sync::Arc;

use anyhow::Result;
use config::Config;
use timestampvm_common::configuration::StoreKind;
use tracing::info;

pub use crate::stores::{fjall::FjallStore, memory::InMemoryStore, Store, StoredBlock};

/// Open the store selected by the `store` config key.
pub fn open_store(config: Arc<Config>) -> Result<Arc<dyn Store>> {
    let kind = StoreKind::from_config(&config)?;
    info!("Opening {kind} block store");
    let store: Arc<dyn Store> = match kind {
        StoreKind::Fjall => Arc::new(FjallStore::new(config)?),
        StoreKind::Memory => Arc::new(InMemoryStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_memory_store_from_config() {
        let config = Config::builder().set_default("store", "memory").unwrap().build().unwrap();
        let store = open_store(Arc::new(config)).unwrap();
        assert_eq!(store.get_last_accepted().unwrap(), None);
    }

    #[test]
    fn opens_fjall_store_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder()
            .set_default("database-path", dir.path().to_str().unwrap())
            .unwrap()
            .build()
            .unwrap();
        let store = open_store(Arc::new(config)).unwrap();
        assert_eq!(store.get_last_accepted().unwrap(), None);
    }

    #[test]
    fn rejects_unknown_store() {
        let config = Config::builder().set_default("store", "sled").unwrap().build().unwrap();
        assert!(open_store(Arc::new(config)).is_err());
    }
}
