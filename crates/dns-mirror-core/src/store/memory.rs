// # Memory Mirror Store
//
// In-memory implementation of MirrorStore.
//
// ## Purpose
//
// Holds the mirror for the lifetime of the process only. Useful for testing
// and for dry runs against an authority without a database at hand.
//
// ## Crash Behavior
//
// - All rows are lost on restart
// - The first pass after a restart re-creates every remote record

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{delete_from, insert_into, select_rows, update_in};
use crate::Error;
use crate::config::StoreConfig;
use crate::model::{LocalRecord, RecordChange, StoredRow};
use crate::traits::{MirrorStore, MirrorStoreFactory};

/// In-memory mirror store
///
/// Rows live in a vector behind a RwLock; clones share the same rows.
///
/// # Example
///
/// ```rust,no_run
/// use dns_mirror_core::model::PROVENANCE_TAG;
/// use dns_mirror_core::store::MemoryMirrorStore;
/// use dns_mirror_core::traits::MirrorStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryMirrorStore::new();
///
///     let rows = store.read_rows("domain-1", PROVENANCE_TAG).await?;
///     assert!(rows.is_empty());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryMirrorStore {
    rows: Arc<RwLock<Vec<StoredRow>>>,
}

impl MemoryMirrorStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with raw rows
    ///
    /// Rows are kept as given, including ones that would not decode.
    pub fn with_rows(rows: impl IntoIterator<Item = StoredRow>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows.into_iter().collect())),
        }
    }

    /// Append a raw row, bypassing all checks
    pub async fn seed(&self, row: StoredRow) {
        self.rows.write().await.push(row);
    }

    /// Copy of every row in insertion order
    pub async fn rows(&self) -> Vec<StoredRow> {
        self.rows.read().await.clone()
    }

    /// Get the number of rows in the store
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl MirrorStore for MemoryMirrorStore {
    async fn read_rows(&self, zone_id: &str, source: &str) -> Result<Vec<StoredRow>, Error> {
        let guard = self.rows.read().await;
        Ok(select_rows(&guard, zone_id, source))
    }

    async fn insert_row(&self, record: &LocalRecord) -> Result<(), Error> {
        let mut guard = self.rows.write().await;
        insert_into(&mut guard, record)
    }

    async fn update_row(&self, id: &str, change: &RecordChange) -> Result<(), Error> {
        let mut guard = self.rows.write().await;
        update_in(&mut guard, id, change)
    }

    async fn delete_row(&self, id: &str) -> Result<(), Error> {
        let mut guard = self.rows.write().await;
        delete_from(&mut guard, id)
    }

    async fn table_exists(&self) -> Result<bool, Error> {
        Ok(true)
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for [`MemoryMirrorStore`]; every store it creates starts empty
pub struct MemoryMirrorStoreFactory;

#[async_trait]
impl MirrorStoreFactory for MemoryMirrorStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn MirrorStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Box::new(MemoryMirrorStore::new())),
            other => Err(Error::config(format!(
                "memory store factory cannot handle '{}' config",
                other.type_name()
            ))),
        }
    }
}
