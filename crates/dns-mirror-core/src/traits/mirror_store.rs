// # Mirror Store Trait
//
// Defines the interface for the persisted mirror table.
//
// ## Implementations
//
// - In-memory: `dns_mirror_core::store::MemoryMirrorStore`
// - JSON file: `dns_mirror_core::store::FileMirrorStore`
// - MySQL: `dns-mirror-store-mysql` crate
//
// ## Usage
//
// ```rust,ignore
// use dns_mirror_core::model::PROVENANCE_TAG;
// use dns_mirror_core::traits::MirrorStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* MirrorStore implementation */;
//
//     if !store.table_exists().await? {
//         anyhow::bail!("mirror table missing");
//     }
//     let rows = store.read_rows("domain-1", PROVENANCE_TAG).await?;
//     println!("{} rows", rows.len());
//
//     Ok(())
// }
// ```

use crate::model::{LocalRecord, RecordChange, StoredRow};
use async_trait::async_trait;

/// Trait for mirror store implementations
///
/// Every write commits on its own; there is no zone-wide transaction.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases)
/// - ✅ Implement locking for thread safety
///
/// ## Forbidden Capabilities
/// - ❌ Decide what to write (owned by the reconciler)
/// - ❌ Validate rows beyond what decoding requires (owned by the local snapshot reader)
/// - ❌ Touch rows other than the one addressed by a write
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Read rows carrying `source` for `zone_id` that have a remote back-reference
    ///
    /// Rows that only partially decode are returned with the missing fields
    /// left `None`; the caller decides what to do with them.
    async fn read_rows(&self, zone_id: &str, source: &str) -> Result<Vec<StoredRow>, crate::Error>;

    /// Insert a new row
    async fn insert_row(&self, record: &LocalRecord) -> Result<(), crate::Error>;

    /// Update name, kind, value and update time of row `id`
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: No row with that key
    async fn update_row(&self, id: &str, change: &RecordChange) -> Result<(), crate::Error>;

    /// Delete row `id`
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: No row with that key
    async fn delete_row(&self, id: &str) -> Result<(), crate::Error>;

    /// Whether the mirror table exists
    async fn table_exists(&self) -> Result<bool, crate::Error>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<(), crate::Error>;

    /// Store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing mirror stores from configuration
///
/// Creation is async because database-backed stores connect on construction.
#[async_trait]
pub trait MirrorStoreFactory: Send + Sync {
    /// Create a MirrorStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn MirrorStore>, crate::Error>;
}
