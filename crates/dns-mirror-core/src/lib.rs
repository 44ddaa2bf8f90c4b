// # dns-mirror-core
//
// Core library for mirroring an authoritative DNS record set into a local
// table.
//
// ## Architecture Overview
//
// - **RecordAuthority**: Trait for reading the authoritative records of a zone, page by page
// - **MirrorStore**: Trait for the persisted mirror table
// - **snapshot**: Builds the remote and local views of one zone
// - **reconcile**: Diffs the two views and applies create/update/delete writes
// - **SyncEngine**: Runs every configured zone and collects a RunSummary
// - **ComponentRegistry**: Name-keyed factories for authorities and stores
//
// ## Design Principles
//
// 1. **Authority is read-only**: Nothing is ever written back to it
// 2. **Provenance scoping**: Only rows stamped with PROVENANCE_TAG are touched
// 3. **Fail-closed zones**: A failed fetch or read aborts the zone before any write
// 4. **Record isolation**: One failed write never stops the others
// 5. **Library-First**: The binary only wires configuration, logging and exit codes

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod summary;
pub mod traits;

// Re-export core types for convenience
pub use config::{AuthorityConfig, DomainMapping, StoreConfig, SyncConfig, SyncSettings};
pub use engine::{SyncEngine, SyncEvent};
pub use error::{Error, Result};
pub use model::{LocalRecord, PROVENANCE_TAG, RecordKind, RemoteRecord};
pub use reconcile::{Reconciler, ZoneOutcome};
pub use registry::ComponentRegistry;
pub use store::{FileMirrorStore, MemoryMirrorStore};
pub use summary::{RunSummary, ZoneReport};
pub use traits::{MirrorStore, RecordAuthority};
