//! Snapshots of both sides of the diff
//!
//! - [`fetch_zone_records`]: what the authority currently serves
//! - [`read_local_mirror`]: what the mirror table currently holds
//!
//! Both are keyed by the authority's record id, the join key of the diff.

pub mod local;
pub mod remote;

use crate::model::{LocalRecord, RemoteRecord};
use std::collections::{BTreeMap, BTreeSet};

pub use local::read_local_mirror;
pub use remote::fetch_zone_records;

/// Remote records keyed by record id
pub type RemoteSnapshot = BTreeMap<String, RemoteRecord>;

/// Mirror rows of one zone keyed by remote id
#[derive(Debug, Clone, Default)]
pub struct LocalSnapshot {
    /// One row per remote id
    pub records: BTreeMap<String, LocalRecord>,
    /// Extra rows pointing at an id already present in `records`
    pub surplus: Vec<LocalRecord>,
    /// Rows skipped because they failed to decode
    pub skipped: usize,
    /// Remote ids still referenced by skipped rows
    ///
    /// No row is created for these ids until the broken row is repaired,
    /// otherwise the zone would hold two rows for one record.
    pub unreadable: BTreeSet<String>,
}

impl LocalSnapshot {
    /// Build a snapshot from rows already known to be owned and unique
    pub fn from_records(records: impl IntoIterator<Item = LocalRecord>) -> Self {
        let mut snapshot = Self::default();
        for record in records {
            if let Some(remote_id) = record.remote_id.clone() {
                snapshot.records.insert(remote_id, record);
            }
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a skipped row still points at `remote_id`
    pub fn is_unreadable(&self, remote_id: &str) -> bool {
        self.unreadable.contains(remote_id)
    }
}
