//! Local snapshot reader

use super::LocalSnapshot;
use crate::error::{Error, Result};
use crate::model::PROVENANCE_TAG;
use crate::traits::MirrorStore;
use std::collections::btree_map::Entry;
use tracing::{debug, warn};

/// Read the rows this process owns for `zone_id`, keyed by remote id
///
/// Undecodable rows are skipped; their remote ids are kept in
/// [`LocalSnapshot::unreadable`] so no second row is created for them.
/// Rows that do not carry the provenance tag
/// or belong to another zone are discarded even if the store returned them.
/// When two rows share a remote id the first one read is kept and the other
/// is reported as surplus.
pub async fn read_local_mirror(store: &dyn MirrorStore, zone_id: &str) -> Result<LocalSnapshot> {
    let rows = store
        .read_rows(zone_id, PROVENANCE_TAG)
        .await
        .map_err(|e| {
            Error::read(format!(
                "{} failed to read rows for zone {}: {}",
                store.store_name(),
                zone_id,
                e
            ))
        })?;

    let mut snapshot = LocalSnapshot::default();

    for row in rows {
        let row_id = row.id.clone().unwrap_or_else(|| "<unknown>".to_string());
        let row_remote_id = row.remote_id.clone().filter(|r| !r.is_empty());
        let row_in_zone = row.zone_id.as_deref().is_none_or(|z| z == zone_id);
        let record = match row.decode() {
            Ok(record) => record,
            Err(reason) => {
                warn!("Skipping malformed row {} in zone {}: {}", row_id, zone_id, reason);
                snapshot.skipped += 1;
                if let Some(remote_id) = row_remote_id
                    && row_in_zone
                {
                    snapshot.unreadable.insert(remote_id);
                }
                continue;
            }
        };

        if !record.is_owned_by(zone_id) {
            debug!("Ignoring foreign row {} returned for zone {}", record.id, zone_id);
            continue;
        }
        let Some(remote_id) = record.remote_id.clone() else {
            continue;
        };

        match snapshot.records.entry(remote_id) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(existing) => {
                warn!(
                    "Rows {} and {} both mirror record {} in zone {}; scheduling {} for removal",
                    existing.get().id,
                    record.id,
                    existing.key(),
                    zone_id,
                    record.id
                );
                snapshot.surplus.push(record);
            }
        }
    }

    Ok(snapshot)
}
