// # Built-in Mirror Stores
//
// Implementations of the MirrorStore trait that need no external service.
// The MySQL table lives in the `dns-mirror-store-mysql` crate.

pub mod file;
pub mod memory;

pub use file::{FileMirrorStore, FileMirrorStoreFactory};
pub use memory::{MemoryMirrorStore, MemoryMirrorStoreFactory};

use crate::Error;
use crate::model::{LocalRecord, RecordChange, StoredRow};

// Row operations shared by the in-process stores. Rows are kept in insertion
// order, which is the order `read_rows` hands them back in.

fn select_rows(rows: &[StoredRow], zone_id: &str, source: &str) -> Vec<StoredRow> {
    rows.iter()
        .filter(|row| {
            row.zone_id.as_deref() == Some(zone_id)
                && row.source.as_deref() == Some(source)
                && row.remote_id.as_deref().is_some_and(|r| !r.is_empty())
        })
        .cloned()
        .collect()
}

fn insert_into(rows: &mut Vec<StoredRow>, record: &LocalRecord) -> Result<(), Error> {
    if rows.iter().any(|row| row.id.as_deref() == Some(record.id.as_str())) {
        return Err(Error::write(format!("duplicate primary key {}", record.id)));
    }
    rows.push(StoredRow::from(record));
    Ok(())
}

fn update_in(rows: &mut [StoredRow], id: &str, change: &RecordChange) -> Result<(), Error> {
    let row = rows
        .iter_mut()
        .find(|row| row.id.as_deref() == Some(id))
        .ok_or_else(|| Error::not_found(format!("row {}", id)))?;

    row.name = Some(change.name.clone());
    row.kind = Some(change.kind.to_string());
    row.value = Some(change.value.clone());
    row.updated_at = Some(change.updated_at);
    Ok(())
}

fn delete_from(rows: &mut Vec<StoredRow>, id: &str) -> Result<(), Error> {
    let index = rows
        .iter()
        .position(|row| row.id.as_deref() == Some(id))
        .ok_or_else(|| Error::not_found(format!("row {}", id)))?;
    rows.remove(index);
    Ok(())
}
