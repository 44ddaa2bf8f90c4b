//! Remote snapshot builder
//!
//! Pages through the authority until one of the termination rules fires:
//!
//! 1. a page comes back shorter than requested
//! 2. the raw records fetched reach the latest total the authority reported
//!
//! The total is re-read from every page, so a zone that grows while it is
//! being listed is followed to its end. An authority that keeps returning full
//! pages past [`SyncSettings::max_pages`] fails the fetch; the listing is
//! incomplete and must not drive deletes.

use super::RemoteSnapshot;
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::traits::{PageRequest, RecordAuthority};
use tracing::{debug, warn};

/// Fetch the active, supported records of `zone` keyed by record id
///
/// Any page failure fails the whole fetch; a partial snapshot is never
/// returned.
pub async fn fetch_zone_records(
    authority: &dyn RecordAuthority,
    zone: &str,
    settings: &SyncSettings,
) -> Result<RemoteSnapshot> {
    if settings.page_size == 0 {
        return Err(Error::config("page size must be > 0"));
    }
    if settings.max_pages == 0 {
        return Err(Error::config("max pages must be > 0"));
    }

    let mut snapshot = RemoteSnapshot::new();
    let mut request = PageRequest::first(settings.page_size);
    let mut fetched: u64 = 0;

    loop {
        let page = authority
            .list_records_page(zone, request)
            .await
            .map_err(|e| {
                Error::fetch(format!(
                    "{} failed to list records for {} (page {}): {}",
                    authority.authority_name(),
                    zone,
                    request.page_number,
                    e
                ))
            })?;

        let returned = page.records.len() as u64;
        fetched = fetched.saturating_add(returned);

        debug!(
            "Page {} of {}: {} record(s), reported total {}",
            request.page_number, zone, returned, page.total_count
        );

        for record in page.records {
            if !record.is_active() {
                debug!("Skipping inactive record {} ({})", record.record_id, record.full_name());
                continue;
            }
            if !settings.supports(&record.kind) {
                debug!(
                    "Skipping unsupported {} record {} ({})",
                    record.kind,
                    record.record_id,
                    record.full_name()
                );
                continue;
            }
            let record_id = record.record_id.clone();
            if snapshot.insert(record_id.clone(), record).is_some() {
                warn!(
                    "Duplicate record id {} in {} listing, keeping the last occurrence",
                    record_id, zone
                );
            }
        }

        if returned < request.page_size || fetched >= page.total_count {
            break;
        }
        if request.page_number >= settings.max_pages {
            return Err(Error::fetch(format!(
                "{} listing of {} did not end after {} page(s): {} of {} reported record(s) fetched",
                authority.authority_name(),
                zone,
                request.page_number,
                fetched,
                page.total_count
            )));
        }

        request = request.next();
    }

    debug!(
        "Fetched {} raw record(s) for {}, {} kept",
        fetched,
        zone,
        snapshot.len()
    );
    Ok(snapshot)
}
