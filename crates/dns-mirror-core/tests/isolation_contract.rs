//! Contract Test: Isolation
//!
//! Verifies that a pass only ever touches rows it owns.
//!
//! Constraints verified:
//! - Rows without the provenance tag survive unchanged
//! - Rows of another zone survive unchanged
//! - Rows without a remote back-reference survive unchanged
//! - Zones with the same name in different mappings do not interfere
//!
//! If this test fails, the mirror may destroy manually curated data.

mod common;

use chrono::Utc;
use common::*;
use dns_mirror_core::config::{DomainMapping, SyncSettings};
use dns_mirror_core::model::{LocalRecord, StoredRow, new_local_id};
use dns_mirror_core::store::MemoryMirrorStore;

fn owned_row(remote_id: &str, zone_id: &str, label: &str) -> StoredRow {
    let record = LocalRecord::from_remote(
        &remote(remote_id, "example.com", label, "9.9.9.9"),
        zone_id,
        "p1",
        new_local_id(),
        Utc::now(),
    );
    StoredRow::from(&record)
}

#[tokio::test]
async fn foreign_rows_are_untouched() {
    // Same remote id as a live record, but entered by hand
    let mut manual = owned_row("r1", "d1", "www");
    manual.source = Some("manual".to_string());

    // Same zone, no back-reference
    let mut unlinked = owned_row("", "d1", "legacy");
    unlinked.remote_id = None;

    // Another zone's row, whose remote id is gone from this zone
    let other_zone = owned_row("r-other", "d2", "mail");

    let inner = MemoryMirrorStore::with_rows([manual.clone(), unlinked.clone(), other_zone.clone()]);
    let store = CountingStore::wrapping(inner);

    let authority = ScriptedAuthority::new();
    authority.set_records(
        "example.com",
        vec![remote("r1", "example.com", "www", "1.1.1.1")],
    );

    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![example_mapping()],
    );
    let summary = engine.run().await;

    // r1 gets its own owned row; nothing else happens
    let zone = &summary.zones[0];
    assert_eq!((zone.added, zone.updated, zone.deleted), (1, 0, 0));

    let rows = store.inner().rows().await;
    assert_eq!(rows.len(), 4);
    assert!(rows.contains(&manual));
    assert!(rows.contains(&unlinked));
    assert!(rows.contains(&other_zone));
}

#[tokio::test]
async fn zones_do_not_interfere() {
    let authority = ScriptedAuthority::new();
    authority.set_records(
        "example.com",
        vec![remote("r1", "example.com", "www", "1.1.1.1")],
    );
    authority.set_records(
        "example.org",
        vec![remote("r2", "example.org", "www", "2.2.2.2")],
    );

    let store = CountingStore::new();
    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![
            DomainMapping::new("p1", "d1", "example.com"),
            DomainMapping::new("p2", "d2", "example.org"),
        ],
    );
    engine.run().await;

    // example.org loses its record; example.com must keep its own
    authority.set_records("example.org", Vec::new());
    let summary = engine.run().await;

    assert_eq!(summary.zones[0].deleted, 0);
    assert_eq!(summary.zones[1].deleted, 1);
    assert_eq!(store.mirrored("d1").await.len(), 1);
    assert!(store.mirrored("d2").await.is_empty());
    assert_eq!(store.mirrored("d1").await["r1"].project_id, "p1");
}
