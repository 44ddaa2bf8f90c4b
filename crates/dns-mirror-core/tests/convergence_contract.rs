//! Contract Test: Convergence
//!
//! Verifies that one pass brings the mirror in line with the authority.
//!
//! Constraints verified:
//! - Every remote id ends up with exactly one row carrying its name, kind and value
//! - Rows whose remote id disappeared are deleted
//! - Updates keep the primary key and creation time
//! - Inactive and unsupported records are not mirrored
//! - A malformed row is left alone and its record gets no second row
//!
//! If this test fails, the mirror drifts from the authority.

mod common;

use common::*;
use dns_mirror_core::config::SyncSettings;
use dns_mirror_core::model::{LocalRecord, RecordKind, RecordStatus, StoredRow, new_local_id};
use dns_mirror_core::store::MemoryMirrorStore;

#[tokio::test]
async fn walkthrough_create_repeat_delete_update() {
    let authority = ScriptedAuthority::new();
    let store = CountingStore::new();
    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![example_mapping()],
    );

    // Pass 1: empty mirror, two remote records
    authority.set_records(
        "example.com",
        vec![
            remote("id1", "example.com", "www", "1.1.1.1"),
            remote("id2", "example.com", "", "2.2.2.2"),
        ],
    );
    let summary = engine.run().await;
    let zone = &summary.zones[0];
    assert_eq!((zone.added, zone.updated, zone.deleted), (2, 0, 0));

    let rows = store.mirrored("d1").await;
    assert_eq!(rows["id1"].name, "www.example.com");
    assert_eq!(rows["id2"].name, "example.com");
    assert_eq!(rows["id2"].project_id, "p1");

    // Pass 2: nothing changed
    let summary = engine.run().await;
    let zone = &summary.zones[0];
    assert_eq!((zone.added, zone.updated, zone.deleted), (0, 0, 0));

    // Pass 3: id1 dropped remotely
    authority.set_records(
        "example.com",
        vec![remote("id2", "example.com", "", "2.2.2.2")],
    );
    let summary = engine.run().await;
    let zone = &summary.zones[0];
    assert_eq!((zone.added, zone.updated, zone.deleted), (0, 0, 1));
    assert!(!store.mirrored("d1").await.contains_key("id1"));

    // Pass 4: id2 changes value
    let before = store.mirrored("d1").await["id2"].clone();
    authority.set_records(
        "example.com",
        vec![remote("id2", "example.com", "", "3.3.3.3")],
    );
    let summary = engine.run().await;
    let zone = &summary.zones[0];
    assert_eq!((zone.added, zone.updated, zone.deleted), (0, 1, 0));

    let after = store.mirrored("d1").await["id2"].clone();
    assert_eq!(after.value, "3.3.3.3");
    assert_eq!(after.id, before.id);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.name, before.name);
    assert!(after.updated_at >= before.updated_at);
}

#[tokio::test]
async fn pass_converges_mixed_state() {
    let authority = ScriptedAuthority::new();
    authority.set_records(
        "example.com",
        vec![
            remote("keep", "example.com", "a", "1.1.1.1"),
            remote("drift", "example.com", "b", "2.2.2.2"),
            remote("fresh", "example.com", "c", "3.3.3.3"),
        ],
    );

    let now = chrono::Utc::now();
    let seeded = |remote_id: &str, label: &str, value: &str| {
        LocalRecord::from_remote(
            &remote(remote_id, "example.com", label, value),
            "d1",
            "p1",
            new_local_id(),
            now,
        )
    };
    let inner = MemoryMirrorStore::with_rows([
        StoredRow::from(&seeded("keep", "a", "1.1.1.1")),
        StoredRow::from(&seeded("drift", "old-b", "2.2.2.2")),
        StoredRow::from(&seeded("gone", "d", "4.4.4.4")),
    ]);
    let store = CountingStore::wrapping(inner);

    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![example_mapping()],
    );
    let summary = engine.run().await;
    let zone = &summary.zones[0];
    assert_eq!((zone.added, zone.updated, zone.deleted), (1, 1, 1));

    let rows = store.mirrored("d1").await;
    let mut ids: Vec<_> = rows.keys().cloned().collect();
    ids.sort();
    assert_eq!(ids, vec!["drift", "fresh", "keep"]);
    assert_eq!(rows["drift"].name, "b.example.com");
    assert_eq!(rows["fresh"].value, "3.3.3.3");
}

#[tokio::test]
async fn kind_change_is_an_update() {
    let authority = ScriptedAuthority::new();
    let store = CountingStore::new();
    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![example_mapping()],
    );

    authority.set_records(
        "example.com",
        vec![remote("r1", "example.com", "api", "1.1.1.1")],
    );
    engine.run().await;

    let mut cname = remote("r1", "example.com", "api", "lb.example.net");
    cname.kind = RecordKind::Cname;
    authority.set_records("example.com", vec![cname]);
    let summary = engine.run().await;

    assert_eq!(summary.zones[0].updated, 1);
    let row = store.mirrored("d1").await["r1"].clone();
    assert_eq!(row.kind, RecordKind::Cname);
    assert_eq!(row.value, "lb.example.net");
}

#[tokio::test]
async fn inactive_and_unsupported_records_are_not_mirrored() {
    let authority = ScriptedAuthority::new();
    let mut txt = remote("txt", "example.com", "_verify", "token");
    txt.kind = RecordKind::Txt;
    authority.set_records(
        "example.com",
        vec![
            remote("on", "example.com", "www", "1.1.1.1"),
            remote("off", "example.com", "old", "2.2.2.2").with_status(RecordStatus::Inactive),
            txt,
        ],
    );

    let store = CountingStore::new();
    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![example_mapping()],
    );
    let summary = engine.run().await;

    assert_eq!(summary.zones[0].added, 1);
    let rows = store.mirrored("d1").await;
    assert_eq!(rows.len(), 1);
    assert!(rows.contains_key("on"));
}

#[tokio::test]
async fn disabling_a_record_removes_its_row() {
    let authority = ScriptedAuthority::new();
    let store = CountingStore::new();
    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![example_mapping()],
    );

    authority.set_records(
        "example.com",
        vec![remote("r1", "example.com", "www", "1.1.1.1")],
    );
    engine.run().await;

    authority.set_records(
        "example.com",
        vec![remote("r1", "example.com", "www", "1.1.1.1").with_status(RecordStatus::Inactive)],
    );
    let summary = engine.run().await;

    assert_eq!(summary.zones[0].deleted, 1);
    assert!(store.mirrored("d1").await.is_empty());
}

#[tokio::test]
async fn empty_remote_clears_the_zone() {
    let authority = ScriptedAuthority::new();
    let store = CountingStore::new();
    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![example_mapping()],
    );

    authority.set_records(
        "example.com",
        vec![
            remote("r1", "example.com", "a", "1.1.1.1"),
            remote("r2", "example.com", "b", "2.2.2.2"),
        ],
    );
    engine.run().await;

    authority.set_records("example.com", Vec::new());
    let summary = engine.run().await;

    assert!(summary.is_success());
    assert_eq!(summary.zones[0].deleted, 2);
    assert!(store.mirrored("d1").await.is_empty());
}

#[tokio::test]
async fn duplicate_rows_collapse_to_one() {
    let record = remote("r1", "example.com", "www", "1.1.1.1");
    let now = chrono::Utc::now();
    let first = LocalRecord::from_remote(&record, "d1", "p1", "row-first".to_string(), now);
    let second = LocalRecord::from_remote(&record, "d1", "p1", "row-second".to_string(), now);

    let store = CountingStore::wrapping(MemoryMirrorStore::with_rows([
        StoredRow::from(&first),
        StoredRow::from(&second),
    ]));
    let authority = ScriptedAuthority::new();
    authority.set_records("example.com", vec![record]);

    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![example_mapping()],
    );
    let summary = engine.run().await;

    let zone = &summary.zones[0];
    assert_eq!((zone.added, zone.updated, zone.deleted), (0, 0, 1));

    let rows = store.inner().rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id.as_deref(), Some("row-first"));
}

#[tokio::test]
async fn malformed_rows_are_skipped_not_deleted() {
    let broken = StoredRow {
        id: Some("broken".to_string()),
        name: None,
        kind: Some("A".to_string()),
        value: Some("1.1.1.1".to_string()),
        remote_id: Some("r1".to_string()),
        zone_id: Some("d1".to_string()),
        project_id: Some("p1".to_string()),
        source: Some(dns_mirror_core::PROVENANCE_TAG.to_string()),
        created_at: None,
        updated_at: None,
    };
    let store = CountingStore::wrapping(MemoryMirrorStore::with_rows([broken.clone()]));
    let authority = ScriptedAuthority::new();
    authority.set_records(
        "example.com",
        vec![
            remote("r1", "example.com", "www", "1.1.1.1"),
            remote("r2", "example.com", "api", "2.2.2.2"),
        ],
    );

    let (engine, _events) = engine_for(
        &authority,
        &store,
        SyncSettings::default(),
        vec![example_mapping()],
    );
    let summary = engine.run().await;

    // r1 is still referenced by the broken row: no second row for it
    assert!(summary.is_success());
    assert_eq!(summary.zones[0].added, 1);
    assert_eq!(store.delete_count(), 0);

    let rows = store.inner().rows().await;
    assert!(rows.contains(&broken));
    let r1_rows = rows
        .iter()
        .filter(|row| row.remote_id.as_deref() == Some("r1") && row.zone_id.as_deref() == Some("d1"))
        .count();
    assert_eq!(r1_rows, 1);
    assert!(store.mirrored("d1").await.contains_key("r2"));

    // A second pass still leaves a single row for r1
    engine.run().await;
    let r1_rows = store
        .inner()
        .rows()
        .await
        .iter()
        .filter(|row| row.remote_id.as_deref() == Some("r1"))
        .count();
    assert_eq!(r1_rows, 1);
    assert_eq!(store.insert_count(), 1);
}
