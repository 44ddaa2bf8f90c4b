//! Test doubles and common utilities for contract tests
//!
//! - [`ScriptedAuthority`]: serves pages from an in-memory record list and can
//!   misreport totals or fail outright
//! - [`CountingStore`]: wraps a [`MemoryMirrorStore`], counts writes and can
//!   fail selected ones

#![allow(dead_code)]

use dns_mirror_core::config::{DomainMapping, SyncSettings};
use dns_mirror_core::error::{Error, Result};
use dns_mirror_core::model::{LocalRecord, RecordChange, RecordKind, RemoteRecord, StoredRow};
use dns_mirror_core::store::MemoryMirrorStore;
use dns_mirror_core::traits::{MirrorStore, PageRequest, RecordAuthority, RecordPage};
use dns_mirror_core::{PROVENANCE_TAG, SyncEngine, SyncEvent};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// How the scripted authority reports its totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// Total equals the number of records held
    Honest,
    /// Always report this total, regardless of what is held
    ReportedTotal(u64),
    /// Report this total on page 1, then the number of records held, as if
    /// the zone grew while it was being listed
    FirstPageTotal(u64),
    /// Serve full pages of fresh records forever, with a total one above
    /// what has been served so far
    Endless,
}

/// A RecordAuthority serving pages from a shared record list
#[derive(Clone)]
pub struct ScriptedAuthority {
    records: Arc<Mutex<HashMap<String, Vec<RemoteRecord>>>>,
    failing_zones: Arc<Mutex<HashSet<String>>>,
    paging: Arc<Mutex<Paging>>,
    page_calls: Arc<Mutex<Vec<(String, u64)>>>,
}

impl ScriptedAuthority {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            failing_zones: Arc::new(Mutex::new(HashSet::new())),
            paging: Arc::new(Mutex::new(Paging::Honest)),
            page_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the record list of a zone
    pub fn set_records(&self, zone: &str, records: Vec<RemoteRecord>) {
        self.records
            .lock()
            .unwrap()
            .insert(zone.to_string(), records);
    }

    /// Make every page request for `zone` fail
    pub fn fail_zone(&self, zone: &str) {
        self.failing_zones.lock().unwrap().insert(zone.to_string());
    }

    pub fn set_paging(&self, paging: Paging) {
        *self.paging.lock().unwrap() = paging;
    }

    /// Page numbers requested for `zone`, in order
    pub fn pages_requested(&self, zone: &str) -> Vec<u64> {
        self.page_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(z, _)| z == zone)
            .map(|(_, page)| *page)
            .collect()
    }
}

#[async_trait::async_trait]
impl RecordAuthority for ScriptedAuthority {
    async fn list_records_page(&self, zone: &str, page: PageRequest) -> Result<RecordPage> {
        self.page_calls
            .lock()
            .unwrap()
            .push((zone.to_string(), page.page_number));

        if self.failing_zones.lock().unwrap().contains(zone) {
            return Err(Error::http(format!("connection reset while listing {}", zone)));
        }

        let paging = *self.paging.lock().unwrap();
        if paging == Paging::Endless {
            let records = (0..page.page_size)
                .map(|i| {
                    remote(
                        &format!("gen-{}-{}", page.page_number, i),
                        zone,
                        &format!("h{}-{}", page.page_number, i),
                        "10.0.0.1",
                    )
                })
                .collect();
            return Ok(RecordPage {
                records,
                total_count: page.page_number * page.page_size + 1,
            });
        }

        let all = self
            .records
            .lock()
            .unwrap()
            .get(zone)
            .cloned()
            .unwrap_or_default();
        let start = ((page.page_number - 1) * page.page_size) as usize;
        let records: Vec<_> = all
            .iter()
            .skip(start)
            .take(page.page_size as usize)
            .cloned()
            .collect();

        let total_count = match paging {
            Paging::ReportedTotal(total) => total,
            Paging::FirstPageTotal(total) if page.page_number == 1 => total,
            _ => all.len() as u64,
        };
        Ok(RecordPage {
            records,
            total_count,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn authority_name(&self) -> &'static str {
        "scripted"
    }
}

/// A MirrorStore over [`MemoryMirrorStore`] that counts and can fail writes
#[derive(Clone)]
pub struct CountingStore {
    inner: MemoryMirrorStore,
    inserts: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    /// Writes touching one of these names fail
    poisoned_names: Arc<Mutex<HashSet<String>>>,
    fail_reads: Arc<AtomicBool>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::wrapping(MemoryMirrorStore::new())
    }

    pub fn wrapping(inner: MemoryMirrorStore) -> Self {
        Self {
            inner,
            inserts: Arc::new(AtomicUsize::new(0)),
            updates: Arc::new(AtomicUsize::new(0)),
            deletes: Arc::new(AtomicUsize::new(0)),
            poisoned_names: Arc::new(Mutex::new(HashSet::new())),
            fail_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn inner(&self) -> &MemoryMirrorStore {
        &self.inner
    }

    /// Make every write involving `name` fail
    pub fn poison(&self, name: &str) {
        self.poisoned_names
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Total write calls, failed ones included
    pub fn write_count(&self) -> usize {
        self.insert_count() + self.update_count() + self.delete_count()
    }

    /// Decoded rows owned by `zone_id`, keyed by remote id
    pub async fn mirrored(&self, zone_id: &str) -> HashMap<String, LocalRecord> {
        self.inner
            .read_rows(zone_id, PROVENANCE_TAG)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|row| row.decode().ok())
            .filter_map(|record| record.remote_id.clone().map(|id| (id, record)))
            .collect()
    }

    fn is_poisoned(&self, name: &str) -> bool {
        self.poisoned_names.lock().unwrap().contains(name)
    }
}

#[async_trait::async_trait]
impl MirrorStore for CountingStore {
    async fn read_rows(&self, zone_id: &str, source: &str) -> Result<Vec<StoredRow>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::store("lost connection to database"));
        }
        self.inner.read_rows(zone_id, source).await
    }

    async fn insert_row(&self, record: &LocalRecord) -> Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.is_poisoned(&record.name) {
            return Err(Error::write(format!("insert of {} rejected", record.name)));
        }
        self.inner.insert_row(record).await
    }

    async fn update_row(&self, id: &str, change: &RecordChange) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.is_poisoned(&change.name) {
            return Err(Error::write(format!("update of {} rejected", change.name)));
        }
        self.inner.update_row(id, change).await
    }

    async fn delete_row(&self, id: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let name = self
            .inner
            .rows()
            .await
            .into_iter()
            .find(|row| row.id.as_deref() == Some(id))
            .and_then(|row| row.name);
        if let Some(name) = name
            && self.is_poisoned(&name)
        {
            return Err(Error::write(format!("delete of {} rejected", name)));
        }
        self.inner.delete_row(id).await
    }

    async fn table_exists(&self) -> Result<bool> {
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "counting"
    }
}

/// Active remote record with default metadata
pub fn remote(id: &str, zone: &str, label: &str, value: &str) -> RemoteRecord {
    RemoteRecord::new(id, zone, label, RecordKind::A, value)
}

pub fn example_mapping() -> DomainMapping {
    DomainMapping::new("p1", "d1", "example.com")
}

/// Engine over clones of the given fakes
pub fn engine_for(
    authority: &ScriptedAuthority,
    store: &CountingStore,
    settings: SyncSettings,
    domains: Vec<DomainMapping>,
) -> (SyncEngine, mpsc::Receiver<SyncEvent>) {
    SyncEngine::new(
        Box::new(authority.clone()),
        Box::new(store.clone()),
        settings,
        domains,
    )
    .expect("engine construction succeeds")
}

/// Drain every event currently queued
pub fn drain(events: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
