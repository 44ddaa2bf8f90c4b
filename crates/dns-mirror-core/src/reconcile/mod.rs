//! Three-way reconciliation of one zone
//!
//! Reconciliation is split in two steps:
//!
//! 1. [`plan_zone`] diffs the remote and local snapshots into a
//!    [`ReconcilePlan`]. Pure; no I/O.
//! 2. [`Reconciler::apply_plan`] issues the planned writes one by one against the
//!    mirror store.
//!
//! ```text
//!   remote ids ──┬── only remote ──────────▶ create
//!                ├── both, fields drifted ─▶ update
//!                └── both, equal ──────────▶ (no write)
//!   local ids ───── only local ───────────▶ delete
//! ```
//!
//! A failed write is recorded in the [`ZoneOutcome`] and the pass moves on to
//! the next record. Each id is handled independently, so the final mirror
//! state does not depend on the order writes are issued in.

use crate::config::DomainMapping;
use crate::engine::SyncEvent;
use crate::model::{LocalRecord, RecordChange, RemoteRecord, new_local_id};
use crate::snapshot::{LocalSnapshot, RemoteSnapshot};
use crate::traits::MirrorStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Kind of write the reconciler issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// Whether the mirrored row has drifted from the authority
///
/// Compares composed name, then kind, then value.
pub fn needs_update(remote: &RemoteRecord, local: &LocalRecord) -> bool {
    local.name != remote.full_name() || local.kind != remote.kind || local.value != remote.value
}

/// Update of an existing row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    /// The row as read
    pub local: LocalRecord,
    /// Fields to write
    pub change: RecordChange,
}

/// Writes needed to bring one zone's mirror in line with the authority
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub creates: Vec<LocalRecord>,
    pub updates: Vec<PlannedUpdate>,
    pub deletes: Vec<LocalRecord>,
}

impl ReconcilePlan {
    /// Whether the plan issues no writes
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Total number of planned writes
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }
}

/// Diff the two snapshots of a zone
///
/// `now` stamps created rows and updates. Surplus rows from the local
/// snapshot are always deleted. Records still referenced by an unreadable
/// row get no new row.
pub fn plan_zone(
    remote: &RemoteSnapshot,
    local: &LocalSnapshot,
    mapping: &DomainMapping,
    now: DateTime<Utc>,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for (record_id, remote_record) in remote {
        match local.records.get(record_id) {
            None if local.is_unreadable(record_id) => {
                warn!(
                    "Not creating a row for record {} ({}): an unreadable row already references it",
                    record_id,
                    remote_record.full_name()
                );
            }
            None => plan.creates.push(LocalRecord::from_remote(
                remote_record,
                &mapping.domain_id,
                &mapping.project_id,
                new_local_id(),
                now,
            )),
            Some(local_record) if needs_update(remote_record, local_record) => {
                plan.updates.push(PlannedUpdate {
                    local: local_record.clone(),
                    change: RecordChange::from_remote(remote_record, now),
                })
            }
            Some(_) => {}
        }
    }

    for (remote_id, local_record) in &local.records {
        if !remote.contains_key(remote_id) {
            plan.deletes.push(local_record.clone());
        }
    }
    plan.deletes.extend(local.surplus.iter().cloned());

    plan
}

/// A single write that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Remote id of the record the write was for
    pub remote_id: String,
    pub operation: Operation,
    /// Fully-qualified name involved
    pub name: String,
    pub error: String,
}

/// Result of reconciling one zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneOutcome {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failures: Vec<RecordFailure>,
}

impl ZoneOutcome {
    /// Total successful writes
    pub fn changes(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

/// Applies reconciliation plans to a mirror store
///
/// The store is borrowed; the reconciler owns no connection of its own.
pub struct Reconciler<'a> {
    store: &'a dyn MirrorStore,
    dry_run: bool,
    events: Option<mpsc::Sender<SyncEvent>>,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler writing to `store`
    pub fn new(store: &'a dyn MirrorStore) -> Self {
        Self {
            store,
            dry_run: false,
            events: None,
        }
    }

    /// Log planned writes instead of issuing them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Emit a [`SyncEvent`] for every applied or failed write
    pub fn with_events(mut self, events: mpsc::Sender<SyncEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Diff and apply in one step
    pub async fn reconcile(
        &self,
        remote: &RemoteSnapshot,
        local: &LocalSnapshot,
        mapping: &DomainMapping,
    ) -> ZoneOutcome {
        let plan = plan_zone(remote, local, mapping, Utc::now());
        debug!(
            "Plan for {}: {} create(s), {} update(s), {} delete(s)",
            mapping.domain,
            plan.creates.len(),
            plan.updates.len(),
            plan.deletes.len()
        );
        self.apply_plan(&mapping.domain, plan).await
    }

    /// Apply a plan, one write at a time
    ///
    /// Never fails as a whole; failed writes are collected in the outcome.
    pub async fn apply_plan(&self, domain: &str, plan: ReconcilePlan) -> ZoneOutcome {
        let mut outcome = ZoneOutcome::default();

        for record in plan.creates {
            let remote_id = record.remote_id.clone().unwrap_or_default();
            if self.dry_run {
                info!("[DRY-RUN] Would add record: {} ({} {})", record.name, record.kind, record.value);
                outcome.added += 1;
                continue;
            }
            match self.store.insert_row(&record).await {
                Ok(()) => {
                    info!("Added new record: {}", record.name);
                    outcome.added += 1;
                    self.emit(SyncEvent::RecordCreated {
                        domain: domain.to_string(),
                        remote_id,
                        name: record.name,
                    });
                }
                Err(e) => self.fail(&mut outcome, domain, remote_id, Operation::Create, record.name, e),
            }
        }

        for update in plan.updates {
            let remote_id = update.local.remote_id.clone().unwrap_or_default();
            if self.dry_run {
                info!(
                    "[DRY-RUN] Would update record: {} -> {} ({} {})",
                    update.local.name, update.change.name, update.change.kind, update.change.value
                );
                outcome.updated += 1;
                continue;
            }
            match self.store.update_row(&update.local.id, &update.change).await {
                Ok(()) => {
                    info!("Updated record: {} -> {}", update.local.name, update.change.name);
                    outcome.updated += 1;
                    self.emit(SyncEvent::RecordUpdated {
                        domain: domain.to_string(),
                        remote_id,
                        previous_name: update.local.name,
                        name: update.change.name,
                    });
                }
                Err(e) => self.fail(
                    &mut outcome,
                    domain,
                    remote_id,
                    Operation::Update,
                    update.change.name,
                    e,
                ),
            }
        }

        for record in plan.deletes {
            let remote_id = record.remote_id.clone().unwrap_or_default();
            if self.dry_run {
                info!("[DRY-RUN] Would delete record: {}", record.name);
                outcome.deleted += 1;
                continue;
            }
            match self.store.delete_row(&record.id).await {
                Ok(()) => {
                    info!("Deleted record: {}", record.name);
                    outcome.deleted += 1;
                    self.emit(SyncEvent::RecordDeleted {
                        domain: domain.to_string(),
                        remote_id,
                        name: record.name,
                    });
                }
                Err(e) => self.fail(&mut outcome, domain, remote_id, Operation::Delete, record.name, e),
            }
        }

        outcome
    }

    fn fail(
        &self,
        outcome: &mut ZoneOutcome,
        domain: &str,
        remote_id: String,
        operation: Operation,
        name: String,
        err: crate::Error,
    ) {
        error!("Failed to {} record {} ({}): {}", operation, remote_id, name, err);
        self.emit(SyncEvent::RecordFailed {
            domain: domain.to_string(),
            remote_id: remote_id.clone(),
            operation,
            error: err.to_string(),
        });
        outcome.failures.push(RecordFailure {
            remote_id,
            operation,
            name,
            error: err.to_string(),
        });
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.events
            && tx.try_send(event).is_err()
        {
            warn!("Event channel full, dropping event");
        }
    }
}
