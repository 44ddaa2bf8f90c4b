//! Core sync engine
//!
//! The SyncEngine is responsible for:
//! - Checking that the authority and the mirror store are usable
//! - Taking both snapshots of every configured zone
//! - Handing them to the reconciler
//! - Folding the per-zone results into a [`RunSummary`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐                ┌─────────────┐
//! │ RecordAuthority │                │ MirrorStore │
//! └─────────────────┘                └─────────────┘
//!          │ remote snapshot  local snapshot │   ▲
//!          ▼                                 ▼   │ writes
//!   ┌────────────┐    both snapshots   ┌────────────┐
//!   │ SyncEngine │ ──────────────────▶ │ Reconciler │
//!   └────────────┘                     └────────────┘
//!          │
//!          ▼
//!  RunSummary + SyncEvents
//! ```
//!
//! ## Zone Flow
//!
//! 1. Fetch the remote snapshot; on failure the zone is aborted
//! 2. Read the local snapshot; on failure the zone is aborted
//! 3. Plan and apply the writes
//! 4. Emit events and record the zone report
//!
//! Zones run one after another in configuration order and every write is
//! awaited before the next is issued.

use crate::config::{DomainMapping, SyncConfig, SyncSettings};
use crate::error::{Error, Result};
use crate::reconcile::{Operation, Reconciler, ZoneOutcome};
use crate::snapshot::{fetch_zone_records, read_local_mirror};
use crate::summary::{RunSummary, ZoneReport};
use crate::traits::{MirrorStore, RecordAuthority};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Run started
    RunStarted { zones: usize, dry_run: bool },

    /// Zone processing started
    ZoneStarted { domain: String },

    /// Zone reconciled
    ZoneCompleted {
        domain: String,
        added: usize,
        updated: usize,
        deleted: usize,
        failures: usize,
    },

    /// Zone aborted before any write
    ZoneFailed { domain: String, error: String },

    /// Row created for a newly seen record
    RecordCreated {
        domain: String,
        remote_id: String,
        name: String,
    },

    /// Row rewritten after the record drifted
    RecordUpdated {
        domain: String,
        remote_id: String,
        previous_name: String,
        name: String,
    },

    /// Row removed after the record disappeared
    RecordDeleted {
        domain: String,
        remote_id: String,
        name: String,
    },

    /// A single write failed
    RecordFailed {
        domain: String,
        remote_id: String,
        operation: Operation,
        error: String,
    },

    /// Run finished
    RunFinished { succeeded: usize, failed: usize },
}

/// Core sync engine
///
/// Owns the authority and store clients for the length of a run. Both are
/// injected as trait objects; the engine never constructs a client itself.
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Verify the environment with [`SyncEngine::check_connectivity()`]
/// 3. Reconcile every zone with [`SyncEngine::run()`]
///
/// ## Event Channel
///
/// Events go through a bounded channel. When it is full, events are dropped
/// (logged at warn) so a slow consumer never stalls a pass.
pub struct SyncEngine {
    /// Authority the records are read from
    authority: Box<dyn RecordAuthority>,

    /// Store the mirror rows live in
    store: Box<dyn MirrorStore>,

    /// Pass settings
    settings: SyncSettings,

    /// Zones to reconcile, in order
    domains: Vec<DomainMapping>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        authority: Box<dyn RecordAuthority>,
        store: Box<dyn MirrorStore>,
        settings: SyncSettings,
        domains: Vec<DomainMapping>,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        settings.validate()?;

        let (tx, rx) = mpsc::channel(settings.event_channel_capacity);

        let engine = Self {
            authority,
            store,
            settings,
            domains,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Create an engine from a full configuration
    ///
    /// The whole configuration is validated, not only the parts the engine
    /// keeps.
    pub fn from_config(
        authority: Box<dyn RecordAuthority>,
        store: Box<dyn MirrorStore>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;
        Self::new(authority, store, config.sync, config.domains)
    }

    /// Verify the authority and the store before touching any zone
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Both reachable and the mirror table exists
    /// - `Err(Error)`: The run must not start
    pub async fn check_connectivity(&self) -> Result<()> {
        self.authority.ping().await.map_err(|e| {
            Error::authority(
                self.authority.authority_name(),
                format!("connectivity check failed: {}", e),
            )
        })?;
        info!("{} connection test passed", self.authority.authority_name());

        self.store.ping().await.map_err(|e| {
            Error::store(format!(
                "{} connectivity check failed: {}",
                self.store.store_name(),
                e
            ))
        })?;
        info!("{} connection test passed", self.store.store_name());

        let exists = self.store.table_exists().await.map_err(|e| {
            Error::store(format!(
                "{} table check failed: {}",
                self.store.store_name(),
                e
            ))
        })?;
        if !exists {
            return Err(Error::store(format!(
                "{} mirror table does not exist",
                self.store.store_name()
            )));
        }
        info!("Mirror table exists");

        Ok(())
    }

    /// Reconcile a single zone
    ///
    /// # Returns
    ///
    /// - `Ok(ZoneOutcome)`: Zone reconciled; may still carry record failures
    /// - `Err(Error)`: Fetch or read failed, nothing was written
    pub async fn sync_zone(&self, mapping: &DomainMapping) -> Result<ZoneOutcome> {
        let remote =
            fetch_zone_records(self.authority.as_ref(), &mapping.domain, &self.settings).await?;
        info!(
            "Found {} valid DNS records for domain: {}",
            remote.len(),
            mapping.domain
        );

        let local = read_local_mirror(self.store.as_ref(), &mapping.domain_id).await?;
        info!(
            "Found {} local records for domain: {}",
            local.len(),
            mapping.domain
        );
        if local.skipped > 0 {
            warn!(
                "{} malformed local row(s) skipped for domain: {}",
                local.skipped, mapping.domain
            );
        }

        let reconciler = Reconciler::new(self.store.as_ref())
            .with_dry_run(self.settings.dry_run)
            .with_events(self.event_tx.clone());

        Ok(reconciler.reconcile(&remote, &local, mapping).await)
    }

    /// Reconcile every configured zone once
    ///
    /// A failed zone is reported and the next zone runs anyway.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::new(Utc::now(), self.settings.dry_run);

        if self.settings.dry_run {
            info!("Dry-run mode: no rows will be written");
        }
        self.emit_event(SyncEvent::RunStarted {
            zones: self.domains.len(),
            dry_run: self.settings.dry_run,
        });

        for mapping in &self.domains {
            info!(
                "Processing domain: {} (project_id: {}, domain_id: {})",
                mapping.domain, mapping.project_id, mapping.domain_id
            );
            self.emit_event(SyncEvent::ZoneStarted {
                domain: mapping.domain.clone(),
            });

            match self.sync_zone(mapping).await {
                Ok(outcome) => {
                    info!(
                        "Domain {} sync completed: +{} ~{} -{}",
                        mapping.domain, outcome.added, outcome.updated, outcome.deleted
                    );
                    if !outcome.failures.is_empty() {
                        warn!(
                            "Domain {}: {} record write(s) failed",
                            mapping.domain,
                            outcome.failures.len()
                        );
                    }
                    self.emit_event(SyncEvent::ZoneCompleted {
                        domain: mapping.domain.clone(),
                        added: outcome.added,
                        updated: outcome.updated,
                        deleted: outcome.deleted,
                        failures: outcome.failures.len(),
                    });
                    summary.push(ZoneReport::completed(&mapping.domain, outcome));
                }
                Err(e) => {
                    error!("Error syncing domain {}: {}", mapping.domain, e);
                    self.emit_event(SyncEvent::ZoneFailed {
                        domain: mapping.domain.clone(),
                        error: e.to_string(),
                    });
                    summary.push(ZoneReport::failed(&mapping.domain, e));
                }
            }
        }

        summary.finish(Utc::now());
        self.emit_event(SyncEvent::RunFinished {
            succeeded: summary.succeeded(),
            failed: summary.failed(),
        });
        debug!("Run finished: {} zone(s)", summary.zones.len());

        summary
    }

    /// Emit an event (non-blocking with bounded channel)
    fn emit_event(&self, event: SyncEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event");
        }
    }
}
