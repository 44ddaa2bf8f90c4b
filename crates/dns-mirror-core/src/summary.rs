//! Run-level outcome aggregation

use crate::reconcile::{RecordFailure, ZoneOutcome};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const RULE_WIDTH: usize = 70;

/// Result of one zone within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneReport {
    pub domain: String,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Record-level failures; they do not fail the zone
    pub failures: Vec<RecordFailure>,
    /// Zone-level error, set when the zone was aborted
    pub error: Option<String>,
}

impl ZoneReport {
    /// Report for a zone that completed
    pub fn completed(domain: impl Into<String>, outcome: ZoneOutcome) -> Self {
        Self {
            domain: domain.into(),
            added: outcome.added,
            updated: outcome.updated,
            deleted: outcome.deleted,
            failures: outcome.failures,
            error: None,
        }
    }

    /// Report for a zone that was aborted before any write
    pub fn failed(domain: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            domain: domain.into(),
            added: 0,
            updated: 0,
            deleted: 0,
            failures: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Totals over the successful zones of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub record_failures: usize,
}

/// Result of one full pass over all configured zones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// One report per zone, in configuration order
    pub zones: Vec<ZoneReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Whether writes were only planned
    pub dry_run: bool,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            zones: Vec::new(),
            started_at,
            finished_at: started_at,
            dry_run,
        }
    }

    pub fn push(&mut self, report: ZoneReport) {
        self.zones.push(report);
    }

    /// Stamp the end of the run
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = finished_at;
    }

    /// Sum the counts of successful zones
    pub fn totals(&self) -> Totals {
        self.zones
            .iter()
            .filter(|z| z.is_success())
            .fold(Totals::default(), |mut t, z| {
                t.added += z.added;
                t.updated += z.updated;
                t.deleted += z.deleted;
                t.record_failures += z.failures.len();
                t
            })
    }

    pub fn succeeded(&self) -> usize {
        self.zones.iter().filter(|z| z.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.zones.len() - self.succeeded()
    }

    /// True if no zone was aborted
    pub fn is_success(&self) -> bool {
        self.zones.iter().all(ZoneReport::is_success)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{}", heavy)?;
        if self.dry_run {
            writeln!(f, "DNS INCREMENTAL SYNC SUMMARY (DRY-RUN)")?;
        } else {
            writeln!(f, "DNS INCREMENTAL SYNC SUMMARY")?;
        }
        writeln!(f, "{}", heavy)?;

        for zone in &self.zones {
            match &zone.error {
                Some(error) => {
                    writeln!(f, "{:<20} ✗ FAILED", zone.domain)?;
                    writeln!(f, "  Error: {}", error)?;
                }
                None => {
                    writeln!(
                        f,
                        "{:<20} ✓ SUCCESS (+{} ~{} -{})",
                        zone.domain, zone.added, zone.updated, zone.deleted
                    )?;
                    for failure in &zone.failures {
                        writeln!(
                            f,
                            "  ! {} {} ({}): {}",
                            failure.operation, failure.remote_id, failure.name, failure.error
                        )?;
                    }
                }
            }
        }

        let totals = self.totals();
        writeln!(f, "{}", light)?;
        writeln!(f, "Total domains processed: {}", self.zones.len())?;
        writeln!(f, "Successful: {}", self.succeeded())?;
        writeln!(f, "Failed: {}", self.failed())?;
        writeln!(
            f,
            "Total changes: +{} ~{} -{}",
            totals.added, totals.updated, totals.deleted
        )?;
        if totals.record_failures > 0 {
            writeln!(f, "Record failures: {}", totals.record_failures)?;
        }
        writeln!(
            f,
            "Sync time: {}",
            self.finished_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        )?;
        write!(f, "{}", heavy)
    }
}
