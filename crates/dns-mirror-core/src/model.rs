//! Record model and normalization
//!
//! Two record shapes meet in this crate:
//!
//! - [`RemoteRecord`]: what the authority serves. Read-only.
//! - [`LocalRecord`]: the mirror row this process owns.
//!
//! [`compose_name`] is the single place a fully-qualified name is derived from
//! a relative label. Every comparison goes through it so both sides of the
//! diff agree on what a name looks like.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Label value the authority uses for the zone apex
pub const APEX_MARKER: &str = "@";

/// Provenance tag stamped on every row this process creates
pub const PROVENANCE_TAG: &str = "Aliyun-DNS-Sync";

/// Compose the fully-qualified name of a record
///
/// An empty label or the apex marker yields the zone itself.
///
/// ```
/// use dns_mirror_core::model::compose_name;
///
/// assert_eq!(compose_name("www", "example.com"), "www.example.com");
/// assert_eq!(compose_name("@", "example.com"), "example.com");
/// assert_eq!(compose_name("", "example.com"), "example.com");
/// ```
pub fn compose_name(label: &str, zone: &str) -> String {
    if label.is_empty() || label == APEX_MARKER {
        zone.to_string()
    } else {
        format!("{}.{}", label, zone)
    }
}

/// Generate a fresh local primary key
///
/// Random 128-bit identifier rendered as 32 lowercase hex characters.
pub fn new_local_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// DNS record kind
///
/// Kinds without a dedicated variant are kept verbatim (upper-cased) in
/// [`RecordKind::Other`] so they round-trip through storage unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordKind {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
    Srv,
    Caa,
    Other(String),
}

impl RecordKind {
    /// Wire representation ("A", "CNAME", ...)
    pub fn as_str(&self) -> &str {
        match self {
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
            RecordKind::Cname => "CNAME",
            RecordKind::Mx => "MX",
            RecordKind::Txt => "TXT",
            RecordKind::Ns => "NS",
            RecordKind::Srv => "SRV",
            RecordKind::Caa => "CAA",
            RecordKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Ok(match upper.as_str() {
            "A" => RecordKind::A,
            "AAAA" => RecordKind::Aaaa,
            "CNAME" => RecordKind::Cname,
            "MX" => RecordKind::Mx,
            "TXT" => RecordKind::Txt,
            "NS" => RecordKind::Ns,
            "SRV" => RecordKind::Srv,
            "CAA" => RecordKind::Caa,
            _ => RecordKind::Other(upper),
        })
    }
}

impl From<String> for RecordKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for RecordKind {
    fn from(s: &str) -> Self {
        RecordKind::from(s.to_string())
    }
}

impl From<RecordKind> for String {
    fn from(kind: RecordKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Activation status of a remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Inactive,
}

impl RecordStatus {
    /// Map the authority's wire value
    ///
    /// Only `ENABLE` means active; anything else, including unknown values,
    /// keeps the record out of the snapshot.
    pub fn from_wire(status: &str) -> Self {
        if status.eq_ignore_ascii_case("ENABLE") {
            RecordStatus::Active
        } else {
            RecordStatus::Inactive
        }
    }
}

/// Authoritative record as served by the remote authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Authority-assigned identifier, unique within the zone
    pub record_id: String,
    /// Zone (domain) the record belongs to
    pub zone: String,
    /// Relative label; empty or `@` for the apex
    pub label: String,
    pub kind: RecordKind,
    pub value: String,
    pub status: RecordStatus,
    pub ttl: u32,
    pub weight: Option<u32>,
    /// Resolution line (routing view) on authorities that have one
    pub line: Option<String>,
    pub locked: bool,
    /// Authority timestamps, advisory only
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord {
    /// Create an active record with default metadata
    pub fn new(
        record_id: impl Into<String>,
        zone: impl Into<String>,
        label: impl Into<String>,
        kind: RecordKind,
        value: impl Into<String>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            zone: zone.into(),
            label: label.into(),
            kind,
            value: value.into(),
            status: RecordStatus::Active,
            ttl: 600,
            weight: None,
            line: None,
            locked: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// Set the activation status
    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    /// Fully-qualified name of this record
    pub fn full_name(&self) -> String {
        compose_name(&self.label, &self.zone)
    }

    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }
}

/// Mirror row owned by this process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Local primary key
    pub id: String,
    /// Fully-qualified name
    pub name: String,
    pub kind: RecordKind,
    pub value: String,
    /// Back-reference to the authority's record identifier
    pub remote_id: Option<String>,
    pub zone_id: String,
    pub project_id: String,
    /// Provenance tag
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalRecord {
    /// Build the row that mirrors `remote` in a freshly discovered state
    pub fn from_remote(
        remote: &RemoteRecord,
        zone_id: &str,
        project_id: &str,
        id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: remote.full_name(),
            kind: remote.kind.clone(),
            value: remote.value.clone(),
            remote_id: Some(remote.record_id.clone()),
            zone_id: zone_id.to_string(),
            project_id: project_id.to_string(),
            source: PROVENANCE_TAG.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update in place; the primary key and creation time never change
    pub fn apply_change(&mut self, change: &RecordChange) {
        self.name = change.name.clone();
        self.kind = change.kind.clone();
        self.value = change.value.clone();
        self.updated_at = change.updated_at;
    }

    /// Whether this row takes part in reconciliation of `zone_id`
    pub fn is_owned_by(&self, zone_id: &str) -> bool {
        self.source == PROVENANCE_TAG && self.zone_id == zone_id && self.remote_id.is_some()
    }
}

/// Fields written when a mirrored record drifts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordChange {
    pub name: String,
    pub kind: RecordKind,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl RecordChange {
    /// The change that brings a row in line with `remote`
    pub fn from_remote(remote: &RemoteRecord, now: DateTime<Utc>) -> Self {
        Self {
            name: remote.full_name(),
            kind: remote.kind.clone(),
            value: remote.value.clone(),
            updated_at: now,
        }
    }
}

/// Row as handed back by a store, before validation
///
/// Stores fill in whatever they could decode; [`StoredRow::decode`] decides
/// whether the row is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub value: Option<String>,
    pub remote_id: Option<String>,
    pub zone_id: Option<String>,
    pub project_id: Option<String>,
    pub source: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredRow {
    /// Validate and convert into a [`LocalRecord`]
    ///
    /// A missing value decodes as empty so the next pass rewrites it.
    pub fn decode(self) -> Result<LocalRecord, String> {
        fn required(field: Option<String>, name: &str) -> Result<String, String> {
            match field {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(format!("missing {}", name)),
            }
        }

        let id = required(self.id, "id")?;
        let name = required(self.name, "name")?;
        let kind = required(self.kind, "kind")?;
        let created_at = self.created_at.ok_or("missing created_at")?;
        let updated_at = self.updated_at.ok_or("missing updated_at")?;

        Ok(LocalRecord {
            id,
            name,
            kind: RecordKind::from(kind),
            value: self.value.unwrap_or_default(),
            remote_id: self.remote_id.filter(|r| !r.is_empty()),
            zone_id: self.zone_id.unwrap_or_default(),
            project_id: self.project_id.unwrap_or_default(),
            source: self.source.unwrap_or_default(),
            created_at,
            updated_at,
        })
    }
}

impl From<&LocalRecord> for StoredRow {
    fn from(record: &LocalRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            name: Some(record.name.clone()),
            kind: Some(record.kind.to_string()),
            value: Some(record.value.clone()),
            remote_id: record.remote_id.clone(),
            zone_id: Some(record.zone_id.clone()),
            project_id: Some(record.project_id.clone()),
            source: Some(record.source.clone()),
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
        }
    }
}
