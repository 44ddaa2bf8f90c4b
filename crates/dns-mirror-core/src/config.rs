//! Configuration types for the DNS mirror
//!
//! This module defines all configuration structures used throughout the crate.
//! Configuration is read from a YAML document; secrets may be supplied through
//! environment variables instead of the file (see [`SyncConfig::apply_env_overrides`]).

use crate::model::RecordKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Environment variable overriding the Aliyun access key id
pub const ENV_ALIYUN_ACCESS_KEY_ID: &str = "DNS_MIRROR_ALIYUN_ACCESS_KEY_ID";
/// Environment variable overriding the Aliyun access key secret
pub const ENV_ALIYUN_ACCESS_KEY_SECRET: &str = "DNS_MIRROR_ALIYUN_ACCESS_KEY_SECRET";
/// Environment variable overriding the MySQL password
pub const ENV_MYSQL_PASSWORD: &str = "DNS_MIRROR_MYSQL_PASSWORD";
/// Environment variable selecting the run mode (`dry-run` or `live`)
pub const ENV_MODE: &str = "DNS_MIRROR_MODE";

/// Largest page size the authority accepts
pub const MAX_PAGE_SIZE: u64 = 500;

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote authority configuration
    pub authority: AuthorityConfig,

    /// Mirror store configuration; required so a missing section never
    /// silently selects the non-persistent store
    pub store: StoreConfig,

    /// Optional sync settings
    #[serde(default)]
    pub sync: SyncSettings,

    /// Zones to mirror, processed in this order
    pub domains: Vec<DomainMapping>,
}

impl SyncConfig {
    /// Parse a configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self, crate::Error> {
        serde_yaml::from_str(text)
            .map_err(|e| crate::Error::config(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse a configuration file
    ///
    /// The result is not validated; call [`SyncConfig::validate`] after
    /// applying overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Apply environment overrides through `lookup`
    ///
    /// Non-empty values replace what the file said.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let AuthorityConfig::Aliyun {
            access_key_id,
            access_key_secret,
            ..
        } = &mut self.authority
        {
            if let Some(v) = non_empty(ENV_ALIYUN_ACCESS_KEY_ID) {
                *access_key_id = v;
            }
            if let Some(v) = non_empty(ENV_ALIYUN_ACCESS_KEY_SECRET) {
                *access_key_secret = v;
            }
        }

        if let StoreConfig::Mysql { password, .. } = &mut self.store
            && let Some(v) = non_empty(ENV_MYSQL_PASSWORD)
        {
            *password = v;
        }

        if let Some(mode) = non_empty(ENV_MODE) {
            match mode.to_lowercase().as_str() {
                "dry-run" | "dry_run" | "dryrun" => self.sync.dry_run = true,
                "live" => self.sync.dry_run = false,
                other => tracing::warn!("Ignoring unknown {} value: {}", ENV_MODE, other),
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.authority.validate()?;
        self.store.validate()?;
        self.sync.validate()?;

        if self.domains.is_empty() {
            return Err(crate::Error::config(
                "At least one domain mapping is required",
            ));
        }

        let mut seen = HashSet::new();
        for (index, mapping) in self.domains.iter().enumerate() {
            mapping.validate(index)?;
            if !seen.insert(mapping.domain_id.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate domain_id '{}' in domain mapping at index {}",
                    mapping.domain_id, index
                )));
            }
        }

        Ok(())
    }
}

/// Remote authority configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthorityConfig {
    /// Alibaba Cloud DNS
    Aliyun {
        /// Access key id
        #[serde(default)]
        access_key_id: String,
        /// Access key secret
        /// ⚠️ NEVER log this value
        #[serde(default)]
        access_key_secret: String,
        /// Region (default `cn-hangzhou`)
        #[serde(default)]
        region: Option<String>,
        /// Explicit API endpoint, overrides the region-derived one
        #[serde(default)]
        endpoint: Option<String>,
        /// Per-request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom authority
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl AuthorityConfig {
    /// Validate the authority configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            AuthorityConfig::Aliyun {
                access_key_id,
                access_key_secret,
                timeout_secs,
                ..
            } => {
                if access_key_id.trim().is_empty() {
                    return Err(crate::Error::config("aliyun access_key_id is required"));
                }
                if access_key_secret.trim().is_empty() {
                    return Err(crate::Error::config(
                        "aliyun access_key_secret is required",
                    ));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("aliyun timeout_secs must be > 0"));
                }
                Ok(())
            }
            AuthorityConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom authority factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the authority type name
    pub fn type_name(&self) -> &str {
        match self {
            AuthorityConfig::Aliyun { .. } => "aliyun",
            AuthorityConfig::Custom { factory, .. } => factory,
        }
    }
}

// Custom Debug implementation that hides the access key secret
impl fmt::Debug for AuthorityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorityConfig::Aliyun {
                access_key_id,
                region,
                endpoint,
                timeout_secs,
                ..
            } => f
                .debug_struct("Aliyun")
                .field("access_key_id", access_key_id)
                .field("access_key_secret", &"<REDACTED>")
                .field("region", region)
                .field("endpoint", endpoint)
                .field("timeout_secs", timeout_secs)
                .finish(),
            AuthorityConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Mirror store configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// MySQL `asset_sub_domain` table
    Mysql {
        host: String,
        #[serde(default = "default_mysql_port")]
        port: u16,
        username: String,
        /// ⚠️ NEVER log this value
        #[serde(default)]
        password: String,
        database: String,
        /// Connection pool size
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Seconds to wait for a pooled connection
        #[serde(default = "default_timeout_secs")]
        acquire_timeout_secs: u64,
    },

    /// JSON file mirror
    File {
        /// Path to the mirror file
        path: String,
    },

    /// In-memory mirror (not persistent)
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Mysql {
                host,
                username,
                database,
                max_connections,
                ..
            } => {
                if host.trim().is_empty() {
                    return Err(crate::Error::config("mysql host is required"));
                }
                if username.trim().is_empty() {
                    return Err(crate::Error::config("mysql username is required"));
                }
                if database.trim().is_empty() {
                    return Err(crate::Error::config("mysql database is required"));
                }
                if *max_connections == 0 {
                    return Err(crate::Error::config("mysql max_connections must be > 0"));
                }
                Ok(())
            }
            StoreConfig::File { path } => {
                if path.trim().is_empty() {
                    return Err(crate::Error::config("file store path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
            StoreConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Mysql { .. } => "mysql",
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

// Custom Debug implementation that hides the database password
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreConfig::Mysql {
                host,
                port,
                username,
                database,
                max_connections,
                acquire_timeout_secs,
                ..
            } => f
                .debug_struct("Mysql")
                .field("host", host)
                .field("port", port)
                .field("username", username)
                .field("password", &"<REDACTED>")
                .field("database", database)
                .field("max_connections", max_connections)
                .field("acquire_timeout_secs", acquire_timeout_secs)
                .finish(),
            StoreConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            StoreConfig::Memory => f.write_str("Memory"),
            StoreConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Sync pass settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Records requested per authority page
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Pages requested per zone before the listing is given up as runaway
    #[serde(default = "default_max_pages")]
    pub max_pages: u64,

    /// Record kinds mirrored; everything else is ignored
    #[serde(default = "default_supported_kinds")]
    pub supported_kinds: Vec<RecordKind>,

    /// Plan and log changes without writing them
    #[serde(default)]
    pub dry_run: bool,

    /// Capacity of the engine event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SyncSettings {
    /// Validate the sync settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(crate::Error::config(format!(
                "sync page_size must be between 1 and {}. Got: {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.max_pages == 0 {
            return Err(crate::Error::config("sync max_pages must be > 0"));
        }
        if self.supported_kinds.is_empty() {
            return Err(crate::Error::config(
                "sync supported_kinds must name at least one record kind",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config(
                "sync event_channel_capacity must be > 0",
            ));
        }
        Ok(())
    }

    /// Whether records of `kind` are mirrored
    pub fn supports(&self, kind: &RecordKind) -> bool {
        self.supported_kinds.contains(kind)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            supported_kinds: default_supported_kinds(),
            dry_run: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Maps an authority zone onto the local zone and project identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMapping {
    /// Local project identifier stamped on created rows
    pub project_id: String,
    /// Local zone identifier; rows are scoped by it
    pub domain_id: String,
    /// Zone name as known to the authority
    pub domain: String,
}

impl DomainMapping {
    /// Create a new domain mapping
    pub fn new(
        project_id: impl Into<String>,
        domain_id: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            domain_id: domain_id.into(),
            domain: domain.into(),
        }
    }

    fn validate(&self, index: usize) -> Result<(), crate::Error> {
        if self.project_id.trim().is_empty()
            || self.domain_id.trim().is_empty()
            || self.domain.trim().is_empty()
        {
            return Err(crate::Error::config(format!(
                "Invalid domain mapping at index {}: project_id, domain_id and domain are required",
                index
            )));
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_max_connections() -> u32 {
    25
}

fn default_page_size() -> u64 {
    100
}

fn default_max_pages() -> u64 {
    1000
}

fn default_supported_kinds() -> Vec<RecordKind> {
    vec![RecordKind::A, RecordKind::Cname]
}

fn default_event_channel_capacity() -> usize {
    1000
}
