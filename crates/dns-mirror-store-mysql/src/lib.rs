// # MySQL Mirror Store
//
// This crate provides a MirrorStore implementation over the
// `asset_sub_domain` table (see `schema.sql`).
//
// ## Scope
//
// - ✅ Pooled connections (default 25)
// - ✅ Each write commits on its own (no zone-wide transaction)
// - ✅ `information_schema` check for the mirror table
// - ❌ NO schema migration (the table is provisioned out of band)
// - ❌ NO batching (one statement per planned write)
//
// ## Trust Level: Trusted (Core Component)
//
// ## Column Mapping
//
// | Column        | Field                         |
// |---------------|-------------------------------|
// | `id`          | local primary key             |
// | `sub_domain`  | fully-qualified name          |
// | `type`        | record kind                   |
// | `dns_record`  | record value                  |
// | `record_id`   | remote back-reference         |
// | `asset_label` | always written empty          |
// | `domain_id`   | zone id                       |
// | `project_id`  | project id                    |
// | `source`      | provenance tag                |
// | `create_time` | creation time (UTC)           |
// | `update_time` | last update time (UTC)        |

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use dns_mirror_core::config::StoreConfig;
use dns_mirror_core::model::{LocalRecord, RecordChange, StoredRow};
use dns_mirror_core::registry::ComponentRegistry;
use dns_mirror_core::traits::{MirrorStore, MirrorStoreFactory};
use dns_mirror_core::{Error, Result};
use sqlx::Row;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use std::time::Duration;

/// Mirror table name
pub const TABLE_NAME: &str = "asset_sub_domain";

/// Schema of the mirror table
pub const SCHEMA_SQL: &str = include_str!("../schema.sql");

/// Environment variable holding a connection URL for database tests
pub const ENV_TEST_MYSQL_URL: &str = "DNS_MIRROR_TEST_MYSQL_URL";

const STORE_NAME: &str = "mysql";

/// MySQL-backed mirror store
pub struct MysqlMirrorStore {
    pool: MySqlPool,
    database: String,
}

// The pool carries connect options; only the database name is shown
impl std::fmt::Debug for MysqlMirrorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlMirrorStore")
            .field("database", &self.database)
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl MysqlMirrorStore {
    /// Connect a pool and verify it with one round trip
    pub async fn connect(
        options: MySqlConnectOptions,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let database = options.get_database().unwrap_or_default().to_string();

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| Error::store(format!("Failed to connect to MySQL: {}", e)))?;

        tracing::info!(
            "Connected to MySQL database '{}' (max {} connections)",
            database,
            max_connections
        );

        Ok(Self { pool, database })
    }

    /// Connect from a `mysql://` URL
    pub async fn connect_url(url: &str) -> Result<Self> {
        let options: MySqlConnectOptions = url
            .parse()
            .map_err(|e| Error::config(format!("Invalid MySQL URL: {}", e)))?;
        Self::connect(options, 5, Duration::from_secs(30)).await
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    /// Underlying pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Create the mirror table if it does not exist
    ///
    /// Used by tests and first-time setup; a normal run only checks for it.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("Failed to create {}: {}", TABLE_NAME, e)))?;
        Ok(())
    }
}

/// Build connect options from the store configuration
pub fn connect_options(config: &StoreConfig) -> Result<(MySqlConnectOptions, u32, Duration)> {
    match config {
        StoreConfig::Mysql {
            host,
            port,
            username,
            password,
            database,
            max_connections,
            acquire_timeout_secs,
        } => {
            let options = MySqlConnectOptions::new()
                .host(host)
                .port(*port)
                .username(username)
                .password(password)
                .database(database)
                .charset("utf8mb4");
            Ok((
                options,
                *max_connections,
                Duration::from_secs(*acquire_timeout_secs),
            ))
        }
        other => Err(Error::config(format!(
            "MySQL factory cannot handle '{}' config",
            other.type_name()
        ))),
    }
}

/// Decode whatever columns are usable; validation happens in the core
fn decode_row(row: &MySqlRow) -> StoredRow {
    let text = |column: &str| row.try_get::<Option<String>, _>(column).ok().flatten();
    let time = |column: &str| {
        row.try_get::<Option<NaiveDateTime>, _>(column)
            .ok()
            .flatten()
            .map(|t| t.and_utc())
    };

    StoredRow {
        id: text("id"),
        name: text("sub_domain"),
        kind: text("type"),
        value: text("dns_record"),
        remote_id: text("record_id"),
        zone_id: text("domain_id"),
        project_id: text("project_id"),
        source: text("source"),
        created_at: time("create_time"),
        updated_at: time("update_time"),
    }
}

fn naive(at: DateTime<Utc>) -> NaiveDateTime {
    at.naive_utc()
}

#[async_trait]
impl MirrorStore for MysqlMirrorStore {
    async fn read_rows(&self, zone_id: &str, source: &str) -> Result<Vec<StoredRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sub_domain, type, dns_record, record_id,
                   domain_id, project_id, source, create_time, update_time
            FROM asset_sub_domain
            WHERE domain_id = ?
              AND source = ?
              AND record_id IS NOT NULL
              AND record_id <> ''
            ORDER BY create_time, id
            "#,
        )
        .bind(zone_id)
        .bind(source)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::read(format!("Failed to query {}: {}", TABLE_NAME, e)))?;

        tracing::debug!("Read {} mirror rows for domain_id {}", rows.len(), zone_id);

        Ok(rows.iter().map(decode_row).collect())
    }

    async fn insert_row(&self, record: &LocalRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO asset_sub_domain (
              id, sub_domain, type, dns_record, record_id, asset_label,
              domain_id, project_id, source, create_time, update_time
            ) VALUES (?, ?, ?, ?, ?, '', ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.kind.as_str())
        .bind(&record.value)
        .bind(record.remote_id.as_deref())
        .bind(&record.zone_id)
        .bind(&record.project_id)
        .bind(&record.source)
        .bind(naive(record.created_at))
        .bind(naive(record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::write(format!("Insert of {} failed: {}", record.name, e)))?;

        Ok(())
    }

    async fn update_row(&self, id: &str, change: &RecordChange) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE asset_sub_domain
            SET sub_domain = ?, type = ?, dns_record = ?, update_time = ?
            WHERE id = ?
            "#,
        )
        .bind(&change.name)
        .bind(change.kind.as_str())
        .bind(&change.value)
        .bind(naive(change.updated_at))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::write(format!("Update of row {} failed: {}", id, e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("Mirror row {} does not exist", id)));
        }
        Ok(())
    }

    async fn delete_row(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM asset_sub_domain WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::write(format!("Delete of row {} failed: {}", id, e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("Mirror row {} does not exist", id)));
        }
        Ok(())
    }

    async fn table_exists(&self) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM information_schema.tables
            WHERE table_schema = DATABASE()
              AND table_name = ?
            "#,
        )
        .bind(TABLE_NAME)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::store(format!("Failed to check table existence: {}", e)))?;

        Ok(count > 0)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("MySQL ping failed: {}", e)))?;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        STORE_NAME
    }
}

/// Factory for creating MySQL stores
pub struct MysqlMirrorStoreFactory;

#[async_trait]
impl MirrorStoreFactory for MysqlMirrorStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn MirrorStore>> {
        let (options, max_connections, acquire_timeout) = connect_options(config)?;
        let store = MysqlMirrorStore::connect(options, max_connections, acquire_timeout).await?;
        Ok(Box::new(store))
    }
}

/// Register the MySQL store as `mysql`
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_store(STORE_NAME, Box::new(MysqlMirrorStoreFactory));
}
