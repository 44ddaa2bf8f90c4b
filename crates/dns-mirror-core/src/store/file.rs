// # File Mirror Store
//
// JSON-file implementation of MirrorStore with crash recovery.
//
// ## Purpose
//
// Keeps the mirror on local disk for deployments without a database.
//
// ## Crash Recovery
//
// - Atomic writes: every mutation writes a temp file, then renames it
// - Automatic backup: the previous file is kept as `.backup`
// - Recovery: a file that fails to parse is replaced by its backup
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "rows": [
//     {
//       "id": "5f0c...",
//       "name": "www.example.com",
//       "kind": "A",
//       "value": "1.2.3.4",
//       "remote_id": "1234567890",
//       "zone_id": "domain-1",
//       "project_id": "project-1",
//       "source": "Aliyun-DNS-Sync",
//       "created_at": "2025-01-09T12:00:00Z",
//       "updated_at": "2025-01-09T12:00:00Z"
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::{delete_from, insert_into, select_rows, update_in};
use crate::Error;
use crate::config::StoreConfig;
use crate::model::{LocalRecord, RecordChange, StoredRow};
use crate::traits::{MirrorStore, MirrorStoreFactory};

/// Mirror file format version
const MIRROR_FILE_VERSION: &str = "1.0";

/// File-based mirror store with crash recovery
///
/// All rows are held in memory and the whole file is rewritten after every
/// mutation. A failed write leaves the in-memory rows untouched.
///
/// # Example
///
/// ```rust,no_run
/// use dns_mirror_core::model::PROVENANCE_TAG;
/// use dns_mirror_core::store::FileMirrorStore;
/// use dns_mirror_core::traits::MirrorStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileMirrorStore::new("/var/lib/dns-mirror/mirror.json").await?;
///
///     let rows = store.read_rows("domain-1", PROVENANCE_TAG).await?;
///     println!("{} rows", rows.len());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileMirrorStore {
    path: PathBuf,
    rows: RwLock<Vec<StoredRow>>,
}

/// Serializable mirror file format
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct MirrorFileFormat {
    version: String,
    rows: Vec<StoredRow>,
}

impl FileMirrorStore {
    /// Create or load a file mirror store
    ///
    /// Parent directories are created as needed. A missing file starts an
    /// empty mirror; a corrupted one is recovered from its backup.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create mirror directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let rows = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            rows: RwLock::new(rows),
        })
    }

    /// Load rows, falling back to the backup when the main file is corrupted
    ///
    /// A corrupted main file with no usable backup is an error: silently
    /// starting empty would make the next pass re-create every row.
    async fn load_with_recovery(path: &Path) -> Result<Vec<StoredRow>, Error> {
        match Self::load(path).await {
            Ok(rows) => {
                tracing::debug!("Loaded mirror file: {} rows", rows.len());
                Ok(rows)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Mirror file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    return Err(Error::store(format!(
                        "Mirror file {} is corrupted and no backup exists",
                        path.display()
                    )));
                }

                let rows = Self::load(&backup_path).await.map_err(|backup_err| {
                    Error::store(format!(
                        "Mirror file {} and its backup are unreadable: {}",
                        path.display(),
                        backup_err
                    ))
                })?;
                tracing::info!("Recovered mirror from backup: {} rows", rows.len());

                fs::copy(&backup_path, path).await.map_err(|e| {
                    Error::store(format!(
                        "Failed to restore {} from backup: {}",
                        path.display(),
                        e
                    ))
                })?;

                Ok(rows)
            }
            Err(e) => Err(e),
        }
    }

    /// Load rows from one file; parse failures surface as [`Error::Json`]
    async fn load(path: &Path) -> Result<Vec<StoredRow>, Error> {
        if !path.exists() {
            tracing::debug!("Mirror file does not exist: {}", path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("Failed to read mirror file {}: {}", path.display(), e))
        })?;
        let file: MirrorFileFormat = serde_json::from_str(&content)?;

        if file.version != MIRROR_FILE_VERSION {
            tracing::warn!(
                "Mirror file version mismatch: expected {}, got {}. Attempting to load anyway.",
                MIRROR_FILE_VERSION,
                file.version
            );
        }

        Ok(file.rows)
    }

    /// Write `rows` to disk atomically
    async fn persist(&self, rows: &[StoredRow]) -> Result<(), Error> {
        let file = MirrorFileFormat {
            version: MIRROR_FILE_VERSION.to_string(),
            rows: rows.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.temp_path();
        {
            let mut handle = fs::File::create(&temp_path).await?;
            handle.write_all(json.as_bytes()).await?;
            handle.flush().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await?;

        tracing::trace!("Mirror written to file: {}", self.path.display());
        Ok(())
    }

    /// Apply `mutate` to a copy of the rows, persist it, then swap it in
    async fn mutate<F>(&self, mutate: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Vec<StoredRow>) -> Result<(), Error> + Send,
    {
        let mut guard = self.rows.write().await;
        let mut next = guard.clone();
        mutate(&mut next)?;
        self.persist(&next)
            .await
            .map_err(|e| Error::write(format!("{}: {}", self.path.display(), e)))?;
        *guard = next;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl MirrorStore for FileMirrorStore {
    async fn read_rows(&self, zone_id: &str, source: &str) -> Result<Vec<StoredRow>, Error> {
        let guard = self.rows.read().await;
        Ok(select_rows(&guard, zone_id, source))
    }

    async fn insert_row(&self, record: &LocalRecord) -> Result<(), Error> {
        self.mutate(|rows| insert_into(rows, record)).await
    }

    async fn update_row(&self, id: &str, change: &RecordChange) -> Result<(), Error> {
        self.mutate(|rows| update_in(rows, id, change)).await
    }

    async fn delete_row(&self, id: &str) -> Result<(), Error> {
        self.mutate(|rows| delete_from(rows, id)).await
    }

    async fn table_exists(&self) -> Result<bool, Error> {
        // The file is created on first write; its directory must exist
        Ok(self
            .path
            .parent()
            .is_none_or(|p| p.as_os_str().is_empty() || p.is_dir()))
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for [`FileMirrorStore`]
pub struct FileMirrorStoreFactory;

#[async_trait]
impl MirrorStoreFactory for FileMirrorStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn MirrorStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Box::new(FileMirrorStore::new(path).await?)),
            other => Err(Error::config(format!(
                "file store factory cannot handle '{}' config",
                other.type_name()
            ))),
        }
    }
}
