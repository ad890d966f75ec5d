// # File State Store
//
// JSON document on disk, rewritten on every change.
//
// Each write goes to `<path>.tmp` first and is renamed over the state file,
// after the previous file has been copied to `<path>.backup`. When the state
// file does not parse on open, the backup is used instead.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "web": {
//       "descriptor": {
//         "type": "A",
//         "name": "www",
//         "domain": "example.com",
//         "value": "10.0.0.5",
//         "nextavailableip": false,
//         "id": "record:a/ZG5zLmJpbmRfYSQuX2RlZmF1bHQ:www.example.com/default"
//       },
//       "last_applied": "2026-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore};

/// Current layout of the state document
const FORMAT_VERSION: &str = "1.0";

type Records = BTreeMap<String, StateRecord>;

/// File-based state store with crash recovery
///
/// Every mutation is written through to disk before it returns.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    records: RwLock<Records>,
}

#[derive(serde::Serialize)]
struct DocumentRef<'a> {
    version: &'a str,
    records: &'a Records,
}

#[derive(serde::Deserialize)]
struct Document {
    version: String,
    #[serde(default)]
    records: Records,
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> Error {
    Error::state_store(format!("Failed to {} {}: {}", action, path.display(), err))
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut sibling = path.to_path_buf();
    sibling.set_extension(extension);
    sibling
}

impl FileStateStore {
    /// Open the state file at `path`
    ///
    /// A missing file starts empty. A file that does not parse is replaced
    /// by its backup when one parses, and by empty state otherwise.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
            && !dir.exists()
        {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error("create state directory", dir, e))?;
        }

        let records = Self::open_or_recover(&path).await?;
        tracing::debug!(
            "Opened state file {} with {} records",
            path.display(),
            records.len()
        );

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(path: &Path) -> PathBuf {
        sibling(path, "backup")
    }

    async fn open_or_recover(path: &Path) -> Result<Records, Error> {
        let parse_err = match Self::read_document(path).await {
            Err(Error::Json(e)) => e,
            other => return other,
        };

        let backup = Self::backup_path(path);
        tracing::warn!(
            "State file {} does not parse ({}), trying {}",
            path.display(),
            parse_err,
            backup.display()
        );

        match Self::read_document(&backup).await {
            Ok(records) if backup.exists() => {
                tracing::info!("Recovered {} records from backup", records.len());
                if let Err(e) = fs::copy(&backup, path).await {
                    tracing::error!("Could not restore {}: {}", path.display(), e);
                }
                Ok(records)
            }
            Ok(_) => {
                tracing::warn!("No backup available, starting with empty state");
                Ok(Records::new())
            }
            Err(e) => {
                tracing::error!("Backup is unusable ({}), starting with empty state", e);
                Ok(Records::new())
            }
        }
    }

    async fn read_document(path: &Path) -> Result<Records, Error> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Records::new()),
            Err(e) => return Err(io_error("read state file", path, e)),
        };

        let document: Document = serde_json::from_str(&content)?;
        if document.version != FORMAT_VERSION {
            tracing::warn!(
                "State file {} has version {}, expected {}",
                path.display(),
                document.version,
                FORMAT_VERSION
            );
        }
        Ok(document.records)
    }

    /// Write `records` to a temp file, back up the current file, then
    /// rename the temp file into place.
    async fn persist(&self, records: &Records) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(&DocumentRef {
            version: FORMAT_VERSION,
            records,
        })?;

        let temp = sibling(&self.path, "tmp");
        fs::write(&temp, json)
            .await
            .map_err(|e| io_error("write", &temp, e))?;

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Could not back up {}: {}", self.path.display(), e);
        }

        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| io_error("replace", &self.path, e))?;

        tracing::trace!("Wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_record(&self, resource: &str) -> Result<Option<StateRecord>, Error> {
        Ok(self.records.read().await.get(resource).cloned())
    }

    async fn set_record(&self, resource: &str, record: &StateRecord) -> Result<(), Error> {
        let mut records = self.records.write().await;
        records.insert(resource.to_string(), record.clone());
        self.persist(&records).await
    }

    async fn delete_record(&self, resource: &str) -> Result<(), Error> {
        let mut records = self.records.write().await;
        if records.remove(resource).is_none() {
            return Ok(());
        }
        self.persist(&records).await
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        Ok(self.records.read().await.keys().cloned().collect())
    }

    /// Writes go through on every mutation; flush only materializes a
    /// file that was never written.
    async fn flush(&self) -> Result<(), Error> {
        if self.path.exists() {
            return Ok(());
        }
        let records = self.records.write().await;
        self.persist(&records).await
    }
}
