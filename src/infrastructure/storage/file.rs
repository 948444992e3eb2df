//! File-backed restore store
//!
//! Keeps all values in memory and rewrites a JSON file on every save, using
//! write-to-temp-then-rename so a crash never leaves a half-written file.
//! Blocking writes are serialized and numbered; a write that outlives the
//! task that started it can never replace a newer snapshot.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::RestoreStateStore;
use crate::domain::{DomainError, DomainResult};

/// Bump on incompatible format changes; other versions load as empty.
const RESTORE_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RestoreFile {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
    values: BTreeMap<String, String>,
}

/// JSON file store for display values
#[derive(Debug)]
pub struct FileRestoreStore {
    path: PathBuf,
    values: Mutex<Snapshot>,
    /// Generation of the snapshot currently on disk
    written: Arc<StdMutex<u64>>,
}

#[derive(Debug, Default)]
struct Snapshot {
    values: BTreeMap<String, String>,
    generation: u64,
}

impl FileRestoreStore {
    /// Open the store at `path`. A missing or unreadable file yields an
    /// empty store; the file is (re)created on the first save.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = Self::load(&path).await;
        info!(path = %path.display(), entries = values.len(), "Restore state loaded");
        Self {
            path,
            values: Mutex::new(Snapshot {
                values,
                generation: 0,
            }),
            written: Arc::new(StdMutex::new(0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> BTreeMap<String, String> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read restore state, starting empty");
                return BTreeMap::new();
            }
        };

        match serde_json::from_str::<RestoreFile>(&content) {
            Ok(file) if file.version == RESTORE_FILE_VERSION => file.values,
            Ok(file) => {
                warn!(
                    path = %path.display(),
                    expected = RESTORE_FILE_VERSION,
                    found = file.version,
                    "Incompatible restore state version, starting empty"
                );
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupted restore state, starting empty");
                BTreeMap::new()
            }
        }
    }

    fn write_blocking(
        path: &Path,
        file: &RestoreFile,
        generation: u64,
        written: &StdMutex<u64>,
    ) -> DomainResult<()> {
        let mut written = written.lock().unwrap_or_else(PoisonError::into_inner);
        if *written >= generation {
            return Ok(());
        }

        let content = serde_json::to_string_pretty(file)
            .map_err(|e| DomainError::Storage(format!("serialize restore state: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DomainError::Storage(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        // state.json -> state.json.<generation>.tmp
        let temp_path = PathBuf::from(format!("{}.{}.tmp", path.display(), generation));
        std::fs::write(&temp_path, content)
            .map_err(|e| DomainError::Storage(format!("write {}: {}", temp_path.display(), e)))?;
        std::fs::rename(&temp_path, path)
            .map_err(|e| DomainError::Storage(format!("rename to {}: {}", path.display(), e)))?;
        *written = generation;
        Ok(())
    }
}

#[async_trait]
impl RestoreStateStore for FileRestoreStore {
    async fn get_last_value(&self, entity_id: &str) -> DomainResult<Option<String>> {
        Ok(self.values.lock().await.values.get(entity_id).cloned())
    }

    async fn save_value(&self, entity_id: &str, value: Option<&str>) -> DomainResult<()> {
        let (file, generation) = {
            let mut snapshot = self.values.lock().await;
            match value {
                Some(value) => {
                    snapshot.values.insert(entity_id.to_string(), value.to_string());
                }
                None => {
                    snapshot.values.remove(entity_id);
                }
            }
            snapshot.generation += 1;

            let file = RestoreFile {
                version: RESTORE_FILE_VERSION,
                saved_at: Some(Utc::now()),
                values: snapshot.values.clone(),
            };
            (file, snapshot.generation)
        };

        let path = self.path.clone();
        let written = self.written.clone();
        tokio::task::spawn_blocking(move || Self::write_blocking(&path, &file, generation, &written))
            .await
            .map_err(|e| DomainError::Storage(format!("restore state writer failed: {}", e)))?
    }
}
