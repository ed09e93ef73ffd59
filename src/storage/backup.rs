use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{RedeemError, Result};
use crate::util::now_millis;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: u64,
    pub fingerprint: String,
    pub timestamp: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupFile {
    next_id: u64,
    records: Vec<BackupRecord>,
}

/// Secondary fingerprint database, kept apart from the key-value store so
/// clearing one does not clear the other.
///
/// A single record store keyed by an auto-incrementing id.
pub struct BackupDatabase {
    path: PathBuf,
    lock: Mutex<()>,
}

impl BackupDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| RedeemError::Custom("Backup database lock poisoned".into()))
    }

    /// Missing or unparseable files read as an empty database; the next
    /// `add` overwrites a corrupt one.
    fn read(&self) -> Result<BackupFile> {
        let empty = || BackupFile {
            next_id: 1,
            records: vec![],
        };
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(file) => Ok(file),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Backup database is corrupt, starting over"
                    );
                    Ok(empty())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(empty()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, file: &BackupFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string(file)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Append a record and return its id.
    pub fn add(&self, fingerprint: &str) -> Result<u64> {
        let _guard = self.guard()?;
        let mut file = self.read()?;
        let id = file.next_id.max(1);
        file.records.push(BackupRecord {
            id,
            fingerprint: fingerprint.to_string(),
            timestamp: now_millis(),
        });
        file.next_id = id + 1;
        self.write(&file)?;
        Ok(id)
    }

    pub fn contains(&self, fingerprint: &str) -> Result<bool> {
        let _guard = self.guard()?;
        Ok(self.read()?.records.iter().any(|r| r.fingerprint == fingerprint))
    }

    pub fn records(&self) -> Result<Vec<BackupRecord>> {
        let _guard = self.guard()?;
        Ok(self.read()?.records)
    }

    /// Delete the whole database.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.guard()?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
