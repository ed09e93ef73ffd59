use std::sync::Arc;

use super::Signal;
use crate::error::Result;
use crate::storage::{BackupDatabase, KeyValueStore};

pub const FINGERPRINTS_KEY: &str = "fingerprints";
pub const USED_IPS_KEY: &str = "used_ips";

/// A JSON list of strings under one storage key.
pub struct UsedSet {
    kv: Arc<dyn KeyValueStore>,
    key: &'static str,
}

impl UsedSet {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: &'static str) -> Self {
        Self { kv, key }
    }

    pub fn fingerprints(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::new(kv, FINGERPRINTS_KEY)
    }

    pub fn ips(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::new(kv, USED_IPS_KEY)
    }

    /// Current entries. An unreadable list counts as empty.
    pub fn entries(&self) -> Result<Vec<String>> {
        let Some(raw) = self.kv.get(self.key)? else {
            return Ok(vec![]);
        };
        match serde_json::from_str(&raw) {
            Ok(list) => Ok(list),
            Err(e) => {
                tracing::warn!(key = self.key, error = %e, "Unreadable list in storage, treating as empty");
                Ok(vec![])
            }
        }
    }

    pub fn contains(&self, value: &str) -> Result<bool> {
        Ok(self.entries()?.iter().any(|v| v == value))
    }

    pub fn insert(&self, value: &str) -> Result<()> {
        let mut entries = self.entries()?;
        if !entries.iter().any(|v| v == value) {
            entries.push(value.to_string());
        }
        self.kv.set(self.key, &serde_json::to_string(&entries)?)
    }

    pub fn clear(&self) -> Result<()> {
        self.kv.remove(self.key)
    }
}

/// Fingerprints seen so far, kept in the key-value store with a copy in the
/// backup database.
pub struct FingerprintLedger {
    primary: UsedSet,
    backup: Arc<BackupDatabase>,
}

impl FingerprintLedger {
    pub fn new(primary: UsedSet, backup: Arc<BackupDatabase>) -> Self {
        Self { primary, backup }
    }

    /// Whether `fingerprint` has redeemed before, checking the primary list
    /// then the backup. A store that cannot be read degrades the answer.
    pub fn is_known(&self, fingerprint: &str) -> Signal<bool> {
        match self.primary.contains(fingerprint) {
            Ok(true) => return Signal::Collected(true),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "Fingerprint list unavailable"),
        }
        match self.backup.contains(fingerprint) {
            Ok(found) => Signal::Collected(found),
            Err(e) => {
                tracing::warn!(error = %e, "Backup fingerprint database unavailable");
                Signal::degraded(format!("backup database unavailable: {e}"))
            }
        }
    }

    /// Store `fingerprint` in both places. Failures are logged only.
    pub fn record(&self, fingerprint: &str) {
        if let Err(e) = self.primary.insert(fingerprint) {
            tracing::warn!(error = %e, "Failed to save fingerprint");
        }
        if let Err(e) = self.backup.add(fingerprint) {
            tracing::warn!(error = %e, "Failed to save fingerprint to backup database");
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.primary.clear()?;
        self.backup.clear()
    }
}
