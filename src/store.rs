//! Persistent configuration and redemption statistics.
//!
//! Both live in one blob so that a redemption commits its username and its
//! counter in a single write.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

use crate::error::{RedeemError, Result};
use crate::settings::Settings;
use crate::storage::{Codec, KeyValueStore};
use crate::util::normalize_username;

pub const DATA_KEY: &str = "redeemer_data";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub secret_code: String,
    pub max_uses: u32,
    #[serde(default)]
    pub webhook_url: String,
    pub admin_password_hash: String,
}

impl Configuration {
    pub fn webhook_configured(&self) -> bool {
        !self.webhook_url.trim().is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionStats {
    pub total_redeems: u32,
    pub redeemed_users: Vec<String>,
}

impl RedemptionStats {
    pub fn has_redeemed(&self, username: &str) -> bool {
        let name = normalize_username(username);
        self.redeemed_users.iter().any(|u| *u == name)
    }

    /// Record one redemption. Keeps `total_redeems == redeemed_users.len()`.
    pub fn record(&mut self, username: &str) {
        self.redeemed_users.push(normalize_username(username));
        self.total_redeems = self.redeemed_users.len() as u32;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetData {
    pub config: Configuration,
    #[serde(default)]
    pub stats: RedemptionStats,
}

/// Places left, never below zero even if the limit was lowered under the count.
pub fn remaining_uses(config: &Configuration, stats: &RedemptionStats) -> u32 {
    config.max_uses.saturating_sub(stats.total_redeems)
}

/// SHA-256 hex digest used for the stored admin password.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// A single field of [`Configuration`], for read-modify-write updates.
#[derive(Clone, Debug)]
pub enum ConfigField {
    SecretCode(String),
    MaxUses(u32),
    WebhookUrl(String),
    AdminPasswordHash(String),
}

/// Values materialised the first time the store is read.
#[derive(Clone, Debug)]
pub struct Defaults {
    pub secret_code: String,
    pub max_uses: u32,
    pub webhook_url: String,
    pub admin_password: String,
}

impl Defaults {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            secret_code: settings.default_secret_code.clone(),
            max_uses: settings.default_max_uses.max(1),
            webhook_url: settings.default_webhook_url.clone(),
            admin_password: settings.initial_admin_password.clone(),
        }
    }

    fn materialize(&self) -> WidgetData {
        WidgetData {
            config: Configuration {
                secret_code: self.secret_code.to_uppercase(),
                max_uses: self.max_uses.max(1),
                webhook_url: self.webhook_url.clone(),
                admin_password_hash: hash_password(&self.admin_password),
            },
            stats: RedemptionStats::default(),
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Configuration and stats store over a [`KeyValueStore`].
pub struct ConfigStore {
    kv: Arc<dyn KeyValueStore>,
    codec: Codec,
    defaults: Defaults,
    lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, codec: Codec, defaults: Defaults) -> Self {
        Self {
            kv,
            codec,
            defaults,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| RedeemError::Custom("Config store lock poisoned".into()))
    }

    /// Read the blob, materialising and persisting defaults when absent.
    /// Corrupt data is replaced by defaults.
    fn load(&self) -> Result<WidgetData> {
        let stored = match self.kv.get(DATA_KEY)? {
            Some(s) => s,
            None => {
                let data = self.defaults.materialize();
                self.persist(&data)?;
                tracing::info!(max_uses = data.config.max_uses, "Initialized default configuration");
                return Ok(data);
            }
        };

        let parsed = self
            .codec
            .decode(&stored)
            .and_then(|json| serde_json::from_str::<WidgetData>(&json).ok());

        match parsed {
            Some(mut data) => {
                data.config.max_uses = data.config.max_uses.max(1);
                Ok(data)
            }
            None => {
                tracing::warn!("Stored configuration is unreadable, falling back to defaults");
                Ok(self.defaults.materialize())
            }
        }
    }

    fn persist(&self, data: &WidgetData) -> Result<()> {
        let json = serde_json::to_string(data)?;
        self.kv.set(DATA_KEY, &self.codec.encode(&json))
    }

    /// Run `f` against the stored data and persist whatever it leaves behind.
    ///
    /// This is the only read/modify/write path; concurrent callers are serialised.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut WidgetData) -> T) -> Result<T> {
        let _guard = self.guard()?;
        let mut data = self.load()?;
        let out = f(&mut data);
        self.persist(&data)?;
        Ok(out)
    }

    pub fn snapshot(&self) -> Result<WidgetData> {
        let _guard = self.guard()?;
        self.load()
    }

    pub fn get(&self) -> Result<Configuration> {
        Ok(self.snapshot()?.config)
    }

    pub fn save(&self, mut config: Configuration) -> Result<()> {
        config.max_uses = config.max_uses.max(1);
        self.transaction(|data| data.config = config)
    }

    pub fn update(&self, field: ConfigField) -> Result<Configuration> {
        self.transaction(|data| {
            match field {
                ConfigField::SecretCode(code) => data.config.secret_code = code,
                ConfigField::MaxUses(n) => data.config.max_uses = n.max(1),
                ConfigField::WebhookUrl(url) => data.config.webhook_url = url,
                ConfigField::AdminPasswordHash(hash) => data.config.admin_password_hash = hash,
            }
            data.config.clone()
        })
    }

    pub fn stats(&self) -> Result<RedemptionStats> {
        Ok(self.snapshot()?.stats)
    }

    pub fn reset_stats(&self) -> Result<()> {
        self.transaction(|data| data.stats = RedemptionStats::default())
    }

    /// Drop everything and start over from defaults.
    pub fn clear_all(&self) -> Result<WidgetData> {
        let _guard = self.guard()?;
        self.kv.remove(DATA_KEY)?;
        self.load()
    }

    pub fn verify_password(&self, password: &str) -> Result<bool> {
        Ok(self.get()?.admin_password_hash == hash_password(password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, Obfuscator};

    fn memory_store() -> (Arc<MemoryStore>, ConfigStore) {
        let kv = Arc::new(MemoryStore::new());
        let store = ConfigStore::new(kv.clone(), Codec::Plain, Defaults::default());
        (kv, store)
    }

    #[test]
    fn test_first_access_persists_defaults() {
        let (kv, store) = memory_store();
        assert!(kv.get(DATA_KEY).unwrap().is_none());

        let config = store.get().unwrap();
        assert_eq!(config.secret_code, "TESTE");
        assert_eq!(config.max_uses, 2);
        assert!(!config.webhook_configured());
        assert!(kv.get(DATA_KEY).unwrap().is_some());
    }

    #[test]
    fn test_password_is_stored_hashed() {
        let (kv, store) = memory_store();
        assert!(store.verify_password("changeme").unwrap());
        assert!(!store.verify_password("wrong").unwrap());

        let raw = kv.get(DATA_KEY).unwrap().unwrap();
        assert!(!raw.contains("changeme"));
        assert!(raw.contains(&hash_password("changeme")));
    }

    #[test]
    fn test_update_single_field() {
        let (_, store) = memory_store();
        let updated = store.update(ConfigField::MaxUses(10)).unwrap();
        assert_eq!(updated.max_uses, 10);
        assert_eq!(updated.secret_code, "TESTE");
        assert_eq!(store.get().unwrap().max_uses, 10);
    }

    #[test]
    fn test_limit_never_drops_below_one() {
        let (kv, store) = memory_store();
        assert_eq!(store.update(ConfigField::MaxUses(0)).unwrap().max_uses, 1);

        let mut config = store.get().unwrap();
        config.max_uses = 0;
        store.save(config).unwrap();
        assert_eq!(store.get().unwrap().max_uses, 1);

        let mut data = store.snapshot().unwrap();
        data.config.max_uses = 0;
        kv.set(DATA_KEY, &serde_json::to_string(&data).unwrap()).unwrap();
        assert_eq!(store.get().unwrap().max_uses, 1);
    }

    #[test]
    fn test_corrupt_blob_self_heals() {
        let (kv, store) = memory_store();
        kv.set(DATA_KEY, "{broken").unwrap();

        let config = store.get().unwrap();
        assert_eq!(config.secret_code, "TESTE");

        store.update(ConfigField::SecretCode("NEW".into())).unwrap();
        let raw = kv.get(DATA_KEY).unwrap().unwrap();
        assert!(serde_json::from_str::<WidgetData>(&raw).is_ok());
    }

    #[test]
    fn test_record_keeps_count_in_sync() {
        let mut stats = RedemptionStats::default();
        stats.record("Alice");
        stats.record("BOB");
        assert_eq!(stats.total_redeems, 2);
        assert_eq!(stats.redeemed_users, vec!["alice", "bob"]);
        assert!(stats.has_redeemed("ALICE"));
        assert!(!stats.has_redeemed("carol"));
    }

    #[test]
    fn test_reset_stats_keeps_configuration() {
        let (_, store) = memory_store();
        store
            .update(ConfigField::WebhookUrl("https://discord.com/api/webhooks/1/x".into()))
            .unwrap();
        store.transaction(|d| d.stats.record("alice")).unwrap();

        store.reset_stats().unwrap();

        let data = store.snapshot().unwrap();
        assert_eq!(data.stats, RedemptionStats::default());
        assert_eq!(data.config.secret_code, "TESTE");
        assert_eq!(data.config.max_uses, 2);
        assert_eq!(data.config.webhook_url, "https://discord.com/api/webhooks/1/x");
    }

    #[test]
    fn test_clear_all_restores_defaults() {
        let (_, store) = memory_store();
        store.update(ConfigField::SecretCode("OTHER".into())).unwrap();
        store.transaction(|d| d.stats.record("alice")).unwrap();

        let data = store.clear_all().unwrap();
        assert_eq!(data.config.secret_code, "TESTE");
        assert_eq!(data.stats.total_redeems, 0);
    }

    #[test]
    fn test_obfuscated_blob_round_trips_across_instances() {
        let kv = Arc::new(MemoryStore::new());
        let codec = Codec::Obfuscated(Obfuscator::load_or_create(kv.as_ref()).unwrap());
        let store = ConfigStore::new(kv.clone(), codec, Defaults::default());
        store.update(ConfigField::SecretCode("HIDDEN".into())).unwrap();

        let raw = kv.get(DATA_KEY).unwrap().unwrap();
        assert!(!raw.contains("HIDDEN"));

        // A fresh instance reloads the persisted key
        let codec = Codec::Obfuscated(Obfuscator::load_or_create(kv.as_ref()).unwrap());
        let reopened = ConfigStore::new(kv, codec, Defaults::default());
        assert_eq!(reopened.get().unwrap().secret_code, "HIDDEN");
    }

    #[test]
    fn test_remaining_uses_saturates() {
        let config = Configuration {
            secret_code: "X".into(),
            max_uses: 1,
            webhook_url: String::new(),
            admin_password_hash: String::new(),
        };
        let mut stats = RedemptionStats::default();
        stats.record("a");
        stats.record("b");
        assert_eq!(remaining_uses(&config, &stats), 0);
    }
}
