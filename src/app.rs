use std::sync::Arc;

use crate::admin::AdminPanel;
use crate::engine::{Policy, Redeemer};
use crate::error::Result;
use crate::identity::{FingerprintLedger, HttpIpLookup, UsedSet};
use crate::notify::DiscordWebhook;
use crate::pending::RedeemFlow;
use crate::roblox::RobloxClient;
use crate::settings::Settings;
use crate::storage::{BackupDatabase, Codec, FileStore, KeyValueStore, Obfuscator};
use crate::store::{ConfigStore, Defaults};

const BACKUP_FILE: &str = "backup.db.json";

/// Everything the widget needs, wired from [`Settings`].
pub struct Widget {
    pub settings: Settings,
    pub store: Arc<ConfigStore>,
    pub redeemer: Arc<Redeemer>,
    pub flow: RedeemFlow,
    pub admin: AdminPanel,
}

impl Widget {
    /// Build on top of files under `settings.data_dir`.
    pub fn open(settings: Settings) -> Result<Self> {
        let root = settings.data_path();
        let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&root));
        let backup = Arc::new(BackupDatabase::new(root.join(BACKUP_FILE)));
        Self::build(settings, kv, backup)
    }

    pub fn build(
        settings: Settings,
        kv: Arc<dyn KeyValueStore>,
        backup: Arc<BackupDatabase>,
    ) -> Result<Self> {
        let codec = if settings.obfuscate_storage {
            Codec::Obfuscated(Obfuscator::load_or_create(kv.as_ref())?)
        } else {
            Codec::Plain
        };

        let http = settings.http_client()?;
        let store = Arc::new(ConfigStore::new(
            kv.clone(),
            codec,
            Defaults::from_settings(&settings),
        ));
        let fingerprints = Arc::new(FingerprintLedger::new(
            UsedSet::fingerprints(kv.clone()),
            backup,
        ));
        let used_ips = Arc::new(UsedSet::ips(kv));

        let redeemer = Arc::new(Redeemer::new(
            store.clone(),
            fingerprints.clone(),
            used_ips.clone(),
            Arc::new(HttpIpLookup::new(http.clone(), settings.ip_services.clone())),
            Arc::new(DiscordWebhook::new(http.clone())),
            Policy::from_settings(&settings),
        ));
        let flow = RedeemFlow::new(
            redeemer.clone(),
            RobloxClient::new(
                http,
                settings.roblox_users_url.clone(),
                settings.roblox_thumbnails_url.clone(),
            ),
        );
        let admin = AdminPanel::new(store.clone(), fingerprints, used_ips);

        let config = store.get()?;
        tracing::info!(
            max_uses = config.max_uses,
            webhook = if config.webhook_configured() { "configured" } else { "not configured" },
            fingerprint_check = settings.check_fingerprint,
            ip_check = settings.check_ip,
            "Widget ready"
        );

        Ok(Self {
            settings,
            store,
            redeemer,
            flow,
            admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::HostProbe;
    use tempfile::TempDir;

    fn offline_settings(dir: &TempDir) -> Settings {
        Settings {
            data_dir: dir.path().join("data").to_string_lossy().to_string(),
            check_ip: false,
            ip_services: vec![],
            audio_timeout_ms: 20,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();

        let widget = Widget::open(offline_settings(&dir)).unwrap();
        let r = widget.redeemer.validate("teste", "Alice", &HostProbe).await.unwrap();
        assert!(r.success);
        drop(widget);

        let widget = Widget::open(offline_settings(&dir)).unwrap();
        let stats = widget.store.stats().unwrap();
        assert_eq!(stats.redeemed_users, vec!["alice"]);

        // Same host fingerprint is remembered across restarts
        let r = widget.redeemer.validate("teste", "Bob", &HostProbe).await.unwrap();
        assert!(!r.success);
        assert_eq!(r.rejection, Some(crate::engine::Rejection::BrowserAlreadyUsed));
    }

    #[tokio::test]
    async fn test_obfuscated_files_on_disk() {
        let dir = TempDir::new().unwrap();
        let widget = Widget::open(offline_settings(&dir)).unwrap();
        widget.store.get().unwrap();

        let raw = std::fs::read_to_string(dir.path().join("data").join("redeemer_data.json")).unwrap();
        assert!(!raw.contains("TESTE"));
        assert!(dir.path().join("data").join("storage_key.json").exists());
    }

    #[tokio::test]
    async fn test_plain_storage_when_disabled() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            obfuscate_storage: false,
            ..offline_settings(&dir)
        };
        let widget = Widget::open(settings).unwrap();
        widget.store.get().unwrap();

        let raw = std::fs::read_to_string(dir.path().join("data").join("redeemer_data.json")).unwrap();
        assert!(raw.contains("TESTE"));
    }
}
