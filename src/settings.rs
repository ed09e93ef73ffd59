use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RedeemError, Result};
use crate::util::expand_tilde;

pub const DEFAULT_IP_SERVICES: [&str; 3] = [
    "https://api.ipify.org?format=json",
    "https://api.my-ip.io/ip.json",
    "https://ipapi.co/json/",
];

/// Operator-level settings, read from `~/.redeemer/settings.json`.
///
/// Every field has a default so a partial file is still valid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub data_dir: String,
    pub obfuscate_storage: bool,
    pub check_fingerprint: bool,
    pub check_ip: bool,
    pub confirm_account: bool,
    pub ip_services: Vec<String>,
    pub roblox_users_url: String,
    pub roblox_thumbnails_url: String,
    pub audio_timeout_ms: u64,
    pub http_timeout_secs: u64,
    pub default_secret_code: String,
    pub default_max_uses: u32,
    pub default_webhook_url: String,
    pub initial_admin_password: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: "~/.redeemer/data".into(),
            obfuscate_storage: true,
            check_fingerprint: true,
            check_ip: true,
            confirm_account: true,
            ip_services: DEFAULT_IP_SERVICES.iter().map(|s| s.to_string()).collect(),
            roblox_users_url: "https://users.roblox.com/v1/usernames/users".into(),
            roblox_thumbnails_url: "https://thumbnails.roblox.com/v1/users/avatar-headshot".into(),
            audio_timeout_ms: 1000,
            http_timeout_secs: 10,
            default_secret_code: "TESTE".into(),
            default_max_uses: 2,
            default_webhook_url: String::new(),
            initial_admin_password: "changeme".into(),
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    /// Resolved storage root with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(expand_tilde(&self.data_dir))
    }

    pub fn audio_timeout(&self) -> Duration {
        Duration::from_millis(self.audio_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Shared HTTP client honouring the configured timeout.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout())
            .user_agent(concat!("Redeemer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RedeemError::from)
    }
}

pub fn settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".redeemer").join("settings.json"))
}

/// Load settings from the default location, falling back to defaults.
pub fn load_settings() -> Settings {
    match settings_path() {
        Some(path) => load_settings_from(&path),
        None => Settings::default(),
    }
}

/// Load settings from `path`. A missing or unparseable file yields defaults.
pub fn load_settings_from(path: &Path) -> Settings {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Settings::default(),
    };
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable settings file, using defaults");
            Settings::default()
        }
    }
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;
    Ok(())
}
