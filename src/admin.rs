//! Operator panel: change the code, the limit, the webhook, reset stats.
//!
//! Login hands out an in-memory token; every other operation needs it.

use rand::RngCore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{RedeemError, Result};
use crate::identity::{FingerprintLedger, UsedSet};
use crate::notify::is_valid_webhook_url;
use crate::store::{hash_password, remaining_uses, ConfigField, ConfigStore, WidgetData};

pub type AdminToken = String;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub secret_code: String,
    pub max_uses: u32,
    pub webhook_configured: bool,
    pub webhook_url: String,
    pub total_redeems: u32,
    pub remaining_uses: u32,
}

impl From<WidgetData> for AdminOverview {
    fn from(data: WidgetData) -> Self {
        Self {
            remaining_uses: remaining_uses(&data.config, &data.stats),
            webhook_configured: data.config.webhook_configured(),
            secret_code: data.config.secret_code,
            max_uses: data.config.max_uses,
            webhook_url: data.config.webhook_url,
            total_redeems: data.stats.total_redeems,
        }
    }
}

pub struct AdminPanel {
    store: Arc<ConfigStore>,
    fingerprints: Arc<FingerprintLedger>,
    used_ips: Arc<UsedSet>,
    sessions: Mutex<HashSet<AdminToken>>,
}

impl AdminPanel {
    pub fn new(
        store: Arc<ConfigStore>,
        fingerprints: Arc<FingerprintLedger>,
        used_ips: Arc<UsedSet>,
    ) -> Self {
        Self {
            store,
            fingerprints,
            used_ips,
            sessions: Mutex::new(HashSet::new()),
        }
    }

    fn sessions(&self) -> Result<std::sync::MutexGuard<'_, HashSet<AdminToken>>> {
        self.sessions
            .lock()
            .map_err(|_| RedeemError::Custom("Admin session lock poisoned".into()))
    }

    fn authorize(&self, token: &str) -> Result<()> {
        if self.sessions()?.contains(token) {
            Ok(())
        } else {
            Err(RedeemError::Unauthorized)
        }
    }

    pub fn login(&self, password: &str) -> Result<AdminToken> {
        if !self.store.verify_password(password.trim())? {
            tracing::warn!("Admin login rejected");
            return Err(RedeemError::Unauthorized);
        }

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.sessions()?.insert(token.clone());
        tracing::info!("Admin logged in");
        Ok(token)
    }

    pub fn logout(&self, token: &str) -> Result<()> {
        self.sessions()?.remove(token);
        Ok(())
    }

    pub fn overview(&self, token: &str) -> Result<AdminOverview> {
        self.authorize(token)?;
        Ok(self.store.snapshot()?.into())
    }

    /// Codes are stored upper-cased.
    pub fn update_code(&self, token: &str, code: &str) -> Result<AdminOverview> {
        self.authorize(token)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(RedeemError::InvalidInput("Please enter a new code".into()));
        }
        self.store.update(ConfigField::SecretCode(code.to_uppercase()))?;
        tracing::info!("Secret code updated");
        self.overview(token)
    }

    pub fn update_limit(&self, token: &str, max_uses: u32) -> Result<AdminOverview> {
        self.authorize(token)?;
        if max_uses < 1 {
            return Err(RedeemError::InvalidInput(
                "Please enter a valid number (minimum 1)".into(),
            ));
        }
        self.store.update(ConfigField::MaxUses(max_uses))?;
        tracing::info!(max_uses, "Usage limit updated");
        self.overview(token)
    }

    /// An empty URL turns notifications off.
    pub fn update_webhook(&self, token: &str, url: &str) -> Result<AdminOverview> {
        self.authorize(token)?;
        let url = url.trim();
        if !is_valid_webhook_url(url) {
            return Err(RedeemError::InvalidInput("Invalid Discord webhook URL".into()));
        }
        self.store.update(ConfigField::WebhookUrl(url.to_string()))?;
        tracing::info!(configured = !url.is_empty(), "Webhook updated");
        self.overview(token)
    }

    pub fn change_password(&self, token: &str, new_password: &str) -> Result<()> {
        self.authorize(token)?;
        let new_password = new_password.trim();
        if new_password.is_empty() {
            return Err(RedeemError::InvalidInput("Password cannot be empty".into()));
        }
        self.store
            .update(ConfigField::AdminPasswordHash(hash_password(new_password)))?;
        tracing::info!("Admin password changed");
        Ok(())
    }

    /// Zero the stats and forget every recorded browser and IP.
    /// Configuration is left as is.
    pub fn reset_stats(&self, token: &str) -> Result<AdminOverview> {
        self.authorize(token)?;
        self.store.reset_stats()?;
        self.forget_signals();
        tracing::info!("Stats reset");
        self.overview(token)
    }

    /// Factory reset: configuration, stats, and recorded signals.
    pub fn clear_all(&self, token: &str) -> Result<AdminOverview> {
        self.authorize(token)?;
        let data = self.store.clear_all()?;
        self.forget_signals();
        tracing::info!("All data cleared");
        Ok(data.into())
    }

    fn forget_signals(&self) {
        if let Err(e) = self.fingerprints.clear() {
            tracing::warn!(error = %e, "Failed to clear fingerprints");
        }
        if let Err(e) = self.used_ips.clear() {
            tracing::warn!(error = %e, "Failed to clear used IPs");
        }
    }
}
