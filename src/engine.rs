//! Redemption validation.
//!
//! A submission goes through these checks in order and stops at the first
//! failure:
//!
//! 1. code matches the configured secret (case-insensitive)
//! 2. username has not redeemed yet
//! 3. browser fingerprint has not redeemed yet (when enabled)
//! 4. public IP has not redeemed yet (when enabled and the IP is known)
//! 5. places are left
//!
//! Cheap string checks come first so a wrong code never touches the network.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::identity::{fingerprint, EnvironmentProbe, FingerprintLedger, IpLookup, UsedSet};
use crate::notify::{spawn_notification, Notifier, RedemptionNotice};
use crate::settings::Settings;
use crate::store::{remaining_uses, ConfigStore};

/// Why a submission was turned down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Rejection {
    MissingCode,
    MissingUsername,
    InvalidCode,
    AlreadyRedeemed,
    BrowserAlreadyUsed,
    ConnectionAlreadyUsed,
    NoPlacesLeft,
}

impl Rejection {
    pub fn message(self) -> &'static str {
        match self {
            Rejection::MissingCode => "Please enter a code",
            Rejection::MissingUsername => "Please enter your Roblox username",
            Rejection::InvalidCode => "Invalid code",
            Rejection::AlreadyRedeemed => "You have already redeemed this code",
            Rejection::BrowserAlreadyUsed => {
                "This browser has already been used to redeem this code"
            }
            Rejection::ConnectionAlreadyUsed => {
                "This connection has already been used to redeem this code"
            }
            Rejection::NoPlacesLeft => "All places have been taken",
        }
    }
}

/// Form-level check run before a submission reaches [`Redeemer::validate`].
pub fn check_form(code: &str, username: &str) -> Option<Rejection> {
    if code.trim().is_empty() {
        Some(Rejection::MissingCode)
    } else if username.trim().is_empty() {
        Some(Rejection::MissingUsername)
    } else {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_uses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl ValidationResult {
    pub fn rejected(reason: Rejection) -> Self {
        Self {
            success: false,
            message: reason.message().to_string(),
            remaining_uses: None,
            rejection: Some(reason),
        }
    }

    pub fn redeemed(remaining: u32) -> Self {
        Self {
            success: true,
            message: "Code redeemed successfully!".to_string(),
            remaining_uses: Some(remaining),
            rejection: None,
        }
    }
}

/// Which of the optional dedup checks run.
#[derive(Clone, Debug)]
pub struct Policy {
    pub check_fingerprint: bool,
    pub check_ip: bool,
    pub audio_timeout: Duration,
}

impl Policy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            check_fingerprint: settings.check_fingerprint,
            check_ip: settings.check_ip,
            audio_timeout: settings.audio_timeout(),
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

pub struct Redeemer {
    store: Arc<ConfigStore>,
    fingerprints: Arc<FingerprintLedger>,
    used_ips: Arc<UsedSet>,
    ip_lookup: Arc<dyn IpLookup>,
    notifier: Arc<dyn Notifier>,
    policy: Policy,
    // Held for a whole submission so two in-flight submissions cannot both
    // pass the checks before either commits.
    in_flight: Mutex<()>,
}

impl Redeemer {
    pub fn new(
        store: Arc<ConfigStore>,
        fingerprints: Arc<FingerprintLedger>,
        used_ips: Arc<UsedSet>,
        ip_lookup: Arc<dyn IpLookup>,
        notifier: Arc<dyn Notifier>,
        policy: Policy,
    ) -> Self {
        Self {
            store,
            fingerprints,
            used_ips,
            ip_lookup,
            notifier,
            policy,
            in_flight: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn remaining_uses(&self) -> Result<u32> {
        let data = self.store.snapshot()?;
        Ok(remaining_uses(&data.config, &data.stats))
    }

    /// Validate a submission and, when it passes, commit it.
    ///
    /// Only storage errors come back as `Err`; every policy outcome is an `Ok`.
    pub async fn validate(
        &self,
        code: &str,
        username: &str,
        probe: &dyn EnvironmentProbe,
    ) -> Result<ValidationResult> {
        let code = code.trim();
        let username = username.trim();

        let _in_flight = self.in_flight.lock().await;

        let data = self.store.snapshot()?;
        let expected = data.config.secret_code.trim().to_uppercase();
        if code.is_empty() || code.to_uppercase() != expected {
            return Ok(reject(Rejection::InvalidCode, username));
        }
        if username.is_empty() {
            return Ok(ValidationResult::rejected(Rejection::MissingUsername));
        }

        if data.stats.has_redeemed(username) {
            return Ok(reject(Rejection::AlreadyRedeemed, username));
        }

        let mut browser = None;
        if self.policy.check_fingerprint {
            let fp = fingerprint::generate(probe, self.policy.audio_timeout).await;
            let known = self.fingerprints.is_known(&fp.hash);
            if known.value() == Some(&true) {
                return Ok(reject(Rejection::BrowserAlreadyUsed, username));
            }
            browser = Some(fp.hash);
        }

        let mut ip = None;
        if self.policy.check_ip {
            let lookup = self.ip_lookup.lookup().await;
            if let Some(addr) = lookup.into_value() {
                if self.used_ips.contains(&addr)? {
                    return Ok(reject(Rejection::ConnectionAlreadyUsed, username));
                }
                ip = Some(addr);
            }
        }

        if data.stats.total_redeems >= data.config.max_uses {
            return Ok(reject(Rejection::NoPlacesLeft, username));
        }

        // Commit. Username and quota are re-checked against the stored copy in
        // case the admin panel changed something meanwhile.
        let committed = self.store.transaction(|d| {
            if d.stats.has_redeemed(username) {
                return Err(Rejection::AlreadyRedeemed);
            }
            if d.stats.total_redeems >= d.config.max_uses {
                return Err(Rejection::NoPlacesLeft);
            }
            d.stats.record(username);
            Ok((d.config.clone(), remaining_uses(&d.config, &d.stats)))
        })?;

        let (config, remaining) = match committed {
            Ok(c) => c,
            Err(reason) => return Ok(reject(reason, username)),
        };

        if let Some(hash) = &browser {
            self.fingerprints.record(hash);
        }
        if let Some(addr) = &ip {
            if let Err(e) = self.used_ips.insert(addr) {
                tracing::warn!(error = %e, "Failed to save IP");
            }
        }

        tracing::info!(username = %username, remaining, "Code redeemed");

        if config.webhook_configured() {
            spawn_notification(
                self.notifier.clone(),
                config.webhook_url.clone(),
                RedemptionNotice {
                    username: username.to_string(),
                    code: config.secret_code.clone(),
                    remaining_uses: remaining,
                    at: chrono::Utc::now(),
                },
            );
        }

        Ok(ValidationResult::redeemed(remaining))
    }
}

fn reject(reason: Rejection, username: &str) -> ValidationResult {
    tracing::info!(username = %username, reason = ?reason, "Redemption rejected");
    ValidationResult::rejected(reason)
}
