use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::engine::{check_form, Redeemer, ValidationResult};
use crate::error::{RedeemError, Result};
use crate::identity::EnvironmentProbe;
use crate::roblox::RobloxClient;

/// A submission waiting for the player to confirm the looked-up account.
/// Only ever held in memory.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRedemption {
    pub code: String,
    pub username: String,
    pub user_id: u64,
    pub avatar_url: String,
}

/// Two-step redemption: look the account up, show it, then redeem on confirm.
pub struct RedeemFlow {
    redeemer: Arc<Redeemer>,
    roblox: RobloxClient,
    pending: Mutex<Option<PendingRedemption>>,
}

impl RedeemFlow {
    pub fn new(redeemer: Arc<Redeemer>, roblox: RobloxClient) -> Self {
        Self {
            redeemer,
            roblox,
            pending: Mutex::new(None),
        }
    }

    /// Look up `username` and hold the submission for confirmation.
    /// Replaces anything already pending.
    pub async fn begin(&self, code: &str, username: &str) -> Result<PendingRedemption> {
        if let Some(reason) = check_form(code, username) {
            return Err(RedeemError::InvalidInput(reason.message().into()));
        }
        let code = code.trim();
        let username = username.trim();

        let user = match self.roblox.lookup(username).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(RedeemError::UserNotFound(username.to_string())),
            Err(e) => {
                tracing::error!(username = %username, error = %e, "Roblox lookup failed");
                return Err(RedeemError::Custom(
                    "Could not verify the Roblox account".into(),
                ));
            }
        };

        let pending = PendingRedemption {
            code: code.to_string(),
            username: username.to_string(),
            user_id: user.user_id,
            avatar_url: user.avatar_url,
        };
        *self.pending.lock().await = Some(pending.clone());
        Ok(pending)
    }

    pub async fn pending(&self) -> Option<PendingRedemption> {
        self.pending.lock().await.clone()
    }

    /// Redeem the pending submission. It is discarded whatever the outcome.
    pub async fn confirm(&self, probe: &dyn EnvironmentProbe) -> Result<ValidationResult> {
        let pending = self
            .pending
            .lock()
            .await
            .take()
            .ok_or(RedeemError::NoPendingRedemption)?;
        self.redeemer
            .validate(&pending.code, &pending.username, probe)
            .await
    }

    pub async fn cancel(&self) {
        self.pending.lock().await.take();
    }
}
