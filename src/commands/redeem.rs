use crate::app::Widget;
use crate::engine::{check_form, ValidationResult};
use crate::error::Result;
use crate::identity::{EnvironmentProbe, HostProbe, ReportedEnvironment};
use crate::pending::PendingRedemption;

/// The webview's report when it sent one, otherwise the native host.
fn probe_for(environment: Option<ReportedEnvironment>) -> Box<dyn EnvironmentProbe> {
    match environment {
        Some(env) => Box::new(env),
        None => Box::new(HostProbe),
    }
}

/// Redeem in one step (used when account confirmation is turned off).
#[tauri::command]
pub async fn redeem_code(
    code: String,
    username: String,
    environment: Option<ReportedEnvironment>,
    state: tauri::State<'_, Widget>,
) -> Result<ValidationResult> {
    if let Some(reason) = check_form(&code, &username) {
        return Ok(ValidationResult::rejected(reason));
    }
    let probe = probe_for(environment);
    state.redeemer.validate(&code, &username, probe.as_ref()).await
}

/// Look the Roblox account up and hold the submission for confirmation.
#[tauri::command]
pub async fn begin_redeem(
    code: String,
    username: String,
    state: tauri::State<'_, Widget>,
) -> Result<PendingRedemption> {
    state.flow.begin(&code, &username).await
}

#[tauri::command]
pub async fn confirm_redeem(
    environment: Option<ReportedEnvironment>,
    state: tauri::State<'_, Widget>,
) -> Result<ValidationResult> {
    let probe = probe_for(environment);
    state.flow.confirm(probe.as_ref()).await
}

#[tauri::command]
pub async fn cancel_redeem(state: tauri::State<'_, Widget>) -> Result<()> {
    state.flow.cancel().await;
    Ok(())
}

#[tauri::command]
pub async fn remaining_uses(state: tauri::State<'_, Widget>) -> Result<u32> {
    state.redeemer.remaining_uses()
}

/// Whether the front end should run the two-step confirm flow.
#[tauri::command]
pub async fn confirm_account_enabled(state: tauri::State<'_, Widget>) -> Result<bool> {
    Ok(state.settings.confirm_account)
}
