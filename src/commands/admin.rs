use crate::admin::{AdminOverview, AdminToken};
use crate::app::Widget;
use crate::error::Result;

#[tauri::command]
pub async fn admin_login(password: String, state: tauri::State<'_, Widget>) -> Result<AdminToken> {
    state.admin.login(&password)
}

#[tauri::command]
pub async fn admin_logout(token: String, state: tauri::State<'_, Widget>) -> Result<()> {
    state.admin.logout(&token)
}

#[tauri::command]
pub async fn admin_overview(token: String, state: tauri::State<'_, Widget>) -> Result<AdminOverview> {
    state.admin.overview(&token)
}

#[tauri::command]
pub async fn admin_update_code(
    token: String,
    code: String,
    state: tauri::State<'_, Widget>,
) -> Result<AdminOverview> {
    state.admin.update_code(&token, &code)
}

#[tauri::command]
pub async fn admin_update_limit(
    token: String,
    max_uses: u32,
    state: tauri::State<'_, Widget>,
) -> Result<AdminOverview> {
    state.admin.update_limit(&token, max_uses)
}

#[tauri::command]
pub async fn admin_update_webhook(
    token: String,
    url: String,
    state: tauri::State<'_, Widget>,
) -> Result<AdminOverview> {
    state.admin.update_webhook(&token, &url)
}

#[tauri::command]
pub async fn admin_change_password(
    token: String,
    password: String,
    state: tauri::State<'_, Widget>,
) -> Result<()> {
    state.admin.change_password(&token, &password)
}

#[tauri::command]
pub async fn admin_reset_stats(token: String, state: tauri::State<'_, Widget>) -> Result<AdminOverview> {
    state.admin.reset_stats(&token)
}

#[tauri::command]
pub async fn admin_clear_all(token: String, state: tauri::State<'_, Widget>) -> Result<AdminOverview> {
    state.admin.clear_all(&token)
}
