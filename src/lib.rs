pub mod admin;
pub mod app;
#[cfg(feature = "desktop")]
mod commands;
pub mod engine;
pub mod error;
pub mod identity;
pub mod logging;
pub mod notify;
pub mod pending;
pub mod roblox;
pub mod settings;
pub mod storage;
pub mod store;
pub mod util;

#[cfg(feature = "desktop")]
pub fn run() {
    let settings = settings::load_settings();
    logging::init(&settings.log_filter);

    let widget = match app::Widget::open(settings) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open widget storage");
            std::process::exit(1);
        }
    };

    tauri::Builder::default()
        .manage(widget)
        .invoke_handler(tauri::generate_handler![
            commands::redeem::redeem_code,
            commands::redeem::begin_redeem,
            commands::redeem::confirm_redeem,
            commands::redeem::cancel_redeem,
            commands::redeem::remaining_uses,
            commands::redeem::confirm_account_enabled,
            commands::admin::admin_login,
            commands::admin::admin_logout,
            commands::admin::admin_overview,
            commands::admin::admin_update_code,
            commands::admin::admin_update_limit,
            commands::admin::admin_update_webhook,
            commands::admin::admin_change_password,
            commands::admin::admin_reset_stats,
            commands::admin::admin_clear_all,
        ])
        .run(tauri::generate_context!())
        .expect("failed to run Redeemer");
}
