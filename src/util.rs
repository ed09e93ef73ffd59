/// Expands a leading `~` in a path to the user's home directory.
/// Also normalizes path separators for the current OS.
pub fn expand_tilde(path: &str) -> String {
    let result = if path.starts_with("~/") || path == "~" {
        if let Some(home) = dirs::home_dir() {
            let rest = path.strip_prefix("~/").unwrap_or("");
            home.join(rest).to_string_lossy().to_string()
        } else {
            path.to_string()
        }
    } else {
        path.to_string()
    };
    if cfg!(windows) {
        result.replace('/', "\\")
    } else {
        result
    }
}

/// Current time as Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Lowercases and trims a username the way it is stored in the redeemed list.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
