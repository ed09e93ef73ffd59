use serde::Serialize;

/// All errors that can surface from the redemption core or the admin panel.
///
/// Rejected redemptions are not errors: they come back as a
/// [`ValidationResult`](crate::engine::ValidationResult) with `success: false`.
#[derive(Debug, thiserror::Error)]
pub enum RedeemError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Incorrect password")]
    Unauthorized,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Roblox user not found: {0}")]
    UserNotFound(String),

    #[error("No redemption is waiting for confirmation")]
    NoPendingRedemption,

    #[error("{0}")]
    Custom(String),
}

// Tauri requires error types to implement Serialize for IPC transport.
impl Serialize for RedeemError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RedeemError>;
