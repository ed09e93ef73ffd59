use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{RedeemError, Result};

pub const PLACEHOLDER_AVATAR: &str = "https://via.placeholder.com/150?text=Avatar";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobloxUser {
    pub user_id: u64,
    pub avatar_url: String,
}

#[derive(Deserialize)]
struct UsersResponse {
    #[serde(default)]
    data: Vec<UserEntry>,
}

#[derive(Deserialize)]
struct UserEntry {
    id: u64,
}

#[derive(Deserialize)]
struct ThumbnailsResponse {
    #[serde(default)]
    data: Vec<ThumbnailEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailEntry {
    #[serde(default)]
    image_url: Option<String>,
}

/// Looks up Roblox accounts by username.
pub struct RobloxClient {
    client: reqwest::Client,
    users_url: String,
    thumbnails_url: String,
}

impl RobloxClient {
    pub fn new(client: reqwest::Client, users_url: String, thumbnails_url: String) -> Self {
        Self {
            client,
            users_url,
            thumbnails_url,
        }
    }

    /// Resolve `username` to its id and headshot. `Ok(None)` when no
    /// (non-banned) account has that name.
    pub async fn lookup(&self, username: &str) -> Result<Option<RobloxUser>> {
        let response = self
            .client
            .post(&self.users_url)
            .json(&json!({
                "usernames": [username],
                "excludeBannedUsers": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RedeemError::Custom(format!(
                "Roblox users API responded with {}",
                response.status()
            )));
        }

        let users: UsersResponse = response.json().await?;
        let Some(user) = users.data.first() else {
            return Ok(None);
        };

        let avatar_url = self.avatar(user.id).await.unwrap_or_else(|| PLACEHOLDER_AVATAR.into());

        Ok(Some(RobloxUser {
            user_id: user.id,
            avatar_url,
        }))
    }

    /// Headshot URL, or `None` when the thumbnail API has nothing usable.
    async fn avatar(&self, user_id: u64) -> Option<String> {
        let user_id = user_id.to_string();
        let response = self
            .client
            .get(&self.thumbnails_url)
            .query(&[
                ("userIds", user_id.as_str()),
                ("size", "150x150"),
                ("format", "Png"),
                ("isCircular", "false"),
            ])
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        let thumbs: ThumbnailsResponse = response.json().await.ok()?;
        thumbs.data.into_iter().next().and_then(|t| t.image_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RobloxClient {
        RobloxClient::new(
            reqwest::Client::new(),
            format!("{}/v1/usernames/users", server.uri()),
            format!("{}/v1/users/avatar-headshot", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_lookup_resolves_id_and_avatar() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usernames/users"))
            .and(body_json(json!({"usernames": ["Builderman"], "excludeBannedUsers": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 156, "name": "builderman", "displayName": "Builderman"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/users/avatar-headshot"))
            .and(query_param("userIds", "156"))
            .and(query_param("size", "150x150"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"targetId": 156, "state": "Completed", "imageUrl": "https://tr.rbxcdn.com/abc.png"}]
            })))
            .mount(&server)
            .await;

        let user = client_for(&server).lookup("Builderman").await.unwrap().unwrap();
        assert_eq!(user.user_id, 156);
        assert_eq!(user.avatar_url, "https://tr.rbxcdn.com/abc.png");
    }

    #[tokio::test]
    async fn test_unknown_user_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usernames/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        assert_eq!(client_for(&server).lookup("nobody_here").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_thumbnail_uses_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usernames/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 7}]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/users/avatar-headshot"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let user = client_for(&server).lookup("seven").await.unwrap().unwrap();
        assert_eq!(user.avatar_url, PLACEHOLDER_AVATAR);
    }

    #[tokio::test]
    async fn test_users_api_error_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        assert!(client_for(&server).lookup("someone").await.is_err());
    }
}
