use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub email: Option<String>,
    pub email_verified: bool,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_login_at: Option<String>,
}

impl User {
    /// The id this user is known by at Composio
    pub fn external_user_id(&self) -> String {
        external_user_id(self.user_id)
    }
}

/// A linked OAuth provider account
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub identity_id: i64,
    pub user_id: i64,
    pub provider: String,
    pub provider_user_id: String,
    pub provider_username: Option<String>,
    pub avatar_url: Option<String>,
    pub scopes: Option<String>,
    pub linked_at: String,
}

/// The subset of `GET /user` we keep from GitHub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubProfile {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

pub fn external_user_id(user_id: i64) -> String {
    format!("user_{}", user_id)
}

/// Reverse of [`external_user_id`]. Only `user_<integer>` is accepted.
pub fn parse_external_user_id(external: &str) -> Option<i64> {
    let digits = external.strip_prefix("user_")?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
