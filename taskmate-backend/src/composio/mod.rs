//! Composio integration broker.
//!
//! Everything that talks to Composio goes through the [`ToolBroker`] trait so
//! the calendar, Canvas and Gmail flows can be exercised against a scripted
//! broker in tests.

pub mod client;
pub mod envelope;
pub mod tool_select;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use client::ComposioClient;

/// One entry of a toolkit listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool slug, e.g. `GMAIL_LIST_MESSAGES`
    pub name: String,
    pub description: Option<String>,
    pub parameters: Value,
    pub toolkit: Option<String>,
}

/// Filter for a tool listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ToolQuery {
    pub toolkits: Vec<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
}

impl ToolQuery {
    pub fn toolkit(slug: &str) -> Self {
        Self {
            toolkits: vec![slug.to_uppercase()],
            ..Default::default()
        }
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of starting a hosted OAuth link
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkResponse {
    pub connected_account_id: Option<String>,
    pub link_url: Option<String>,
    pub redirect_url: Option<String>,
}

impl LinkResponse {
    /// The URL the browser should be sent to
    pub fn url(&self) -> Option<&str> {
        self.link_url.as_deref().or(self.redirect_url.as_deref())
    }
}

/// Credentials for an API-key based connection (Canvas)
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyFields {
    pub api_key: String,
    pub base_url: Option<String>,
}

/// A connected account as reported by Composio.
///
/// Field names drifted between API versions, so owner and toolkit are read
/// from whichever alias is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccount {
    pub id: String,
    pub status: Option<String>,
    pub toolkit_slug: Option<String>,
    pub user_id: Option<String>,
}

impl ConnectedAccount {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = envelope::first_id(value, &["id", "nanoid", "connected_account_id"])?;
        Some(Self {
            id,
            status: envelope::first_str(value, &["status"]),
            toolkit_slug: envelope::first_str(
                value,
                &["toolkit.slug", "toolkit_slug", "appName", "app_name", "appUniqueId"],
            ),
            user_id: envelope::first_str(
                value,
                &["user_id", "externalUserId", "external_user_id", "userId", "clientUniqueUserId"],
            ),
        })
    }

    pub fn is_active(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("ACTIVE"))
            .unwrap_or(false)
    }
}

/// Operations the backend needs from an integration broker
#[async_trait]
pub trait ToolBroker: Send + Sync {
    /// List tools for the given external user
    async fn list_tools(&self, user_id: &str, query: &ToolQuery) -> Result<Vec<ToolInfo>, String>;

    /// Execute a tool and return the raw result envelope
    async fn execute(&self, user_id: &str, tool: &str, arguments: Value) -> Result<Value, String>;

    /// Start a hosted OAuth flow for `user_id` against an auth config
    async fn link_account(
        &self,
        auth_config_id: &str,
        user_id: &str,
        callback_url: &str,
    ) -> Result<LinkResponse, String>;

    /// Create an API-key connection directly; returns the raw account payload
    async fn initiate_api_key_connection(
        &self,
        auth_config_id: Option<&str>,
        user_id: &str,
        fields: &ApiKeyFields,
    ) -> Result<Value, String>;

    async fn get_account(&self, account_id: &str) -> Result<ConnectedAccount, String>;

    async fn list_accounts(&self, user_id: &str) -> Result<Vec<ConnectedAccount>, String>;

    async fn delete_account(&self, account_id: &str) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connected_account_aliases() {
        let v3 = json!({"id": "ca_1", "status": "ACTIVE", "toolkit": {"slug": "gmail"}, "user_id": "user_3"});
        let account = ConnectedAccount::from_value(&v3).unwrap();
        assert_eq!(account.toolkit_slug.as_deref(), Some("gmail"));
        assert_eq!(account.user_id.as_deref(), Some("user_3"));
        assert!(account.is_active());

        let legacy = json!({"id": "ca_2", "status": "INITIATED", "appName": "canvas", "externalUserId": "user_4"});
        let account = ConnectedAccount::from_value(&legacy).unwrap();
        assert_eq!(account.toolkit_slug.as_deref(), Some("canvas"));
        assert_eq!(account.user_id.as_deref(), Some("user_4"));
        assert!(!account.is_active());

        assert!(ConnectedAccount::from_value(&json!({"status": "ACTIVE"})).is_none());
    }

    #[test]
    fn test_link_response_prefers_link_url() {
        let link = LinkResponse {
            connected_account_id: None,
            link_url: Some("https://link".into()),
            redirect_url: Some("https://redirect".into()),
        };
        assert_eq!(link.url(), Some("https://link"));
        assert_eq!(LinkResponse::default().url(), None);
    }
}
