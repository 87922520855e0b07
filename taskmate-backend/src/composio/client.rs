//! REST client for the Composio v3 API

use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};

use super::envelope::{first_id, first_str};
use super::{ApiKeyFields, ConnectedAccount, LinkResponse, ToolBroker, ToolInfo, ToolQuery};
use crate::config::ComposioConfig;

const TOOL_CACHE_CAPACITY: u64 = 500;

/// (external user, toolkits, search, limit)
type ToolCacheKey = (String, ToolQuery);

pub struct ComposioClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    tool_cache: Cache<ToolCacheKey, Vec<ToolInfo>>,
}

impl ComposioClient {
    pub fn new(config: &ComposioConfig) -> Self {
        let tool_cache = Cache::builder()
            .max_capacity(TOOL_CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(config.tool_cache_ttl_secs))
            .build();

        Self {
            client: crate::http::shared_client().clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            tool_cache,
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "COMPOSIO_API_KEY is not configured".to_string())?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-api-key", api_key)
            .header("Accept", "application/json"))
    }

    async fn send_json(&self, builder: RequestBuilder, what: &str) -> Result<Value, String> {
        let response = builder
            .send()
            .await
            .map_err(|e| format!("Composio {} request failed: {}", what, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read Composio {} response: {}", what, e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| first_str(&v, &["error.message", "message", "error"]))
                .unwrap_or_else(|| body.chars().take(300).collect());
            return Err(format!("Composio {} failed ({}): {}", what, status, message));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| format!("Invalid JSON from Composio {}: {}", what, e))
    }

    fn parse_tool(value: &Value) -> Option<ToolInfo> {
        let name = first_str(value, &["slug", "name", "enum"])?;
        Some(ToolInfo {
            name,
            description: first_str(value, &["description"]),
            parameters: value
                .get("input_parameters")
                .or_else(|| value.get("parameters"))
                .cloned()
                .unwrap_or(Value::Null),
            toolkit: first_str(value, &["toolkit.slug", "appName"]),
        })
    }
}

#[async_trait]
impl ToolBroker for ComposioClient {
    async fn list_tools(&self, user_id: &str, query: &ToolQuery) -> Result<Vec<ToolInfo>, String> {
        let key = (user_id.to_string(), query.clone());
        if let Some(cached) = self.tool_cache.get(&key) {
            log::debug!("[Composio] Tool cache hit for {:?}", query.toolkits);
            return Ok(cached);
        }

        let mut params: Vec<(&str, String)> = Vec::new();
        if !query.toolkits.is_empty() {
            params.push(("toolkit_slug", query.toolkits.join(",")));
        }
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let builder = self.request(Method::GET, "/api/v3/tools")?.query(&params);
        let body = self.send_json(builder, "list tools").await?;
        let tools: Vec<ToolInfo> = super::envelope::extract_array(&body, &["items", "data.items", ""])
            .iter()
            .filter_map(Self::parse_tool)
            .collect();

        log::info!(
            "[Composio] Listed {} tools for {:?} (search: {:?})",
            tools.len(),
            query.toolkits,
            query.search
        );
        self.tool_cache.insert(key, tools.clone());
        Ok(tools)
    }

    async fn execute(&self, user_id: &str, tool: &str, arguments: Value) -> Result<Value, String> {
        log::debug!("[Composio] Executing {} for {}", tool, user_id);
        let builder = self
            .request(Method::POST, &format!("/api/v3/tools/execute/{}", tool))?
            .json(&json!({
                "user_id": user_id,
                "arguments": arguments,
            }));
        self.send_json(builder, &format!("execute {}", tool)).await
    }

    async fn link_account(
        &self,
        auth_config_id: &str,
        user_id: &str,
        callback_url: &str,
    ) -> Result<LinkResponse, String> {
        let builder = self
            .request(Method::POST, "/api/v3/connected_accounts/link")?
            .json(&json!({
                "auth_config_id": auth_config_id,
                "user_id": user_id,
                "callback_url": callback_url,
            }));
        let body = self.send_json(builder, "link account").await?;
        Ok(LinkResponse {
            connected_account_id: first_id(&body, &["connected_account_id", "connectedAccountId", "id"]),
            link_url: first_str(&body, &["link_url", "linkUrl"]),
            redirect_url: first_str(&body, &["redirect_url", "redirectUrl"]),
        })
    }

    async fn initiate_api_key_connection(
        &self,
        auth_config_id: Option<&str>,
        user_id: &str,
        fields: &ApiKeyFields,
    ) -> Result<Value, String> {
        let auth_config_id =
            auth_config_id.ok_or_else(|| "COMPOSIO_CANVAS_AUTH_CONFIG_ID is not configured".to_string())?;
        let builder = self
            .request(Method::POST, "/api/v3/connected_accounts")?
            .json(&json!({
                "auth_config": { "id": auth_config_id },
                "connection": {
                    "user_id": user_id,
                    "state": {
                        "authScheme": "API_KEY",
                        "val": {
                            "api_key": fields.api_key,
                            "generic_api_key": fields.api_key,
                            "full": fields.base_url,
                            "base_url": fields.base_url,
                        }
                    }
                }
            }));
        self.send_json(builder, "create connection").await
    }

    async fn get_account(&self, account_id: &str) -> Result<ConnectedAccount, String> {
        let builder = self.request(
            Method::GET,
            &format!("/api/v3/connected_accounts/{}", urlencoding::encode(account_id)),
        )?;
        let body = self.send_json(builder, "get account").await?;
        ConnectedAccount::from_value(&body)
            .ok_or_else(|| format!("Composio returned no account for {}", account_id))
    }

    async fn list_accounts(&self, user_id: &str) -> Result<Vec<ConnectedAccount>, String> {
        let builder = self
            .request(Method::GET, "/api/v3/connected_accounts")?
            .query(&[("user_ids", user_id), ("limit", "100")]);
        let body = self.send_json(builder, "list accounts").await?;
        Ok(super::envelope::extract_array(&body, &["items", "data.items", ""])
            .iter()
            .filter_map(ConnectedAccount::from_value)
            .collect())
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), String> {
        let builder = self.request(
            Method::DELETE,
            &format!("/api/v3/connected_accounts/{}", urlencoding::encode(account_id)),
        )?;
        self.send_json(builder, "delete account").await?;
        log::info!("[Composio] Deleted connected account {}", account_id);
        Ok(())
    }
}
