//! Scripted collaborators for unit and controller tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::web;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::ai::EmailAnalyzer;
use crate::composio::{ApiKeyFields, ConnectedAccount, LinkResponse, ToolBroker, ToolInfo, ToolQuery};
use crate::config::Config;
use crate::db::Database;
use crate::integrations::github::GithubOAuthClient;
use crate::models::{EmailAnalysis, EmailCategory, EmailPriority, User};
use crate::AppState;

struct ScriptedTools {
    toolkit: String,
    search: Option<String>,
    result: Result<Vec<String>, String>,
}

struct ScriptedResult {
    tool: String,
    args: Option<Value>,
    result: Result<Value, String>,
}

/// Every key of `pattern` is present in `args` with an equal value
fn args_match(pattern: &Value, args: &Value) -> bool {
    match pattern.as_object() {
        Some(fields) => fields.iter().all(|(k, v)| args.get(k) == Some(v)),
        None => pattern == args,
    }
}

/// A [`ToolBroker`] that answers from scripted listings and results and
/// records every call. Unscripted tool executions fail.
#[derive(Default)]
pub struct FakeBroker {
    tools: Vec<ScriptedTools>,
    results: Vec<ScriptedResult>,
    link: Option<Result<LinkResponse, String>>,
    api_key_connection: Option<Result<Value, String>>,
    accounts: Vec<ConnectedAccount>,
    executed: Mutex<Vec<(String, String, Value)>>,
    links: Mutex<Vec<(String, String, String)>>,
    api_key_calls: Mutex<Vec<(Option<String>, String, String, Option<String>)>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(mut self, toolkit: &str, search: Option<&str>, names: &[&str]) -> Self {
        self.tools.push(ScriptedTools {
            toolkit: toolkit.to_uppercase(),
            search: search.map(String::from),
            result: Ok(names.iter().map(|n| n.to_string()).collect()),
        });
        self
    }

    /// Every listing of `toolkit` fails, whatever the search
    pub fn with_tools_error(mut self, toolkit: &str, error: &str) -> Self {
        self.tools.push(ScriptedTools {
            toolkit: toolkit.to_uppercase(),
            search: None,
            result: Err(error.to_string()),
        });
        self
    }

    pub fn with_result(mut self, tool: &str, result: Value) -> Self {
        self.results.push(ScriptedResult {
            tool: tool.to_string(),
            args: None,
            result: Ok(result),
        });
        self
    }

    /// Result used only when the call's arguments contain every field of `args`
    pub fn with_result_for_args(mut self, tool: &str, args: Value, result: Value) -> Self {
        self.results.push(ScriptedResult {
            tool: tool.to_string(),
            args: Some(args),
            result: Ok(result),
        });
        self
    }

    pub fn with_error(mut self, tool: &str, error: &str) -> Self {
        self.results.push(ScriptedResult {
            tool: tool.to_string(),
            args: None,
            result: Err(error.to_string()),
        });
        self
    }

    pub fn with_error_for_args(mut self, tool: &str, args: Value, error: &str) -> Self {
        self.results.push(ScriptedResult {
            tool: tool.to_string(),
            args: Some(args),
            result: Err(error.to_string()),
        });
        self
    }

    pub fn with_link(mut self, link: Result<LinkResponse, String>) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_api_key_connection(mut self, result: Result<Value, String>) -> Self {
        self.api_key_connection = Some(result);
        self
    }

    pub fn with_account(mut self, id: &str, toolkit: &str, user_id: Option<&str>, status: &str) -> Self {
        self.accounts.push(ConnectedAccount {
            id: id.to_string(),
            status: Some(status.to_string()),
            toolkit_slug: Some(toolkit.to_string()),
            user_id: user_id.map(String::from),
        });
        self
    }

    /// `(user_id, tool, arguments)` for every execution, in call order
    pub fn executed(&self) -> Vec<(String, String, Value)> {
        self.executed.lock().unwrap().clone()
    }

    /// `(auth_config_id, user_id, callback_url)` for every link request
    pub fn links(&self) -> Vec<(String, String, String)> {
        self.links.lock().unwrap().clone()
    }

    /// `(auth_config_id, user_id, api_key, base_url)` for every API-key connection
    pub fn api_key_calls(&self) -> Vec<(Option<String>, String, String, Option<String>)> {
        self.api_key_calls.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolBroker for FakeBroker {
    async fn list_tools(&self, _user_id: &str, query: &ToolQuery) -> Result<Vec<ToolInfo>, String> {
        let scripted = self.tools.iter().find(|t| {
            query.toolkits.iter().any(|k| k.eq_ignore_ascii_case(&t.toolkit))
                && (t.search == query.search || t.result.is_err())
        });
        match scripted {
            Some(ScriptedTools { result: Ok(names), toolkit, .. }) => Ok(names
                .iter()
                .map(|name| ToolInfo {
                    name: name.clone(),
                    description: Some(format!("{} tool", name)),
                    parameters: serde_json::json!({"type": "object"}),
                    toolkit: Some(toolkit.clone()),
                })
                .collect()),
            Some(ScriptedTools { result: Err(e), .. }) => Err(e.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn execute(&self, user_id: &str, tool: &str, arguments: Value) -> Result<Value, String> {
        self.executed
            .lock()
            .unwrap()
            .push((user_id.to_string(), tool.to_string(), arguments.clone()));

        let specific = self.results.iter().find(|r| {
            r.tool == tool && r.args.as_ref().map(|p| args_match(p, &arguments)).unwrap_or(false)
        });
        let generic = || self.results.iter().find(|r| r.tool == tool && r.args.is_none());
        specific
            .or_else(generic)
            .map(|r| r.result.clone())
            .unwrap_or_else(|| Err(format!("no scripted result for {}", tool)))
    }

    async fn link_account(
        &self,
        auth_config_id: &str,
        user_id: &str,
        callback_url: &str,
    ) -> Result<LinkResponse, String> {
        self.links.lock().unwrap().push((
            auth_config_id.to_string(),
            user_id.to_string(),
            callback_url.to_string(),
        ));
        self.link
            .clone()
            .unwrap_or_else(|| Err("no scripted link".to_string()))
    }

    async fn initiate_api_key_connection(
        &self,
        auth_config_id: Option<&str>,
        user_id: &str,
        fields: &ApiKeyFields,
    ) -> Result<Value, String> {
        self.api_key_calls.lock().unwrap().push((
            auth_config_id.map(String::from),
            user_id.to_string(),
            fields.api_key.clone(),
            fields.base_url.clone(),
        ));
        self.api_key_connection
            .clone()
            .unwrap_or_else(|| Err("no scripted API-key connection".to_string()))
    }

    async fn get_account(&self, account_id: &str) -> Result<ConnectedAccount, String> {
        self.accounts
            .iter()
            .find(|a| a.id == account_id)
            .cloned()
            .ok_or_else(|| format!("connected account {} not found", account_id))
    }

    async fn list_accounts(&self, _user_id: &str) -> Result<Vec<ConnectedAccount>, String> {
        Ok(self.accounts.clone())
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), String> {
        self.deleted.lock().unwrap().push(account_id.to_string());
        Ok(())
    }
}

/// Deterministic analyzer: subjects containing "urgent" are important
#[derive(Default)]
pub struct FakeAnalyzer {
    calls: AtomicUsize,
}

impl FakeAnalyzer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailAnalyzer for FakeAnalyzer {
    async fn analyze(&self, subject: &str, _to: &str, _body: &str) -> EmailAnalysis {
        self.calls.fetch_add(1, Ordering::SeqCst);
        EmailAnalysis {
            summary: format!("Summary of {}", subject),
            priority: if subject.to_lowercase().contains("urgent") {
                EmailPriority::Important
            } else {
                EmailPriority::Normal
            },
            category: EmailCategory::Academic,
        }
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| {
        let value = match key {
            "PUBLIC_URL" => "http://api.test",
            "FRONTEND_URL" => "http://app.test",
            "DATABASE_URL" => ":memory:",
            "COMPOSIO_API_KEY" => "composio-test",
            "COMPOSIO_GMAIL_AUTH_CONFIG_ID" => "ac_gmail",
            "COMPOSIO_GCALENDAR_AUTH_CONFIG_ID" => "ac_gcal",
            "CANVAS_BASE_URL" => "https://canvas.test",
            "CALENDAR_TIMEZONE" => "America/New_York",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

pub struct TestApp {
    pub state: web::Data<AppState>,
    pub broker: Arc<FakeBroker>,
    pub analyzer: Arc<FakeAnalyzer>,
}

impl TestApp {
    pub fn new(broker: FakeBroker) -> Self {
        Self::with_config(broker, test_config())
    }

    pub fn with_config(broker: FakeBroker, config: Config) -> Self {
        let broker = Arc::new(broker);
        let analyzer = Arc::new(FakeAnalyzer::default());
        let state = web::Data::new(AppState {
            db: Arc::new(Database::new(":memory:").unwrap()),
            github: config.github.clone().map(GithubOAuthClient::new),
            broker: broker.clone(),
            analyzer: analyzer.clone(),
            oauth_states: DashMap::new(),
            config,
        });
        Self { state, broker, analyzer }
    }

    /// Create a GitHub-backed user with a live session; returns the user and session token
    pub fn login(&self, login: &str, github_id: i64) -> (User, String) {
        let user = crate::db::tables::test_helpers::seed_user(&self.state.db, login, github_id);
        let session = self.state.db.create_session(user.user_id).unwrap();
        (user, session.token)
    }
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
