//! Sent-mail retrieval through Composio's Gmail toolkit

use chrono::{DateTime, TimeZone, Utc};
use futures_util::future::join_all;
use serde_json::{json, Value};

use crate::composio::envelope::{self, first_id, first_str};
use crate::composio::tool_select::{
    select_tool, select_tool_in_order, GMAIL_GET_EXACT, GMAIL_GET_KEYWORDS, GMAIL_LIST_EXACT,
    GMAIL_LIST_KEYWORDS,
};
use crate::composio::{ToolBroker, ToolInfo, ToolQuery};

pub const TOOLKIT: &str = "GMAIL";
pub const FALLBACK_LIST_TOOL: &str = "GMAIL_LIST_MESSAGES";
pub const MAX_MESSAGES: usize = 10;

pub const NO_LIST_TOOL: &str = "Gmail list messages tool not found";
pub const LIST_FAILED: &str = "Could not fetch Gmail messages";
pub const NO_MESSAGES: &str = "No sent emails found";

/// One fetched message, before analysis
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub id: String,
    pub subject: String,
    pub to: String,
    pub date: Option<String>,
    pub body: String,
}

impl SentEmail {
    /// First recipient of the `To` header
    pub fn sender(&self) -> String {
        self.to.split(',').next().unwrap_or_default().trim().to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SentEmails {
    pub emails: Vec<SentEmail>,
    pub message: Option<&'static str>,
}

impl SentEmails {
    fn empty(message: &'static str) -> Self {
        Self {
            emails: Vec::new(),
            message: Some(message),
        }
    }
}

/// Pick the first listed tool that is either a known list tool or looks like one,
/// falling back to a search
async fn find_list_tool(broker: &dyn ToolBroker, user_id: &str, tools: &[ToolInfo]) -> Option<String> {
    if let Some(tool) = select_tool_in_order(tools, GMAIL_LIST_EXACT, GMAIL_LIST_KEYWORDS) {
        return Some(tool.name.clone());
    }
    let searched = broker
        .list_tools(user_id, &ToolQuery::toolkit(TOOLKIT).search("list sent messages").limit(50))
        .await
        .unwrap_or_else(|e| {
            log::warn!("[Gmail] List tool search failed: {}", e);
            Vec::new()
        });
    select_tool_in_order(&searched, GMAIL_LIST_EXACT, GMAIL_LIST_KEYWORDS).map(|t| t.name.clone())
}

/// Pick the get-message tool; the search fallback only accepts exact names
async fn find_get_tool(broker: &dyn ToolBroker, user_id: &str, tools: &[ToolInfo]) -> Option<String> {
    if let Some(tool) = select_tool_in_order(tools, GMAIL_GET_EXACT, GMAIL_GET_KEYWORDS) {
        return Some(tool.name.clone());
    }
    let searched = broker
        .list_tools(user_id, &ToolQuery::toolkit(TOOLKIT).search("get message").limit(20))
        .await
        .unwrap_or_else(|e| {
            log::warn!("[Gmail] Get tool search failed: {}", e);
            Vec::new()
        });
    select_tool(&searched, GMAIL_GET_EXACT, &[]).map(|t| t.name.clone())
}

fn list_arguments() -> Value {
    json!({ "query": "in:sent", "maxResults": MAX_MESSAGES })
}

async fn list_messages(broker: &dyn ToolBroker, user_id: &str, tool: &str) -> Result<Value, String> {
    match broker.execute(user_id, tool, list_arguments()).await {
        Ok(result) => Ok(result),
        Err(e) => {
            log::error!("[Gmail] {} failed: {}", tool, e);
            broker
                .execute(user_id, FALLBACK_LIST_TOOL, list_arguments())
                .await
                .map_err(|alt| {
                    log::error!("[Gmail] Fallback {} also failed: {}", FALLBACK_LIST_TOOL, alt);
                    alt
                })
        }
    }
}

/// Pull subject, recipients, date and body out of a get-message result
pub fn parse_message(id: String, result: &Value) -> SentEmail {
    let message = envelope::message_payload(result);
    SentEmail {
        id,
        subject: envelope::header(message, "Subject").unwrap_or_else(|| "No Subject".to_string()),
        to: envelope::header(message, "To").unwrap_or_else(|| "Unknown".to_string()),
        date: envelope::header(message, "Date"),
        body: first_str(message, &["body.data", "snippet", "body.textPlain", "messageText"])
            .unwrap_or_default(),
    }
}

async fn fetch_message(
    broker: &dyn ToolBroker,
    user_id: &str,
    get_tool: &str,
    listed: &Value,
) -> Option<SentEmail> {
    let id = first_id(listed, &["id", "messageId", "message_id"])?;
    match broker
        .execute(user_id, get_tool, json!({ "messageId": id, "format": "full" }))
        .await
    {
        Ok(result) => Some(parse_message(id, &result)),
        Err(e) => {
            log::error!("[Gmail] Error fetching message {}: {}", id, e);
            None
        }
    }
}

/// The most recent sent messages with their headers and bodies
pub async fn fetch_sent_emails(broker: &dyn ToolBroker, user_id: &str) -> Result<SentEmails, String> {
    let tools = broker
        .list_tools(user_id, &ToolQuery::toolkit(TOOLKIT).limit(100))
        .await?;

    let Some(list_tool) = find_list_tool(broker, user_id, &tools).await else {
        return Ok(SentEmails::empty(NO_LIST_TOOL));
    };

    let Ok(listing) = list_messages(broker, user_id, &list_tool).await else {
        return Ok(SentEmails::empty(LIST_FAILED));
    };

    let listed = envelope::extract_array(&listing, envelope::GMAIL_MESSAGES);
    if listed.is_empty() {
        return Ok(SentEmails::empty(NO_MESSAGES));
    }

    let Some(get_tool) = find_get_tool(broker, user_id, &tools).await else {
        log::warn!("[Gmail] Get message tool not found for {}", user_id);
        return Ok(SentEmails::default());
    };

    let fetches = listed
        .iter()
        .take(MAX_MESSAGES)
        .map(|m| fetch_message(broker, user_id, &get_tool, m));
    let emails = join_all(fetches).await.into_iter().flatten().collect();

    Ok(SentEmails { emails, message: None })
}

/// Parse a `Date` header. RFC 2822 with a trailing `(TZ)` comment is tolerated.
pub fn parse_email_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    let without_comment = match trimmed.rfind(" (") {
        Some(idx) if trimmed.ends_with(')') => &trimmed[..idx],
        _ => trimmed,
    };
    DateTime::parse_from_rfc2822(without_comment)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Human-readable age of a message relative to `now`
pub fn relative_timestamp<Z: TimeZone>(date: DateTime<Utc>, now: DateTime<Z>) -> String
where
    Z::Offset: std::fmt::Display,
{
    let diff_hours = now.with_timezone(&Utc).signed_duration_since(date).num_hours();
    let diff_days = diff_hours.div_euclid(24);

    if diff_hours < 1 {
        "Just now".to_string()
    } else if diff_hours < 24 {
        format!("{}h ago", diff_hours)
    } else if diff_days == 1 {
        "1d ago".to_string()
    } else if diff_days < 7 {
        format!("{}d ago", diff_days)
    } else {
        date.with_timezone(&now.timezone()).format("%-m/%-d/%Y").to_string()
    }
}
