//! Claude-backed email analyzer

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{fallback_analysis, truncate_chars, EmailAnalyzer};
use crate::config::AnthropicConfig;
use crate::models::{EmailAnalysis, EmailCategory, EmailPriority};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 500;
const PROMPT_BODY_CHARS: usize = 1000;

static JSON_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct ClaudeAnalyzer {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl ClaudeAnalyzer {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: crate::http::shared_client().clone(),
            config,
        }
    }

    fn prompt(subject: &str, to: &str, body: &str) -> String {
        format!(
            "Analyze this email and provide:\n\
             1. A brief summary (2-3 sentences max)\n\
             2. Priority level: \"important\" or \"normal\"\n\
             3. Category: \"Academic\", \"Career\", \"Personal\", or \"Other\"\n\n\
             Email details:\n\
             Subject: {}\n\
             To: {}\n\
             Body: {}\n\n\
             Respond in JSON format:\n\
             {{\n  \"summary\": \"brief summary here\",\n  \"priority\": \"important\" or \"normal\",\n  \"category\": \"Academic\" or \"Career\" or \"Personal\" or \"Other\"\n}}",
            subject,
            to,
            truncate_chars(body, PROMPT_BODY_CHARS)
        )
    }

    async fn request(&self, api_key: &str, prompt: String) -> Result<String, String> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Claude request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Claude returned {}: {}", status, text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid Claude response: {}", e))?;

        parsed
            .content
            .into_iter()
            .next()
            .filter(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| "Claude response had no text content".to_string())
    }
}

/// Parse the first `{...}` block of a model reply, normalizing priority and category
pub fn parse_analysis(reply: &str, body: &str) -> Option<EmailAnalysis> {
    let block = JSON_BLOCK.find(reply)?;
    let value: Value = serde_json::from_str(block.as_str()).ok()?;

    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
        .unwrap_or_else(|| fallback_analysis(body).summary);
    let priority = value
        .get("priority")
        .and_then(Value::as_str)
        .and_then(|p| p.trim().parse::<EmailPriority>().ok())
        .unwrap_or_default();
    let category = value
        .get("category")
        .and_then(Value::as_str)
        .and_then(|c| c.trim().parse::<EmailCategory>().ok())
        .unwrap_or_default();

    Some(EmailAnalysis {
        summary,
        priority,
        category,
    })
}

#[async_trait]
impl EmailAnalyzer for ClaudeAnalyzer {
    async fn analyze(&self, subject: &str, to: &str, body: &str) -> EmailAnalysis {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return fallback_analysis(body);
        };

        match self.request(api_key, Self::prompt(subject, to, body)).await {
            Ok(reply) => parse_analysis(&reply, body).unwrap_or_else(|| {
                log::warn!("[Gmail] Could not parse analysis for \"{}\"", subject);
                fallback_analysis(body)
            }),
            Err(e) => {
                log::error!("[Gmail] Error analyzing email with Claude: {}", e);
                fallback_analysis(body)
            }
        }
    }
}
