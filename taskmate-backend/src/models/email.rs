use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EmailPriority {
    Important,
    #[default]
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum EmailCategory {
    Academic,
    Career,
    Personal,
    #[default]
    Other,
}

/// What the analyzer says about one email
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailAnalysis {
    pub summary: String,
    pub priority: EmailPriority,
    pub category: EmailCategory,
}

/// Stored analysis row
#[derive(Debug, Clone, Serialize)]
pub struct EmailSummary {
    pub email_id: i64,
    pub user_id: i64,
    pub original_email_id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub summary_text: String,
    pub priority: String,
    pub category: String,
    pub received_at: Option<String>,
}

/// An email as the dashboard shows it
#[derive(Debug, Clone, Serialize)]
pub struct EmailView {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub summary: String,
    pub timestamp: String,
    pub priority: String,
    pub category: String,
}
