use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Bucket used to color events on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EventCategory {
    School,
    Work,
    Personal,
}

impl EventCategory {
    pub fn color(&self) -> &'static str {
        match self {
            Self::School => "#8b5cf6",
            Self::Work => "#06b6d4",
            Self::Personal => "#f97316",
        }
    }
}

/// A Google Calendar event flattened for the frontend
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub all_day: bool,
    pub category: EventCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Calendar,
    Task,
    Assignment,
}

/// One entry of the merged weekly view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarItem {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub all_day: bool,
    pub category: EventCategory,
    pub color: &'static str,
    pub source: ItemSource,
}
