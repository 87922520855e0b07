use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Stored format of `tasks.due_date`
pub const DUE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DEFAULT_DUE_TIME: &str = "23:59:59";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort key for focus lists, high first
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

/// Task lifecycle. `not_started` and `done` are accepted on input so the
/// assignment vocabulary works for tasks too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum TaskStatus {
    #[default]
    #[strum(serialize = "pending", serialize = "not_started")]
    Pending,
    #[strum(serialize = "in_progress")]
    InProgress,
    #[strum(serialize = "completed", serialize = "done")]
    Completed,
}

impl TaskStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub task_id: i64,
    pub user_id: i64,
    pub category_id: Option<i64>,
    pub category: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub has_no_due_date: bool,
    pub status: String,
    pub priority: String,
    pub source: Option<String>,
    pub source_id: Option<String>,
    pub synced_to_google: bool,
    pub google_event_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    pub fn due_at(&self) -> Option<NaiveDateTime> {
        self.due_date
            .as_deref()
            .and_then(|d| NaiveDateTime::parse_from_str(d, DUE_FORMAT).ok())
    }

    pub fn priority(&self) -> Priority {
        self.priority.parse().unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.status.parse(), Ok(TaskStatus::Completed))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub priority: Option<String>,
    pub has_no_due_date: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub has_no_due_date: Option<bool>,
}

/// A validated task ready for insertion
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub category_id: Option<i64>,
    pub priority: Priority,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub has_no_due_date: bool,
}

impl NewTask {
    pub fn due_at(&self) -> Option<NaiveDateTime> {
        self.due_date
            .as_deref()
            .and_then(|d| NaiveDateTime::parse_from_str(d, DUE_FORMAT).ok())
    }
}

/// Validated partial update. `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub has_no_due_date: Option<bool>,
    pub due_date: Option<Option<String>>,
    pub due_time: Option<Option<String>>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    raw.parse()
        .map_err(|_| "Priority must be one of low, medium, high".to_string())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    // Accept a full ISO timestamp and keep only the date part
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| format!("Invalid due date '{}', expected YYYY-MM-DD", raw))
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| format!("Invalid due time '{}', expected HH:MM", raw))
}

/// Combine a date and optional time into the stored due string.
/// A missing time means the end of the day.
pub fn combine_due(date: &str, time: Option<&str>) -> Result<(String, Option<String>), String> {
    let date = parse_date(date)?;
    let time_str = match time {
        Some(t) => Some(parse_time(t)?.format("%H:%M:%S").to_string()),
        None => None,
    };
    let time = parse_time(time_str.as_deref().unwrap_or(DEFAULT_DUE_TIME))?;
    Ok((date.and_time(time).format(DUE_FORMAT).to_string(), time_str))
}

impl CreateTaskRequest {
    pub fn validate(self) -> Result<NewTask, String> {
        let title = non_blank(self.title);
        let category = non_blank(self.category);
        let priority = non_blank(self.priority);
        let (Some(title), Some(category), Some(priority)) = (title, category, priority) else {
            return Err("Title, category, and priority are required".to_string());
        };
        let priority = parse_priority(&priority)?;

        let has_no_due_date = self.has_no_due_date.unwrap_or(false);
        let due_time = non_blank(self.due_time);
        let (due_date, due_time) = match non_blank(self.due_date) {
            Some(date) if !has_no_due_date => {
                let (due, time) = combine_due(&date, due_time.as_deref())?;
                (Some(due), time)
            }
            _ => (None, None),
        };

        Ok(NewTask {
            title,
            description: self.description,
            category,
            category_id: self.category_id,
            priority,
            due_date,
            due_time,
            has_no_due_date,
        })
    }
}

impl UpdateTaskRequest {
    /// Validate against the stored row. A lone `dueTime` moves the existing due date to that time.
    pub fn into_changes(self, existing: &Task) -> Result<TaskChanges, String> {
        let mut changes = TaskChanges {
            title: match self.title {
                Some(t) => Some(non_blank(Some(t)).ok_or("Title cannot be empty")?),
                None => None,
            },
            description: self.description,
            category: match self.category {
                Some(c) => Some(non_blank(Some(c)).ok_or("Category cannot be empty")?),
                None => None,
            },
            category_id: self.category_id,
            priority: self.priority.as_deref().map(parse_priority).transpose()?,
            status: self
                .status
                .as_deref()
                .map(|s| {
                    s.trim().parse::<TaskStatus>().map_err(|_| {
                        "Status must be one of pending, in_progress, completed".to_string()
                    })
                })
                .transpose()?,
            has_no_due_date: self.has_no_due_date,
            ..Default::default()
        };

        if self.has_no_due_date == Some(true) {
            changes.due_date = Some(None);
            changes.due_time = Some(None);
            return Ok(changes);
        }

        let due_time = non_blank(self.due_time);
        match non_blank(self.due_date) {
            Some(date) => {
                let (due, time) = combine_due(&date, due_time.as_deref())?;
                changes.due_date = Some(Some(due));
                changes.due_time = Some(time);
            }
            None => {
                if let Some(time) = due_time {
                    let normalized = parse_time(&time)?.format("%H:%M:%S").to_string();
                    if let Some(current) = existing.due_at() {
                        let (due, _) = combine_due(
                            &current.date().format("%Y-%m-%d").to_string(),
                            Some(&normalized),
                        )?;
                        changes.due_date = Some(Some(due));
                    }
                    changes.due_time = Some(Some(normalized));
                }
            }
        }

        Ok(changes)
    }
}
