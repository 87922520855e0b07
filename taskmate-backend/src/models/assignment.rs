use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::task::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

/// Per-user annotations on a Canvas assignment
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentMetadata {
    pub user_id: i64,
    pub assignment_id: String,
    pub priority: Option<String>,
    pub estimated_hours: Option<f64>,
    pub status: Option<String>,
    pub updated_at: String,
}

/// Raw body of `PUT /api/canvas/assignments/{id}/metadata`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentMetadataUpdate {
    pub priority: Option<String>,
    pub estimated_hours: Option<serde_json::Value>,
    pub status: Option<String>,
}

/// Validated metadata update; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedMetadata {
    pub priority: Option<Priority>,
    pub estimated_hours: Option<f64>,
    pub status: Option<AssignmentStatus>,
}

impl AssignmentMetadataUpdate {
    pub fn validate(self) -> Result<ValidatedMetadata, String> {
        let priority = match self.priority.as_deref().map(str::trim) {
            Some(p) => Some(
                p.parse::<Priority>()
                    .map_err(|_| "priority must be low, medium, or high".to_string())?,
            ),
            None => None,
        };
        let status = match self.status.as_deref().map(str::trim) {
            Some(s) => Some(s.parse::<AssignmentStatus>().map_err(|_| {
                "status must be not_started, in_progress, or done".to_string()
            })?),
            None => None,
        };
        let estimated_hours = match self.estimated_hours {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => Some(
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| "estimatedHours must be a positive number".to_string())?,
            ),
            Some(_) => return Err("estimatedHours must be a positive number".to_string()),
        };
        if let Some(h) = estimated_hours {
            if !h.is_finite() || h < 0.0 {
                return Err("estimatedHours must be a positive number".to_string());
            }
        }
        Ok(ValidatedMetadata {
            priority,
            estimated_hours,
            status,
        })
    }
}

/// A Canvas assignment as returned to the frontend
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub name: String,
    pub course_name: String,
    pub course_id: Option<String>,
    pub due_date: String,
    pub points: Option<f64>,
    /// Submission timestamp, if any
    pub submitted: Option<String>,
    pub url: Option<String>,
    pub category: &'static str,
    pub priority: String,
    pub estimated_hours: Option<f64>,
    pub status: String,
}

impl Assignment {
    pub fn is_open(&self) -> bool {
        self.status != AssignmentStatus::Done.as_ref()
    }
}
