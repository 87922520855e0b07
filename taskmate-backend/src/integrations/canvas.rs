//! Canvas LMS assignments through Composio

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use futures_util::future::join_all;
use serde_json::{json, Value};

use super::calendar::{localize, start_of_day};
use crate::composio::envelope::{self, first_id, first_str};
use crate::composio::ToolBroker;
use crate::models::{Assignment, AssignmentMetadata, AssignmentStatus, Priority};

pub const LIST_COURSES_TOOL: &str = "CANVAS_LIST_COURSES";
pub const GET_ASSIGNMENTS_TOOL: &str = "CANVAS_GET_ALL_ASSIGNMENTS";
pub const COURSE_LIST_ERROR: &str =
    "Canvas returned an error while listing courses. Check your Canvas connection in Composio.";

#[derive(Debug, Clone, Default)]
pub struct UpcomingAssignments {
    pub assignments: Vec<Assignment>,
    /// Set when Canvas reported an error instead of a course list
    pub message: Option<String>,
}

/// Parse a Canvas due value: RFC 3339, a naive local timestamp, or a bare date
pub fn parse_due(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(localize(tz, naive).with_timezone(&Utc));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| start_of_day(tz, d).with_timezone(&Utc))
}

/// Canvas tools accept numeric course ids; keep non-numeric ids as strings
fn course_id_arg(course_id: &str) -> Value {
    course_id
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(course_id))
}

fn build_url(assignment: &Value, course_id: &str, assignment_id: &str, base_url: Option<&str>) -> Option<String> {
    first_str(assignment, &["html_url", "url"]).or_else(|| {
        base_url.map(|base| {
            format!(
                "{}/courses/{}/assignments/{}",
                base.trim_end_matches('/'),
                course_id,
                assignment_id
            )
        })
    })
}

/// Map one raw assignment, keeping it only if it is due at or after `cutoff`
fn map_assignment(
    raw: &Value,
    course: &Value,
    course_id: &str,
    cutoff: DateTime<Utc>,
    tz: Tz,
    base_url: Option<&str>,
) -> Option<(DateTime<Utc>, Assignment)> {
    let due_raw = first_str(raw, &["due_at", "due_date"])?;
    let due = parse_due(&due_raw, tz)?;
    if due < cutoff {
        return None;
    }
    let id = first_id(raw, &["id"])?;

    Some((
        due,
        Assignment {
            url: build_url(raw, course_id, &id, base_url),
            name: first_str(raw, &["name", "title"]).unwrap_or_else(|| "Untitled Assignment".to_string()),
            course_name: first_str(course, &["name", "course_name"])
                .unwrap_or_else(|| "Unknown Course".to_string()),
            course_id: Some(course_id.to_string()),
            due_date: due_raw,
            points: raw.get("points_possible").and_then(Value::as_f64),
            submitted: first_str(raw, &["submission.submitted_at"]),
            category: "school",
            priority: Priority::Medium.as_ref().to_string(),
            estimated_hours: None,
            status: AssignmentStatus::NotStarted.as_ref().to_string(),
            id,
        },
    ))
}

async fn fetch_course_assignments(
    broker: &dyn ToolBroker,
    user_id: &str,
    course: &Value,
    course_id: &str,
) -> Result<Vec<Value>, String> {
    let id_arg = course_id_arg(course_id);
    let result = broker
        .execute(
            user_id,
            GET_ASSIGNMENTS_TOOL,
            json!({ "courseId": id_arg, "course_id": id_arg, "per_page": 100 }),
        )
        .await?;
    let assignments = envelope::extract_array(&result, envelope::CANVAS_ASSIGNMENTS);
    log::info!(
        "[Canvas] Course {} ({}) assignments fetched: {}",
        course_id,
        first_str(course, &["name", "course_name"]).unwrap_or_else(|| "Unnamed".to_string()),
        assignments.len()
    );
    Ok(assignments)
}

/// Assignments across all active courses due from `today_start` on, sorted by due date
pub async fn fetch_upcoming_assignments(
    broker: &dyn ToolBroker,
    user_id: &str,
    today_start: DateTime<Tz>,
    base_url: Option<&str>,
) -> Result<UpcomingAssignments, String> {
    let tz = today_start.timezone();
    let cutoff = today_start.with_timezone(&Utc);

    let courses_result = broker
        .execute(
            user_id,
            LIST_COURSES_TOOL,
            json!({ "enrollment_state": "active", "per_page": 100 }),
        )
        .await?;

    log::debug!(
        "[Canvas] Raw {} result: {}",
        LIST_COURSES_TOOL,
        courses_result.to_string().chars().take(2000).collect::<String>()
    );

    if let Some(err) = envelope::envelope_error(&courses_result) {
        log::error!("[Canvas] Error from {}: {}", LIST_COURSES_TOOL, err);
        return Ok(UpcomingAssignments {
            assignments: Vec::new(),
            message: Some(COURSE_LIST_ERROR.to_string()),
        });
    }

    let courses = envelope::extract_array(&courses_result, envelope::CANVAS_COURSES);
    log::info!("[Canvas] Found {} courses for {}", courses.len(), user_id);

    let with_ids: Vec<(&Value, String)> = courses
        .iter()
        .filter_map(|c| first_id(c, &["id", "course_id"]).map(|id| (c, id)))
        .collect();

    let fetches = with_ids
        .iter()
        .map(|(course, id)| fetch_course_assignments(broker, user_id, course, id));
    let results = join_all(fetches).await;

    let mut upcoming: Vec<(DateTime<Utc>, Assignment)> = Vec::new();
    for ((course, course_id), result) in with_ids.iter().zip(results) {
        match result {
            Ok(raw_assignments) => upcoming.extend(
                raw_assignments
                    .iter()
                    .filter_map(|raw| map_assignment(raw, course, course_id, cutoff, tz, base_url)),
            ),
            Err(e) => log::error!("[Canvas] Error fetching assignments for course {}: {}", course_id, e),
        }
    }

    upcoming.sort_by_key(|(due, _)| *due);
    log::info!("[Canvas] Total upcoming assignments: {}", upcoming.len());

    Ok(UpcomingAssignments {
        assignments: upcoming.into_iter().map(|(_, a)| a).collect(),
        message: None,
    })
}

/// Overlay stored per-user metadata; missing fields keep the defaults
pub fn merge_metadata(assignments: &mut [Assignment], metadata: &HashMap<String, AssignmentMetadata>) {
    for assignment in assignments.iter_mut() {
        if let Some(meta) = metadata.get(&assignment.id) {
            if let Some(priority) = &meta.priority {
                assignment.priority = priority.clone();
            }
            assignment.estimated_hours = meta.estimated_hours;
            if let Some(status) = &meta.status {
                assignment.status = status.clone();
            }
        }
    }
}
