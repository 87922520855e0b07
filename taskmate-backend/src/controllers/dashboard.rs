//! Weekly dashboard: calendar events, dated tasks and Canvas assignments in one timeline.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use futures_util::future::join;
use serde::Serialize;
use serde_json::json;

use super::require_user;
use crate::error::AppResult;
use crate::integrations::calendar::{categorize_event, fetch_week_events, localize, WeekWindow};
use crate::integrations::canvas::{fetch_upcoming_assignments, merge_metadata, parse_due};
use crate::models::{
    Assignment, CalendarEvent, CalendarItem, EventCategory, ItemSource, Priority, Task, User,
};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/dashboard/week").route(web::get().to(week_overview)));
}

/// Something still to be done this week
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusItem {
    pub id: String,
    pub title: String,
    pub source: ItemSource,
    pub priority: Priority,
    pub due: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekOverview {
    pub week_start: String,
    pub week_end: String,
    pub items: Vec<CalendarItem>,
    pub focus: Vec<FocusItem>,
    pub warnings: Vec<String>,
}

fn utc_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn event_item(event: CalendarEvent, tz: Tz) -> Option<(DateTime<Utc>, CalendarItem)> {
    let start_raw = event.start?;
    let start = parse_due(&start_raw, tz)?;
    Some((
        start,
        CalendarItem {
            id: format!("event-{}", event.id),
            title: event.title,
            start: start_raw,
            end: event.end,
            all_day: event.all_day,
            color: event.category.color(),
            category: event.category,
            source: ItemSource::Calendar,
        },
    ))
}

/// Tasks carry their own category text; anything unrecognized is guessed from the title.
fn task_category(task: &Task) -> EventCategory {
    task.category
        .as_deref()
        .and_then(|c| c.trim().parse().ok())
        .unwrap_or_else(|| categorize_event(&task.title))
}

fn task_item(task: &Task, tz: Tz) -> Option<(DateTime<Utc>, CalendarItem)> {
    let due = localize(tz, task.due_at()?).with_timezone(&Utc);
    let category = task_category(task);
    Some((
        due,
        CalendarItem {
            id: format!("task-{}", task.task_id),
            title: task.title.clone(),
            start: utc_millis(due),
            end: None,
            all_day: task.due_time.is_none(),
            category,
            color: category.color(),
            source: ItemSource::Task,
        },
    ))
}

fn assignment_item(assignment: &Assignment, tz: Tz) -> Option<(DateTime<Utc>, CalendarItem)> {
    let due = parse_due(&assignment.due_date, tz)?;
    Some((
        due,
        CalendarItem {
            id: format!("assignment-{}", assignment.id),
            title: assignment.name.clone(),
            start: utc_millis(due),
            end: None,
            all_day: false,
            category: EventCategory::School,
            color: EventCategory::School.color(),
            source: ItemSource::Assignment,
        },
    ))
}

/// Open work ordered by priority, high first, then by due time
fn focus_list(tasks: &[Task], assignments: &[Assignment], tz: Tz) -> Vec<FocusItem> {
    let mut focus: Vec<(DateTime<Utc>, FocusItem)> = Vec::new();

    for task in tasks.iter().filter(|t| t.is_open()) {
        if let Some(due) = task.due_at().map(|d| localize(tz, d).with_timezone(&Utc)) {
            focus.push((
                due,
                FocusItem {
                    id: format!("task-{}", task.task_id),
                    title: task.title.clone(),
                    source: ItemSource::Task,
                    priority: task.priority(),
                    due: utc_millis(due),
                    status: task.status.clone(),
                },
            ));
        }
    }

    for assignment in assignments.iter().filter(|a| a.is_open()) {
        if let Some(due) = parse_due(&assignment.due_date, tz) {
            focus.push((
                due,
                FocusItem {
                    id: format!("assignment-{}", assignment.id),
                    title: assignment.name.clone(),
                    source: ItemSource::Assignment,
                    priority: assignment.priority.parse().unwrap_or_default(),
                    due: utc_millis(due),
                    status: assignment.status.clone(),
                },
            ));
        }
    }

    focus.sort_by_key(|(due, item)| (item.priority.rank(), *due));
    focus.into_iter().map(|(_, item)| item).collect()
}

/// Build the overview for the week containing `now`. Each source fails independently.
pub async fn assemble_week(state: &AppState, user: &User, now: DateTime<Tz>) -> AppResult<WeekOverview> {
    let tz = now.timezone();
    let window = WeekWindow::containing(now);
    let external_id = user.external_user_id();
    let broker = state.broker.as_ref();
    let mut warnings = Vec::new();

    let (calendar, canvas) = join(
        fetch_week_events(broker, &external_id, now),
        fetch_upcoming_assignments(broker, &external_id, window.start, state.config.canvas.base_url.as_deref()),
    )
    .await;

    let events = match calendar {
        Ok(week) => {
            if let Some(message) = week.message {
                warnings.push(format!("calendar: {}", message));
            }
            week.events
        }
        Err(e) => {
            log::warn!("[Calendar] Dashboard fetch failed for user {}: {}", user.user_id, e);
            warnings.push(format!("calendar: {}", e));
            Vec::new()
        }
    };

    let assignments = match canvas {
        Ok(upcoming) => {
            if let Some(message) = upcoming.message {
                warnings.push(format!("canvas: {}", message));
            }
            let mut assignments: Vec<Assignment> = upcoming
                .assignments
                .into_iter()
                .filter(|a| parse_due(&a.due_date, tz).is_some_and(|due| due <= window.end))
                .collect();
            merge_metadata(&mut assignments, &state.db.assignment_metadata_map(user.user_id)?);
            assignments
        }
        Err(e) => {
            log::warn!("[Canvas] Dashboard fetch failed for user {}: {}", user.user_id, e);
            warnings.push(format!("canvas: {}", e));
            Vec::new()
        }
    };

    let (from, to) = window.local_bounds();
    let tasks = state.db.list_tasks_due_between(user.user_id, &from, &to)?;

    let mut items: Vec<(DateTime<Utc>, CalendarItem)> = events
        .into_iter()
        .filter_map(|e| event_item(e, tz))
        .chain(tasks.iter().filter_map(|t| task_item(t, tz)))
        .chain(assignments.iter().filter_map(|a| assignment_item(a, tz)))
        .collect();
    items.sort_by_key(|(start, _)| *start);

    Ok(WeekOverview {
        week_start: window.start_iso(),
        week_end: window.end_iso(),
        items: items.into_iter().map(|(_, item)| item).collect(),
        focus: focus_list(&tasks, &assignments, tz),
        warnings,
    })
}

async fn week_overview(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let now = Utc::now().with_timezone(&state.config.calendar_timezone);
    let overview = assemble_week(&state, &user, now).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "overview": overview })))
}
