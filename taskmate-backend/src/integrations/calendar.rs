//! Google Calendar through Composio: weekly event listing, categorization and task sync.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::composio::envelope::{self, first_id, first_str};
use crate::composio::tool_select::{
    select_tool, select_tool_in_order, CALENDAR_LIST_EXACT, CALENDAR_LIST_KEYWORDS,
};
use crate::composio::{ToolBroker, ToolQuery};
use crate::models::{CalendarEvent, EventCategory};

pub const TOOLKIT: &str = "GOOGLECALENDAR";
pub const CREATE_EVENT_TOOL: &str = "GOOGLECALENDAR_CREATE_EVENT";
pub const DELETE_EVENT_TOOL: &str = "GOOGLECALENDAR_DELETE_EVENT";

static SCHOOL_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(class|lecture|exam|quiz|homework|assignment|study|school|university|college|cs\s|math|physics|chemistry|biology|lab|seminar|tutorial|project|presentation|essay)\b",
    )
    .expect("valid school regex")
});

static WORK_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(work|meeting|shift|standup|scrum|sprint|client|deadline|conference|interview|office|team|project meeting|1:1|one-on-one|sync)\b",
    )
    .expect("valid work regex")
});

/// School keywords win over work keywords; everything else is personal.
pub fn categorize_event(title: &str) -> EventCategory {
    if SCHOOL_KEYWORDS.is_match(title) {
        EventCategory::School
    } else if WORK_KEYWORDS.is_match(title) {
        EventCategory::Work
    } else {
        EventCategory::Personal
    }
}

/// Resolve a wall-clock time in `tz`, picking the earlier instant on DST
/// overlaps and reading gap times as UTC-offset times.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(early, _) => early,
        LocalResult::None => tz.from_utc_datetime(&naive),
    }
}

pub fn start_of_day(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    localize(tz, date.and_time(NaiveTime::MIN))
}

/// Monday 00:00:00.000 through Sunday 23:59:59.999 of the week containing `now`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeekWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl WeekWindow {
    pub fn containing(now: DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let sunday = monday + Duration::days(6);
        let end_time = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Self {
            start: start_of_day(tz, monday),
            end: localize(tz, sunday.and_time(end_time)),
        }
    }

    pub fn start_iso(&self) -> String {
        self.start.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn end_iso(&self) -> String {
        self.end.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Bounds in the stored task due format, local to the window's zone
    pub fn local_bounds(&self) -> (String, String) {
        (
            self.start.format(crate::models::task::DUE_FORMAT).to_string(),
            self.end.format(crate::models::task::DUE_FORMAT).to_string(),
        )
    }
}

/// Outcome of a weekly fetch. `message` is set when no list tool exists.
#[derive(Debug, Clone)]
pub struct WeekEvents {
    pub events: Vec<CalendarEvent>,
    pub window: WeekWindow,
    pub message: Option<String>,
}

pub fn map_event(event: &Value) -> CalendarEvent {
    let title = first_str(event, &["summary"]).unwrap_or_else(|| "No Title".to_string());
    let all_day = first_str(event, &["start.dateTime"]).is_none();
    CalendarEvent {
        id: first_id(event, &["id"]).unwrap_or_default(),
        category: categorize_event(&title),
        title,
        start: first_str(event, &["start.dateTime", "start.date"]),
        end: first_str(event, &["end.dateTime", "end.date"]),
        all_day,
    }
}

/// Find the events-list tool: exact names in the toolkit listing, then a
/// search, then a keyword match on the first listing.
pub async fn find_list_tool(broker: &dyn ToolBroker, user_id: &str) -> Result<Option<String>, String> {
    let tools = broker
        .list_tools(user_id, &ToolQuery::toolkit(TOOLKIT).limit(100))
        .await?;
    log::debug!("[Calendar] Found {} Google Calendar tools", tools.len());

    if let Some(tool) = select_tool(&tools, CALENDAR_LIST_EXACT, &[]) {
        return Ok(Some(tool.name.clone()));
    }

    let searched = broker
        .list_tools(user_id, &ToolQuery::toolkit(TOOLKIT).search("list events").limit(50))
        .await
        .unwrap_or_else(|e| {
            log::warn!("[Calendar] Tool search failed: {}", e);
            Vec::new()
        });
    if let Some(tool) = select_tool_in_order(&searched, CALENDAR_LIST_EXACT, CALENDAR_LIST_KEYWORDS) {
        return Ok(Some(tool.name.clone()));
    }

    Ok(select_tool(&tools, &[], CALENDAR_LIST_KEYWORDS).map(|t| t.name.clone()))
}

/// Events of the week containing `now`
pub async fn fetch_week_events(
    broker: &dyn ToolBroker,
    user_id: &str,
    now: DateTime<Tz>,
) -> Result<WeekEvents, String> {
    let window = WeekWindow::containing(now);

    let Some(tool) = find_list_tool(broker, user_id).await? else {
        log::warn!("[Calendar] List events tool not found for {}", user_id);
        return Ok(WeekEvents {
            events: Vec::new(),
            window,
            message: Some("Calendar tool not found".to_string()),
        });
    };

    let time_min = window.start.to_rfc3339_opts(SecondsFormat::Millis, false);
    let time_max = window.end.to_rfc3339_opts(SecondsFormat::Millis, false);
    log::info!("[Calendar] Using {} from {} to {}", tool, time_min, time_max);

    let result = broker
        .execute(
            user_id,
            &tool,
            json!({
                "calendarId": "primary",
                "timeMin": time_min,
                "timeMax": time_max,
                "maxResults": 250,
                "singleEvents": true,
                "orderBy": "startTime",
            }),
        )
        .await
        .map_err(|e| {
            log::error!("[Calendar] {} failed: {}", tool, e);
            e
        })?;

    log::debug!(
        "[Calendar] Raw result: {}",
        result.to_string().chars().take(500).collect::<String>()
    );

    let events = envelope::extract_array(&result, envelope::CALENDAR_ITEMS)
        .iter()
        .map(map_event)
        .collect();

    Ok(WeekEvents {
        events,
        window,
        message: None,
    })
}

/// Create a zero-length event at a task's due time. Returns the new event id when Google reports one.
pub async fn create_task_event(
    broker: &dyn ToolBroker,
    user_id: &str,
    title: &str,
    description: Option<&str>,
    due: NaiveDateTime,
    tz: Tz,
) -> Result<Option<String>, String> {
    let date_time = due.format("%Y-%m-%dT%H:%M:%S").to_string();
    let result = broker
        .execute(
            user_id,
            CREATE_EVENT_TOOL,
            json!({
                "calendarId": "primary",
                "summary": title,
                "description": description.unwrap_or(""),
                "start": { "dateTime": date_time, "timeZone": tz.name() },
                "end": { "dateTime": date_time, "timeZone": tz.name() },
            }),
        )
        .await?;

    if let Some(err) = envelope::envelope_error(&result) {
        return Err(err);
    }
    Ok(result.get("data").and_then(|d| first_id(d, &["id"])))
}

pub async fn delete_task_event(broker: &dyn ToolBroker, user_id: &str, event_id: &str) -> Result<(), String> {
    let result = broker
        .execute(
            user_id,
            DELETE_EVENT_TOOL,
            json!({ "calendarId": "primary", "eventId": event_id }),
        )
        .await?;
    match envelope::envelope_error(&result) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
