use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;

use super::require_user;
use crate::error::{AppError, AppResult};
use crate::integrations::calendar::fetch_week_events;
use crate::models::ConnectedService;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/calendar/events").route(web::get().to(week_events)));
}

/// This week's Google Calendar events, categorized for the dashboard
async fn week_events(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let now = Utc::now().with_timezone(&state.config.calendar_timezone);

    let week = fetch_week_events(state.broker.as_ref(), &user.external_user_id(), now)
        .await
        .map_err(|e| {
            log::error!("[Calendar] Error fetching events for user {}: {}", user.user_id, e);
            AppError::Internal(e)
        })?;

    if week.message.is_none() {
        if let Err(e) = state
            .db
            .touch_integration(user.user_id, ConnectedService::GoogleCalendar.service_name())
        {
            log::warn!("[Calendar] Could not record sync time: {}", e);
        }
    }

    let mut body = json!({
        "ok": true,
        "events": week.events,
        "weekStart": week.window.start_iso(),
        "weekEnd": week.window.end_iso(),
    });
    if let Some(message) = week.message {
        body["message"] = json!(message);
    }
    Ok(HttpResponse::Ok().json(body))
}
