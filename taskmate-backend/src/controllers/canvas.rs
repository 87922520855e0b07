use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;

use super::require_user;
use crate::error::{AppError, AppResult};
use crate::integrations::calendar::start_of_day;
use crate::integrations::canvas::{fetch_upcoming_assignments, merge_metadata};
use crate::models::{AssignmentMetadataUpdate, ConnectedService};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/canvas")
            .route("/assignments", web::get().to(list_assignments))
            .route(
                "/assignments/{assignment_id}/metadata",
                web::put().to(update_assignment_metadata),
            ),
    );
}

async fn list_assignments(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let tz = state.config.calendar_timezone;
    let today = start_of_day(tz, Utc::now().with_timezone(&tz).date_naive());

    let upcoming = fetch_upcoming_assignments(
        state.broker.as_ref(),
        &user.external_user_id(),
        today,
        state.config.canvas.base_url.as_deref(),
    )
    .await
    .map_err(|e| {
        log::error!("[Canvas] Error fetching assignments for user {}: {}", user.user_id, e);
        AppError::Internal(e)
    })?;

    if let Some(message) = upcoming.message {
        return Ok(HttpResponse::Ok().json(json!({
            "ok": true,
            "assignments": [],
            "message": message,
        })));
    }

    let mut assignments = upcoming.assignments;
    let metadata = state.db.assignment_metadata_map(user.user_id)?;
    merge_metadata(&mut assignments, &metadata);

    if let Err(e) = state
        .db
        .touch_integration(user.user_id, ConnectedService::Canvas.service_name())
    {
        log::warn!("[Canvas] Could not record sync time: {}", e);
    }

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "assignments": assignments })))
}

async fn update_assignment_metadata(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<AssignmentMetadataUpdate>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let assignment_id = path.into_inner();
    if assignment_id.trim().is_empty() {
        return Err(AppError::BadRequest("assignmentId is required".to_string()));
    }

    let update = body.into_inner().validate().map_err(AppError::BadRequest)?;
    state
        .db
        .upsert_assignment_metadata(user.user_id, &assignment_id, &update)?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Assignment metadata updated" })))
}
