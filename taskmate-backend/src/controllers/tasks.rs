use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use super::require_user;
use crate::error::{AppError, AppResult};
use crate::integrations::calendar::{create_task_event, delete_task_event};
use crate::models::{CreateTaskRequest, Task, UpdateTaskRequest, User};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/tasks")
            .route("", web::post().to(create_task))
            .route("", web::get().to(list_tasks))
            .route("/{task_id}", web::get().to(get_task))
            .route("/{task_id}", web::put().to(update_task))
            .route("/{task_id}", web::delete().to(delete_task)),
    );
}

fn not_found() -> AppError {
    AppError::NotFound("Task not found".to_string())
}

fn check_category(state: &AppState, user: &User, category_id: Option<i64>) -> AppResult<()> {
    match category_id {
        Some(id) if !state.db.owns_category(user.user_id, id)? => {
            Err(AppError::BadRequest("Category not found".to_string()))
        }
        _ => Ok(()),
    }
}

/// Mirror a dated task into Google Calendar. Failures are logged only.
async fn sync_to_calendar(state: &AppState, user: &User, task: Task) -> Task {
    let Some(due) = task.due_at() else {
        return task;
    };

    let created = create_task_event(
        state.broker.as_ref(),
        &user.external_user_id(),
        &task.title,
        task.description.as_deref(),
        due,
        state.config.calendar_timezone,
    )
    .await;

    match created {
        Ok(Some(event_id)) => match state.db.mark_task_synced(task.task_id, &event_id) {
            Ok(()) => {
                log::info!("[Tasks] Task {} synced to Google Calendar as {}", task.task_id, event_id);
                Task {
                    synced_to_google: true,
                    google_event_id: Some(event_id),
                    ..task
                }
            }
            Err(e) => {
                log::warn!("[Tasks] Could not record calendar event for task {}: {}", task.task_id, e);
                task
            }
        },
        Ok(None) => {
            log::warn!("[Tasks] Calendar did not return an event id for task {}", task.task_id);
            task
        }
        Err(e) => {
            log::warn!("[Tasks] Calendar sync failed for task {}: {}", task.task_id, e);
            task
        }
    }
}

async fn create_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateTaskRequest>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let new_task = body.into_inner().validate().map_err(AppError::BadRequest)?;
    check_category(&state, &user, new_task.category_id)?;

    let task = state.db.create_task(user.user_id, &new_task)?;
    log::info!("[Tasks] User {} created task {}", user.user_id, task.task_id);
    let task = sync_to_calendar(&state, &user, task).await;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "task": task })))
}

async fn list_tasks(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let tasks = state.db.list_tasks(user.user_id)?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "tasks": tasks })))
}

async fn get_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let task = state
        .db
        .get_task(user.user_id, path.into_inner())?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "task": task })))
}

async fn update_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateTaskRequest>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let task_id = path.into_inner();

    let existing = state.db.get_task(user.user_id, task_id)?.ok_or_else(not_found)?;
    let changes = body
        .into_inner()
        .into_changes(&existing)
        .map_err(AppError::BadRequest)?;
    check_category(&state, &user, changes.category_id)?;

    let task = state
        .db
        .update_task(user.user_id, task_id, &changes)?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "task": task })))
}

async fn delete_task(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let task_id = path.into_inner();

    let task = state.db.get_task(user.user_id, task_id)?.ok_or_else(not_found)?;
    if let Some(event_id) = task.google_event_id.as_deref() {
        if let Err(e) = delete_task_event(state.broker.as_ref(), &user.external_user_id(), event_id).await {
            log::warn!("[Tasks] Could not delete calendar event {} for task {}: {}", event_id, task_id, e);
        }
    }

    if !state.db.delete_task(user.user_id, task_id)? {
        return Err(not_found());
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Task deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::calendar::{CREATE_EVENT_TOOL, DELETE_EVENT_TOOL};
    use crate::test_support::{bearer, FakeBroker, TestApp};
    use actix_web::{test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_create_syncs_dated_task() {
        let harness = TestApp::new(
            FakeBroker::new().with_result(CREATE_EVENT_TOOL, json!({"successful": true, "data": {"id": "evt_1"}})),
        );
        let (_, token) = harness.login("ada", 1);
        let app = test::init_service(App::new().app_data(harness.state.clone()).configure(config)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/tasks")
                .insert_header(bearer(&token))
                .set_json(json!({
                    "title": "Lab report",
                    "category": "school",
                    "priority": "high",
                    "dueDate": "2025-05-07",
                    "dueTime": "14:30"
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["task"]["due_date"], "2025-05-07 14:30:00");
        assert_eq!(body["task"]["source"], "manual");
        assert_eq!(body["task"]["synced_to_google"], true);
        assert_eq!(body["task"]["google_event_id"], "evt_1");

        let executed = harness.broker.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].1, CREATE_EVENT_TOOL);
        assert_eq!(executed[0].2["start"]["dateTime"], "2025-05-07T14:30:00");
        assert_eq!(executed[0].2["start"]["timeZone"], "America/New_York");
    }

    #[actix_web::test]
    async fn test_sync_failure_does_not_fail_create() {
        let harness = TestApp::new(FakeBroker::new().with_error(CREATE_EVENT_TOOL, "calendar not connected"));
        let (_, token) = harness.login("ada", 1);
        let app = test::init_service(App::new().app_data(harness.state.clone()).configure(config)).await;

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/tasks")
                .insert_header(bearer(&token))
                .set_json(json!({"title": "Essay", "category": "school", "priority": "low", "dueDate": "2025-05-07"}))
                .to_request(),
        )
        .await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["task"]["due_date"], "2025-05-07 23:59:59");
        assert_eq!(body["task"]["synced_to_google"], false);
    }

    #[actix_web::test]
    async fn test_undated_task_skips_sync() {
        let harness = TestApp::new(FakeBroker::new());
        let (_, token) = harness.login("ada", 1);
        let app = test::init_service(App::new().app_data(harness.state.clone()).configure(config)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/tasks")
                .insert_header(bearer(&token))
                .set_json(json!({"title": "Laundry", "category": "personal", "priority": "medium"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        assert!(harness.broker.executed().is_empty());
    }

    #[actix_web::test]
    async fn test_create_validation() {
        let harness = TestApp::new(FakeBroker::new());
        let (_, token) = harness.login("ada", 1);
        let app = test::init_service(App::new().app_data(harness.state.clone()).configure(config)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/tasks")
                .insert_header(bearer(&token))
                .set_json(json!({"title": "Essay"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Title, category, and priority are required");

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/tasks")
                .insert_header(bearer(&token))
                .set_json(json!({"title": "Essay", "category": "school", "priority": "urgent"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_tasks_require_login() {
        let harness = TestApp::new(FakeBroker::new());
        let app = test::init_service(App::new().app_data(harness.state.clone()).configure(config)).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/tasks").to_request()).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_update_and_ownership() {
        let harness = TestApp::new(FakeBroker::new());
        let (_, ada) = harness.login("ada", 1);
        let (_, bob) = harness.login("bob", 2);
        let app = test::init_service(App::new().app_data(harness.state.clone()).configure(config)).await;

        let created: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/tasks")
                .insert_header(bearer(&ada))
                .set_json(json!({"title": "Essay", "category": "school", "priority": "low"}))
                .to_request(),
        )
        .await;
        let id = created["task"]["task_id"].as_i64().unwrap();
        let uri = format!("/api/tasks/{}", id);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri(&uri).insert_header(bearer(&bob)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);

        let updated: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::put()
                .uri(&uri)
                .insert_header(bearer(&ada))
                .set_json(json!({"status": "done", "dueDate": "2025-06-01"}))
                .to_request(),
        )
        .await;
        assert_eq!(updated["task"]["status"], "completed");
        assert_eq!(updated["task"]["due_date"], "2025-06-01 23:59:59");

        let cleared: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::put()
                .uri(&uri)
                .insert_header(bearer(&ada))
                .set_json(json!({"hasNoDueDate": true}))
                .to_request(),
        )
        .await;
        assert_eq!(cleared["task"]["due_date"], Value::Null);
        assert_eq!(cleared["task"]["has_no_due_date"], true);

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri("/api/tasks/9999")
                .insert_header(bearer(&ada))
                .set_json(json!({"title": "x"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_delete_removes_calendar_event() {
        let harness = TestApp::new(
            FakeBroker::new()
                .with_result(CREATE_EVENT_TOOL, json!({"data": {"id": "evt_9"}}))
                .with_error(DELETE_EVENT_TOOL, "already gone"),
        );
        let (_, token) = harness.login("ada", 1);
        let app = test::init_service(App::new().app_data(harness.state.clone()).configure(config)).await;

        let created: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/tasks")
                .insert_header(bearer(&token))
                .set_json(json!({"title": "Quiz", "category": "school", "priority": "high", "dueDate": "2025-05-09"}))
                .to_request(),
        )
        .await;
        let uri = format!("/api/tasks/{}", created["task"]["task_id"]);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::delete().uri(&uri).insert_header(bearer(&token)).to_request(),
        )
        .await;
        assert_eq!(body, json!({"ok": true, "message": "Task deleted successfully"}));

        let executed = harness.broker.executed();
        assert_eq!(executed.last().unwrap().1, DELETE_EVENT_TOOL);
        assert_eq!(executed.last().unwrap().2["eventId"], "evt_9");

        let resp = test::call_service(
            &app,
            test::TestRequest::delete().uri(&uri).insert_header(bearer(&token)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_foreign_category_rejected() {
        let harness = TestApp::new(FakeBroker::new());
        let (ada, _) = harness.login("ada", 1);
        let (_, bob) = harness.login("bob", 2);
        let category = harness.state.db.create_category(ada.user_id, "Lab", None).unwrap();
        let app = test::init_service(App::new().app_data(harness.state.clone()).configure(config)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/tasks")
                .insert_header(bearer(&bob))
                .set_json(json!({"title": "x", "category": "Lab", "priority": "low", "categoryId": category.category_id}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);
    }
}
