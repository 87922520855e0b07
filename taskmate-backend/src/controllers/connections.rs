//! Linking Gmail, Google Calendar, Google Meetings and Canvas accounts through Composio

use std::collections::HashSet;

use actix_web::{http::header, http::StatusCode, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::{html_escape, html_page, require_user};
use crate::composio::{ApiKeyFields, ConnectedAccount};
use crate::error::{AppError, AppResult};
use crate::models::user::parse_external_user_id;
use crate::models::ConnectedService;
use crate::AppState;

const CLOSE_HINT: &str = "<p style=\"margin-top: 20px; font-size: 14px;\">You can close this window.</p>";
const RETURN_HINT: &str = "<p>You can close this window and return to the app.</p>";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/canvas/start", web::post().to(start_canvas))
            .route("/{service}/start", web::get().to(start_link))
            .route("/{service}/start", web::post().to(start_link))
            .route("/{service}/callback", web::get().to(link_callback))
            .route("/status", web::get().to(status))
            .route("/unlink", web::post().to(unlink))
            .route("/gmail/unlink", web::post().to(unlink)),
    );
}

fn parse_service(raw: &str) -> AppResult<ConnectedService> {
    raw.parse::<ConnectedService>()
        .map_err(|_| AppError::NotFound(format!("Unknown service '{}'", raw)))
}

async fn start_link(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let service = parse_service(&path)?;
    if service == ConnectedService::Canvas {
        return Err(AppError::BadRequest(
            "Canvas connects with an API key; POST /api/auth/canvas/start".to_string(),
        ));
    }

    let auth_config_id = state.config.auth_config_id(service).ok_or_else(|| {
        AppError::Config(format!(
            "{} auth config ID not configured. Please set {} in your .env file.",
            service.display_name(),
            service.auth_config_env()
        ))
    })?;

    let external_user_id = user.external_user_id();
    let callback_url = format!(
        "{}?external_user_id={}",
        state.config.link_callback_url(service),
        urlencoding::encode(&external_user_id)
    );

    let link = state
        .broker
        .link_account(auth_config_id, &external_user_id, &callback_url)
        .await
        .map_err(AppError::Internal)?;

    let url = link
        .url()
        .ok_or_else(|| AppError::Internal("Missing linkUrl".to_string()))?;
    log::info!("[Composio] Started {} link for {}", service.display_name(), external_user_id);
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "url": url })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanvasStartRequest {
    api_key: Option<String>,
    base_url: Option<String>,
}

async fn start_canvas(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<CanvasStartRequest>>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let body = body.map(|b| b.into_inner()).unwrap_or_default();

    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let api_key = non_empty(body.api_key)
        .or_else(|| state.config.canvas.api_key.clone())
        .ok_or_else(|| AppError::BadRequest("Canvas API key is required".to_string()))?;
    let base_url = non_empty(body.base_url).or_else(|| state.config.canvas.base_url.clone());

    let external_user_id = user.external_user_id();
    let data = state
        .broker
        .initiate_api_key_connection(
            state.config.auth_config_id(ConnectedService::Canvas),
            &external_user_id,
            &ApiKeyFields { api_key, base_url },
        )
        .await
        .map_err(AppError::Internal)?;

    if let Some(account_id) = crate::composio::envelope::first_id(&data, &["id"]) {
        if let Err(e) = state.db.upsert_connection(
            user.user_id,
            &account_id,
            ConnectedService::Canvas.service_name(),
            &external_user_id,
        ) {
            log::error!("[Composio] Error storing Canvas connection: {}", e);
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "data": data })))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    error: Option<String>,
    status: Option<String>,
    connected_account_id: Option<String>,
    external_user_id: Option<String>,
}

/// Record the account for the user named by its external id, if that is one of ours
async fn store_linked_account(
    state: &AppState,
    service: ConnectedService,
    account_id: &str,
    query_external_id: Option<&str>,
) {
    let account_owner = match state.broker.get_account(account_id).await {
        Ok(account) => account.user_id,
        Err(e) => {
            log::error!("[Composio] Error fetching connected account {}: {}", account_id, e);
            None
        }
    };
    let external = query_external_id
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or(account_owner);

    let Some((user_id, external)) = external
        .as_deref()
        .and_then(|ext| parse_external_user_id(ext).map(|id| (id, ext)))
    else {
        log::warn!("[Composio] {} callback without a local user for {}", service.display_name(), account_id);
        return;
    };

    match state
        .db
        .upsert_connection(user_id, account_id, service.service_name(), external)
    {
        Ok(_) => log::info!("[Composio] Stored {} connection {} for user {}", service.display_name(), account_id, user_id),
        Err(e) => log::error!("[Composio] Error storing {} connection: {}", service.display_name(), e),
    }
}

async fn link_callback(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CallbackQuery>,
) -> AppResult<HttpResponse> {
    let service = parse_service(&path)?;
    if service == ConnectedService::Canvas {
        return Ok(canvas_callback(&state, &query).await);
    }

    if let Some(error) = query.error.as_deref() {
        return Ok(html_page(
            StatusCode::OK,
            "Connection Failed",
            &format!("<p>{}</p>\n{}", html_escape(error), CLOSE_HINT),
        ));
    }

    let account_id = query.connected_account_id.as_deref().filter(|s| !s.is_empty());

    if let (Some("success"), Some(account_id)) = (query.status.as_deref(), account_id) {
        store_linked_account(&state, service, account_id, query.external_user_id.as_deref()).await;
        return Ok(html_page(
            StatusCode::OK,
            &format!("{} Connected Successfully!", service.display_name()),
            RETURN_HINT,
        ));
    }

    if account_id.is_none() {
        return Ok(html_page(
            StatusCode::BAD_REQUEST,
            "Connection Error",
            "<p>Missing account ID. You can close this window.</p>",
        ));
    }

    Ok(html_page(StatusCode::OK, "Connection Successful!", RETURN_HINT))
}

async fn canvas_callback(state: &AppState, query: &CallbackQuery) -> HttpResponse {
    if let Some(error) = query.error.as_deref() {
        return HttpResponse::BadRequest().json(json!({
            "ok": false,
            "error": format!("Authentication failed: {}", error)
        }));
    }

    let login_url = format!("{}/login?auth=canvas_success", state.config.frontend_url);
    let account_id = query.connected_account_id.as_deref().filter(|s| !s.is_empty());

    match (query.status.as_deref(), account_id) {
        (Some("success"), Some(account_id)) => {
            store_linked_account(
                state,
                ConnectedService::Canvas,
                account_id,
                query.external_user_id.as_deref(),
            )
            .await;
            let location = format!("{}&account_id={}", login_url, urlencoding::encode(account_id));
            HttpResponse::Found()
                .insert_header((header::LOCATION, location))
                .finish()
        }
        (_, None) => HttpResponse::BadRequest().json(json!({ "ok": false, "error": "Missing account ID" })),
        _ => HttpResponse::Found()
            .insert_header((header::LOCATION, login_url))
            .finish(),
    }
}

fn group(accounts: &[ConnectedAccount], service: ConnectedService) -> Vec<ConnectedAccount> {
    accounts
        .iter()
        .filter(|a| {
            a.toolkit_slug
                .as_deref()
                .map(|slug| service.matches_toolkit(slug))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

async fn status(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    if state.config.composio.api_key.is_none() {
        return Err(AppError::Config(
            "Composio API key not configured. Please set COMPOSIO_API_KEY in your .env file.".to_string(),
        ));
    }

    let external_user_id = user.external_user_id();
    let stored = state.db.list_connections(user.user_id)?;
    let stored_ids: HashSet<&str> = stored.iter().map(|c| c.composio_account_id.as_str()).collect();

    let accounts = state
        .broker
        .list_accounts(&external_user_id)
        .await
        .map_err(AppError::Internal)?;

    let owned = |a: &ConnectedAccount| a.user_id.as_deref() == Some(external_user_id.as_str());
    let active: Vec<ConnectedAccount> = accounts
        .into_iter()
        .filter(|a| (stored_ids.contains(a.id.as_str()) || owned(a)) && a.is_active())
        .collect();

    for account in active.iter().filter(|a| !stored_ids.contains(a.id.as_str()) && owned(a)) {
        let service = account.toolkit_slug.as_deref().unwrap_or("unknown").to_lowercase();
        if let Err(e) = state
            .db
            .upsert_connection(user.user_id, &account.id, &service, &external_user_id)
        {
            log::error!("[Composio] Error auto-storing connection {}: {}", account.id, e);
        }
    }

    let gmail = group(&active, ConnectedService::Gmail);
    let calendar = group(&active, ConnectedService::GoogleCalendar);
    let meetings = group(&active, ConnectedService::GoogleMeetings);
    let mut canvas = group(&active, ConnectedService::Canvas);
    if canvas.is_empty() {
        if let Some(row) = state
            .db
            .get_connection_for_service(user.user_id, ConnectedService::Canvas.service_name())?
        {
            canvas.push(ConnectedAccount {
                id: row.composio_account_id.clone(),
                ..Default::default()
            });
        }
    }

    let last_synced = state.db.last_synced_by_service(user.user_id)?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "connectedAccounts": {
            "gmail": !gmail.is_empty(),
            "gmailConnections": gmail,
            "googlecalendar": !calendar.is_empty(),
            "googlecalendarConnections": calendar,
            "googlemeetings": !meetings.is_empty(),
            "googlemeetingsConnections": meetings,
            "canvas": !canvas.is_empty(),
            "canvasConnections": canvas,
            "totalConnections": active.len(),
        },
        "lastSynced": last_synced,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlinkRequest {
    connected_account_id: Option<String>,
}

async fn unlink(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<UnlinkRequest>>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let account_id = body
        .and_then(|b| b.into_inner().connected_account_id)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("connectedAccountId is required".to_string()))?;

    let stored_locally = state
        .db
        .list_connections(user.user_id)?
        .iter()
        .any(|c| c.composio_account_id == account_id);
    if !stored_locally {
        let external_user_id = user.external_user_id();
        let owned = match state.broker.get_account(&account_id).await {
            Ok(account) => account.user_id.as_deref() == Some(external_user_id.as_str()),
            Err(e) => {
                log::warn!("[Composio] Could not look up account {} for unlink: {}", account_id, e);
                false
            }
        };
        if !owned {
            log::warn!("[Composio] User {} tried to unlink account {} they do not own", user.user_id, account_id);
            return Err(AppError::NotFound("Connected account not found".to_string()));
        }
    }

    state
        .broker
        .delete_account(&account_id)
        .await
        .map_err(AppError::Internal)?;
    state.db.delete_connection(user.user_id, &account_id)?;
    log::info!("[Composio] Unlinked {} for user {}", account_id, user.user_id);

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "message": "Account unlinked successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composio::LinkResponse;
    use crate::test_support::{bearer, FakeBroker, TestApp};
    use actix_web::{test, App};
    use serde_json::Value;

    macro_rules! service {
        ($harness:expr) => {
            test::init_service(App::new().app_data($harness.state.clone()).configure(config)).await
        };
    }

    #[actix_web::test]
    async fn test_start_gmail_link() {
        let harness = TestApp::new(FakeBroker::new().with_link(Ok(LinkResponse {
            connected_account_id: Some("ca_1".into()),
            link_url: None,
            redirect_url: Some("https://connect.composio.dev/x".into()),
        })));
        let (user, token) = harness.login("ada", 1);
        let app = service!(harness);

        let resp: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/auth/gmail/start").insert_header(bearer(&token)).to_request(),
        )
        .await;
        assert_eq!(resp, json!({"ok": true, "url": "https://connect.composio.dev/x"}));

        let links = harness.broker.links();
        assert_eq!(links[0].0, "ac_gmail");
        assert_eq!(links[0].1, format!("user_{}", user.user_id));
        assert_eq!(
            links[0].2,
            format!("http://api.test/api/auth/gmail/callback?external_user_id=user_{}", user.user_id)
        );
    }

    #[actix_web::test]
    async fn test_start_requires_login_and_auth_config() {
        let harness = TestApp::new(FakeBroker::new());
        let (_, token) = harness.login("ada", 1);
        let app = service!(harness);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/auth/gmail/start").to_request()).await;
        assert_eq!(resp.status(), 401);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/auth/gmeetings/start").insert_header(bearer(&token)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 500);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("COMPOSIO_GOOGLEMEETINGS_AUTH_CONFIG_ID"));
    }

    #[actix_web::test]
    async fn test_missing_link_url_is_500() {
        let harness = TestApp::new(FakeBroker::new().with_link(Ok(LinkResponse::default())));
        let (_, token) = harness.login("ada", 1);
        let app = service!(harness);
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/auth/gcalendar/start").insert_header(bearer(&token)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 500);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing linkUrl");
    }

    #[actix_web::test]
    async fn test_start_canvas_stores_connection() {
        let harness = TestApp::new(
            FakeBroker::new().with_api_key_connection(Ok(json!({"id": "ca_canvas", "status": "ACTIVE"}))),
        );
        let (user, token) = harness.login("ada", 1);
        let app = service!(harness);

        let resp: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/auth/canvas/start")
                .insert_header(bearer(&token))
                .set_json(json!({"apiKey": "canvas-key"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp["ok"], true);
        assert_eq!(resp["data"]["id"], "ca_canvas");

        let calls = harness.broker.api_key_calls();
        assert_eq!(calls[0].2, "canvas-key");
        assert_eq!(calls[0].3.as_deref(), Some("https://canvas.test"));
        let stored = harness.state.db.get_connection_for_service(user.user_id, "canvas").unwrap();
        assert_eq!(stored.unwrap().composio_account_id, "ca_canvas");
    }

    #[actix_web::test]
    async fn test_start_canvas_without_key_is_400() {
        let harness = TestApp::new(FakeBroker::new());
        let (_, token) = harness.login("ada", 1);
        let app = service!(harness);
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/auth/canvas/start")
                .insert_header(bearer(&token))
                .set_json(json!({}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_callback_success_stores_mapping() {
        let harness = TestApp::new(FakeBroker::new().with_account("ca_9", "gmail", None, "ACTIVE"));
        let (user, _) = harness.login("ada", 1);
        let app = service!(harness);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!(
                    "/api/auth/gmail/callback?external_user_id=user_{}&status=success&connected_account_id=ca_9",
                    user.user_id
                ))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Gmail Connected Successfully!"));

        let stored = harness.state.db.get_connection_for_service(user.user_id, "gmail").unwrap();
        assert_eq!(stored.unwrap().composio_account_id, "ca_9");
    }

    #[actix_web::test]
    async fn test_callback_error_pages() {
        let harness = TestApp::new(FakeBroker::new());
        let app = service!(harness);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/auth/gcalendar/callback?error=%3Cscript%3Ebad%3C%2Fscript%3E")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Connection Failed"));
        assert!(body.contains("&lt;script&gt;bad&lt;/script&gt;"));
        assert!(!body.contains("<script>"));

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/auth/gmeetings/callback").to_request()).await;
        assert_eq!(resp.status(), 400);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/auth/gmail/callback?connected_account_id=ca_1").to_request(),
        )
        .await;
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Connection Successful!"));
    }

    #[actix_web::test]
    async fn test_canvas_callback_redirects() {
        let harness = TestApp::new(FakeBroker::new().with_account("ca_c", "canvas", Some("user_1"), "ACTIVE"));
        let (user, _) = harness.login("ada", 1);
        assert_eq!(user.user_id, 1);
        let app = service!(harness);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/auth/canvas/callback?status=success&connected_account_id=ca_c")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 302);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "http://app.test/login?auth=canvas_success&account_id=ca_c"
        );
        assert!(harness.state.db.get_connection_for_service(1, "canvas").unwrap().is_some());

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/auth/canvas/callback?error=denied").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Authentication failed: denied");
    }

    #[actix_web::test]
    async fn test_status_groups_and_auto_stores() {
        let harness = TestApp::new(
            FakeBroker::new()
                .with_account("ca_mail", "gmail", Some("user_1"), "ACTIVE")
                .with_account("ca_cal", "gcal", Some("user_1"), "ACTIVE")
                .with_account("ca_pending", "gmail", Some("user_1"), "INITIATED")
                .with_account("ca_other", "gmail", Some("user_2"), "ACTIVE"),
        );
        let (user, token) = harness.login("ada", 1);
        harness
            .state
            .db
            .upsert_connection(user.user_id, "ca_canvas_db", "canvas", "user_1")
            .unwrap();
        harness.state.db.touch_integration(user.user_id, "gmail").unwrap();
        let app = service!(harness);

        let resp: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/auth/status").insert_header(bearer(&token)).to_request(),
        )
        .await;
        let accounts = &resp["connectedAccounts"];
        assert_eq!(accounts["gmail"], true);
        assert_eq!(accounts["gmailConnections"].as_array().unwrap().len(), 1);
        assert_eq!(accounts["googlecalendar"], true);
        assert_eq!(accounts["googlemeetings"], false);
        assert_eq!(accounts["canvas"], true);
        assert_eq!(accounts["canvasConnections"][0]["id"], "ca_canvas_db");
        assert_eq!(accounts["totalConnections"], 2);
        assert!(resp["lastSynced"]["gmail"].is_string());

        let stored = harness.state.db.list_connections(user.user_id).unwrap();
        let ids: HashSet<String> = stored.into_iter().map(|c| c.composio_account_id).collect();
        assert!(ids.contains("ca_mail"));
        assert!(ids.contains("ca_cal"));
        assert!(!ids.contains("ca_other"));
    }

    #[actix_web::test]
    async fn test_status_without_composio_key() {
        let mut config = crate::test_support::test_config();
        config.composio.api_key = None;
        let harness = TestApp::with_config(FakeBroker::new(), config);
        let (_, token) = harness.login("ada", 1);
        let app = service!(harness);
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/auth/status").insert_header(bearer(&token)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 500);
    }

    #[actix_web::test]
    async fn test_unlink() {
        let harness = TestApp::new(FakeBroker::new());
        let (user, token) = harness.login("ada", 1);
        harness.state.db.upsert_connection(user.user_id, "ca_1", "gmail", "user_1").unwrap();
        let app = service!(harness);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/auth/unlink")
                .insert_header(bearer(&token))
                .set_json(json!({}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);

        let resp: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/auth/gmail/unlink")
                .insert_header(bearer(&token))
                .set_json(json!({"connectedAccountId": "ca_1"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp["ok"], true);
        assert_eq!(harness.broker.deleted(), vec!["ca_1".to_string()]);
        assert!(harness.state.db.list_connections(user.user_id).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_unlink_rejects_other_users_account() {
        let harness = TestApp::new(FakeBroker::new().with_account("ca_1", "gmail", Some("user_1"), "ACTIVE"));
        let (ada, _) = harness.login("ada", 1);
        let (_, bob) = harness.login("bob", 2);
        harness.state.db.upsert_connection(ada.user_id, "ca_1", "gmail", "user_1").unwrap();
        let app = service!(harness);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/auth/unlink")
                .insert_header(bearer(&bob))
                .set_json(json!({"connectedAccountId": "ca_1"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);
        assert!(harness.broker.deleted().is_empty());
        assert_eq!(harness.state.db.list_connections(ada.user_id).unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_unlink_account_owned_in_composio() {
        let harness = TestApp::new(FakeBroker::new().with_account("ca_9", "gmail", Some("user_1"), "ACTIVE"));
        let (_, token) = harness.login("ada", 1);
        let app = service!(harness);

        let resp: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/auth/unlink")
                .insert_header(bearer(&token))
                .set_json(json!({"connectedAccountId": "ca_9"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp["ok"], true);
        assert_eq!(harness.broker.deleted(), vec!["ca_9".to_string()]);
    }
}
