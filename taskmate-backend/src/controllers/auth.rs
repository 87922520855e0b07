//! GitHub login, session probe and logout

use std::time::{Duration, Instant};

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use super::{current_user, session_token, SESSION_COOKIE};
use crate::db::tables::SESSION_TTL_HOURS;
use crate::error::{AppError, AppResult};
use crate::AppState;

/// How long a pending OAuth `state` stays redeemable
const OAUTH_STATE_TTL: Duration = Duration::from_secs(10 * 60);

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/github", web::get().to(github_login))
            .route("/github/callback", web::get().to(github_callback))
            .route("/login/success", web::get().to(login_success))
            .route("/login/failed", web::get().to(login_failed))
            .route("/logout", web::get().to(logout)),
    );
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .finish()
}

async fn github_login(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let github = state
        .github
        .as_ref()
        .ok_or_else(|| AppError::Config("GitHub OAuth is not configured".to_string()))?;

    state
        .oauth_states
        .retain(|_, issued| issued.elapsed() < OAUTH_STATE_TTL);
    let oauth_state = uuid::Uuid::new_v4().simple().to_string();
    state.oauth_states.insert(oauth_state.clone(), Instant::now());

    let url = github.authorize_url(&state.config.github_callback_url(), &oauth_state);
    Ok(redirect(&url))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

fn take_state(state: &AppState, oauth_state: Option<&str>) -> bool {
    oauth_state
        .and_then(|s| state.oauth_states.remove(s))
        .map(|(_, issued)| issued.elapsed() < OAUTH_STATE_TTL)
        .unwrap_or(false)
}

async fn github_callback(state: web::Data<AppState>, query: web::Query<CallbackQuery>) -> HttpResponse {
    let login_url = format!("{}/login", state.config.frontend_url);

    if !take_state(&state, query.state.as_deref()) {
        log::warn!("[Auth] GitHub callback with unknown or expired state");
        return redirect(&login_url);
    }
    let (Some(code), Some(github)) = (query.code.as_deref(), state.github.as_ref()) else {
        return redirect(&login_url);
    };

    let redirect_uri = state.config.github_callback_url();
    let profile = match github.exchange_code(code, &redirect_uri).await {
        Ok(token) => match github.fetch_user(&token.access_token).await {
            Ok(profile) => Some((profile, token)),
            Err(e) => {
                log::error!("[Auth] {}", e);
                None
            }
        },
        Err(e) => {
            log::error!("[Auth] {}", e);
            None
        }
    };
    let Some((profile, token)) = profile else {
        return redirect(&login_url);
    };

    let session = state
        .db
        .upsert_github_user(&profile, &token.access_token, token.scope.as_deref())
        .and_then(|user| state.db.create_session(user.user_id));

    match session {
        Ok(session) => {
            log::info!("[Auth] GitHub user {} logged in as user {}", profile.login, session.user_id);
            HttpResponse::Found()
                .insert_header((header::LOCATION, format!("{}/composio", state.config.frontend_url)))
                .cookie(session_cookie(session.token, state.config.session_cookie_secure))
                .finish()
        }
        Err(e) => {
            log::error!("[Auth] Failed to persist GitHub login: {}", e);
            redirect(&login_url)
        }
    }
}

async fn login_success(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    match current_user(&state, &req) {
        Ok(Some(user)) => {
            let identities = state.db.list_identities(user.user_id).unwrap_or_else(|e| {
                log::warn!("[Auth] Could not load identities for user {}: {}", user.user_id, e);
                Vec::new()
            });
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "user": user,
                "identities": identities
            }))
        }
        Ok(None) => HttpResponse::Ok().json(serde_json::json!({ "success": false, "user": null })),
        Err(e) => {
            log::error!("[Auth] Session lookup failed: {}", e);
            HttpResponse::Ok().json(serde_json::json!({ "success": false, "user": null }))
        }
    }
}

async fn login_failed() -> impl Responder {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "success": false,
        "message": "failure"
    }))
}

async fn logout(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    if let Some(token) = session_token(&req) {
        if let Err(e) = state.db.delete_session(&token) {
            log::error!("[Auth] Failed to delete session: {}", e);
        }
    }
    let mut removal = session_cookie(String::new(), state.config.session_cookie_secure);
    removal.make_removal();
    HttpResponse::Ok()
        .cookie(removal)
        .json(serde_json::json!({ "status": "logout", "user": {} }))
}
