//! HTTP route groups and the session helpers they share

pub mod auth;
pub mod calendar;
pub mod canvas;
pub mod categories;
pub mod connections;
pub mod dashboard;
pub mod gmail;
pub mod health;
pub mod tasks;
pub mod tools;

use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};

use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::AppState;

pub const SESSION_COOKIE: &str = "taskmate_session";

/// Session token from the `taskmate_session` cookie, else `Authorization: Bearer`
pub fn session_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The logged-in user, if the request carries a live session
pub fn current_user(state: &web::Data<AppState>, req: &HttpRequest) -> AppResult<Option<User>> {
    let Some(token) = session_token(req) else {
        return Ok(None);
    };
    match state.db.validate_session(&token)? {
        Some(session) => Ok(state.db.get_user(session.user_id)?),
        None => Ok(None),
    }
}

pub fn require_user(state: &web::Data<AppState>, req: &HttpRequest) -> AppResult<User> {
    current_user(state, req)?.ok_or(AppError::Unauthorized)
}

pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Minimal standalone page; `body` must already be escaped
pub fn html_page(status: StatusCode, title: &str, body: &str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
             <body style=\"font-family: sans-serif; text-align: center; padding: 3rem;\">\n\
             <h1>{title}</h1>\n{body}\n</body>\n</html>",
            title = html_escape(title),
            body = body
        ))
}
