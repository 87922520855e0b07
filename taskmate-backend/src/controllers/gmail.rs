use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use futures_util::future::join_all;
use serde_json::json;

use super::require_user;
use crate::error::{AppError, AppResult};
use crate::integrations::gmail::{fetch_sent_emails, parse_email_date, relative_timestamp, SentEmail};
use crate::models::{ConnectedService, EmailView};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/gmail/emails").route(web::get().to(sent_emails)));
}

/// Stored analysis when this message was seen before, otherwise a fresh one that gets stored
async fn summarize(state: &AppState, user_id: i64, email: SentEmail, now: DateTime<Tz>) -> EmailView {
    let sender = email.sender();
    let received = email
        .date
        .as_deref()
        .and_then(parse_email_date)
        .unwrap_or_else(|| now.with_timezone(&Utc));

    let cached = state.db.get_email_summary(user_id, &email.id).unwrap_or_else(|e| {
        log::warn!("[Gmail] Summary lookup failed for {}: {}", email.id, e);
        None
    });

    let (summary, priority, category) = match cached {
        Some(row) => (row.summary_text, row.priority, row.category),
        None => {
            let analysis = state.analyzer.analyze(&email.subject, &email.to, &email.body).await;
            let received_at = received.to_rfc3339_opts(SecondsFormat::Secs, true);
            if let Err(e) = state.db.save_email_summary(
                user_id,
                &email.id,
                &sender,
                &email.subject,
                Some(&received_at),
                &analysis,
            ) {
                log::warn!("[Gmail] Could not store summary for {}: {}", email.id, e);
            }
            (
                analysis.summary,
                analysis.priority.as_ref().to_string(),
                analysis.category.as_ref().to_string(),
            )
        }
    };

    EmailView {
        id: email.id,
        sender,
        subject: email.subject,
        summary,
        timestamp: relative_timestamp(received, now),
        priority,
        category,
    }
}

/// The user's latest sent mail, each with a short analysis
async fn sent_emails(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;

    let sent = fetch_sent_emails(state.broker.as_ref(), &user.external_user_id())
        .await
        .map_err(|e| {
            log::error!("[Gmail] Error fetching emails for user {}: {}", user.user_id, e);
            AppError::Internal(e)
        })?;

    if let Some(message) = sent.message {
        return Ok(HttpResponse::Ok().json(json!({ "ok": true, "emails": [], "message": message })));
    }

    let now = Utc::now().with_timezone(&state.config.calendar_timezone);
    let emails: Vec<EmailView> = join_all(
        sent.emails
            .into_iter()
            .map(|email| summarize(&state, user.user_id, email, now)),
    )
    .await;

    if let Err(e) = state
        .db
        .touch_integration(user.user_id, ConnectedService::Gmail.service_name())
    {
        log::warn!("[Gmail] Could not record sync time: {}", e);
    }

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "emails": emails })))
}
