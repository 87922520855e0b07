//! Browsing the Composio tool catalog

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::current_user;
use crate::composio::{ToolInfo, ToolQuery};
use crate::error::{AppError, AppResult};
use crate::AppState;

const DEFAULT_SEARCH_LIMIT: u32 = 10;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/tools")
            .route("/count", web::get().to(tool_counts))
            .route("/search", web::get().to(search_tools))
            .route("/canvas/search", web::get().to(search_canvas_tools)),
    );
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsQuery {
    user_id: Option<String>,
    query: Option<String>,
    toolkit: Option<String>,
    limit: Option<String>,
}

impl ToolsQuery {
    fn limit(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
    }

    fn search(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }
}

/// Logged-in user's external id, else `?userId=`, else the configured default
fn external_user_id(state: &web::Data<AppState>, req: &HttpRequest, query: &ToolsQuery) -> AppResult<String> {
    if let Some(user) = current_user(state, req)? {
        return Ok(user.external_user_id());
    }
    Ok(query
        .user_id
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| state.config.composio.default_user_id.clone()))
}

fn describe(tools: &[ToolInfo]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| json!({ "name": t.name, "description": t.description, "parameters": t.parameters }))
        .collect()
}

fn names(tools: &[ToolInfo]) -> Vec<&str> {
    tools.iter().map(|t| t.name.as_str()).collect()
}

fn missing_query(example: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "ok": false,
        "error": "Query parameter is required",
        "example": example
    }))
}

async fn tool_counts(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ToolsQuery>,
) -> AppResult<HttpResponse> {
    let user_id = external_user_id(&state, &req, &query)?;

    let gmail = state
        .broker
        .list_tools(&user_id, &ToolQuery::toolkit("GMAIL"))
        .await
        .map_err(AppError::Internal)?;
    let canvas = state
        .broker
        .list_tools(&user_id, &ToolQuery::toolkit("CANVAS"))
        .await
        .unwrap_or_else(|e| {
            log::error!("[Composio] Error loading Canvas tools (ignored): {}", e);
            Vec::new()
        });

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "toolCounts": {
            "gmail": gmail.len(),
            "canvas": canvas.len(),
            "total": gmail.len() + canvas.len(),
            "combined": gmail.len() + canvas.len(),
        },
        "tools": {
            "gmail": names(&gmail),
            "canvas": names(&canvas),
        }
    })))
}

async fn search_tools(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ToolsQuery>,
) -> AppResult<HttpResponse> {
    let Some(search) = query.search() else {
        return Ok(missing_query("/api/tools/search?query=send%20email&toolkit=GMAIL&limit=5"));
    };
    let user_id = external_user_id(&state, &req, &query)?;
    let toolkit = query.toolkit.clone().unwrap_or_else(|| "GMAIL".to_string());

    let tools = state
        .broker
        .list_tools(
            &user_id,
            &ToolQuery::toolkit(&toolkit).search(search).limit(query.limit()),
        )
        .await
        .map_err(AppError::Internal)?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "query": search,
        "toolkit": toolkit,
        "toolCount": tools.len(),
        "tools": describe(&tools),
    })))
}

async fn search_canvas_tools(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ToolsQuery>,
) -> AppResult<HttpResponse> {
    let Some(search) = query.search() else {
        return Ok(missing_query("/api/tools/canvas/search?query=assignment&limit=5"));
    };
    let user_id = external_user_id(&state, &req, &query)?;

    let tools = state
        .broker
        .list_tools(
            &user_id,
            &ToolQuery::toolkit("CANVAS").search(search).limit(query.limit()),
        )
        .await
        .map_err(|e| {
            log::error!("[Composio] Error searching Canvas tools: {}", e);
            AppError::Internal(
                "Canvas toolkit schema is currently inconsistent. Try again after upgrading Composio.".to_string(),
            )
        })?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "query": search,
        "toolCount": tools.len(),
        "tools": describe(&tools),
    })))
}
