use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use super::require_user;
use crate::error::{AppError, AppResult};
use crate::models::CreateCategoryRequest;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/categories")
            .route("", web::get().to(list_categories))
            .route("", web::post().to(create_category))
            .route("/{category_id}", web::delete().to(delete_category)),
    );
}

async fn list_categories(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let categories = state.db.list_categories(user.user_id)?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "categories": categories })))
}

async fn create_category(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateCategoryRequest>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    let (name, color) = body.into_inner().validate().map_err(AppError::BadRequest)?;
    let category = state
        .db
        .create_category(user.user_id, &name, color.as_deref())?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "category": category })))
}

async fn delete_category(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user = require_user(&state, &req)?;
    if !state.db.delete_category(user.user_id, path.into_inner())? {
        return Err(AppError::NotFound("Category not found".to_string()));
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Category deleted successfully" })))
}
