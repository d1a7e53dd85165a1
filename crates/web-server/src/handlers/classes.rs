use super::ApiResult;
use crate::AppState;
use crate::auth::{Administrator, Authenticated};
use crate::extract::{AppJson, AppPath};
use axum::{Json, extract::State};
use database::repository::{ClassPatch, NewClass};
use serde_json::json;
use std::sync::Arc;

/// # GET /classes
pub async fn list(State(state): State<Arc<AppState>>, _user: Authenticated) -> ApiResult {
    let classes = state.models.classes.list().await?;
    Ok(Json(json!({ "classes": classes })))
}

/// # POST /classes
pub async fn create(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppJson(new): AppJson<NewClass>,
) -> ApiResult {
    let class = state.models.classes.insert(&new).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "create_class", &format!("class {} ({})", class.id, class.name))
        .await;
    Ok(Json(json!({ "class": class })))
}

/// # GET /classes/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let class = state.models.classes.get(id).await?;
    Ok(Json(json!({ "class": class })))
}

/// # PATCH /classes/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<ClassPatch>,
) -> ApiResult {
    let class = state.models.classes.update(id, patch).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "update_class", &format!("class {id} ({})", class.name))
        .await;
    Ok(Json(json!({ "class": class })))
}

/// # GET /classes/:id/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let users = state.models.classes.list_users(id).await?;
    Ok(Json(json!({ "users": users })))
}
