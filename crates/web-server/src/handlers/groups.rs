use super::{ApiResult, message};
use crate::AppState;
use crate::auth::{Administrator, Authenticated};
use crate::dto::NameRequest;
use crate::extract::{AppPath, ValidatedJson};
use axum::{Json, extract::State};
use serde_json::json;
use std::sync::Arc;

/// # GET /groups
pub async fn list(State(state): State<Arc<AppState>>, _user: Authenticated) -> ApiResult {
    let groups = state.models.groups.list().await?;
    Ok(Json(json!({ "groups": groups })))
}

/// # POST /groups
pub async fn create(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    ValidatedJson(req): ValidatedJson<NameRequest>,
) -> ApiResult {
    let group = state.models.groups.insert(&req.name).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "create_group", &format!("group {} ({})", group.id, group.name))
        .await;
    Ok(Json(json!({ "group": group })))
}

/// # GET /groups/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let group = state.models.groups.get(id).await?;
    Ok(Json(json!({ "group": group })))
}

/// # GET /groups/:id/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let users = state.models.groups.list_users(id).await?;
    Ok(Json(json!({ "users": users })))
}

/// # PUT /groups/:id/users/:user_id
pub async fn add_user(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppPath((id, user_id)): AppPath<(i64, i64)>,
) -> ApiResult {
    state.models.groups.add_user(id, user_id).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "add_group_user", &format!("user {user_id} to group {id}"))
        .await;
    Ok(message("user added to group"))
}

/// # DELETE /groups/:id/users/:user_id
pub async fn remove_user(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppPath((id, user_id)): AppPath<(i64, i64)>,
) -> ApiResult {
    state.models.groups.remove_user(id, user_id).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "remove_group_user", &format!("user {user_id} from group {id}"))
        .await;
    Ok(message("user removed from group"))
}
