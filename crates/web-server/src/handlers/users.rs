use super::{ApiResult, message};
use crate::AppState;
use crate::auth::{Administrator, Authenticated, ensure_journal_writer};
use crate::dto::{
    ChildLinkRequest, ClassAssignmentRequest, CreateUserRequest, JournalMembershipRequest,
    UpdateUserRequest,
};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath, ValidatedJson};
use axum::{Json, extract::State};
use serde_json::json;
use std::sync::Arc;

/// # GET /users
pub async fn list(State(state): State<Arc<AppState>>, _admin: Administrator) -> ApiResult {
    let users = state.models.users.list().await?;
    Ok(Json(json!({ "users": users })))
}

/// # POST /users
pub async fn create(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult {
    let new = req.into_new_user()?;
    let id = state.models.users.insert(&new).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "create_user", &format!("user {id} ({})", new.name))
        .await;
    Ok(Json(json!({ "id": id })))
}

/// # GET /users/:id
/// Administrators see everyone, others only themselves.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    if !current.is_admin() && current.id() != id {
        return Err(AppError::NotAllowed);
    }
    let user = state.models.users.get(id).await?;
    Ok(Json(json!({ "user": user })))
}

/// # PATCH /users/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppPath(id): AppPath<i64>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> ApiResult {
    let (patch, version) = req.into_patch()?;
    let user = state.models.users.update(id, patch, version).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "update_user", &format!("user {id} ({})", user.name))
        .await;
    Ok(Json(json!({ "user": user })))
}

/// # GET /users/:id/class
pub async fn get_class(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    if !current.is_admin() && current.id() != id {
        return Err(AppError::NotAllowed);
    }
    let class = state.models.classes.get_user_class(id).await?;
    Ok(Json(json!({ "class": class })))
}

/// # PUT /users/:id/class
pub async fn set_class(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<ClassAssignmentRequest>,
) -> ApiResult {
    let class = state.models.classes.set_user_class(id, req.class_id).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "set_user_class", &format!("user {id} to class {}", class.name))
        .await;
    Ok(Json(json!({ "class": class })))
}

/// # POST /users/:id/journals
/// Enrolls a student in a journal.
pub async fn add_to_journal(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<JournalMembershipRequest>,
) -> ApiResult {
    ensure_journal_writer(&state.models, &current, req.journal_id).await?;
    state.models.journals.add_student(req.journal_id, id).await?;
    Ok(message("student added to journal"))
}

/// # DELETE /users/:id/journals/:journal_id
pub async fn remove_from_journal(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath((id, journal_id)): AppPath<(i64, i64)>,
) -> ApiResult {
    ensure_journal_writer(&state.models, &current, journal_id).await?;
    state.models.journals.remove_student(journal_id, id).await?;
    Ok(message("student removed from journal"))
}

/// # GET /users/:id/children
pub async fn list_children(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    if !current.is_admin() && current.id() != id {
        return Err(AppError::NotAllowed);
    }
    let children = state.models.users.list_children(id).await?;
    Ok(Json(json!({ "users": children })))
}

/// # POST /users/:id/children
pub async fn link_child(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<ChildLinkRequest>,
) -> ApiResult {
    state.models.users.link_parent(id, req.child_id).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "link_parent", &format!("user {id} to child {}", req.child_id))
        .await;
    Ok(message("child linked"))
}
