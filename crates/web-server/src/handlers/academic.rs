//! Lessons and assignments: journal entries edited under optimistic versioning.

use super::{ApiResult, message};
use crate::AppState;
use crate::auth::{Authenticated, ensure_journal_writer};
use crate::dto::{
    CreateAssignmentRequest, CreateLessonRequest, UpdateAssignmentRequest, UpdateLessonRequest,
};
use crate::extract::{AppPath, ValidatedJson};
use axum::{Json, extract::State};
use serde_json::json;
use std::sync::Arc;

/// # POST /lessons
pub async fn create_lesson(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    ValidatedJson(req): ValidatedJson<CreateLessonRequest>,
) -> ApiResult {
    let new = req.into_new_lesson()?;
    ensure_journal_writer(&state.models, &current, new.journal_id).await?;
    let lesson = state.models.lessons.insert(&new).await?;
    Ok(Json(json!({ "lesson": lesson })))
}

/// # GET /lessons/:id
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let lesson = state.models.lessons.get(id).await?;
    Ok(Json(json!({ "lesson": lesson })))
}

/// # PATCH /lessons/:id
pub async fn update_lesson(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
    ValidatedJson(req): ValidatedJson<UpdateLessonRequest>,
) -> ApiResult {
    let (patch, version) = req.into_patch()?;
    let existing = state.models.lessons.get(id).await?;
    ensure_journal_writer(&state.models, &current, existing.lesson.journal_id).await?;
    let lesson = state.models.lessons.update(id, patch, version).await?;
    Ok(Json(json!({ "lesson": lesson })))
}

/// # DELETE /lessons/:id
pub async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let existing = state.models.lessons.get(id).await?;
    ensure_journal_writer(&state.models, &current, existing.lesson.journal_id).await?;
    state.models.lessons.delete(id).await?;
    Ok(message("lesson deleted"))
}

/// # POST /assignments
pub async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    ValidatedJson(req): ValidatedJson<CreateAssignmentRequest>,
) -> ApiResult {
    let new = req.into_new_assignment()?;
    ensure_journal_writer(&state.models, &current, new.journal_id).await?;
    let assignment = state.models.assignments.insert(&new).await?;
    Ok(Json(json!({ "assignment": assignment })))
}

/// # GET /assignments/:id
pub async fn get_assignment(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let assignment = state.models.assignments.get(id).await?;
    Ok(Json(json!({ "assignment": assignment })))
}

/// # PATCH /assignments/:id
pub async fn update_assignment(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
    ValidatedJson(req): ValidatedJson<UpdateAssignmentRequest>,
) -> ApiResult {
    let (patch, version) = req.into_patch()?;
    let existing = state.models.assignments.get(id).await?;
    ensure_journal_writer(&state.models, &current, existing.journal_id).await?;
    let assignment = state.models.assignments.update(id, patch, version).await?;
    Ok(Json(json!({ "assignment": assignment })))
}

/// # DELETE /assignments/:id
pub async fn delete_assignment(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let existing = state.models.assignments.get(id).await?;
    ensure_journal_writer(&state.models, &current, existing.journal_id).await?;
    state.models.assignments.delete(id).await?;
    Ok(message("assignment deleted"))
}
