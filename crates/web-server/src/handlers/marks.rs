use super::ApiResult;
use crate::AppState;
use crate::auth::{Authenticated, ensure_can_view_student, ensure_journal_writer};
use crate::extract::{AppJson, AppPath};
use axum::{Json, extract::State};
use core_types::{MarkPatch, MarkTargetRef, NewMark};
use serde_json::json;
use std::sync::Arc;

/// # POST /marks
/// Records a fresh mark. The author is the caller.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppJson(new): AppJson<NewMark>,
) -> ApiResult {
    let journal_id = match new.target_ref()? {
        MarkTargetRef::Lesson { lesson_id } => {
            state.models.lessons.get(lesson_id).await?.lesson.journal_id
        }
        MarkTargetRef::Course { journal_id, .. }
        | MarkTargetRef::Subject { journal_id, .. }
        | MarkTargetRef::Journal { journal_id, .. } => journal_id,
    };
    ensure_journal_writer(&state.models, &current, journal_id).await?;
    let mark = state.models.marks.insert(&new, current.id()).await?;
    Ok(Json(json!({ "mark": mark })))
}

/// # GET /marks/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let mark = state.models.marks.get(id).await?;
    ensure_can_view_student(&state.models, &current, mark.student_id).await?;
    Ok(Json(json!({ "mark": mark })))
}

/// # PATCH /marks/:id
/// Corrects a mark by superseding it; the response holds the new revision.
pub async fn supersede(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<MarkPatch>,
) -> ApiResult {
    let existing = state.models.marks.get(id).await?;
    ensure_journal_writer(&state.models, &current, existing.target.journal_id()).await?;
    let mark = state.models.marks.supersede(id, &patch, current.id()).await?;
    Ok(Json(json!({ "mark": mark })))
}

/// # DELETE /marks/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let existing = state.models.marks.get(id).await?;
    ensure_journal_writer(&state.models, &current, existing.target.journal_id()).await?;
    let mark = state.models.marks.delete(id, current.id()).await?;
    Ok(Json(json!({ "mark": mark })))
}
