use super::{ApiResult, message};
use crate::AppState;
use crate::auth::{Administrator, Authenticated, ensure_journal_writer};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use axum::{Json, extract::State};
use core_types::Role;
use database::Models;
use database::repository::{JournalPatch, NewJournal};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year_id: Option<i64>,
}

pub(crate) async fn year_or_current(models: &Models, year_id: Option<i64>) -> Result<i64, AppError> {
    match year_id {
        Some(id) => Ok(id),
        None => Ok(models.years.get_current().await?.id),
    }
}

/// # GET /journals?year_id=
/// Administrators see every journal of the year, teachers their own and
/// students the ones they are enrolled in. Defaults to the current year.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppQuery(query): AppQuery<YearQuery>,
) -> ApiResult {
    let year_id = year_or_current(&state.models, query.year_id).await?;
    let journals = &state.models.journals;
    let list = match current.user.role {
        Role::Administrator => journals.list(year_id).await?,
        Role::Teacher => journals.list_for_teacher(current.id(), year_id).await?,
        Role::Student => journals.list_for_student(current.id(), year_id).await?,
        Role::Parent => return Err(AppError::NotAllowed),
    };
    Ok(Json(json!({ "journals": list })))
}

/// # POST /journals
pub async fn create(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppJson(new): AppJson<NewJournal>,
) -> ApiResult {
    let id = state.models.journals.insert(&new).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "create_journal", &format!("journal {id} ({})", new.name))
        .await;
    Ok(Json(json!({ "id": id })))
}

/// # GET /journals/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let journal = state.models.journals.get(id).await?;
    Ok(Json(json!({ "journal": journal })))
}

/// # PATCH /journals/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<JournalPatch>,
) -> ApiResult {
    let journal = state.models.journals.update(id, patch).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "update_journal", &format!("journal {id} ({})", journal.name))
        .await;
    Ok(Json(json!({ "journal": journal })))
}

/// # DELETE /journals/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Administrator(admin): Administrator,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    state.models.journals.delete(id).await?;
    state
        .models
        .logs
        .record_quietly(Some(admin.id()), "delete_journal", &format!("journal {id}"))
        .await;
    Ok(message("journal deleted"))
}

/// # GET /journals/:id/students
pub async fn list_students(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    ensure_journal_writer(&state.models, &current, id).await?;
    let students = state.models.journals.list_students(id).await?;
    Ok(Json(json!({ "users": students })))
}

#[derive(Debug, Deserialize)]
pub struct CourseQuery {
    pub course: Option<i32>,
}

/// # GET /journals/:id/lessons?course=
pub async fn list_lessons(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
    AppQuery(query): AppQuery<CourseQuery>,
) -> ApiResult {
    state.models.journals.context(id).await?;
    let lessons = state.models.lessons.list(id, query.course).await?;
    Ok(Json(json!({ "lessons": lessons })))
}

/// # GET /journals/:id/assignments
pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    state.models.journals.context(id).await?;
    let assignments = state.models.assignments.list(id).await?;
    Ok(Json(json!({ "assignments": assignments })))
}

/// # GET /journals/:id/marks
/// The journal matrix: every enrolled student with their live marks.
pub async fn matrix(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    ensure_journal_writer(&state.models, &current, id).await?;
    let rows = state.models.projections.journal_matrix(id).await?;
    Ok(Json(json!({ "students": rows })))
}
