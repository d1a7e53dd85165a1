//! Subjects, grade definitions and academic years.

use super::ApiResult;
use crate::AppState;
use crate::auth::{Administrator, Authenticated};
use crate::dto::NameRequest;
use crate::extract::{AppJson, AppPath, ValidatedJson};
use axum::{Json, extract::State};
use database::repository::{GradePatch, NewGrade, NewYear};
use serde_json::json;
use std::sync::Arc;

/// # GET /subjects
pub async fn list_subjects(State(state): State<Arc<AppState>>, _user: Authenticated) -> ApiResult {
    let subjects = state.models.subjects.list().await?;
    Ok(Json(json!({ "subjects": subjects })))
}

/// # POST /subjects
pub async fn create_subject(
    State(state): State<Arc<AppState>>,
    _admin: Administrator,
    ValidatedJson(req): ValidatedJson<NameRequest>,
) -> ApiResult {
    let subject = state.models.subjects.insert(&req.name).await?;
    Ok(Json(json!({ "subject": subject })))
}

/// # GET /subjects/:id
pub async fn get_subject(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let subject = state.models.subjects.get(id).await?;
    Ok(Json(json!({ "subject": subject })))
}

/// # PATCH /subjects/:id
pub async fn update_subject(
    State(state): State<Arc<AppState>>,
    _admin: Administrator,
    AppPath(id): AppPath<i64>,
    ValidatedJson(req): ValidatedJson<NameRequest>,
) -> ApiResult {
    let subject = state.models.subjects.update(id, &req.name).await?;
    Ok(Json(json!({ "subject": subject })))
}

/// # GET /grades
pub async fn list_grades(State(state): State<Arc<AppState>>, _user: Authenticated) -> ApiResult {
    let grades = state.models.grades.list().await?;
    Ok(Json(json!({ "grades": grades })))
}

/// # POST /grades
pub async fn create_grade(
    State(state): State<Arc<AppState>>,
    _admin: Administrator,
    AppJson(new): AppJson<NewGrade>,
) -> ApiResult {
    let grade = state.models.grades.insert(&new).await?;
    Ok(Json(json!({ "grade": grade })))
}

/// # GET /grades/:id
pub async fn get_grade(
    State(state): State<Arc<AppState>>,
    _user: Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let grade = state.models.grades.get(id).await?;
    Ok(Json(json!({ "grade": grade })))
}

/// # PATCH /grades/:id
pub async fn update_grade(
    State(state): State<Arc<AppState>>,
    _admin: Administrator,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<GradePatch>,
) -> ApiResult {
    let grade = state.models.grades.update(id, patch).await?;
    Ok(Json(json!({ "grade": grade })))
}

/// # GET /years
/// Every year with the number of journals opened in it.
pub async fn list_years(State(state): State<Arc<AppState>>, _user: Authenticated) -> ApiResult {
    let years = state.models.years.list_with_stats().await?;
    Ok(Json(json!({ "years": years })))
}

/// # POST /years
pub async fn create_year(
    State(state): State<Arc<AppState>>,
    _admin: Administrator,
    AppJson(new): AppJson<NewYear>,
) -> ApiResult {
    let year = state.models.years.insert(&new).await?;
    Ok(Json(json!({ "year": year })))
}

/// # GET /years/current
pub async fn current_year(State(state): State<Arc<AppState>>, _user: Authenticated) -> ApiResult {
    let year = state.models.years.get_current().await?;
    Ok(Json(json!({ "year": year })))
}

/// # PUT /years/:id/current
pub async fn set_current_year(
    State(state): State<Arc<AppState>>,
    _admin: Administrator,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    let year = state.models.years.set_current(id).await?;
    Ok(Json(json!({ "year": year })))
}
