//! Views over one student's record, and the absence excuses attached to it.

use super::journals::{YearQuery, year_or_current};
use super::{ApiResult, message};
use crate::AppState;
use crate::auth::{Authenticated, ensure_can_view_student};
use crate::dto::ExcuseRequest;
use crate::extract::{AppPath, AppQuery, DateWindow, ValidatedJson};
use axum::{Json, extract::State};
use database::repository::MarkFilter;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// # GET /students/:id/latest?from=&until=
/// Recent marks and lessons grouped by day.
pub async fn latest(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
    window: DateWindow,
) -> ApiResult {
    ensure_can_view_student(&state.models, &current, id).await?;
    let days = state
        .models
        .projections
        .latest_by_date(id, window.from, window.until)
        .await?;
    Ok(Json(json!({ "days": days })))
}

#[derive(Debug, Deserialize)]
pub struct MarksQuery {
    pub journal_id: Option<i64>,
    /// Include superseded and deleted revisions.
    #[serde(default)]
    pub all: bool,
}

/// # GET /students/:id/marks?journal_id=&all=
pub async fn marks(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
    AppQuery(query): AppQuery<MarksQuery>,
) -> ApiResult {
    ensure_can_view_student(&state.models, &current, id).await?;
    let filter = if query.all { MarkFilter::All } else { MarkFilter::Live };
    let marks = match query.journal_id {
        Some(journal_id) => {
            state
                .models
                .marks
                .list_by_student_and_journal(id, journal_id, filter)
                .await?
        }
        None => state.models.marks.list_by_student(id, filter).await?,
    };
    Ok(Json(json!({ "marks": marks })))
}

/// # GET /students/:id/absences
pub async fn absences(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    ensure_can_view_student(&state.models, &current, id).await?;
    let absences = state.models.excuses.list_absences_with_excuses(id).await?;
    Ok(Json(json!({ "absences": absences })))
}

/// # GET /students/:id/journals?year_id=
pub async fn journals(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
    AppQuery(query): AppQuery<YearQuery>,
) -> ApiResult {
    ensure_can_view_student(&state.models, &current, id).await?;
    let year_id = year_or_current(&state.models, query.year_id).await?;
    let journals = state.models.journals.list_for_student(id, year_id).await?;
    Ok(Json(json!({ "journals": journals })))
}

/// # POST /students/:id/absences/:mark_id/excuse
pub async fn excuse(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath((id, mark_id)): AppPath<(i64, i64)>,
    ValidatedJson(req): ValidatedJson<ExcuseRequest>,
) -> ApiResult {
    ensure_can_view_student(&state.models, &current, id).await?;
    let excuse = state
        .models
        .excuses
        .attach(id, mark_id, &req.excuse, current.id())
        .await?;
    Ok(Json(json!({ "excuse": excuse })))
}

/// # DELETE /students/:id/excuses/:excuse_id
pub async fn delete_excuse(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath((id, excuse_id)): AppPath<(i64, i64)>,
) -> ApiResult {
    ensure_can_view_student(&state.models, &current, id).await?;
    state.models.excuses.remove(id, excuse_id, current.id()).await?;
    Ok(message("excuse deleted"))
}
