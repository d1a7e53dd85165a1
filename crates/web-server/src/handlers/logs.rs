use super::ApiResult;
use crate::AppState;
use crate::auth::Administrator;
use crate::extract::{AppQuery, Pagination};
use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Substring search over the whole trail is allowed to run longer than other calls.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct LogSearch {
    pub search: Option<String>,
}

/// # GET /logs?search=&page=&limit=
pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: Administrator,
    pagination: Pagination,
    AppQuery(query): AppQuery<LogSearch>,
) -> ApiResult {
    let logs = match query.search {
        Some(_) => state.models.logs.with_timeout(SEARCH_TIMEOUT),
        None => state.models.logs.clone(),
    };
    let page = logs
        .list(query.search.as_deref(), pagination.page, pagination.limit)
        .await?;
    Ok(Json(json!({ "logs": page.logs, "total": page.total })))
}
