use super::{ApiResult, message};
use crate::AppState;
use crate::auth::Authenticated;
use crate::dto::LoginRequest;
use crate::error::AppError;
use crate::extract::{AppPath, ValidatedJson};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header::USER_AGENT},
};
use database::DbError;
use serde_json::json;
use std::sync::Arc;

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// # POST /sessions
/// Exchanges e-mail and password for a bearer token. The token is shown only here.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult {
    let user = state
        .models
        .users
        .verify_credentials(&req.email, &req.password)
        .await
        .map_err(|e| match e {
            DbError::InvalidCredentials => AppError::InvalidCredentials,
            other => other.into(),
        })?;

    let browser = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let issued = state
        .models
        .sessions
        .create(user.id, &client_ip(&headers), browser, state.session_ttl)
        .await?;

    Ok(Json(json!({ "session": issued.session, "token": issued.token, "user": user })))
}

/// # GET /sessions
pub async fn list_own(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
) -> ApiResult {
    let sessions = state.models.sessions.list_for_user(current.id()).await?;
    Ok(Json(json!({ "sessions": sessions, "current": current.session_id })))
}

/// # DELETE /sessions/:id
pub async fn delete_own(
    State(state): State<Arc<AppState>>,
    Authenticated(current): Authenticated,
    AppPath(id): AppPath<i64>,
) -> ApiResult {
    state.models.sessions.delete(id, current.id()).await?;
    Ok(message("session deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_the_first_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "");
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        assert_eq!(client_ip(&headers), "10.0.0.7");
    }
}
