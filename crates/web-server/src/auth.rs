//! Bearer-token authentication and role gating.
//!
//! The [`authenticate`] middleware runs on every request. It leaves
//! anonymous requests alone and attaches a [`CurrentUser`] to the ones that
//! carry a valid token. Handlers then demand what they need through the
//! [`Authenticated`] and [`Administrator`] extractors.

use crate::{AppState, error::AppError};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use core_types::Role;
use database::repository::User;
use database::token::is_well_formed;
use database::{DbError, Models};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: i64,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Administrator
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    value.strip_prefix("Bearer ").map(str::trim).filter(|t| is_well_formed(t))
}

pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(header) = req.headers().get(AUTHORIZATION) else {
        return Ok(next.run(req).await);
    };
    let token = header
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or(AppError::InvalidToken)?
        .to_string();

    let (session, user) = state
        .models
        .sessions
        .authenticate(&token)
        .await
        .map_err(|e| match e {
            DbError::NoSuchSession => AppError::InvalidToken,
            other => other.into(),
        })?;

    req.extensions_mut().insert(CurrentUser { user, session_id: session.id });
    Ok(next.run(req).await)
}

/// Any signed-in user.
pub struct Authenticated(pub CurrentUser);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(Authenticated)
            .ok_or(AppError::AuthenticationRequired)
    }
}

/// A signed-in administrator.
pub struct Administrator(pub CurrentUser);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Administrator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(current) = Authenticated::from_request_parts(parts, state).await?;
        if !current.is_admin() {
            return Err(AppError::NotAllowed);
        }
        Ok(Administrator(current))
    }
}

/// Writes into a journal are open to administrators and the journal's teacher.
pub async fn ensure_journal_writer(
    models: &Models,
    current: &CurrentUser,
    journal_id: i64,
) -> Result<(), AppError> {
    if current.is_admin() {
        return Ok(());
    }
    let journal = models.journals.context(journal_id).await?;
    if journal.teacher_id != current.id() {
        return Err(AppError::NotAllowed);
    }
    Ok(())
}

/// A student's record is visible to the people responsible for them.
pub async fn ensure_can_view_student(
    models: &Models,
    current: &CurrentUser,
    student_id: i64,
) -> Result<(), AppError> {
    if current.is_admin() || current.id() == student_id {
        return Ok(());
    }
    if models
        .users
        .is_teacher_or_parent_of_student(student_id, current.id())
        .await?
    {
        Ok(())
    } else {
        Err(AppError::NotAllowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_well_formed_bearer_tokens_pass() {
        assert_eq!(
            bearer_token("Bearer ABCDEFGHIJKLMNOPQRSTUVWXY2"),
            Some("ABCDEFGHIJKLMNOPQRSTUVWXY2")
        );
        assert_eq!(bearer_token("Basic ABCDEFGHIJKLMNOPQRSTUVWXY2"), None);
        assert_eq!(bearer_token("Bearer short"), None);
        assert_eq!(bearer_token("ABCDEFGHIJKLMNOPQRSTUVWXY2"), None);
    }
}
