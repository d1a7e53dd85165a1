use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use core_types::{CoreError, ErrorKind};
use database::DbError;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use validator::ValidationErrors;

const OPAQUE_MESSAGE: &str = "the server encountered a problem";

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,
    #[error("invalid or missing authentication token")]
    InvalidToken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("you are not allowed to do this")]
    NotAllowed,
    #[error("invalid date format, expected YYYY-MM-DD")]
    InvalidDateFormat,
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(DbError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            AppError::Database(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Validation | ErrorKind::Authorization => StatusCode::BAD_REQUEST,
                ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::AuthenticationRequired
            | AppError::InvalidToken
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotAllowed => StatusCode::FORBIDDEN,
            AppError::InvalidDateFormat | AppError::Validation(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    pub fn field(field: &str, message: &str) -> Self {
        AppError::Validation(BTreeMap::from([(field.to_string(), message.to_string())]))
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidDateFormat => AppError::InvalidDateFormat,
            CoreError::InvalidInput(field, message) => AppError::field(&field, &message),
            other => AppError::Database(DbError::Core(other)),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => e.code.to_string(),
                    })
                    .unwrap_or_default();
                (field.to_string(), message)
            })
            .collect();
        AppError::Validation(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Database(DbError::Core(CoreError::InvalidInput(field, message))) => {
                json!({ "error": BTreeMap::from([(field, message)]) })
            }
            AppError::Validation(fields) => json!({ "error": fields }),
            AppError::Database(db_err) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = ?db_err, "Database error.");
                json!({ "error": OPAQUE_MESSAGE })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (AppError::from(DbError::NoSuchMark), StatusCode::NOT_FOUND),
            (AppError::from(DbError::EditConflict), StatusCode::CONFLICT),
            (AppError::from(DbError::AbsenceExcused), StatusCode::CONFLICT),
            (AppError::from(DbError::JournalArchived), StatusCode::BAD_REQUEST),
            (AppError::from(DbError::NotAStudent), StatusCode::BAD_REQUEST),
            (AppError::from(DbError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (AppError::from(CoreError::MarkNotCurrent), StatusCode::BAD_REQUEST),
            (AppError::from(CoreError::InvalidDateFormat), StatusCode::BAD_REQUEST),
            (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
            (AppError::NotAllowed, StatusCode::FORBIDDEN),
            (
                AppError::from(DbError::Timeout(Duration::from_secs(3))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[test]
    fn invalid_input_becomes_a_field_error() {
        let err = AppError::from(CoreError::InvalidInput("courses".into(), "must be positive".into()));
        assert!(matches!(&err, AppError::Validation(map) if map["courses"] == "must be positive"));
    }
}
