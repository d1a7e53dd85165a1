//! Request extractors shared by the handlers.

use crate::error::AppError;
use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use chrono::NaiveDate;
use core_types::parse_date;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

/// `Json<T>` whose rejection is reported in the usual error envelope.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

/// `Path<T>` whose rejection is reported in the usual error envelope.
pub struct AppPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(AppPath(value))
    }
}

/// `Query<T>` whose rejection is reported in the usual error envelope.
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(AppQuery(value))
    }
}

/// A JSON body that has passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let AppJson(value) = AppJson::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

pub fn optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    value
        .filter(|v| !v.is_empty())
        .map(parse_date)
        .transpose()
        .map_err(AppError::from)
}

/// `?from=YYYY-MM-DD&until=YYYY-MM-DD`, both optional and inclusive.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct RawDateWindow {
    from: Option<String>,
    until: Option<String>,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for DateWindow {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawDateWindow>::from_request_parts(parts, state).await?;
        Ok(DateWindow {
            from: optional_date(raw.from.as_deref())?,
            until: optional_date(raw.until.as_deref())?,
        })
    }
}

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// `?page=&limit=` with `page >= 1` and `limit` in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
pub struct Pagination {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Pagination {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pagination) = Query::<Pagination>::from_request_parts(parts, state).await?;
        pagination.validate()?;
        Ok(pagination)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: default_page(), limit: default_limit() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_bounds() {
        assert!(Pagination::default().validate().is_ok());
        assert_eq!(Pagination::default().limit, DEFAULT_PAGE_LIMIT);
        assert!(Pagination { page: 0, limit: 50 }.validate().is_err());
        assert!(Pagination { page: 1, limit: 0 }.validate().is_err());
        assert!(Pagination { page: 1, limit: MAX_PAGE_LIMIT + 1 }.validate().is_err());
        assert!(Pagination { page: 3, limit: MAX_PAGE_LIMIT }.validate().is_ok());
    }

    #[test]
    fn dates_must_be_iso() {
        assert_eq!(optional_date(None).unwrap(), None);
        assert_eq!(optional_date(Some("")).unwrap(), None);
        assert_eq!(
            optional_date(Some("2024-09-01")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 9, 1)
        );
        assert!(matches!(optional_date(Some("01.09.2024")), Err(AppError::InvalidDateFormat)));
    }
}
