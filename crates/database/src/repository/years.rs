use super::Db;
use crate::error::DbError;
use core_types::CoreError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An academic year split into `courses` sequential courses.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Year {
    pub id: i64,
    pub display_name: String,
    pub courses: i32,
    pub current: bool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct YearWithStats {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub year: Year,
    pub journal_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewYear {
    pub display_name: String,
    pub courses: i32,
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Clone)]
pub struct YearRepository {
    db: Db,
}

impl YearRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Year>, DbError> {
        self.db
            .run(async {
                let years = sqlx::query_as::<_, Year>(
                    "SELECT id, display_name, courses, current FROM years ORDER BY id DESC",
                )
                .fetch_all(self.db.pool())
                .await?;
                Ok(years)
            })
            .await
    }

    pub async fn list_with_stats(&self) -> Result<Vec<YearWithStats>, DbError> {
        self.db
            .run(async {
                let years = sqlx::query_as::<_, YearWithStats>(
                    r#"
                    SELECT y.id, y.display_name, y.courses, y.current, COUNT(j.id) AS journal_count
                    FROM years y
                    LEFT JOIN journals j ON j.year_id = y.id
                    GROUP BY y.id
                    ORDER BY y.id DESC
                    "#,
                )
                .fetch_all(self.db.pool())
                .await?;
                Ok(years)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Year, DbError> {
        self.db
            .run(async {
                sqlx::query_as::<_, Year>(
                    "SELECT id, display_name, courses, current FROM years WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DbError::NoSuchYear)
            })
            .await
    }

    pub async fn get_current(&self) -> Result<Year, DbError> {
        self.db
            .run(async {
                sqlx::query_as::<_, Year>(
                    "SELECT id, display_name, courses, current FROM years WHERE current",
                )
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DbError::NoSuchYear)
            })
            .await
    }

    /// Inserts a year. A new current year takes the flag from the old one.
    pub async fn insert(&self, new: &NewYear) -> Result<Year, DbError> {
        if new.courses <= 0 {
            return Err(CoreError::InvalidInput(
                "courses".to_string(),
                "must be positive".to_string(),
            )
            .into());
        }

        self.db
            .run(async {
                let mut tx = self.db.pool().begin().await?;
                if new.current {
                    sqlx::query("UPDATE years SET current = FALSE WHERE current")
                        .execute(&mut *tx)
                        .await?;
                }
                let year = sqlx::query_as::<_, Year>(
                    r#"
                    INSERT INTO years (display_name, courses, current) VALUES ($1, $2, $3)
                    RETURNING id, display_name, courses, current
                    "#,
                )
                .bind(&new.display_name)
                .bind(new.courses)
                .bind(new.current)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(year)
            })
            .await
    }

    /// Moves the current flag to `id`.
    pub async fn set_current(&self, id: i64) -> Result<Year, DbError> {
        self.db
            .run(async {
                let mut tx = self.db.pool().begin().await?;
                sqlx::query("UPDATE years SET current = FALSE WHERE current AND id <> $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                let year = sqlx::query_as::<_, Year>(
                    "UPDATE years SET current = TRUE WHERE id = $1 RETURNING id, display_name, courses, current",
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(DbError::NoSuchYear)?;
                tx.commit().await?;
                Ok(year)
            })
            .await
    }
}
