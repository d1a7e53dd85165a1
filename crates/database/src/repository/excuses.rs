use super::Db;
use super::logs::LogRepository;
use super::marks::{MARK_COLUMNS, MarkRepository, MarkRow};
use crate::error::DbError;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{Mark, MarkType};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A justification attached to an absence. An absence has at most one.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AbsenceExcuse {
    pub id: i64,
    pub mark_id: i64,
    pub excuse: String,
    #[serde(rename = "by")]
    pub author_id: i64,
    #[serde(rename = "at")]
    pub created_at: DateTime<Utc>,
}

/// A live absence of a student, with the date of its lesson and its excuse if any.
#[derive(Debug, Clone, Serialize)]
pub struct Absence {
    #[serde(flatten)]
    pub mark: Mark,
    pub date: NaiveDate,
    pub excuse: Option<AbsenceExcuse>,
}

#[derive(Debug, FromRow)]
struct AbsenceRow {
    #[sqlx(flatten)]
    mark: MarkRow,
    date: NaiveDate,
    excuse_id: Option<i64>,
    excuse: Option<String>,
    excuse_author_id: Option<i64>,
    excuse_created_at: Option<DateTime<Utc>>,
}

impl TryFrom<AbsenceRow> for Absence {
    type Error = DbError;

    fn try_from(row: AbsenceRow) -> Result<Self, Self::Error> {
        let mark = Mark::try_from(row.mark)?;
        let excuse = match (row.excuse_id, row.excuse, row.excuse_author_id, row.excuse_created_at) {
            (Some(id), Some(excuse), Some(author_id), Some(created_at)) => Some(AbsenceExcuse {
                id,
                mark_id: mark.id,
                excuse,
                author_id,
                created_at,
            }),
            _ => None,
        };
        Ok(Absence { mark, date: row.date, excuse })
    }
}

#[derive(Debug, Clone)]
pub struct ExcuseRepository {
    db: Db,
    marks: MarkRepository,
    logs: LogRepository,
}

impl ExcuseRepository {
    pub fn new(db: Db, marks: MarkRepository, logs: LogRepository) -> Self {
        Self { db, marks, logs }
    }

    /// Attaches an excuse to a live absence of `student_id`.
    pub async fn attach(
        &self,
        student_id: i64,
        mark_id: i64,
        excuse: &str,
        author_id: i64,
    ) -> Result<AbsenceExcuse, DbError> {
        let mark = self.marks.get(mark_id).await?;
        if mark.student_id != student_id || mark.mark_type != MarkType::Absent || !mark.is_live() {
            return Err(DbError::NotValidAbsence);
        }

        let created = self
            .db
            .run(async {
                let excuse = sqlx::query_as::<_, AbsenceExcuse>(
                    r#"
                    INSERT INTO absences_excuses (mark_id, excuse, author_id)
                    VALUES ($1, $2, $3)
                    RETURNING id, mark_id, excuse, author_id, created_at
                    "#,
                )
                .bind(mark_id)
                .bind(excuse)
                .bind(author_id)
                .fetch_one(self.db.pool())
                .await?;
                Ok(excuse)
            })
            .await?;
        self.logs
            .record_quietly(
                Some(author_id),
                "insert_excuse",
                &format!("excuse {} of user {student_id}", created.id),
            )
            .await;
        Ok(created)
    }

    /// Deletes an excuse on one of `student_id`'s absences. The absence stays.
    pub async fn remove(&self, student_id: i64, excuse_id: i64, author_id: i64) -> Result<(), DbError> {
        let removed = self
            .db
            .run(async {
                let result = sqlx::query(
                    r#"
                    DELETE FROM absences_excuses e
                    USING marks m
                    WHERE e.id = $1 AND m.id = e.mark_id AND m.user_id = $2
                    "#,
                )
                .bind(excuse_id)
                .bind(student_id)
                .execute(self.db.pool())
                .await?;
                Ok(result.rows_affected())
            })
            .await?;
        if removed == 0 {
            return Err(DbError::NoSuchExcuse);
        }
        self.logs
            .record_quietly(
                Some(author_id),
                "delete_excuse",
                &format!("excuse {excuse_id} of user {student_id}"),
            )
            .await;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<AbsenceExcuse, DbError> {
        self.db
            .run(async {
                sqlx::query_as::<_, AbsenceExcuse>(
                    "SELECT id, mark_id, excuse, author_id, created_at FROM absences_excuses WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DbError::NoSuchExcuse)
            })
            .await
    }

    /// Live absences of a student joined to their excuse, by lesson date.
    pub async fn list_absences_with_excuses(&self, student_id: i64) -> Result<Vec<Absence>, DbError> {
        self.db
            .run(async {
                let sql = format!(
                    r#"
                    SELECT {MARK_COLUMNS}, l.date,
                           e.id AS excuse_id, e.excuse, e.author_id AS excuse_author_id,
                           e.created_at AS excuse_created_at
                    FROM marks m
                    JOIN lessons l ON l.id = m.lesson_id
                    LEFT JOIN absences_excuses e ON e.mark_id = m.id
                    WHERE m.user_id = $1 AND m.type = 'absent' AND m.current AND NOT m.deleted
                    ORDER BY l.date, m.id
                    "#
                );
                let rows = sqlx::query_as::<_, AbsenceRow>(&sql)
                    .bind(student_id)
                    .fetch_all(self.db.pool())
                    .await?;
                rows.into_iter().map(Absence::try_from).collect()
            })
            .await
    }
}
