use super::Db;
use super::journals::JournalRepository;
use crate::error::DbError;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::check_course;
use core_types::patch::apply;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

const DETAIL_SELECT: &str = r#"
    SELECT l.id, l.journal_id, l.description, l.date, l.course, l.created_at, l.updated_at,
           l.version, j.name AS journal_name, j.archived AS journal_archived
    FROM lessons l
    JOIN journals j ON j.id = l.journal_id
"#;

/// Represents a row from the `lessons` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub journal_id: i64,
    pub description: String,
    pub date: NaiveDate,
    pub course: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

/// A lesson joined with the name and archive flag of its journal.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LessonDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lesson: Lesson,
    pub journal_name: String,
    pub journal_archived: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLesson {
    pub journal_id: i64,
    pub description: String,
    pub date: NaiveDate,
    pub course: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonPatch {
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub course: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct LessonRepository {
    db: Db,
    journals: JournalRepository,
}

impl LessonRepository {
    pub fn new(db: Db, journals: JournalRepository) -> Self {
        Self { db, journals }
    }

    /// Creates a lesson in an open journal, within the year's course range.
    pub async fn insert(&self, new: &NewLesson) -> Result<Lesson, DbError> {
        let journal = self.journals.context(new.journal_id).await?;
        journal.ensure_open()?;
        check_course(new.course, journal.courses)?;

        self.db
            .run(async {
                let lesson = sqlx::query_as::<_, Lesson>(
                    r#"
                    INSERT INTO lessons (journal_id, description, date, course)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, journal_id, description, date, course, created_at, updated_at, version
                    "#,
                )
                .bind(new.journal_id)
                .bind(&new.description)
                .bind(new.date)
                .bind(new.course)
                .fetch_one(self.db.pool())
                .await?;
                Ok(lesson)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<LessonDetail, DbError> {
        self.db
            .run(async {
                let sql = format!("{DETAIL_SELECT} WHERE l.id = $1");
                sqlx::query_as::<_, LessonDetail>(&sql)
                    .bind(id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::NoSuchLesson)
            })
            .await
    }

    /// Optimistic update: fails with `EditConflict` unless `version` is current.
    pub async fn update(&self, id: i64, patch: LessonPatch, version: i32) -> Result<Lesson, DbError> {
        let LessonDetail { mut lesson, journal_archived, .. } = self.get(id).await?;
        if lesson.version != version {
            return Err(DbError::EditConflict);
        }
        if journal_archived {
            return Err(DbError::JournalArchived);
        }
        if let Some(course) = patch.course {
            let journal = self.journals.context(lesson.journal_id).await?;
            check_course(course, journal.courses)?;
            lesson.course = course;
        }
        apply(&mut lesson.description, patch.description);
        apply(&mut lesson.date, patch.date);

        self.db
            .run(async {
                sqlx::query_as::<_, Lesson>(
                    r#"
                    UPDATE lessons
                    SET description = $3, date = $4, course = $5,
                        updated_at = NOW(), version = version + 1
                    WHERE id = $1 AND version = $2
                    RETURNING id, journal_id, description, date, course, created_at, updated_at, version
                    "#,
                )
                .bind(id)
                .bind(version)
                .bind(&lesson.description)
                .bind(lesson.date)
                .bind(lesson.course)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DbError::EditConflict)
            })
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let deleted = self
            .db
            .run(async {
                let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
                    .bind(id)
                    .execute(self.db.pool())
                    .await?;
                Ok(result.rows_affected())
            })
            .await?;
        if deleted == 0 {
            return Err(DbError::NoSuchLesson);
        }
        Ok(())
    }

    /// Lessons of one journal, newest first; `course` narrows to a single course.
    pub async fn list(&self, journal_id: i64, course: Option<i32>) -> Result<Vec<Lesson>, DbError> {
        self.db
            .run(async {
                let lessons = sqlx::query_as::<_, Lesson>(
                    r#"
                    SELECT id, journal_id, description, date, course, created_at, updated_at, version
                    FROM lessons
                    WHERE journal_id = $1 AND ($2::INTEGER IS NULL OR course = $2)
                    ORDER BY date DESC, id DESC
                    "#,
                )
                .bind(journal_id)
                .bind(course)
                .fetch_all(self.db.pool())
                .await?;
                Ok(lessons)
            })
            .await
    }

    /// Lessons of every journal the student belongs to, inside an inclusive date window.
    pub async fn list_latest_for_student(
        &self,
        student_id: i64,
        from: Option<NaiveDate>,
        until: Option<NaiveDate>,
    ) -> Result<Vec<LessonDetail>, DbError> {
        self.db
            .run(async {
                let sql = format!(
                    r#"
                    {DETAIL_SELECT}
                    JOIN users_journals uj ON uj.journal_id = l.journal_id
                    WHERE uj.user_id = $1
                      AND ($2::DATE IS NULL OR l.date >= $2)
                      AND ($3::DATE IS NULL OR l.date <= $3)
                    ORDER BY l.date DESC, l.id DESC
                    "#
                );
                let lessons = sqlx::query_as::<_, LessonDetail>(&sql)
                    .bind(student_id)
                    .bind(from)
                    .bind(until)
                    .fetch_all(self.db.pool())
                    .await?;
                Ok(lessons)
            })
            .await
    }
}
