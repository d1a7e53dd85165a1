use super::Db;
use super::subjects::Subject;
use super::users::{User, UserRepository, UserSummary};
use super::years::Year;
use crate::error::DbError;
use chrono::{DateTime, Utc};
use core_types::patch::apply;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

const JOURNAL_SELECT: &str = r#"
    SELECT
        j.id, j.name, j.archived, j.last_updated,
        t.id AS teacher_id, t.name AS teacher_name,
        s.id AS subject_id, s.name AS subject_name,
        y.id AS year_id, y.display_name AS year_display_name,
        y.courses AS year_courses, y.current AS year_current,
        ARRAY(
            SELECT DISTINCT l.course FROM lessons l WHERE l.journal_id = j.id ORDER BY l.course
        ) AS courses
    FROM journals j
    JOIN users t ON t.id = j.teacher_id
    JOIN subjects s ON s.id = j.subject_id
    JOIN years y ON y.id = j.year_id
"#;

/// The flat result of joining a journal with its teacher, subject and year.
#[derive(Debug, FromRow)]
struct JournalRow {
    id: i64,
    name: String,
    archived: bool,
    last_updated: DateTime<Utc>,
    teacher_id: i64,
    teacher_name: String,
    subject_id: i64,
    subject_name: String,
    year_id: i64,
    year_display_name: String,
    year_courses: i32,
    year_current: bool,
    courses: Vec<i32>,
}

/// A journal with its references resolved.
#[derive(Debug, Clone, Serialize)]
pub struct Journal {
    pub id: i64,
    pub name: String,
    pub archived: bool,
    pub last_updated: DateTime<Utc>,
    pub teacher: UserSummary,
    pub subject: Subject,
    pub year: Year,
    /// Distinct course numbers that have at least one lesson.
    pub courses: Vec<i32>,
}

impl From<JournalRow> for Journal {
    fn from(row: JournalRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            archived: row.archived,
            last_updated: row.last_updated,
            teacher: UserSummary { id: row.teacher_id, name: row.teacher_name },
            subject: Subject { id: row.subject_id, name: row.subject_name },
            year: Year {
                id: row.year_id,
                display_name: row.year_display_name,
                courses: row.year_courses,
                current: row.year_current,
            },
            courses: row.courses,
        }
    }
}

/// What writers into a journal need to check: ownership, archive flag and
/// the number of courses in its year.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct JournalContext {
    pub id: i64,
    pub teacher_id: i64,
    pub archived: bool,
    pub courses: i32,
}

impl JournalContext {
    pub fn ensure_open(&self) -> Result<(), DbError> {
        if self.archived {
            Err(DbError::JournalArchived)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewJournal {
    pub name: String,
    pub teacher_id: i64,
    pub subject_id: i64,
    pub year_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalPatch {
    pub name: Option<String>,
    pub teacher_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub year_id: Option<i64>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct JournalRepository {
    db: Db,
    users: UserRepository,
}

impl JournalRepository {
    pub fn new(db: Db, users: UserRepository) -> Self {
        Self { db, users }
    }

    async fn fetch(&self, filter: &str, binds: &[i64]) -> Result<Vec<Journal>, DbError> {
        self.db
            .run(async {
                let sql = format!("{JOURNAL_SELECT} {filter} ORDER BY j.name, j.id");
                let mut query = sqlx::query_as::<_, JournalRow>(&sql);
                for value in binds {
                    query = query.bind(*value);
                }
                let rows = query.fetch_all(self.db.pool()).await?;
                Ok(rows.into_iter().map(Journal::from).collect())
            })
            .await
    }

    pub async fn list(&self, year_id: i64) -> Result<Vec<Journal>, DbError> {
        self.fetch("WHERE j.year_id = $1", &[year_id]).await
    }

    pub async fn list_for_teacher(&self, teacher_id: i64, year_id: i64) -> Result<Vec<Journal>, DbError> {
        self.fetch("WHERE j.teacher_id = $1 AND j.year_id = $2", &[teacher_id, year_id])
            .await
    }

    pub async fn list_for_student(&self, student_id: i64, year_id: i64) -> Result<Vec<Journal>, DbError> {
        self.fetch(
            "WHERE j.year_id = $2 AND EXISTS \
             (SELECT 1 FROM users_journals uj WHERE uj.journal_id = j.id AND uj.user_id = $1)",
            &[student_id, year_id],
        )
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Journal, DbError> {
        self.fetch("WHERE j.id = $1", &[id])
            .await?
            .into_iter()
            .next()
            .ok_or(DbError::NoSuchJournal)
    }

    pub async fn context(&self, id: i64) -> Result<JournalContext, DbError> {
        self.db
            .run(async {
                sqlx::query_as::<_, JournalContext>(
                    r#"
                    SELECT j.id, j.teacher_id, j.archived, y.courses
                    FROM journals j JOIN years y ON y.id = j.year_id
                    WHERE j.id = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DbError::NoSuchJournal)
            })
            .await
    }

    async fn validate_refs(
        &self,
        teacher_id: Option<i64>,
        subject_id: Option<i64>,
        year_id: Option<i64>,
    ) -> Result<(), DbError> {
        if let Some(teacher_id) = teacher_id {
            let teacher = self.users.get(teacher_id).await?;
            if !teacher.role.can_teach() {
                return Err(DbError::NotATeacher);
            }
        }
        if let Some(subject_id) = subject_id {
            if !self.exists("SELECT EXISTS (SELECT 1 FROM subjects WHERE id = $1)", subject_id).await? {
                return Err(DbError::NoSuchSubject);
            }
        }
        if let Some(year_id) = year_id {
            if !self.exists("SELECT EXISTS (SELECT 1 FROM years WHERE id = $1)", year_id).await? {
                return Err(DbError::NoSuchYear);
            }
        }
        Ok(())
    }

    async fn exists(&self, sql: &str, id: i64) -> Result<bool, DbError> {
        self.db
            .run(async {
                let found = sqlx::query_scalar::<_, bool>(sql)
                    .bind(id)
                    .fetch_one(self.db.pool())
                    .await?;
                Ok(found)
            })
            .await
    }

    pub async fn insert(&self, new: &NewJournal) -> Result<i64, DbError> {
        self.validate_refs(Some(new.teacher_id), Some(new.subject_id), Some(new.year_id))
            .await?;
        self.db
            .run(async {
                let id = sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO journals (name, teacher_id, subject_id, year_id)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .bind(&new.name)
                .bind(new.teacher_id)
                .bind(new.subject_id)
                .bind(new.year_id)
                .fetch_one(self.db.pool())
                .await?;
                Ok(id)
            })
            .await
    }

    /// Updates the journal and touches `last_updated`.
    pub async fn update(&self, id: i64, patch: JournalPatch) -> Result<Journal, DbError> {
        let current = self.get(id).await?;
        self.validate_refs(patch.teacher_id, patch.subject_id, patch.year_id)
            .await?;

        let mut name = current.name;
        let mut teacher_id = current.teacher.id;
        let mut subject_id = current.subject.id;
        let mut year_id = current.year.id;
        let mut archived = current.archived;
        apply(&mut name, patch.name);
        apply(&mut teacher_id, patch.teacher_id);
        apply(&mut subject_id, patch.subject_id);
        apply(&mut year_id, patch.year_id);
        apply(&mut archived, patch.archived);

        let updated = self
            .db
            .run(async {
                let result = sqlx::query(
                    r#"
                    UPDATE journals
                    SET name = $2, teacher_id = $3, subject_id = $4, year_id = $5,
                        archived = $6, last_updated = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&name)
                .bind(teacher_id)
                .bind(subject_id)
                .bind(year_id)
                .bind(archived)
                .execute(self.db.pool())
                .await?;
                Ok(result.rows_affected())
            })
            .await?;
        if updated == 0 {
            return Err(DbError::NoSuchJournal);
        }
        self.get(id).await
    }

    /// Deletes the journal; lessons, assignments, marks and memberships go with it.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let deleted = self
            .db
            .run(async {
                let result = sqlx::query("DELETE FROM journals WHERE id = $1")
                    .bind(id)
                    .execute(self.db.pool())
                    .await?;
                Ok(result.rows_affected())
            })
            .await?;
        if deleted == 0 {
            return Err(DbError::NoSuchJournal);
        }
        Ok(())
    }

    /// Adds a student to the journal. Adding an existing member is a no-op.
    pub async fn add_student(&self, journal_id: i64, student_id: i64) -> Result<(), DbError> {
        self.context(journal_id).await?.ensure_open()?;
        self.users.get_student(student_id).await?;

        self.db
            .run(async {
                sqlx::query(
                    "INSERT INTO users_journals (journal_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(journal_id)
                .bind(student_id)
                .execute(self.db.pool())
                .await?;
                Ok(())
            })
            .await
    }

    pub async fn remove_student(&self, journal_id: i64, student_id: i64) -> Result<(), DbError> {
        let removed = self
            .db
            .run(async {
                let result =
                    sqlx::query("DELETE FROM users_journals WHERE journal_id = $1 AND user_id = $2")
                        .bind(journal_id)
                        .bind(student_id)
                        .execute(self.db.pool())
                        .await?;
                Ok(result.rows_affected())
            })
            .await?;
        if removed == 0 {
            return Err(DbError::UserNotInJournal);
        }
        Ok(())
    }

    pub async fn list_students(&self, journal_id: i64) -> Result<Vec<User>, DbError> {
        self.context(journal_id).await?;
        self.db
            .run(async {
                let students = sqlx::query_as::<_, User>(
                    r#"
                    SELECT u.id, u.name, u.email, u.password_hash, u.role, u.phone, u.address,
                           u.birth_date, u.class_id, u.active, u.created_at, u.version
                    FROM users u
                    JOIN users_journals uj ON uj.user_id = u.id
                    WHERE uj.journal_id = $1
                    ORDER BY u.name, u.id
                    "#,
                )
                .bind(journal_id)
                .fetch_all(self.db.pool())
                .await?;
                Ok(students)
            })
            .await
    }

    pub async fn is_member(&self, journal_id: i64, student_id: i64) -> Result<bool, DbError> {
        self.db
            .run(async {
                let member = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM users_journals WHERE journal_id = $1 AND user_id = $2)",
                )
                .bind(journal_id)
                .bind(student_id)
                .fetch_one(self.db.pool())
                .await?;
                Ok(member)
            })
            .await
    }

    /// Marks the journal as recently changed.
    pub async fn touch(&self, journal_id: i64) -> Result<(), DbError> {
        self.db
            .run(async {
                sqlx::query("UPDATE journals SET last_updated = NOW() WHERE id = $1")
                    .bind(journal_id)
                    .execute(self.db.pool())
                    .await?;
                Ok(())
            })
            .await
    }
}
