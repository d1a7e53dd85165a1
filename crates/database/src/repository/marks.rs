//! The mark engine: inserts, corrections and soft deletes of marks.
//!
//! Corrections never touch the stored row beyond clearing its `current`
//! flag. The successor is inserted in the same transaction, with the
//! predecessor row locked, so readers always see exactly one live revision.

use super::Db;
use super::journals::JournalRepository;
use super::lessons::LessonRepository;
use super::logs::LogRepository;
use super::subjects::SubjectRepository;
use super::users::UserRepository;
use crate::error::DbError;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{
    CoreError, Mark, MarkDraft, MarkPatch, MarkTarget, MarkTargetRef, MarkType, NewMark,
    check_course,
};
use sqlx::{Executor, FromRow, PgConnection, Postgres};
use tracing::warn;

pub(crate) const MARK_COLUMNS: &str = "m.id, m.user_id, m.type, m.lesson_id, m.journal_id, \
    m.course, m.subject_id, m.grade_id, m.comment, m.current, m.deleted, m.previous_ids, \
    m.author_id, m.created_at, m.updated_at";

/// Represents a row from the `marks` table.
#[derive(Debug, FromRow)]
pub(crate) struct MarkRow {
    id: i64,
    user_id: i64,
    #[sqlx(rename = "type")]
    mark_type: MarkType,
    lesson_id: Option<i64>,
    journal_id: i64,
    course: Option<i32>,
    subject_id: Option<i64>,
    grade_id: Option<i64>,
    comment: Option<String>,
    current: bool,
    deleted: bool,
    previous_ids: Vec<i64>,
    author_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MarkRow> for Mark {
    type Error = CoreError;

    fn try_from(row: MarkRow) -> Result<Self, Self::Error> {
        let target = MarkTarget::from_columns(
            row.mark_type,
            row.lesson_id,
            Some(row.journal_id),
            row.course,
            row.subject_id,
        )?;
        Ok(Mark {
            id: row.id,
            student_id: row.user_id,
            mark_type: row.mark_type,
            target,
            grade_id: row.grade_id,
            comment: row.comment,
            current: row.current,
            deleted: row.deleted,
            previous_ids: row.previous_ids,
            by: row.author_id,
            at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn into_marks(rows: Vec<MarkRow>) -> Result<Vec<Mark>, DbError> {
    rows.into_iter()
        .map(|row| Mark::try_from(row).map_err(DbError::from))
        .collect()
}

/// Which revisions a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkFilter {
    /// Every revision, superseded and deleted ones included.
    All,
    /// Only current, non-deleted marks.
    #[default]
    Live,
}

impl MarkFilter {
    fn clause(self) -> &'static str {
        match self {
            MarkFilter::All => "",
            MarkFilter::Live => "AND m.current AND NOT m.deleted",
        }
    }
}

async fn insert_draft<'e, E>(executor: E, draft: &MarkDraft, author_id: i64) -> Result<Mark, DbError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        r#"
        INSERT INTO marks AS m
            (user_id, type, lesson_id, journal_id, course, subject_id, grade_id, comment,
             previous_ids, author_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {MARK_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, MarkRow>(&sql)
        .bind(draft.student_id)
        .bind(draft.mark_type)
        .bind(draft.target.lesson_id())
        .bind(draft.target.journal_id())
        .bind(draft.target.course())
        .bind(draft.target.subject_id())
        .bind(draft.grade_id)
        .bind(&draft.comment)
        .bind(&draft.previous_ids)
        .bind(author_id)
        .fetch_one(executor)
        .await?;
    Ok(Mark::try_from(row)?)
}

async fn ensure_grade_exists<'e, E>(executor: E, grade_id: i64) -> Result<(), DbError>
where
    E: Executor<'e, Database = Postgres>,
{
    let found = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM grades WHERE id = $1)")
        .bind(grade_id)
        .fetch_one(executor)
        .await?;
    if found { Ok(()) } else { Err(DbError::NoSuchGrade) }
}

/// Moves the excuse of a corrected absence onto its successor. A successor
/// that is no longer an absence cannot be excused, so the excuse is dropped.
async fn carry_excuse(conn: &mut PgConnection, old_id: i64, new: &Mark) -> Result<(), DbError> {
    if new.mark_type == MarkType::Absent {
        sqlx::query("UPDATE absences_excuses SET mark_id = $2 WHERE mark_id = $1")
            .bind(old_id)
            .bind(new.id)
            .execute(conn)
            .await?;
    } else {
        sqlx::query("DELETE FROM absences_excuses WHERE mark_id = $1")
            .bind(old_id)
            .execute(conn)
            .await?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct MarkRepository {
    db: Db,
    users: UserRepository,
    subjects: SubjectRepository,
    journals: JournalRepository,
    lessons: LessonRepository,
    logs: LogRepository,
}

impl MarkRepository {
    pub fn new(
        db: Db,
        users: UserRepository,
        subjects: SubjectRepository,
        journals: JournalRepository,
        lessons: LessonRepository,
        logs: LogRepository,
    ) -> Self {
        Self { db, users, subjects, journals, lessons, logs }
    }

    /// Fills in the derived columns of a target and checks the journal is writable.
    async fn resolve_target(&self, target: MarkTargetRef) -> Result<MarkTarget, DbError> {
        match target {
            MarkTargetRef::Lesson { lesson_id } => {
                let detail = self.lessons.get(lesson_id).await?;
                if detail.journal_archived {
                    return Err(DbError::JournalArchived);
                }
                Ok(MarkTarget::Lesson {
                    lesson_id,
                    journal_id: detail.lesson.journal_id,
                    course: detail.lesson.course,
                })
            }
            MarkTargetRef::Course { journal_id, course } => {
                let journal = self.journals.context(journal_id).await?;
                journal.ensure_open()?;
                check_course(course, journal.courses)?;
                Ok(MarkTarget::Course { journal_id, course })
            }
            MarkTargetRef::Subject { subject_id, journal_id } => {
                self.subjects.get(subject_id).await?;
                self.journals.context(journal_id).await?.ensure_open()?;
                Ok(MarkTarget::Subject { subject_id, journal_id })
            }
            MarkTargetRef::Journal { journal_id, lesson_id } => {
                self.journals.context(journal_id).await?.ensure_open()?;
                let course = match lesson_id {
                    Some(lesson_id) => {
                        let detail = self.lessons.get(lesson_id).await?;
                        if detail.lesson.journal_id != journal_id {
                            return Err(CoreError::InvalidMarkTarget(
                                "the lesson belongs to another journal".into(),
                            )
                            .into());
                        }
                        Some(detail.lesson.course)
                    }
                    None => None,
                };
                Ok(MarkTarget::Journal { journal_id, lesson_id, course })
            }
        }
    }

    async fn after_write(&self, mark: &Mark, author_id: i64, action: &str) {
        let journal_id = mark.target.journal_id();
        if let Err(e) = self.journals.touch(journal_id).await {
            warn!(journal_id, error = ?e, "failed to touch journal after mark write");
        }
        let target = format!("mark {} of user {}", mark.id, mark.student_id);
        self.logs.record_quietly(Some(author_id), action, &target).await;
    }

    /// Records a fresh mark for a student who belongs to the target's journal.
    pub async fn insert(&self, new: &NewMark, author_id: i64) -> Result<Mark, DbError> {
        let target = new.target_ref()?;
        self.users.get_student(new.student_id).await?;
        let target = self.resolve_target(target).await?;
        if let Some(grade_id) = new.grade_id {
            self.db
                .run(ensure_grade_exists(self.db.pool(), grade_id))
                .await?;
        }
        if !self.journals.is_member(target.journal_id(), new.student_id).await? {
            return Err(DbError::UserNotInJournal);
        }

        let draft = MarkDraft::fresh(new, target);
        let mark = self
            .db
            .run(insert_draft(self.db.pool(), &draft, author_id))
            .await?;
        self.after_write(&mark, author_id, "insert_mark").await;
        Ok(mark)
    }

    /// Replaces a live mark with a corrected revision.
    ///
    /// The predecessor is locked, flagged non-current and followed by its
    /// successor inside one transaction.
    pub async fn supersede(
        &self,
        mark_id: i64,
        patch: &MarkPatch,
        author_id: i64,
    ) -> Result<Mark, DbError> {
        let mark = self
            .db
            .run(async {
                let mut tx = self.db.pool().begin().await?;

                let sql = format!("SELECT {MARK_COLUMNS} FROM marks m WHERE m.id = $1 FOR UPDATE");
                let row = sqlx::query_as::<_, MarkRow>(&sql)
                    .bind(mark_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or(DbError::NoSuchMark)?;
                let old = Mark::try_from(row)?;
                let draft = old.successor(patch)?;

                let archived =
                    sqlx::query_scalar::<_, bool>("SELECT archived FROM journals WHERE id = $1")
                        .bind(old.target.journal_id())
                        .fetch_one(&mut *tx)
                        .await?;
                if archived {
                    return Err(DbError::JournalArchived);
                }
                if let Some(grade_id) = draft.grade_id {
                    ensure_grade_exists(&mut *tx, grade_id).await?;
                }

                sqlx::query("UPDATE marks SET current = FALSE, updated_at = NOW() WHERE id = $1")
                    .bind(old.id)
                    .execute(&mut *tx)
                    .await?;
                let new = insert_draft(&mut *tx, &draft, author_id).await?;
                if old.mark_type == MarkType::Absent {
                    carry_excuse(&mut *tx, old.id, &new).await?;
                }

                tx.commit().await?;
                Ok(new)
            })
            .await?;
        self.after_write(&mark, author_id, "supersede_mark").await;
        Ok(mark)
    }

    /// Soft-deletes a live mark. The row stays, flagged deleted and non-current.
    pub async fn delete(&self, mark_id: i64, author_id: i64) -> Result<Mark, DbError> {
        let existing = self.get(mark_id).await?;
        existing.ensure_current()?;
        self.journals
            .context(existing.target.journal_id())
            .await?
            .ensure_open()?;

        let mark = self
            .db
            .run(async {
                let sql = format!(
                    r#"
                    UPDATE marks m
                    SET deleted = TRUE, current = FALSE, updated_at = NOW()
                    WHERE m.id = $1 AND m.current AND NOT m.deleted
                    RETURNING {MARK_COLUMNS}
                    "#
                );
                let row = sqlx::query_as::<_, MarkRow>(&sql)
                    .bind(mark_id)
                    .fetch_optional(self.db.pool())
                    .await?
                    // Lost a race with a concurrent correction or delete.
                    .ok_or(DbError::Core(CoreError::MarkNotCurrent))?;
                Ok(Mark::try_from(row)?)
            })
            .await?;
        self.logs
            .record_quietly(
                Some(author_id),
                "delete_mark",
                &format!("mark {} of user {}", mark.id, mark.student_id),
            )
            .await;
        Ok(mark)
    }

    pub async fn get(&self, id: i64) -> Result<Mark, DbError> {
        self.db
            .run(async {
                let sql = format!("SELECT {MARK_COLUMNS} FROM marks m WHERE m.id = $1");
                let row = sqlx::query_as::<_, MarkRow>(&sql)
                    .bind(id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::NoSuchMark)?;
                Ok(Mark::try_from(row)?)
            })
            .await
    }

    async fn list_where(&self, condition: &str, binds: &[i64], filter: MarkFilter) -> Result<Vec<Mark>, DbError> {
        self.db
            .run(async {
                let sql = format!(
                    "SELECT {MARK_COLUMNS} FROM marks m WHERE {condition} {} ORDER BY m.created_at, m.id",
                    filter.clause()
                );
                let mut query = sqlx::query_as::<_, MarkRow>(&sql);
                for value in binds {
                    query = query.bind(*value);
                }
                into_marks(query.fetch_all(self.db.pool()).await?)
            })
            .await
    }

    pub async fn list_by_student(&self, student_id: i64, filter: MarkFilter) -> Result<Vec<Mark>, DbError> {
        self.list_where("m.user_id = $1", &[student_id], filter).await
    }

    pub async fn list_by_journal(&self, journal_id: i64, filter: MarkFilter) -> Result<Vec<Mark>, DbError> {
        self.list_where("m.journal_id = $1", &[journal_id], filter).await
    }

    pub async fn list_by_student_and_journal(
        &self,
        student_id: i64,
        journal_id: i64,
        filter: MarkFilter,
    ) -> Result<Vec<Mark>, DbError> {
        self.list_where("m.user_id = $1 AND m.journal_id = $2", &[student_id, journal_id], filter)
            .await
    }

    /// Live marks of a student last changed inside the inclusive UTC date window,
    /// most recent first.
    pub async fn latest(
        &self,
        student_id: i64,
        from: Option<NaiveDate>,
        until: Option<NaiveDate>,
    ) -> Result<Vec<Mark>, DbError> {
        self.db
            .run(async {
                let sql = format!(
                    r#"
                    SELECT {MARK_COLUMNS}
                    FROM marks m
                    WHERE m.user_id = $1 AND m.current AND NOT m.deleted
                      AND ($2::DATE IS NULL OR (m.updated_at AT TIME ZONE 'UTC')::DATE >= $2)
                      AND ($3::DATE IS NULL OR (m.updated_at AT TIME ZONE 'UTC')::DATE <= $3)
                    ORDER BY m.updated_at DESC, m.id DESC
                    "#
                );
                let rows = sqlx::query_as::<_, MarkRow>(&sql)
                    .bind(student_id)
                    .bind(from)
                    .bind(until)
                    .fetch_all(self.db.pool())
                    .await?;
                into_marks(rows)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(mark_type: MarkType) -> MarkRow {
        MarkRow {
            id: 5,
            user_id: 7,
            mark_type,
            lesson_id: Some(3),
            journal_id: 2,
            course: Some(1),
            subject_id: None,
            grade_id: None,
            comment: None,
            current: true,
            deleted: false,
            previous_ids: vec![1, 4],
            author_id: 9,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rows_become_marks_with_resolved_targets() {
        let mark = Mark::try_from(row(MarkType::Absent)).unwrap();
        assert_eq!(
            mark.target,
            MarkTarget::Lesson { lesson_id: 3, journal_id: 2, course: 1 }
        );
        assert_eq!(mark.by, 9);
        assert_eq!(mark.previous_ids, vec![1, 4]);
    }

    #[test]
    fn rows_with_foreign_columns_are_rejected() {
        let mut bad = row(MarkType::SubjectGrade);
        bad.grade_id = Some(1);
        assert!(matches!(
            Mark::try_from(bad),
            Err(CoreError::InvalidMarkTarget(_))
        ));
    }

    #[test]
    fn live_filter_is_the_default() {
        assert_eq!(MarkFilter::default(), MarkFilter::Live);
        assert!(MarkFilter::All.clause().is_empty());
        assert!(MarkFilter::Live.clause().contains("NOT m.deleted"));
    }
}
