//! Repositories over the shared pool.
//!
//! Each repository owns a cheap clone of [`Db`] (pool handle + deadline) and is
//! otherwise stateless. [`Models`] bundles them into the registry the web layer
//! receives at startup.

use crate::deadline::Deadline;
use crate::error::DbError;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

pub mod assignments;
pub mod classes;
pub mod excuses;
pub mod grades;
pub mod groups;
pub mod journals;
pub mod lessons;
pub mod logs;
pub mod marks;
pub mod projections;
pub mod sessions;
pub mod subjects;
pub mod users;
pub mod years;

pub use assignments::{Assignment, AssignmentPatch, AssignmentRepository, NewAssignment};
pub use classes::{Class, ClassPatch, ClassRepository, NewClass};
pub use excuses::{Absence, AbsenceExcuse, ExcuseRepository};
pub use grades::{Grade, GradePatch, GradeRepository, NewGrade};
pub use groups::{Group, GroupRepository};
pub use journals::{Journal, JournalContext, JournalPatch, JournalRepository, NewJournal};
pub use lessons::{Lesson, LessonDetail, LessonPatch, LessonRepository, NewLesson};
pub use logs::{LogEntry, LogPage, LogRepository};
pub use marks::{MarkFilter, MarkRepository};
pub use projections::{DayActivity, ProjectionRepository, StudentMarks};
pub use sessions::{NewSession, Session, SessionRepository};
pub use subjects::{Subject, SubjectRepository};
pub use users::{NewUser, User, UserPatch, UserRepository, UserSummary};
pub use years::{NewYear, Year, YearRepository, YearWithStats};

/// A pool handle paired with the deadline applied to every call made through it.
#[derive(Debug, Clone)]
pub struct Db {
    pool: PgPool,
    deadline: Deadline,
}

impl Db {
    pub fn new(pool: PgPool, deadline: Deadline) -> Self {
        Self { pool, deadline }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The same pool with a different per-call deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self { pool: self.pool.clone(), deadline: Deadline::new(timeout) }
    }

    pub async fn run<T, F>(&self, fut: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        self.deadline.run(fut).await
    }
}

/// The registry of repositories passed into HTTP handlers.
#[derive(Debug, Clone)]
pub struct Models {
    pub users: UserRepository,
    pub classes: ClassRepository,
    pub subjects: SubjectRepository,
    pub grades: GradeRepository,
    pub years: YearRepository,
    pub journals: JournalRepository,
    pub lessons: LessonRepository,
    pub assignments: AssignmentRepository,
    pub marks: MarkRepository,
    pub excuses: ExcuseRepository,
    pub sessions: SessionRepository,
    pub groups: GroupRepository,
    pub logs: LogRepository,
    pub projections: ProjectionRepository,
}

impl Models {
    /// Creates the registry with `timeout` as the default per-call deadline.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self::from_db(Db::new(pool, Deadline::new(timeout)))
    }

    fn from_db(db: Db) -> Self {
        let users = UserRepository::new(db.clone());
        let subjects = SubjectRepository::new(db.clone());
        let logs = LogRepository::new(db.clone());
        let journals = JournalRepository::new(db.clone(), users.clone());
        let lessons = LessonRepository::new(db.clone(), journals.clone());
        let marks = MarkRepository::new(
            db.clone(),
            users.clone(),
            subjects.clone(),
            journals.clone(),
            lessons.clone(),
            logs.clone(),
        );

        Self {
            classes: ClassRepository::new(db.clone(), users.clone()),
            grades: GradeRepository::new(db.clone()),
            years: YearRepository::new(db.clone()),
            assignments: AssignmentRepository::new(db.clone(), journals.clone()),
            excuses: ExcuseRepository::new(db.clone(), marks.clone(), logs.clone()),
            sessions: SessionRepository::new(db.clone(), users.clone()),
            groups: GroupRepository::new(db.clone(), users.clone()),
            projections: ProjectionRepository::new(marks.clone(), lessons.clone(), journals.clone()),
            users,
            subjects,
            journals,
            lessons,
            marks,
            logs,
        }
    }
}
