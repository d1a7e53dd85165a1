use super::Db;
use super::journals::JournalRepository;
use crate::error::DbError;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::AssignmentType;
use core_types::patch::apply;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

const ASSIGNMENT_COLUMNS: &str =
    "id, journal_id, description, deadline, type, created_at, updated_at, version";

/// Homework or a test set in a journal.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub journal_id: i64,
    pub description: String,
    pub deadline: NaiveDate,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub assignment_type: AssignmentType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub journal_id: i64,
    pub description: String,
    pub deadline: NaiveDate,
    #[serde(rename = "type")]
    pub assignment_type: AssignmentType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentPatch {
    pub description: Option<String>,
    pub deadline: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub assignment_type: Option<AssignmentType>,
}

#[derive(Debug, Clone)]
pub struct AssignmentRepository {
    db: Db,
    journals: JournalRepository,
}

impl AssignmentRepository {
    pub fn new(db: Db, journals: JournalRepository) -> Self {
        Self { db, journals }
    }

    pub async fn insert(&self, new: &NewAssignment) -> Result<Assignment, DbError> {
        self.journals.context(new.journal_id).await?.ensure_open()?;
        self.db
            .run(async {
                let sql = format!(
                    "INSERT INTO assignments (journal_id, description, deadline, type) \
                     VALUES ($1, $2, $3, $4) RETURNING {ASSIGNMENT_COLUMNS}"
                );
                let assignment = sqlx::query_as::<_, Assignment>(&sql)
                    .bind(new.journal_id)
                    .bind(&new.description)
                    .bind(new.deadline)
                    .bind(new.assignment_type)
                    .fetch_one(self.db.pool())
                    .await?;
                Ok(assignment)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Assignment, DbError> {
        self.db
            .run(async {
                let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1");
                sqlx::query_as::<_, Assignment>(&sql)
                    .bind(id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::NoSuchAssignment)
            })
            .await
    }

    /// Optimistic update: fails with `EditConflict` unless `version` is current.
    pub async fn update(
        &self,
        id: i64,
        patch: AssignmentPatch,
        version: i32,
    ) -> Result<Assignment, DbError> {
        let mut assignment = self.get(id).await?;
        if assignment.version != version {
            return Err(DbError::EditConflict);
        }
        self.journals.context(assignment.journal_id).await?.ensure_open()?;
        apply(&mut assignment.description, patch.description);
        apply(&mut assignment.deadline, patch.deadline);
        apply(&mut assignment.assignment_type, patch.assignment_type);

        self.db
            .run(async {
                let sql = format!(
                    r#"
                    UPDATE assignments
                    SET description = $3, deadline = $4, type = $5,
                        updated_at = NOW(), version = version + 1
                    WHERE id = $1 AND version = $2
                    RETURNING {ASSIGNMENT_COLUMNS}
                    "#
                );
                sqlx::query_as::<_, Assignment>(&sql)
                    .bind(id)
                    .bind(version)
                    .bind(&assignment.description)
                    .bind(assignment.deadline)
                    .bind(assignment.assignment_type)
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
                let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
                    .bind(id)
                    .execute(self.db.pool())
                    .await?;
                Ok(result.rows_affected())
            })
            .await?;
        if deleted == 0 {
            return Err(DbError::NoSuchAssignment);
        }
        Ok(())
    }

    /// Assignments of a journal, nearest deadline first.
    pub async fn list(&self, journal_id: i64) -> Result<Vec<Assignment>, DbError> {
        self.db
            .run(async {
                let sql = format!(
                    "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE journal_id = $1 \
                     ORDER BY deadline, id"
                );
                let assignments = sqlx::query_as::<_, Assignment>(&sql)
                    .bind(journal_id)
                    .fetch_all(self.db.pool())
                    .await?;
                Ok(assignments)
            })
            .await
    }
}
