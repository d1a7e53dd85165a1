use super::Db;
use crate::error::DbError;
use core_types::CoreError;
use core_types::patch::apply;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Longest allowed grade label, e.g. "A+" or "10".
pub const MAX_IDENTIFIER_LEN: usize = 3;

/// A grade definition: a short label and the numeric value it stands for.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Grade {
    pub id: i64,
    pub identifier: String,
    pub value: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGrade {
    pub identifier: String,
    pub value: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradePatch {
    pub identifier: Option<String>,
    pub value: Option<i32>,
}

fn check_definition(identifier: &str, value: i32) -> Result<(), CoreError> {
    let len = identifier.chars().count();
    if len == 0 || len > MAX_IDENTIFIER_LEN {
        return Err(CoreError::InvalidInput(
            "identifier".to_string(),
            format!("must be 1 to {MAX_IDENTIFIER_LEN} characters"),
        ));
    }
    if value <= 0 {
        return Err(CoreError::InvalidInput(
            "value".to_string(),
            "must be positive".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct GradeRepository {
    db: Db,
}

impl GradeRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Grade>, DbError> {
        self.db
            .run(async {
                let grades = sqlx::query_as::<_, Grade>(
                    "SELECT id, identifier, value FROM grades ORDER BY value DESC, identifier",
                )
                .fetch_all(self.db.pool())
                .await?;
                Ok(grades)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Grade, DbError> {
        self.db
            .run(async {
                sqlx::query_as::<_, Grade>("SELECT id, identifier, value FROM grades WHERE id = $1")
                    .bind(id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::NoSuchGrade)
            })
            .await
    }

    pub async fn insert(&self, new: &NewGrade) -> Result<Grade, DbError> {
        check_definition(&new.identifier, new.value)?;
        self.db
            .run(async {
                let grade = sqlx::query_as::<_, Grade>(
                    "INSERT INTO grades (identifier, value) VALUES ($1, $2) RETURNING id, identifier, value",
                )
                .bind(&new.identifier)
                .bind(new.value)
                .fetch_one(self.db.pool())
                .await?;
                Ok(grade)
            })
            .await
    }

    /// A clash with another grade's identifier fails with `IdentifierAlreadyExists`.
    pub async fn update(&self, id: i64, patch: GradePatch) -> Result<Grade, DbError> {
        let mut grade = self.get(id).await?;
        apply(&mut grade.identifier, patch.identifier);
        apply(&mut grade.value, patch.value);
        check_definition(&grade.identifier, grade.value)?;

        self.db
            .run(async {
                sqlx::query_as::<_, Grade>(
                    "UPDATE grades SET identifier = $2, value = $3 WHERE id = $1 RETURNING id, identifier, value",
                )
                .bind(id)
                .bind(&grade.identifier)
                .bind(grade.value)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DbError::NoSuchGrade)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_short_and_values_positive() {
        assert!(check_definition("A", 5).is_ok());
        assert!(check_definition("10", 10).is_ok());
        assert!(check_definition("", 5).is_err());
        assert!(check_definition("ABCD", 5).is_err());
        assert!(check_definition("A", 0).is_err());
    }
}
