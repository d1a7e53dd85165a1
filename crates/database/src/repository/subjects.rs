use super::Db;
use crate::error::DbError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct SubjectRepository {
    db: Db,
}

impl SubjectRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Subject>, DbError> {
        self.db
            .run(async {
                let subjects = sqlx::query_as::<_, Subject>("SELECT id, name FROM subjects ORDER BY name")
                    .fetch_all(self.db.pool())
                    .await?;
                Ok(subjects)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Subject, DbError> {
        self.db
            .run(async {
                sqlx::query_as::<_, Subject>("SELECT id, name FROM subjects WHERE id = $1")
                    .bind(id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::NoSuchSubject)
            })
            .await
    }

    pub async fn insert(&self, name: &str) -> Result<Subject, DbError> {
        self.db
            .run(async {
                let subject = sqlx::query_as::<_, Subject>(
                    "INSERT INTO subjects (name) VALUES ($1) RETURNING id, name",
                )
                .bind(name)
                .fetch_one(self.db.pool())
                .await?;
                Ok(subject)
            })
            .await
    }

    pub async fn update(&self, id: i64, name: &str) -> Result<Subject, DbError> {
        self.db
            .run(async {
                sqlx::query_as::<_, Subject>(
                    "UPDATE subjects SET name = $2 WHERE id = $1 RETURNING id, name",
                )
                .bind(id)
                .bind(name)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DbError::NoSuchSubject)
            })
            .await
    }
}
