use super::Db;
use super::users::{User, UserRepository};
use crate::error::DbError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct GroupRepository {
    db: Db,
    users: UserRepository,
}

impl GroupRepository {
    pub fn new(db: Db, users: UserRepository) -> Self {
        Self { db, users }
    }

    pub async fn list(&self) -> Result<Vec<Group>, DbError> {
        self.db
            .run(async {
                let groups = sqlx::query_as::<_, Group>("SELECT id, name FROM groups ORDER BY name, id")
                    .fetch_all(self.db.pool())
                    .await?;
                Ok(groups)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Group, DbError> {
        self.db
            .run(async {
                sqlx::query_as::<_, Group>("SELECT id, name FROM groups WHERE id = $1")
                    .bind(id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::NoSuchGroup)
            })
            .await
    }

    pub async fn insert(&self, name: &str) -> Result<Group, DbError> {
        self.db
            .run(async {
                let group = sqlx::query_as::<_, Group>(
                    "INSERT INTO groups (name) VALUES ($1) RETURNING id, name",
                )
                .bind(name)
                .fetch_one(self.db.pool())
                .await?;
                Ok(group)
            })
            .await
    }

    /// Adds a user to a group. A second add fails with `UserAlreadyInGroup`.
    pub async fn add_user(&self, group_id: i64, user_id: i64) -> Result<(), DbError> {
        self.get(group_id).await?;
        self.users.get(user_id).await?;
        self.db
            .run(async {
                sqlx::query("INSERT INTO users_groups (user_id, group_id) VALUES ($1, $2)")
                    .bind(user_id)
                    .bind(group_id)
                    .execute(self.db.pool())
                    .await?;
                Ok(())
            })
            .await
    }

    pub async fn remove_user(&self, group_id: i64, user_id: i64) -> Result<(), DbError> {
        let removed = self
            .db
            .run(async {
                let result =
                    sqlx::query("DELETE FROM users_groups WHERE user_id = $1 AND group_id = $2")
                        .bind(user_id)
                        .bind(group_id)
                        .execute(self.db.pool())
                        .await?;
                Ok(result.rows_affected())
            })
            .await?;
        if removed == 0 {
            return Err(DbError::UserNotInGroup);
        }
        Ok(())
    }

    pub async fn list_users(&self, group_id: i64) -> Result<Vec<User>, DbError> {
        self.get(group_id).await?;
        self.db
            .run(async {
                let users = sqlx::query_as::<_, User>(
                    r#"
                    SELECT u.id, u.name, u.email, u.password_hash, u.role, u.phone, u.address,
                           u.birth_date, u.class_id, u.active, u.created_at, u.version
                    FROM users u
                    JOIN users_groups ug ON ug.user_id = u.id
                    WHERE ug.group_id = $1
                    ORDER BY u.name, u.id
                    "#,
                )
                .bind(group_id)
                .fetch_all(self.db.pool())
                .await?;
                Ok(users)
            })
            .await
    }
}
