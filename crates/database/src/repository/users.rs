use super::Db;
use crate::error::DbError;
use crate::password::{hash_password, verify_password};
use chrono::{DateTime, NaiveDate, Utc};
use core_types::patch::apply;
use core_types::{Role, is_valid_email};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, phone, address, birth_date, \
                            class_id, active, created_at, version";

/// Represents a row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub class_id: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub version: i32,
}

/// The id and display name of a user, embedded in other rows.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "core_types::patch::double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "core_types::patch::double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "core_types::patch::double_option")]
    pub birth_date: Option<Option<NaiveDate>>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Db,
}

impl UserRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<User>, DbError> {
        self.db
            .run(async {
                let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY name, id");
                let users = sqlx::query_as::<_, User>(&sql)
                    .fetch_all(self.db.pool())
                    .await?;
                Ok(users)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<User, DbError> {
        self.db
            .run(async {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
                sqlx::query_as::<_, User>(&sql)
                    .bind(id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::NoSuchUser)
            })
            .await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, DbError> {
        self.db
            .run(async {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
                sqlx::query_as::<_, User>(&sql)
                    .bind(email)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::NoSuchUser)
            })
            .await
    }

    /// Fetches a user and checks that they hold the student role.
    pub async fn get_student(&self, id: i64) -> Result<User, DbError> {
        let user = self.get(id).await?;
        if user.role != Role::Student {
            return Err(DbError::NotAStudent);
        }
        Ok(user)
    }

    /// Stores a new account and returns its id.
    pub async fn insert(&self, new: &NewUser) -> Result<i64, DbError> {
        if !is_valid_email(&new.email) {
            return Err(DbError::InvalidEmail);
        }
        let password_hash = hash_password(&new.password).await?;

        let id = self
            .db
            .run(async {
                let id = sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO users (name, email, password_hash, role, phone, address, birth_date)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING id
                    "#,
                )
                .bind(&new.name)
                .bind(&new.email)
                .bind(&password_hash)
                .bind(new.role)
                .bind(&new.phone)
                .bind(&new.address)
                .bind(new.birth_date)
                .fetch_one(self.db.pool())
                .await?;
                Ok(id)
            })
            .await?;

        tracing::info!(user_id = id, role = %new.role, "User created.");
        Ok(id)
    }

    /// Applies `patch` if the stored version still equals `version`.
    pub async fn update(&self, id: i64, patch: UserPatch, version: i32) -> Result<User, DbError> {
        let mut user = self.get(id).await?;
        if user.version != version {
            return Err(DbError::EditConflict);
        }

        if let Some(email) = patch.email {
            if !is_valid_email(&email) {
                return Err(DbError::InvalidEmail);
            }
            user.email = email;
        }
        if let Some(password) = patch.password {
            user.password_hash = hash_password(&password).await?;
        }
        apply(&mut user.name, patch.name);
        apply(&mut user.role, patch.role);
        apply(&mut user.phone, patch.phone);
        apply(&mut user.address, patch.address);
        apply(&mut user.birth_date, patch.birth_date);
        apply(&mut user.active, patch.active);

        self.db
            .run(async {
                let sql = format!(
                    r#"
                    UPDATE users
                    SET name = $3, email = $4, password_hash = $5, role = $6, phone = $7,
                        address = $8, birth_date = $9, active = $10, version = version + 1
                    WHERE id = $1 AND version = $2
                    RETURNING {USER_COLUMNS}
                    "#
                );
                sqlx::query_as::<_, User>(&sql)
                    .bind(id)
                    .bind(version)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.role)
                    .bind(&user.phone)
                    .bind(&user.address)
                    .bind(user.birth_date)
                    .bind(user.active)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::EditConflict)
            })
            .await
    }

    /// Resolves e-mail + password to an active account.
    ///
    /// Unknown e-mail, wrong password and deactivated accounts all fail the
    /// same way.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, DbError> {
        let user = match self.get_by_email(email).await {
            Ok(user) => user,
            Err(DbError::NoSuchUser) => return Err(DbError::InvalidCredentials),
            Err(e) => return Err(e),
        };
        if !user.active || !verify_password(password, &user.password_hash).await? {
            return Err(DbError::InvalidCredentials);
        }
        Ok(user)
    }

    /// True iff `viewer_id` may see the academic record of `student_id`.
    ///
    /// Administrators, the student themselves, teachers of any journal the
    /// student belongs to and linked parents qualify.
    pub async fn is_teacher_or_parent_of_student(
        &self,
        student_id: i64,
        viewer_id: i64,
    ) -> Result<bool, DbError> {
        self.db
            .run(async {
                let allowed = sqlx::query_scalar::<_, bool>(
                    r#"
                    SELECT
                        EXISTS (
                            SELECT 1 FROM users v
                            WHERE v.id = $2 AND (v.role = 'administrator' OR v.id = $1)
                        )
                        OR EXISTS (
                            SELECT 1 FROM users_journals uj
                            JOIN journals j ON j.id = uj.journal_id
                            WHERE uj.user_id = $1 AND j.teacher_id = $2
                        )
                        OR EXISTS (
                            SELECT 1 FROM parents_children pc
                            WHERE pc.parent_id = $2 AND pc.child_id = $1
                        )
                    "#,
                )
                .bind(student_id)
                .bind(viewer_id)
                .fetch_one(self.db.pool())
                .await?;
                Ok(allowed)
            })
            .await
    }

    /// Links a parent account to a student. Repeating a link is a no-op.
    pub async fn link_parent(&self, parent_id: i64, child_id: i64) -> Result<(), DbError> {
        let parent = self.get(parent_id).await?;
        if parent.role != Role::Parent {
            return Err(DbError::NotAParent);
        }
        self.get_student(child_id).await?;

        self.db
            .run(async {
                sqlx::query(
                    "INSERT INTO parents_children (parent_id, child_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(parent_id)
                .bind(child_id)
                .execute(self.db.pool())
                .await?;
                Ok(())
            })
            .await
    }

    pub async fn list_children(&self, parent_id: i64) -> Result<Vec<User>, DbError> {
        self.db
            .run(async {
                let sql = format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE id IN \
                     (SELECT child_id FROM parents_children WHERE parent_id = $1) ORDER BY name"
                );
                let children = sqlx::query_as::<_, User>(&sql)
                    .bind(parent_id)
                    .fetch_all(self.db.pool())
                    .await?;
                Ok(children)
            })
            .await
    }
}
