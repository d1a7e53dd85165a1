use super::Db;
use super::users::{User, UserRepository};
use crate::error::DbError;
use crate::token::{SessionToken, hash_token};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;

const SESSION_COLUMNS: &str = "id, user_id, expires, login_ip, login_browser, logged_in, last_seen";

/// Represents a row from the `sessions` table. The token hash never leaves the database.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub expires: DateTime<Utc>,
    pub login_ip: String,
    pub login_browser: String,
    pub logged_in: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A freshly issued session together with the only copy of its bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct NewSession {
    pub session: Session,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct SessionRepository {
    db: Db,
    users: UserRepository,
}

impl SessionRepository {
    pub fn new(db: Db, users: UserRepository) -> Self {
        Self { db, users }
    }

    pub async fn create(
        &self,
        user_id: i64,
        login_ip: &str,
        login_browser: &str,
        ttl: Duration,
    ) -> Result<NewSession, DbError> {
        let token = SessionToken::generate();
        let expires = Utc::now() + ttl;

        let session = self
            .db
            .run(async {
                let sql = format!(
                    r#"
                    INSERT INTO sessions (token_hash, user_id, expires, login_ip, login_browser)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {SESSION_COLUMNS}
                    "#
                );
                let session = sqlx::query_as::<_, Session>(&sql)
                    .bind(&token.hash)
                    .bind(user_id)
                    .bind(expires)
                    .bind(login_ip)
                    .bind(login_browser)
                    .fetch_one(self.db.pool())
                    .await?;
                Ok(session)
            })
            .await?;

        tracing::info!(session_id = session.id, user_id, "Session opened.");
        Ok(NewSession { session, token: token.plaintext })
    }

    /// Resolves a bearer token to its unexpired session and active user,
    /// refreshing `last_seen`.
    pub async fn authenticate(&self, token: &str) -> Result<(Session, User), DbError> {
        let hash = hash_token(token);
        let session = self
            .db
            .run(async {
                let sql = format!(
                    r#"
                    UPDATE sessions SET last_seen = NOW()
                    WHERE token_hash = $1 AND expires > NOW()
                    RETURNING {SESSION_COLUMNS}
                    "#
                );
                sqlx::query_as::<_, Session>(&sql)
                    .bind(&hash)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DbError::NoSuchSession)
            })
            .await?;

        let user = match self.users.get(session.user_id).await {
            Ok(user) if user.active => user,
            Ok(_) | Err(DbError::NoSuchUser) => return Err(DbError::NoSuchSession),
            Err(e) => return Err(e),
        };
        Ok((session, user))
    }

    /// Unexpired sessions of a user, most recently used first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Session>, DbError> {
        self.db
            .run(async {
                let sql = format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions \
                     WHERE user_id = $1 AND expires > NOW() ORDER BY last_seen DESC"
                );
                let sessions = sqlx::query_as::<_, Session>(&sql)
                    .bind(user_id)
                    .fetch_all(self.db.pool())
                    .await?;
                Ok(sessions)
            })
            .await
    }

    /// Deletes one of `user_id`'s sessions.
    pub async fn delete(&self, id: i64, user_id: i64) -> Result<(), DbError> {
        let deleted = self
            .db
            .run(async {
                let result = sqlx::query("DELETE FROM sessions WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(self.db.pool())
                    .await?;
                Ok(result.rows_affected())
            })
            .await?;
        if deleted == 0 {
            return Err(DbError::NoSuchSession);
        }
        Ok(())
    }

    /// Moves the expiry of a session to now. The row is kept for the login history.
    pub async fn expire(&self, id: i64) -> Result<(), DbError> {
        let expired = self
            .db
            .run(async {
                let result = sqlx::query(
                    "UPDATE sessions SET expires = NOW() WHERE id = $1 AND expires > NOW()",
                )
                .bind(id)
                .execute(self.db.pool())
                .await?;
                Ok(result.rows_affected())
            })
            .await?;
        if expired == 0 {
            return Err(DbError::NoSuchSession);
        }
        Ok(())
    }
}
