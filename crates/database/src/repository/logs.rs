//! The audit trail of administrative writes.

use super::Db;
use crate::error::DbError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub action: String,
    pub target: String,
    pub at: DateTime<Utc>,
}

/// One page of the audit trail plus the number of rows matching the search.
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub logs: Vec<LogEntry>,
    pub total: i64,
}

#[derive(Debug, FromRow)]
struct LogRow {
    #[sqlx(flatten)]
    entry: LogEntry,
    total: i64,
}

/// Builds an `ILIKE` pattern matching `search` literally anywhere in the text.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, Clone)]
pub struct LogRepository {
    db: Db,
}

impl LogRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// A copy whose calls run under `timeout` instead of the shared deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self { db: self.db.with_timeout(timeout) }
    }

    pub async fn record(&self, user_id: Option<i64>, action: &str, target: &str) -> Result<(), DbError> {
        self.db
            .run(async {
                sqlx::query("INSERT INTO logs (user_id, action, target) VALUES ($1, $2, $3)")
                    .bind(user_id)
                    .bind(action)
                    .bind(target)
                    .execute(self.db.pool())
                    .await?;
                Ok(())
            })
            .await
    }

    /// Like [`record`](Self::record), but a failure is only logged.
    pub async fn record_quietly(&self, user_id: Option<i64>, action: &str, target: &str) {
        if let Err(e) = self.record(user_id, action, target).await {
            warn!(action, target, error = ?e, "Failed to write audit log entry.");
        }
    }

    /// Newest entries first. `search` matches the actor name or the target,
    /// case-insensitively. `page` starts at 1.
    pub async fn list(&self, search: Option<&str>, page: u32, limit: u32) -> Result<LogPage, DbError> {
        let pattern = search.filter(|s| !s.is_empty()).map(like_pattern);
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);

        let rows = self
            .db
            .run(async {
                let rows = sqlx::query_as::<_, LogRow>(
                    r#"
                    SELECT l.id, l.user_id, u.name AS user_name, l.action, l.target, l.at,
                           COUNT(*) OVER () AS total
                    FROM logs l
                    LEFT JOIN users u ON u.id = l.user_id
                    WHERE $1::TEXT IS NULL OR u.name ILIKE $1 OR l.target ILIKE $1
                    ORDER BY l.at DESC, l.id DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(&pattern)
                .bind(i64::from(limit))
                .bind(offset)
                .fetch_all(self.db.pool())
                .await?;
                Ok(rows)
            })
            .await?;

        // A page past the end carries no window count.
        let total = match rows.first() {
            Some(row) => row.total,
            None if page > 1 => self.count(pattern.as_deref()).await?,
            None => 0,
        };
        Ok(LogPage { logs: rows.into_iter().map(|row| row.entry).collect(), total })
    }

    async fn count(&self, pattern: Option<&str>) -> Result<i64, DbError> {
        self.db
            .run(async {
                let total = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM logs l
                    LEFT JOIN users u ON u.id = l.user_id
                    WHERE $1::TEXT IS NULL OR u.name ILIKE $1 OR l.target ILIKE $1
                    "#,
                )
                .bind(pattern)
                .fetch_one(self.db.pool())
                .await?;
                Ok(total)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::Deadline;
    use configuration::DatabaseConfig;

    #[tokio::test]
    async fn timeout_overrides_leave_the_shared_repository_alone() {
        let pool = crate::connect_lazy(&DatabaseConfig::default()).unwrap();
        let logs = LogRepository::new(Db::new(pool, Deadline::new(Duration::from_secs(3))));

        let slow = logs.with_timeout(Duration::from_secs(10));
        assert_eq!(slow.db.deadline.duration(), Duration::from_secs(10));
        assert_eq!(logs.db.deadline.duration(), Duration::from_secs(3));
    }

    #[test]
    fn patterns_escape_wildcards() {
        assert_eq!(like_pattern("anna"), "%anna%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }
}
