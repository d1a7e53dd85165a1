use crate::error::DbError;
use std::future::Future;
use std::time::Duration;

/// The bound placed on every database call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Duration);

impl Deadline {
    pub const DEFAULT: Duration = Duration::from_secs(3);

    pub fn new(timeout: Duration) -> Self {
        Self(timeout)
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Runs `fut` to completion or fails with `DbError::Timeout`.
    ///
    /// On expiry the future is dropped: pooled connections go back to the
    /// pool and an open transaction is rolled back.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        match tokio::time::timeout(self.0, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.0, "Database call exceeded its deadline.");
                Err(DbError::Timeout(self.0))
            }
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let deadline = Deadline::new(Duration::from_millis(200));
        let value = deadline.run(async { Ok::<_, DbError>(42) }).await.unwrap();
        assert_eq!(value, 42);

        let err = deadline
            .run(async { Err::<(), _>(DbError::NoSuchUser) })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NoSuchUser));
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let deadline = Deadline::new(Duration::from_millis(10));
        let err = deadline
            .run(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, DbError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Timeout(d) if d == Duration::from_millis(10)));
    }

    #[test]
    fn default_is_three_seconds() {
        assert_eq!(Deadline::default().duration(), Duration::from_secs(3));
    }
}
