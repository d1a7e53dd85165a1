//! bcrypt hashing, moved off the async workers.

use crate::error::DbError;

/// Work factor for stored passwords.
pub const BCRYPT_COST: u32 = 12;

pub async fn hash_password(plaintext: &str) -> Result<String, DbError> {
    hash_with_cost(plaintext, BCRYPT_COST).await
}

async fn hash_with_cost(plaintext: &str, cost: u32) -> Result<String, DbError> {
    let plaintext = plaintext.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
        .await
        .map_err(|e| DbError::Hash(e.to_string()))?
        .map_err(|e| DbError::Hash(e.to_string()))
}

pub async fn verify_password(plaintext: &str, hash: &str) -> Result<bool, DbError> {
    let plaintext = plaintext.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash))
        .await
        .map_err(|e| DbError::Hash(e.to_string()))?
        .map_err(|e| DbError::Hash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verifies_only_the_original_password() {
        let hash = hash_with_cost("correct horse", 4).await.unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("battery staple", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "not-a-bcrypt-hash").await,
            Err(DbError::Hash(_))
        ));
    }
}
