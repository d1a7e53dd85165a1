//! Bearer tokens for sessions.
//!
//! A token is 16 random bytes rendered as unpadded RFC 4648 base32, which is
//! always 26 characters. Only the SHA-256 of the text form is persisted.

use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

pub const TOKEN_LENGTH: usize = 26;

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub plaintext: String,
    pub hash: Vec<u8>,
}

impl SessionToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        let plaintext = BASE32_NOPAD.encode(&bytes);
        let hash = hash_token(&plaintext);
        Self { plaintext, hash }
    }
}

pub fn hash_token(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Cheap syntactic check done before any database lookup.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH
        && token
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_26_base32_chars() {
        let token = SessionToken::generate();
        assert_eq!(token.plaintext.len(), TOKEN_LENGTH);
        assert!(is_well_formed(&token.plaintext));
    }

    #[test]
    fn stored_hash_is_sha256_of_plaintext() {
        let token = SessionToken::generate();
        assert_eq!(token.hash, hash_token(&token.plaintext));
        assert_eq!(token.hash.len(), 32);
    }

    #[test]
    fn tokens_differ() {
        assert_ne!(SessionToken::generate().plaintext, SessionToken::generate().plaintext);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed("abcdefghijklmnopqrstuvwxyz"));
        assert!(!is_well_formed("ABCDEFGHIJKLMNOPQRSTUVWXY1"));
        assert!(is_well_formed("ABCDEFGHIJKLMNOPQRSTUVWXY2"));
    }
}
