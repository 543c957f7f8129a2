/// Argon2id password hashing
///
/// Hashing runs on the blocking pool so request tasks only suspend on it.
use crate::error::{IcuError, IcuResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;

lazy_static! {
    /// Hash verified against when the identity is unknown, so a failed lookup
    /// costs the same as a failed comparison.
    static ref DUMMY_HASH: String = hash_blocking("not-a-real-password").unwrap_or_default();
}

fn hash_blocking(password: &str) -> IcuResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| IcuError::Internal(format!("Password hashing failed: {}", e)))
}

fn verify_blocking(password: &str, hash: &str) -> IcuResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| IcuError::Internal(format!("Stored password hash is invalid: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Hash a password into a PHC string
pub async fn hash_password(password: &str) -> IcuResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| IcuError::Internal(format!("Hashing task failed: {}", e)))?
}

/// Compare a candidate against a stored hash
pub async fn verify_password(password: &str, hash: &str) -> IcuResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || verify_blocking(&password, &hash))
        .await
        .map_err(|e| IcuError::Internal(format!("Verification task failed: {}", e)))?
}

/// Burn one verification for an unknown identity; always false
pub async fn verify_dummy(password: &str) -> bool {
    if DUMMY_HASH.is_empty() {
        return false;
    }
    let _ = verify_password(password, &DUMMY_HASH).await;
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("Jane Doe").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("Jane Doe"));

        assert!(verify_password("Jane Doe", &hash).await.unwrap());
        assert!(!verify_password("jane doe", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_salts_differ() {
        let a = hash_password("same").await.unwrap();
        let b = hash_password("same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_dummy_never_matches() {
        assert!(!verify_dummy("not-a-real-password").await);
    }
}
