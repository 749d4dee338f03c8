use tracing::error;

use crate::{config::DEFAULT_BCRYPT_COST, error::AppError};

/// Salted bcrypt with a tunable work factor. The encoded output carries the
/// salt and cost, so verification needs nothing else.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, plain: &str) -> Result<String, AppError> {
        bcrypt::hash(plain, self.cost).map_err(|e| {
            error!(error = %e, "bcrypt hash error");
            AppError::Hashing(e.to_string())
        })
    }

    /// `Ok(false)` on mismatch; `Err` only when `hash` is not a bcrypt hash.
    pub fn verify(&self, plain: &str, hash: &str) -> Result<bool, AppError> {
        bcrypt::verify(plain, hash).map_err(|e| {
            error!(error = %e, "bcrypt verify error");
            AppError::Hashing(e.to_string())
        })
    }

    /// Runs [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, plain: String) -> Result<String, AppError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| AppError::Hashing(format!("hash task: {e}")))?
    }

    /// Runs [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(&self, plain: String, hash: String) -> Result<bool, AppError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
            .await
            .map_err(|e| AppError::Hashing(format!("verify task: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = fast().hash(password).expect("hashing should succeed");
        assert!(fast().verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = fast().hash("correct-horse-battery-staple").expect("hash");
        assert!(!fast().verify("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = fast().hash("repeat-me").unwrap();
        let b = fast().hash("repeat-me").unwrap();
        assert_ne!(a, b);
        assert!(fast().verify("repeat-me", &a).unwrap());
        assert!(fast().verify("repeat-me", &b).unwrap());
        assert!(!a.contains("repeat-me"));
    }

    #[test]
    fn default_cost_is_embedded_in_output() {
        let hash = PasswordHasher::default().hash("pw").unwrap();
        assert!(hash.starts_with("$2b$10$"), "{hash}");
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = fast().verify("anything", "not-a-valid-hash").unwrap_err();
        assert!(matches!(err, AppError::Hashing(_)));
    }

    #[tokio::test]
    async fn blocking_variants_agree() {
        let hash = fast().hash_blocking("off-thread".into()).await.unwrap();
        assert!(fast()
            .verify_blocking("off-thread".into(), hash.clone())
            .await
            .unwrap());
        assert!(!fast().verify_blocking("other".into(), hash).await.unwrap());
    }
}
