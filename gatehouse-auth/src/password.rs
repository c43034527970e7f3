//! One-way password hashing

use crate::error::{AuthError, AuthResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Hash and verify secrets
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> AuthResult<String>;

    /// False for a wrong secret or an unparseable stored hash
    fn verify(&self, secret: &str, hash: &str) -> bool;
}

/// Argon2id hasher with PHC-formatted output
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl Argon2Hasher {
    /// Minimum-cost parameters, for tests only
    pub fn low_cost() -> Self {
        let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap_or_default();
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::Hashing)
    }

    fn verify(&self, secret: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = Argon2Hasher::low_cost();
        let hash = hasher.hash("password123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("password123", &hash));
        assert!(!hasher.verify("password124", &hash));
    }

    #[test]
    fn same_secret_gets_different_salts() {
        let hasher = Argon2Hasher::low_cost();
        assert_ne!(hasher.hash("s3cret!!").unwrap(), hasher.hash("s3cret!!").unwrap());
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!Argon2Hasher::low_cost().verify("anything", "not-a-phc-string"));
    }
}
