//! Password hashing with argon2id
//!
//! Hashes are PHC strings carrying their own salt and cost parameters, so
//! changing the configured cost only affects new hashes.

use crate::config::PasswordHashConfig;
use crate::errors::{AppError, Result};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};

/// Salted one-way hashing of account passwords
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    /// Hash verified against when the account does not exist, so unknown
    /// emails cost the same as wrong passwords
    decoy: String,
}

impl CredentialHasher {
    pub fn new(config: &PasswordHashConfig) -> Result<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| AppError::Configuration {
                message: format!("invalid argon2 parameters: {}", e),
            })?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy = hash_with(&argon2, "papervault-decoy-password")?;
        Ok(Self { argon2, decoy })
    }

    /// Hash a password with a fresh random salt, on the blocking pool
    pub async fn hash(&self, password: &str) -> Result<String> {
        let argon2 = self.argon2.clone();
        let password = password.to_string();
        blocking(move || hash_with(&argon2, &password)).await?
    }

    /// Verify a password against a stored PHC hash. The digest comparison
    /// inside argon2 is constant-time.
    pub async fn verify(&self, stored_hash: &str, password: &str) -> Result<bool> {
        let argon2 = self.argon2.clone();
        let stored_hash = stored_hash.to_string();
        let password = password.to_string();
        blocking(move || verify_with(&argon2, &stored_hash, &password)).await
    }

    /// Burn the same work as a real verification and fail
    pub async fn verify_decoy(&self, password: &str) -> Result<bool> {
        self.verify(&self.decoy, password).await?;
        Ok(false)
    }
}

/// argon2 is CPU and memory bound; keep it off the async workers
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal {
            message: format!("password hashing task failed: {}", e),
        })
}

fn hash_with(argon2: &Argon2<'static>, password: &str) -> Result<String> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::Internal {
        message: format!("salt encoding failed: {}", e),
    })?;

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("password hashing failed: {}", e),
        })
}

fn verify_with(argon2: &Argon2<'static>, stored_hash: &str, password: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
            false
        }
    }
}
