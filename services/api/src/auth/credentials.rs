//! services/api/src/auth/credentials.rs
//!
//! Password hashing and email handling for both users and brands.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use marketplace_core::ServiceError;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::error;

/// Longest email address accepted at registration.
pub const MAX_EMAIL_LENGTH: usize = 60;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern compiles")
});

/// Lowercases and trims an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A conservative subset of RFC 5322 addresses: dot-atom local part, dotted host name.
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= MAX_EMAIL_LENGTH && EMAIL_PATTERN.is_match(email)
}

//=========================================================================================
// Password Hashing
//=========================================================================================

/// Hashes and verifies passwords with Argon2id.
///
/// Both operations are CPU-bound on purpose, so they run on the blocking pool and
/// never on a request's async worker.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    dummy_hash: Arc<str>,
}

impl PasswordService {
    /// Uses the Argon2 default cost parameters.
    pub fn new() -> Result<Self, ServiceError> {
        Self::from_argon2(Argon2::default())
    }

    /// Custom cost parameters: memory in KiB, iterations and lanes.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, ServiceError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| ServiceError::Internal(format!("invalid argon2 params: {}", e)))?;
        Self::from_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn from_argon2(argon2: Argon2<'static>) -> Result<Self, ServiceError> {
        // Verified against when the email is unknown so login latency does not
        // reveal whether an account exists.
        let dummy_hash = hash_blocking(&argon2, "not-a-real-password")?;
        Ok(Self {
            argon2,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub async fn hash(&self, plaintext: &str) -> Result<String, ServiceError> {
        let argon2 = self.argon2.clone();
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || hash_blocking(&argon2, &plaintext))
            .await
            .map_err(|e| ServiceError::Internal(format!("hashing task failed: {}", e)))?
    }

    /// Returns `Ok(false)` for a wrong password; errors only on a corrupt stored hash.
    pub async fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, ServiceError> {
        let argon2 = self.argon2.clone();
        let plaintext = plaintext.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash).map_err(|e| {
                error!("Failed to parse password hash: {:?}", e);
                ServiceError::Internal("stored password hash is unreadable".to_string())
            })?;
            Ok(argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("verify task failed: {}", e)))?
    }

    /// Spends the same work as a real verification and discards the result.
    pub async fn verify_dummy(&self, plaintext: &str) {
        let dummy = self.dummy_hash.clone();
        let _ = self.verify(plaintext, &dummy).await;
    }
}

fn hash_blocking(argon2: &Argon2<'_>, plaintext: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ServiceError::Internal("failed to hash password".to_string())
        })
}
