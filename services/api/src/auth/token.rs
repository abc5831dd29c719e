//! services/api/src/auth/token.rs
//!
//! Issues and parses the HS256 access/refresh token pair bound to a login session.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use marketplace_core::{Principal, Role, ServiceError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Claims of the short-lived access token.
///
/// Users carry `user_id` and `role`; brands carry `brand_id` and no role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "seller_id")]
    pub brand_id: Option<Uuid>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    /// Decodes the typed principal. Any other claim combination is an invalid token.
    pub fn principal(&self) -> Result<Principal, ServiceError> {
        match (self.user_id, self.brand_id, self.role) {
            (Some(user_id), None, Some(role)) => Ok(Principal::for_user(user_id, role)),
            (None, Some(brand_id), None) => Ok(Principal::Brand { brand_id }),
            _ => Err(ServiceError::InvalidToken),
        }
    }
}

/// The refresh token only names the session; everything else is reloaded on refresh.
/// Unknown fields are rejected so an access token never passes as a refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    pub session_id: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Signs a fresh access + refresh pair for `principal` inside `session_id`.
    pub fn issue(
        &self,
        principal: &Principal,
        email: &str,
        session_id: &str,
    ) -> Result<TokenPair, ServiceError> {
        self.issue_at(principal, email, session_id, Utc::now().timestamp())
    }

    /// Issues the pair that replaces the one `previous` belongs to.
    ///
    /// Expiry has second resolution, so a refresh within the second of the previous
    /// issue is stamped one second later. Both new tokens then expire strictly after
    /// the ones they replace.
    pub fn reissue(
        &self,
        principal: &Principal,
        email: &str,
        previous: &RefreshClaims,
    ) -> Result<TokenPair, ServiceError> {
        let now = Utc::now().timestamp().max(previous.iat + 1);
        self.issue_at(principal, email, &previous.session_id, now)
    }

    fn issue_at(
        &self,
        principal: &Principal,
        email: &str,
        session_id: &str,
        now: i64,
    ) -> Result<TokenPair, ServiceError> {
        let access = AccessClaims {
            session_id: session_id.to_string(),
            user_id: principal.user_id(),
            brand_id: principal.brand_id(),
            email: email.to_string(),
            role: principal.role(),
            iat: now,
            exp: now + self.access_ttl.as_secs() as i64,
        };
        let refresh = RefreshClaims {
            session_id: session_id.to_string(),
            iat: now,
            exp: now + self.refresh_ttl.as_secs() as i64,
        };

        Ok(TokenPair {
            access: self.sign(&access)?,
            refresh: self.sign(&refresh)?,
        })
    }

    pub fn parse_access(&self, token: &str) -> Result<AccessClaims, ServiceError> {
        self.verify(token)
    }

    pub fn parse_refresh(&self, token: &str) -> Result<RefreshClaims, ServiceError> {
        self.verify(token)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("failed to sign token: {}", e)))
    }

    /// Every failure collapses into `InvalidToken`; the cause is only logged.
    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, ServiceError> {
        decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "rejected token");
                ServiceError::InvalidToken
            })
    }
}
