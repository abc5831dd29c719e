//! services/api/src/services/auth.rs
//!
//! The session protocol: login creates a server-side session and a token pair
//! bound to it, refresh re-derives the principal from the session, logout deletes
//! the session. An access token is only honoured while its session exists.

use marketplace_core::{
    AuthSession, DatabaseService, PortError, Principal, PrincipalKind, ServiceError, SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{normalize_email, PasswordService, TokenPair, TokenService};

/// The authenticated caller, attached to every protected request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub principal: Principal,
    pub session_id: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub principal_id: Uuid,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<dyn DatabaseService>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenService,
    passwords: PasswordService,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        sessions: Arc<dyn SessionStore>,
        tokens: TokenService,
        passwords: PasswordService,
        session_ttl: Duration,
    ) -> Self {
        Self {
            db,
            sessions,
            tokens,
            passwords,
            session_ttl,
        }
    }

    pub async fn login_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, ServiceError> {
        let email = normalize_email(email);
        let creds = match self.db.find_user_by_email(&email).await {
            Ok(creds) => creds,
            Err(PortError::NotFound(_)) => {
                self.passwords.verify_dummy(password).await;
                return Err(ServiceError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };
        if !self.passwords.verify(password, &creds.password_hash).await? {
            return Err(ServiceError::InvalidCredentials);
        }

        self.start_session(creds.user.principal(), &creds.user.email).await
    }

    pub async fn login_brand(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, ServiceError> {
        let email = normalize_email(email);
        let creds = match self.db.find_brand_by_email(&email).await {
            Ok(creds) => creds,
            Err(PortError::NotFound(_)) => {
                self.passwords.verify_dummy(password).await;
                return Err(ServiceError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };
        if !self.passwords.verify(password, &creds.password_hash).await? {
            return Err(ServiceError::InvalidCredentials);
        }

        self.start_session(creds.brand.principal(), &creds.brand.email).await
    }

    async fn start_session(
        &self,
        principal: Principal,
        email: &str,
    ) -> Result<LoginOutcome, ServiceError> {
        let session = self
            .sessions
            .create_session(principal.id(), principal.kind(), self.session_ttl)
            .await?;
        let tokens = self.generate_token_pair(&principal, email, &session.session_id)?;
        info!(principal_id = %principal.id(), kind = ?principal.kind(), "login succeeded");
        Ok(LoginOutcome {
            principal_id: principal.id(),
            tokens,
        })
    }

    pub fn generate_token_pair(
        &self,
        principal: &Principal,
        email: &str,
        session_id: &str,
    ) -> Result<TokenPair, ServiceError> {
        self.tokens.issue(principal, email, session_id)
    }

    /// Issues a new pair for the session named by `refresh_token`.
    ///
    /// The principal and email are reloaded from the store, so a role change is
    /// picked up here.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let claims = self.tokens.parse_refresh(refresh_token)?;
        let session = self.session(&claims.session_id).await?;

        let (principal, email) = match session.principal_kind {
            PrincipalKind::User => {
                let user = self
                    .db
                    .find_user_by_id(session.principal_id)
                    .await
                    .map_err(account_gone)?;
                (user.principal(), user.email)
            }
            PrincipalKind::Brand => {
                let brand = self
                    .db
                    .find_brand_by_id(session.principal_id)
                    .await
                    .map_err(account_gone)?;
                (brand.principal(), brand.email)
            }
        };

        debug!(session_id = %session.session_id, "refreshing tokens");
        self.tokens.reissue(&principal, &email, &claims)
    }

    /// Deletes the session. Tokens bound to it stop working immediately.
    pub async fn logout(&self, session_id: &str) -> Result<(), ServiceError> {
        self.sessions.delete_session(session_id).await?;
        info!(session_id = %session_id, "logged out");
        Ok(())
    }

    /// Resolves a bearer access token into the caller's context.
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthContext, ServiceError> {
        let claims = self.tokens.parse_access(access_token)?;
        let principal = claims.principal()?;
        let session = self.session(&claims.session_id).await?;
        if session.principal_id != principal.id() || session.principal_kind != principal.kind() {
            return Err(ServiceError::InvalidToken);
        }

        Ok(AuthContext {
            principal,
            session_id: claims.session_id,
            email: claims.email,
        })
    }

    async fn session(&self, session_id: &str) -> Result<AuthSession, ServiceError> {
        self.sessions.get_session(session_id).await.map_err(|e| match e {
            PortError::NotFound(_) => ServiceError::SessionNotFound,
            other => ServiceError::Port(other),
        })
    }
}

/// A session whose account was deleted is treated like a revoked session.
fn account_gone(e: PortError) -> ServiceError {
    match e {
        PortError::NotFound(_) => ServiceError::SessionNotFound,
        other => ServiceError::Port(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryCache, MemoryDb, MemorySessionStore};
    use crate::services::{BrandService, EntityCache, RegisterBrand, RegisterUser, UserService};
    use marketplace_core::{Role, UserChanges};

    struct Fixture {
        auth: AuthService,
        users: UserService,
        brands: BrandService,
        tokens: TokenService,
    }

    fn fixture() -> Fixture {
        let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
        let cache = Arc::new(MemoryCache::new());
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let passwords = PasswordService::with_params(8, 1, 1).unwrap();
        let tokens = TokenService::new(
            b"test-secret-that-is-long-enough!",
            Duration::from_secs(900),
            Duration::from_secs(86_400),
        );
        let ttl = Duration::from_secs(60);

        Fixture {
            auth: AuthService::new(db.clone(), sessions, tokens.clone(), passwords.clone(), ttl),
            users: UserService::new(
                db.clone(),
                EntityCache::new(cache.clone(), "user", ttl),
                passwords.clone(),
            ),
            brands: BrandService::new(db, EntityCache::new(cache, "brand", ttl), passwords),
            tokens,
        }
    }

    async fn register(f: &Fixture) -> marketplace_core::User {
        f.users
            .register(RegisterUser {
                email: "a@b.c".to_string(),
                password: "pw12345".to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                delivery_address: "X".to_string(),
                role: Role::User,
                avatar: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn login_then_authenticate() {
        let f = fixture();
        let user = register(&f).await;

        let outcome = f.auth.login_user("A@B.C", "pw12345").await.unwrap();
        assert_eq!(outcome.principal_id, user.user_id);

        let ctx = f.auth.authenticate(&outcome.tokens.access).await.unwrap();
        assert_eq!(ctx.principal, Principal::User { user_id: user.user_id });
        assert_eq!(ctx.email, "a@b.c");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let f = fixture();
        register(&f).await;

        let wrong = f.auth.login_user("a@b.c", "nope").await.unwrap_err();
        let unknown = f.auth.login_user("who@b.c", "pw12345").await.unwrap_err();
        assert!(matches!(wrong, ServiceError::InvalidCredentials));
        assert!(matches!(unknown, ServiceError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn logout_revokes_the_access_token() {
        let f = fixture();
        register(&f).await;
        let outcome = f.auth.login_user("a@b.c", "pw12345").await.unwrap();
        let ctx = f.auth.authenticate(&outcome.tokens.access).await.unwrap();

        f.auth.logout(&ctx.session_id).await.unwrap();
        assert!(matches!(
            f.auth.authenticate(&outcome.tokens.access).await,
            Err(ServiceError::SessionNotFound)
        ));
        assert!(f.auth.refresh(&outcome.tokens.refresh).await.is_err());
    }

    #[tokio::test]
    async fn refresh_picks_up_a_role_change() {
        let f = fixture();
        let user = register(&f).await;
        let outcome = f.auth.login_user("a@b.c", "pw12345").await.unwrap();

        let admin = Principal::Admin { user_id: Uuid::new_v4() };
        f.users
            .update(
                &admin,
                user.user_id,
                UserChanges {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let pair = f.auth.refresh(&outcome.tokens.refresh).await.unwrap();
        let claims = f.tokens.parse_access(&pair.access).unwrap();
        assert_eq!(claims.role, Some(Role::Admin));
        let old = f.tokens.parse_access(&outcome.tokens.access).unwrap();
        assert_eq!(claims.session_id, old.session_id);
    }

    #[tokio::test]
    async fn brands_log_in_as_brand_principals() {
        let f = fixture();
        let admin = Principal::Admin { user_id: Uuid::new_v4() };
        let brand = f
            .brands
            .register(
                &admin,
                RegisterBrand {
                    brand_name: "Acme".to_string(),
                    email: "shop@acme.test".to_string(),
                    password: "pw12345".to_string(),
                    pickup_address: "P".to_string(),
                    logo: None,
                },
            )
            .await
            .unwrap();

        let outcome = f.auth.login_brand("shop@acme.test", "pw12345").await.unwrap();
        let ctx = f.auth.authenticate(&outcome.tokens.access).await.unwrap();
        assert_eq!(ctx.principal, Principal::Brand { brand_id: brand.brand_id });

        // A brand's credentials do not open a user session.
        assert!(f.auth.login_user("shop@acme.test", "pw12345").await.is_err());
    }

    #[tokio::test]
    async fn forged_principal_does_not_match_the_session() {
        let f = fixture();
        register(&f).await;
        let outcome = f.auth.login_user("a@b.c", "pw12345").await.unwrap();
        let session_id = f.tokens.parse_access(&outcome.tokens.access).unwrap().session_id;

        let forged = f
            .tokens
            .issue(&Principal::User { user_id: Uuid::new_v4() }, "a@b.c", &session_id)
            .unwrap();
        assert!(matches!(
            f.auth.authenticate(&forged.access).await,
            Err(ServiceError::InvalidToken)
        ));
    }
}
