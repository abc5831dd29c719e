//! services/api/src/services/users.rs
//!
//! Registration, lookup, update and removal of buyer and admin accounts.

use marketplace_core::{
    authorize, list_scope, Action, DatabaseService, ListScope, NewUser, Page, PortError,
    Principal, Resource, Role, ServiceError, Target, User, UserChanges,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{store_err, EntityCache};
use crate::auth::{normalize_email, validate_email, PasswordService};

/// Input for `UserService::register`. The password is plaintext and only lives
/// until it is hashed.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub delivery_address: String,
    pub role: Role,
    pub avatar: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<dyn DatabaseService>,
    cache: EntityCache<User>,
    passwords: PasswordService,
}

impl UserService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        cache: EntityCache<User>,
        passwords: PasswordService,
    ) -> Self {
        Self { db, cache, passwords }
    }

    pub async fn register(&self, input: RegisterUser) -> Result<User, ServiceError> {
        let email = normalize_email(&input.email);
        if !validate_email(&email) {
            return Err(ServiceError::InvalidRequest("email is not a valid address".to_string()));
        }

        match self.db.find_user_by_email(&email).await {
            Err(PortError::NotFound(_)) => {}
            Ok(_) => return Err(ServiceError::EmailExists),
            Err(e) => {
                warn!(error = %e, "email lookup failed during registration");
                return Err(ServiceError::EmailExists);
            }
        }

        let password_hash = self.passwords.hash(&input.password).await?;
        let user = self
            .db
            .create_user(NewUser {
                email,
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                delivery_address: input.delivery_address,
                role: input.role,
                avatar: input.avatar,
            })
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => ServiceError::EmailExists,
                other => ServiceError::Port(other),
            })?;

        self.cache.set(user.user_id, &user).await;
        info!(user_id = %user.user_id, "registered user");
        Ok(user)
    }

    pub async fn find_by_id_cached(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.cache
            .find_through(user_id, "User", || self.db.find_user_by_id(user_id))
            .await
    }

    /// Lists the accounts `principal` may see. A plain user sees only their own.
    pub async fn list(&self, principal: &Principal, page: Page) -> Result<Vec<User>, ServiceError> {
        match list_scope(principal, Resource::User) {
            ListScope::All => Ok(self.db.find_all_users(page).await?),
            ListScope::OwnedByUser(user_id) if page.offset == 0 => {
                Ok(vec![self.find_by_id_cached(user_id).await?])
            }
            _ => Ok(Vec::new()),
        }
    }

    pub async fn update(
        &self,
        principal: &Principal,
        user_id: Uuid,
        mut changes: UserChanges,
    ) -> Result<User, ServiceError> {
        let mut user = self.db.find_user_by_id(user_id).await.map_err(store_err("User"))?;
        authorize(principal, Action::Update(Resource::User), Target::user(&user))?;
        if changes.role.is_some() && !principal.is_admin() {
            return Err(ServiceError::Forbidden);
        }
        if let Some(email) = changes.email.take() {
            let email = normalize_email(&email);
            if !validate_email(&email) {
                return Err(ServiceError::InvalidRequest(
                    "email is not a valid address".to_string(),
                ));
            }
            changes.email = Some(email);
        }

        user.apply(changes);
        let user = self.db.update_user_by_id(&user).await.map_err(|e| match e {
            PortError::Conflict(_) => ServiceError::EmailExists,
            other => store_err("User")(other),
        })?;
        self.cache.set(user.user_id, &user).await;
        Ok(user)
    }

    pub async fn delete(&self, principal: &Principal, user_id: Uuid) -> Result<(), ServiceError> {
        authorize(
            principal,
            Action::Delete(Resource::User),
            Target { user_id: Some(user_id), brand_id: None },
        )?;
        self.db.delete_user_by_id(user_id).await.map_err(store_err("User"))?;
        self.cache.delete(user_id).await;
        info!(user_id = %user_id, "deleted user");
        Ok(())
    }

    /// Makes sure an admin account exists for `email`. Safe to run on every start.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        let email = normalize_email(email);
        match self.db.find_user_by_email(&email).await {
            Ok(creds) if creds.user.role == Role::Admin => Ok(creds.user),
            Ok(mut creds) => {
                creds.user.role = Role::Admin;
                let user = self.db.update_user_by_id(&creds.user).await?;
                self.cache.set(user.user_id, &user).await;
                info!(user_id = %user.user_id, "promoted existing account to admin");
                Ok(user)
            }
            Err(PortError::NotFound(_)) => {
                let user = self
                    .register(RegisterUser {
                        email,
                        password: password.to_string(),
                        first_name: "Admin".to_string(),
                        last_name: "Admin".to_string(),
                        delivery_address: String::new(),
                        role: Role::Admin,
                        avatar: None,
                    })
                    .await?;
                info!(user_id = %user.user_id, "created bootstrap admin");
                Ok(user)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryCache, MemoryDb};
    use std::time::Duration;

    fn service() -> UserService {
        let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
        let cache = EntityCache::new(Arc::new(MemoryCache::new()), "user", Duration::from_secs(60));
        UserService::new(db, cache, PasswordService::with_params(8, 1, 1).unwrap())
    }

    fn input(email: &str) -> RegisterUser {
        RegisterUser {
            email: email.to_string(),
            password: "pw12345".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            delivery_address: "X".to_string(),
            role: Role::User,
            avatar: None,
        }
    }

    #[tokio::test]
    async fn register_normalizes_and_rejects_duplicates() {
        let users = service();
        let user = users.register(input("  A@B.C ")).await.unwrap();
        assert_eq!(user.email, "a@b.c");

        let err = users.register(input("a@b.c")).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmailExists));
    }

    #[tokio::test]
    async fn update_is_visible_through_the_cache() {
        let users = service();
        let user = users.register(input("a@b.c")).await.unwrap();
        let principal = user.principal();

        users.find_by_id_cached(user.user_id).await.unwrap();
        users
            .update(
                &principal,
                user.user_id,
                UserChanges {
                    first_name: Some("Z".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(users.find_by_id_cached(user.user_id).await.unwrap().first_name, "Z");
    }

    #[tokio::test]
    async fn users_cannot_change_roles_or_other_accounts() {
        let users = service();
        let me = users.register(input("me@b.c")).await.unwrap();
        let other = users.register(input("other@b.c")).await.unwrap();

        let promote = UserChanges {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert!(matches!(
            users.update(&me.principal(), me.user_id, promote).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            users.update(&me.principal(), other.user_id, UserChanges::default()).await,
            Err(ServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn delete_then_find_is_not_found() {
        let users = service();
        let user = users.register(input("a@b.c")).await.unwrap();
        users.find_by_id_cached(user.user_id).await.unwrap();

        users.delete(&user.principal(), user.user_id).await.unwrap();
        let err = users.find_by_id_cached(user.user_id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn plain_users_list_only_themselves() {
        let users = service();
        let me = users.register(input("me@b.c")).await.unwrap();
        users.register(input("other@b.c")).await.unwrap();

        let listed = users.list(&me.principal(), Page::default()).await.unwrap();
        assert_eq!(listed, vec![me.clone()]);
        let second = users
            .list(&me.principal(), Page::new(Some(10), Some(2)).unwrap())
            .await
            .unwrap();
        assert!(second.is_empty());

        let admin = Principal::Admin { user_id: Uuid::new_v4() };
        assert_eq!(users.list(&admin, Page::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bootstrap_admin_is_idempotent() {
        let users = service();
        let first = users.bootstrap_admin("root@x.io", "pw12345").await.unwrap();
        let second = users.bootstrap_admin("ROOT@x.io", "pw12345").await.unwrap();
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(second.role, Role::Admin);
    }
}
