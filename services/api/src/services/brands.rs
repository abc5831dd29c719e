//! services/api/src/services/brands.rs

use marketplace_core::{
    authorize, list_scope, Action, Brand, BrandChanges, DatabaseService, ListScope, NewBrand,
    Page, PortError, Principal, Resource, ServiceError, Target,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{store_err, EntityCache};
use crate::auth::{normalize_email, validate_email, PasswordService};

#[derive(Debug, Clone)]
pub struct RegisterBrand {
    pub brand_name: String,
    pub email: String,
    pub password: String,
    pub pickup_address: String,
    pub logo: Option<String>,
}

#[derive(Clone)]
pub struct BrandService {
    db: Arc<dyn DatabaseService>,
    cache: EntityCache<Brand>,
    passwords: PasswordService,
}

impl BrandService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        cache: EntityCache<Brand>,
        passwords: PasswordService,
    ) -> Self {
        Self { db, cache, passwords }
    }

    /// Creates a brand account. Only admins onboard brands.
    pub async fn register(
        &self,
        principal: &Principal,
        input: RegisterBrand,
    ) -> Result<Brand, ServiceError> {
        authorize(principal, Action::Create(Resource::Brand), Target::none())?;

        let email = normalize_email(&input.email);
        if !validate_email(&email) {
            return Err(ServiceError::InvalidRequest("email is not a valid address".to_string()));
        }
        match self.db.find_brand_by_email(&email).await {
            Err(PortError::NotFound(_)) => {}
            Ok(_) => return Err(ServiceError::EmailExists),
            Err(e) => {
                warn!(error = %e, "email lookup failed during brand registration");
                return Err(ServiceError::EmailExists);
            }
        }

        let password_hash = self.passwords.hash(&input.password).await?;
        let brand = self
            .db
            .create_brand(NewBrand {
                brand_name: input.brand_name,
                email,
                password_hash,
                pickup_address: input.pickup_address,
                logo: input.logo,
            })
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => ServiceError::EmailExists,
                other => ServiceError::Port(other),
            })?;

        self.cache.set(brand.brand_id, &brand).await;
        info!(brand_id = %brand.brand_id, "registered brand");
        Ok(brand)
    }

    pub async fn find_by_id_cached(&self, brand_id: Uuid) -> Result<Brand, ServiceError> {
        self.cache
            .find_through(brand_id, "Brand", || self.db.find_brand_by_id(brand_id))
            .await
    }

    /// Admins and users see every brand; a brand sees only itself.
    pub async fn list(
        &self,
        principal: &Principal,
        page: Page,
    ) -> Result<Vec<Brand>, ServiceError> {
        match list_scope(principal, Resource::Brand) {
            ListScope::All => Ok(self.db.find_all_brands(page).await?),
            ListScope::OwnedByBrand(brand_id) if page.offset == 0 => {
                Ok(vec![self.find_by_id_cached(brand_id).await?])
            }
            _ => Ok(Vec::new()),
        }
    }

    pub async fn update(
        &self,
        principal: &Principal,
        brand_id: Uuid,
        changes: BrandChanges,
    ) -> Result<Brand, ServiceError> {
        let mut brand = self.db.find_brand_by_id(brand_id).await.map_err(store_err("Brand"))?;
        authorize(principal, Action::Update(Resource::Brand), Target::brand(&brand))?;

        brand.apply(changes);
        let brand = self.db.update_brand_by_id(&brand).await.map_err(store_err("Brand"))?;
        self.cache.set(brand.brand_id, &brand).await;
        Ok(brand)
    }

    /// Refused with a conflict while products or orders still reference the brand.
    pub async fn delete(&self, principal: &Principal, brand_id: Uuid) -> Result<(), ServiceError> {
        authorize(
            principal,
            Action::Delete(Resource::Brand),
            Target { user_id: None, brand_id: Some(brand_id) },
        )?;
        self.db.delete_brand_by_id(brand_id).await.map_err(store_err("Brand"))?;
        self.cache.delete(brand_id).await;
        info!(brand_id = %brand_id, "deleted brand");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryCache, MemoryDb};
    use marketplace_core::ErrorKind;
    use std::time::Duration;

    fn service() -> BrandService {
        let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
        let cache = EntityCache::new(
            Arc::new(MemoryCache::new()),
            "brand",
            Duration::from_secs(60),
        );
        BrandService::new(db, cache, PasswordService::with_params(8, 1, 1).unwrap())
    }

    fn admin() -> Principal {
        Principal::Admin { user_id: Uuid::new_v4() }
    }

    fn input(email: &str) -> RegisterBrand {
        RegisterBrand {
            brand_name: "Acme".to_string(),
            email: email.to_string(),
            password: "pw12345".to_string(),
            pickup_address: "P".to_string(),
            logo: None,
        }
    }

    #[tokio::test]
    async fn only_admins_register_brands() {
        let brands = service();
        let user = Principal::User { user_id: Uuid::new_v4() };
        assert!(matches!(
            brands.register(&user, input("shop@acme.test")).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(brands.register(&admin(), input("shop@acme.test")).await.is_ok());
        assert!(matches!(
            brands.register(&admin(), input("SHOP@acme.test")).await,
            Err(ServiceError::EmailExists)
        ));
    }

    #[tokio::test]
    async fn brand_updates_only_itself() {
        let brands = service();
        let b1 = brands.register(&admin(), input("one@acme.test")).await.unwrap();
        let b2 = brands.register(&admin(), input("two@acme.test")).await.unwrap();

        let rename = BrandChanges {
            brand_name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let err = brands.update(&b1.principal(), b2.brand_id, rename.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let updated = brands.update(&b1.principal(), b1.brand_id, rename).await.unwrap();
        assert_eq!(updated.brand_name, "Renamed");
        assert_eq!(brands.find_by_id_cached(b1.brand_id).await.unwrap().brand_name, "Renamed");
    }

    #[tokio::test]
    async fn brands_list_only_themselves() {
        let brands = service();
        let b1 = brands.register(&admin(), input("one@acme.test")).await.unwrap();
        brands.register(&admin(), input("two@acme.test")).await.unwrap();

        assert_eq!(brands.list(&b1.principal(), Page::default()).await.unwrap(), vec![b1]);
        let user = Principal::User { user_id: Uuid::new_v4() };
        assert_eq!(brands.list(&user, Page::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_evicts_the_cache() {
        let brands = service();
        let brand = brands.register(&admin(), input("one@acme.test")).await.unwrap();
        brands.delete(&admin(), brand.brand_id).await.unwrap();
        assert!(brands.find_by_id_cached(brand.brand_id).await.unwrap_err().is_not_found());
    }
}
