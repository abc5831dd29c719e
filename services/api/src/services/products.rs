//! services/api/src/services/products.rs
//!
//! Catalog management. Products belong to exactly one brand; the brand is taken
//! from the caller's principal, or chosen explicitly by an admin.

use marketplace_core::{
    authorize, list_scope, Action, DatabaseService, ListScope, NewProduct, Page, Principal,
    Product, ProductChanges, Resource, ServiceError, Target, MAX_PRICE,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{store_err, BrandService, EntityCache};

/// Prices carry at most this many fractional digits.
pub const PRICE_SCALE: u32 = 2;

#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    /// Required when an admin creates on behalf of a brand; a brand may omit it.
    pub brand_id: Option<Uuid>,
}

pub fn validate_price(price: Decimal) -> Result<(), ServiceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::InvalidRequest("price must not be negative".to_string()));
    }
    if price >= MAX_PRICE {
        return Err(ServiceError::InvalidRequest(format!("price must be below {}", MAX_PRICE)));
    }
    if price.normalize().scale() > PRICE_SCALE {
        return Err(ServiceError::InvalidRequest(format!(
            "price allows at most {} decimal places",
            PRICE_SCALE
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<dyn DatabaseService>,
    cache: EntityCache<Product>,
    brands: BrandService,
}

impl ProductService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        cache: EntityCache<Product>,
        brands: BrandService,
    ) -> Self {
        Self { db, cache, brands }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        input: CreateProduct,
    ) -> Result<Product, ServiceError> {
        authorize(principal, Action::Create(Resource::Product), Target::none())?;
        validate_price(input.price)?;

        let brand_id = match (principal.brand_id(), input.brand_id) {
            (Some(own), Some(requested)) if own != requested => return Err(ServiceError::Forbidden),
            (Some(own), _) => own,
            (None, Some(requested)) => requested,
            (None, None) => {
                return Err(ServiceError::InvalidRequest("brand_id is required".to_string()))
            }
        };
        self.brands.find_by_id_cached(brand_id).await?;

        let product = self
            .db
            .create_product(NewProduct {
                name: input.name,
                description: input.description,
                price: input.price,
                brand_id,
            })
            .await?;
        self.cache.set(product.product_id, &product).await;
        info!(product_id = %product.product_id, brand_id = %brand_id, "created product");
        Ok(product)
    }

    pub async fn find_by_id_cached(&self, product_id: Uuid) -> Result<Product, ServiceError> {
        self.cache
            .find_through(product_id, "Product", || self.db.find_product_by_id(product_id))
            .await
    }

    /// Lists products visible to `principal`, optionally narrowed to one brand.
    pub async fn list(
        &self,
        principal: &Principal,
        brand_filter: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Product>, ServiceError> {
        let rows = match (list_scope(principal, Resource::Product), brand_filter) {
            (ListScope::All, None) => self.db.find_all_products(page).await?,
            (ListScope::All, Some(brand_id)) => {
                self.db.find_all_products_by_brand_id(brand_id, page).await?
            }
            (ListScope::OwnedByBrand(own), Some(requested)) if own != requested => Vec::new(),
            (ListScope::OwnedByBrand(own), _) => {
                self.db.find_all_products_by_brand_id(own, page).await?
            }
            (ListScope::OwnedByUser(_) | ListScope::Nothing, _) => Vec::new(),
        };
        Ok(rows)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> Result<Product, ServiceError> {
        let mut product = self
            .db
            .find_product_by_id(product_id)
            .await
            .map_err(store_err("Product"))?;
        authorize(principal, Action::Update(Resource::Product), Target::product(&product))?;
        if let Some(price) = changes.price {
            validate_price(price)?;
        }

        product.apply(changes);
        let product = self
            .db
            .update_product_by_id(&product)
            .await
            .map_err(store_err("Product"))?;
        self.cache.set(product.product_id, &product).await;
        Ok(product)
    }

    pub async fn delete(
        &self,
        principal: &Principal,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let product = self.find_by_id_cached(product_id).await?;
        authorize(principal, Action::Delete(Resource::Product), Target::product(&product))?;

        self.db
            .delete_product_by_id(product_id)
            .await
            .map_err(store_err("Product"))?;
        self.cache.delete(product_id).await;
        info!(product_id = %product_id, "deleted product");
        Ok(())
    }
}
