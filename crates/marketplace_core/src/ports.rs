//! crates/marketplace_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete relational store, cache and session store.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    AuthSession, Brand, BrandCredentials, NewBrand, NewOrder, NewProduct, NewUser, Order,
    OrderStatus, PrincipalKind, Product, User, UserCredentials,
};
use crate::page::Page;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (database, cache).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// Unique-key or foreign-key violation.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The authoritative relational store.
///
/// Every listing returns rows ordered by `created_at` descending, ties broken by id
/// ascending. An empty window is an empty `Vec`, never an error. Lookups and
/// deletes that match no row fail with `PortError::NotFound`.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: NewUser) -> PortResult<User>;

    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn find_all_users(&self, page: Page) -> PortResult<Vec<User>>;

    /// Writes every mutable column of `user` and returns the stored row.
    async fn update_user_by_id(&self, user: &User) -> PortResult<User>;

    async fn delete_user_by_id(&self, user_id: Uuid) -> PortResult<()>;

    // --- Brands ---
    async fn create_brand(&self, brand: NewBrand) -> PortResult<Brand>;

    async fn find_brand_by_id(&self, brand_id: Uuid) -> PortResult<Brand>;

    async fn find_brand_by_email(&self, email: &str) -> PortResult<BrandCredentials>;

    async fn find_all_brands(&self, page: Page) -> PortResult<Vec<Brand>>;

    async fn update_brand_by_id(&self, brand: &Brand) -> PortResult<Brand>;

    /// Refused with `PortError::Conflict` while products or orders reference the brand.
    async fn delete_brand_by_id(&self, brand_id: Uuid) -> PortResult<()>;

    // --- Products ---
    async fn create_product(&self, product: NewProduct) -> PortResult<Product>;

    async fn find_product_by_id(&self, product_id: Uuid) -> PortResult<Product>;

    async fn find_all_products(&self, page: Page) -> PortResult<Vec<Product>>;

    async fn find_all_products_by_brand_id(
        &self,
        brand_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Product>>;

    async fn update_product_by_id(&self, product: &Product) -> PortResult<Product>;

    async fn delete_product_by_id(&self, product_id: Uuid) -> PortResult<()>;

    // --- Orders ---
    async fn create_order(&self, order: NewOrder) -> PortResult<Order>;

    async fn find_order_by_id(&self, order_id: Uuid) -> PortResult<Order>;

    async fn find_all_orders(&self, page: Page) -> PortResult<Vec<Order>>;

    async fn find_all_orders_by_brand_id(
        &self,
        brand_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Order>>;

    async fn find_all_orders_by_user_id(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Order>>;

    async fn find_all_orders_by_user_id_and_brand_id(
        &self,
        user_id: Uuid,
        brand_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Order>>;

    /// Only `status` is written; the snapshot columns are frozen at creation.
    /// The write is a compare-and-set: it applies only while the stored status is
    /// still `expected`, and a row found in any other status is `Conflict`.
    async fn update_order_by_id(&self, order: &Order, expected: OrderStatus) -> PortResult<Order>;

    async fn delete_order_by_id(&self, order_id: Uuid) -> PortResult<()>;
}

/// A best-effort key/value cache holding serialized entities.
#[async_trait]
pub trait CacheService: Send + Sync {
    /// `Ok(None)` is a miss, not an error.
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> PortResult<()>;

    async fn delete(&self, key: &str) -> PortResult<()>;
}

/// Short-lived login sessions keyed by an opaque id. Entries expire passively.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a session with a fresh id that expires `ttl` from now.
    async fn create_session(
        &self,
        principal_id: Uuid,
        principal_kind: PrincipalKind,
        ttl: Duration,
    ) -> PortResult<AuthSession>;

    async fn get_session(&self, session_id: &str) -> PortResult<AuthSession>;

    async fn delete_session(&self, session_id: &str) -> PortResult<()>;
}
