//! services/api/src/services/mod.rs
//!
//! Per-entity use cases composed from the store, cache and session ports.

pub mod auth;
pub mod brands;
pub mod cache;
pub mod orders;
pub mod products;
pub mod users;

pub use auth::{AuthContext, AuthService, LoginOutcome};
pub use brands::{BrandService, RegisterBrand};
pub use cache::EntityCache;
pub use orders::OrderService;
pub use products::{CreateProduct, ProductService};
pub use users::{RegisterUser, UserService};

use marketplace_core::{PortError, ServiceError};

/// Maps a store miss on a direct lookup to `NotFound(entity)`; other port errors pass through.
pub(crate) fn store_err(entity: &'static str) -> impl Fn(PortError) -> ServiceError {
    move |e| match e {
        PortError::NotFound(_) => ServiceError::NotFound(entity.to_string()),
        other => ServiceError::Port(other),
    }
}
