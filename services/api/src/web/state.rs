//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::auth::{PasswordService, TokenService};
use crate::config::Config;
use crate::services::{
    AuthService, BrandService, EntityCache, OrderService, ProductService, UserService,
};
use marketplace_core::{CacheService, DatabaseService, SessionStore};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: AuthService,
    pub users: UserService,
    pub brands: BrandService,
    pub products: ProductService,
    pub orders: OrderService,
}

impl AppState {
    /// Wires every service onto the given ports.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        cache: Arc<dyn CacheService>,
        sessions: Arc<dyn SessionStore>,
        passwords: PasswordService,
    ) -> Self {
        let ttl = config.cache_ttl;
        let tokens = TokenService::new(
            config.jwt_secret.as_bytes(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        );

        let users = UserService::new(
            db.clone(),
            EntityCache::new(cache.clone(), "user", ttl),
            passwords.clone(),
        );
        let brands = BrandService::new(
            db.clone(),
            EntityCache::new(cache.clone(), "brand", ttl),
            passwords.clone(),
        );
        let products = ProductService::new(
            db.clone(),
            EntityCache::new(cache.clone(), "product", ttl),
            brands.clone(),
        );
        let orders = OrderService::new(
            db.clone(),
            EntityCache::new(cache, "order", ttl),
            sessions.clone(),
            users.clone(),
            products.clone(),
            brands.clone(),
        );
        let auth = AuthService::new(db, sessions, tokens, passwords, config.session_ttl);

        Self {
            config,
            auth,
            users,
            brands,
            products,
            orders,
        }
    }
}
