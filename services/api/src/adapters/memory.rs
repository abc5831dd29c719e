//! services/api/src/adapters/memory.rs
//!
//! In-process implementations of every port, selected with `memory://`. They keep
//! the same ordering, uniqueness, reference and expiry rules as Postgres and Redis,
//! which makes them suitable for tests and for running the API without infrastructure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use marketplace_core::domain::{
    AuthSession, Brand, BrandCredentials, NewBrand, NewOrder, NewProduct, NewUser, Order,
    OrderStatus, PrincipalKind, Product, User, UserCredentials,
};
use marketplace_core::page::Page;
use marketplace_core::ports::{
    CacheService, DatabaseService, PortError, PortResult, SessionStore,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

//=========================================================================================
// Store
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserCredentials>,
    brands: HashMap<Uuid, BrandCredentials>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
}

/// A `DatabaseService` backed by hash maps behind one lock.
#[derive(Default)]
pub struct MemoryDb {
    tables: RwLock<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Orders rows newest first, ties broken by id ascending, then cuts out `page`.
fn window<T, F>(mut rows: Vec<T>, key: F, page: Page) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> (DateTime<Utc>, Uuid),
{
    rows.sort_by(|a, b| {
        let (created_a, id_a) = key(a);
        let (created_b, id_b) = key(b);
        created_b.cmp(&created_a).then(id_a.cmp(&id_b))
    });
    page.slice(&rows)
}

fn user_key(u: &User) -> (DateTime<Utc>, Uuid) {
    (u.created_at, u.user_id)
}

fn brand_key(b: &Brand) -> (DateTime<Utc>, Uuid) {
    (b.created_at, b.brand_id)
}

fn product_key(p: &Product) -> (DateTime<Utc>, Uuid) {
    (p.created_at, p.product_id)
}

fn order_key(o: &Order) -> (DateTime<Utc>, Uuid) {
    (o.created_at, o.order_id)
}

fn conflict(what: &str) -> PortError {
    PortError::Conflict(what.to_string())
}

#[async_trait]
impl DatabaseService for MemoryDb {
    // --- Users ---

    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|c| c.user.email == user.email) {
            return Err(conflict("users_email_key"));
        }
        let now = Utc::now();
        let row = User {
            user_id: Uuid::new_v4(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            delivery_address: user.delivery_address,
            role: user.role,
            avatar: user.avatar,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(
            row.user_id,
            UserCredentials {
                user: row.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(row)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&user_id)
            .map(|c| c.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|c| c.user.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound("User with that email not found".to_string()))
    }

    async fn find_all_users(&self, page: Page) -> PortResult<Vec<User>> {
        let tables = self.tables.read().await;
        let rows = tables.users.values().map(|c| c.user.clone()).collect();
        Ok(window(rows, user_key, page))
    }

    async fn update_user_by_id(&self, user: &User) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|c| c.user.email == user.email && c.user.user_id != user.user_id)
        {
            return Err(conflict("users_email_key"));
        }
        let stored = tables
            .users
            .get_mut(&user.user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user.user_id)))?;
        stored.user = User {
            created_at: stored.user.created_at,
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(stored.user.clone())
    }

    async fn delete_user_by_id(&self, user_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.values().any(|o| o.user_id == user_id) {
            return Err(conflict("orders_user_id_fkey"));
        }
        tables
            .users
            .remove(&user_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    // --- Brands ---

    async fn create_brand(&self, brand: NewBrand) -> PortResult<Brand> {
        let mut tables = self.tables.write().await;
        if tables.brands.values().any(|c| c.brand.email == brand.email) {
            return Err(conflict("brands_email_key"));
        }
        let now = Utc::now();
        let row = Brand {
            brand_id: Uuid::new_v4(),
            brand_name: brand.brand_name,
            email: brand.email,
            pickup_address: brand.pickup_address,
            logo: brand.logo,
            created_at: now,
            updated_at: now,
        };
        tables.brands.insert(
            row.brand_id,
            BrandCredentials {
                brand: row.clone(),
                password_hash: brand.password_hash,
            },
        );
        Ok(row)
    }

    async fn find_brand_by_id(&self, brand_id: Uuid) -> PortResult<Brand> {
        let tables = self.tables.read().await;
        tables
            .brands
            .get(&brand_id)
            .map(|c| c.brand.clone())
            .ok_or_else(|| PortError::NotFound(format!("Brand {} not found", brand_id)))
    }

    async fn find_brand_by_email(&self, email: &str) -> PortResult<BrandCredentials> {
        let tables = self.tables.read().await;
        tables
            .brands
            .values()
            .find(|c| c.brand.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Brand with that email not found".to_string()))
    }

    async fn find_all_brands(&self, page: Page) -> PortResult<Vec<Brand>> {
        let tables = self.tables.read().await;
        let rows = tables.brands.values().map(|c| c.brand.clone()).collect();
        Ok(window(rows, brand_key, page))
    }

    async fn update_brand_by_id(&self, brand: &Brand) -> PortResult<Brand> {
        let mut tables = self.tables.write().await;
        if tables
            .brands
            .values()
            .any(|c| c.brand.email == brand.email && c.brand.brand_id != brand.brand_id)
        {
            return Err(conflict("brands_email_key"));
        }
        let stored = tables
            .brands
            .get_mut(&brand.brand_id)
            .ok_or_else(|| PortError::NotFound(format!("Brand {} not found", brand.brand_id)))?;
        stored.brand = Brand {
            created_at: stored.brand.created_at,
            updated_at: Utc::now(),
            ..brand.clone()
        };
        Ok(stored.brand.clone())
    }

    async fn delete_brand_by_id(&self, brand_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables.products.values().any(|p| p.brand_id == brand_id) {
            return Err(conflict("products_brand_id_fkey"));
        }
        if tables.orders.values().any(|o| o.brand_id == brand_id) {
            return Err(conflict("orders_brand_id_fkey"));
        }
        tables
            .brands
            .remove(&brand_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Brand {} not found", brand_id)))
    }

    // --- Products ---

    async fn create_product(&self, product: NewProduct) -> PortResult<Product> {
        let mut tables = self.tables.write().await;
        if !tables.brands.contains_key(&product.brand_id) {
            return Err(conflict("products_brand_id_fkey"));
        }
        let now = Utc::now();
        let row = Product {
            product_id: Uuid::new_v4(),
            name: product.name,
            description: product.description,
            price: product.price,
            brand_id: product.brand_id,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(row.product_id, row.clone());
        Ok(row)
    }

    async fn find_product_by_id(&self, product_id: Uuid) -> PortResult<Product> {
        let tables = self.tables.read().await;
        tables
            .products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn find_all_products(&self, page: Page) -> PortResult<Vec<Product>> {
        let tables = self.tables.read().await;
        let rows = tables.products.values().cloned().collect();
        Ok(window(rows, product_key, page))
    }

    async fn find_all_products_by_brand_id(
        &self,
        brand_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Product>> {
        let tables = self.tables.read().await;
        let rows = tables
            .products
            .values()
            .filter(|p| p.brand_id == brand_id)
            .cloned()
            .collect();
        Ok(window(rows, product_key, page))
    }

    async fn update_product_by_id(&self, product: &Product) -> PortResult<Product> {
        let mut tables = self.tables.write().await;
        let stored = tables.products.get_mut(&product.product_id).ok_or_else(|| {
            PortError::NotFound(format!("Product {} not found", product.product_id))
        })?;
        stored.name = product.name.clone();
        stored.description = product.description.clone();
        stored.price = product.price;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_product_by_id(&self, product_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .products
            .remove(&product_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }

    // --- Orders ---

    async fn create_order(&self, order: NewOrder) -> PortResult<Order> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&order.user_id) {
            return Err(conflict("orders_user_id_fkey"));
        }
        if !tables.brands.contains_key(&order.brand_id) {
            return Err(conflict("orders_brand_id_fkey"));
        }
        let now = Utc::now();
        let row = Order {
            order_id: Uuid::new_v4(),
            user_id: order.user_id,
            brand_id: order.brand_id,
            item: order.item,
            quantity: order.quantity,
            total_price: order.total_price,
            status: order.status,
            delivery_source_address: order.delivery_source_address,
            delivery_destination_address: order.delivery_destination_address,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(row.order_id, row.clone());
        Ok(row)
    }

    async fn find_order_by_id(&self, order_id: Uuid) -> PortResult<Order> {
        let tables = self.tables.read().await;
        tables
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn find_all_orders(&self, page: Page) -> PortResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let rows = tables.orders.values().cloned().collect();
        Ok(window(rows, order_key, page))
    }

    async fn find_all_orders_by_brand_id(
        &self,
        brand_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let rows = tables
            .orders
            .values()
            .filter(|o| o.brand_id == brand_id)
            .cloned()
            .collect();
        Ok(window(rows, order_key, page))
    }

    async fn find_all_orders_by_user_id(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let rows = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(window(rows, order_key, page))
    }

    async fn find_all_orders_by_user_id_and_brand_id(
        &self,
        user_id: Uuid,
        brand_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let rows = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.brand_id == brand_id)
            .cloned()
            .collect();
        Ok(window(rows, order_key, page))
    }

    async fn update_order_by_id(&self, order: &Order, expected: OrderStatus) -> PortResult<Order> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .orders
            .get_mut(&order.order_id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order.order_id)))?;
        if stored.status != expected {
            return Err(PortError::Conflict(format!(
                "Order {} is no longer {}",
                order.order_id,
                expected.as_str()
            )));
        }
        stored.status = order.status;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_order_by_id(&self, order_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .orders
            .remove(&order_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))
    }
}

//=========================================================================================
// Cache
//=========================================================================================

/// A cached value with its own expiry.
#[derive(Clone, Debug)]
struct CachedEntry {
    data: String,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// A `CacheService` kept in a `DashMap`. Expired entries are dropped on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CachedEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let hit = self.entries.get(key).map(|entry| entry.clone());
        match hit {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.data)),
            Some(_) => {
                self.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> PortResult<()> {
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                data: value,
                cached_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

//=========================================================================================
// Sessions
//=========================================================================================

/// A `SessionStore` kept in a `DashMap`. Expired sessions read as missing.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, AuthSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(
        &self,
        principal_id: Uuid,
        principal_kind: PrincipalKind,
        ttl: Duration,
    ) -> PortResult<AuthSession> {
        let expires_in = chrono::Duration::from_std(ttl)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let session = AuthSession {
            session_id: Uuid::new_v4().to_string(),
            principal_id,
            principal_kind,
            expires_at: Utc::now() + expires_in,
        };
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> PortResult<AuthSession> {
        let found = self.sessions.get(session_id).map(|s| s.clone());
        match found {
            Some(session) if session.expires_at > Utc::now() => Ok(session),
            Some(_) => {
                self.sessions.remove(session_id);
                Err(PortError::NotFound(format!("Session {} expired", session_id)))
            }
            None => Err(PortError::NotFound(format!("Session {} not found", session_id))),
        }
    }

    async fn delete_session(&self, session_id: &str) -> PortResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace_core::domain::Role;
    use rust_decimal::Decimal;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            delivery_address: "D".to_string(),
            role: Role::User,
            avatar: None,
        }
    }

    fn new_brand(email: &str) -> NewBrand {
        NewBrand {
            brand_name: "Acme".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            pickup_address: "P".to_string(),
            logo: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = MemoryDb::new();
        db.create_user(new_user("a@b.c")).await.unwrap();
        let err = db.create_user(new_user("a@b.c")).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_of_missing_row_is_not_found() {
        let db = MemoryDb::new();
        let err = db.delete_product_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn brand_with_products_cannot_be_deleted() {
        let db = MemoryDb::new();
        let brand = db.create_brand(new_brand("shop@acme.test")).await.unwrap();
        db.create_product(NewProduct {
            name: "Widget".to_string(),
            description: String::new(),
            price: Decimal::from(1),
            brand_id: brand.brand_id,
        })
        .await
        .unwrap();

        let err = db.delete_brand_by_id(brand.brand_id).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_pages_do_not_overlap() {
        let db = MemoryDb::new();
        for n in 0..7 {
            db.create_user(new_user(&format!("u{}@b.c", n))).await.unwrap();
        }

        let full = db.find_all_users(Page::new(Some(100), None).unwrap()).await.unwrap();
        assert_eq!(full.len(), 7);
        assert!(full.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let mut paged = Vec::new();
        for n in 1..=3 {
            paged.extend(db.find_all_users(Page::new(Some(3), Some(n)).unwrap()).await.unwrap());
        }
        assert_eq!(paged, full);
    }

    #[tokio::test]
    async fn order_status_write_is_compare_and_set() {
        let db = MemoryDb::new();
        let user = db.create_user(new_user("a@b.c")).await.unwrap();
        let brand = db.create_brand(new_brand("shop@acme.test")).await.unwrap();
        let product = db
            .create_product(NewProduct {
                name: "Widget".to_string(),
                description: String::new(),
                price: Decimal::from(4),
                brand_id: brand.brand_id,
            })
            .await
            .unwrap();
        let placed = db
            .create_order(NewOrder::place(&user, &product, &brand, 2).unwrap())
            .await
            .unwrap();

        let mut accepted = placed.clone();
        accepted.status = OrderStatus::Accepted;
        let stored = db
            .update_order_by_id(&accepted, OrderStatus::Pending)
            .await
            .unwrap();
        assert_eq!(stored.status, OrderStatus::Accepted);

        // A writer that read the order while it was still pending loses.
        let err = db
            .update_order_by_id(&accepted, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));

        db.delete_order_by_id(placed.order_id).await.unwrap();
        let err = db
            .update_order_by_id(&accepted, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn cache_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("user:1", "{}".to_string(), Duration::from_millis(10)).await.unwrap();
        assert!(cache.get("user:1").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("user:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sessions_expire_and_delete() {
        let store = MemorySessionStore::new();
        let id = Uuid::new_v4();
        let session = store
            .create_session(id, PrincipalKind::User, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get_session(&session.session_id).await.unwrap().principal_id, id);

        store.delete_session(&session.session_id).await.unwrap();
        assert!(store.get_session(&session.session_id).await.is_err());

        let short = store
            .create_session(id, PrincipalKind::Brand, Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(matches!(
            store.get_session(&short.session_id).await,
            Err(PortError::NotFound(_))
        ));
    }
}
