//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketplace_core::domain::{
    Brand, BrandCredentials, NewBrand, NewOrder, NewProduct, NewUser, Order, OrderStatus, Product,
    Role, User, UserCredentials,
};
use marketplace_core::page::Page;
use marketplace_core::ports::{DatabaseService, PortError, PortResult};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps driver errors onto the port taxonomy. `what` names the missing row.
fn map_err(e: sqlx::Error, what: impl Into<String>) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(what.into()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// Turns a zero-row `DELETE` into `NotFound`.
fn expect_deleted(rows_affected: u64, what: String) -> PortResult<()> {
    if rows_affected == 0 {
        Err(PortError::NotFound(what))
    } else {
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "user_id, email, first_name, last_name, delivery_address, role, \
                            avatar, password_hash, created_at, updated_at";

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    delivery_address: String,
    role: String,
    avatar: Option<String>,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_credentials(self) -> PortResult<UserCredentials> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(UserCredentials {
            user: User {
                user_id: self.user_id,
                email: self.email,
                first_name: self.first_name,
                last_name: self.last_name,
                delivery_address: self.delivery_address,
                role,
                avatar: self.avatar,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        })
    }

    fn to_domain(self) -> PortResult<User> {
        self.to_credentials().map(|c| c.user)
    }
}

const BRAND_COLUMNS: &str =
    "brand_id, brand_name, email, pickup_address, logo, password_hash, created_at, updated_at";

#[derive(FromRow)]
struct BrandRecord {
    brand_id: Uuid,
    brand_name: String,
    email: String,
    pickup_address: String,
    logo: Option<String>,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl BrandRecord {
    fn to_credentials(self) -> BrandCredentials {
        BrandCredentials {
            brand: Brand {
                brand_id: self.brand_id,
                brand_name: self.brand_name,
                email: self.email,
                pickup_address: self.pickup_address,
                logo: self.logo,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        }
    }

    fn to_domain(self) -> Brand {
        self.to_credentials().brand
    }
}

const PRODUCT_COLUMNS: &str =
    "product_id, name, description, price, brand_id, created_at, updated_at";

#[derive(FromRow)]
struct ProductRecord {
    product_id: Uuid,
    name: String,
    description: String,
    price: Decimal,
    brand_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProductRecord {
    fn to_domain(self) -> Product {
        Product {
            product_id: self.product_id,
            name: self.name,
            description: self.description,
            price: self.price,
            brand_id: self.brand_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str = "order_id, user_id, brand_id, item, quantity, total_price, status, \
                             delivery_source_address, delivery_destination_address, \
                             created_at, updated_at";

#[derive(FromRow)]
struct OrderRecord {
    order_id: Uuid,
    user_id: Uuid,
    brand_id: Uuid,
    item: Json<Product>,
    quantity: i32,
    total_price: Decimal,
    status: String,
    delivery_source_address: String,
    delivery_destination_address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl OrderRecord {
    fn to_domain(self) -> PortResult<Order> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Order {
            order_id: self.order_id,
            user_id: self.user_id,
            brand_id: self.brand_id,
            item: self.item.0,
            quantity: self.quantity,
            total_price: self.total_price,
            status,
            delivery_source_address: self.delivery_source_address,
            delivery_destination_address: self.delivery_destination_address,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn orders_to_domain(records: Vec<OrderRecord>) -> PortResult<Vec<Order>> {
    records.into_iter().map(OrderRecord::to_domain).collect()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Users ---

    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let sql = format!(
            "INSERT INTO users (user_id, email, first_name, last_name, delivery_address, role, avatar, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.delivery_address)
            .bind(user.role.as_str())
            .bind(&user.avatar)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, "user"))?
            .to_domain()
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, format!("User {} not found", user_id)))?
            .to_domain()
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, "User with that email not found"))?
            .to_credentials()
    }

    async fn find_all_users(&self, page: Page) -> PortResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, user_id ASC LIMIT $1 OFFSET $2"
        );
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err(e, "users"))?;
        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn update_user_by_id(&self, user: &User) -> PortResult<User> {
        let sql = format!(
            "UPDATE users SET email = $2, first_name = $3, last_name = $4, delivery_address = $5, \
             role = $6, avatar = $7, updated_at = now() WHERE user_id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user.user_id)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.delivery_address)
            .bind(user.role.as_str())
            .bind(&user.avatar)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, format!("User {} not found", user.user_id)))?
            .to_domain()
    }

    async fn delete_user_by_id(&self, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_err(e, "user"))?;
        expect_deleted(result.rows_affected(), format!("User {} not found", user_id))
    }

    // --- Brands ---

    async fn create_brand(&self, brand: NewBrand) -> PortResult<Brand> {
        let sql = format!(
            "INSERT INTO brands (brand_id, brand_name, email, pickup_address, logo, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {BRAND_COLUMNS}"
        );
        let record = sqlx::query_as::<_, BrandRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&brand.brand_name)
            .bind(&brand.email)
            .bind(&brand.pickup_address)
            .bind(&brand.logo)
            .bind(&brand.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, "brand"))?;
        Ok(record.to_domain())
    }

    async fn find_brand_by_id(&self, brand_id: Uuid) -> PortResult<Brand> {
        let sql = format!("SELECT {BRAND_COLUMNS} FROM brands WHERE brand_id = $1");
        let record = sqlx::query_as::<_, BrandRecord>(&sql)
            .bind(brand_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, format!("Brand {} not found", brand_id)))?;
        Ok(record.to_domain())
    }

    async fn find_brand_by_email(&self, email: &str) -> PortResult<BrandCredentials> {
        let sql = format!("SELECT {BRAND_COLUMNS} FROM brands WHERE email = $1");
        let record = sqlx::query_as::<_, BrandRecord>(&sql)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, "Brand with that email not found"))?;
        Ok(record.to_credentials())
    }

    async fn find_all_brands(&self, page: Page) -> PortResult<Vec<Brand>> {
        let sql = format!(
            "SELECT {BRAND_COLUMNS} FROM brands ORDER BY created_at DESC, brand_id ASC LIMIT $1 OFFSET $2"
        );
        let records = sqlx::query_as::<_, BrandRecord>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err(e, "brands"))?;
        Ok(records.into_iter().map(BrandRecord::to_domain).collect())
    }

    async fn update_brand_by_id(&self, brand: &Brand) -> PortResult<Brand> {
        let sql = format!(
            "UPDATE brands SET brand_name = $2, email = $3, pickup_address = $4, logo = $5, \
             updated_at = now() WHERE brand_id = $1 RETURNING {BRAND_COLUMNS}"
        );
        let record = sqlx::query_as::<_, BrandRecord>(&sql)
            .bind(brand.brand_id)
            .bind(&brand.brand_name)
            .bind(&brand.email)
            .bind(&brand.pickup_address)
            .bind(&brand.logo)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, format!("Brand {} not found", brand.brand_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_brand_by_id(&self, brand_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM brands WHERE brand_id = $1")
            .bind(brand_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_err(e, "brand"))?;
        expect_deleted(result.rows_affected(), format!("Brand {} not found", brand_id))
    }

    // --- Products ---

    async fn create_product(&self, product: NewProduct) -> PortResult<Product> {
        let sql = format!(
            "INSERT INTO products (product_id, name, description, price, brand_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PRODUCT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.brand_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, "product"))?;
        Ok(record.to_domain())
    }

    async fn find_product_by_id(&self, product_id: Uuid) -> PortResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1");
        let record = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(product_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, format!("Product {} not found", product_id)))?;
        Ok(record.to_domain())
    }

    async fn find_all_products(&self, page: Page) -> PortResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             ORDER BY created_at DESC, product_id ASC LIMIT $1 OFFSET $2"
        );
        let records = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err(e, "products"))?;
        Ok(records.into_iter().map(ProductRecord::to_domain).collect())
    }

    async fn find_all_products_by_brand_id(
        &self,
        brand_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE brand_id = $1 \
             ORDER BY created_at DESC, product_id ASC LIMIT $2 OFFSET $3"
        );
        let records = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(brand_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err(e, "products"))?;
        Ok(records.into_iter().map(ProductRecord::to_domain).collect())
    }

    async fn update_product_by_id(&self, product: &Product) -> PortResult<Product> {
        let sql = format!(
            "UPDATE products SET name = $2, description = $3, price = $4, updated_at = now() \
             WHERE product_id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(product.product_id)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, format!("Product {} not found", product.product_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_product_by_id(&self, product_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_err(e, "product"))?;
        expect_deleted(result.rows_affected(), format!("Product {} not found", product_id))
    }

    // --- Orders ---

    async fn create_order(&self, order: NewOrder) -> PortResult<Order> {
        let sql = format!(
            "INSERT INTO orders (order_id, user_id, brand_id, item, quantity, total_price, status, \
             delivery_source_address, delivery_destination_address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {ORDER_COLUMNS}"
        );
        sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(order.user_id)
            .bind(order.brand_id)
            .bind(Json(&order.item))
            .bind(order.quantity)
            .bind(order.total_price)
            .bind(order.status.as_str())
            .bind(&order.delivery_source_address)
            .bind(&order.delivery_destination_address)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, "order"))?
            .to_domain()
    }

    async fn find_order_by_id(&self, order_id: Uuid) -> PortResult<Order> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
        sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(order_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_err(e, format!("Order {} not found", order_id)))?
            .to_domain()
    }

    async fn find_all_orders(&self, page: Page) -> PortResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             ORDER BY created_at DESC, order_id ASC LIMIT $1 OFFSET $2"
        );
        let records = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err(e, "orders"))?;
        orders_to_domain(records)
    }

    async fn find_all_orders_by_brand_id(
        &self,
        brand_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE brand_id = $1 \
             ORDER BY created_at DESC, order_id ASC LIMIT $2 OFFSET $3"
        );
        let records = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(brand_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err(e, "orders"))?;
        orders_to_domain(records)
    }

    async fn find_all_orders_by_user_id(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC, order_id ASC LIMIT $2 OFFSET $3"
        );
        let records = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err(e, "orders"))?;
        orders_to_domain(records)
    }

    async fn find_all_orders_by_user_id_and_brand_id(
        &self,
        user_id: Uuid,
        brand_id: Uuid,
        page: Page,
    ) -> PortResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND brand_id = $2 \
             ORDER BY created_at DESC, order_id ASC LIMIT $3 OFFSET $4"
        );
        let records = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(user_id)
            .bind(brand_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_err(e, "orders"))?;
        orders_to_domain(records)
    }

    async fn update_order_by_id(&self, order: &Order, expected: OrderStatus) -> PortResult<Order> {
        let sql = format!(
            "UPDATE orders SET status = $2, updated_at = now() \
             WHERE order_id = $1 AND status = $3 RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(order.order_id)
            .bind(order.status.as_str())
            .bind(expected.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_err(e, "order"))?;
        if let Some(record) = updated {
            return record.to_domain();
        }

        // Zero rows: either the order is gone or another writer moved it first.
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE order_id = $1)")
                .bind(order.order_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_err(e, "order"))?;
        if exists {
            Err(PortError::Conflict(format!(
                "Order {} is no longer {}",
                order.order_id,
                expected.as_str()
            )))
        } else {
            Err(PortError::NotFound(format!("Order {} not found", order.order_id)))
        }
    }

    async fn delete_order_by_id(&self, order_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM orders WHERE order_id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_err(e, "order"))?;
        expect_deleted(result.rows_affected(), format!("Order {} not found", order_id))
    }
}
