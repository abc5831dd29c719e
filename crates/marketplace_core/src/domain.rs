//! crates/marketplace_core/src/domain.rs
//!
//! Defines the pure, core data structures for the marketplace.
//! These structs are independent of any database or transport. They derive serde
//! only so that adapters can keep JSON copies of them (the entity cache).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ServiceError;

//=========================================================================================
// Roles and Principals
//=========================================================================================

/// A parse failure for one of the closed string enumerations stored in the database.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// The role of a `User` account. Brands carry no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Which identity table a session's principal id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Brand,
}

/// The authenticated identity behind a request, decoded once from the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
    Admin { user_id: Uuid },
    User { user_id: Uuid },
    Brand { brand_id: Uuid },
}

impl Principal {
    /// Builds the principal for a user account with the given role.
    pub fn for_user(user_id: Uuid, role: Role) -> Self {
        match role {
            Role::Admin => Principal::Admin { user_id },
            Role::User => Principal::User { user_id },
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            Principal::Admin { user_id } | Principal::User { user_id } => user_id,
            Principal::Brand { brand_id } => brand_id,
        }
    }

    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::Admin { .. } | Principal::User { .. } => PrincipalKind::User,
            Principal::Brand { .. } => PrincipalKind::Brand,
        }
    }

    /// The user role, or `None` for brands.
    pub fn role(&self) -> Option<Role> {
        match self {
            Principal::Admin { .. } => Some(Role::Admin),
            Principal::User { .. } => Some(Role::User),
            Principal::Brand { .. } => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::Admin { .. })
    }

    /// The user id for `Admin` and `User` principals.
    pub fn user_id(&self) -> Option<Uuid> {
        match *self {
            Principal::Admin { user_id } | Principal::User { user_id } => Some(user_id),
            Principal::Brand { .. } => None,
        }
    }

    pub fn brand_id(&self) -> Option<Uuid> {
        match *self {
            Principal::Brand { brand_id } => Some(brand_id),
            _ => None,
        }
    }
}

//=========================================================================================
// Users
//=========================================================================================

/// Represents a buyer or admin account - used throughout the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub delivery_address: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal::for_user(self.user_id, self.role)
    }

    /// Applies a partial update in place. Identifiers and timestamps are untouched.
    pub fn apply(&mut self, changes: UserChanges) {
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(first_name) = changes.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            self.last_name = last_name;
        }
        if let Some(delivery_address) = changes.delivery_address {
            self.delivery_address = delivery_address;
        }
        if let Some(avatar) = changes.avatar {
            self.avatar = Some(avatar);
        }
        if let Some(role) = changes.role {
            self.role = role;
        }
    }
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub delivery_address: String,
    pub role: Role,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub delivery_address: Option<String>,
    pub avatar: Option<String>,
    pub role: Option<Role>,
}

//=========================================================================================
// Brands
//=========================================================================================

/// A merchant. Brands log in with their own email and password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub brand_id: Uuid,
    pub brand_name: String,
    pub email: String,
    pub pickup_address: String,
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Brand {
    pub fn principal(&self) -> Principal {
        Principal::Brand {
            brand_id: self.brand_id,
        }
    }

    pub fn apply(&mut self, changes: BrandChanges) {
        if let Some(brand_name) = changes.brand_name {
            self.brand_name = brand_name;
        }
        if let Some(pickup_address) = changes.pickup_address {
            self.pickup_address = pickup_address;
        }
        if let Some(logo) = changes.logo {
            self.logo = Some(logo);
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrandCredentials {
    pub brand: Brand,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewBrand {
    pub brand_name: String,
    pub email: String,
    pub password_hash: String,
    pub pickup_address: String,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BrandChanges {
    pub brand_name: Option<String>,
    pub pickup_address: Option<String>,
    pub logo: Option<String>,
}

//=========================================================================================
// Products
//=========================================================================================

/// Exclusive upper bound of a product price, the range of a `NUMERIC(12, 2)` column.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

/// A catalog item owned by a brand. Also used as the frozen `item` snapshot of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub brand_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn apply(&mut self, changes: ProductChanges) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(price) = changes.price {
            self.price = price;
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub brand_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

//=========================================================================================
// Orders
//=========================================================================================

/// Largest quantity a single order may carry.
pub const MAX_ORDER_QUANTITY: i32 = 10_000;

/// Exclusive upper bound of an order total, the range of a `NUMERIC(14, 2)` column.
pub const MAX_ORDER_TOTAL: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
}

/// Raised when an order is asked to move to a state it cannot reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("order cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
        }
    }

    /// `pending -> accepted` is the only edge in the state machine.
    pub fn accept(self) -> Result<OrderStatus, InvalidTransition> {
        match self {
            OrderStatus::Pending => Ok(OrderStatus::Accepted),
            OrderStatus::Accepted => Err(InvalidTransition {
                from: self,
                to: OrderStatus::Accepted,
            }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "accepted" => Ok(OrderStatus::Accepted),
            other => Err(UnknownVariant {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// A user's purchase of a product quantity from a brand.
///
/// `item`, `total_price` and both addresses are copied at creation and never
/// recomputed; later edits to the product, brand or user do not reach this row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub brand_id: Uuid,
    pub item: Product,
    pub quantity: i32,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub delivery_source_address: String,
    pub delivery_destination_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub brand_id: Uuid,
    pub item: Product,
    pub quantity: i32,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub delivery_source_address: String,
    pub delivery_destination_address: String,
}

impl NewOrder {
    /// Snapshots `product` into a pending order for `user`, shipped from `brand`.
    pub fn place(
        user: &User,
        product: &Product,
        brand: &Brand,
        quantity: i32,
    ) -> Result<NewOrder, ServiceError> {
        if !(1..=MAX_ORDER_QUANTITY).contains(&quantity) {
            return Err(ServiceError::InvalidRequest(format!(
                "quantity must be between 1 and {}",
                MAX_ORDER_QUANTITY
            )));
        }
        if product.brand_id != brand.brand_id {
            return Err(ServiceError::StoreInconsistent(format!(
                "product {} references brand {} but brand {} was supplied",
                product.product_id, product.brand_id, brand.brand_id
            )));
        }

        let total_price = product
            .price
            .checked_mul(Decimal::from(quantity))
            .filter(|total| *total < MAX_ORDER_TOTAL)
            .ok_or_else(|| {
                ServiceError::InvalidRequest(format!(
                    "order total must be below {}",
                    MAX_ORDER_TOTAL
                ))
            })?;

        Ok(NewOrder {
            user_id: user.user_id,
            brand_id: brand.brand_id,
            item: product.clone(),
            quantity,
            total_price,
            status: OrderStatus::Pending,
            delivery_source_address: brand.pickup_address.clone(),
            delivery_destination_address: user.delivery_address.clone(),
        })
    }
}

//=========================================================================================
// Sessions
//=========================================================================================

// Represents a login session held in the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub session_id: String,
    pub principal_id: Uuid,
    pub principal_kind: PrincipalKind,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            user_id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            delivery_address: "D".to_string(),
            role: Role::User,
            avatar: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn brand() -> Brand {
        let now = Utc::now();
        Brand {
            brand_id: Uuid::new_v4(),
            brand_name: "Acme".to_string(),
            email: "shop@acme.test".to_string(),
            pickup_address: "P".to_string(),
            logo: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn product(brand_id: Uuid, price: Decimal) -> Product {
        let now = Utc::now();
        Product {
            product_id: Uuid::new_v4(),
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            price,
            brand_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn place_snapshots_product_and_addresses() {
        let user = user();
        let brand = brand();
        let product = product(brand.brand_id, Decimal::new(1000, 1));

        let order = NewOrder::place(&user, &product, &brand, 3).unwrap();

        assert_eq!(order.total_price, Decimal::from(300));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.delivery_source_address, "P");
        assert_eq!(order.delivery_destination_address, "D");
        assert_eq!(order.item, product);
        assert_eq!(order.brand_id, brand.brand_id);
        assert_eq!(order.user_id, user.user_id);
    }

    #[test]
    fn place_rejects_zero_quantity() {
        let brand = brand();
        let product = product(brand.brand_id, Decimal::from(5));
        let err = NewOrder::place(&user(), &product, &brand, 0).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[test]
    fn bounds_match_the_column_ranges() {
        assert_eq!(MAX_PRICE, Decimal::from(10_000_000_000i64));
        assert_eq!(MAX_ORDER_TOTAL, Decimal::from(1_000_000_000_000i64));
    }

    #[test]
    fn place_rejects_quantity_above_the_cap() {
        let brand = brand();
        let product = product(brand.brand_id, Decimal::from(1));
        assert!(NewOrder::place(&user(), &product, &brand, MAX_ORDER_QUANTITY).is_ok());
        let err = NewOrder::place(&user(), &product, &brand, MAX_ORDER_QUANTITY + 1).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[test]
    fn place_rejects_totals_out_of_range() {
        let brand = brand();
        let at_cap = product(brand.brand_id, Decimal::new(999_999_999_999, 2));
        let err = NewOrder::place(&user(), &at_cap, &brand, 1000).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));

        // Would overflow the 96-bit mantissa rather than just the column.
        let huge = product(brand.brand_id, Decimal::from_parts(0, 0, 0x7000_0000, false, 0));
        let err = NewOrder::place(&user(), &huge, &brand, 3).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));

        let fits = product(brand.brand_id, Decimal::new(99_999_999, 2));
        let order = NewOrder::place(&user(), &fits, &brand, 1000).unwrap();
        assert_eq!(order.total_price, Decimal::new(99_999_999_000, 2));
    }

    #[test]
    fn place_rejects_mismatched_brand() {
        let product = product(Uuid::new_v4(), Decimal::from(5));
        let err = NewOrder::place(&user(), &product, &brand(), 1).unwrap_err();
        assert!(matches!(err, ServiceError::StoreInconsistent(_)));
    }

    #[test]
    fn accepted_is_terminal() {
        assert_eq!(OrderStatus::Pending.accept(), Ok(OrderStatus::Accepted));
        let err = OrderStatus::Accepted.accept().unwrap_err();
        assert_eq!(err.from, OrderStatus::Accepted);
    }

    #[test]
    fn principal_follows_role() {
        let id = Uuid::new_v4();
        assert_eq!(Principal::for_user(id, Role::Admin), Principal::Admin { user_id: id });
        assert_eq!(Principal::for_user(id, Role::User).role(), Some(Role::User));
        let brand = Principal::Brand { brand_id: id };
        assert_eq!(brand.role(), None);
        assert_eq!(brand.kind(), PrincipalKind::Brand);
        assert_eq!(brand.user_id(), None);
    }

    #[test]
    fn role_and_status_parse_their_storage_names() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("".parse::<Role>().is_err());
        assert_eq!("accepted".parse::<OrderStatus>().unwrap(), OrderStatus::Accepted);
    }

    #[test]
    fn user_changes_leave_unset_fields() {
        let mut u = user();
        u.apply(UserChanges {
            first_name: Some("Z".to_string()),
            ..Default::default()
        });
        assert_eq!(u.first_name, "Z");
        assert_eq!(u.last_name, "B");
    }

    #[test]
    fn cached_user_json_has_no_password() {
        let json = serde_json::to_string(&user()).unwrap();
        assert!(!json.contains("password"));
    }
}
