//! services/api/src/web/dto.rs
//!
//! Request and response payloads of the REST API. Requests are checked with
//! `Validate` before they reach a service; responses never carry password hashes.

use chrono::{DateTime, Utc};
use marketplace_core::{
    Brand, BrandChanges, Order, OrderStatus, Page, Product, ProductChanges, Role, User,
    UserChanges, MAX_ORDER_QUANTITY,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{validate_email, TokenPair, MAX_EMAIL_LENGTH};
use crate::error::ApiError;

pub const MAX_NAME_LENGTH: usize = 30;
pub const MAX_DESCRIPTION_LENGTH: usize = 250;
pub const MAX_URI_LENGTH: usize = 255;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 72;

//=========================================================================================
// Validation
//=========================================================================================

pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

fn invalid(message: String) -> ApiError {
    ApiError::InvalidRequest(message)
}

fn required(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} is required", field)));
    }
    at_most(field, value, max)
}

fn at_most(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(invalid(format!("{} must be at most {} characters", field, max)));
    }
    Ok(())
}

fn email(value: &str) -> Result<(), ApiError> {
    if !validate_email(value.trim()) {
        return Err(invalid(format!(
            "email must be a valid address of at most {} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    Ok(())
}

fn password(value: &str) -> Result<(), ApiError> {
    let len = value.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(invalid(format!(
            "password must be between {} and {} characters",
            MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn uri(field: &str, value: &Option<String>) -> Result<(), ApiError> {
    match value {
        Some(v) if !(v.starts_with("http://") || v.starts_with("https://")) => {
            Err(invalid(format!("{} must be an http(s) URI", field)))
        }
        Some(v) => at_most(field, v, MAX_URI_LENGTH),
        None => Ok(()),
    }
}

fn optional(field: &str, value: &Option<String>, max: usize) -> Result<(), ApiError> {
    match value {
        Some(v) => required(field, v, max),
        None => Ok(()),
    }
}

//=========================================================================================
// Pagination
//=========================================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Rows per page, 1 to 100. Defaults to 10.
    pub size: Option<i64>,
    /// 1-indexed page number. Defaults to 1.
    pub page: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Result<Page, ApiError> {
        Ok(Page::new(self.size, self.page)?)
    }
}

/// `GET /product` and `GET /order` also accept a brand filter.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub size: Option<i64>,
    pub page: Option<i64>,
    pub brand_id: Option<Uuid>,
}

impl ListQuery {
    pub fn page(&self) -> Result<Page, ApiError> {
        Ok(Page::new(self.size, self.page)?)
    }
}

/// `GET /user` returns one account when `id` is given, a page otherwise.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub id: Option<Uuid>,
    pub size: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PageMeta {
    pub limit: i64,
    pub offset: i64,
    pub page: i64,
}

impl From<Page> for PageMeta {
    fn from(page: Page) -> Self {
        Self {
            limit: page.limit,
            offset: page.offset,
            page: page.page,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListResponse<T: ToSchema> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T: ToSchema> ListResponse<T> {
    pub fn new<E: Into<T>>(rows: Vec<E>, page: Page) -> Self {
        Self {
            data: rows.into_iter().map(Into::into).collect(),
            meta: page.into(),
        }
    }
}

//=========================================================================================
// Auth
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        required("email", &self.email, MAX_EMAIL_LENGTH)?;
        if self.password.is_empty() {
            return Err(invalid("password is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.refresh_token.trim().is_empty() {
            return Err(invalid("refresh_token is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokensResponse {
    pub access: String,
    pub refresh: String,
}

impl From<TokenPair> for TokensResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access: pair.access,
            refresh: pair.refresh,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserLoginResponse {
    pub user_id: Uuid,
    pub tokens: TokensResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BrandLoginResponse {
    pub brand_id: Uuid,
    pub tokens: TokensResponse,
}

//=========================================================================================
// Users
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub delivery_address: String,
    /// Public registration only creates `user` accounts.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "user")]
    pub role: Option<Role>,
    pub avatar: Option<String>,
}

impl Validate for RegisterUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        email(&self.email)?;
        password(&self.password)?;
        required("first_name", &self.first_name, MAX_NAME_LENGTH)?;
        required("last_name", &self.last_name, MAX_NAME_LENGTH)?;
        required("delivery_address", &self.delivery_address, MAX_DESCRIPTION_LENGTH)?;
        uri("avatar", &self.avatar)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub delivery_address: Option<String>,
    pub avatar: Option<String>,
    #[schema(value_type = Option<String>, example = "admin")]
    pub role: Option<Role>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(value) = &self.email {
            email(value)?;
        }
        optional("first_name", &self.first_name, MAX_NAME_LENGTH)?;
        optional("last_name", &self.last_name, MAX_NAME_LENGTH)?;
        optional("delivery_address", &self.delivery_address, MAX_DESCRIPTION_LENGTH)?;
        uri("avatar", &self.avatar)
    }
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            delivery_address: req.delivery_address,
            avatar: req.avatar,
            role: req.role,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedUser {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub delivery_address: String,
    #[schema(value_type = String, example = "user")]
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            delivery_address: user.delivery_address,
            role: user.role,
            avatar: user.avatar,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

//=========================================================================================
// Brands
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterBrandRequest {
    pub brand_name: String,
    pub email: String,
    pub password: String,
    pub pickup_address: String,
    pub logo: Option<String>,
}

impl Validate for RegisterBrandRequest {
    fn validate(&self) -> Result<(), ApiError> {
        required("brand_name", &self.brand_name, MAX_NAME_LENGTH)?;
        email(&self.email)?;
        password(&self.password)?;
        required("pickup_address", &self.pickup_address, MAX_DESCRIPTION_LENGTH)?;
        uri("logo", &self.logo)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateBrandRequest {
    pub brand_name: Option<String>,
    pub pickup_address: Option<String>,
    pub logo: Option<String>,
}

impl Validate for UpdateBrandRequest {
    fn validate(&self) -> Result<(), ApiError> {
        optional("brand_name", &self.brand_name, MAX_NAME_LENGTH)?;
        optional("pickup_address", &self.pickup_address, MAX_DESCRIPTION_LENGTH)?;
        uri("logo", &self.logo)
    }
}

impl From<UpdateBrandRequest> for BrandChanges {
    fn from(req: UpdateBrandRequest) -> Self {
        Self {
            brand_name: req.brand_name,
            pickup_address: req.pickup_address,
            logo: req.logo,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedBrand {
    pub brand_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BrandResponse {
    pub brand_id: Uuid,
    pub brand_name: String,
    pub email: String,
    pub pickup_address: String,
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Brand> for BrandResponse {
    fn from(brand: Brand) -> Self {
        Self {
            brand_id: brand.brand_id,
            brand_name: brand.brand_name,
            email: brand.email,
            pickup_address: brand.pickup_address,
            logo: brand.logo,
            created_at: brand.created_at,
            updated_at: brand.updated_at,
        }
    }
}

//=========================================================================================
// Products
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    /// Only admins pass this; a brand always creates under its own id.
    pub brand_id: Option<Uuid>,
}

impl Validate for CreateProductRequest {
    fn validate(&self) -> Result<(), ApiError> {
        required("name", &self.name, MAX_NAME_LENGTH)?;
        at_most("description", &self.description, MAX_DESCRIPTION_LENGTH)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

impl Validate for UpdateProductRequest {
    fn validate(&self) -> Result<(), ApiError> {
        optional("name", &self.name, MAX_NAME_LENGTH)?;
        match &self.description {
            Some(d) => at_most("description", d, MAX_DESCRIPTION_LENGTH),
            None => Ok(()),
        }
    }
}

impl From<UpdateProductRequest> for ProductChanges {
    fn from(req: UpdateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedProduct {
    pub product_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductResponse {
    pub product_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub brand_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            product_id: product.product_id,
            name: product.name,
            description: product.description,
            price: product.price,
            brand_id: product.brand_id,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

//=========================================================================================
// Orders
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl Validate for CreateOrderRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if !(1..=MAX_ORDER_QUANTITY).contains(&self.quantity) {
            return Err(invalid(format!(
                "quantity must be between 1 and {}",
                MAX_ORDER_QUANTITY
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedOrder {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub brand_id: Uuid,
    /// The product as it was when the order was placed.
    pub item: ProductResponse,
    pub quantity: i32,
    pub total_price: Decimal,
    #[schema(value_type = String, example = "pending")]
    pub status: OrderStatus,
    pub delivery_source_address: String,
    pub delivery_destination_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            user_id: order.user_id,
            brand_id: order.brand_id,
            item: order.item.into(),
            quantity: order.quantity,
            total_price: order.total_price,
            status: order.status,
            delivery_source_address: order.delivery_source_address,
            delivery_destination_address: order.delivery_destination_address,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register() -> RegisterUserRequest {
        RegisterUserRequest {
            email: "a@b.c".to_string(),
            password: "pw12345".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            delivery_address: "X".to_string(),
            role: Some(Role::User),
            avatar: None,
        }
    }

    #[test]
    fn register_request_checks_every_field() {
        assert!(register().validate().is_ok());

        let mut long_name = register();
        long_name.first_name = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(long_name.validate().is_err());

        let mut bad_email = register();
        bad_email.email = "not-an-email".to_string();
        assert!(bad_email.validate().is_err());

        let mut short_password = register();
        short_password.password = "pw".to_string();
        assert!(short_password.validate().is_err());

        let mut bad_avatar = register();
        bad_avatar.avatar = Some("javascript:alert(1)".to_string());
        assert!(bad_avatar.validate().is_err());
    }

    #[test]
    fn empty_update_is_valid_but_blank_fields_are_not() {
        assert!(UpdateUserRequest::default().validate().is_ok());
        let blank = UpdateBrandRequest {
            brand_name: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn order_quantity_is_bounded() {
        let order = |quantity| CreateOrderRequest {
            product_id: Uuid::new_v4(),
            quantity,
        };
        assert!(order(1).validate().is_ok());
        assert!(order(MAX_ORDER_QUANTITY).validate().is_ok());
        assert!(order(0).validate().is_err());
        assert!(order(MAX_ORDER_QUANTITY + 1).validate().is_err());
    }

    #[test]
    fn user_response_has_no_password_field() {
        let now = Utc::now();
        let json = serde_json::to_value(UserResponse::from(User {
            user_id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            delivery_address: "X".to_string(),
            role: Role::User,
            avatar: None,
            created_at: now,
            updated_at: now,
        }))
        .unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn list_meta_mirrors_the_page() {
        let page = Page::new(Some(5), Some(3)).unwrap();
        let list: ListResponse<ProductResponse> = ListResponse::new(Vec::<Product>::new(), page);
        let json = serde_json::to_value(list).unwrap();
        assert_eq!(json["meta"]["limit"], 5);
        assert_eq!(json["meta"]["offset"], 10);
        assert_eq!(json["meta"]["page"], 3);
        assert_eq!(json["data"], serde_json::json!([]));
    }
}
