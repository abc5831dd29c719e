//! services/api/src/web/brands.rs
//!
//! Brand onboarding, brand login and brand profile endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use marketplace_core::ServiceError;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::services::{AuthContext, RegisterBrand};
use crate::web::dto::{
    BrandLoginResponse, BrandResponse, CreatedBrand, ListResponse, LoginRequest, PageQuery,
    RefreshRequest, RegisterBrandRequest, TokensResponse, UpdateBrandRequest, Validate,
};
use crate::web::extract::{AppJson, AppPath, AppQuery};
use crate::web::require_admin;
use crate::web::state::AppState;

/// POST /brand - Onboard a brand (admin)
#[utoipa::path(
    post,
    path = "/brand",
    tag = "brands",
    request_body = RegisterBrandRequest,
    responses(
        (status = 201, description = "Brand created", body = CreatedBrand),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(req): AppJson<RegisterBrandRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&ctx)?;
    req.validate()?;

    let brand = state
        .brands
        .register(
            &ctx.principal,
            RegisterBrand {
                brand_name: req.brand_name,
                email: req.email,
                password: req.password,
                pickup_address: req.pickup_address,
                logo: req.logo,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedBrand { brand_id: brand.brand_id })))
}

/// POST /brand/login
#[utoipa::path(
    post,
    path = "/brand/login",
    tag = "brands",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = BrandLoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<BrandLoginResponse>, ApiError> {
    req.validate()?;
    let outcome = state.auth.login_brand(&req.email, &req.password).await?;
    Ok(Json(BrandLoginResponse {
        brand_id: outcome.principal_id,
        tokens: outcome.tokens.into(),
    }))
}

/// POST /brand/refresh
#[utoipa::path(
    post,
    path = "/brand/refresh",
    tag = "brands",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokensResponse),
        (status = 401, description = "Invalid token or session gone", body = ErrorBody)
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RefreshRequest>,
) -> Result<Json<TokensResponse>, ApiError> {
    req.validate()?;
    let pair = state.auth.refresh(&req.refresh_token).await?;
    Ok(Json(pair.into()))
}

/// POST /brand/logout
#[utoipa::path(
    post,
    path = "/brand/logout",
    tag = "brands",
    responses((status = 200, description = "Session revoked")),
    security(("bearer" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<()>, ApiError> {
    state.auth.logout(&ctx.session_id).await?;
    Ok(Json(()))
}

/// GET /brand/me - The calling brand
#[utoipa::path(
    get,
    path = "/brand/me",
    tag = "brands",
    responses(
        (status = 200, description = "Current brand", body = BrandResponse),
        (status = 403, description = "Caller is not a brand", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<BrandResponse>, ApiError> {
    let brand_id = ctx.principal.brand_id().ok_or(ServiceError::Forbidden)?;
    let brand = state.brands.find_by_id_cached(brand_id).await?;
    Ok(Json(brand.into()))
}

/// GET /brand - Brands visible to the caller
#[utoipa::path(
    get,
    path = "/brand",
    tag = "brands",
    params(PageQuery),
    responses((status = 200, description = "A page of brands", body = ListResponse<BrandResponse>)),
    security(("bearer" = []))
)]
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<ListResponse<BrandResponse>>, ApiError> {
    let page = query.page()?;
    let brands = state.brands.list(&ctx.principal, page).await?;
    Ok(Json(ListResponse::new(brands, page)))
}

/// GET /brand/{id}
#[utoipa::path(
    get,
    path = "/brand/{id}",
    tag = "brands",
    params(("id" = Uuid, Path, description = "Brand id")),
    responses(
        (status = 200, description = "The brand", body = BrandResponse),
        (status = 404, description = "No such brand", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    AppPath(brand_id): AppPath<Uuid>,
) -> Result<Json<BrandResponse>, ApiError> {
    let brand = state.brands.find_by_id_cached(brand_id).await?;
    Ok(Json(brand.into()))
}

/// PUT /brand/{id} - Update a brand (owner or admin)
#[utoipa::path(
    put,
    path = "/brand/{id}",
    tag = "brands",
    params(("id" = Uuid, Path, description = "Brand id")),
    request_body = UpdateBrandRequest,
    responses(
        (status = 200, description = "Updated brand", body = BrandResponse),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "No such brand", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppPath(brand_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateBrandRequest>,
) -> Result<Json<BrandResponse>, ApiError> {
    req.validate()?;
    let brand = state.brands.update(&ctx.principal, brand_id, req.into()).await?;
    Ok(Json(brand.into()))
}

/// DELETE /brand/{id} - Remove a brand (admin)
#[utoipa::path(
    delete,
    path = "/brand/{id}",
    tag = "brands",
    params(("id" = Uuid, Path, description = "Brand id")),
    responses(
        (status = 200, description = "Brand removed"),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 409, description = "Brand still has products or orders", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppPath(brand_id): AppPath<Uuid>,
) -> Result<Json<()>, ApiError> {
    require_admin(&ctx)?;
    state.brands.delete(&ctx.principal, brand_id).await?;
    Ok(Json(()))
}
