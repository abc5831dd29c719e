//! services/api/src/web/products.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::services::{AuthContext, CreateProduct};
use crate::web::dto::{
    CreateProductRequest, CreatedProduct, ListQuery, ListResponse, ProductResponse,
    UpdateProductRequest, Validate,
};
use crate::web::extract::{AppJson, AppPath, AppQuery};
use crate::web::state::AppState;

/// POST /product - Add a product to the calling brand's catalog
#[utoipa::path(
    post,
    path = "/product",
    tag = "products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = CreatedProduct),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 403, description = "Caller is not a brand", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(req): AppJson<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let product = state
        .products
        .create(
            &ctx.principal,
            CreateProduct {
                name: req.name,
                description: req.description,
                price: req.price,
                brand_id: req.brand_id,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedProduct {
            product_id: product.product_id,
        }),
    ))
}

/// GET /product - Products visible to the caller
#[utoipa::path(
    get,
    path = "/product",
    tag = "products",
    params(ListQuery),
    responses((status = 200, description = "A page of products", body = ListResponse<ProductResponse>)),
    security(("bearer" = []))
)]
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<ListResponse<ProductResponse>>, ApiError> {
    let page = query.page()?;
    let products = state.products.list(&ctx.principal, query.brand_id, page).await?;
    Ok(Json(ListResponse::new(products, page)))
}

/// GET /product/{id}
#[utoipa::path(
    get,
    path = "/product/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product", body = ProductResponse),
        (status = 404, description = "No such product", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    AppPath(product_id): AppPath<Uuid>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.products.find_by_id_cached(product_id).await?;
    Ok(Json(product.into()))
}

/// PUT /product/{id} - Update a product (owning brand or admin)
#[utoipa::path(
    put,
    path = "/product/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ProductResponse),
        (status = 403, description = "Not the owning brand", body = ErrorBody),
        (status = 404, description = "No such product", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppPath(product_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    req.validate()?;
    let product = state.products.update(&ctx.principal, product_id, req.into()).await?;
    Ok(Json(product.into()))
}

/// DELETE /product/{id} - Remove a product (owning brand or admin)
#[utoipa::path(
    delete,
    path = "/product/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product removed"),
        (status = 403, description = "Not the owning brand", body = ErrorBody),
        (status = 404, description = "No such product", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppPath(product_id): AppPath<Uuid>,
) -> Result<Json<()>, ApiError> {
    state.products.delete(&ctx.principal, product_id).await?;
    Ok(Json(()))
}
