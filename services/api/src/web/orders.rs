//! services/api/src/web/orders.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::services::AuthContext;
use crate::web::dto::{
    CreateOrderRequest, CreatedOrder, ListQuery, ListResponse, OrderResponse, Validate,
};
use crate::web::extract::{AppJson, AppPath, AppQuery};
use crate::web::state::AppState;

/// POST /order - Place an order for a product
#[utoipa::path(
    post,
    path = "/order",
    tag = "orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = CreatedOrder),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 403, description = "Only users place orders", body = ErrorBody),
        (status = 404, description = "No such product", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(req): AppJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let order = state
        .orders
        .place_order(&ctx.principal, &ctx.session_id, req.product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedOrder { order_id: order.order_id })))
}

/// GET /order - Orders visible to the caller
#[utoipa::path(
    get,
    path = "/order",
    tag = "orders",
    params(ListQuery),
    responses((status = 200, description = "A page of orders", body = ListResponse<OrderResponse>)),
    security(("bearer" = []))
)]
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<ListResponse<OrderResponse>>, ApiError> {
    let page = query.page()?;
    let orders = state.orders.list(&ctx.principal, query.brand_id, page).await?;
    Ok(Json(ListResponse::new(orders, page)))
}

/// GET /order/{id} - One order, for its buyer, its brand or an admin
#[utoipa::path(
    get,
    path = "/order/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = OrderResponse),
        (status = 403, description = "Not a party to the order", body = ErrorBody),
        (status = 404, description = "No such order", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppPath(order_id): AppPath<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.find(&ctx.principal, order_id).await?;
    Ok(Json(order.into()))
}

/// PUT /order/{id} - Accept a pending order (the order's brand)
#[utoipa::path(
    put,
    path = "/order/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order accepted", body = OrderResponse),
        (status = 403, description = "Not the order's brand", body = ErrorBody),
        (status = 404, description = "No such order", body = ErrorBody),
        (status = 409, description = "Order already accepted", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn accept_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppPath(order_id): AppPath<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.accept_order(&ctx.principal, order_id).await?;
    Ok(Json(order.into()))
}

/// DELETE /order/{id} - Remove an order (admin)
#[utoipa::path(
    delete,
    path = "/order/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order removed"),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "No such order", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppPath(order_id): AppPath<Uuid>,
) -> Result<Json<()>, ApiError> {
    state.orders.delete(&ctx.principal, order_id).await?;
    Ok(Json(()))
}
