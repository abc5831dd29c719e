//! services/api/src/web/users.rs
//!
//! User registration, login/refresh/logout and account endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use marketplace_core::{Page, Role, ServiceError};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::services::{AuthContext, RegisterUser};
use crate::web::dto::{
    CreatedUser, ListResponse, LoginRequest, RefreshRequest, RegisterUserRequest, TokensResponse,
    UpdateUserRequest, UserLoginResponse, UserQuery, UserResponse, Validate,
};
use crate::web::extract::{AppJson, AppPath, AppQuery};
use crate::web::state::AppState;

/// POST /user/create - Register a new buyer account
#[utoipa::path(
    post,
    path = "/user/create",
    tag = "users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User created", body = CreatedUser),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 403, description = "Admin accounts cannot self-register", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    if req.role == Some(Role::Admin) {
        return Err(ServiceError::Forbidden.into());
    }

    let user = state
        .users
        .register(RegisterUser {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            delivery_address: req.delivery_address,
            role: Role::User,
            avatar: req.avatar,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedUser { user_id: user.user_id })))
}

/// POST /user/login - Exchange email and password for a token pair
#[utoipa::path(
    post,
    path = "/user/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = UserLoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<UserLoginResponse>, ApiError> {
    req.validate()?;
    let outcome = state.auth.login_user(&req.email, &req.password).await?;
    Ok(Json(UserLoginResponse {
        user_id: outcome.principal_id,
        tokens: outcome.tokens.into(),
    }))
}

/// POST /user/refresh - Rotate the token pair of a live session
#[utoipa::path(
    post,
    path = "/user/refresh",
    tag = "users",
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

/// POST /user/logout - Revoke the caller's session
#[utoipa::path(
    post,
    path = "/user/logout",
    tag = "users",
    responses(
        (status = 200, description = "Session revoked"),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<()>, ApiError> {
    state.auth.logout(&ctx.session_id).await?;
    Ok(Json(()))
}

/// GET /user/me - The calling user's account
#[utoipa::path(
    get,
    path = "/user/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 403, description = "Caller is a brand", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = ctx.principal.user_id().ok_or(ServiceError::Forbidden)?;
    let user = state.users.find_by_id_cached(user_id).await?;
    Ok(Json(user.into()))
}

/// GET /user - One user by `id`, or a page of the users the caller may see
#[utoipa::path(
    get,
    path = "/user",
    tag = "users",
    params(UserQuery),
    responses(
        (status = 200, description = "A user when `id` is given, otherwise a page", body = ListResponse<UserResponse>),
        (status = 400, description = "Invalid query", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppQuery(query): AppQuery<UserQuery>,
) -> Result<Response, ApiError> {
    if let Some(user_id) = query.id {
        let user = state.users.find_by_id_cached(user_id).await?;
        return Ok(Json(UserResponse::from(user)).into_response());
    }

    let page = Page::new(query.size, query.page)?;
    let users = state.users.list(&ctx.principal, page).await?;
    Ok(Json(ListResponse::<UserResponse>::new(users, page)).into_response())
}

/// PUT /user/{id} - Update an account (owner or admin)
#[utoipa::path(
    put,
    path = "/user/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    req.validate()?;
    let user = state.users.update(&ctx.principal, user_id, req.into()).await?;
    Ok(Json(user.into()))
}

/// DELETE /user/{id} - Remove an account (owner or admin)
#[utoipa::path(
    delete,
    path = "/user/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User removed"),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody),
        (status = 409, description = "User still has orders", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<()>, ApiError> {
    state.users.delete(&ctx.principal, user_id).await?;
    Ok(Json(()))
}
