//! services/api/src/web/router.rs
//!
//! Assembles the REST routes. Used by the `api` binary and by the HTTP tests.

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::web::middleware::{enforce_deadline, expose_error_details, require_auth};
use crate::web::state::AppState;
use crate::web::{brands, orders, products, users};

pub fn build_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/user/create", post(users::register_handler))
        .route("/user/login", post(users::login_handler))
        .route("/user/refresh", post(users::refresh_handler))
        .route("/brand/login", post(brands::login_handler))
        .route("/brand/refresh", post(brands::refresh_handler));

    // Protected routes (bearer access token and a live session required)
    let protected_routes = Router::new()
        .route("/user", get(users::get_handler))
        .route("/user/me", get(users::me_handler))
        .route("/user/logout", post(users::logout_handler))
        .route(
            "/user/{id}",
            put(users::update_handler).delete(users::delete_handler),
        )
        .route("/brand", post(brands::create_handler).get(brands::list_handler))
        .route("/brand/me", get(brands::me_handler))
        .route("/brand/logout", post(brands::logout_handler))
        .route(
            "/brand/{id}",
            get(brands::get_handler)
                .put(brands::update_handler)
                .delete(brands::delete_handler),
        )
        .route(
            "/product",
            post(products::create_handler).get(products::list_handler),
        )
        .route(
            "/product/{id}",
            get(products::get_handler)
                .put(products::update_handler)
                .delete(products::delete_handler),
        )
        .route("/order", post(orders::create_handler).get(orders::list_handler))
        .route(
            "/order/{id}",
            get(orders::get_handler)
                .put(orders::accept_handler)
                .delete(orders::delete_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let mut router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            enforce_deadline,
        ));
    if state.config.http_debug_errors {
        router = router.layer(axum_middleware::from_fn(expose_error_details));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
