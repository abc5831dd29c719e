//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::error::ErrorBody;
use crate::web::{brands, dto, orders, products, users};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        users::register_handler,
        users::login_handler,
        users::refresh_handler,
        users::logout_handler,
        users::me_handler,
        users::get_handler,
        users::update_handler,
        users::delete_handler,
        brands::create_handler,
        brands::login_handler,
        brands::refresh_handler,
        brands::logout_handler,
        brands::me_handler,
        brands::list_handler,
        brands::get_handler,
        brands::update_handler,
        brands::delete_handler,
        products::create_handler,
        products::list_handler,
        products::get_handler,
        products::update_handler,
        products::delete_handler,
        orders::create_handler,
        orders::list_handler,
        orders::get_handler,
        orders::accept_handler,
        orders::delete_handler,
    ),
    components(
        schemas(
            ErrorBody,
            dto::PageMeta,
            dto::UserResponse,
            dto::BrandResponse,
            dto::ProductResponse,
            dto::OrderResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "users", description = "Buyer and admin accounts, login and sessions."),
        (name = "brands", description = "Merchants, brand login and brand profiles."),
        (name = "products", description = "Brand catalogs."),
        (name = "orders", description = "Order placement and acceptance.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_resource() {
        let doc = ApiDoc::openapi();
        for path in ["/user/create", "/user/{id}", "/brand/{id}", "/product", "/order/{id}"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
