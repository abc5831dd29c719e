pub mod brands;
pub mod dto;
pub mod extract;
pub mod middleware;
pub mod orders;
pub mod products;
pub mod rest;
pub mod router;
pub mod state;
pub mod users;

// Re-export the router and state to make them easily accessible
// to the binary that will serve them.
pub use router::build_router;
pub use state::AppState;

use crate::error::ApiError;
use crate::services::AuthContext;
use marketplace_core::ServiceError;

/// Route guard for admin-only endpoints, checked before the service runs.
pub(crate) fn require_admin(ctx: &AuthContext) -> Result<(), ApiError> {
    if ctx.principal.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden.into())
    }
}
