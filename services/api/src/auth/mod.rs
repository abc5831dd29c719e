//! services/api/src/auth/mod.rs
//!
//! Credential and token primitives shared by the user and brand login flows.

pub mod credentials;
pub mod token;

pub use credentials::{normalize_email, validate_email, PasswordService, MAX_EMAIL_LENGTH};
pub use token::{AccessClaims, RefreshClaims, TokenPair, TokenService};
