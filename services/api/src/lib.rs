//! services/api/src/lib.rs
//!
//! The marketplace HTTP service: adapters for the core ports, the credential and
//! token primitives, the domain services and the axum web layer.

pub mod adapters;
pub mod auth;
pub mod config;
pub mod error;
pub mod services;
pub mod web;
