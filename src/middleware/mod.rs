//! Middleware del sistema
//!
//! Autenticación (extractores JWT) y CORS.

pub mod auth;
pub mod cors;

pub use auth::{AuthenticatedUser, CustomerUser, DriverUser};
pub use cors::cors_layer;
