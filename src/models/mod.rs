//! Modelos de datos
//!
//! Este módulo contiene todos los modelos de datos del sistema:
//! usuarios, vehículos y solicitudes de grúa.

pub mod geo;
pub mod tow_request;
pub mod user;
pub mod vehicle;

pub use geo::GeoPoint;
pub use tow_request::{
    Actor, DriverAssignment, NewTowRequest, RequestPreference, TowRequest, TowStatus,
    Transition, TransitionError, TruckType,
};
pub use user::{PasswordResetToken, ProfileChanges, Role, User};
pub use vehicle::Vehicle;
