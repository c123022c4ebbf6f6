//! Controladores
//!
//! Lógica de cada recurso de la API. Las rutas solo extraen datos de la
//! request y delegan aquí.

pub mod auth_controller;
pub mod profile_controller;
pub mod tow_request_controller;
pub mod vehicle_controller;

pub use auth_controller::AuthController;
pub use profile_controller::ProfileController;
pub use tow_request_controller::TowRequestController;
pub use vehicle_controller::VehicleController;
