//! SMILE Towing - backend de despacho de grúas
//!
//! Clientes crean solicitudes de grúa, conductores las ven en un feed en vivo
//! y las aceptan; el cliente espera la asignación con una ventana de 60 segundos.

pub mod config;
pub mod controllers;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_app_router;
pub use state::AppState;
