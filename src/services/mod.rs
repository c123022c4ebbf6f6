//! Services module
//!
//! Este módulo contiene la lógica que no pertenece a un solo controlador:
//! bus de eventos, flujo de asignación, streams en vivo e integraciones
//! externas (geocodificación y almacenamiento de imágenes).

pub mod geocoding_service;
pub mod live_feed_service;
pub mod matching_service;
pub mod request_events;
pub mod storage_service;

pub use geocoding_service::{GeocodeResult, Geocoder, MapboxGeocoder};
pub use matching_service::{MatchingOutcome, MatchingService, MatchingState};
pub use request_events::RequestEventBus;
pub use storage_service::{LocalObjectStorage, ObjectStorage};
